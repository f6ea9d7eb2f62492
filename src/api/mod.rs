use actix_web::{HttpRequest, HttpResponse, ResponseError, web};
use serde::Serialize;

use crate::error::AttendanceError;

pub mod attendance;
pub mod qr_code;
pub mod schedule;
pub mod statistics;

#[derive(Serialize)]
struct Success<T> {
    success: bool,
    data: T,
}

/// `{ "success": true, "data": ... }`
pub fn ok<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(Success {
        success: true,
        data,
    })
}

/// Logs server-side failures; client errors are already visible in the response.
pub fn log_failure(operation: &'static str, user_id: u64) -> impl Fn(&AttendanceError) {
    move |err| {
        if err.status_code().is_server_error() {
            tracing::error!(error = %err, operation, user_id, "Request failed");
        }
    }
}

/// Malformed bodies, queries and paths answer with the same envelope as domain errors.
pub fn extractor_config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _: &HttpRequest| {
        AttendanceError::validation(err.to_string()).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _: &HttpRequest| {
        AttendanceError::validation(err.to_string()).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _: &HttpRequest| {
        AttendanceError::validation(err.to_string()).into()
    }));
}
