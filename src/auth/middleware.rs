use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use serde_json::json;

fn unauthorized(message: &str) -> HttpResponse {
    HttpResponse::Unauthorized().json(json!({
        "success": false,
        "error": { "kind": "UNAUTHENTICATED", "message": message }
    }))
}

pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;

    let header_value = match req.headers().get("Authorization") {
        Some(h) => match h.to_str() {
            Ok(v) => v,
            Err(_) => {
                let resp = unauthorized("Invalid Authorization header encoding");
                return Ok(req.into_response(resp));
            }
        },
        None => {
            let resp = unauthorized("Missing Authorization header");
            return Ok(req.into_response(resp));
        }
    };

    let token = match header_value.strip_prefix("Bearer ") {
        Some(t) => t,
        None => {
            let resp = unauthorized("Authorization header must start with Bearer");
            return Ok(req.into_response(resp));
        }
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected bearer token");
            let resp = unauthorized("Invalid or expired token");
            return Ok(req.into_response(resp));
        }
    };

    let auth_user = match AuthUser::from_claims(claims) {
        Some(user) => user,
        None => {
            let resp = unauthorized("Invalid role");
            return Ok(req.into_response(resp));
        }
    };

    req.extensions_mut().insert(auth_user);

    next.call(req).await
}
