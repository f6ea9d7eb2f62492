use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde::Serialize;
use serde_json::json;

use crate::store::StoreError;

pub type AttendanceResult<T> = Result<T, AttendanceError>;

/// Every failure an attendance operation can surface to a caller.
#[derive(Debug, Display, Clone, PartialEq)]
pub enum AttendanceError {
    #[display(fmt = "{}", _0)]
    Validation(String),

    #[display(fmt = "{}", _0)]
    Authorization(String),

    #[display(fmt = "QR code is expired or does not match this clinic")]
    QrCodeExpiredOrMismatch,

    #[display(
        fmt = "Location is {:.0} m from the clinic, allowed radius is {} m",
        distance_meters,
        radius_meters
    )]
    GeofenceViolation { distance_meters: f64, radius_meters: u32 },

    #[display(fmt = "Already checked in for this work date")]
    AlreadyCheckedIn,

    #[display(fmt = "Already checked out for this work date")]
    AlreadyCheckedOut,

    #[display(fmt = "No check-in found for this work date")]
    NotCheckedInYet,

    #[display(fmt = "Record not found")]
    RecordNotFound,

    #[display(fmt = "Attendance store temporarily unavailable: {}", _0)]
    TransientStore(String),

    #[display(fmt = "{}", _0)]
    Timeout(String),

    #[display(fmt = "Failed to persist attendance data: {}", _0)]
    Persistence(String),
}

impl std::error::Error for AttendanceError {}

impl AttendanceError {
    pub fn validation(message: impl Into<String>) -> Self {
        AttendanceError::Validation(message.into())
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        AttendanceError::Authorization(message.into())
    }

    /// Stable machine-readable code, for clients that localise messages.
    pub fn kind(&self) -> &'static str {
        match self {
            AttendanceError::Validation(_) => "VALIDATION_ERROR",
            AttendanceError::Authorization(_) => "AUTHORIZATION_ERROR",
            AttendanceError::QrCodeExpiredOrMismatch => "QR_CODE_EXPIRED_OR_MISMATCH",
            AttendanceError::GeofenceViolation { .. } => "GEOFENCE_VIOLATION",
            AttendanceError::AlreadyCheckedIn => "ALREADY_CHECKED_IN",
            AttendanceError::AlreadyCheckedOut => "ALREADY_CHECKED_OUT",
            AttendanceError::NotCheckedInYet => "NOT_CHECKED_IN_YET",
            AttendanceError::RecordNotFound => "RECORD_NOT_FOUND",
            AttendanceError::TransientStore(_) => "TRANSIENT_STORE_ERROR",
            AttendanceError::Timeout(_) => "TIMEOUT_ERROR",
            AttendanceError::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }
}

impl From<StoreError> for AttendanceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Transient(msg) => AttendanceError::TransientStore(msg),
            StoreError::UniqueViolation(msg) | StoreError::Other(msg) => {
                AttendanceError::Persistence(msg)
            }
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody<'a> {
    pub kind: &'a str,
    pub message: String,
}

impl ResponseError for AttendanceError {
    fn status_code(&self) -> StatusCode {
        match self {
            AttendanceError::Validation(_) => StatusCode::BAD_REQUEST,
            AttendanceError::Authorization(_) => StatusCode::FORBIDDEN,
            AttendanceError::QrCodeExpiredOrMismatch => StatusCode::BAD_REQUEST,
            AttendanceError::GeofenceViolation { .. } => StatusCode::FORBIDDEN,
            AttendanceError::AlreadyCheckedIn | AttendanceError::AlreadyCheckedOut => {
                StatusCode::CONFLICT
            }
            AttendanceError::NotCheckedInYet => StatusCode::CONFLICT,
            AttendanceError::RecordNotFound => StatusCode::NOT_FOUND,
            AttendanceError::TransientStore(_) => StatusCode::SERVICE_UNAVAILABLE,
            AttendanceError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            AttendanceError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // store internals stay in the logs
        let message = match self {
            AttendanceError::TransientStore(_) => "Service temporarily unavailable".to_string(),
            AttendanceError::Persistence(_) => "Internal Server Error".to_string(),
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "error": ErrorBody {
                kind: self.kind(),
                message,
            }
        }))
    }
}
