use crate::api::{log_failure, ok};
use crate::auth::auth::AuthUser;
use crate::error::{AttendanceError, AttendanceResult};
use crate::model::qr_code::{Coordinates, RefreshPeriod};
use crate::service::qr_code::{GenerateQrCode, QrCodeManager};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use utoipa::ToSchema;

fn default_radius() -> u32 {
    100
}

fn default_period() -> RefreshPeriod {
    RefreshPeriod::Daily
}

#[derive(Deserialize, ToSchema)]
pub struct GenerateQrBody {
    /// Geofence centre; give both coordinates or neither
    #[schema(example = 37.5)]
    pub anchor_latitude: Option<f64>,
    #[schema(example = 127.0)]
    pub anchor_longitude: Option<f64>,
    #[schema(example = 100, minimum = 10, maximum = 5000)]
    #[serde(default = "default_radius")]
    pub radius_meters: u32,
    #[schema(example = "weekly")]
    #[serde(default = "default_period")]
    pub refresh_period: RefreshPeriod,
    /// Replace the live code even if it is still valid
    #[serde(default)]
    pub force_regenerate: bool,
}

impl GenerateQrBody {
    fn anchor(&self) -> AttendanceResult<Option<Coordinates>> {
        match (self.anchor_latitude, self.anchor_longitude) {
            (Some(lat), Some(lon)) => Ok(Some(Coordinates::new(lat, lon))),
            (None, None) => Ok(None),
            _ => Err(AttendanceError::validation(
                "anchor_latitude and anchor_longitude must be given together",
            )),
        }
    }
}

/// Generate (or reuse) the clinic's attendance QR code (Manager/Admin)
#[utoipa::path(
    post,
    path = "/api/qr-codes",
    request_body(content = GenerateQrBody, content_type = "application/json"),
    responses(
        (status = 200, description = "Active QR code", body = Object, example = json!({
            "success": true,
            "data": {
                "id": 1, "clinic_id": 10, "code": "0f8fad5b-d9cb-469f-a165-70867728950e",
                "anchor": { "latitude": 37.5, "longitude": 127.0 }, "radius_meters": 100,
                "refresh_period": "weekly", "valid_date": "2026-03-02", "valid_until": "2026-03-09",
                "created_at": "2026-03-02T08:00:00", "active": true
            }
        })),
        (status = 400, description = "Invalid radius or coordinates", body = Object, example = json!({
            "success": false,
            "error": { "kind": "VALIDATION_ERROR", "message": "radius_meters must be between 10 and 5000" }
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Manager/Admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "QR Code"
)]
pub async fn generate(
    auth: AuthUser,
    manager: web::Data<QrCodeManager>,
    payload: web::Json<GenerateQrBody>,
) -> actix_web::Result<HttpResponse> {
    auth.require_manager()?;
    let body = payload.into_inner();

    let code = manager
        .generate(GenerateQrCode {
            clinic_id: auth.clinic_id,
            anchor: body.anchor()?,
            radius_meters: body.radius_meters,
            refresh_period: body.refresh_period,
            force_regenerate: body.force_regenerate,
        })
        .await
        .inspect_err(log_failure("generate_qr_code", auth.user_id))?;

    Ok(ok(code))
}

/// The caller's clinic QR code valid today, or null
#[utoipa::path(
    get,
    path = "/api/qr-codes/today",
    responses(
        (status = 200, description = "Today's code; data is null when none is active", body = Object, example = json!({
            "success": true,
            "data": null
        })),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "QR Code"
)]
pub async fn today(
    auth: AuthUser,
    manager: web::Data<QrCodeManager>,
) -> actix_web::Result<HttpResponse> {
    let code = manager
        .active_code_for_today(auth.clinic_id)
        .await
        .inspect_err(log_failure("today_qr_code", auth.user_id))?;

    Ok(ok(code))
}
