use crate::api::{log_failure, ok};
use crate::auth::auth::AuthUser;
use crate::model::attendance::AttendanceStatus;
use crate::service::attendance::{AttendanceService, ScanRequest};
use crate::service::clock::Clock;
use crate::service::geofence::GeolocationOutcome;
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct ScanBody {
    /// Token read from the clinic's QR code
    #[schema(example = "0f8fad5b-d9cb-469f-a165-70867728950e")]
    pub qr_code: String,
    /// Defaults to today (clinic time). Send yesterday to close an overnight shift.
    #[schema(example = "2026-03-02", format = "date", value_type = Option<String>)]
    pub work_date: Option<NaiveDate>,
    /// Result of the device position lookup, if one was attempted
    #[schema(value_type = Option<Object>, example = json!({
        "status": "located", "latitude": 37.5, "longitude": 127.0
    }))]
    pub location: Option<GeolocationOutcome>,
}

impl ScanBody {
    fn into_request(self, auth: &AuthUser, today: NaiveDate) -> ScanRequest {
        ScanRequest {
            user_id: auth.user_id,
            clinic_id: auth.clinic_id,
            qr_code: self.qr_code,
            work_date: self.work_date.unwrap_or(today),
            location: self.location,
        }
    }
}

#[derive(Deserialize, IntoParams)]
pub struct RecordsQuery {
    /// First work date (inclusive)
    #[param(example = "2026-03-01", value_type = String, format = "date")]
    pub from: NaiveDate,
    /// Last work date (inclusive)
    #[param(example = "2026-03-31", value_type = String, format = "date")]
    pub to: NaiveDate,
    /// Another user's history (manager/admin only)
    pub user_id: Option<u64>,
}

#[derive(Deserialize, ToSchema)]
pub struct DayStatusBody {
    #[schema(example = 7)]
    pub user_id: u64,
    #[schema(example = "2026-03-02", format = "date", value_type = String)]
    pub work_date: NaiveDate,
    /// absent, leave or holiday
    #[schema(example = "leave")]
    pub status: AttendanceStatus,
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    request_body(content = ScanBody, content_type = "application/json"),
    responses(
        (status = 200, description = "Checked in", body = Object, example = json!({
            "success": true,
            "data": {
                "id": 1, "user_id": 7, "clinic_id": 10, "work_date": "2026-03-02",
                "check_in_time": "2026-03-02T09:15:00", "check_out_time": null,
                "scheduled_start": "2026-03-02T09:00:00", "scheduled_end": "2026-03-02T18:00:00",
                "status": "late", "late_minutes": 15, "early_leave_minutes": 0,
                "overtime_minutes": 0, "total_work_minutes": 0
            }
        })),
        (status = 400, description = "Invalid input or QR code expired/mismatched", body = Object, example = json!({
            "success": false,
            "error": { "kind": "QR_CODE_EXPIRED_OR_MISMATCH", "message": "QR code is expired or does not match this clinic" }
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not a clinic member or outside the geofence"),
        (status = 409, description = "Already checked in", body = Object, example = json!({
            "success": false,
            "error": { "kind": "ALREADY_CHECKED_IN", "message": "Already checked in for this work date" }
        })),
        (status = 503, description = "Store temporarily unavailable")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    clock: web::Data<dyn Clock>,
    payload: web::Json<ScanBody>,
) -> actix_web::Result<HttpResponse> {
    let request = payload.into_inner().into_request(&auth, clock.today());
    let record = service
        .check_in(request)
        .await
        .inspect_err(log_failure("check_in", auth.user_id))?;

    Ok(ok(record))
}

/// Check-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-out",
    request_body(content = ScanBody, content_type = "application/json"),
    responses(
        (status = 200, description = "Checked out", body = Object, example = json!({
            "success": true,
            "data": {
                "id": 1, "user_id": 7, "clinic_id": 10, "work_date": "2026-03-02",
                "check_in_time": "2026-03-02T09:15:00", "check_out_time": "2026-03-02T17:30:00",
                "scheduled_start": "2026-03-02T09:00:00", "scheduled_end": "2026-03-02T18:00:00",
                "status": "early_leave", "late_minutes": 15, "early_leave_minutes": 30,
                "overtime_minutes": 0, "total_work_minutes": 495
            }
        })),
        (status = 400, description = "Invalid input or QR code expired/mismatched"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not a clinic member or outside the geofence"),
        (status = 409, description = "Not checked in yet, or already checked out", body = Object, example = json!({
            "success": false,
            "error": { "kind": "ALREADY_CHECKED_OUT", "message": "Already checked out for this work date" }
        })),
        (status = 503, description = "Store temporarily unavailable")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    clock: web::Data<dyn Clock>,
    payload: web::Json<ScanBody>,
) -> actix_web::Result<HttpResponse> {
    let request = payload.into_inner().into_request(&auth, clock.today());
    let record = service
        .check_out(request)
        .await
        .inspect_err(log_failure("check_out", auth.user_id))?;

    Ok(ok(record))
}

/// Today's attendance for the caller
#[utoipa::path(
    get,
    path = "/api/attendance/today",
    responses(
        (status = 200, description = "Today's state", body = Object, example = json!({
            "success": true,
            "data": { "state": "not_checked_in", "work_date": "2026-03-02" }
        })),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn today(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
) -> actix_web::Result<HttpResponse> {
    let today = service
        .today(auth.user_id)
        .await
        .inspect_err(log_failure("today", auth.user_id))?;

    Ok(ok(today))
}

/// Attendance history for a date range
#[utoipa::path(
    get,
    path = "/api/attendance/records",
    params(RecordsQuery),
    responses(
        (status = 200, description = "Records ordered by work date", body = Object, example = json!({
            "success": true,
            "data": []
        })),
        (status = 400, description = "from is after to, or the range is too long"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Another user's history requires manager/admin")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn records(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    query: web::Query<RecordsQuery>,
) -> actix_web::Result<HttpResponse> {
    let query = query.into_inner();
    let user_id = auth.target_user(query.user_id)?;

    let records = service
        .list_records(user_id, auth.clinic_id, query.from, query.to)
        .await
        .inspect_err(log_failure("list_records", auth.user_id))?;

    Ok(ok(records))
}

/// Mark a day as absent, leave or holiday (Manager/Admin)
#[utoipa::path(
    put,
    path = "/api/attendance/day-status",
    request_body(content = DayStatusBody, content_type = "application/json"),
    responses(
        (status = 200, description = "Day status recorded", body = Object),
        (status = 400, description = "Status is not absent, leave or holiday"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Manager/Admin only"),
        (status = 409, description = "The day already has a check-in")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn day_status(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    payload: web::Json<DayStatusBody>,
) -> actix_web::Result<HttpResponse> {
    auth.require_manager()?;
    let body = payload.into_inner();

    let record = service
        .mark_day_status(body.user_id, auth.clinic_id, body.work_date, body.status)
        .await
        .inspect_err(log_failure("day_status", auth.user_id))?;

    Ok(ok(record))
}
