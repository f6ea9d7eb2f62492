use crate::api::{log_failure, ok};
use crate::auth::auth::AuthUser;
use crate::model::schedule::{NewSchedule, ScheduleScope};
use crate::service::clock::Clock;
use crate::service::schedule::ScheduleService;
use actix_web::{HttpResponse, web};
use chrono::NaiveTime;
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct ScheduleBody {
    /// Omit for a clinic-wide default
    #[schema(example = 7)]
    pub user_id: Option<u64>,
    pub scope: ScheduleScope,
    #[schema(example = "09:00:00", value_type = String)]
    pub start_time: NaiveTime,
    #[schema(example = "18:00:00", value_type = String)]
    pub end_time: NaiveTime,
    /// Only on specific-date entries
    #[serde(default)]
    pub is_day_off: bool,
}

/// Create or replace a schedule entry (Manager/Admin)
#[utoipa::path(
    put,
    path = "/api/schedules",
    request_body(content = ScheduleBody, content_type = "application/json", example = json!({
        "user_id": 7,
        "scope": { "kind": "weekly", "day_of_week": "Mon" },
        "start_time": "09:00:00",
        "end_time": "18:00:00"
    })),
    responses(
        (status = 200, description = "Saved entry", body = Object),
        (status = 400, description = "Invalid times or day-off on a weekly entry"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Manager/Admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Schedule"
)]
pub async fn set_schedule(
    auth: AuthUser,
    service: web::Data<ScheduleService>,
    payload: web::Json<ScheduleBody>,
) -> actix_web::Result<HttpResponse> {
    auth.require_manager()?;
    let body = payload.into_inner();

    let saved = service
        .set(NewSchedule {
            clinic_id: auth.clinic_id,
            user_id: body.user_id,
            scope: body.scope,
            start_time: body.start_time,
            end_time: body.end_time,
            is_day_off: body.is_day_off,
        })
        .await
        .inspect_err(log_failure("set_schedule", auth.user_id))?;

    Ok(ok(saved))
}

/// A user's schedule entries and today's resolved shift
#[utoipa::path(
    get,
    path = "/api/schedules/{user_id}",
    params(
        ("user_id" = u64, Path, description = "User whose schedule to show")
    ),
    responses(
        (status = 200, description = "Entries (user's own plus clinic defaults) and today's shift", body = Object, example = json!({
            "success": true,
            "data": {
                "user_id": 7,
                "date": "2026-03-02",
                "shift": { "start_time": "09:00:00", "end_time": "18:00:00" },
                "entries": []
            }
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Another user's schedule requires manager/admin")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Schedule"
)]
pub async fn list_schedules(
    auth: AuthUser,
    service: web::Data<ScheduleService>,
    clock: web::Data<dyn Clock>,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    let user_id = auth.target_user(Some(path.into_inner()))?;

    let overview = service
        .overview(auth.clinic_id, user_id, clock.today())
        .await
        .inspect_err(log_failure("list_schedules", auth.user_id))?;

    Ok(ok(overview))
}
