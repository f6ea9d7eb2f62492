use crate::api::{log_failure, ok};
use crate::auth::auth::AuthUser;
use crate::service::statistics::StatisticsAggregator;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct RecomputeBody {
    #[schema(example = 2026)]
    pub year: i32,
    #[schema(example = 3, minimum = 1, maximum = 12)]
    pub month: u32,
    /// Defaults to the caller; another user needs manager/admin
    pub user_id: Option<u64>,
    /// Recompute every active member of the caller's clinic (Manager/Admin)
    #[serde(default)]
    pub whole_clinic: bool,
}

#[derive(Deserialize, IntoParams)]
pub struct StatisticsQuery {
    #[param(example = 2026)]
    pub year: i32,
    #[param(example = 3)]
    pub month: u32,
    /// Another user's statistics (manager/admin only)
    pub user_id: Option<u64>,
}

/// Recompute monthly statistics from committed records
#[utoipa::path(
    post,
    path = "/api/attendance/statistics/recompute",
    request_body(content = RecomputeBody, content_type = "application/json"),
    responses(
        (status = 200, description = "Fresh rollup (a list when whole_clinic is set)", body = Object, example = json!({
            "success": true,
            "data": {
                "user_id": 7, "clinic_id": 10, "year": 2026, "month": 3,
                "total_work_days": 20, "present_days": 18, "absent_days": 2,
                "leave_days": 0, "holiday_days": 2, "late_count": 1, "total_late_minutes": 15,
                "early_leave_count": 1, "total_early_leave_minutes": 30,
                "overtime_count": 0, "total_overtime_minutes": 0,
                "attendance_rate": 90.0, "avg_work_minutes_per_day": 537.5,
                "last_calculated_at": "2026-04-10T12:00:00"
            }
        })),
        (status = 400, description = "Invalid year/month"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Manager/Admin only for other users")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Statistics"
)]
pub async fn recompute(
    auth: AuthUser,
    aggregator: web::Data<StatisticsAggregator>,
    payload: web::Json<RecomputeBody>,
) -> actix_web::Result<HttpResponse> {
    let body = payload.into_inner();

    if body.whole_clinic {
        auth.require_manager()?;
        let all = aggregator
            .recompute_clinic(auth.clinic_id, body.year, body.month)
            .await
            .inspect_err(log_failure("recompute_clinic", auth.user_id))?;
        return Ok(ok(all));
    }

    let user_id = auth.target_user(body.user_id)?;
    let stats = aggregator
        .recompute(user_id, auth.clinic_id, body.year, body.month)
        .await
        .inspect_err(log_failure("recompute_statistics", auth.user_id))?;

    Ok(ok(stats))
}

/// Stored monthly statistics
#[utoipa::path(
    get,
    path = "/api/attendance/statistics",
    params(StatisticsQuery),
    responses(
        (status = 200, description = "Stored rollup", body = Object),
        (status = 400, description = "Invalid year/month"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Manager/Admin only for other users"),
        (status = 404, description = "Not computed yet", body = Object, example = json!({
            "success": false,
            "error": { "kind": "RECORD_NOT_FOUND", "message": "Record not found" }
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Statistics"
)]
pub async fn get_statistics(
    auth: AuthUser,
    aggregator: web::Data<StatisticsAggregator>,
    query: web::Query<StatisticsQuery>,
) -> actix_web::Result<HttpResponse> {
    let query = query.into_inner();
    let user_id = auth.target_user(query.user_id)?;

    let stats = aggregator
        .get(user_id, auth.clinic_id, query.year, query.month)
        .await
        .inspect_err(log_failure("get_statistics", auth.user_id))?;

    Ok(ok(stats))
}
