use chrono::NaiveDateTime;
use serde::Serialize;
use utoipa::ToSchema;

/// Per-user monthly rollup. Always recomputed, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema, sqlx::FromRow)]
pub struct MonthlyStatistics {
    pub user_id: u64,
    pub clinic_id: u64,
    #[schema(example = 2026)]
    pub year: i32,
    #[schema(example = 3)]
    pub month: i32,
    pub total_work_days: i64,
    pub present_days: i64,
    pub absent_days: i64,
    pub leave_days: i64,
    pub holiday_days: i64,
    pub late_count: i64,
    pub total_late_minutes: i64,
    pub early_leave_count: i64,
    pub total_early_leave_minutes: i64,
    pub overtime_count: i64,
    pub total_overtime_minutes: i64,
    #[schema(example = 90.0)]
    pub attendance_rate: f64,
    pub avg_work_minutes_per_day: f64,
    #[schema(value_type = String, format = "date-time")]
    pub last_calculated_at: NaiveDateTime,
}
