use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceStatus {
    NotCheckedIn,
    Present,
    Late,
    EarlyLeave,
    Absent,
    Leave,
    Holiday,
}

impl AttendanceStatus {
    /// Statuses a manager may set on a day without a check-in.
    pub fn is_day_marker(self) -> bool {
        matches!(
            self,
            AttendanceStatus::Absent | AttendanceStatus::Leave | AttendanceStatus::Holiday
        )
    }
}

/// Where a `(user, work_date)` pair sits in the check-in / check-out flow.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AttendancePhase {
    NotCheckedIn,
    CheckedIn,
    CheckedOut,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "user_id": 7,
    "clinic_id": 10,
    "work_date": "2026-03-02",
    "check_in_time": "2026-03-02T09:15:00",
    "check_out_time": "2026-03-02T17:30:00",
    "scheduled_start": "2026-03-02T09:00:00",
    "scheduled_end": "2026-03-02T18:00:00",
    "status": "early_leave",
    "late_minutes": 15,
    "early_leave_minutes": 30,
    "overtime_minutes": 0,
    "total_work_minutes": 495
}))]
pub struct AttendanceRecord {
    pub id: u64,
    pub user_id: u64,
    pub clinic_id: u64,
    #[schema(value_type = String, format = "date")]
    pub work_date: NaiveDate,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_in_time: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_out_time: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub scheduled_start: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub scheduled_end: Option<NaiveDateTime>,
    pub status: AttendanceStatus,
    pub late_minutes: i64,
    pub early_leave_minutes: i64,
    pub overtime_minutes: i64,
    pub total_work_minutes: i64,
}

impl AttendanceRecord {
    pub fn phase(&self) -> AttendancePhase {
        match (self.check_in_time, self.check_out_time) {
            (Some(_), Some(_)) => AttendancePhase::CheckedOut,
            (Some(_), None) => AttendancePhase::CheckedIn,
            _ => AttendancePhase::NotCheckedIn,
        }
    }
}

/// Today's attendance as shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TodayAttendance {
    NotCheckedIn {
        #[schema(value_type = String, format = "date")]
        work_date: NaiveDate,
    },
    Recorded {
        phase: AttendancePhase,
        record: AttendanceRecord,
    },
}

/// Row to insert on the first event of a work date.
#[derive(Debug, Clone)]
pub struct NewAttendanceRecord {
    pub user_id: u64,
    pub clinic_id: u64,
    pub work_date: NaiveDate,
    pub check_in_time: Option<NaiveDateTime>,
    pub scheduled_start: Option<NaiveDateTime>,
    pub scheduled_end: Option<NaiveDateTime>,
    pub status: AttendanceStatus,
    pub late_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct CheckInUpdate {
    pub check_in_time: NaiveDateTime,
    pub scheduled_start: Option<NaiveDateTime>,
    pub scheduled_end: Option<NaiveDateTime>,
    pub status: AttendanceStatus,
    pub late_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct CheckOutUpdate {
    pub check_out_time: NaiveDateTime,
    pub status: AttendanceStatus,
    pub early_leave_minutes: i64,
    pub overtime_minutes: i64,
    pub total_work_minutes: i64,
}

impl NewAttendanceRecord {
    pub fn checked_in(user_id: u64, clinic_id: u64, work_date: NaiveDate, check_in: CheckInUpdate) -> Self {
        Self {
            user_id,
            clinic_id,
            work_date,
            check_in_time: Some(check_in.check_in_time),
            scheduled_start: check_in.scheduled_start,
            scheduled_end: check_in.scheduled_end,
            status: check_in.status,
            late_minutes: check_in.late_minutes,
        }
    }

    pub fn day_marker(user_id: u64, clinic_id: u64, work_date: NaiveDate, status: AttendanceStatus) -> Self {
        Self {
            user_id,
            clinic_id,
            work_date,
            check_in_time: None,
            scheduled_start: None,
            scheduled_end: None,
            status,
            late_minutes: 0,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct AttendanceRow {
    pub id: u64,
    pub user_id: u64,
    pub clinic_id: u64,
    pub work_date: NaiveDate,
    pub check_in_time: Option<NaiveDateTime>,
    pub check_out_time: Option<NaiveDateTime>,
    pub scheduled_start: Option<NaiveDateTime>,
    pub scheduled_end: Option<NaiveDateTime>,
    pub status: String,
    pub late_minutes: i64,
    pub early_leave_minutes: i64,
    pub overtime_minutes: i64,
    pub total_work_minutes: i64,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = strum::ParseError;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        Ok(AttendanceRecord {
            id: row.id,
            user_id: row.user_id,
            clinic_id: row.clinic_id,
            work_date: row.work_date,
            check_in_time: row.check_in_time,
            check_out_time: row.check_out_time,
            scheduled_start: row.scheduled_start,
            scheduled_end: row.scheduled_end,
            status: row.status.parse()?,
            late_minutes: row.late_minutes,
            early_leave_minutes: row.early_leave_minutes,
            overtime_minutes: row.overtime_minutes,
            total_work_minutes: row.total_work_minutes,
        })
    }
}
