use async_trait::async_trait;
use chrono::NaiveDate;
use derive_more::Display;

use crate::model::{
    attendance::{AttendanceRecord, AttendanceStatus, CheckInUpdate, CheckOutUpdate, NewAttendanceRecord},
    membership::ClinicMembership,
    qr_code::{NewQrCode, QrCode},
    schedule::{NewSchedule, Schedule},
    statistics::MonthlyStatistics,
};

#[cfg(test)]
pub mod memory;
pub mod mysql;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Display, Clone, PartialEq)]
pub enum StoreError {
    /// Connection-level failure; safe to retry.
    #[display(fmt = "transient store error: {}", _0)]
    Transient(String),

    #[display(fmt = "unique constraint violated: {}", _0)]
    UniqueViolation(String),

    #[display(fmt = "store error: {}", _0)]
    Other(String),
}

impl std::error::Error for StoreError {}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::UniqueViolation(db_err.message().to_string())
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Transient(err.to_string()),
            _ => StoreError::Other(err.to_string()),
        }
    }
}

impl From<strum::ParseError> for StoreError {
    fn from(err: strum::ParseError) -> Self {
        StoreError::Other(format!("unreadable enum column: {err}"))
    }
}

/// Persistence seam for the attendance subsystem.
///
/// Every call names its tenant (`clinic_id`) or user explicitly; implementations
/// must not rely on ambient session state. A call that returns an error leaves
/// nothing written, so callers may retry it.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn find_membership(&self, user_id: u64, clinic_id: u64) -> StoreResult<Option<ClinicMembership>>;

    async fn list_active_members(&self, clinic_id: u64) -> StoreResult<Vec<ClinicMembership>>;

    /// The clinic's single `active` code, whatever its window.
    async fn find_active_qr_code(&self, clinic_id: u64) -> StoreResult<Option<QrCode>>;

    /// Deactivates the clinic's current code and inserts `code` in one atomic write.
    async fn replace_active_qr_code(&self, code: NewQrCode) -> StoreResult<QrCode>;

    /// A user's own entries plus the clinic-wide defaults.
    async fn list_schedules(&self, clinic_id: u64, user_id: u64) -> StoreResult<Vec<Schedule>>;

    /// Replaces the entry with the same clinic, user and scope.
    async fn upsert_schedule(&self, schedule: NewSchedule) -> StoreResult<Schedule>;

    async fn find_record(&self, user_id: u64, work_date: NaiveDate) -> StoreResult<Option<AttendanceRecord>>;

    /// Fails with `UniqueViolation` when `(user_id, work_date)` already exists.
    async fn insert_record(&self, record: NewAttendanceRecord) -> StoreResult<AttendanceRecord>;

    /// Applies only while `check_in_time` is still null; `None` otherwise.
    async fn record_check_in(&self, id: u64, update: CheckInUpdate) -> StoreResult<Option<AttendanceRecord>>;

    /// Applies only while checked in and not yet checked out; `None` otherwise.
    async fn record_check_out(&self, id: u64, update: CheckOutUpdate) -> StoreResult<Option<AttendanceRecord>>;

    /// Applies only while `check_in_time` is still null; `None` otherwise.
    async fn set_day_status(&self, id: u64, status: AttendanceStatus) -> StoreResult<Option<AttendanceRecord>>;

    /// Records the user holds in `clinic_id` with `work_date` in `from..=to`.
    async fn list_records(
        &self,
        user_id: u64,
        clinic_id: u64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<AttendanceRecord>>;

    async fn replace_monthly_statistics(&self, stats: &MonthlyStatistics) -> StoreResult<()>;

    async fn find_monthly_statistics(
        &self,
        user_id: u64,
        clinic_id: u64,
        year: i32,
        month: i32,
    ) -> StoreResult<Option<MonthlyStatistics>>;
}
