use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{MySqlConnection, MySqlPool};

use super::{AttendanceStore, StoreError, StoreResult};
use crate::model::{
    attendance::{
        AttendanceRecord, AttendanceRow, AttendanceStatus, CheckInUpdate, CheckOutUpdate,
        NewAttendanceRecord,
    },
    membership::{ClinicMembership, MembershipRow},
    qr_code::{NewQrCode, QrCode, QrCodeRow},
    schedule::{NewSchedule, Schedule, ScheduleRow, ScheduleScope, weekday_index},
    statistics::MonthlyStatistics,
};

const QR_COLUMNS: &str = r#"
    id, clinic_id, code, anchor_latitude, anchor_longitude, radius_meters,
    refresh_period, valid_date, valid_until, created_at, is_active
"#;

const RECORD_COLUMNS: &str = r#"
    id, user_id, clinic_id, work_date, check_in_time, check_out_time,
    scheduled_start, scheduled_end, status, late_minutes, early_leave_minutes,
    overtime_minutes, total_work_minutes
"#;

const SCHEDULE_COLUMNS: &str = r#"
    id, clinic_id, user_id, day_of_week, specific_date, start_time, end_time, is_day_off
"#;

/// MySQL-backed store. Uniqueness of `(user_id, work_date)` and of the active
/// QR code per clinic is enforced by the schema in `migrations/`.
#[derive(Clone)]
pub struct MySqlAttendanceStore {
    pool: MySqlPool,
}

impl MySqlAttendanceStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

// Writes read their row back on the same transaction before commit, so a failed
// read-back rolls the write back and a retry starts from a clean slate.

async fn fetch_qr_code(conn: &mut MySqlConnection, id: u64) -> StoreResult<QrCode> {
    let sql = format!("SELECT {QR_COLUMNS} FROM qr_codes WHERE id = ?");
    let row = sqlx::query_as::<_, QrCodeRow>(&sql)
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(row.try_into()?)
}

async fn fetch_record(conn: &mut MySqlConnection, id: u64) -> StoreResult<AttendanceRecord> {
    let sql = format!("SELECT {RECORD_COLUMNS} FROM attendance_records WHERE id = ?");
    let row = sqlx::query_as::<_, AttendanceRow>(&sql)
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(row.try_into()?)
}

async fn fetch_schedule(conn: &mut MySqlConnection, id: u64) -> StoreResult<Schedule> {
    let sql = format!("SELECT {SCHEDULE_COLUMNS} FROM work_schedules WHERE id = ?");
    let row = sqlx::query_as::<_, ScheduleRow>(&sql)
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    row.into_schedule()
        .ok_or_else(|| StoreError::Other(format!("schedule {id} has no scope")))
}

#[async_trait]
impl AttendanceStore for MySqlAttendanceStore {
    async fn find_membership(&self, user_id: u64, clinic_id: u64) -> StoreResult<Option<ClinicMembership>> {
        let row = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT user_id, clinic_id, role_id, is_active
            FROM clinic_members
            WHERE user_id = ? AND clinic_id = ?
            "#,
        )
        .bind(user_id)
        .bind(clinic_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(MembershipRow::into_membership))
    }

    async fn list_active_members(&self, clinic_id: u64) -> StoreResult<Vec<ClinicMembership>> {
        let rows = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT user_id, clinic_id, role_id, is_active
            FROM clinic_members
            WHERE clinic_id = ? AND is_active = TRUE
            ORDER BY user_id
            "#,
        )
        .bind(clinic_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().filter_map(MembershipRow::into_membership).collect())
    }

    async fn find_active_qr_code(&self, clinic_id: u64) -> StoreResult<Option<QrCode>> {
        let sql = format!(
            "SELECT {QR_COLUMNS} FROM qr_codes WHERE clinic_id = ? AND is_active = TRUE LIMIT 1"
        );
        let row = sqlx::query_as::<_, QrCodeRow>(&sql)
            .bind(clinic_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(QrCode::try_from).transpose().map_err(StoreError::from)
    }

    async fn replace_active_qr_code(&self, code: NewQrCode) -> StoreResult<QrCode> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE qr_codes SET is_active = FALSE WHERE clinic_id = ? AND is_active = TRUE")
            .bind(code.clinic_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query(
            r#"
            INSERT INTO qr_codes
                (clinic_id, code, anchor_latitude, anchor_longitude, radius_meters,
                 refresh_period, valid_date, valid_until, created_at, is_active)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, TRUE)
            "#,
        )
        .bind(code.clinic_id)
        .bind(&code.code)
        .bind(code.anchor.map(|a| a.latitude))
        .bind(code.anchor.map(|a| a.longitude))
        .bind(code.radius_meters)
        .bind(code.refresh_period.as_ref())
        .bind(code.valid_date)
        .bind(code.valid_until)
        .bind(code.created_at)
        .execute(&mut *tx)
        .await?;

        let saved = fetch_qr_code(&mut tx, result.last_insert_id()).await?;
        tx.commit().await?;
        Ok(saved)
    }

    async fn list_schedules(&self, clinic_id: u64, user_id: u64) -> StoreResult<Vec<Schedule>> {
        let sql = format!(
            "SELECT {SCHEDULE_COLUMNS} FROM work_schedules \
             WHERE clinic_id = ? AND (user_id = ? OR user_id IS NULL) ORDER BY id"
        );
        let rows = sqlx::query_as::<_, ScheduleRow>(&sql)
            .bind(clinic_id)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().filter_map(ScheduleRow::into_schedule).collect())
    }

    async fn upsert_schedule(&self, schedule: NewSchedule) -> StoreResult<Schedule> {
        let (day_of_week, specific_date) = match schedule.scope {
            ScheduleScope::Weekly { day_of_week } => (Some(weekday_index(day_of_week)), None),
            ScheduleScope::SpecificDate { date } => (None, Some(date)),
        };

        let mut tx = self.pool.begin().await?;

        // `<=>` is MySQL's NULL-safe equality
        sqlx::query(
            r#"
            DELETE FROM work_schedules
            WHERE clinic_id = ?
            AND user_id <=> ?
            AND day_of_week <=> ?
            AND specific_date <=> ?
            "#,
        )
        .bind(schedule.clinic_id)
        .bind(schedule.user_id)
        .bind(day_of_week)
        .bind(specific_date)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(
            r#"
            INSERT INTO work_schedules
                (clinic_id, user_id, day_of_week, specific_date, start_time, end_time, is_day_off)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(schedule.clinic_id)
        .bind(schedule.user_id)
        .bind(day_of_week)
        .bind(specific_date)
        .bind(schedule.start_time)
        .bind(schedule.end_time)
        .bind(schedule.is_day_off)
        .execute(&mut *tx)
        .await?;

        let saved = fetch_schedule(&mut tx, result.last_insert_id()).await?;
        tx.commit().await?;
        Ok(saved)
    }

    async fn find_record(&self, user_id: u64, work_date: NaiveDate) -> StoreResult<Option<AttendanceRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM attendance_records WHERE user_id = ? AND work_date = ?"
        );
        let row = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(user_id)
            .bind(work_date)
            .fetch_optional(&self.pool)
            .await?;

        row.map(AttendanceRecord::try_from)
            .transpose()
            .map_err(StoreError::from)
    }

    async fn insert_record(&self, record: NewAttendanceRecord) -> StoreResult<AttendanceRecord> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO attendance_records
                (user_id, clinic_id, work_date, check_in_time, scheduled_start,
                 scheduled_end, status, late_minutes)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.user_id)
        .bind(record.clinic_id)
        .bind(record.work_date)
        .bind(record.check_in_time)
        .bind(record.scheduled_start)
        .bind(record.scheduled_end)
        .bind(record.status.as_ref())
        .bind(record.late_minutes)
        .execute(&mut *tx)
        .await?;

        let saved = fetch_record(&mut tx, result.last_insert_id()).await?;
        tx.commit().await?;
        Ok(saved)
    }

    async fn record_check_in(&self, id: u64, update: CheckInUpdate) -> StoreResult<Option<AttendanceRecord>> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE attendance_records
            SET check_in_time = ?, scheduled_start = ?, scheduled_end = ?,
                status = ?, late_minutes = ?
            WHERE id = ?
            AND check_in_time IS NULL
            "#,
        )
        .bind(update.check_in_time)
        .bind(update.scheduled_start)
        .bind(update.scheduled_end)
        .bind(update.status.as_ref())
        .bind(update.late_minutes)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let saved = fetch_record(&mut tx, id).await?;
        tx.commit().await?;
        Ok(Some(saved))
    }

    async fn record_check_out(&self, id: u64, update: CheckOutUpdate) -> StoreResult<Option<AttendanceRecord>> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE attendance_records
            SET check_out_time = ?, status = ?, early_leave_minutes = ?,
                overtime_minutes = ?, total_work_minutes = ?
            WHERE id = ?
            AND check_in_time IS NOT NULL
            AND check_out_time IS NULL
            "#,
        )
        .bind(update.check_out_time)
        .bind(update.status.as_ref())
        .bind(update.early_leave_minutes)
        .bind(update.overtime_minutes)
        .bind(update.total_work_minutes)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let saved = fetch_record(&mut tx, id).await?;
        tx.commit().await?;
        Ok(Some(saved))
    }

    async fn set_day_status(&self, id: u64, status: AttendanceStatus) -> StoreResult<Option<AttendanceRecord>> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE attendance_records
            SET status = ?
            WHERE id = ?
            AND check_in_time IS NULL
            "#,
        )
        .bind(status.as_ref())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let saved = fetch_record(&mut tx, id).await?;
        tx.commit().await?;
        Ok(Some(saved))
    }

    async fn list_records(
        &self,
        user_id: u64,
        clinic_id: u64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM attendance_records \
             WHERE user_id = ? AND clinic_id = ? AND work_date BETWEEN ? AND ? ORDER BY work_date"
        );
        let rows = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(user_id)
            .bind(clinic_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| AttendanceRecord::try_from(row).map_err(StoreError::from))
            .collect()
    }

    async fn replace_monthly_statistics(&self, stats: &MonthlyStatistics) -> StoreResult<()> {
        sqlx::query(
            r#"
            REPLACE INTO monthly_statistics
                (user_id, clinic_id, year, month, total_work_days, present_days,
                 absent_days, leave_days, holiday_days, late_count, total_late_minutes,
                 early_leave_count, total_early_leave_minutes, overtime_count,
                 total_overtime_minutes, attendance_rate, avg_work_minutes_per_day,
                 last_calculated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(stats.user_id)
        .bind(stats.clinic_id)
        .bind(stats.year)
        .bind(stats.month)
        .bind(stats.total_work_days)
        .bind(stats.present_days)
        .bind(stats.absent_days)
        .bind(stats.leave_days)
        .bind(stats.holiday_days)
        .bind(stats.late_count)
        .bind(stats.total_late_minutes)
        .bind(stats.early_leave_count)
        .bind(stats.total_early_leave_minutes)
        .bind(stats.overtime_count)
        .bind(stats.total_overtime_minutes)
        .bind(stats.attendance_rate)
        .bind(stats.avg_work_minutes_per_day)
        .bind(stats.last_calculated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_monthly_statistics(
        &self,
        user_id: u64,
        clinic_id: u64,
        year: i32,
        month: i32,
    ) -> StoreResult<Option<MonthlyStatistics>> {
        let stats = sqlx::query_as::<_, MonthlyStatistics>(
            r#"
            SELECT user_id, clinic_id, year, month, total_work_days, present_days,
                   absent_days, leave_days, holiday_days, late_count, total_late_minutes,
                   early_leave_count, total_early_leave_minutes, overtime_count,
                   total_overtime_minutes, attendance_rate, avg_work_minutes_per_day,
                   last_calculated_at
            FROM monthly_statistics
            WHERE user_id = ? AND clinic_id = ? AND year = ? AND month = ?
            "#,
        )
        .bind(user_id)
        .bind(clinic_id)
        .bind(year)
        .bind(month)
        .fetch_optional(&self.pool)
        .await?;

        Ok(stats)
    }
}
