use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;

use super::{AttendanceStore, StoreError, StoreResult};
use crate::model::{
    attendance::{AttendanceRecord, AttendanceStatus, CheckInUpdate, CheckOutUpdate, NewAttendanceRecord},
    membership::ClinicMembership,
    qr_code::{NewQrCode, QrCode},
    role::Role,
    schedule::{NewSchedule, Schedule},
    statistics::MonthlyStatistics,
};

#[derive(Default, Clone)]
struct State {
    next_id: u64,
    members: Vec<ClinicMembership>,
    qr_codes: Vec<QrCode>,
    schedules: Vec<Schedule>,
    records: Vec<AttendanceRecord>,
    statistics: Vec<MonthlyStatistics>,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn push_record(&mut self, record: NewAttendanceRecord) -> StoreResult<AttendanceRecord> {
        if self
            .records
            .iter()
            .any(|r| r.user_id == record.user_id && r.work_date == record.work_date)
        {
            return Err(StoreError::UniqueViolation(
                "attendance_records.uq_attendance_user_date".to_string(),
            ));
        }
        let id = self.next_id();
        let created = AttendanceRecord {
            id,
            user_id: record.user_id,
            clinic_id: record.clinic_id,
            work_date: record.work_date,
            check_in_time: record.check_in_time,
            check_out_time: None,
            scheduled_start: record.scheduled_start,
            scheduled_end: record.scheduled_end,
            status: record.status,
            late_minutes: record.late_minutes,
            early_leave_minutes: 0,
            overtime_minutes: 0,
            total_work_minutes: 0,
        };
        self.records.push(created.clone());
        Ok(created)
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// In-process store with the same constraints as the MySQL schema.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    transient_failures: AtomicU32,
    failures_after_write: AtomicU32,
    competing_insert: Mutex<Option<NewAttendanceRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_member(&self, user_id: u64, clinic_id: u64, role: Role, is_active: bool) {
        self.state.lock().unwrap().members.push(ClinicMembership {
            user_id,
            clinic_id,
            role,
            is_active,
        });
    }

    /// The next `count` calls fail with a transient error.
    pub fn fail_next(&self, count: u32) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }

    /// The next `count` writes are applied and then fail with a transient error.
    /// As in a transaction whose read-back failed, the write is rolled back; ids
    /// already handed out stay consumed, like `AUTO_INCREMENT`.
    pub fn fail_after_write(&self, count: u32) {
        self.failures_after_write.store(count, Ordering::SeqCst);
    }

    /// A concurrent request commits `record` just before the next `insert_record` runs.
    pub fn race_next_insert(&self, record: NewAttendanceRecord) {
        *self.competing_insert.lock().unwrap() = Some(record);
    }

    pub fn records(&self) -> Vec<AttendanceRecord> {
        self.state.lock().unwrap().records.clone()
    }

    pub fn qr_codes(&self) -> Vec<QrCode> {
        self.state.lock().unwrap().qr_codes.clone()
    }

    pub fn statistics_rows(&self) -> Vec<MonthlyStatistics> {
        self.state.lock().unwrap().statistics.clone()
    }

    fn check_fault(&self) -> StoreResult<()> {
        if take_one(&self.transient_failures) {
            return Err(StoreError::Transient("connection reset".to_string()));
        }
        Ok(())
    }

    /// Finishes a write started from `snapshot`, honouring `fail_after_write`.
    fn commit<T>(&self, state: &mut State, snapshot: State, saved: T) -> StoreResult<T> {
        if take_one(&self.failures_after_write) {
            let next_id = state.next_id;
            *state = snapshot;
            state.next_id = next_id;
            return Err(StoreError::Transient("connection lost before commit".to_string()));
        }
        Ok(saved)
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn find_membership(&self, user_id: u64, clinic_id: u64) -> StoreResult<Option<ClinicMembership>> {
        self.check_fault()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .members
            .iter()
            .find(|m| m.user_id == user_id && m.clinic_id == clinic_id)
            .cloned())
    }

    async fn list_active_members(&self, clinic_id: u64) -> StoreResult<Vec<ClinicMembership>> {
        self.check_fault()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .members
            .iter()
            .filter(|m| m.clinic_id == clinic_id && m.is_active)
            .cloned()
            .collect())
    }

    async fn find_active_qr_code(&self, clinic_id: u64) -> StoreResult<Option<QrCode>> {
        self.check_fault()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .qr_codes
            .iter()
            .find(|c| c.clinic_id == clinic_id && c.active)
            .cloned())
    }

    async fn replace_active_qr_code(&self, code: NewQrCode) -> StoreResult<QrCode> {
        self.check_fault()?;
        let mut state = self.state.lock().unwrap();
        let snapshot = state.clone();
        if state.qr_codes.iter().any(|c| c.code == code.code) {
            return Err(StoreError::UniqueViolation("qr_codes.code".to_string()));
        }
        for existing in state.qr_codes.iter_mut().filter(|c| c.clinic_id == code.clinic_id) {
            existing.active = false;
        }
        let id = state.next_id();
        let created = QrCode {
            id,
            clinic_id: code.clinic_id,
            code: code.code,
            anchor: code.anchor,
            radius_meters: code.radius_meters,
            refresh_period: code.refresh_period,
            valid_date: code.valid_date,
            valid_until: code.valid_until,
            created_at: code.created_at,
            active: true,
        };
        state.qr_codes.push(created.clone());
        self.commit(&mut state, snapshot, created)
    }

    async fn list_schedules(&self, clinic_id: u64, user_id: u64) -> StoreResult<Vec<Schedule>> {
        self.check_fault()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .schedules
            .iter()
            .filter(|s| s.clinic_id == clinic_id && s.user_id.is_none_or(|u| u == user_id))
            .cloned()
            .collect())
    }

    async fn upsert_schedule(&self, schedule: NewSchedule) -> StoreResult<Schedule> {
        self.check_fault()?;
        let mut state = self.state.lock().unwrap();
        let snapshot = state.clone();
        state.schedules.retain(|s| {
            !(s.clinic_id == schedule.clinic_id
                && s.user_id == schedule.user_id
                && s.scope == schedule.scope)
        });
        let id = state.next_id();
        let created = Schedule {
            id,
            clinic_id: schedule.clinic_id,
            user_id: schedule.user_id,
            scope: schedule.scope,
            start_time: schedule.start_time,
            end_time: schedule.end_time,
            is_day_off: schedule.is_day_off,
        };
        state.schedules.push(created.clone());
        self.commit(&mut state, snapshot, created)
    }

    async fn find_record(&self, user_id: u64, work_date: NaiveDate) -> StoreResult<Option<AttendanceRecord>> {
        self.check_fault()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .records
            .iter()
            .find(|r| r.user_id == user_id && r.work_date == work_date)
            .cloned())
    }

    async fn insert_record(&self, record: NewAttendanceRecord) -> StoreResult<AttendanceRecord> {
        self.check_fault()?;
        let mut state = self.state.lock().unwrap();
        if let Some(competitor) = self.competing_insert.lock().unwrap().take() {
            state.push_record(competitor)?;
        }
        let snapshot = state.clone();
        let created = state.push_record(record)?;
        self.commit(&mut state, snapshot, created)
    }

    async fn record_check_in(&self, id: u64, update: CheckInUpdate) -> StoreResult<Option<AttendanceRecord>> {
        self.check_fault()?;
        let mut state = self.state.lock().unwrap();
        let snapshot = state.clone();
        let Some(record) = state
            .records
            .iter_mut()
            .find(|r| r.id == id && r.check_in_time.is_none())
        else {
            return Ok(None);
        };
        record.check_in_time = Some(update.check_in_time);
        record.scheduled_start = update.scheduled_start;
        record.scheduled_end = update.scheduled_end;
        record.status = update.status;
        record.late_minutes = update.late_minutes;
        let saved = record.clone();
        self.commit(&mut state, snapshot, Some(saved))
    }

    async fn record_check_out(&self, id: u64, update: CheckOutUpdate) -> StoreResult<Option<AttendanceRecord>> {
        self.check_fault()?;
        let mut state = self.state.lock().unwrap();
        let snapshot = state.clone();
        let Some(record) = state
            .records
            .iter_mut()
            .find(|r| r.id == id && r.check_in_time.is_some() && r.check_out_time.is_none())
        else {
            return Ok(None);
        };
        record.check_out_time = Some(update.check_out_time);
        record.status = update.status;
        record.early_leave_minutes = update.early_leave_minutes;
        record.overtime_minutes = update.overtime_minutes;
        record.total_work_minutes = update.total_work_minutes;
        let saved = record.clone();
        self.commit(&mut state, snapshot, Some(saved))
    }

    async fn set_day_status(&self, id: u64, status: AttendanceStatus) -> StoreResult<Option<AttendanceRecord>> {
        self.check_fault()?;
        let mut state = self.state.lock().unwrap();
        let snapshot = state.clone();
        let Some(record) = state
            .records
            .iter_mut()
            .find(|r| r.id == id && r.check_in_time.is_none())
        else {
            return Ok(None);
        };
        record.status = status;
        let saved = record.clone();
        self.commit(&mut state, snapshot, Some(saved))
    }

    async fn list_records(
        &self,
        user_id: u64,
        clinic_id: u64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        self.check_fault()?;
        let state = self.state.lock().unwrap();
        let mut records: Vec<_> = state
            .records
            .iter()
            .filter(|r| {
                r.user_id == user_id && r.clinic_id == clinic_id && r.work_date >= from && r.work_date <= to
            })
            .cloned()
            .collect();
        records.sort_by_key(|r| r.work_date);
        Ok(records)
    }

    async fn replace_monthly_statistics(&self, stats: &MonthlyStatistics) -> StoreResult<()> {
        self.check_fault()?;
        let mut state = self.state.lock().unwrap();
        state.statistics.retain(|s| {
            !(s.user_id == stats.user_id
                && s.clinic_id == stats.clinic_id
                && s.year == stats.year
                && s.month == stats.month)
        });
        state.statistics.push(stats.clone());
        Ok(())
    }

    async fn find_monthly_statistics(
        &self,
        user_id: u64,
        clinic_id: u64,
        year: i32,
        month: i32,
    ) -> StoreResult<Option<MonthlyStatistics>> {
        self.check_fault()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .statistics
            .iter()
            .find(|s| s.user_id == user_id && s.clinic_id == clinic_id && s.year == year && s.month == month)
            .cloned())
    }
}
