use std::sync::Arc;

use chrono::{Days, NaiveDate, NaiveDateTime};
use tracing::{error, info, instrument, warn};

use crate::error::{AttendanceError, AttendanceResult};
use crate::model::attendance::{
    AttendanceRecord, AttendanceStatus, CheckInUpdate, CheckOutUpdate, NewAttendanceRecord,
    TodayAttendance,
};
use crate::model::membership::ClinicMembership;
use crate::model::qr_code::QrCode;
use crate::model::schedule::ShiftWindow;
use crate::service::clock::Clock;
use crate::service::geofence::{self, GeolocationOutcome};
use crate::service::membership;
use crate::service::qr_code::QrCodeManager;
use crate::service::schedule;
use crate::store::{AttendanceStore, StoreError};
use crate::utils::retry::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanKind {
    CheckIn,
    CheckOut,
}

/// Longest history window served by `list_records`.
pub const MAX_HISTORY_DAYS: i64 = 366;

/// One QR scan, as submitted by a staff device.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub user_id: u64,
    pub clinic_id: u64,
    pub qr_code: String,
    pub work_date: NaiveDate,
    pub location: Option<GeolocationOutcome>,
}

/// Drives `NOT_CHECKED_IN -> CHECKED_IN -> CHECKED_OUT` per `(user, work_date)`.
pub struct AttendanceService {
    store: Arc<dyn AttendanceStore>,
    clock: Arc<dyn Clock>,
    qr_codes: Arc<QrCodeManager>,
    retry: RetryPolicy,
    require_location: bool,
}

impl AttendanceService {
    pub fn new(
        store: Arc<dyn AttendanceStore>,
        clock: Arc<dyn Clock>,
        qr_codes: Arc<QrCodeManager>,
        retry: RetryPolicy,
        require_location: bool,
    ) -> Self {
        Self {
            store,
            clock,
            qr_codes,
            retry,
            require_location,
        }
    }

    #[instrument(
        name = "attendance_check_in",
        skip(self, req),
        fields(user_id = req.user_id, clinic_id = req.clinic_id, work_date = %req.work_date)
    )]
    pub async fn check_in(&self, req: ScanRequest) -> AttendanceResult<AttendanceRecord> {
        let now = self.clock.now();
        self.validate_scan(&req, ScanKind::CheckIn, now).await?;

        let store = self.store.as_ref();
        let (user_id, clinic_id, work_date) = (req.user_id, req.clinic_id, req.work_date);

        let existing = self
            .retry
            .run("find_record", move || store.find_record(user_id, work_date))
            .await?;
        if existing.as_ref().is_some_and(|r| r.check_in_time.is_some()) {
            info!("Duplicate check-in rejected");
            return Err(AttendanceError::AlreadyCheckedIn);
        }

        let schedules = self
            .retry
            .run("list_schedules", move || store.list_schedules(clinic_id, user_id))
            .await?;
        let update = check_in_update(schedule::resolve(&schedules, user_id, work_date), work_date, now);

        let saved = match existing {
            Some(record) => {
                let id = record.id;
                self.retry
                    .run("record_check_in", move || store.record_check_in(id, update.clone()))
                    .await?
                    .ok_or(AttendanceError::AlreadyCheckedIn)?
            }
            None => {
                let new_record = NewAttendanceRecord::checked_in(user_id, clinic_id, work_date, update);
                match self
                    .retry
                    .run("insert_record", move || store.insert_record(new_record.clone()))
                    .await
                {
                    Ok(record) => record,
                    // lost the race against a concurrent check-in for the same day
                    Err(StoreError::UniqueViolation(_)) => {
                        info!("Concurrent check-in detected");
                        return Err(AttendanceError::AlreadyCheckedIn);
                    }
                    Err(e) => {
                        error!(error = %e, "Check-in failed");
                        return Err(e.into());
                    }
                }
            }
        };

        info!(
            record_id = saved.id,
            status = saved.status.as_ref(),
            late_minutes = saved.late_minutes,
            "Checked in"
        );
        Ok(saved)
    }

    #[instrument(
        name = "attendance_check_out",
        skip(self, req),
        fields(user_id = req.user_id, clinic_id = req.clinic_id, work_date = %req.work_date)
    )]
    pub async fn check_out(&self, req: ScanRequest) -> AttendanceResult<AttendanceRecord> {
        let now = self.clock.now();
        self.validate_scan(&req, ScanKind::CheckOut, now).await?;

        let store = self.store.as_ref();
        let (user_id, work_date) = (req.user_id, req.work_date);

        let record = self
            .retry
            .run("find_record", move || store.find_record(user_id, work_date))
            .await?
            .ok_or(AttendanceError::NotCheckedInYet)?;

        let Some(check_in_time) = record.check_in_time else {
            return Err(AttendanceError::NotCheckedInYet);
        };
        if record.check_out_time.is_some() {
            return Err(AttendanceError::AlreadyCheckedOut);
        }
        if now < check_in_time {
            return Err(AttendanceError::validation("Check-out cannot precede check-in"));
        }

        let update = check_out_update(&record, check_in_time, now);
        let id = record.id;
        let saved = self
            .retry
            .run("record_check_out", move || store.record_check_out(id, update.clone()))
            .await
            .inspect_err(|e| error!(error = %e, record_id = id, "Check-out failed"))?
            // a concurrent check-out got there first
            .ok_or(AttendanceError::AlreadyCheckedOut)?;

        info!(
            record_id = saved.id,
            status = saved.status.as_ref(),
            early_leave_minutes = saved.early_leave_minutes,
            overtime_minutes = saved.overtime_minutes,
            total_work_minutes = saved.total_work_minutes,
            "Checked out"
        );
        Ok(saved)
    }

    pub async fn today(&self, user_id: u64) -> AttendanceResult<TodayAttendance> {
        let work_date = self.clock.today();
        let store = self.store.as_ref();
        let record = self
            .retry
            .run("find_record", move || store.find_record(user_id, work_date))
            .await?;

        Ok(match record {
            Some(record) => TodayAttendance::Recorded {
                phase: record.phase(),
                record,
            },
            None => TodayAttendance::NotCheckedIn { work_date },
        })
    }

    /// History of `user_id` inside `clinic_id`; the user must be a member there.
    pub async fn list_records(
        &self,
        user_id: u64,
        clinic_id: u64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AttendanceResult<Vec<AttendanceRecord>> {
        if from > to {
            return Err(AttendanceError::validation("from must not be after to"));
        }
        if (to - from).num_days() >= MAX_HISTORY_DAYS {
            return Err(AttendanceError::validation(format!(
                "date range must not exceed {MAX_HISTORY_DAYS} days"
            )));
        }

        self.require_membership(user_id, clinic_id).await?;

        let store = self.store.as_ref();
        Ok(self
            .retry
            .run("list_records", move || store.list_records(user_id, clinic_id, from, to))
            .await?)
    }

    /// Records absence, leave or a holiday for a day without a check-in.
    #[instrument(name = "attendance_mark_day", skip(self))]
    pub async fn mark_day_status(
        &self,
        user_id: u64,
        clinic_id: u64,
        work_date: NaiveDate,
        status: AttendanceStatus,
    ) -> AttendanceResult<AttendanceRecord> {
        if !status.is_day_marker() {
            return Err(AttendanceError::validation(
                "status must be one of absent, leave, holiday",
            ));
        }
        self.require_membership(user_id, clinic_id).await?;

        let store = self.store.as_ref();
        let existing = self
            .retry
            .run("find_record", move || store.find_record(user_id, work_date))
            .await?;

        let saved = match existing {
            Some(record) if record.check_in_time.is_some() => {
                return Err(AttendanceError::AlreadyCheckedIn);
            }
            Some(record) => {
                let id = record.id;
                self.retry
                    .run("set_day_status", move || store.set_day_status(id, status))
                    .await?
                    .ok_or(AttendanceError::AlreadyCheckedIn)?
            }
            None => {
                let new_record = NewAttendanceRecord::day_marker(user_id, clinic_id, work_date, status);
                match self
                    .retry
                    .run("insert_record", move || store.insert_record(new_record.clone()))
                    .await
                {
                    Ok(record) => record,
                    Err(StoreError::UniqueViolation(_)) => return Err(AttendanceError::AlreadyCheckedIn),
                    Err(e) => return Err(e.into()),
                }
            }
        };

        info!(record_id = saved.id, "Day status recorded");
        Ok(saved)
    }

    /// Membership, work date, QR token and geofence checks shared by both scans.
    async fn validate_scan(
        &self,
        req: &ScanRequest,
        kind: ScanKind,
        now: NaiveDateTime,
    ) -> AttendanceResult<QrCode> {
        if req.qr_code.trim().is_empty() {
            return Err(AttendanceError::validation("qr_code is required"));
        }

        let today = now.date();
        match kind {
            ScanKind::CheckIn if req.work_date != today => {
                return Err(AttendanceError::validation("work_date must be today for check-in"));
            }
            ScanKind::CheckOut => {
                // overnight shifts close on the following calendar day
                let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);
                if req.work_date != today && req.work_date != yesterday {
                    return Err(AttendanceError::validation(
                        "work_date must be today or yesterday for check-out",
                    ));
                }
            }
            ScanKind::CheckIn => {}
        }

        self.require_membership(req.user_id, req.clinic_id).await?;

        let location = geofence::resolve_location(req.location, self.require_location)?;
        let code = self
            .qr_codes
            .validate_scan(req.clinic_id, req.qr_code.trim(), req.work_date)
            .await?;

        let check = geofence::validate(code.anchor, code.radius_meters, location);
        if !check.location_verified {
            warn!(
                location_verified = false,
                anchored = code.anchor.is_some(),
                "Attendance scan without verified location"
            );
        }
        if !check.pass {
            let distance_meters = check.distance_meters.unwrap_or_default();
            warn!(distance_meters, radius_meters = code.radius_meters, "Geofence violation");
            return Err(AttendanceError::GeofenceViolation {
                distance_meters,
                radius_meters: code.radius_meters,
            });
        }

        Ok(code)
    }

    async fn require_membership(&self, user_id: u64, clinic_id: u64) -> AttendanceResult<ClinicMembership> {
        membership::require_active_member(self.store.as_ref(), &self.retry, user_id, clinic_id).await
    }
}

/// Whole minutes from `from` to `to`, clamped at zero.
fn minutes_after(from: NaiveDateTime, to: NaiveDateTime) -> i64 {
    (to - from).num_minutes().max(0)
}

fn check_in_update(shift: Option<ShiftWindow>, work_date: NaiveDate, now: NaiveDateTime) -> CheckInUpdate {
    let scheduled_start = shift.map(|s| s.starts_on(work_date));
    let scheduled_end = shift.map(|s| s.ends_on(work_date));
    let late_minutes = scheduled_start.map_or(0, |start| minutes_after(start, now));

    CheckInUpdate {
        check_in_time: now,
        scheduled_start,
        scheduled_end,
        status: if late_minutes > 0 {
            AttendanceStatus::Late
        } else {
            AttendanceStatus::Present
        },
        late_minutes,
    }
}

fn check_out_update(record: &AttendanceRecord, check_in_time: NaiveDateTime, now: NaiveDateTime) -> CheckOutUpdate {
    let (early_leave_minutes, overtime_minutes) = match record.scheduled_end {
        Some(end) => (minutes_after(now, end), minutes_after(end, now)),
        None => (0, 0),
    };

    // the latest anomaly wins: leaving early overrides an earlier `late`
    let status = if early_leave_minutes > 0 {
        AttendanceStatus::EarlyLeave
    } else {
        record.status
    };

    CheckOutUpdate {
        check_out_time: now,
        status,
        early_leave_minutes,
        overtime_minutes,
        total_work_minutes: minutes_after(check_in_time, now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::AttendancePhase;
    use crate::model::qr_code::{Coordinates, RefreshPeriod};
    use crate::model::role::Role;
    use crate::model::schedule::{NewSchedule, ScheduleScope};
    use crate::service::clock::FixedClock;
    use crate::service::qr_code::GenerateQrCode;
    use crate::store::memory::MemoryStore;
    use crate::utils::qr_cache::QrCodeCache;
    use chrono::{NaiveTime, Weekday};
    use std::f64::consts::PI;
    use std::time::Duration;

    const USER: u64 = 7;
    const CLINIC: u64 = 10;

    struct Fixture {
        store: Arc<MemoryStore>,
        clock: Arc<FixedClock>,
        qr: Arc<QrCodeManager>,
        service: AttendanceService,
    }

    // 2026-03-02 is a Monday
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn at(date: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
        date.and_hms_opt(h, m, 0).unwrap()
    }

    fn fixture_with(require_location: bool) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        store.add_member(USER, CLINIC, Role::Staff, true);
        let clock = Arc::new(FixedClock::at(at(monday(), 8, 0)));
        let retry = RetryPolicy::new(3, Duration::from_millis(1));
        let qr = Arc::new(QrCodeManager::new(
            store.clone(),
            clock.clone(),
            QrCodeCache::new(Duration::from_secs(60)),
            retry,
        ));
        let service = AttendanceService::new(store.clone(), clock.clone(), qr.clone(), retry, require_location);
        Fixture {
            store,
            clock,
            qr,
            service,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(false)
    }

    impl Fixture {
        async fn weekday_shift(&self, start: u32, end: u32) {
            for day in [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri] {
                self.store
                    .upsert_schedule(NewSchedule {
                        clinic_id: CLINIC,
                        user_id: Some(USER),
                        scope: ScheduleScope::Weekly { day_of_week: day },
                        start_time: NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
                        end_time: NaiveTime::from_hms_opt(end, 0, 0).unwrap(),
                        is_day_off: false,
                    })
                    .await
                    .unwrap();
            }
        }

        async fn qr_code(&self, anchor: Option<Coordinates>) -> String {
            self.qr
                .generate(GenerateQrCode {
                    clinic_id: CLINIC,
                    anchor,
                    radius_meters: 100,
                    refresh_period: RefreshPeriod::Weekly,
                    force_regenerate: true,
                })
                .await
                .unwrap()
                .code
        }

        fn scan(&self, code: &str, location: Option<GeolocationOutcome>) -> ScanRequest {
            ScanRequest {
                user_id: USER,
                clinic_id: CLINIC,
                qr_code: code.to_string(),
                work_date: monday(),
                location,
            }
        }
    }

    fn located(c: Coordinates) -> Option<GeolocationOutcome> {
        Some(GeolocationOutcome::Located {
            latitude: c.latitude,
            longitude: c.longitude,
        })
    }

    fn meters_north(meters: f64) -> Coordinates {
        Coordinates::new(37.5 + meters / (geofence::EARTH_RADIUS_METERS * PI / 180.0), 127.0)
    }

    #[actix_web::test]
    async fn late_then_early_leave_scenario() {
        let f = fixture();
        f.weekday_shift(9, 18).await;
        let code = f.qr_code(None).await;

        f.clock.set(at(monday(), 9, 15));
        let record = f.service.check_in(f.scan(&code, None)).await.unwrap();
        assert_eq!(record.status, AttendanceStatus::Late);
        assert_eq!(record.late_minutes, 15);
        assert_eq!(record.scheduled_start, Some(at(monday(), 9, 0)));
        assert_eq!(record.check_out_time, None);

        f.clock.set(at(monday(), 17, 30));
        let record = f.service.check_out(f.scan(&code, None)).await.unwrap();
        assert_eq!(record.status, AttendanceStatus::EarlyLeave);
        assert_eq!(record.early_leave_minutes, 30);
        assert_eq!(record.overtime_minutes, 0);
        assert_eq!(record.late_minutes, 15);
        assert_eq!(record.total_work_minutes, 495);
        assert_eq!(record.phase(), AttendancePhase::CheckedOut);
    }

    #[actix_web::test]
    async fn on_time_with_overtime_keeps_present() {
        let f = fixture();
        f.weekday_shift(9, 18).await;
        let code = f.qr_code(None).await;

        f.clock.set(at(monday(), 8, 55));
        let record = f.service.check_in(f.scan(&code, None)).await.unwrap();
        assert_eq!(record.status, AttendanceStatus::Present);
        assert_eq!(record.late_minutes, 0);

        f.clock.set(at(monday(), 19, 10));
        let record = f.service.check_out(f.scan(&code, None)).await.unwrap();
        assert_eq!(record.status, AttendanceStatus::Present);
        assert_eq!(record.overtime_minutes, 70);
        assert_eq!(record.early_leave_minutes, 0);
    }

    #[actix_web::test]
    async fn late_status_survives_on_time_check_out() {
        let f = fixture();
        f.weekday_shift(9, 18).await;
        let code = f.qr_code(None).await;

        f.clock.set(at(monday(), 9, 40));
        f.service.check_in(f.scan(&code, None)).await.unwrap();
        f.clock.set(at(monday(), 18, 0));
        let record = f.service.check_out(f.scan(&code, None)).await.unwrap();
        assert_eq!(record.status, AttendanceStatus::Late);
        assert_eq!(record.overtime_minutes, 0);
    }

    #[actix_web::test]
    async fn without_schedule_check_in_is_present() {
        let f = fixture();
        let code = f.qr_code(None).await;

        f.clock.set(at(monday(), 11, 0));
        let record = f.service.check_in(f.scan(&code, None)).await.unwrap();
        assert_eq!(record.status, AttendanceStatus::Present);
        assert_eq!(record.late_minutes, 0);
        assert_eq!(record.scheduled_start, None);
        assert_eq!(record.scheduled_end, None);

        f.clock.set(at(monday(), 15, 0));
        let record = f.service.check_out(f.scan(&code, None)).await.unwrap();
        assert_eq!(record.early_leave_minutes, 0);
        assert_eq!(record.overtime_minutes, 0);
        assert_eq!(record.total_work_minutes, 240);
    }

    #[actix_web::test]
    async fn duplicate_check_in_creates_no_second_record() {
        let f = fixture();
        let code = f.qr_code(None).await;

        let first = f.service.check_in(f.scan(&code, None)).await.unwrap();
        f.clock.set(at(monday(), 8, 1));
        let second = f.service.check_in(f.scan(&code, None)).await;
        assert_eq!(second, Err(AttendanceError::AlreadyCheckedIn));

        let records = f.store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0], first);
    }

    #[actix_web::test]
    async fn check_out_is_terminal() {
        let f = fixture();
        let code = f.qr_code(None).await;
        f.service.check_in(f.scan(&code, None)).await.unwrap();

        f.clock.set(at(monday(), 17, 0));
        let done = f.service.check_out(f.scan(&code, None)).await.unwrap();

        f.clock.set(at(monday(), 18, 0));
        assert_eq!(
            f.service.check_out(f.scan(&code, None)).await,
            Err(AttendanceError::AlreadyCheckedOut)
        );
        assert_eq!(
            f.service.check_in(f.scan(&code, None)).await,
            Err(AttendanceError::AlreadyCheckedIn)
        );
        assert_eq!(f.store.records(), vec![done]);
    }

    #[actix_web::test]
    async fn check_out_before_check_in_fails() {
        let f = fixture();
        let code = f.qr_code(None).await;
        assert_eq!(
            f.service.check_out(f.scan(&code, None)).await,
            Err(AttendanceError::NotCheckedInYet)
        );
        assert!(f.store.records().is_empty());
    }

    #[actix_web::test]
    async fn geofence_rejects_distant_scan() {
        let f = fixture();
        let code = f.qr_code(Some(Coordinates::new(37.5, 127.0))).await;

        let far = f.service.check_in(f.scan(&code, located(meters_north(150.0)))).await;
        assert!(matches!(far, Err(AttendanceError::GeofenceViolation { radius_meters: 100, .. })));
        assert!(f.store.records().is_empty());

        let near = f.service.check_in(f.scan(&code, located(meters_north(50.0)))).await;
        assert!(near.is_ok());
    }

    #[actix_web::test]
    async fn missing_location_is_not_blocking_by_default() {
        let f = fixture();
        let code = f.qr_code(Some(Coordinates::new(37.5, 127.0))).await;
        let record = f
            .service
            .check_in(f.scan(&code, Some(GeolocationOutcome::TimedOut)))
            .await;
        assert!(record.is_ok());
    }

    #[actix_web::test]
    async fn required_location_turns_timeout_into_error() {
        let f = fixture_with(true);
        let code = f.qr_code(Some(Coordinates::new(37.5, 127.0))).await;
        let result = f
            .service
            .check_in(f.scan(&code, Some(GeolocationOutcome::TimedOut)))
            .await;
        assert!(matches!(result, Err(AttendanceError::Timeout(_))));
    }

    #[actix_web::test]
    async fn stale_token_after_regeneration_is_rejected() {
        let f = fixture();
        let old = f.qr_code(None).await;
        let new = f.qr_code(None).await;

        assert_eq!(
            f.service.check_in(f.scan(&old, None)).await,
            Err(AttendanceError::QrCodeExpiredOrMismatch)
        );
        assert!(f.service.check_in(f.scan(&new, None)).await.is_ok());
    }

    #[actix_web::test]
    async fn non_member_and_inactive_member_are_rejected() {
        let f = fixture();
        let code = f.qr_code(None).await;

        let mut stranger = f.scan(&code, None);
        stranger.user_id = 99;
        assert!(matches!(
            f.service.check_in(stranger).await,
            Err(AttendanceError::Authorization(_))
        ));

        f.store.add_member(8, CLINIC, Role::Staff, false);
        let mut inactive = f.scan(&code, None);
        inactive.user_id = 8;
        assert!(matches!(
            f.service.check_in(inactive).await,
            Err(AttendanceError::Authorization(_))
        ));
    }

    #[actix_web::test]
    async fn check_out_work_date_must_be_today_or_yesterday() {
        let f = fixture();
        let code = f.qr_code(None).await;
        f.service.check_in(f.scan(&code, None)).await.unwrap();

        let mut req = f.scan(&code, None);
        req.work_date = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        assert!(matches!(
            f.service.check_out(req).await,
            Err(AttendanceError::Validation(_))
        ));
    }

    #[actix_web::test]
    async fn backdated_check_in_is_rejected() {
        let f = fixture();
        let code = f.qr_code(None).await;

        // the weekly code still covers Monday, but the scan happens on Tuesday
        let tuesday = NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();
        f.clock.set(at(tuesday, 10, 0));
        assert!(matches!(
            f.service.check_in(f.scan(&code, None)).await,
            Err(AttendanceError::Validation(_))
        ));
        assert!(f.store.records().is_empty());
    }

    #[actix_web::test]
    async fn overnight_shift_checks_out_next_morning() {
        let f = fixture();
        f.weekday_shift(22, 6).await;
        let code = f.qr_code(None).await;

        f.clock.set(at(monday(), 22, 5));
        let record = f.service.check_in(f.scan(&code, None)).await.unwrap();
        assert_eq!(record.late_minutes, 5);

        let tuesday = NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();
        f.clock.set(at(tuesday, 6, 30));
        let record = f.service.check_out(f.scan(&code, None)).await.unwrap();
        assert_eq!(record.work_date, monday());
        assert_eq!(record.overtime_minutes, 30);
        assert_eq!(record.total_work_minutes, 505);
    }

    #[actix_web::test]
    async fn pre_marked_absence_can_still_be_checked_in() {
        let f = fixture();
        let code = f.qr_code(None).await;
        f.service
            .mark_day_status(USER, CLINIC, monday(), AttendanceStatus::Absent)
            .await
            .unwrap();

        let record = f.service.check_in(f.scan(&code, None)).await.unwrap();
        assert_eq!(record.status, AttendanceStatus::Present);
        assert_eq!(f.store.records().len(), 1);
    }

    #[actix_web::test]
    async fn day_status_rejects_checked_in_days_and_working_statuses() {
        let f = fixture();
        let code = f.qr_code(None).await;
        assert!(matches!(
            f.service
                .mark_day_status(USER, CLINIC, monday(), AttendanceStatus::Late)
                .await,
            Err(AttendanceError::Validation(_))
        ));

        f.service.check_in(f.scan(&code, None)).await.unwrap();
        assert_eq!(
            f.service
                .mark_day_status(USER, CLINIC, monday(), AttendanceStatus::Leave)
                .await,
            Err(AttendanceError::AlreadyCheckedIn)
        );
    }

    #[actix_web::test]
    async fn today_reports_placeholder_then_record() {
        let f = fixture();
        assert_eq!(
            f.service.today(USER).await.unwrap(),
            TodayAttendance::NotCheckedIn { work_date: monday() }
        );

        let code = f.qr_code(None).await;
        let record = f.service.check_in(f.scan(&code, None)).await.unwrap();
        assert_eq!(
            f.service.today(USER).await.unwrap(),
            TodayAttendance::Recorded {
                phase: AttendancePhase::CheckedIn,
                record,
            }
        );
    }

    #[actix_web::test]
    async fn transient_failures_during_check_in_are_retried() {
        let f = fixture();
        let code = f.qr_code(None).await;
        f.store.fail_next(2);
        assert!(f.service.check_in(f.scan(&code, None)).await.is_ok());
    }

    #[actix_web::test]
    async fn write_lost_before_commit_is_retried_once() {
        let f = fixture();
        f.weekday_shift(9, 18).await;
        let code = f.qr_code(None).await;

        f.clock.set(at(monday(), 9, 0));
        f.store.fail_after_write(1);
        let record = f.service.check_in(f.scan(&code, None)).await.unwrap();
        assert_eq!(f.store.records(), vec![record.clone()]);

        f.clock.set(at(monday(), 18, 0));
        f.store.fail_after_write(1);
        let record = f.service.check_out(f.scan(&code, None)).await.unwrap();
        assert_eq!(record.check_out_time, Some(at(monday(), 18, 0)));
        assert_eq!(record.total_work_minutes, 540);
        assert_eq!(f.store.records(), vec![record]);
    }

    #[actix_web::test]
    async fn losing_the_insert_race_reports_already_checked_in() {
        let f = fixture();
        let code = f.qr_code(None).await;
        let competitor = NewAttendanceRecord::checked_in(
            USER,
            CLINIC,
            monday(),
            check_in_update(None, monday(), at(monday(), 7, 59)),
        );
        f.store.race_next_insert(competitor);

        assert_eq!(
            f.service.check_in(f.scan(&code, None)).await,
            Err(AttendanceError::AlreadyCheckedIn)
        );
        let records = f.store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].check_in_time, Some(at(monday(), 7, 59)));
    }

    #[actix_web::test]
    async fn history_range_is_validated() {
        let f = fixture();
        let from = monday();
        let to = NaiveDate::from_ymd_opt(2027, 3, 10).unwrap();
        assert!(matches!(
            f.service.list_records(USER, CLINIC, to, from).await,
            Err(AttendanceError::Validation(_))
        ));
        assert!(matches!(
            f.service.list_records(USER, CLINIC, from, to).await,
            Err(AttendanceError::Validation(_))
        ));
        assert_eq!(f.service.list_records(USER, CLINIC, from, from).await, Ok(vec![]));
    }

    #[test]
    fn minute_counters_never_go_negative() {
        let start = at(monday(), 9, 0);
        assert_eq!(minutes_after(start, at(monday(), 8, 0)), 0);
        assert_eq!(minutes_after(start, at(monday(), 9, 0)), 0);
        // partial minutes are floored
        assert_eq!(minutes_after(start, start + chrono::Duration::seconds(119)), 1);
    }
}
