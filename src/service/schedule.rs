use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use crate::error::{AttendanceError, AttendanceResult};
use crate::model::schedule::{NewSchedule, Schedule, ScheduleScope, ShiftWindow, UserSchedule};
use crate::service::membership;
use crate::store::AttendanceStore;
use crate::utils::retry::RetryPolicy;

/// Expected shift for `user_id` on `date`, or `None` for a day off.
///
/// Precedence: the user's date override, the user's weekly entry, the clinic's
/// date override, the clinic's weekly entry. A matching day-off override ends
/// the lookup at its level.
pub fn resolve(schedules: &[Schedule], user_id: u64, date: NaiveDate) -> Option<ShiftWindow> {
    let levels: [(Option<u64>, fn(&ScheduleScope) -> bool); 4] = [
        (Some(user_id), is_specific_date),
        (Some(user_id), is_weekly),
        (None, is_specific_date),
        (None, is_weekly),
    ];

    for (owner, scope_filter) in levels {
        let hit = schedules
            .iter()
            .find(|s| s.user_id == owner && scope_filter(&s.scope) && s.scope.matches(date));
        if let Some(schedule) = hit {
            if schedule.is_day_off {
                return None;
            }
            return Some(ShiftWindow {
                start_time: schedule.start_time,
                end_time: schedule.end_time,
            });
        }
    }
    None
}

fn is_specific_date(scope: &ScheduleScope) -> bool {
    matches!(scope, ScheduleScope::SpecificDate { .. })
}

fn is_weekly(scope: &ScheduleScope) -> bool {
    matches!(scope, ScheduleScope::Weekly { .. })
}

pub struct ScheduleService {
    store: Arc<dyn AttendanceStore>,
    retry: RetryPolicy,
}

impl ScheduleService {
    pub fn new(store: Arc<dyn AttendanceStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// The user's own entries plus clinic defaults; the user must belong to the clinic.
    pub async fn list(&self, clinic_id: u64, user_id: u64) -> AttendanceResult<Vec<Schedule>> {
        let store = self.store.as_ref();
        membership::require_active_member(store, &self.retry, user_id, clinic_id).await?;
        Ok(self
            .retry
            .run("list_schedules", move || store.list_schedules(clinic_id, user_id))
            .await?)
    }

    /// A user's entries plus the shift they resolve to on `date`.
    pub async fn overview(&self, clinic_id: u64, user_id: u64, date: NaiveDate) -> AttendanceResult<UserSchedule> {
        let entries = self.list(clinic_id, user_id).await?;
        let shift = resolve(&entries, user_id, date);
        Ok(UserSchedule {
            user_id,
            date,
            shift,
            entries,
        })
    }

    pub async fn set(&self, schedule: NewSchedule) -> AttendanceResult<Schedule> {
        if schedule.clinic_id == 0 {
            return Err(AttendanceError::validation("clinic_id is required"));
        }
        if !schedule.is_day_off && schedule.start_time == schedule.end_time {
            return Err(AttendanceError::validation(
                "start_time and end_time must differ",
            ));
        }
        if schedule.is_day_off && matches!(schedule.scope, ScheduleScope::Weekly { .. }) {
            // weekly days off are expressed by leaving the weekday empty
            return Err(AttendanceError::validation(
                "is_day_off is only allowed on specific-date entries",
            ));
        }

        let store = self.store.as_ref();
        if let Some(user_id) = schedule.user_id {
            membership::require_active_member(store, &self.retry, user_id, schedule.clinic_id).await?;
        }
        let saved = self
            .retry
            .run("upsert_schedule", move || store.upsert_schedule(schedule.clone()))
            .await?;

        info!(
            clinic_id = saved.clinic_id,
            user_id = ?saved.user_id,
            schedule_id = saved.id,
            "Schedule saved"
        );
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, Weekday};

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn entry(id: u64, user_id: Option<u64>, scope: ScheduleScope, start: u32, end: u32, off: bool) -> Schedule {
        Schedule {
            id,
            clinic_id: 10,
            user_id,
            scope,
            start_time: t(start),
            end_time: t(end),
            is_day_off: off,
        }
    }

    fn weekly(day: Weekday) -> ScheduleScope {
        ScheduleScope::Weekly { day_of_week: day }
    }

    fn on(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // 2026-03-02 is a Monday
    #[test]
    fn weekly_entry_matches_weekday() {
        let schedules = vec![entry(1, Some(7), weekly(Weekday::Mon), 9, 18, false)];
        let shift = resolve(&schedules, 7, on(2026, 3, 2)).unwrap();
        assert_eq!(shift.start_time, t(9));
        assert_eq!(shift.end_time, t(18));
        assert_eq!(resolve(&schedules, 7, on(2026, 3, 3)), None);
    }

    #[test]
    fn date_override_beats_weekly_entry() {
        let schedules = vec![
            entry(1, Some(7), weekly(Weekday::Mon), 9, 18, false),
            entry(2, Some(7), ScheduleScope::SpecificDate { date: on(2026, 3, 2) }, 13, 22, false),
        ];
        let shift = resolve(&schedules, 7, on(2026, 3, 2)).unwrap();
        assert_eq!(shift.start_time, t(13));
        // the following Monday falls back to the weekly entry
        assert_eq!(resolve(&schedules, 7, on(2026, 3, 9)).unwrap().start_time, t(9));
    }

    #[test]
    fn day_off_override_clears_the_shift() {
        let schedules = vec![
            entry(1, Some(7), weekly(Weekday::Mon), 9, 18, false),
            entry(2, Some(7), ScheduleScope::SpecificDate { date: on(2026, 3, 2) }, 0, 0, true),
        ];
        assert_eq!(resolve(&schedules, 7, on(2026, 3, 2)), None);
    }

    #[test]
    fn clinic_default_applies_without_user_entry() {
        let schedules = vec![
            entry(1, None, weekly(Weekday::Tue), 8, 17, false),
            entry(2, Some(8), weekly(Weekday::Tue), 10, 19, false),
        ];
        assert_eq!(resolve(&schedules, 7, on(2026, 3, 3)).unwrap().start_time, t(8));
        assert_eq!(resolve(&schedules, 8, on(2026, 3, 3)).unwrap().start_time, t(10));
    }

    #[test]
    fn user_weekly_entry_beats_clinic_date_override() {
        let schedules = vec![
            entry(1, None, ScheduleScope::SpecificDate { date: on(2026, 3, 2) }, 0, 0, true),
            entry(2, Some(7), weekly(Weekday::Mon), 9, 18, false),
        ];
        assert!(resolve(&schedules, 7, on(2026, 3, 2)).is_some());
        assert_eq!(resolve(&schedules, 8, on(2026, 3, 2)), None);
    }

    #[test]
    fn nothing_configured_means_no_expectation() {
        assert_eq!(resolve(&[], 7, on(2026, 3, 2)), None);
    }

    #[actix_web::test]
    async fn set_upserts_and_overview_resolves() {
        use crate::model::role::Role;
        use crate::store::memory::MemoryStore;
        use std::time::Duration;

        let store = Arc::new(MemoryStore::new());
        store.add_member(7, 10, Role::Staff, true);
        store.add_member(8, 20, Role::Staff, true);
        let service = ScheduleService::new(store, RetryPolicy::new(1, Duration::from_millis(1)));
        let monday = NewSchedule {
            clinic_id: 10,
            user_id: Some(7),
            scope: weekly(Weekday::Mon),
            start_time: t(9),
            end_time: t(18),
            is_day_off: false,
        };
        service.set(monday.clone()).await.unwrap();
        service
            .set(NewSchedule {
                start_time: t(10),
                ..monday.clone()
            })
            .await
            .unwrap();

        let overview = service.overview(10, 7, on(2026, 3, 2)).await.unwrap();
        assert_eq!(overview.entries.len(), 1);
        assert_eq!(overview.shift.map(|s| s.start_time), Some(t(10)));

        let weekly_day_off = NewSchedule {
            is_day_off: true,
            ..monday.clone()
        };
        assert!(matches!(
            service.set(weekly_day_off).await,
            Err(AttendanceError::Validation(_))
        ));
        let empty_shift = NewSchedule {
            end_time: t(9),
            ..monday.clone()
        };
        assert!(matches!(
            service.set(empty_shift).await,
            Err(AttendanceError::Validation(_))
        ));

        // user 8 belongs to clinic 20 only
        let foreign = NewSchedule {
            user_id: Some(8),
            ..monday
        };
        assert!(matches!(
            service.set(foreign).await,
            Err(AttendanceError::Authorization(_))
        ));
        assert!(matches!(
            service.overview(10, 8, on(2026, 3, 2)).await,
            Err(AttendanceError::Authorization(_))
        ));
    }
}
