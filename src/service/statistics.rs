use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};
use tracing::{info, instrument, warn};

use crate::error::{AttendanceError, AttendanceResult};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::schedule::Schedule;
use crate::model::statistics::MonthlyStatistics;
use crate::service::clock::Clock;
use crate::service::membership;
use crate::service::schedule;
use crate::store::AttendanceStore;
use crate::utils::retry::RetryPolicy;

/// Rebuilds monthly rollups from committed attendance records.
pub struct StatisticsAggregator {
    store: Arc<dyn AttendanceStore>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl StatisticsAggregator {
    pub fn new(store: Arc<dyn AttendanceStore>, clock: Arc<dyn Clock>, retry: RetryPolicy) -> Self {
        Self {
            store,
            clock,
            retry,
        }
    }

    /// Recomputes and replaces the `(user, clinic, year, month)` row.
    #[instrument(name = "statistics_recompute", skip(self))]
    pub async fn recompute(&self, user_id: u64, clinic_id: u64, year: i32, month: u32) -> AttendanceResult<MonthlyStatistics> {
        let (first, last) = month_bounds(year, month)?;
        let store = self.store.as_ref();
        membership::require_active_member(store, &self.retry, user_id, clinic_id).await?;

        let records = self
            .retry
            .run("list_records", move || store.list_records(user_id, clinic_id, first, last))
            .await?;
        let schedules = self
            .retry
            .run("list_schedules", move || store.list_schedules(clinic_id, user_id))
            .await?;

        let now = self.clock.now();
        let stats = summarize(
            MonthKey {
                user_id,
                clinic_id,
                year,
                month,
            },
            &records,
            &schedules,
            now,
        );

        let snapshot = &stats;
        self.retry
            .run("replace_monthly_statistics", move || store.replace_monthly_statistics(snapshot))
            .await?;

        info!(
            total_work_days = stats.total_work_days,
            present_days = stats.present_days,
            attendance_rate = stats.attendance_rate,
            "Monthly statistics recomputed"
        );
        Ok(stats)
    }

    /// Recomputes every active member of the clinic; one failure does not stop the rest.
    pub async fn recompute_clinic(&self, clinic_id: u64, year: i32, month: u32) -> AttendanceResult<Vec<MonthlyStatistics>> {
        month_bounds(year, month)?;
        let store = self.store.as_ref();
        let members = self
            .retry
            .run("list_active_members", move || store.list_active_members(clinic_id))
            .await?;

        let mut results = Vec::with_capacity(members.len());
        for member in members {
            match self.recompute(member.user_id, clinic_id, year, month).await {
                Ok(stats) => results.push(stats),
                Err(e) => warn!(user_id = member.user_id, error = %e, "Skipping member"),
            }
        }
        Ok(results)
    }

    pub async fn get(&self, user_id: u64, clinic_id: u64, year: i32, month: u32) -> AttendanceResult<MonthlyStatistics> {
        month_bounds(year, month)?;
        let store = self.store.as_ref();
        membership::require_active_member(store, &self.retry, user_id, clinic_id).await?;

        let month = month as i32;
        self.retry
            .run("find_monthly_statistics", move || {
                store.find_monthly_statistics(user_id, clinic_id, year, month)
            })
            .await?
            .ok_or(AttendanceError::RecordNotFound)
    }
}

/// First and last day of the month.
pub fn month_bounds(year: i32, month: u32) -> AttendanceResult<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AttendanceError::validation("year/month is not a valid calendar month"))?;
    let next = first
        .checked_add_months(chrono::Months::new(1))
        .ok_or_else(|| AttendanceError::validation("year/month is out of range"))?;
    let last = next
        .checked_sub_days(Days::new(1))
        .ok_or_else(|| AttendanceError::validation("year/month is out of range"))?;
    Ok((first, last))
}

#[derive(Debug, Clone, Copy)]
struct MonthKey {
    user_id: u64,
    clinic_id: u64,
    year: i32,
    month: u32,
}

fn summarize(key: MonthKey, records: &[AttendanceRecord], schedules: &[Schedule], now: NaiveDateTime) -> MonthlyStatistics {
    let mut stats = MonthlyStatistics {
        user_id: key.user_id,
        clinic_id: key.clinic_id,
        year: key.year,
        month: key.month as i32,
        total_work_days: 0,
        present_days: 0,
        absent_days: 0,
        leave_days: 0,
        holiday_days: 0,
        late_count: 0,
        total_late_minutes: 0,
        early_leave_count: 0,
        total_early_leave_minutes: 0,
        overtime_count: 0,
        total_overtime_minutes: 0,
        attendance_rate: 0.0,
        avg_work_minutes_per_day: 0.0,
        last_calculated_at: now,
    };

    let today = now.date();
    let by_date: HashMap<NaiveDate, &AttendanceRecord> =
        records.iter().map(|r| (r.work_date, r)).collect();

    let Some(first) = NaiveDate::from_ymd_opt(key.year, key.month, 1) else {
        return stats;
    };

    let mut completed_days = 0i64;
    let mut completed_minutes = 0i64;

    for day in first.iter_days().take_while(|d| d.month() == key.month && *d <= today) {
        let record = by_date.get(&day).copied();
        let expected = schedule::resolve(schedules, key.user_id, day).is_some();

        match record {
            Some(r) if r.check_in_time.is_some() => {
                stats.present_days += 1;
                stats.total_work_days += 1;

                if r.late_minutes > 0 {
                    stats.late_count += 1;
                    stats.total_late_minutes += r.late_minutes;
                }
                if r.early_leave_minutes > 0 {
                    stats.early_leave_count += 1;
                    stats.total_early_leave_minutes += r.early_leave_minutes;
                }
                if r.overtime_minutes > 0 {
                    stats.overtime_count += 1;
                    stats.total_overtime_minutes += r.overtime_minutes;
                }
                if r.check_out_time.is_some() {
                    completed_days += 1;
                    completed_minutes += r.total_work_minutes;
                }
            }
            Some(r) if r.status == AttendanceStatus::Holiday => stats.holiday_days += 1,
            Some(r) if r.status == AttendanceStatus::Leave => {
                stats.leave_days += 1;
                if expected {
                    stats.total_work_days += 1;
                }
            }
            Some(r) if r.status == AttendanceStatus::Absent => {
                stats.absent_days += 1;
                stats.total_work_days += 1;
            }
            // today stays open until the user checks in
            _ if expected && day < today => {
                stats.absent_days += 1;
                stats.total_work_days += 1;
            }
            _ => {}
        }
    }

    stats.attendance_rate = rate(stats.present_days, stats.total_work_days);
    if completed_days > 0 {
        stats.avg_work_minutes_per_day = round2(completed_minutes as f64 / completed_days as f64);
    }
    stats
}

fn rate(present: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2(present as f64 / total as f64 * 100.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
