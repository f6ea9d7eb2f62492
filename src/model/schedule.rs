use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Which days a schedule entry applies to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleScope {
    Weekly {
        #[schema(value_type = String, example = "Mon")]
        day_of_week: Weekday,
    },
    SpecificDate {
        #[schema(value_type = String, format = "date", example = "2026-03-02")]
        date: NaiveDate,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Schedule {
    pub id: u64,
    pub clinic_id: u64,
    /// `None` marks a clinic-wide default
    pub user_id: Option<u64>,
    pub scope: ScheduleScope,
    #[schema(value_type = String, example = "09:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "18:00:00")]
    pub end_time: NaiveTime,
    pub is_day_off: bool,
}

#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub clinic_id: u64,
    pub user_id: Option<u64>,
    pub scope: ScheduleScope,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_day_off: bool,
}

/// Expected working hours for one date.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ShiftWindow {
    #[schema(value_type = String, example = "09:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "18:00:00")]
    pub end_time: NaiveTime,
}

/// Schedule entries visible to a user, with the shift in force on `date`.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct UserSchedule {
    pub user_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    /// `None` on a day off or without any schedule
    pub shift: Option<ShiftWindow>,
    pub entries: Vec<Schedule>,
}

impl ShiftWindow {
    pub fn starts_on(&self, work_date: NaiveDate) -> NaiveDateTime {
        work_date.and_time(self.start_time)
    }

    /// An end at or before the start belongs to the next calendar day.
    pub fn ends_on(&self, work_date: NaiveDate) -> NaiveDateTime {
        let end = work_date.and_time(self.end_time);
        if self.end_time <= self.start_time {
            end.checked_add_days(Days::new(1)).unwrap_or(end)
        } else {
            end
        }
    }
}

pub fn weekday_from_index(index: u8) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Mon),
        1 => Some(Weekday::Tue),
        2 => Some(Weekday::Wed),
        3 => Some(Weekday::Thu),
        4 => Some(Weekday::Fri),
        5 => Some(Weekday::Sat),
        6 => Some(Weekday::Sun),
        _ => None,
    }
}

pub fn weekday_index(day: Weekday) -> u8 {
    day.num_days_from_monday() as u8
}

impl ScheduleScope {
    pub fn matches(&self, date: NaiveDate) -> bool {
        match self {
            ScheduleScope::Weekly { day_of_week } => date.weekday() == *day_of_week,
            ScheduleScope::SpecificDate { date: on } => *on == date,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct ScheduleRow {
    pub id: u64,
    pub clinic_id: u64,
    pub user_id: Option<u64>,
    pub day_of_week: Option<u8>,
    pub specific_date: Option<NaiveDate>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_day_off: bool,
}

impl ScheduleRow {
    /// Rows carrying neither a weekday nor a date are ignored.
    pub fn into_schedule(self) -> Option<Schedule> {
        let scope = match (self.specific_date, self.day_of_week) {
            (Some(date), _) => ScheduleScope::SpecificDate { date },
            (None, Some(index)) => ScheduleScope::Weekly {
                day_of_week: weekday_from_index(index)?,
            },
            (None, None) => return None,
        };

        Some(Schedule {
            id: self.id,
            clinic_id: self.clinic_id,
            user_id: self.user_id,
            scope,
            start_time: self.start_time,
            end_time: self.end_time,
            is_day_off: self.is_day_off,
        })
    }
}
