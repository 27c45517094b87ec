//! Daily totals over the food log.
//!
//! Every function here is pure. "Local" always means the timezone carried by
//! the `now` argument, resolved separately for each instant, so a day that
//! crosses a DST change is still one calendar day and both the boundary and
//! the same-day predicate agree on it.

use chrono::{DateTime, NaiveDate, TimeZone};
use serde::Serialize;

use crate::entries::model::{FoodEntry, FoodLog};

/// Daily calorie target. Not configurable yet.
pub const GOAL_CALORIES: f64 = 2200.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStats {
    pub total_calories: f64,
    pub total_protein: f64,
    pub total_carbs: f64,
    pub total_fat: f64,
    pub goal_calories: f64,
}

impl Default for DailyStats {
    fn default() -> Self {
        Self {
            total_calories: 0.0,
            total_protein: 0.0,
            total_carbs: 0.0,
            total_fat: 0.0,
            goal_calories: GOAL_CALORIES,
        }
    }
}

impl DailyStats {
    /// Calories left before the goal, never negative.
    pub fn remaining(&self) -> f64 {
        (self.goal_calories - self.total_calories).max(0.0)
    }

    /// Share of the goal consumed, in `[0, 100]`. NaN totals read as 0.
    pub fn percent_complete(&self) -> f64 {
        (self.total_calories / self.goal_calories * 100.0)
            .max(0.0)
            .min(100.0)
    }
}

/// Local calendar date of a millisecond timestamp, `None` if out of range.
pub fn local_date<Tz: TimeZone>(timestamp: i64, zone: &Tz) -> Option<NaiveDate> {
    zone.timestamp_millis_opt(timestamp)
        .single()
        .map(|at| at.date_naive())
}

/// First instant of the local day `now` falls on, in ms since epoch.
///
/// Usually local midnight; when midnight is skipped by a DST jump the day
/// starts at the end of the gap.
pub fn today_boundary<Tz: TimeZone>(now: &DateTime<Tz>) -> i64 {
    let zone = now.timezone();
    let date = now.date_naive();
    (0..24 * 60)
        .filter_map(|minute| date.and_hms_opt(minute / 60, minute % 60, 0))
        .find_map(|local| zone.from_local_datetime(&local).earliest())
        .map_or_else(|| now.timestamp_millis(), |start| start.timestamp_millis())
}

pub fn same_local_day<Tz: TimeZone>(timestamp: i64, now: &DateTime<Tz>) -> bool {
    local_date(timestamp, &now.timezone()) == Some(now.date_naive())
}

/// Entries logged on `now`'s local calendar date, in log order.
pub fn filter_today<'a, Tz: TimeZone>(
    log: &'a FoodLog,
    now: &DateTime<Tz>,
) -> Vec<&'a FoodEntry> {
    log.entries()
        .iter()
        .filter(|e| same_local_day(e.timestamp, now))
        .collect()
}

pub fn aggregate<'a, I>(entries: I) -> DailyStats
where
    I: IntoIterator<Item = &'a FoodEntry>,
{
    entries
        .into_iter()
        .fold(DailyStats::default(), |acc, e| DailyStats {
            total_calories: acc.total_calories + e.calories,
            total_protein: acc.total_protein + e.macros.protein,
            total_carbs: acc.total_carbs + e.macros.carbs,
            total_fat: acc.total_fat + e.macros.fat,
            goal_calories: acc.goal_calories,
        })
}
