use axum::{extract::State, Json};
use chrono::{DateTime, Local, TimeZone, Utc};
use serde::Serialize;
use tracing::instrument;

use super::aggregator::{aggregate, filter_today, today_boundary, DailyStats};
use crate::config::LocalZone;
use crate::entries::model::{FoodEntry, FoodLog};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub date: String,
    /// Start of the local day, ms since epoch.
    pub day_start: i64,
    #[serde(flatten)]
    pub stats: DailyStats,
    pub remaining: f64,
    pub percent_complete: f64,
    pub entries: Vec<FoodEntry>,
}

impl DashboardResponse {
    pub fn build<Tz: TimeZone>(log: &FoodLog, now: &DateTime<Tz>) -> Self {
        let today = filter_today(log, now);
        let stats = aggregate(today.iter().copied());
        Self {
            date: now.date_naive().format("%Y-%m-%d").to_string(),
            day_start: today_boundary(now),
            stats,
            remaining: stats.remaining(),
            percent_complete: stats.percent_complete(),
            entries: today.into_iter().cloned().collect(),
        }
    }
}

#[instrument(skip(state))]
pub async fn dashboard(State(state): State<AppState>) -> Json<DashboardResponse> {
    let journal = state.journal.lock().await;
    let resp = match state.local_zone {
        LocalZone::System => DashboardResponse::build(journal.log(), &Local::now()),
        LocalZone::Fixed(offset) => {
            DashboardResponse::build(journal.log(), &Utc::now().with_timezone(&offset))
        }
    };
    Json(resp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entries::model::sample_entry;
    use crate::stats::aggregator::test_zone::berlin;

    fn ms(rfc3339: &str) -> i64 {
        DateTime::parse_from_rfc3339(rfc3339).unwrap().timestamp_millis()
    }

    #[test]
    fn dashboard_shows_only_today_with_derived_figures() {
        let yesterday = sample_entry(900.0, ms("2024-04-30T21:00:00Z"));
        let breakfast = sample_entry(500.0, ms("2024-05-01T08:00:00Z"));
        let lunch = sample_entry(700.0, ms("2024-05-01T12:30:00Z"));
        let log = FoodLog::new(vec![yesterday, breakfast.clone(), lunch.clone()]);

        let now = DateTime::parse_from_rfc3339("2024-05-01T20:00:00Z").unwrap();
        let resp = DashboardResponse::build(&log, &now);
        assert_eq!(resp.date, "2024-05-01");
        assert_eq!(resp.day_start, ms("2024-05-01T00:00:00Z"));
        assert_eq!(resp.entries, vec![breakfast, lunch]);
        assert_eq!(resp.stats.total_calories, 1200.0);
        assert_eq!(resp.remaining, 1000.0);

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["totalCalories"], 1200.0);
        assert_eq!(json["goalCalories"], 2200.0);
        assert_eq!(json["dayStart"], ms("2024-05-01T00:00:00Z"));
        assert!(json["percentComplete"].as_f64().unwrap() > 54.0);
        assert_eq!(json["entries"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn dashboard_date_tracks_summer_time() {
        let late_evening = sample_entry(400.0, ms("2024-07-01T23:40:00+02:00"));
        let log = FoodLog::new(vec![late_evening]);

        // 00:30 CEST on 2 July
        let resp = DashboardResponse::build(&log, &berlin("2024-07-01T22:30:00Z"));
        assert_eq!(resp.date, "2024-07-02");
        assert_eq!(resp.day_start, ms("2024-07-02T00:00:00+02:00"));
        assert!(resp.entries.is_empty());
        assert_eq!(resp.stats.total_calories, 0.0);
    }
}
