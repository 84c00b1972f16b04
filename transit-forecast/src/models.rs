use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;

pub const DEFAULT_HOUR: u32 = 9;
pub const DEFAULT_WINDOW_DAYS: i64 = 30;
pub const DEFAULT_CAPACITY: f64 = 50.0;

pub const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Observed bookings for one route in one hour of one day.
/// Column order matches the history CSV header `route,date,hour,bookings,capacity`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DemandSample {
    pub route: String,
    pub date: NaiveDate,
    pub hour: u32,
    pub bookings: u32,
    pub capacity: u32,
}

impl DemandSample {
    /// 0 = Sunday .. 6 = Saturday.
    pub fn weekday_index(&self) -> usize {
        self.date.weekday().num_days_from_sunday() as usize
    }

    pub fn utilization_pct(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        f64::from(self.bookings) / f64::from(self.capacity) * 100.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub route: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hour: Option<u32>,
}

impl PredictionRequest {
    pub fn hour(&self) -> u32 {
        self.hour.unwrap_or(DEFAULT_HOUR)
    }

    pub fn target(&self) -> NaiveDateTime {
        let time = NaiveTime::from_hms_opt(self.hour(), 0, 0).unwrap_or_default();
        self.date.and_time(time)
    }

    pub fn validate(&self) -> Result<(), ForecastError> {
        if self.route.trim().is_empty() {
            return Err(ForecastError::InvalidRequest("route is required".to_string()));
        }
        if self.hour() > 23 {
            return Err(ForecastError::InvalidRequest(format!(
                "hour must be between 0 and 23, got {}",
                self.hour()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyticsRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

impl AnalyticsRequest {
    /// Inclusive window; the last 30 days through `today` (today included) unless bounds were given.
    pub fn window(&self, today: NaiveDate) -> Result<(NaiveDate, NaiveDate), ForecastError> {
        let end = self.end_date.unwrap_or(today);
        let start = self
            .start_date
            .unwrap_or(end - Duration::days(DEFAULT_WINDOW_DAYS - 1));
        if start > end {
            return Err(ForecastError::InvalidRequest(format!(
                "start_date {} is after end_date {}",
                start, end
            )));
        }
        Ok((start, end))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    pub route: String,
    pub datetime: NaiveDateTime,
    pub predicted_count: u32,
    pub capacity: u32,
    pub utilization_pct: u32,
    pub confidence: u32,
    pub explanation: Vec<String>,
    /// Set when the numbers are placeholders rather than derived from history.
    #[serde(default)]
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UtilizationSummary {
    pub average: f64,
    /// `average * 1.3`, capped at 100. Heuristic, not measured.
    pub peak: f64,
    /// `average * 0.7`. Heuristic, not measured.
    pub low: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeatmapCell {
    pub hour: u32,
    pub utilization_pct: f64,
    pub avg_bookings: f64,
    pub capacity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeatmapRow {
    pub day: String,
    pub hours: Vec<HeatmapCell>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendPoint {
    pub index: u32,
    pub label: String,
    pub utilization_pct: f64,
    pub avg_bookings: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteAnalytics {
    pub route: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub sample_count: usize,
    pub utilization: UtilizationSummary,
    /// Seven rows, Sunday first, each with 24 hourly cells.
    pub heatmap: Vec<HeatmapRow>,
    /// Index 0 = Sunday.
    pub weekly_trend: Vec<TrendPoint>,
    pub hourly_trend: Vec<TrendPoint>,
    pub peak_hours: Vec<String>,
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded_reason: Option<String>,
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_hour_and_validation() {
        let req: PredictionRequest =
            serde_json::from_str(r#"{"route":"R1","date":"2025-03-10"}"#).unwrap();
        assert_eq!(req.hour(), 9);
        assert_eq!(req.target().to_string(), "2025-03-10 09:00:00");
        assert!(req.validate().is_ok());

        let late = PredictionRequest { hour: Some(24), ..req };
        assert!(matches!(late.validate(), Err(ForecastError::InvalidRequest(_))));
    }

    #[test]
    fn test_analytics_window() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
        let (start, end) = AnalyticsRequest::default().window(today).unwrap();
        assert_eq!(end, today);
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 3, 2).unwrap());
        assert_eq!((end - start).num_days() + 1, DEFAULT_WINDOW_DAYS);

        let inverted = AnalyticsRequest {
            start_date: Some(today),
            end_date: Some(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()),
        };
        assert!(inverted.window(today).is_err());
    }

    #[test]
    fn test_sample_weekday_starts_on_sunday() {
        let sample = DemandSample {
            route: "R1".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 3, 9).unwrap(), // a Sunday
            hour: 8,
            bookings: 40,
            capacity: 80,
        };
        assert_eq!(sample.weekday_index(), 0);
        assert_eq!(sample.utilization_pct(), 50.0);
    }
}
