use chrono::{NaiveDate, NaiveDateTime};
use rand::Rng;

use crate::analytics::{peak_hours, recommendations, summarize};
use crate::estimator::CAVEAT;
use crate::models::{
    round1, HeatmapCell, HeatmapRow, Prediction, RouteAnalytics, TrendPoint, DAY_NAMES,
};

/// Plausible placeholder prediction. Never fails.
pub fn synthetic_prediction<R: Rng + ?Sized>(
    route: &str,
    datetime: NaiveDateTime,
    reason: &str,
    rng: &mut R,
) -> Prediction {
    let predicted: u32 = rng.gen_range(20..=50);
    let capacity: u32 = rng.gen_range(50..=100);
    let utilization = (f64::from(predicted) / f64::from(capacity) * 100.0)
        .round()
        .clamp(0.0, 100.0) as u32;

    Prediction {
        route: route.to_string(),
        datetime,
        predicted_count: predicted,
        capacity,
        utilization_pct: utilization,
        confidence: rng.gen_range(70..=90),
        explanation: vec![
            "Based on typical ridership patterns for this time of day".to_string(),
            "Limited historical data available for this route".to_string(),
            CAVEAT.to_string(),
        ],
        degraded: true,
        degraded_reason: Some(reason.to_string()),
    }
}

/// Randomly populated analytics with the same shape as real ones.
pub fn mock_analytics<R: Rng + ?Sized>(
    route: &str,
    start: NaiveDate,
    end: NaiveDate,
    reason: &str,
    rng: &mut R,
) -> RouteAnalytics {
    let heatmap: Vec<HeatmapRow> = DAY_NAMES
        .iter()
        .map(|name| HeatmapRow {
            day: name.to_string(),
            hours: (0..24)
                .map(|hour| {
                    let capacity = f64::from(rng.gen_range(50u32..=100));
                    let utilization = rng.gen_range(10.0..95.0);
                    HeatmapCell {
                        hour,
                        utilization_pct: round1(utilization),
                        avg_bookings: round1(capacity * utilization / 100.0),
                        capacity,
                    }
                })
                .collect(),
        })
        .collect();

    let weekly_trend: Vec<TrendPoint> = DAY_NAMES
        .iter()
        .enumerate()
        .map(|(day, name)| TrendPoint {
            index: day as u32,
            label: name.to_string(),
            utilization_pct: round1(rng.gen_range(30.0..85.0)),
            avg_bookings: round1(rng.gen_range(15.0..50.0)),
        })
        .collect();

    let hourly_trend: Vec<TrendPoint> = (0..24u32)
        .map(|hour| TrendPoint {
            index: hour,
            label: format!("{}:00", hour),
            utilization_pct: round1(rng.gen_range(10.0..90.0)),
            avg_bookings: round1(rng.gen_range(5.0..55.0)),
        })
        .collect();

    let average = rng.gen_range(40.0..80.0);
    let peak_hours = peak_hours(&hourly_trend);
    let recommendations = recommendations(average, &peak_hours);

    RouteAnalytics {
        route: route.to_string(),
        start_date: start,
        end_date: end,
        sample_count: 0,
        utilization: summarize(average),
        heatmap,
        weekly_trend,
        hourly_trend,
        peak_hours,
        recommendations,
        degraded: true,
        degraded_reason: Some(reason.to_string()),
    }
}
