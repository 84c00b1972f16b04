use chrono::{Datelike, NaiveDate, Weekday};
use rand::Rng;

use crate::mock;
use crate::models::{DemandSample, Prediction, PredictionRequest, DEFAULT_CAPACITY};

/// Samples this recent (by date) form the "recent" side of the trend.
const RECENT_WINDOW: usize = 7;
const NOISE: f64 = 5.0;
const MIN_CONFIDENCE: f64 = 60.0;
const MAX_CONFIDENCE: f64 = 95.0;
/// Trends smaller than this are not worth mentioning.
const NOTABLE_TREND: f64 = 1.0;
const HIGH_UTILIZATION: f64 = 0.8;

pub const CAVEAT: &str = "External factors such as weather or local events may affect actual ridership";

pub const HOLIDAY_BOOST: f64 = 5.0;
pub const SUMMER_DIP: f64 = -3.0;
pub const WEEKEND_DIP: f64 = -5.0;

/// Sum of every seasonal rule that applies to `date`.
pub fn seasonal_adjustment(date: NaiveDate) -> f64 {
    let mut adjustment = 0.0;
    if is_holiday_season(date) {
        adjustment += HOLIDAY_BOOST;
    }
    if is_summer(date) {
        adjustment += SUMMER_DIP;
    }
    if is_weekend(date) {
        adjustment += WEEKEND_DIP;
    }
    adjustment
}

fn is_holiday_season(date: NaiveDate) -> bool {
    matches!(date.month(), 11 | 12)
}

fn is_summer(date: NaiveDate) -> bool {
    (5..=9).contains(&date.month())
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Mean of the `RECENT_WINDOW` newest samples minus the mean of the older ones.
/// Zero when either side is empty.
pub fn trend(slice: &[&DemandSample]) -> f64 {
    let mut ordered: Vec<&DemandSample> = slice.to_vec();
    ordered.sort_by_key(|s| s.date);

    let split = ordered.len().saturating_sub(RECENT_WINDOW);
    let (older, recent) = ordered.split_at(split);

    match (
        mean(recent.iter().map(|s| f64::from(s.bookings))),
        mean(older.iter().map(|s| f64::from(s.bookings))),
    ) {
        (Some(recent), Some(older)) => recent - older,
        _ => 0.0,
    }
}

/// Predicts bookings for one route at one hour. Never fails: thin history yields a
/// synthetic, degraded prediction instead.
pub fn predict<R: Rng + ?Sized>(
    history: &[DemandSample],
    req: &PredictionRequest,
    rng: &mut R,
) -> Prediction {
    let target = req.target();
    let hour = req.hour();

    let route_samples: Vec<&DemandSample> =
        history.iter().filter(|s| s.route == req.route).collect();
    if route_samples.is_empty() {
        return mock::synthetic_prediction(&req.route, target, "no historical data for route", rng);
    }

    let weekday = req.date.weekday();
    let slice: Vec<&DemandSample> = route_samples
        .into_iter()
        .filter(|s| s.date.weekday() == weekday && s.hour == hour)
        .collect();
    if slice.is_empty() {
        return mock::synthetic_prediction(
            &req.route,
            target,
            "no historical data for this day and hour",
            rng,
        );
    }

    let mean_bookings = mean(slice.iter().map(|s| f64::from(s.bookings))).unwrap_or(0.0);
    let mean_capacity = mean(slice.iter().map(|s| f64::from(s.capacity)))
        .filter(|c| *c > 0.0)
        .unwrap_or(DEFAULT_CAPACITY);

    let trend = trend(&slice);
    let seasonal = seasonal_adjustment(req.date);
    let noise = rng.gen_range(-NOISE..=NOISE);

    let predicted = (mean_bookings + trend + seasonal + noise).round().max(0.0);
    let utilization = (predicted / mean_capacity * 100.0).round().clamp(0.0, 100.0);
    let confidence = (100.0 - 2.0 * trend.abs())
        .round()
        .clamp(MIN_CONFIDENCE, MAX_CONFIDENCE);

    let mut explanation = Vec::new();
    if trend >= NOTABLE_TREND {
        explanation.push(format!("Ridership is trending up (+{:.1} passengers recently)", trend));
    } else if trend <= -NOTABLE_TREND {
        explanation.push(format!("Ridership is trending down ({:.1} passengers recently)", trend));
    }
    if is_holiday_season(req.date) {
        explanation.push("Holiday season usually brings extra travellers".to_string());
    }
    if is_summer(req.date) {
        explanation.push("Summer months see slightly lower commuter demand".to_string());
    }
    if is_weekend(req.date) {
        explanation.push("Weekend ridership is typically lower".to_string());
    }
    if predicted / mean_capacity > HIGH_UTILIZATION {
        explanation.push("High utilization expected; consider adding capacity".to_string());
    }
    explanation.push(CAVEAT.to_string());

    Prediction {
        route: req.route.clone(),
        datetime: target,
        predicted_count: predicted as u32,
        capacity: mean_capacity.round() as u32,
        utilization_pct: utilization as u32,
        confidence: confidence as u32,
        explanation,
        degraded: false,
        degraded_reason: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn monday(weeks_back: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap() - Duration::weeks(weeks_back)
    }

    fn sample(date: NaiveDate, hour: u32, bookings: u32, capacity: u32) -> DemandSample {
        DemandSample {
            route: "R1".to_string(),
            date,
            hour,
            bookings,
            capacity,
        }
    }

    fn request(date: NaiveDate, hour: Option<u32>) -> PredictionRequest {
        PredictionRequest {
            route: "R1".to_string(),
            date,
            hour,
        }
    }

    #[test]
    fn test_seasonal_adjustments_are_cumulative() {
        // Tuesday in March: nothing applies
        assert_eq!(seasonal_adjustment(NaiveDate::from_ymd_opt(2025, 3, 11).unwrap()), 0.0);
        // Wednesday in December
        assert_eq!(seasonal_adjustment(NaiveDate::from_ymd_opt(2025, 12, 10).unwrap()), 5.0);
        // Saturday in December: holiday and weekend both count
        assert_eq!(seasonal_adjustment(NaiveDate::from_ymd_opt(2025, 12, 13).unwrap()), 0.0);
        // Sunday in July: summer and weekend
        assert_eq!(seasonal_adjustment(NaiveDate::from_ymd_opt(2025, 7, 13).unwrap()), -8.0);
        // Thursday in May
        assert_eq!(seasonal_adjustment(NaiveDate::from_ymd_opt(2025, 5, 1).unwrap()), -3.0);
    }

    #[test]
    fn test_trend_uses_newest_seven() {
        let mut samples: Vec<DemandSample> = (0..10).map(|w| sample(monday(w), 8, 20, 50)).collect();
        // Newest seven weeks at 30, three older at 20
        for s in samples.iter_mut().take(7) {
            s.bookings = 30;
        }
        let refs: Vec<&DemandSample> = samples.iter().collect();
        assert_eq!(trend(&refs), 10.0);

        let few: Vec<&DemandSample> = samples.iter().take(5).collect();
        assert_eq!(trend(&few), 0.0);
    }

    #[test]
    fn test_prediction_with_flat_history() {
        let history: Vec<DemandSample> = (0..8).map(|w| sample(monday(w + 1), 9, 30, 60)).collect();
        let mut rng = StdRng::seed_from_u64(42);

        let p = predict(&history, &request(monday(0), None), &mut rng);
        assert!(!p.degraded);
        assert!((25..=35).contains(&p.predicted_count), "{}", p.predicted_count);
        assert_eq!(p.capacity, 60);
        assert_eq!(p.confidence, 95);
        assert_eq!(p.datetime.to_string(), "2025-03-10 09:00:00");
        assert_eq!(p.explanation.last().map(String::as_str), Some(CAVEAT));
    }

    #[test]
    fn test_prediction_deterministic_for_seed() {
        let history: Vec<DemandSample> = (0..12)
            .map(|w| sample(monday(w + 1), 8, 20 + w as u32, 55))
            .collect();

        let a = predict(&history, &request(monday(0), Some(8)), &mut StdRng::seed_from_u64(9));
        let b = predict(&history, &request(monday(0), Some(8)), &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn test_strong_trend_lowers_confidence_to_floor() {
        let mut history: Vec<DemandSample> = (0..7).map(|w| sample(monday(w + 1), 8, 90, 100)).collect();
        history.extend((7..14).map(|w| sample(monday(w + 1), 8, 10, 100)));

        let p = predict(&history, &request(monday(0), Some(8)), &mut StdRng::seed_from_u64(1));
        assert_eq!(p.confidence, 60);
        assert!(p.explanation[0].contains("trending up"));
        assert!(p.explanation.iter().any(|e| e.contains("High utilization")));
        assert!(p.utilization_pct <= 100);
    }

    #[test]
    fn test_unknown_route_and_empty_slice_are_synthetic() {
        let history = vec![sample(monday(1), 8, 30, 50)];
        let mut rng = StdRng::seed_from_u64(5);

        let unknown = predict(
            &history,
            &PredictionRequest { route: "nowhere".to_string(), date: monday(0), hour: None },
            &mut rng,
        );
        assert!(unknown.degraded);
        assert!(!unknown.explanation.is_empty());

        // Route known, but never observed at 9:00 on a Monday
        let slice_miss = predict(&history, &request(monday(0), Some(9)), &mut rng);
        assert!(slice_miss.degraded);
        assert_eq!(slice_miss.route, "R1");
    }

    #[test]
    fn test_bounds_hold_for_many_seeds() {
        let history: Vec<DemandSample> = (0..20)
            .map(|w| sample(monday(w + 1), 7, (w as u32 * 7) % 120, 40 + w as u32))
            .collect();

        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let date = monday(0) + Duration::days((seed % 7) as i64);
            let p = predict(&history, &request(date, Some(7)), &mut rng);
            assert!(p.utilization_pct <= 100);
            assert!((60..=95).contains(&p.confidence));
            assert!(!p.explanation.is_empty());
        }
    }
}
