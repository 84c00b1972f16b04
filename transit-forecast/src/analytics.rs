use chrono::NaiveDate;
use rand::Rng;
use std::collections::HashMap;

use crate::mock;
use crate::models::{
    round1, DemandSample, HeatmapCell, HeatmapRow, RouteAnalytics, TrendPoint,
    UtilizationSummary, DAY_NAMES, DEFAULT_CAPACITY,
};

const PEAK_FACTOR: f64 = 1.3;
const LOW_FACTOR: f64 = 0.7;
const PEAK_HOUR_THRESHOLD: f64 = 70.0;
const UNDER_CAPACITY_THRESHOLD: f64 = 80.0;
const OVER_SCHEDULED_THRESHOLD: f64 = 30.0;

#[derive(Default, Clone, Copy)]
struct Bucket {
    count: usize,
    bookings: f64,
    capacity: f64,
    utilization: f64,
}

impl Bucket {
    fn add(&mut self, sample: &DemandSample) {
        self.count += 1;
        self.bookings += f64::from(sample.bookings);
        self.capacity += f64::from(sample.capacity);
        self.utilization += sample.utilization_pct();
    }

    fn mean_utilization(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.utilization / self.count as f64
        }
    }

    fn mean_bookings(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.bookings / self.count as f64
        }
    }

    fn mean_capacity(&self) -> f64 {
        if self.count == 0 {
            DEFAULT_CAPACITY
        } else {
            self.capacity / self.count as f64
        }
    }
}

pub fn summarize(average: f64) -> UtilizationSummary {
    UtilizationSummary {
        average: round1(average),
        peak: round1((average * PEAK_FACTOR).min(100.0)),
        low: round1(average * LOW_FACTOR),
    }
}

/// Collapses sorted-or-not hours into contiguous `start:00-end:00` ranges, end exclusive.
pub fn merge_peak_hours(hours: &[u32]) -> Vec<String> {
    let mut sorted = hours.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut ranges = Vec::new();
    let mut iter = sorted.into_iter();
    let Some(first) = iter.next() else {
        return ranges;
    };

    let (mut start, mut end) = (first, first);
    for hour in iter {
        if hour == end + 1 {
            end = hour;
        } else {
            ranges.push(format!("{}:00-{}:00", start, end + 1));
            start = hour;
            end = hour;
        }
    }
    ranges.push(format!("{}:00-{}:00", start, end + 1));
    ranges
}

/// Hours of the hourly trend whose utilization exceeds the peak threshold.
pub fn peak_hours(hourly: &[TrendPoint]) -> Vec<String> {
    let hours: Vec<u32> = hourly
        .iter()
        .filter(|p| p.utilization_pct > PEAK_HOUR_THRESHOLD)
        .map(|p| p.index)
        .collect();
    merge_peak_hours(&hours)
}

pub fn recommendations(average: f64, peak_hours: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    if average > UNDER_CAPACITY_THRESHOLD {
        out.push(format!(
            "Average utilization is {:.1}%: the route is under capacity, add vehicles or departures",
            average
        ));
    } else if average < OVER_SCHEDULED_THRESHOLD {
        out.push(format!(
            "Average utilization is {:.1}%: the route looks over-scheduled, consider reducing frequency",
            average
        ));
    }
    if !peak_hours.is_empty() {
        out.push(format!(
            "Peak hours {}: schedule additional departures in these windows",
            peak_hours.join(", ")
        ));
    }
    if out.is_empty() {
        out.push("Utilization is within the normal range; the current schedule is adequate".to_string());
    }
    out
}

fn trend_point(index: u32, label: String, bucket: &Bucket) -> TrendPoint {
    TrendPoint {
        index,
        label,
        utilization_pct: round1(bucket.mean_utilization()),
        avg_bookings: round1(bucket.mean_bookings()),
    }
}

/// Aggregates a route's samples in the inclusive window. Falls back to shape-valid
/// mock analytics when the window holds no samples.
pub fn analyze<R: Rng + ?Sized>(
    history: &[DemandSample],
    route: &str,
    start: NaiveDate,
    end: NaiveDate,
    rng: &mut R,
) -> RouteAnalytics {
    let samples: Vec<&DemandSample> = history
        .iter()
        .filter(|s| s.route == route && s.date >= start && s.date <= end)
        .collect();
    if samples.is_empty() {
        return mock::mock_analytics(route, start, end, "no historical data in window", rng);
    }

    let mut overall = Bucket::default();
    let mut cells: HashMap<(usize, u32), Bucket> = HashMap::new();
    let mut weekly = [Bucket::default(); 7];
    let mut hourly = [Bucket::default(); 24];

    for sample in &samples {
        let day = sample.weekday_index();
        overall.add(sample);
        cells.entry((day, sample.hour)).or_default().add(sample);
        weekly[day].add(sample);
        if let Some(bucket) = hourly.get_mut(sample.hour as usize) {
            bucket.add(sample);
        }
    }

    // total bookings / (count * mean capacity) == total bookings / total capacity
    let average = if overall.capacity > 0.0 {
        overall.bookings / overall.capacity * 100.0
    } else {
        0.0
    };

    let heatmap = DAY_NAMES
        .iter()
        .enumerate()
        .map(|(day, name)| HeatmapRow {
            day: name.to_string(),
            hours: (0..24)
                .map(|hour| {
                    let bucket = cells.get(&(day, hour)).copied().unwrap_or_default();
                    HeatmapCell {
                        hour,
                        utilization_pct: round1(bucket.mean_utilization()),
                        avg_bookings: round1(bucket.mean_bookings()),
                        capacity: round1(bucket.mean_capacity()),
                    }
                })
                .collect(),
        })
        .collect();

    let weekly_trend: Vec<TrendPoint> = weekly
        .iter()
        .enumerate()
        .map(|(day, bucket)| trend_point(day as u32, DAY_NAMES[day].to_string(), bucket))
        .collect();
    let hourly_trend: Vec<TrendPoint> = hourly
        .iter()
        .enumerate()
        .map(|(hour, bucket)| trend_point(hour as u32, format!("{}:00", hour), bucket))
        .collect();

    let peak_hours = peak_hours(&hourly_trend);
    let recommendations = recommendations(average, &peak_hours);

    RouteAnalytics {
        route: route.to_string(),
        start_date: start,
        end_date: end,
        sample_count: samples.len(),
        utilization: summarize(average),
        heatmap,
        weekly_trend,
        hourly_trend,
        peak_hours,
        recommendations,
        degraded: false,
        degraded_reason: None,
    }
}
