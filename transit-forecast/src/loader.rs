use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::Rng;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::HistoryError;
use crate::models::DemandSample;

/// Named routes present in synthesised history.
pub const SYNTHETIC_ROUTES: [&str; 5] = [
    "City Center - Airport",
    "North Station - University",
    "Harbor - Old Town",
    "Central - Stadium",
    "East Terminal - Business Park",
];
pub const SYNTHETIC_DAYS: i64 = 30;
pub const FIRST_SERVICE_HOUR: u32 = 6;
pub const LAST_SERVICE_HOUR: u32 = 21;
const WEEKEND_FACTOR: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistorySource {
    Csv(PathBuf),
    Synthetic,
}

/// Immutable snapshot of historical demand. Read-only once loaded.
#[derive(Debug, Clone)]
pub struct History {
    samples: Vec<DemandSample>,
    source: HistorySource,
}

impl History {
    pub fn new(samples: Vec<DemandSample>, source: HistorySource) -> Self {
        Self { samples, source }
    }

    pub fn samples(&self) -> &[DemandSample] {
        &self.samples
    }

    pub fn source(&self) -> &HistorySource {
        &self.source
    }

    pub fn is_synthetic(&self) -> bool {
        self.source == HistorySource::Synthetic
    }

    /// Reads `path` if given and usable, else synthesises history ending on `today`.
    pub fn load_or_synthesize<R: Rng + ?Sized>(
        path: Option<&Path>,
        today: NaiveDate,
        rng: &mut R,
    ) -> Self {
        if let Some(path) = path {
            match read_csv_file(path) {
                Ok(samples) => {
                    info!("Loaded {} demand samples from {}", samples.len(), path.display());
                    return Self::new(samples, HistorySource::Csv(path.to_path_buf()));
                }
                Err(e) => warn!("Ignoring history file {}: {}", path.display(), e),
            }
        }

        let samples = synthesize(today, rng);
        info!("Synthesised {} demand samples", samples.len());
        Self::new(samples, HistorySource::Synthetic)
    }
}

pub fn read_csv_file(path: &Path) -> Result<Vec<DemandSample>, HistoryError> {
    let file = std::fs::File::open(path)?;
    read_csv(file)
}

/// Parses `route,date,hour,bookings,capacity` rows. Any bad row rejects the whole input.
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<DemandSample>, HistoryError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut samples = Vec::new();
    for (idx, result) in rdr.deserialize::<DemandSample>().enumerate() {
        let sample = result?;
        if sample.hour > 23 {
            return Err(HistoryError::InvalidRow {
                row: idx + 1,
                message: format!("hour {} out of range", sample.hour),
            });
        }
        if sample.route.is_empty() {
            return Err(HistoryError::InvalidRow {
                row: idx + 1,
                message: "empty route".to_string(),
            });
        }
        samples.push(sample);
    }

    if samples.is_empty() {
        return Err(HistoryError::Empty);
    }
    Ok(samples)
}

/// Base bookings for an hour on a weekday, before the weekend factor.
pub fn base_demand<R: Rng + ?Sized>(hour: u32, rng: &mut R) -> f64 {
    match hour {
        7..=9 | 17..=19 => rng.gen_range(40.0..=60.0),
        11..=14 => rng.gen_range(15.0..=30.0),
        _ => rng.gen_range(5.0..=15.0),
    }
}

/// Generates `SYNTHETIC_DAYS` days ending on `today` for every synthetic route, service hours only.
pub fn synthesize<R: Rng + ?Sized>(today: NaiveDate, rng: &mut R) -> Vec<DemandSample> {
    let hours = (LAST_SERVICE_HOUR - FIRST_SERVICE_HOUR + 1) as usize;
    let mut samples =
        Vec::with_capacity(SYNTHETIC_DAYS as usize * SYNTHETIC_ROUTES.len() * hours);

    for offset in (0..SYNTHETIC_DAYS).rev() {
        let date = today - Duration::days(offset);
        let weekend = matches!(date.weekday(), Weekday::Sat | Weekday::Sun);

        for route in SYNTHETIC_ROUTES {
            for hour in FIRST_SERVICE_HOUR..=LAST_SERVICE_HOUR {
                let mut demand = base_demand(hour, rng);
                if weekend {
                    demand *= WEEKEND_FACTOR;
                }
                let capacity: u32 = rng.gen_range(50..=100);
                let bookings = (demand.round() as u32).min(capacity);

                samples.push(DemandSample {
                    route: route.to_string(),
                    date,
                    hour,
                    bookings,
                    capacity,
                });
            }
        }
    }

    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 31).unwrap()
    }

    #[test]
    fn test_read_csv() {
        let data = "route,date,hour,bookings,capacity\n\
                    R1,2025-03-10,8,45,60\n\
                    R1, 2025-03-10 ,9,30,60\n";
        let samples = read_csv(data.as_bytes()).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].date, NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
        assert_eq!(samples[0].bookings, 45);
    }

    #[test]
    fn test_bad_rows_reject_file() {
        let bad_hour = "route,date,hour,bookings,capacity\nR1,2025-03-10,25,45,60\n";
        assert!(matches!(
            read_csv(bad_hour.as_bytes()),
            Err(HistoryError::InvalidRow { row: 1, .. })
        ));

        let bad_date = "route,date,hour,bookings,capacity\nR1,10/03/2025,8,45,60\n";
        assert!(matches!(read_csv(bad_date.as_bytes()), Err(HistoryError::Csv(_))));

        let header_only = "route,date,hour,bookings,capacity\n";
        assert!(matches!(read_csv(header_only.as_bytes()), Err(HistoryError::Empty)));
    }

    #[test]
    fn test_synthesize_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let samples = synthesize(today(), &mut rng);

        assert_eq!(samples.len(), 30 * SYNTHETIC_ROUTES.len() * 16);
        assert!(samples.iter().all(|s| (6..=21).contains(&s.hour)));
        assert!(samples.iter().all(|s| (50..=100).contains(&s.capacity)));
        assert!(samples.iter().all(|s| s.bookings <= s.capacity));
        assert_eq!(samples.last().unwrap().date, today());
        assert_eq!(samples[0].date, NaiveDate::from_ymd_opt(2025, 3, 2).unwrap());
    }

    #[test]
    fn test_diurnal_curve_and_weekend_factor() {
        let mut rng = StdRng::seed_from_u64(11);
        let samples = synthesize(today(), &mut rng);

        for s in &samples {
            let weekend = matches!(s.date.weekday(), Weekday::Sat | Weekday::Sun);
            let (lo, hi) = match s.hour {
                7..=9 | 17..=19 => (40.0, 60.0),
                11..=14 => (15.0, 30.0),
                _ => (5.0, 15.0),
            };
            let factor = if weekend { WEEKEND_FACTOR } else { 1.0 };
            let b = f64::from(s.bookings);
            assert!(b >= (lo * factor).round() && b <= (hi * factor).round(), "{:?}", s);
        }
    }

    #[test]
    fn test_synthesis_is_seed_deterministic() {
        let a = synthesize(today(), &mut StdRng::seed_from_u64(3));
        let b = synthesize(today(), &mut StdRng::seed_from_u64(3));
        assert_eq!(a, b);
    }

    #[test]
    fn test_missing_file_falls_back_to_synthesis() {
        let mut rng = StdRng::seed_from_u64(1);
        let history =
            History::load_or_synthesize(Some(Path::new("/nonexistent/history.csv")), today(), &mut rng);
        assert!(history.is_synthetic());
        assert!(!history.samples().is_empty());
    }
}
