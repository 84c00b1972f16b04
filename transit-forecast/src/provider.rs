use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::{error, info};
use transit_core::Clock;

use crate::analytics;
use crate::error::ForecastError;
use crate::estimator;
use crate::loader::History;
use crate::models::{AnalyticsRequest, Prediction, PredictionRequest, RouteAnalytics};

/// Anything that can answer forecast questions: the in-process estimator or a remote one.
#[async_trait]
pub trait ForecastProvider: Send + Sync {
    async fn predict(&self, req: &PredictionRequest) -> Result<Prediction, ForecastError>;

    async fn analytics(
        &self,
        route: &str,
        req: &AnalyticsRequest,
    ) -> Result<RouteAnalytics, ForecastError>;
}

/// In-process estimator over history loaded once, lazily, and never refreshed.
pub struct LocalForecaster {
    history_path: Option<PathBuf>,
    seed: Option<u64>,
    history: OnceCell<Arc<History>>,
    rng: Mutex<StdRng>,
    clock: Arc<dyn Clock>,
}

fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

impl LocalForecaster {
    pub fn new(history_path: Option<PathBuf>, seed: Option<u64>, clock: Arc<dyn Clock>) -> Self {
        Self {
            history_path,
            seed,
            history: OnceCell::new(),
            rng: Mutex::new(rng_from(seed)),
            clock,
        }
    }

    /// Uses a fixed history instead of loading one.
    pub fn with_history(history: History, seed: Option<u64>, clock: Arc<dyn Clock>) -> Self {
        Self {
            history_path: None,
            seed,
            history: OnceCell::from(Arc::new(history)),
            rng: Mutex::new(rng_from(seed)),
            clock,
        }
    }

    /// The cached history, loading it on first call. The CSV read runs on the blocking pool.
    pub async fn history(&self) -> Arc<History> {
        self.history
            .get_or_init(|| async {
                let path = self.history_path.clone();
                let seed = self.seed;
                let today = self.clock.today();

                let loaded = tokio::task::spawn_blocking(move || {
                    History::load_or_synthesize(path.as_deref(), today, &mut rng_from(seed))
                })
                .await;

                let history = match loaded {
                    Ok(history) => history,
                    Err(e) => {
                        error!("History loader task failed: {}", e);
                        History::load_or_synthesize(None, today, &mut rng_from(seed))
                    }
                };
                info!(
                    "Forecast history ready: {} samples ({:?})",
                    history.samples().len(),
                    history.source()
                );
                Arc::new(history)
            })
            .await
            .clone()
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut *rng)
    }

    /// Synchronous prediction against already-loaded history.
    pub fn predict_with(&self, history: &History, req: &PredictionRequest) -> Prediction {
        let mut prediction = self.with_rng(|rng| estimator::predict(history.samples(), req, rng));
        if history.is_synthetic() && !prediction.degraded {
            prediction.degraded = true;
            prediction.degraded_reason = Some("history is synthetic".to_string());
        }
        prediction
    }
}

#[async_trait]
impl ForecastProvider for LocalForecaster {
    async fn predict(&self, req: &PredictionRequest) -> Result<Prediction, ForecastError> {
        req.validate()?;
        let history = self.history().await;
        Ok(self.predict_with(&history, req))
    }

    async fn analytics(
        &self,
        route: &str,
        req: &AnalyticsRequest,
    ) -> Result<RouteAnalytics, ForecastError> {
        let (start, end) = req.window(self.clock.today())?;
        let history = self.history().await;

        let mut result =
            self.with_rng(|rng| analytics::analyze(history.samples(), route, start, end, rng));
        if history.is_synthetic() && !result.degraded {
            result.degraded = true;
            result.degraded_reason = Some("history is synthetic".to_string());
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{HistorySource, SYNTHETIC_ROUTES};
    use crate::models::DemandSample;
    use chrono::NaiveDate;
    use std::io::Write;
    use transit_core::FixedClock;

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock::on(NaiveDate::from_ymd_opt(2025, 3, 31).unwrap()))
    }

    fn request(route: &str) -> PredictionRequest {
        PredictionRequest {
            route: route.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            hour: Some(8),
        }
    }

    #[tokio::test]
    async fn test_history_loaded_once() {
        let forecaster = LocalForecaster::new(None, Some(5), clock());
        let first = forecaster.history().await;
        let second = forecaster.history().await;
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.is_synthetic());
    }

    #[tokio::test]
    async fn test_synthetic_history_marks_predictions_degraded() {
        let forecaster = LocalForecaster::new(None, Some(5), clock());
        let p = forecaster.predict(&request(SYNTHETIC_ROUTES[0])).await.unwrap();
        assert!(p.degraded);
        assert!((60..=95).contains(&p.confidence));
    }

    #[tokio::test]
    async fn test_csv_history_is_used() {
        let path = std::env::temp_dir().join(format!("transit-history-{}.csv", std::process::id()));
        {
            let mut file = std::fs::File::create(&path).unwrap();
            writeln!(file, "route,date,hour,bookings,capacity").unwrap();
            // Tuesdays before 2025-04-01
            for day in [4, 11, 18, 25] {
                writeln!(file, "R1,2025-03-{:02},8,30,60", day).unwrap();
            }
        }

        let forecaster = LocalForecaster::new(Some(path.clone()), Some(1), clock());
        let p = forecaster.predict(&request("R1")).await.unwrap();
        assert!(!p.degraded);
        assert_eq!(p.capacity, 60);
        assert!(matches!(forecaster.history().await.source(), HistorySource::Csv(_)));

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_invalid_requests_are_rejected() {
        let forecaster = LocalForecaster::with_history(
            History::new(Vec::<DemandSample>::new(), HistorySource::Synthetic),
            Some(1),
            clock(),
        );
        let mut req = request("R1");
        req.hour = Some(30);
        assert!(matches!(
            forecaster.predict(&req).await,
            Err(ForecastError::InvalidRequest(_))
        ));

        let inverted = AnalyticsRequest {
            start_date: NaiveDate::from_ymd_opt(2025, 3, 20),
            end_date: NaiveDate::from_ymd_opt(2025, 3, 1),
        };
        assert!(forecaster.analytics("R1", &inverted).await.is_err());
    }

    #[tokio::test]
    async fn test_route_without_history_still_answers() {
        let forecaster = LocalForecaster::with_history(
            History::new(Vec::new(), HistorySource::Csv(PathBuf::from("fixture.csv"))),
            Some(2),
            clock(),
        );
        let p = forecaster.predict(&request("ghost")).await.unwrap();
        assert!(p.degraded);
        assert!(!p.explanation.is_empty());

        let a = forecaster.analytics("ghost", &AnalyticsRequest::default()).await.unwrap();
        assert!(a.degraded);
        assert_eq!(a.heatmap.len(), 7);
    }
}
