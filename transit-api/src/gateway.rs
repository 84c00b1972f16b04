use prometheus::IntCounter;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;
use transit_core::Clock;
use transit_forecast::mock;
use transit_forecast::{
    AnalyticsRequest, ForecastError, ForecastProvider, Prediction, PredictionRequest,
    RouteAnalytics,
};

use crate::resiliency::CircuitBreaker;

/// Forecast calls with a deadline and a circuit breaker. A slow, failing or tripped
/// provider is answered with local mock data flagged `degraded`; only invalid
/// requests surface as errors.
pub struct ForecastGateway {
    provider: Arc<dyn ForecastProvider>,
    breaker: CircuitBreaker,
    timeout: Duration,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
    fallbacks: IntCounter,
}

pub struct GatewaySettings {
    pub timeout: Duration,
    pub failure_threshold: usize,
    pub reset_timeout: Duration,
    pub seed: Option<u64>,
}

impl ForecastGateway {
    pub fn new(
        provider: Arc<dyn ForecastProvider>,
        settings: GatewaySettings,
        clock: Arc<dyn Clock>,
        fallbacks: IntCounter,
    ) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            provider,
            breaker: CircuitBreaker::new("forecast", settings.failure_threshold, settings.reset_timeout),
            timeout: settings.timeout,
            clock,
            rng: Mutex::new(rng),
            fallbacks,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub async fn predict(&self, req: &PredictionRequest) -> Result<Prediction, ForecastError> {
        req.validate()?;

        match self.guarded(self.provider.predict(req)).await? {
            Ok(prediction) => Ok(prediction),
            Err(reason) => {
                let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
                Ok(mock::synthetic_prediction(&req.route, req.target(), &reason, &mut *rng))
            }
        }
    }

    pub async fn analytics(
        &self,
        route: &str,
        req: &AnalyticsRequest,
    ) -> Result<RouteAnalytics, ForecastError> {
        let (start, end) = req.window(self.clock.today())?;

        match self.guarded(self.provider.analytics(route, req)).await? {
            Ok(analytics) => Ok(analytics),
            Err(reason) => {
                let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
                Ok(mock::mock_analytics(route, start, end, &reason, &mut *rng))
            }
        }
    }

    /// Outer error: the request itself was rejected. Inner error: why a fallback is needed.
    async fn guarded<T, F>(&self, call: F) -> Result<Result<T, String>, ForecastError>
    where
        F: Future<Output = Result<T, ForecastError>>,
    {
        if !self.breaker.check().await {
            return Ok(Err(self.fallback("forecast circuit open".to_string())));
        }

        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => {
                self.breaker.record_success().await;
                Ok(Ok(value))
            }
            Ok(Err(e)) if !e.is_recoverable() => Err(e),
            Ok(Err(e)) => {
                self.breaker.record_failure().await;
                Ok(Err(self.fallback(e.to_string())))
            }
            Err(_) => {
                self.breaker.record_failure().await;
                Ok(Err(self.fallback(ForecastError::Timeout(self.timeout).to_string())))
            }
        }
    }

    fn fallback(&self, reason: String) -> String {
        warn!("Forecast unavailable, serving mock data: {}", reason);
        self.fallbacks.inc();
        reason
    }
}
