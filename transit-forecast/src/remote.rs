use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::debug;

use crate::error::ForecastError;
use crate::models::{AnalyticsRequest, Prediction, PredictionRequest, RouteAnalytics};
use crate::provider::ForecastProvider;

const PREDICT_PATH: [&str; 2] = ["forecast-service", "predict"];
const ANALYTICS_PATH: [&str; 2] = ["forecast-service", "analytics"];

/// Header carrying the shared secret of the internal forecast endpoints.
pub const INTERNAL_TOKEN_HEADER: &str = "x-internal-token";

/// Talks to another instance's `/forecast-service` endpoints.
pub struct RemoteForecaster {
    client: Client,
    base_url: Url,
    timeout: Duration,
    token: Option<String>,
}

impl RemoteForecaster {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ForecastError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ForecastError::InvalidRequest(format!("bad forecast service url: {}", e)))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ForecastError::Upstream(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            timeout,
            token: None,
        })
    }

    /// Sends `token` in [`INTERNAL_TOKEN_HEADER`] on every call.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header(INTERNAL_TOKEN_HEADER, token),
            None => request,
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ForecastError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ForecastError::InvalidRequest("forecast service url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn map_err(&self, err: reqwest::Error) -> ForecastError {
        if err.is_timeout() {
            ForecastError::Timeout(self.timeout)
        } else if err.is_decode() {
            ForecastError::Decode(err.to_string())
        } else {
            ForecastError::Upstream(err.to_string())
        }
    }
}

#[async_trait]
impl ForecastProvider for RemoteForecaster {
    async fn predict(&self, req: &PredictionRequest) -> Result<Prediction, ForecastError> {
        let url = self.endpoint(&PREDICT_PATH)?;
        debug!("POST {}", url);

        self.authorized(self.client.post(url))
            .json(req)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| self.map_err(e))?
            .json::<Prediction>()
            .await
            .map_err(|e| self.map_err(e))
    }

    async fn analytics(
        &self,
        route: &str,
        req: &AnalyticsRequest,
    ) -> Result<RouteAnalytics, ForecastError> {
        let mut segments = ANALYTICS_PATH.to_vec();
        segments.push(route);
        let url = self.endpoint(&segments)?;
        debug!("GET {}", url);

        self.authorized(self.client.get(url))
            .query(req)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| self.map_err(e))?
            .json::<RouteAnalytics>()
            .await
            .map_err(|e| self.map_err(e))
    }
}
