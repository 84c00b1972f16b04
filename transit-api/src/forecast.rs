use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use transit_forecast::{AnalyticsRequest, ForecastProvider, Prediction, PredictionRequest, RouteAnalytics};

use crate::error::{AppError, AppJson, AppPath, AppQuery};
use crate::state::AppState;

/// Public forecast endpoints; always answer, falling back to mock data.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/forecast/predict", post(predict))
        .route("/v1/forecast/analytics/{route}", get(analytics))
}

/// The raw in-process estimator, called by other instances' remote providers.
pub fn internal_routes() -> Router<AppState> {
    Router::new()
        .route("/forecast-service/predict", post(service_predict))
        .route("/forecast-service/analytics/{route}", get(service_analytics))
}

async fn predict(
    State(state): State<AppState>,
    AppJson(req): AppJson<PredictionRequest>,
) -> Result<Json<Prediction>, AppError> {
    Ok(Json(state.forecast.predict(&req).await?))
}

async fn analytics(
    State(state): State<AppState>,
    AppPath(route): AppPath<String>,
    AppQuery(req): AppQuery<AnalyticsRequest>,
) -> Result<Json<RouteAnalytics>, AppError> {
    Ok(Json(state.forecast.analytics(&route, &req).await?))
}

async fn service_predict(
    State(state): State<AppState>,
    AppJson(req): AppJson<PredictionRequest>,
) -> Result<Json<Prediction>, AppError> {
    Ok(Json(state.local_forecast.predict(&req).await?))
}

async fn service_analytics(
    State(state): State<AppState>,
    AppPath(route): AppPath<String>,
    AppQuery(req): AppQuery<AnalyticsRequest>,
) -> Result<Json<RouteAnalytics>, AppError> {
    Ok(Json(state.local_forecast.analytics(&route, &req).await?))
}
