//! Ridership forecasting over a cached historical sample set.
//!
//! Every entry point is total: when history is missing for a route the answer is
//! synthesised and flagged `degraded`, never an error.

pub mod analytics;
pub mod error;
pub mod estimator;
pub mod loader;
pub mod mock;
pub mod models;
pub mod provider;
pub mod remote;

pub use error::{ForecastError, HistoryError};
pub use loader::{History, HistorySource};
pub use models::{
    AnalyticsRequest, DemandSample, HeatmapCell, HeatmapRow, Prediction, PredictionRequest,
    RouteAnalytics, TrendPoint, UtilizationSummary,
};
pub use provider::{ForecastProvider, LocalForecaster};
pub use remote::RemoteForecaster;
