use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};
use transit_booking::{BookingRepository, BookingService, InMemoryBookingRepository, LedgerRules};
use transit_core::{
    BroadcastSink, CatalogRepository, Clock, FanoutSink, InMemoryCatalog, NotificationSink,
    SystemClock,
};
use transit_forecast::loader::SYNTHETIC_ROUTES;
use transit_forecast::{ForecastProvider, LocalForecaster, RemoteForecaster};
use transit_store::{Config, DbClient, PgBookingRepository, PgCatalogRepository, RedisClient};

use crate::gateway::{ForecastGateway, GatewaySettings};
use crate::metrics::Metrics;

const DEMO_VEHICLE_CAPACITY: u32 = 45;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    /// Required on `/forecast-service/*` when set.
    pub internal_token: Option<String>,
}

#[derive(Clone)]
pub struct RateLimit {
    pub redis: Arc<RedisClient>,
    pub requests_per_window: i64,
    pub window_seconds: i64,
}

#[derive(Clone)]
pub struct AppState {
    pub bookings: Arc<BookingService>,
    pub forecast: Arc<ForecastGateway>,
    /// Backs the internal `/forecast-service` endpoints.
    pub local_forecast: Arc<LocalForecaster>,
    /// In-process booking event stream.
    pub events: BroadcastSink,
    pub auth: AuthConfig,
    pub rate_limit: Option<RateLimit>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Wires every component from configuration. Without a database url the
    /// in-memory repositories are used and a demo catalog is seeded.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let metrics = Arc::new(Metrics::new().context("Failed to register metrics")?);

        // Storage
        let (repo, catalog, rules): (Arc<dyn BookingRepository>, Arc<dyn CatalogRepository>, _) =
            match config.database.url.as_deref() {
                Some(url) => {
                    let db = DbClient::new(url, config.database.max_connections)
                        .await
                        .context("Failed to connect to Postgres")?;
                    db.migrate().await.context("Failed to run migrations")?;

                    let rules = match db.fetch_booking_rules(config.booking_rules.clone()).await {
                        Ok(rules) => rules,
                        Err(e) => {
                            warn!("Using configured booking rules, database overrides unavailable: {}", e);
                            config.booking_rules.clone()
                        }
                    };
                    (
                        Arc::new(PgBookingRepository::new(db.pool.clone())),
                        Arc::new(PgCatalogRepository::new(db.pool.clone())),
                        rules,
                    )
                }
                None => {
                    warn!("No database configured, bookings are kept in memory");
                    let catalog = InMemoryCatalog::new();
                    for name in SYNTHETIC_ROUTES {
                        let (route, schedule, _) = catalog.seed_trip(name, DEMO_VEHICLE_CAPACITY).await;
                        info!("Demo trip '{}': route {} schedule {}", name, route.id, schedule.id);
                    }
                    (
                        Arc::new(InMemoryBookingRepository::new()),
                        Arc::new(catalog),
                        config.booking_rules.clone(),
                    )
                }
            };

        // Notifications
        let events = BroadcastSink::new(256);
        let sinks = with_kafka(FanoutSink::new().with(Arc::new(events.clone())), config)?;
        let notifier: Arc<dyn NotificationSink> = Arc::new(sinks);

        let bookings = Arc::new(BookingService::new(
            repo,
            catalog,
            notifier,
            clock.clone(),
            LedgerRules {
                max_advance_days: rules.max_advance_days,
            },
        ));

        // Forecasting
        let forecast_config = &config.forecast;
        let local_forecast = Arc::new(LocalForecaster::new(
            forecast_config.history_csv.clone(),
            forecast_config.seed,
            clock.clone(),
        ));
        let provider: Arc<dyn ForecastProvider> = match forecast_config.service_url.as_deref() {
            Some(url) => {
                info!("Using remote forecast service at {}", url);
                Arc::new(
                    RemoteForecaster::new(url, forecast_config.timeout())
                        .context("Invalid forecast service url")?
                        .with_token(forecast_config.internal_token.clone()),
                )
            }
            None => local_forecast.clone(),
        };
        let forecast = Arc::new(ForecastGateway::new(
            provider,
            GatewaySettings {
                timeout: forecast_config.timeout(),
                failure_threshold: forecast_config.breaker_failure_threshold,
                reset_timeout: forecast_config.breaker_reset(),
                seed: forecast_config.seed,
            },
            clock,
            metrics.forecast_fallbacks.clone(),
        ));

        if forecast_config.internal_token.is_none() {
            warn!("forecast.internal_token unset; /forecast-service is open to any caller");
        }

        // Rate limiting
        let rate_limit = match &config.redis {
            Some(redis) => Some(RateLimit {
                redis: Arc::new(RedisClient::new(&redis.url).context("Invalid Redis url")?),
                requests_per_window: config.rate_limit.requests_per_window,
                window_seconds: config.rate_limit.window_seconds,
            }),
            None => None,
        };

        Ok(Self {
            bookings,
            forecast,
            local_forecast,
            events,
            auth: AuthConfig {
                secret: config.auth.jwt_secret.clone(),
                internal_token: forecast_config.internal_token.clone(),
            },
            rate_limit,
            metrics,
        })
    }
}

#[cfg(feature = "kafka")]
fn with_kafka(sinks: FanoutSink, config: &Config) -> anyhow::Result<FanoutSink> {
    match &config.kafka {
        Some(kafka) => {
            let producer = transit_store::EventProducer::new(&kafka.brokers)
                .context("Failed to create Kafka producer")?;
            info!("Publishing booking events to Kafka at {}", kafka.brokers);
            Ok(sinks.with(Arc::new(producer)))
        }
        None => Ok(sinks),
    }
}

#[cfg(not(feature = "kafka"))]
fn with_kafka(sinks: FanoutSink, config: &Config) -> anyhow::Result<FanoutSink> {
    if config.kafka.is_some() {
        warn!("Kafka configured but this build lacks the `kafka` feature; events stay in-process");
    }
    Ok(sinks)
}
