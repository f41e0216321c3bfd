pub mod scheduler;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::domain::{BiddingZone, PriceSeries, ZoneForecast};
use crate::error::ForecastError;
use crate::forecast::{EngineRegistry, EngineStatus, ForecastEngine, TrainingReport};
use crate::ml::{ModelMetadata, TrainingConfig};

pub use scheduler::{next_run_after, run_scheduled_refresh, spawn_daily_forecast_tasks, TaskStatus};

#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    pub service: Arc<ForecastService>,
    /// Outcome of the daily forecast runs, shared by every zone's task
    pub schedule: Arc<RwLock<TaskStatus>>,
}

impl AppState {
    /// Restore every enabled zone from its checkpoint.
    pub fn new(cfg: Config) -> Result<Self> {
        let registry =
            EngineRegistry::load(&cfg.zones.enabled, &cfg.model, &cfg.zones.checkpoint_dir)
                .context("failed to restore model checkpoints")?;
        Ok(Self::with_registry(cfg, registry))
    }

    pub fn with_registry(cfg: Config, registry: EngineRegistry) -> Self {
        let service = Arc::new(ForecastService::new(
            registry,
            cfg.training.clone(),
            cfg.analysis.window_hours,
        ));
        Self {
            cfg,
            service,
            schedule: Arc::new(RwLock::new(TaskStatus::default())),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Bidding zone {0} is not enabled")]
    UnknownZone(BiddingZone),

    #[error("No price history uploaded for zone {0}")]
    NoPriceData(BiddingZone),

    #[error("No forecast generated yet for zone {0}")]
    NoForecast(BiddingZone),

    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error("Background task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Per-zone view for listings
#[derive(Debug, Clone, Serialize)]
pub struct ZoneStatus {
    pub zone: BiddingZone,
    pub eic_code: &'static str,
    pub timezone: String,
    pub status: EngineStatus,
    pub model: Option<ModelMetadata>,
    pub price_points: usize,
    pub last_forecast_at: Option<chrono::DateTime<Utc>>,
}

/// Host-side orchestration over the per-zone engines: keeps the latest
/// price history and forecast per zone and runs the CPU-bound engine calls
/// on the blocking pool.
pub struct ForecastService {
    registry: EngineRegistry,
    training: TrainingConfig,
    window_hours: usize,
    series: RwLock<HashMap<BiddingZone, PriceSeries>>,
    forecasts: RwLock<HashMap<BiddingZone, ZoneForecast>>,
}

impl ForecastService {
    pub fn new(registry: EngineRegistry, training: TrainingConfig, window_hours: usize) -> Self {
        Self {
            registry,
            training,
            window_hours,
            series: RwLock::new(HashMap::new()),
            forecasts: RwLock::new(HashMap::new()),
        }
    }

    pub fn training_config(&self) -> &TrainingConfig {
        &self.training
    }

    pub fn zones(&self) -> Vec<BiddingZone> {
        self.registry.zones().collect()
    }

    pub fn trained_count(&self) -> usize {
        self.registry.trained_count()
    }

    fn engine(&self, zone: BiddingZone) -> Result<Arc<ForecastEngine>, ServiceError> {
        self.registry.get(zone).ok_or(ServiceError::UnknownZone(zone))
    }

    pub async fn zone_statuses(&self) -> Vec<ZoneStatus> {
        let series = self.series.read().await;
        let forecasts = self.forecasts.read().await;
        self.registry
            .zones()
            .filter_map(|zone| {
                let engine = self.registry.get(zone)?;
                Some(ZoneStatus {
                    zone,
                    eic_code: zone.eic_code(),
                    timezone: zone.timezone().name().to_string(),
                    status: engine.status(),
                    model: engine.metadata(),
                    price_points: series.get(&zone).map_or(0, |s| s.len()),
                    last_forecast_at: forecasts.get(&zone).map(|f| f.generated_at),
                })
            })
            .collect()
    }

    /// Replace the stored price history of `zone`.
    pub async fn upload_prices(
        &self,
        zone: BiddingZone,
        series: PriceSeries,
    ) -> Result<usize, ServiceError> {
        self.engine(zone)?;
        let len = series.len();
        self.series.write().await.insert(zone, series);
        debug!(%zone, points = len, "Price history updated");
        Ok(len)
    }

    async fn resolve_series(
        &self,
        zone: BiddingZone,
        series: Option<PriceSeries>,
    ) -> Result<PriceSeries, ServiceError> {
        match series {
            Some(series) => {
                self.series.write().await.insert(zone, series.clone());
                Ok(series)
            }
            None => self
                .series
                .read()
                .await
                .get(&zone)
                .cloned()
                .ok_or(ServiceError::NoPriceData(zone)),
        }
    }

    /// Train the zone's engine on `series`, or on the stored history.
    pub async fn train(
        &self,
        zone: BiddingZone,
        series: Option<PriceSeries>,
        training: Option<TrainingConfig>,
    ) -> Result<TrainingReport, ServiceError> {
        let engine = self.engine(zone)?;
        let series = self.resolve_series(zone, series).await?;
        let training = training.unwrap_or_else(|| self.training.clone());

        info!(%zone, points = series.len(), epochs = training.epochs, "Training requested");
        let values = series.values();
        let report =
            tokio::task::spawn_blocking(move || engine.train(&values, &training)).await??;
        Ok(report)
    }

    /// Forecast the hours following `series` (or the stored history) and
    /// keep the result as the zone's latest forecast.
    pub async fn forecast(
        &self,
        zone: BiddingZone,
        series: Option<PriceSeries>,
        window_hours: Option<usize>,
    ) -> Result<ZoneForecast, ServiceError> {
        let engine = self.engine(zone)?;
        let series = self.resolve_series(zone, series).await?;
        let width = window_hours.unwrap_or(self.window_hours);
        let start_hour = series.next_local_hour(zone.timezone()).unwrap_or(0);
        let starts_at = series.next_hour();

        let values = series.values();
        let result =
            tokio::task::spawn_blocking(move || engine.recommend(&values, start_hour, width))
                .await??;

        let forecast = ZoneForecast {
            zone,
            generated_at: Utc::now(),
            starts_at,
            prices: result.prices,
            recommendation: result.recommendation,
            model_id: result.model_id,
        };
        self.forecasts.write().await.insert(zone, forecast.clone());
        info!(
            %zone,
            cheapest_start = forecast.recommendation.cheapest_window.start_hour,
            peak_start = forecast.recommendation.peak_window.start_hour,
            "Forecast generated"
        );
        Ok(forecast)
    }

    pub async fn latest_forecast(&self, zone: BiddingZone) -> Result<ZoneForecast, ServiceError> {
        self.engine(zone)?;
        self.forecasts
            .read()
            .await
            .get(&zone)
            .cloned()
            .ok_or(ServiceError::NoForecast(zone))
    }

    /// Regenerate the forecast of `zone` from its stored history.
    ///
    /// `Ok(false)` when the zone has no model or no history yet.
    pub async fn refresh_zone(&self, zone: BiddingZone) -> Result<bool, ServiceError> {
        match self.forecast(zone, None, None).await {
            Ok(_) => Ok(true),
            Err(ServiceError::NoPriceData(_))
            | Err(ServiceError::Forecast(ForecastError::ModelNotTrained)) => {
                debug!(%zone, "Skipping zone without model or price history");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Regenerate forecasts for every zone that has a model and history.
    /// Returns how many zones were refreshed.
    pub async fn refresh_all(&self) -> usize {
        let mut refreshed = 0;
        for zone in self.zones() {
            match self.refresh_zone(zone).await {
                Ok(true) => refreshed += 1,
                Ok(false) => {}
                Err(e) => warn!(%zone, error = %e, "Forecast refresh failed"),
            }
        }
        refreshed
    }
}
