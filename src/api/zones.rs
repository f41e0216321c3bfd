use axum::{
    body::Bytes,
    extract::{Path, State},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use validator::Validate;

use crate::{
    api::{error::ApiError, response::ApiResponse},
    controller::{AppState, ZoneStatus},
    domain::{BiddingZone, PriceSeries, ZoneForecast},
    forecast::TrainingReport,
    ml::TrainingConfig,
};

/// Resolve the `:zone` path segment; unknown names are a 404, not a 400.
pub(crate) fn parse_zone(raw: &str) -> Result<BiddingZone, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::NotFound(format!("bidding zone '{raw}'")))
}

/// Empty body means "all defaults"
pub(crate) fn parse_optional_body<T: DeserializeOwned + Default>(
    body: &Bytes,
) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))
}

#[derive(Debug, Deserialize)]
pub struct UploadPricesRequest {
    pub prices: PriceSeries,
}

#[derive(Debug, Serialize)]
pub struct UploadSummary {
    pub zone: BiddingZone,
    pub points: usize,
    pub ready_for_training: bool,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct TrainRequest {
    /// Train on these prices instead of the stored history
    pub prices: Option<PriceSeries>,
    #[validate(range(min = 1, max = 100000))]
    pub epochs: Option<usize>,
    #[validate(range(min = 1e-7, max = 1.0))]
    pub learning_rate: Option<f64>,
}

impl TrainRequest {
    fn training_config(&self, base: &TrainingConfig) -> TrainingConfig {
        TrainingConfig {
            epochs: self.epochs.unwrap_or(base.epochs),
            learning_rate: self.learning_rate.unwrap_or(base.learning_rate),
            log_interval: base.log_interval,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ForecastRequest {
    /// Forecast from these prices instead of the stored history
    pub prices: Option<PriceSeries>,
    #[validate(range(min = 1))]
    pub window_hours: Option<usize>,
}

/// GET /api/v1/zones
pub async fn list_zones(State(state): State<AppState>) -> ApiResponse<Vec<ZoneStatus>> {
    let zones = state.service.zone_statuses().await;
    let count = zones.len();
    ApiResponse::success(zones).with_count(count)
}

/// PUT /api/v1/zones/:zone/prices
pub async fn upload_prices(
    State(state): State<AppState>,
    Path(zone): Path<String>,
    body: Bytes,
) -> Result<ApiResponse<UploadSummary>, ApiError> {
    let zone = parse_zone(&zone)?;
    let request: UploadPricesRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))?;

    let points = state.service.upload_prices(zone, request.prices).await?;
    Ok(ApiResponse::success(UploadSummary {
        zone,
        points,
        ready_for_training: points >= state.cfg.model.min_training_len(),
    }))
}

/// POST /api/v1/zones/:zone/train
///
/// Blocks until training completes.
pub async fn train_zone(
    State(state): State<AppState>,
    Path(zone): Path<String>,
    body: Bytes,
) -> Result<ApiResponse<TrainingReport>, ApiError> {
    let zone = parse_zone(&zone)?;
    let request: TrainRequest = parse_optional_body(&body)?;
    request.validate()?;

    let training = request.training_config(state.service.training_config());
    let report = state.service.train(zone, request.prices, Some(training)).await?;
    let duration_ms = report.duration_ms;
    Ok(ApiResponse::success(report).with_duration(duration_ms))
}

/// POST /api/v1/zones/:zone/forecast
pub async fn create_forecast(
    State(state): State<AppState>,
    Path(zone): Path<String>,
    body: Bytes,
) -> Result<ApiResponse<ZoneForecast>, ApiError> {
    let zone = parse_zone(&zone)?;
    let request: ForecastRequest = parse_optional_body(&body)?;
    request.validate()?;

    let started = std::time::Instant::now();
    let forecast = state
        .service
        .forecast(zone, request.prices, request.window_hours)
        .await?;
    Ok(ApiResponse::success(forecast).with_duration(started.elapsed().as_millis() as u64))
}

/// GET /api/v1/zones/:zone/forecast
pub async fn latest_forecast(
    State(state): State<AppState>,
    Path(zone): Path<String>,
) -> Result<ApiResponse<ZoneForecast>, ApiError> {
    let zone = parse_zone(&zone)?;
    let forecast = state.service.latest_forecast(zone).await?;
    Ok(ApiResponse::success(forecast))
}
