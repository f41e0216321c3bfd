use axum::{extract::State, Json};
use serde::Serialize;

use crate::controller::{AppState, TaskStatus};

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    version: &'static str,
    timestamp: chrono::DateTime<chrono::Utc>,
    zones_enabled: usize,
    zones_trained: usize,
    schedule: TaskStatus,
}

/// GET /healthz
///
/// `degraded` while no zone has a trained model; the process still serves
/// uploads and training requests. `schedule` reports the daily forecast runs.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let zones_enabled = state.service.zones().len();
    let zones_trained = state.service.trained_count();
    let schedule = state.schedule.read().await.clone();

    Json(HealthResponse {
        status: if zones_trained > 0 {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now(),
        zones_enabled,
        zones_trained,
        schedule,
    })
}
