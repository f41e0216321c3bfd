use axum::{
    routing::{get, post, put},
    Router,
};

use crate::{
    api::{health, zones},
    controller::AppState,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::health_check))
        .route("/zones", get(zones::list_zones))
        .route("/zones/:zone/prices", put(zones::upload_prices))
        .route("/zones/:zone/train", post(zones::train_zone))
        .route(
            "/zones/:zone/forecast",
            post(zones::create_forecast).get(zones::latest_forecast),
        )
        .with_state(state)
}
