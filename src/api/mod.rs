pub mod error;
pub mod health;
pub mod response;
pub mod v1;
pub mod zones;

use std::time::Duration;

use axum::{http::StatusCode, Router};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{config::Config, controller::AppState};

/// Price uploads carry a few months of hourly points at most
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

pub fn router(state: AppState, cfg: &Config) -> Router {
    let timeout = Duration::from_secs(cfg.server.request_timeout_secs);
    with_middleware(Router::new().nest("/api/v1", v1::router(state)), timeout)
}

/// Body limit, request timeout (408) and HTTP tracing around `routes`.
fn with_middleware(routes: Router, timeout: Duration) -> Router {
    routes
        .layer(
            ServiceBuilder::new()
                .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
                .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)),
        )
        .layer(TraceLayer::new_for_http())
}
