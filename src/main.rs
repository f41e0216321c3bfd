use anyhow::{Context, Result};
use energy_pulse::{api, config::Config, controller, telemetry};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cfg = Config::load().context("invalid configuration")?;
    telemetry::init_tracing(&cfg.logging);

    // a checkpoint that exists but cannot be used stops startup here
    let app_state = controller::AppState::new(cfg.clone())
        .context("refusing to serve forecasts with an unusable model checkpoint")?;

    if app_state.service.trained_count() == 0 {
        warn!("No zone has a trained model yet; upload prices and train before forecasting");
    }

    if cfg.schedule.enabled {
        controller::spawn_daily_forecast_tasks(app_state.clone());
    }

    let app = api::router(app_state, &cfg);
    let addr = cfg.server.socket_addr()?;

    if cfg.server.host == "0.0.0.0" {
        warn!("Server binding to 0.0.0.0 - the API will be reachable from the network");
    }

    info!(
        %addr,
        zones = ?cfg.zones.enabled,
        checkpoint_dir = %cfg.zones.checkpoint_dir.display(),
        "starting Energy Pulse"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    info!("shutdown complete");
    Ok(())
}
