use chrono::{DateTime, Days, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

use super::AppState;
use crate::domain::BiddingZone;

/// Task status tracking
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskStatus {
    pub last_run: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub run_count: u64,
    pub success_count: u64,
    pub error_count: u64,
}

/// Next instant strictly after `now` at which the local clock in `tz` reads
/// `hour:00`.
///
/// A local hour skipped by a DST jump falls through to the following day;
/// an hour that occurs twice resolves to its first occurrence.
pub fn next_run_after(now: DateTime<Utc>, hour: u32, tz: Tz) -> DateTime<Utc> {
    let today = now.with_timezone(&tz).date_naive();
    (0..=2u64)
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .filter_map(|date| date.and_hms_opt(hour, 0, 0))
        .filter_map(|naive| tz.from_local_datetime(&naive).earliest())
        .map(|local| local.with_timezone(&Utc))
        .find(|candidate| *candidate > now)
        .unwrap_or_else(|| now + chrono::Duration::hours(24))
}

/// One refresh of `zone`, recorded in the shared schedule status.
///
/// A zone skipped for lack of a model or history counts as a success.
pub async fn run_scheduled_refresh(state: &AppState, zone: BiddingZone) {
    let started = Utc::now();
    {
        let mut s = state.schedule.write().await;
        s.last_run = Some(started);
        s.run_count += 1;
    }

    let outcome = state.service.refresh_zone(zone).await;
    let mut s = state.schedule.write().await;
    match outcome {
        Ok(refreshed) => {
            s.last_success = Some(started);
            s.success_count += 1;
            s.last_error = None;
            info!(%zone, refreshed, "Daily forecast run completed");
        }
        Err(e) => {
            s.error_count += 1;
            s.last_error = Some(format!("{zone}: {e}"));
            error!(%zone, error = %e, "Daily forecast run failed");
        }
    }
}

/// Regenerate each zone's forecast once a day at the configured hour of
/// that zone's local clock.
pub fn spawn_daily_forecast_tasks(state: AppState) -> Vec<JoinHandle<()>> {
    let hour = state.cfg.schedule.daily_forecast_hour;

    state
        .service
        .zones()
        .into_iter()
        .map(|zone| {
            let state = state.clone();
            let tz = zone.timezone();
            tokio::spawn(async move {
                info!(%zone, hour, timezone = tz.name(), "Daily forecast task enabled");
                loop {
                    let now = Utc::now();
                    let next_run = next_run_after(now, hour, tz);
                    let wait = (next_run - now).to_std().unwrap_or(Duration::from_secs(60));
                    info!(
                        %zone,
                        next_run = %next_run.with_timezone(&tz).format("%Y-%m-%d %H:%M %Z"),
                        in_minutes = wait.as_secs() / 60,
                        "Next daily forecast scheduled"
                    );
                    sleep(wait).await;

                    run_scheduled_refresh(&state, zone).await;
                }
            })
        })
        .collect()
}
