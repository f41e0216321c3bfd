use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::BiddingZone;
use crate::forecast::DEFAULT_WINDOW_HOURS;
use crate::ml::{ModelConfig, TrainingConfig};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const ENV_PREFIX: &str = "ENERGY_PULSE__";

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub server: ServerConfig,
    #[validate(nested)]
    pub logging: LoggingConfig,
    #[validate(nested)]
    pub model: ModelConfig,
    #[validate(nested)]
    pub training: TrainingConfig,
    #[validate(nested)]
    pub zones: ZonesConfig,
    #[validate(nested)]
    pub schedule: ScheduleConfig,
    #[validate(nested)]
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub host: String,
    pub port: u16,
    /// Upper bound for a single request, training included
    #[validate(range(min = 1))]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 900,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    #[validate(length(min = 1))]
    pub filter: String,
    /// JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,tower_http=info,hyper=warn".to_string(),
            json: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ZonesConfig {
    pub default_zone: BiddingZone,
    #[validate(length(min = 1))]
    pub enabled: Vec<BiddingZone>,
    /// One checkpoint per zone lives here
    pub checkpoint_dir: PathBuf,
}

impl Default for ZonesConfig {
    fn default() -> Self {
        Self {
            default_zone: BiddingZone::DeLu,
            enabled: vec![BiddingZone::DeLu],
            checkpoint_dir: PathBuf::from("models"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ScheduleConfig {
    pub enabled: bool,
    /// Hour of the daily forecast run, in each zone's local time
    #[validate(range(max = 23))]
    pub daily_forecast_hour: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            daily_forecast_hour: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AnalysisConfig {
    #[validate(range(min = 1))]
    pub window_hours: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_hours: DEFAULT_WINDOW_HOURS,
        }
    }
}

impl Config {
    /// Defaults, then `config/default.toml` (optional), then
    /// `ENERGY_PULSE__SECTION__KEY` environment variables.
    pub fn load() -> Result<Self> {
        Self::from_figment(Self::figment(Path::new(DEFAULT_CONFIG_PATH)))
    }

    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let cfg: Config = figment.extract()?;
        cfg.check()?;
        Ok(cfg)
    }

    /// Field validation plus the cross-field rules
    pub fn check(&self) -> Result<()> {
        self.validate()?;
        ensure!(
            self.zones.enabled.contains(&self.zones.default_zone),
            "default zone {} is not in the enabled zones",
            self.zones.default_zone
        );
        ensure!(
            self.analysis.window_hours <= self.model.prediction_hours,
            "analysis window of {}h exceeds the {}h forecast horizon",
            self.analysis.window_hours,
            self.model.prediction_hours
        );
        Ok(())
    }
}
