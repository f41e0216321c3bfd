//! One independently locked engine per bidding zone.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use super::engine::{EngineConfig, ForecastEngine};
use crate::domain::BiddingZone;
use crate::error::ForecastResult;
use crate::ml::ModelConfig;

pub struct EngineRegistry {
    engines: BTreeMap<BiddingZone, Arc<ForecastEngine>>,
}

impl EngineRegistry {
    /// Restore an engine for every zone from `checkpoint_dir`.
    ///
    /// Fails on the first unusable checkpoint.
    pub fn load(
        zones: &[BiddingZone],
        model: &ModelConfig,
        checkpoint_dir: &Path,
    ) -> ForecastResult<Self> {
        let mut engines = BTreeMap::new();
        for &zone in zones {
            let path = Self::checkpoint_path(checkpoint_dir, zone);
            let config = EngineConfig::new(model.clone(), path);
            let engine = ForecastEngine::load(config)?;
            info!(%zone, status = ?engine.status(), "Forecast engine ready");
            engines.insert(zone, Arc::new(engine));
        }
        Ok(Self { engines })
    }

    pub fn from_engines(engines: impl IntoIterator<Item = (BiddingZone, ForecastEngine)>) -> Self {
        Self {
            engines: engines
                .into_iter()
                .map(|(zone, engine)| (zone, Arc::new(engine)))
                .collect(),
        }
    }

    /// `<dir>/lstm_price_<zone>.bin`
    pub fn checkpoint_path(dir: &Path, zone: BiddingZone) -> PathBuf {
        dir.join(format!("lstm_price_{}.bin", zone.as_str().to_lowercase()))
    }

    pub fn get(&self, zone: BiddingZone) -> Option<Arc<ForecastEngine>> {
        self.engines.get(&zone).cloned()
    }

    pub fn zones(&self) -> impl Iterator<Item = BiddingZone> + '_ {
        self.engines.keys().copied()
    }

    pub fn trained_count(&self) -> usize {
        self.engines.values().filter(|e| e.is_trained()).count()
    }
}
