//! Forecast engine
//!
//! Owns the trained (model, scaler) pair of one bidding zone and drives the
//! train / predict / persist / load lifecycle.
//!
//! The pair lives behind an `Arc` that is swapped as a whole: predictions
//! clone the current `Arc` and never see weights from one training run
//! combined with the scaler of another. Training is serialized per engine and
//! only publishes once the checkpoint is on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use burn::module::AutodiffModule;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn};
use uuid::Uuid;

use super::windows::summarize;
use crate::domain::WindowRecommendation;
use crate::error::{ForecastError, ForecastResult};
use crate::ml::{
    build_inference_window, build_training_set, device, stack_examples, tensor_from_array,
    tensor_to_vec, Checkpoint, InferenceBackend, ModelConfig, ModelMetadata, ModelTrainer,
    PriceLstm, ScalerState, TrainingBackend, TrainingConfig,
};

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub model: ModelConfig,
    pub checkpoint_path: PathBuf,
}

impl EngineConfig {
    pub fn new(model: ModelConfig, checkpoint_path: impl Into<PathBuf>) -> Self {
        Self {
            model,
            checkpoint_path: checkpoint_path.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    Untrained,
    Trained,
}

/// Weights and the scaler they were trained with, always published together
#[derive(Debug)]
pub struct TrainedModel {
    /// burn modules are `Send` but not `Sync`
    pub model: Mutex<PriceLstm<InferenceBackend>>,
    pub scaler: ScalerState,
    pub metadata: ModelMetadata,
}

impl From<Checkpoint> for TrainedModel {
    fn from(checkpoint: Checkpoint) -> Self {
        Self {
            model: Mutex::new(checkpoint.model),
            scaler: checkpoint.scaler,
            metadata: checkpoint.metadata,
        }
    }
}

/// Summary of a completed training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub model_id: String,
    pub training_samples: usize,
    pub epochs: usize,
    pub final_loss: f64,
    pub validation_metrics: crate::ml::ValidationMetrics,
    pub duration_ms: u64,
}

/// Forecast vector plus the usage guidance derived from it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineForecast {
    pub prices: Vec<f64>,
    pub recommendation: WindowRecommendation,
    pub model_id: String,
}

pub struct ForecastEngine {
    config: EngineConfig,
    state: RwLock<Option<Arc<TrainedModel>>>,
    training: Mutex<()>,
}

impl ForecastEngine {
    /// Untrained engine; nothing is read from disk.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            state: RwLock::new(None),
            training: Mutex::new(()),
        }
    }

    /// Engine restored from its checkpoint, or untrained when none exists.
    ///
    /// A checkpoint that exists but cannot be used is an error; the host must
    /// not serve predictions with undefined state.
    pub fn load(config: EngineConfig) -> ForecastResult<Self> {
        let engine = Self::new(config);
        let path = engine.checkpoint_path();

        match Checkpoint::load(path)? {
            Some(checkpoint) => {
                if !checkpoint.config.same_architecture(&engine.config.model) {
                    return Err(ForecastError::CheckpointCorrupt {
                        path: path.to_path_buf(),
                        reason: "model architecture does not match configuration".to_string(),
                    });
                }
                info!(
                    path = %path.display(),
                    model_id = %checkpoint.metadata.model_id,
                    trained_at = %checkpoint.metadata.trained_at,
                    "Loaded trained model"
                );
                *engine.state.write() = Some(Arc::new(TrainedModel::from(checkpoint)));
            }
            None => {
                info!(path = %path.display(), "No saved model found, engine starts untrained");
            }
        }
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn checkpoint_path(&self) -> &Path {
        &self.config.checkpoint_path
    }

    pub fn status(&self) -> EngineStatus {
        if self.state.read().is_some() {
            EngineStatus::Trained
        } else {
            EngineStatus::Untrained
        }
    }

    pub fn is_trained(&self) -> bool {
        self.status() == EngineStatus::Trained
    }

    pub fn metadata(&self) -> Option<ModelMetadata> {
        self.current().map(|trained| trained.metadata.clone())
    }

    pub fn scaler_state(&self) -> Option<ScalerState> {
        self.current().map(|trained| trained.scaler)
    }

    fn current(&self) -> Option<Arc<TrainedModel>> {
        self.state.read().clone()
    }

    /// Train a fresh model on `series` (chronological raw prices), persist it
    /// and make it the live model.
    ///
    /// Blocks for the whole run. On any failure the previously live model
    /// (if any) stays in place and the checkpoint on disk is untouched.
    pub fn train(
        &self,
        series: &[f64],
        training: &TrainingConfig,
    ) -> ForecastResult<TrainingReport> {
        let _guard = self.training.lock();
        let model_id = format!("price_lstm_{}", Uuid::new_v4());
        let span = info_span!("train", path = %self.checkpoint_path().display(), %model_id);
        let _enter = span.enter();
        let started = Instant::now();
        let cfg = &self.config.model;

        let examples = build_training_set(series, cfg.sequence_length, cfg.prediction_hours)?;
        // windows cover every observation, so fitting on the series equals
        // fitting on the flattened windows
        let scaler = ScalerState::fit(series)?;
        let (raw_inputs, raw_targets) = stack_examples(&examples);
        let inputs = raw_inputs.mapv(|v| scaler.transform_value(v));
        let targets = raw_targets.mapv(|v| scaler.transform_value(v));

        info!(
            observations = series.len(),
            examples = examples.len(),
            epochs = training.epochs,
            "Training price model"
        );

        let device = device();
        let model = PriceLstm::<TrainingBackend>::seeded(cfg, &device);
        let trainer = ModelTrainer::new(training.clone());
        let (model, outcome) = trainer
            .fit(
                model,
                tensor_from_array(&inputs, &device),
                tensor_from_array(&targets, &device),
            )
            .map_err(|e| {
                warn!(error = %e, "Training aborted, keeping previous model");
                e
            })?;
        let model = model.valid();

        let fitted = tensor_to_vec(model.forward(tensor_from_array(&inputs, &device)));
        let predictions = scaler.inverse(&fitted);
        let validation_metrics = trainer
            .calculate_metrics(&predictions, &raw_targets.into_raw_vec())
            .unwrap_or_else(|| crate::ml::ValidationMetrics::new(0.0, 0.0, 0.0, 0.0));

        let metadata = ModelMetadata {
            model_id,
            version: env!("CARGO_PKG_VERSION").to_string(),
            trained_at: Utc::now(),
            training_samples: examples.len(),
            epochs: outcome.epochs,
            final_loss: outcome.final_loss,
            validation_metrics,
        };

        let checkpoint = Checkpoint::new(cfg.clone(), metadata, model, scaler);
        checkpoint.save(self.checkpoint_path())?;

        let trained = TrainedModel::from(checkpoint);
        let report = TrainingReport {
            model_id: trained.metadata.model_id.clone(),
            training_samples: trained.metadata.training_samples,
            epochs: trained.metadata.epochs,
            final_loss: trained.metadata.final_loss,
            validation_metrics,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        *self.state.write() = Some(Arc::new(trained));

        info!(
            model_id = %report.model_id,
            final_loss = report.final_loss,
            mae = validation_metrics.mae,
            duration_ms = report.duration_ms,
            "Training completed"
        );
        Ok(report)
    }

    /// Forecast the next `prediction_hours` raw prices from the tail of
    /// `recent`.
    pub fn predict(&self, recent: &[f64]) -> ForecastResult<Vec<f64>> {
        let trained = self.current().ok_or(ForecastError::ModelNotTrained)?;
        Self::predict_with(&trained, recent, self.config.model.sequence_length)
    }

    fn predict_with(
        trained: &TrainedModel,
        recent: &[f64],
        sequence_length: usize,
    ) -> ForecastResult<Vec<f64>> {
        let window = build_inference_window(recent, sequence_length)?;
        let scaled = trained.scaler.transform(window);
        let output = trained.model.lock().forward_window(&scaled, &device());
        Ok(trained.scaler.inverse(&output))
    }

    /// Forecast plus cheapest/peak window guidance.
    ///
    /// `start_hour` is the local hour of the first forecast hour.
    pub fn recommend(
        &self,
        recent: &[f64],
        start_hour: u32,
        window_hours: usize,
    ) -> ForecastResult<EngineForecast> {
        let trained = self.current().ok_or(ForecastError::ModelNotTrained)?;
        let prices = Self::predict_with(&trained, recent, self.config.model.sequence_length)?;
        let recommendation = summarize(&prices, window_hours, start_hour)?;

        Ok(EngineForecast {
            prices,
            recommendation,
            model_id: trained.metadata.model_id.clone(),
        })
    }
}
