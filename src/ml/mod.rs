//! Machine Learning Module
//!
//! Everything the price forecaster needs below the engine:
//! - Sequence construction from raw price history
//! - Min-max feature scaling with an explicit, persisted state
//! - The recurrent sequence-to-vector price model
//! - The training loop (Adam, MSE) and accuracy metrics
//! - Checkpoint persistence
//!
//! Models run on burn's ndarray backend; training wraps it in `Autodiff`.

use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};
use serde::{Deserialize, Serialize};
use validator::Validate;

pub mod checkpoint;
pub mod models;
pub mod scaler;
pub mod sequence;
pub mod training;

pub use checkpoint::Checkpoint;
pub use models::{tensor_from_array, tensor_to_vec, PriceLstm};
pub use scaler::ScalerState;
pub use sequence::{build_inference_window, build_training_set, stack_examples, TrainingExample};
pub use training::{ModelTrainer, TrainingConfig, TrainingOutcome};

/// Backend for forecasting and restored checkpoints
pub type InferenceBackend = NdArray<f32>;
/// Backend the trainer differentiates through
pub type TrainingBackend = Autodiff<InferenceBackend>;

pub fn device() -> NdArrayDevice {
    NdArrayDevice::Cpu
}

/// Architecture and shape of the price model.
///
/// Fixed for the lifetime of an engine; a checkpoint trained with a
/// different shape is rejected on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ModelConfig {
    /// Input window length L (hours of history)
    #[validate(range(min = 1))]
    pub sequence_length: usize,
    /// Forecast horizon H (hours ahead)
    #[validate(range(min = 1))]
    pub prediction_hours: usize,
    /// Width of every recurrent layer
    #[validate(range(min = 1))]
    pub hidden_size: usize,
    /// Number of stacked recurrent layers
    #[validate(range(min = 1))]
    pub num_layers: usize,
    /// Dropout between recurrent layers, training only
    #[validate(range(min = 0.0, max = 0.95))]
    pub dropout: f64,
    /// Width of the hidden layer of the feed-forward head
    #[validate(range(min = 1))]
    pub head_size: usize,
    /// Seed for weight initialization and dropout masks
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            sequence_length: 168, // 7 days hourly
            prediction_hours: 24,
            hidden_size: 64,
            num_layers: 2,
            dropout: 0.2,
            head_size: 32,
            seed: 42,
        }
    }
}

impl ModelConfig {
    /// Minimum history needed to build one training example
    pub fn min_training_len(&self) -> usize {
        self.sequence_length + self.prediction_hours
    }

    /// Whether weights trained under `other` can be evaluated under `self`.
    /// Dropout and seed only affect training.
    pub fn same_architecture(&self, other: &ModelConfig) -> bool {
        self.sequence_length == other.sequence_length
            && self.prediction_hours == other.prediction_hours
            && self.hidden_size == other.hidden_size
            && self.num_layers == other.num_layers
            && self.head_size == other.head_size
    }
}

/// ML Model Metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_id: String,
    pub version: String,
    pub trained_at: chrono::DateTime<chrono::Utc>,
    pub training_samples: usize,
    pub epochs: usize,
    pub final_loss: f64,
    pub validation_metrics: ValidationMetrics,
}

/// Validation Metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub mae: f64,  // Mean Absolute Error
    pub rmse: f64, // Root Mean Square Error
    pub mape: f64, // Mean Absolute Percentage Error
    pub r2: f64,   // R-squared
}

impl ValidationMetrics {
    pub fn new(mae: f64, rmse: f64, mape: f64, r2: f64) -> Self {
        Self {
            mae,
            rmse,
            mape,
            r2,
        }
    }
}
