use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by the forecasting core.
///
/// Callers branch on the variant: `InsufficientData` and `ModelNotTrained`
/// are expected outcomes, `InvalidWindow` is a logic fault and
/// `CheckpointCorrupt` must stop the host from serving predictions.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("Insufficient data: need at least {required} observations, got {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Model not trained yet")]
    ModelNotTrained,

    #[error("Invalid window: width {width} over {len} values")]
    InvalidWindow { width: usize, len: usize },

    #[error("Checkpoint {} is corrupt: {reason}", path.display())]
    CheckpointCorrupt { path: PathBuf, reason: String },

    #[error("Checkpoint I/O failed for {}: {source}", path.display())]
    CheckpointIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Training diverged at epoch {epoch}: loss {loss}")]
    TrainingDiverged { epoch: usize, loss: f64 },

    #[error("Non-finite value at index {index}")]
    NonFiniteValue { index: usize },

    #[error("Series timestamps not strictly increasing at index {index}")]
    UnorderedSeries { index: usize },
}

pub type ForecastResult<T> = std::result::Result<T, ForecastError>;
