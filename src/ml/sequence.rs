//! Sliding-window sequence construction
//!
//! Turns a chronological price series into (input window, target window)
//! training pairs and extracts the single window used for inference.

use ndarray::Array2;

use crate::error::{ForecastError, ForecastResult};

/// One supervised example: `sequence_length` inputs followed by
/// `prediction_hours` targets.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingExample {
    pub input: Vec<f64>,
    pub target: Vec<f64>,
}

/// Build every training pair from `series`, in chronological start order.
///
/// Start indices run from 0 to `N - L - H` inclusive, giving `N - L - H + 1`
/// examples.
pub fn build_training_set(
    series: &[f64],
    sequence_length: usize,
    prediction_hours: usize,
) -> ForecastResult<Vec<TrainingExample>> {
    let window = sequence_length + prediction_hours;
    if series.len() < window || window == 0 {
        return Err(ForecastError::InsufficientData {
            required: window.max(1),
            available: series.len(),
        });
    }

    Ok(series
        .windows(window)
        .map(|w| TrainingExample {
            input: w[..sequence_length].to_vec(),
            target: w[sequence_length..].to_vec(),
        })
        .collect())
}

/// Last `sequence_length` observations of `series`.
///
/// A NaN or infinite value inside the window is `NonFiniteValue`, indexed
/// into `series`.
pub fn build_inference_window(
    series: &[f64],
    sequence_length: usize,
) -> ForecastResult<&[f64]> {
    if series.len() < sequence_length || sequence_length == 0 {
        return Err(ForecastError::InsufficientData {
            required: sequence_length.max(1),
            available: series.len(),
        });
    }
    let start = series.len() - sequence_length;
    let window = &series[start..];
    if let Some(offset) = window.iter().position(|v| !v.is_finite()) {
        return Err(ForecastError::NonFiniteValue {
            index: start + offset,
        });
    }
    Ok(window)
}

/// Stack examples into dense `[n, L]` input and `[n, H]` target matrices.
pub fn stack_examples(examples: &[TrainingExample]) -> (Array2<f64>, Array2<f64>) {
    let n = examples.len();
    let l = examples.first().map_or(0, |e| e.input.len());
    let h = examples.first().map_or(0, |e| e.target.len());

    let inputs = Array2::from_shape_fn((n, l), |(i, t)| examples[i].input[t]);
    let targets = Array2::from_shape_fn((n, h), |(i, t)| examples[i].target[t]);
    (inputs, targets)
}
