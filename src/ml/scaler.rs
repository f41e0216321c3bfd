//! Min-max feature scaling
//!
//! `ScalerState` is an immutable value produced by [`ScalerState::fit`] and
//! passed explicitly to `transform` / `inverse`. It is persisted next to the
//! model weights, so a checkpoint always reproduces the scaling it was
//! trained with.

use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, ForecastResult};

/// Lower bound of the scaled range
const FEATURE_MIN: f64 = 0.0;
/// Upper bound of the scaled range
const FEATURE_MAX: f64 = 1.0;

/// Fitted affine map `scaled = (raw - data_min) * scale + min`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    pub min: f64,
    pub scale: f64,
    pub data_min: f64,
    pub data_max: f64,
    pub data_range: f64,
}

impl ScalerState {
    /// Fit on raw values so the observed range maps onto [0, 1].
    ///
    /// A constant series gets `data_range = 1` and `scale = 1`, so every
    /// value maps to `min`.
    pub fn fit(raw: &[f64]) -> ForecastResult<Self> {
        if raw.is_empty() {
            return Err(ForecastError::InsufficientData {
                required: 1,
                available: 0,
            });
        }
        if let Some(index) = raw.iter().position(|v| !v.is_finite()) {
            return Err(ForecastError::NonFiniteValue { index });
        }

        let data_min = raw.iter().copied().fold(f64::INFINITY, f64::min);
        let data_max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mut data_range = data_max - data_min;
        if data_range <= f64::EPSILON * data_max.abs().max(1.0) {
            data_range = 1.0;
        }
        let scale = (FEATURE_MAX - FEATURE_MIN) / data_range;

        Ok(Self {
            min: FEATURE_MIN,
            scale,
            data_min,
            data_max,
            data_range,
        })
    }

    pub fn transform_value(&self, raw: f64) -> f64 {
        (raw - self.data_min) * self.scale + self.min
    }

    pub fn inverse_value(&self, scaled: f64) -> f64 {
        (scaled - self.min) / self.scale + self.data_min
    }

    pub fn transform(&self, raw: &[f64]) -> Vec<f64> {
        raw.iter().map(|&v| self.transform_value(v)).collect()
    }

    pub fn inverse(&self, scaled: &[f64]) -> Vec<f64> {
        scaled.iter().map(|&v| self.inverse_value(v)).collect()
    }

    /// Every parameter finite and the scale usable as a divisor
    pub fn is_valid(&self) -> bool {
        [self.min, self.scale, self.data_min, self.data_max, self.data_range]
            .iter()
            .all(|v| v.is_finite())
            && self.scale != 0.0
            && self.data_range > 0.0
            && self.data_max >= self.data_min
    }
}
