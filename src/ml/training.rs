//! ML Model Training Pipeline
//!
//! Full-batch training of [`PriceLstm`] with burn's Adam on mean squared
//! error.

use burn::module::{AutodiffModule, Module};
use burn::nn::loss::{MseLoss, Reduction};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::{backend::AutodiffBackend, ElementConversion, Tensor};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use validator::Validate;

use super::models::PriceLstm;
use super::ValidationMetrics;
use crate::error::{ForecastError, ForecastResult};

/// Training Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TrainingConfig {
    #[validate(range(min = 1, max = 100000))]
    pub epochs: usize,
    #[validate(range(min = 1e-7, max = 1.0))]
    pub learning_rate: f64,
    /// Log the loss every `log_interval` epochs
    #[validate(range(min = 1))]
    pub log_interval: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 50,
            learning_rate: 0.001,
            log_interval: 10,
        }
    }
}

/// Result of a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingOutcome {
    pub epochs: usize,
    /// Training-set MSE (scaled units) of the final weights, dropout off
    pub final_loss: f64,
    /// Per-epoch training loss
    pub loss_history: Vec<f64>,
}

/// Model Trainer
pub struct ModelTrainer {
    config: TrainingConfig,
}

impl ModelTrainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Train `model` on scaled `[n, L]` inputs and `[n, H]` targets and
    /// return the trained copy.
    ///
    /// Every epoch is one full-batch forward/backward pass and one Adam step.
    /// Fails with `TrainingDiverged` as soon as the loss stops being finite.
    pub fn fit<B: AutodiffBackend>(
        &self,
        mut model: PriceLstm<B>,
        inputs: Tensor<B, 2>,
        targets: Tensor<B, 2>,
    ) -> ForecastResult<(PriceLstm<B>, TrainingOutcome)> {
        let mut optimizer = AdamConfig::new().init::<B, PriceLstm<B>>();
        let loss_fn = MseLoss::new();
        let mut loss_history = Vec::with_capacity(self.config.epochs);

        debug!(
            examples = inputs.dims()[0],
            parameters = model.num_params(),
            epochs = self.config.epochs,
            "Starting training"
        );

        for epoch in 1..=self.config.epochs {
            let predictions = model.forward(inputs.clone());
            let loss = loss_fn.forward(predictions, targets.clone(), Reduction::Mean);
            let value: f64 = loss.clone().into_scalar().elem();
            if !value.is_finite() {
                return Err(ForecastError::TrainingDiverged { epoch, loss: value });
            }
            loss_history.push(value);

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(self.config.learning_rate, model, grads);

            if epoch % self.config.log_interval == 0 {
                info!(epoch, epochs = self.config.epochs, loss = value, "Training progress");
            }
        }

        let evaluated = model.valid().forward(inputs.inner());
        let final_loss: f64 = loss_fn
            .forward(evaluated, targets.inner(), Reduction::Mean)
            .into_scalar()
            .elem();
        if !final_loss.is_finite() {
            return Err(ForecastError::TrainingDiverged {
                epoch: self.config.epochs,
                loss: final_loss,
            });
        }

        let outcome = TrainingOutcome {
            epochs: self.config.epochs,
            final_loss,
            loss_history,
        };
        Ok((model, outcome))
    }

    /// Calculate validation metrics; `None` when the inputs are empty or
    /// have different lengths.
    pub fn calculate_metrics(
        &self,
        predictions: &[f64],
        targets: &[f64],
    ) -> Option<ValidationMetrics> {
        if predictions.len() != targets.len() || predictions.is_empty() {
            return None;
        }

        let n = predictions.len() as f64;

        // Mean Absolute Error
        let mae: f64 = predictions
            .iter()
            .zip(targets.iter())
            .map(|(p, t)| (p - t).abs())
            .sum::<f64>()
            / n;

        // Root Mean Square Error
        let mse: f64 = predictions
            .iter()
            .zip(targets.iter())
            .map(|(p, t)| (p - t).powi(2))
            .sum::<f64>()
            / n;
        let rmse = mse.sqrt();

        // Mean Absolute Percentage Error, over non-zero targets only
        let (ape_sum, ape_count) = predictions
            .iter()
            .zip(targets.iter())
            .filter(|(_, t)| t.abs() > 1e-10)
            .fold((0.0, 0usize), |(sum, count), (p, t)| {
                (sum + ((p - t) / t).abs() * 100.0, count + 1)
            });
        let mape = if ape_count == 0 {
            0.0
        } else {
            ape_sum / ape_count as f64
        };

        // R-squared
        let mean_target: f64 = targets.iter().sum::<f64>() / n;
        let ss_tot: f64 = targets.iter().map(|t| (t - mean_target).powi(2)).sum();
        let ss_res: f64 = predictions
            .iter()
            .zip(targets.iter())
            .map(|(p, t)| (t - p).powi(2))
            .sum();

        let r2 = if ss_tot.abs() < 1e-10 {
            0.0
        } else {
            1.0 - (ss_res / ss_tot)
        };

        Some(ValidationMetrics::new(mae, rmse, mape, r2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{
        build_training_set, device, stack_examples, tensor_from_array, tensor_to_vec,
        ModelConfig, TrainingBackend,
    };
    use ndarray::Array2;
    use rstest::rstest;

    fn tiny_config() -> ModelConfig {
        ModelConfig {
            sequence_length: 8,
            prediction_hours: 2,
            hidden_size: 6,
            num_layers: 1,
            dropout: 0.0,
            head_size: 4,
            seed: 3,
        }
    }

    fn sine_dataset(n: usize, cfg: &ModelConfig) -> (Array2<f64>, Array2<f64>) {
        let series: Vec<f64> = (0..n + cfg.min_training_len())
            .map(|i| 0.5 + 0.4 * (i as f64 * std::f64::consts::PI / 6.0).sin())
            .collect();
        let examples = build_training_set(&series, cfg.sequence_length, cfg.prediction_hours)
            .unwrap();
        stack_examples(&examples)
    }

    fn train(
        cfg: &ModelConfig,
        training: TrainingConfig,
        inputs: &Array2<f64>,
        targets: &Array2<f64>,
    ) -> ForecastResult<(PriceLstm<TrainingBackend>, TrainingOutcome)> {
        let model = PriceLstm::<TrainingBackend>::seeded(cfg, &device());
        ModelTrainer::new(training).fit(
            model,
            tensor_from_array(inputs, &device()),
            tensor_from_array(targets, &device()),
        )
    }

    #[test]
    fn test_default_training_config() {
        let cfg = TrainingConfig::default();
        assert_eq!(cfg.epochs, 50);
        assert_eq!(cfg.learning_rate, 0.001);
        assert_eq!(cfg.log_interval, 10);
        assert!(cfg.validate().is_ok());
    }

    #[rstest]
    #[case(0, 0.001, 10)]
    #[case(50, 0.0, 10)]
    #[case(50, 2.0, 10)]
    #[case(50, 0.001, 0)]
    fn test_training_config_rejects(
        #[case] epochs: usize,
        #[case] learning_rate: f64,
        #[case] log_interval: usize,
    ) {
        let cfg = TrainingConfig {
            epochs,
            learning_rate,
            log_interval,
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_training_reduces_loss() {
        let cfg = tiny_config();
        let (inputs, targets) = sine_dataset(40, &cfg);
        let training = TrainingConfig {
            epochs: 60,
            learning_rate: 0.01,
            log_interval: 20,
        };
        let (_, outcome) = train(&cfg, training, &inputs, &targets).unwrap();

        assert_eq!(outcome.epochs, 60);
        assert_eq!(outcome.loss_history.len(), 60);
        assert!(outcome.final_loss.is_finite());
        assert!(
            outcome.final_loss < outcome.loss_history[0],
            "loss did not improve: {} -> {}",
            outcome.loss_history[0],
            outcome.final_loss
        );
    }

    #[test]
    fn test_training_is_deterministic_for_a_seed() {
        let cfg = ModelConfig {
            num_layers: 2,
            ..tiny_config()
        };
        let (inputs, targets) = sine_dataset(10, &cfg);
        let run = || {
            let training = TrainingConfig {
                epochs: 5,
                learning_rate: 0.01,
                log_interval: 5,
            };
            let (model, outcome) = train(&cfg, training, &inputs, &targets).unwrap();
            let forecast = model.valid().forward(tensor_from_array(&inputs, &device()));
            (tensor_to_vec(forecast), outcome.loss_history)
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_dropout_only_applies_while_training() {
        let cfg = ModelConfig {
            num_layers: 2,
            dropout: 0.5,
            ..tiny_config()
        };
        let (inputs, targets) = sine_dataset(10, &cfg);
        let training = TrainingConfig {
            epochs: 5,
            learning_rate: 0.01,
            log_interval: 5,
        };
        let (model, _) = train(&cfg, training, &inputs, &targets).unwrap();

        let evaluated = model.valid();
        let first = tensor_to_vec(evaluated.forward(tensor_from_array(&inputs, &device())));
        let second = tensor_to_vec(evaluated.forward(tensor_from_array(&inputs, &device())));
        assert_eq!(first, second);
        assert!(first.iter().any(|v| *v != 0.0));
    }

    #[test]
    fn test_divergence_is_reported() {
        let cfg = tiny_config();
        let (inputs, mut targets) = sine_dataset(4, &cfg);
        targets[[0, 0]] = f64::NAN;

        let result = train(&cfg, TrainingConfig::default(), &inputs, &targets);
        assert!(matches!(
            result,
            Err(ForecastError::TrainingDiverged { epoch: 1, .. })
        ));
    }

    #[test]
    fn test_calculate_metrics() {
        let trainer = ModelTrainer::new(TrainingConfig::default());

        let predictions = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let targets = vec![1.1, 2.1, 2.9, 4.2, 4.8];

        let metrics = trainer.calculate_metrics(&predictions, &targets).unwrap();

        assert!(metrics.mae < 0.3);
        assert!(metrics.rmse < 0.4);
        assert!(metrics.r2 > 0.9);
    }

    #[test]
    fn test_calculate_metrics_edge_cases() {
        let trainer = ModelTrainer::new(TrainingConfig::default());
        assert!(trainer.calculate_metrics(&[], &[]).is_none());
        assert!(trainer.calculate_metrics(&[1.0], &[1.0, 2.0]).is_none());

        // constant targets: R² is reported as 0, MAPE ignores zero targets
        let metrics = trainer.calculate_metrics(&[0.0, 0.0], &[0.0, 0.0]).unwrap();
        assert_eq!(metrics.r2, 0.0);
        assert_eq!(metrics.mape, 0.0);
        assert_eq!(metrics.mae, 0.0);
    }
}
