//! Price Forecasting LSTM Model
//!
//! Sequence-to-vector recurrent network over scaled hourly prices:
//! stacked burn LSTM layers (dropout between them while training), then the
//! last hidden state of the top layer goes through a small feed-forward head
//! `Linear(hidden -> head) -> ReLU -> Linear(head -> horizon)`.
//!
//! Input windows are `[batch, sequence_length]` with one feature per step;
//! outputs are `[batch, prediction_hours]`, all in scaled units.

use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Initializer, Linear, LinearConfig, Lstm, LstmConfig};
use burn::tensor::{activation::relu, backend::Backend, Tensor, TensorData};
use ndarray::Array2;
use parking_lot::Mutex;

use crate::ml::ModelConfig;

/// Features per time step (the price itself)
const INPUT_FEATURES: usize = 1;

/// The ndarray backend keeps one process-wide RNG; seeding and drawing the
/// initial weights happen under this lock.
static BACKEND_RNG: Mutex<()> = parking_lot::const_mutex(());

#[derive(Module, Debug)]
pub struct PriceLstm<B: Backend> {
    layers: Vec<Lstm<B>>,
    dropout: Dropout,
    head_hidden: Linear<B>,
    head_out: Linear<B>,
}

impl<B: Backend> PriceLstm<B> {
    /// Fresh model drawn from the backend's current RNG state.
    ///
    /// The output layer starts at zero, so an untrained model predicts the
    /// bottom of the scaled range for every hour.
    pub fn new(config: &ModelConfig, device: &B::Device) -> Self {
        let layers = (0..config.num_layers)
            .map(|idx| {
                let d_input = if idx == 0 {
                    INPUT_FEATURES
                } else {
                    config.hidden_size
                };
                LstmConfig::new(d_input, config.hidden_size, true).init(device)
            })
            .collect();

        Self {
            layers,
            dropout: DropoutConfig::new(config.dropout).init(),
            head_hidden: LinearConfig::new(config.hidden_size, config.head_size).init(device),
            head_out: LinearConfig::new(config.head_size, config.prediction_hours)
                .with_initializer(Initializer::Zeros)
                .init(device),
        }
    }

    /// Fresh model whose weights depend only on `config.seed`.
    pub fn seeded(config: &ModelConfig, device: &B::Device) -> Self {
        let _rng = BACKEND_RNG.lock();
        B::seed(config.seed);
        Self::new(config, device)
    }

    /// Batched forward pass, `[batch, L] -> [batch, H]`.
    ///
    /// Dropout is only active on an autodiff backend.
    pub fn forward(&self, inputs: Tensor<B, 2>) -> Tensor<B, 2> {
        let [batch, steps] = inputs.dims();
        let mut x = inputs.reshape([batch, steps, INPUT_FEATURES]);

        let top = self.layers.len().saturating_sub(1);
        for (idx, layer) in self.layers.iter().enumerate() {
            let (output, _state) = layer.forward(x, None);
            x = if idx < top {
                self.dropout.forward(output)
            } else {
                output
            };
        }

        let [batch, steps, hidden] = x.dims();
        let last_hidden = x
            .slice([0..batch, steps - 1..steps, 0..hidden])
            .reshape([batch, hidden]);
        let head = relu(self.head_hidden.forward(last_hidden));
        self.head_out.forward(head)
    }

    /// Forecast for a single scaled window.
    pub fn forward_window(&self, window: &[f64], device: &B::Device) -> Vec<f64> {
        let values: Vec<f32> = window.iter().map(|&v| v as f32).collect();
        let input = Tensor::from_data(TensorData::new(values, [1, window.len()]), device);
        tensor_to_vec(self.forward(input))
    }
}

/// `[rows, cols]` float tensor from a dense matrix
pub fn tensor_from_array<B: Backend>(array: &Array2<f64>, device: &B::Device) -> Tensor<B, 2> {
    let values: Vec<f32> = array.iter().map(|&v| v as f32).collect();
    Tensor::from_data(TensorData::new(values, [array.nrows(), array.ncols()]), device)
}

/// Row-major values of `tensor`
pub fn tensor_to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Vec<f64> {
    tensor.into_data().iter::<f32>().map(f64::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{device, InferenceBackend};

    fn config() -> ModelConfig {
        ModelConfig {
            sequence_length: 6,
            prediction_hours: 3,
            hidden_size: 5,
            num_layers: 2,
            dropout: 0.5,
            head_size: 4,
            seed: 9,
        }
    }

    #[test]
    fn test_output_shape_for_batch_and_single_window() {
        let cfg = config();
        let model = PriceLstm::<InferenceBackend>::seeded(&cfg, &device());

        let batch = Array2::from_shape_fn((4, 6), |(r, c)| (r + c) as f64 / 10.0);
        let output = model.forward(tensor_from_array(&batch, &device()));
        assert_eq!(output.dims(), [4, 3]);

        let single = model.forward_window(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6], &device());
        assert_eq!(single.len(), 3);
    }

    #[test]
    fn test_untrained_model_outputs_zero() {
        let model = PriceLstm::<InferenceBackend>::seeded(&config(), &device());
        let output = model.forward_window(&[0.9, 0.1, 0.4, 0.7, 0.3, 0.5], &device());
        assert_eq!(output, vec![0.0; 3]);
    }

    #[test]
    fn test_same_seed_gives_same_weights() {
        let cfg = config();
        let a = PriceLstm::<InferenceBackend>::seeded(&cfg, &device());
        let b = PriceLstm::<InferenceBackend>::seeded(&cfg, &device());
        let other = PriceLstm::<InferenceBackend>::seeded(
            &ModelConfig {
                seed: 10,
                ..cfg.clone()
            },
            &device(),
        );

        let weights =
            |m: &PriceLstm<InferenceBackend>| tensor_to_vec(m.head_hidden.weight.val());
        assert_eq!(weights(&a), weights(&b));
        assert_ne!(weights(&a), weights(&other));
    }

    #[test]
    fn test_parameter_count_follows_config() {
        let cfg = config();
        let small = PriceLstm::<InferenceBackend>::new(&cfg, &device());
        let wide = PriceLstm::<InferenceBackend>::new(
            &ModelConfig {
                hidden_size: 8,
                ..cfg.clone()
            },
            &device(),
        );
        assert!(wide.num_params() > small.num_params());

        let single_layer = PriceLstm::<InferenceBackend>::new(
            &ModelConfig {
                num_layers: 1,
                ..cfg
            },
            &device(),
        );
        assert!(single_layer.num_params() < small.num_params());
    }
}
