//! ML Model Implementations
//!
//! The price forecasting LSTM on burn, generic over the backend so one
//! definition serves training (autodiff) and inference.

pub mod price_lstm;

pub use price_lstm::{tensor_from_array, tensor_to_vec, PriceLstm};
