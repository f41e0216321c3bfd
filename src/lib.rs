//! Energy Pulse: day-ahead electricity price forecasting.
//!
//! A recurrent model per bidding zone forecasts the next 24 hourly prices
//! from the last week of history; the forecast is reduced to the cheapest
//! and most expensive usage windows with a monthly savings estimate.

pub mod api;
pub mod config;
pub mod controller;
pub mod domain;
pub mod error;
pub mod forecast;
pub mod ml;
pub mod telemetry;
