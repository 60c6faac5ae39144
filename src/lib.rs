/*!
An LSTM for predicting next-day closing prices of stocks, written in Rust using PyTorch bindings.

Daily closing prices are fetched from [Yahoo Finance](https://finance.yahoo.com/) (or read from CSV files),
min-max scaled, cut into fixed-length windows and fed to a small stacked LSTM. A [`session::PredictionSession`]
ties a trained model to a data source and produces multi-stock predictions, optionally refreshing the latest
prices on an interval.
*/
#![forbid(missing_docs)]

pub mod artifact;
pub mod data;
pub mod error;
pub mod lstm;
pub mod predict;
pub mod session;
pub mod util;

pub use error::{Error, Result};

/// The floating point type to be used for CPU calculations
pub type CpuFloat = f64;

/// The floating point type to be used for GPU calculations
pub type GpuFloat = f32;

/// The default number of past closing prices fed to the model
pub const WINDOW_SIZE: usize = 60;
