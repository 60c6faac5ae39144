/*!
Input data scaling
*/
use super::PriceSeries;
use crate::{CpuFloat, Error, Result};
use num::Float;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Min-max scaling of prices into `[0, 1]`
///
/// Fit once on the training data and then reused, unchanged, for every prediction made with the model trained
/// on it. Values outside the fitted range map outside `[0, 1]`; they are never clipped.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler<F = CpuFloat> {
    /// The smallest value seen while fitting
    pub min: F,
    /// The largest value seen while fitting
    pub max: F,
}

/// A normalized series: a price series' closing prices mapped through a scaler
pub type NormalizedSeries<F = CpuFloat> = Vec<F>;

impl<F> MinMaxScaler<F>
where
    F: Float + Display,
{
    /// Fit a scaler to a set of values
    pub fn fit_values(values: &[F]) -> Result<MinMaxScaler<F>> {
        let mut iter = values.iter().copied();
        let first = iter
            .next()
            .ok_or_else(|| Error::domain("cannot fit a scaler to an empty series"))?;
        let (min, max) = iter.fold((first, first), |(min, max), v| (min.min(v), max.max(v)));
        let scaler = MinMaxScaler { min, max };
        scaler.range()?;
        Ok(scaler)
    }

    /// The width of the fitted range, failing on a degenerate (constant) fit
    #[inline]
    pub fn range(&self) -> Result<F> {
        let range = self.max - self.min;
        if range > F::zero() && range.is_finite() {
            Ok(range)
        } else {
            Err(Error::domain(format!(
                "cannot normalize a constant series (min = {}, max = {})",
                self.min, self.max
            )))
        }
    }

    /// Scale a single value
    #[inline]
    pub fn transform(&self, val: F) -> Result<F> {
        Ok((val - self.min) / self.range()?)
    }

    /// Scale every value in a slice
    pub fn transform_values(&self, values: &[F]) -> Result<NormalizedSeries<F>> {
        let range = self.range()?;
        Ok(values.iter().map(|&v| (v - self.min) / range).collect())
    }

    /// Map a scaled value back to a price
    #[inline]
    pub fn inverse_transform(&self, val: F) -> F {
        val * (self.max - self.min) + self.min
    }
}

impl MinMaxScaler {
    /// Fit a scaler to the closing prices of a series
    pub fn fit(series: &PriceSeries) -> Result<MinMaxScaler> {
        MinMaxScaler::fit_values(&series.closes())
    }

    /// Normalize the closing prices of a series
    pub fn transform_series(&self, series: &PriceSeries) -> Result<NormalizedSeries> {
        if series.is_empty() {
            return Err(Error::domain("cannot normalize an empty series"));
        }
        self.transform_values(&series.closes())
    }
}
