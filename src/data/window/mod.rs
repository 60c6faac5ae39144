/*!
Cutting normalized series into fixed-length windows
*/
use super::scale::{MinMaxScaler, NormalizedSeries};
use super::PriceSeries;
use crate::{CpuFloat, Error, Result, WINDOW_SIZE};

/// A training example: a window of normalized prices and the value which followed it
#[derive(Debug, Clone, PartialEq)]
pub struct Sample<F = CpuFloat> {
    /// `size` consecutive normalized prices
    pub input: Vec<F>,
    /// The normalized price immediately following `input`
    pub target: F,
}

/// Every window of a normalized series, in order of offset
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrainingSet<F = CpuFloat> {
    /// The window size every sample was built with
    pub window: usize,
    /// The samples, one per valid offset
    pub samples: Vec<Sample<F>>,
}

impl<F> TrainingSet<F> {
    /// The number of samples in this set
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether this set holds no samples
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Builds training and inference windows of a fixed size
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct WindowBuilder {
    /// The number of values in a window
    pub size: usize,
}

impl Default for WindowBuilder {
    fn default() -> WindowBuilder {
        WindowBuilder { size: WINDOW_SIZE }
    }
}

impl WindowBuilder {
    /// Create a window builder for windows of `size` values
    #[inline]
    pub fn new(size: usize) -> WindowBuilder {
        WindowBuilder { size }
    }

    /// Build every `(series[i..i + size], series[i + size])` pair of a series.
    ///
    /// Fails unless the series is longer than the window.
    pub fn training_set<F: Copy>(&self, series: &[F]) -> Result<TrainingSet<F>> {
        if series.len() <= self.size {
            return Err(Error::domain(format!(
                "insufficient history: {} points, need more than {}",
                series.len(),
                self.size
            )));
        }
        let samples = series
            .windows(self.size + 1)
            .map(|window| Sample {
                input: window[..self.size].to_vec(),
                target: window[self.size],
            })
            .collect();
        Ok(TrainingSet {
            window: self.size,
            samples,
        })
    }

    /// The most recent window of a series, for inference
    pub fn latest<'a, F>(&self, series: &'a [F]) -> Result<&'a [F]> {
        if series.len() < self.size {
            return Err(Error::domain(format!(
                "insufficient history: {} points, need at least {}",
                series.len(),
                self.size
            )));
        }
        Ok(&series[series.len() - self.size..])
    }
}

/// Fit a fresh scaler on a price series and build its training set
pub fn prepare(
    series: &PriceSeries,
    builder: WindowBuilder,
) -> Result<(MinMaxScaler, NormalizedSeries, TrainingSet)> {
    let scaler = MinMaxScaler::fit(series)?;
    let normalized = scaler.transform_series(series)?;
    let training = builder.training_set(&normalized)?;
    Ok((scaler, normalized, training))
}
