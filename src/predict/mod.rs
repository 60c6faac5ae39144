/*!
Models mapping a window of normalized prices to the next normalized price
*/
use crate::{CpuFloat, Error, Result};
use ta::indicators::SimpleMovingAverage;
use ta::Next;

/// A trained regression from a window of normalized prices to the next normalized price.
///
/// Prediction is pure: the same window always yields the same value.
pub trait Predictor {
    /// Predict the normalized value following `window`
    fn predict(&self, window: &[CpuFloat]) -> Result<CpuFloat>;
}

impl<P: Predictor + ?Sized> Predictor for Box<P> {
    fn predict(&self, window: &[CpuFloat]) -> Result<CpuFloat> {
        (**self).predict(window)
    }
}

impl<P: Predictor + ?Sized> Predictor for &P {
    fn predict(&self, window: &[CpuFloat]) -> Result<CpuFloat> {
        (**self).predict(window)
    }
}

/// A baseline predictor: the simple moving average of the last `period` values of the window
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct MovingAverage {
    /// The number of trailing values averaged
    pub period: usize,
}

impl Predictor for MovingAverage {
    fn predict(&self, window: &[CpuFloat]) -> Result<CpuFloat> {
        if window.is_empty() {
            return Err(Error::domain("cannot predict from an empty window"));
        }
        let period = self.period.min(window.len());
        let mut sma = SimpleMovingAverage::new(period)
            .map_err(|err| Error::Validation(format!("bad moving average period: {:?}", err)))?;
        let mut last = 0.0;
        for &v in &window[window.len() - period..] {
            last = sma.next(v);
        }
        Ok(last)
    }
}
