/*!
Multi-stock prediction sessions

A [`PredictionSession`] owns a data source and a loaded model, and walks through
`Idle -> Fetching -> Predicting -> Ready` for every request. Symbols fail independently: a request only fails as a
whole when no symbol could be predicted. In live mode a ready session re-fetches the latest price of every symbol on
a [`RefreshSchedule`], without re-predicting.
*/
use crate::data::scale::MinMaxScaler;
use crate::data::window::WindowBuilder;
use crate::data::{DataSource, Merge, Period, PriceSeries};
use crate::predict::Predictor;
use crate::util::format_price;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug, info, warn};

pub mod schedule;

pub use schedule::{RefreshSchedule, REFRESH_INTERVAL};

/// A loaded model: a predictor together with the scaler and window size it was trained with
#[derive(Debug, Clone)]
pub struct ModelContext<P> {
    /// The trained predictor
    pub predictor: P,
    /// The scaler fitted on the predictor's training data
    pub scaler: MinMaxScaler,
    /// Builds windows of the size the predictor was trained on
    pub window: WindowBuilder,
    /// The ticker the predictor was trained on, if known
    pub ticker: String,
}

impl<P: Predictor> ModelContext<P> {
    /// Bundle a predictor with its scaler and window size
    pub fn new(predictor: P, scaler: MinMaxScaler, window: WindowBuilder) -> ModelContext<P> {
        ModelContext {
            predictor,
            scaler,
            window,
            ticker: String::new(),
        }
    }

    /// Predict the closing price following a series
    pub fn predict_next(&self, series: &PriceSeries) -> Result<f64> {
        let window = self.window.latest(series.points())?;
        let closes: Vec<f64> = window.iter().map(|point| point.c).collect();
        let normalized = self.scaler.transform_values(&closes)?;
        let next = self.predictor.predict(&normalized)?;
        Ok(self.scaler.inverse_transform(next))
    }
}

/// Split free text into ticker symbols: comma separated, whitespace stripped, uppercased, deduplicated in order
pub fn parse_symbols(input: &str) -> Result<Vec<String>> {
    let symbols: Vec<String> = input
        .split(',')
        .map(|symbol| {
            symbol
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_uppercase()
        })
        .filter(|symbol| !symbol.is_empty())
        .unique()
        .collect();
    if symbols.is_empty() {
        return Err(Error::Validation(
            "Please enter at least one valid stock symbol!".into(),
        ));
    }
    Ok(symbols)
}

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Phase {
    /// Nothing requested yet
    Idle,
    /// Fetching price histories
    Fetching,
    /// Running the model
    Predicting,
    /// Predictions are available
    Ready,
    /// The last request produced nothing; carries the cause. Needs a manual retry.
    Failed(String),
}

/// Whether a ready session refreshes its prices
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Mode {
    /// Show the fetched history as is
    Static,
    /// Re-fetch the latest prices on an interval
    Live,
}

impl Default for Mode {
    fn default() -> Mode {
        Mode::Static
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Mode> {
        match s.trim().to_lowercase().as_str() {
            "static" => Ok(Mode::Static),
            "live" => Ok(Mode::Live),
            other => Err(Error::Validation(format!("unknown mode {:?}", other))),
        }
    }
}

/// A predicted next closing price
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// The ticker symbol
    pub symbol: String,
    /// The predicted closing price
    pub price: f64,
    /// The timestamp of the last observation the prediction was made from
    pub as_of: DateTime<Utc>,
}

/// An error which only affected a single symbol
#[derive(Debug)]
pub struct SymbolFailure {
    /// The symbol which failed
    pub symbol: String,
    /// Why it failed
    pub error: Error,
}

/// The outcome of one live refresh tick
#[derive(Debug, Default)]
pub struct RefreshReport {
    /// How each refreshed symbol's series changed
    pub merges: Vec<(String, Merge)>,
    /// Symbols whose latest price could not be fetched
    pub failures: Vec<SymbolFailure>,
}

/// A prediction session over a data source and a loaded model
#[derive(Debug)]
pub struct PredictionSession<S, P> {
    source: S,
    model: ModelContext<P>,
    period: Period,
    phase: Phase,
    mode: Mode,
    schedule: RefreshSchedule,
    symbols: Vec<String>,
    series: HashMap<String, PriceSeries>,
    predictions: HashMap<String, Prediction>,
    failures: Vec<SymbolFailure>,
}

impl<S: DataSource, P: Predictor> PredictionSession<S, P> {
    /// Create an idle session
    pub fn new(source: S, model: ModelContext<P>) -> PredictionSession<S, P> {
        PredictionSession {
            source,
            model,
            period: Period::default(),
            phase: Phase::Idle,
            mode: Mode::default(),
            schedule: RefreshSchedule::default(),
            symbols: Vec::new(),
            series: HashMap::new(),
            predictions: HashMap::new(),
            failures: Vec::new(),
        }
    }

    /// Fetch `period` of history for every request
    pub fn with_period(mut self, period: Period) -> Self {
        self.period = period;
        self
    }

    /// Use a custom refresh schedule
    pub fn with_schedule(mut self, schedule: RefreshSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Request predictions for comma-separated symbols.
    ///
    /// Invalid input fails with [`Error::Validation`] before anything is fetched and leaves the session untouched.
    /// Otherwise the session ends up either [`Phase::Ready`] or [`Phase::Failed`], with per-symbol failures in
    /// [`PredictionSession::failures`].
    pub fn request(&mut self, input: &str, now: Instant) -> Result<&Phase> {
        let symbols = parse_symbols(input)?;
        self.run(symbols, now);
        Ok(&self.phase)
    }

    /// Re-run the last request
    pub fn retry(&mut self, now: Instant) -> Result<&Phase> {
        if self.symbols.is_empty() {
            return Err(Error::Validation("nothing to retry".into()));
        }
        let symbols = self.symbols.clone();
        self.run(symbols, now);
        Ok(&self.phase)
    }

    fn run(&mut self, symbols: Vec<String>, now: Instant) {
        self.series.clear();
        self.predictions.clear();
        self.failures.clear();
        self.symbols = symbols;

        self.phase = Phase::Fetching;
        for symbol in &self.symbols {
            match self.source.fetch(symbol, self.period) {
                Ok(series) => {
                    self.series.insert(symbol.clone(), series);
                }
                Err(error) => {
                    warn!("Fetching {} failed: {}", symbol, error);
                    self.failures.push(SymbolFailure {
                        symbol: symbol.clone(),
                        error,
                    });
                }
            }
        }

        self.phase = Phase::Predicting;
        for symbol in &self.symbols {
            let series = match self.series.get(symbol) {
                Some(series) => series,
                None => continue,
            };
            match self.model.predict_next(series) {
                Ok(price) => {
                    let as_of = series.last().map(|point| point.t).unwrap_or_else(Utc::now);
                    info!("Predicted {} for {}", format_price(price), symbol);
                    self.predictions.insert(
                        symbol.clone(),
                        Prediction {
                            symbol: symbol.clone(),
                            price,
                            as_of,
                        },
                    );
                }
                Err(error) if error.is_fatal() => {
                    warn!("Predicting {} failed fatally: {}", symbol, error);
                    self.phase = Phase::Failed(format!("{}: {}", symbol, error));
                    self.schedule.cancel();
                    return;
                }
                Err(error) => {
                    warn!("Predicting {} failed: {}", symbol, error);
                    self.failures.push(SymbolFailure {
                        symbol: symbol.clone(),
                        error,
                    });
                }
            }
        }

        if self.predictions.is_empty() {
            let cause = self
                .failures
                .iter()
                .map(|failure| format!("{}: {}", failure.symbol, failure.error))
                .join("; ");
            self.phase = Phase::Failed(format!("no predictions could be made ({})", cause));
            self.schedule.cancel();
            return;
        }
        self.phase = Phase::Ready;
        match self.mode {
            Mode::Live => self.schedule.start(now),
            Mode::Static => self.schedule.cancel(),
        }
    }

    /// Flip the mode selector. Going static cancels any pending refresh; going live starts refreshing a ready session.
    pub fn set_mode(&mut self, mode: Mode, now: Instant) {
        self.mode = mode;
        match mode {
            Mode::Live if self.phase == Phase::Ready && !self.schedule.is_active() => {
                self.schedule.start(now)
            }
            Mode::Live => {}
            Mode::Static => self.schedule.cancel(),
        }
    }

    /// Fetch the latest price of every held symbol and merge it into its series.
    ///
    /// Predictions are neither recomputed nor dropped. A fatal error fails the whole session, cancels the schedule
    /// and is returned.
    pub fn refresh(&mut self) -> Result<RefreshReport> {
        if self.phase != Phase::Ready {
            return Err(Error::Validation(
                "there are no predictions to refresh".into(),
            ));
        }
        self.phase = Phase::Fetching;
        let mut report = RefreshReport::default();
        for symbol in &self.symbols {
            let series = match self.series.get_mut(symbol) {
                Some(series) => series,
                None => continue,
            };
            match self
                .source
                .fetch_latest(symbol)
                .and_then(|point| series.merge_latest(point))
            {
                Ok(merge) => {
                    debug!("Refreshed {}: {:?}", symbol, merge);
                    report.merges.push((symbol.clone(), merge));
                }
                Err(error) if error.is_fatal() => {
                    warn!("Refreshing {} failed fatally: {}", symbol, error);
                    self.phase = Phase::Failed(format!("{}: {}", symbol, error));
                    self.schedule.cancel();
                    return Err(error);
                }
                Err(error) => {
                    warn!("Refreshing {} failed: {}", symbol, error);
                    report.failures.push(SymbolFailure {
                        symbol: symbol.clone(),
                        error,
                    });
                }
            }
        }
        self.phase = Phase::Ready;
        Ok(report)
    }

    /// Run a refresh tick if live mode is on and one is due at `now`
    pub fn poll(&mut self, now: Instant) -> Result<Option<RefreshReport>> {
        if self.mode != Mode::Live || !self.schedule.is_due(now) {
            return Ok(None);
        }
        let report = match self.refresh() {
            Ok(report) => report,
            Err(err) => {
                self.schedule.cancel();
                return Err(err);
            }
        };
        self.schedule.complete(now);
        Ok(Some(report))
    }
}

impl<S, P> PredictionSession<S, P> {
    /// The current phase
    #[inline]
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// The current mode
    #[inline]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The refresh schedule
    #[inline]
    pub fn schedule(&self) -> &RefreshSchedule {
        &self.schedule
    }

    /// The data source
    #[inline]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// The loaded model
    #[inline]
    pub fn model(&self) -> &ModelContext<P> {
        &self.model
    }

    /// The symbols of the last request, in request order
    #[inline]
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// The prediction for a symbol, if one was made
    pub fn prediction(&self, symbol: &str) -> Option<&Prediction> {
        self.predictions.get(symbol)
    }

    /// Every prediction, in request order
    pub fn predictions(&self) -> Vec<&Prediction> {
        self.symbols
            .iter()
            .filter_map(|symbol| self.predictions.get(symbol))
            .collect()
    }

    /// The price history held for a symbol
    pub fn series(&self, symbol: &str) -> Option<&PriceSeries> {
        self.series.get(symbol)
    }

    /// The symbols which failed during the last request
    #[inline]
    pub fn failures(&self) -> &[SymbolFailure] {
        &self.failures
    }

    /// A printable summary of the last request
    pub fn summary(&self) -> Summary<'_> {
        Summary {
            phase: &self.phase,
            predictions: self.predictions(),
            failures: &self.failures,
        }
    }
}

/// The predictions and errors of a session, printable as user-facing text
#[derive(Debug)]
pub struct Summary<'a> {
    phase: &'a Phase,
    predictions: Vec<&'a Prediction>,
    failures: &'a [SymbolFailure],
}

impl Display for Summary<'_> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self.phase {
            Phase::Idle => return writeln!(f, "Predictions will appear here"),
            Phase::Failed(cause) => writeln!(f, "Error: {}", cause)?,
            _ => {
                writeln!(f, "Predicted Prices:")?;
                for prediction in &self.predictions {
                    writeln!(f, "{}: {}", prediction.symbol, format_price(prediction.price))?;
                }
            }
        }
        for failure in self.failures {
            writeln!(f, "Error for {}: {}", failure.symbol, failure.error)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_are_normalized() {
        assert_eq!(parse_symbols("AAPL, msft ,AAPL").unwrap(), vec!["AAPL", "MSFT"]);
        assert_eq!(parse_symbols(" b rk.b ,,tsla").unwrap(), vec!["BRK.B", "TSLA"]);
    }

    #[test]
    fn blank_input_is_invalid() {
        for input in &["", "   ", ",", " , ,"] {
            assert!(matches!(parse_symbols(input), Err(Error::Validation(_))));
        }
    }

    #[test]
    fn modes_parse() {
        assert_eq!(" Live ".parse::<Mode>().unwrap(), Mode::Live);
        assert_eq!("static".parse::<Mode>().unwrap(), Mode::Static);
        assert!("sometimes".parse::<Mode>().is_err());
    }
}
