/*!
Test prediction sessions against a scripted data source
*/
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashMap;
use std::time::{Duration as StdDuration, Instant};
use stockcast::data::scale::MinMaxScaler;
use stockcast::data::window::WindowBuilder;
use stockcast::data::{DataSource, Merge, Period, PricePoint, PriceSeries};
use stockcast::predict::{MovingAverage, Predictor};
use stockcast::session::{Mode, ModelContext, Phase, PredictionSession, RefreshSchedule};
use stockcast::{Error, Result};

/// Serves fixed series and scripted latest points, logging history fetches
#[derive(Debug, Default)]
struct ScriptedSource {
    series: HashMap<String, PriceSeries>,
    latest: HashMap<String, PricePoint>,
    /// A symbol whose latest price fails fatally
    poisoned: Option<String>,
    fetches: Vec<String>,
}

impl DataSource for ScriptedSource {
    fn fetch(&mut self, symbol: &str, period: Period) -> Result<PriceSeries> {
        self.fetches.push(symbol.to_string());
        self.series.get(symbol).cloned().ok_or_else(|| Error::NotFound {
            symbol: symbol.to_string(),
            period: period.to_string(),
        })
    }

    fn fetch_latest(&mut self, symbol: &str) -> Result<PricePoint> {
        if self.poisoned.as_deref() == Some(symbol) {
            return Err(Error::Validation(format!("{} is not a valid feed", symbol)));
        }
        self.latest.get(symbol).copied().ok_or_else(|| Error::NotFound {
            symbol: symbol.to_string(),
            period: Period::Day1.to_string(),
        })
    }
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 21, 0, 0).unwrap()
}

fn ramp(from: f64, n: usize) -> PriceSeries {
    let closes: Vec<f64> = (0..n).map(|i| from + i as f64).collect();
    PriceSeries::daily(start(), &closes).unwrap()
}

/// Predicts the last value of the window, but fails like a mismatched model above `limit`
#[derive(Debug, Copy, Clone)]
struct Brittle {
    limit: f64,
}

impl Predictor for Brittle {
    fn predict(&self, window: &[f64]) -> Result<f64> {
        let last = *window.last().unwrap();
        if last > self.limit {
            return Err(Error::artifact("stock_model.ot", "weights do not match scaler"));
        }
        Ok(last)
    }
}

fn session_with<P: Predictor>(
    source: ScriptedSource,
    predictor: P,
) -> PredictionSession<ScriptedSource, P> {
    let model = ModelContext::new(
        predictor,
        MinMaxScaler { min: 50.0, max: 250.0 },
        WindowBuilder::default(),
    );
    PredictionSession::new(source, model)
}

/// A session whose model predicts the last close of the window
fn session(source: ScriptedSource) -> PredictionSession<ScriptedSource, MovingAverage> {
    session_with(source, MovingAverage { period: 1 })
}

fn source() -> ScriptedSource {
    let mut source = ScriptedSource::default();
    source.series.insert("AAPL".into(), ramp(100.0, 80));
    source.series.insert("MSFT".into(), ramp(200.0, 61));
    source
}

#[test]
fn symbols_are_normalized_before_fetching() {
    let mut session = session(source());
    session.request("AAPL, msft ,AAPL", Instant::now()).unwrap();
    assert_eq!(session.symbols(), ["AAPL", "MSFT"]);
    assert_eq!(session.source().fetches, ["AAPL", "MSFT"]);
    assert_eq!(session.phase(), &Phase::Ready);
    let symbols: Vec<_> = session.predictions().iter().map(|p| p.symbol.clone()).collect();
    assert_eq!(symbols, vec!["AAPL", "MSFT"]);
}

#[test]
fn blank_requests_fetch_nothing() {
    let mut session = session(source());
    assert!(matches!(
        session.request(" , ", Instant::now()),
        Err(Error::Validation(_))
    ));
    assert_eq!(session.phase(), &Phase::Idle);
    assert!(matches!(session.retry(Instant::now()), Err(Error::Validation(_))));
    assert!(session.source().fetches.is_empty());
}

#[test]
fn one_missing_symbol_does_not_spoil_the_rest() {
    let mut session = session(source());
    session.request("AAPL,NOPE,MSFT", Instant::now()).unwrap();
    assert_eq!(session.phase(), &Phase::Ready);
    assert_eq!(session.predictions().len(), 2);
    let aapl = session.prediction("AAPL").unwrap();
    assert!((aapl.price - 179.0).abs() < 1e-9);
    assert_eq!(aapl.as_of, start() + Duration::days(79));
    assert!((session.prediction("MSFT").unwrap().price - 260.0).abs() < 1e-9);
    assert_eq!(session.failures().len(), 1);
    assert_eq!(session.failures()[0].symbol, "NOPE");
    assert!(matches!(session.failures()[0].error, Error::NotFound { .. }));
    let summary = session.summary().to_string();
    assert!(summary.starts_with("Predicted Prices:\nAAPL: $179.00\nMSFT: $260.00\n"));
    assert!(summary.contains("Error for NOPE: no data found for NOPE (5y)"));
}

#[test]
fn short_histories_are_excluded() {
    let mut source = source();
    source.series.insert("IPO".into(), ramp(10.0, 59));
    let mut session = session(source);
    session.request("ipo, aapl", Instant::now()).unwrap();
    assert_eq!(session.phase(), &Phase::Ready);
    assert!(session.prediction("IPO").is_none());
    assert!(session.series("IPO").is_some());
    assert!(matches!(session.failures()[0].error, Error::Domain(_)));
}

#[test]
fn nothing_predicted_fails_the_session() {
    let mut session = session(source());
    session.request("NOPE, GONE", Instant::now()).unwrap();
    match session.phase() {
        Phase::Failed(cause) => assert!(cause.contains("NOPE") && cause.contains("GONE")),
        phase => panic!("expected a failed session, got {:?}", phase),
    }
    assert!(session.refresh().is_err());
    assert!(session.summary().to_string().starts_with("Error: "));
}

#[test]
fn retry_refetches_the_same_symbols() {
    let mut session = session(ScriptedSource::default());
    session.request("aapl", Instant::now()).unwrap();
    assert!(matches!(session.phase(), Phase::Failed(_)));
    session.request("aapl", Instant::now()).unwrap();
    assert!(matches!(session.phase(), Phase::Failed(_)));
    assert_eq!(session.source().fetches, ["AAPL", "AAPL"]);
    session.retry(Instant::now()).unwrap();
    assert_eq!(session.symbols(), ["AAPL"]);
    assert_eq!(session.source().fetches, ["AAPL", "AAPL", "AAPL"]);
}

#[test]
fn fatal_prediction_errors_stop_the_request() {
    let mut source = source();
    source.series.insert("TSLA".into(), ramp(60.0, 70));
    let t0 = Instant::now();
    // Normalized MSFT closes end above 1.0, the others below
    let mut session = session_with(source, Brittle { limit: 1.0 });
    session.set_mode(Mode::Live, t0);
    session.request("AAPL,MSFT,TSLA", t0).unwrap();

    match session.phase() {
        Phase::Failed(cause) => {
            assert!(cause.starts_with("MSFT: model artifact stock_model.ot"));
        }
        phase => panic!("expected a failed session, got {:?}", phase),
    }
    assert!(!session.schedule().is_active());
    assert!(session.prediction("AAPL").is_some());
    assert!(session.prediction("MSFT").is_none());
    assert!(session.prediction("TSLA").is_none());
    assert!(session.failures().is_empty());
    // The cause is reported once
    let summary = session.summary().to_string();
    assert_eq!(summary.matches("weights do not match scaler").count(), 1);
    assert!(session.poll(t0 + stockcast::session::REFRESH_INTERVAL).unwrap().is_none());
}

#[test]
fn fatal_refresh_errors_fail_the_session() {
    let mut source = source();
    let last = *source.series["AAPL"].last().unwrap();
    source.latest.insert("AAPL".into(), last);
    source.poisoned = Some("MSFT".into());
    let t0 = Instant::now();
    let interval = StdDuration::from_secs(10);
    let mut session = session(source).with_schedule(RefreshSchedule::new(interval));
    session.set_mode(Mode::Live, t0);
    session.request("AAPL,MSFT", t0).unwrap();
    assert_eq!(session.phase(), &Phase::Ready);

    assert!(matches!(session.poll(t0 + interval), Err(Error::Validation(_))));
    match session.phase() {
        Phase::Failed(cause) => assert!(cause.starts_with("MSFT: ")),
        phase => panic!("expected a failed session, got {:?}", phase),
    }
    assert!(!session.schedule().is_active());
    assert!(session.refresh().is_err());

    // A manual retry brings the session back, and live mode resumes
    session.retry(t0 + interval).unwrap();
    assert_eq!(session.phase(), &Phase::Ready);
    assert!(session.schedule().is_active());
}

#[test]
fn refresh_replaces_then_appends() {
    let mut source = source();
    let last = *source.series["AAPL"].last().unwrap();
    source
        .latest
        .insert("AAPL".into(), PricePoint::new(last.t + Duration::hours(1), 181.5));
    let mut session = session(source);
    session.request("AAPL,MSFT", Instant::now()).unwrap();
    let before = session.prediction("AAPL").unwrap().clone();

    let report = session.refresh().unwrap();
    assert_eq!(report.merges, vec![("AAPL".to_string(), Merge::Replaced)]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].symbol, "MSFT");
    let series = session.series("AAPL").unwrap();
    assert_eq!(series.len(), 80);
    assert_eq!(*series.last().unwrap(), PricePoint::new(last.t, 181.5));
    // Refreshing never re-predicts
    assert_eq!(session.prediction("AAPL"), Some(&before));
    assert_eq!(session.phase(), &Phase::Ready);
}

#[test]
fn refresh_appends_new_days() {
    let mut source = source();
    let last = *source.series["AAPL"].last().unwrap();
    source
        .latest
        .insert("AAPL".into(), PricePoint::new(last.t + Duration::days(1), 182.0));
    let mut session = session(source);
    session.request("AAPL", Instant::now()).unwrap();
    assert_eq!(session.refresh().unwrap().merges[0].1, Merge::Appended);
    assert_eq!(session.series("AAPL").unwrap().len(), 81);
    // The same point again only replaces
    assert_eq!(session.refresh().unwrap().merges[0].1, Merge::Replaced);
    assert_eq!(session.series("AAPL").unwrap().len(), 81);
}

#[test]
fn live_mode_polls_until_switched_off() {
    let mut source = source();
    let last = *source.series["AAPL"].last().unwrap();
    source.latest.insert("AAPL".into(), last);
    let t0 = Instant::now();
    let interval = StdDuration::from_secs(10);
    let mut session = session(source).with_schedule(RefreshSchedule::new(interval));

    // Static requests never schedule a refresh
    session.request("AAPL", t0).unwrap();
    assert!(!session.schedule().is_active());
    assert!(session.poll(t0 + interval).unwrap().is_none());

    session.set_mode(Mode::Live, t0);
    assert!(session.poll(t0 + StdDuration::from_secs(5)).unwrap().is_none());
    assert!(session.poll(t0 + interval).unwrap().is_some());
    assert!(session.poll(t0 + interval).unwrap().is_none());
    assert!(session.poll(t0 + interval * 2).unwrap().is_some());

    session.set_mode(Mode::Static, t0);
    assert!(!session.schedule().is_active());
    assert!(session.poll(t0 + interval * 10).unwrap().is_none());
}

#[test]
fn live_requests_start_the_schedule() {
    let t0 = Instant::now();
    let mut session = session(source());
    session.set_mode(Mode::Live, t0);
    // Nothing to refresh yet
    assert!(!session.schedule().is_active());
    session.request("MSFT", t0).unwrap();
    assert_eq!(session.schedule().next_due(), Some(t0 + stockcast::session::REFRESH_INTERVAL));
    // A failed request stops refreshing
    session.request("NOPE", t0).unwrap();
    assert!(!session.schedule().is_active());
}
