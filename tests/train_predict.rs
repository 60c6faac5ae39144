/*!
Train a small model on fake data, persist it, and predict with it in a session
*/
use chrono::{TimeZone, Utc};
use std::time::Instant;
use stockcast::artifact::{self, ArtifactPaths};
use stockcast::data::fake::FakeSource;
use stockcast::data::window::{prepare, WindowBuilder};
use stockcast::data::{DataSource, Period};
use stockcast::lstm::{StockLSTMDesc, TrainConfig};
use stockcast::predict::Predictor;
use stockcast::session::{Phase, PredictionSession};
use stockcast::Error;
use tch::Device;
use tempfile::tempdir;

fn fake() -> FakeSource {
    FakeSource::new(5, Utc.with_ymd_and_hms(2024, 6, 28, 20, 0, 0).unwrap())
}

fn tiny() -> StockLSTMDesc {
    StockLSTMDesc {
        hidden: 8,
        layers: 1,
        dense: 4,
    }
}

fn config() -> TrainConfig {
    TrainConfig {
        epochs: 1,
        batch_size: 16,
        learning_rate: 1e-2,
        seed: Some(1),
    }
}

fn train_into(paths: &ArtifactPaths, ticker: &str) {
    let series = fake().fetch(ticker, Period::Year1).unwrap();
    let window = WindowBuilder::new(10);
    let (scaler, _, set) = prepare(&series, window).unwrap();
    let predictor = tiny().train(&set, &config(), Device::Cpu, |_| ()).unwrap();
    let record = artifact::save(paths, ticker, &predictor, &scaler, window).unwrap();
    assert_eq!(record.ticker, ticker);
    assert_eq!(record.window, 10);
    assert_eq!(record.scaler(), scaler);
}

#[test]
fn trained_models_serve_sessions() {
    let dir = tempdir().unwrap();
    let paths = ArtifactPaths::in_dir(dir.path());
    train_into(&paths, "AAPL");

    let model = artifact::load(&paths, Device::Cpu).unwrap();
    assert_eq!(model.ticker, "AAPL");
    assert_eq!(model.window, WindowBuilder::new(10));
    assert_eq!(model.predictor.desc, tiny());

    let mut session = PredictionSession::new(fake().without("NOPE"), model).with_period(Period::Year1);
    session.request("aapl, msft, nope", Instant::now()).unwrap();
    assert_eq!(session.phase(), &Phase::Ready);
    assert_eq!(session.predictions().len(), 2);
    assert!(session.predictions().iter().all(|p| p.price.is_finite()));
    assert_eq!(session.failures().len(), 1);
}

#[test]
fn loaded_models_match_trained_ones() {
    let dir = tempdir().unwrap();
    let paths = ArtifactPaths::in_dir(dir.path());
    train_into(&paths, "MSFT");
    let a = artifact::load(&paths, Device::Cpu).unwrap();
    let b = artifact::load(&paths, Device::Cpu).unwrap();
    let window = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.5, 0.4, 0.3, 0.2];
    assert_eq!(
        a.predictor.predict(&window).unwrap(),
        b.predictor.predict(&window).unwrap()
    );
}

#[test]
fn swapped_scalers_are_refused() {
    let dir_one = tempdir().unwrap();
    let dir_two = tempdir().unwrap();
    let one = ArtifactPaths::in_dir(dir_one.path());
    let two = ArtifactPaths::in_dir(dir_two.path());
    train_into(&one, "AAPL");
    train_into(&two, "TSLA");
    let mismatched = ArtifactPaths {
        model: one.model.clone(),
        scaler: two.scaler.clone(),
    };
    assert!(matches!(
        artifact::load(&mismatched, Device::Cpu),
        Err(Error::Artifact { .. })
    ));
}
