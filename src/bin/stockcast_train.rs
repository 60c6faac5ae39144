/*!
Train the stock LSTM on a single ticker and write the model artifacts
*/

use anyhow::Context;
use clap::{App, Arg};
use indicatif::{ProgressBar, ProgressStyle};
use std::env;
use stockcast::artifact::{self, ArtifactPaths};
use stockcast::data::csv_store::CsvSource;
use stockcast::data::window::{prepare, WindowBuilder};
use stockcast::data::yahoo::YahooSource;
use stockcast::data::{DataSource, DEFAULT_PERIOD};
use stockcast::lstm::{StockLSTMDesc, TrainConfig};
use tch::Device;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_TICKER: &str = "AAPL";

/// Read `<SYMBOL>.csv` files from this directory instead of fetching from Yahoo Finance
const DATA_DIR_VAR: &str = "STOCKCAST_DATA_DIR";

fn source() -> anyhow::Result<Box<dyn DataSource>> {
    match env::var_os(DATA_DIR_VAR) {
        Some(dir) => Ok(Box::new(CsvSource::new(dir))),
        None => Ok(Box::new(YahooSource::new()?.saving_to("."))),
    }
}

pub fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let matches = App::new("Stockcast Trainer")
        .version("1.0")
        .author("Jad Elkhaleq Ghalayini <jad.ghalayini@mail.utoronto.ca>")
        .about("Trains an LSTM to predict the next closing price of a stock")
        .arg(
            Arg::with_name("TICKER")
                .help("The ticker symbol to train on, defaults to AAPL")
                .index(1),
        )
        .get_matches();
    let ticker = matches
        .value_of("TICKER")
        .unwrap_or(DEFAULT_TICKER)
        .trim()
        .to_uppercase();

    // Fetch and prepare data
    let mut source = source()?;
    let series = source
        .fetch(&ticker, DEFAULT_PERIOD)
        .with_context(|| format!("No data found for {}", ticker))?;
    let window = WindowBuilder::default();
    let (scaler, _normalized, training_set) =
        prepare(&series, window).with_context(|| format!("Cannot train on {}", ticker))?;
    info!(
        "Prepared {} windows from {} closes of {}",
        training_set.len(),
        series.len(),
        ticker
    );

    // Train
    let config = TrainConfig::default();
    let device = Device::cuda_if_available();
    info!("Device: {:?}", device);
    let epochs_progress = ProgressBar::new(config.epochs as u64);
    epochs_progress.set_style(
        ProgressStyle::default_bar().template("Training [{msg:<16}] {wide_bar} {pos:>3}/{len:3}"),
    );
    epochs_progress.set_message("no loss");
    let predictor = StockLSTMDesc::default().train(&training_set, &config, device, |stats| {
        epochs_progress.println(format!(
            "Epoch {}: average loss = {}, max loss = {}",
            stats.epoch, stats.mean_loss, stats.max_loss
        ));
        epochs_progress.set_message(&format!("loss = {:.6}", stats.mean_loss));
        epochs_progress.inc(1);
    })?;
    epochs_progress.finish_and_clear();

    // Save
    let paths = ArtifactPaths::default();
    artifact::save(&paths, &ticker, &predictor, &scaler, window)?;
    println!("Model trained and saved at {}", paths.model.display());
    Ok(())
}
