/*!
Interactive multi-stock predictions from a trained model
*/

use anyhow::format_err;
use clap::{App, Arg};
use rustyline::error::ReadlineError;
use rustyline::Editor;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use stockcast::artifact::{self, ArtifactPaths, MODEL_FILE, SCALER_FILE};
use stockcast::data::csv_store::CsvSource;
use stockcast::data::yahoo::YahooSource;
use stockcast::data::{DataSource, Period};
use stockcast::lstm::LstmPredictor;
use stockcast::session::{Mode, Phase, PredictionSession, RefreshSchedule};
use stockcast::util::format_price;
use tch::Device;
use tracing_subscriber::EnvFilter;

type Session = PredictionSession<Box<dyn DataSource>, LstmPredictor>;

const HELP: &str = "Enter comma-separated stock symbols, e.g. AAPL, MSFT\n\
    :live     switch to live updates\n\
    :static   switch to static data\n\
    :retry    repeat the last request\n\
    :quit     exit";

fn print_latest(session: &Session) {
    for prediction in session.predictions() {
        let last = session
            .series(&prediction.symbol)
            .and_then(|series| series.last());
        if let Some(last) = last {
            println!(
                "{}: {} at {} (predicted {})",
                prediction.symbol,
                format_price(last.c),
                last.t.format("%Y-%m-%d %H:%M"),
                format_price(prediction.price)
            );
        }
    }
}

/// Refresh on the session's schedule for `ticks` ticks (forever if zero), then go back to static mode
fn run_live(session: &mut Session, ticks: usize) {
    let mut done = 0;
    while ticks == 0 || done < ticks {
        let due = match session.schedule().next_due() {
            Some(due) => due,
            None => break,
        };
        let now = Instant::now();
        if due > now {
            thread::sleep(due - now);
        }
        match session.poll(Instant::now()) {
            Ok(Some(report)) => {
                for failure in &report.failures {
                    eprintln!("Error for {}: {}", failure.symbol, failure.error);
                }
                print_latest(session);
                done += 1;
            }
            Ok(None) => {}
            Err(err) => {
                eprintln!("Error: {}", err);
                break;
            }
        }
    }
    session.set_mode(Mode::Static, Instant::now());
    println!("Live updates stopped");
}

fn handle(session: &mut Session, line: &str, ticks: usize) {
    let now = Instant::now();
    let result = match line {
        ":help" => {
            println!("{}", HELP);
            return;
        }
        ":live" => {
            session.set_mode(Mode::Live, now);
            if session.phase() != &Phase::Ready {
                println!("Live updates will start with the next prediction");
                return;
            }
            Ok(())
        }
        ":static" => {
            session.set_mode(Mode::Static, now);
            return;
        }
        ":retry" => session.retry(now).map(|_| ()),
        symbols => session.request(symbols, now).map(|_| ()),
    };
    match result {
        Ok(()) if line == ":live" => {}
        Ok(()) => print!("{}", session.summary()),
        Err(err) => {
            println!("{}", err);
            return;
        }
    }
    if session.schedule().is_active() {
        run_live(session, ticks);
    }
}

pub fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let matches = App::new("Stockcast")
        .version("1.0")
        .author("Jad Elkhaleq Ghalayini <jad.ghalayini@mail.utoronto.ca>")
        .about("Predicts the next closing price of several stocks with a trained LSTM")
        .arg(
            Arg::with_name("model")
                .long("model")
                .help("The trained model weights")
                .takes_value(true)
                .default_value(MODEL_FILE),
        )
        .arg(
            Arg::with_name("scaler")
                .long("scaler")
                .help("The scaler record written with the model")
                .takes_value(true)
                .default_value(SCALER_FILE),
        )
        .arg(
            Arg::with_name("data-dir")
                .long("data-dir")
                .help("Read <SYMBOL>.csv files from this directory instead of Yahoo Finance")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("save-dir")
                .long("save-dir")
                .help("Save fetched histories as <SYMBOL>.csv files in this directory")
                .takes_value(true)
                .conflicts_with("data-dir"),
        )
        .arg(
            Arg::with_name("period")
                .short("p")
                .long("period")
                .help("How much history to fetch: 1mo, 3mo, 6mo, 1y, 2y, 5y, 10y, ytd, max")
                .takes_value(true)
                .default_value("5y"),
        )
        .arg(
            Arg::with_name("interval")
                .long("interval")
                .help("Seconds between live updates")
                .takes_value(true)
                .default_value("10"),
        )
        .arg(
            Arg::with_name("ticks")
                .long("ticks")
                .help("Live updates to run before going back to static data, 0 for no limit")
                .takes_value(true)
                .default_value("6"),
        )
        .arg(
            Arg::with_name("live")
                .short("l")
                .long("live")
                .help("Start in live mode"),
        )
        .get_matches();

    let paths = ArtifactPaths {
        model: PathBuf::from(matches.value_of("model").expect("Defaulted")),
        scaler: PathBuf::from(matches.value_of("scaler").expect("Defaulted")),
    };
    let period: Period = matches.value_of("period").expect("Defaulted").parse()?;
    let interval: u64 = matches
        .value_of("interval")
        .expect("Defaulted")
        .parse()
        .map_err(|err| format_err!("Invalid value for interval: {}", err))?;
    let ticks: usize = matches
        .value_of("ticks")
        .expect("Defaulted")
        .parse()
        .map_err(|err| format_err!("Invalid value for ticks: {}", err))?;

    let source: Box<dyn DataSource> = if let Some(dir) = matches.value_of("data-dir") {
        Box::new(CsvSource::new(dir))
    } else {
        let source = YahooSource::new()?;
        match matches.value_of("save-dir") {
            Some(dir) => Box::new(source.saving_to(dir)),
            None => Box::new(source),
        }
    };

    let model = artifact::load(&paths, Device::Cpu)
        .map_err(|err| format_err!("Error loading model: {}", err))?;
    println!(
        "Loaded a model trained on {} (window of {} days)",
        model.ticker, model.window.size
    );
    let mut session = PredictionSession::new(source, model)
        .with_period(period)
        .with_schedule(RefreshSchedule::new(Duration::from_secs(interval)));
    if matches.is_present("live") {
        session.set_mode(Mode::Live, Instant::now());
    }

    println!("{}", HELP);
    let mut rl = Editor::<()>::new();
    loop {
        match rl.readline("Symbols: ") {
            Ok(line) => {
                let line = line.trim();
                if line == ":quit" {
                    break;
                }
                rl.add_history_entry(line);
                handle(&mut session, line, ticks);
            }
            Err(ReadlineError::Interrupted) => {
                eprintln!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => eprintln!("Error: {:?}", err),
        }
    }
    Ok(())
}
