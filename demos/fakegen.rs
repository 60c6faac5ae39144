/*!
Generate a fake daily price history in the CSV format read by `CsvSource`
*/
use chrono::Utc;
use clap::{App, Arg};
use io_enum::*;
use std::fs::File;
use std::io::{stdout, Stdout};
use std::path::Path;
use stockcast::data::csv_store::write_points;
use stockcast::data::fake::FakeSource;
use stockcast::data::{DataSource, Period};

#[derive(Debug, Write)]
pub enum IoSinks {
    Stdout(Stdout),
    File(File),
}

fn main() {
    let matches = App::new("Fake Stock Data Generator")
        .version("1.0")
        .author("Jad Elkhaleq Ghalayini <jad.ghalayini@mail.utoronto.ca>")
        .about("Generates a random walk of daily closing prices for a symbol, for offline training and prediction")
        .arg(
            Arg::with_name("SYMBOL")
                .help("The symbol to generate prices for")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("OUTPUT")
                .help("Sets the output file to use, defaults to stdout")
                .index(2),
        )
        .arg(
            Arg::with_name("period")
                .short("p")
                .long("period")
                .help("How much history to generate")
                .takes_value(true)
                .default_value("5y"),
        )
        .arg(
            Arg::with_name("seed")
                .short("s")
                .long("seed")
                .help("Seeds the random walk")
                .takes_value(true)
                .default_value("0"),
        )
        .get_matches();
    let symbol = matches.value_of("SYMBOL").expect("Required").to_uppercase();
    let period: Period = matches
        .value_of("period")
        .expect("Defaulted")
        .parse()
        .expect("Invalid period");
    let seed: u64 = matches
        .value_of("seed")
        .expect("Defaulted")
        .parse()
        .expect("Invalid seed");
    let series = FakeSource::new(seed, Utc::now())
        .fetch(&symbol, period)
        .expect("Failed to generate prices");
    let writer = if let Some(path) = matches.value_of("OUTPUT") {
        IoSinks::File(File::create(Path::new(path)).expect("Failed to create output file"))
    } else {
        IoSinks::Stdout(stdout())
    };
    let written = write_points(writer, series.points().iter()).expect("Failed to write prices");
    eprintln!("Generated {} prices for {}", written, symbol);
}
