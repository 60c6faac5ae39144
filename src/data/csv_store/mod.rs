/*!
Ticker-named CSV files of daily closing prices, with a `Date` and a `Close` column
*/
use super::{DataSource, Period, PricePoint, PriceSeries};
use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// The date-only format used by most daily price exports
pub const DAILY_DATE: &str = "%Y-%m-%d";

/// Read price points from a Reader.
///
/// With no `date_format`, timestamps are expected in RFC 3339 as written by [`write_series`]. Otherwise the
/// first column is parsed with the given format, either as a full date-time or as a bare date at midnight UTC.
pub fn read_points<R: Read>(rdr: R, date_format: Option<&str>) -> Result<Vec<PricePoint>> {
    let date_format = if let Some(format) = date_format {
        format
    } else {
        return deserialize_points(rdr)
            .map(|result| result.map_err(Error::from))
            .collect();
    };
    let mut points = Vec::new();
    for record in csv::Reader::from_reader(rdr).into_records() {
        let record = record?;
        let mut fields = record.iter();
        let (first, close) = match (fields.next(), fields.next()) {
            (Some(first), Some(close)) => (first, close),
            _ => return Err(Error::domain(format!("short record {:?}", record))),
        };
        let t = match NaiveDateTime::parse_from_str(first, date_format) {
            Ok(t) => t,
            Err(_) => NaiveDate::parse_from_str(first, date_format)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .ok_or_else(|| Error::domain(format!("bad timestamp {:?}", first)))?,
        };
        let c = f64::from_str(close.trim())
            .map_err(|err| Error::domain(format!("bad closing price {:?}: {}", close, err)))?;
        points.push(PricePoint::new(DateTime::from_naive_utc_and_offset(t, Utc), c));
    }
    Ok(points)
}

/// Deserialize price points
pub fn deserialize_points<R: Read>(
    rdr: R,
) -> impl Iterator<Item = Result<PricePoint, csv::Error>> {
    csv::Reader::from_reader(rdr).into_deserialize()
}

/// Read a validated series from a Reader
pub fn read_series<R: Read>(rdr: R, date_format: Option<&str>) -> Result<PriceSeries> {
    PriceSeries::from_points(read_points(rdr, date_format)?)
}

/// Write price points to a Writer
/// On success, return how many points were written
pub fn write_points<'a, W, I>(wtr: W, points: I) -> Result<usize, csv::Error>
where
    W: Write,
    I: Iterator<Item = &'a PricePoint>,
{
    let mut wtr = csv::Writer::from_writer(wtr);
    let mut written = 0;
    for point in points {
        wtr.serialize(point)?;
        written += 1;
    }
    wtr.flush()?;
    Ok(written)
}

/// The file holding `symbol`'s prices inside `dir`
pub fn series_path(dir: &Path, symbol: &str) -> PathBuf {
    dir.join(format!("{}.csv", symbol))
}

/// Persist a series to `<dir>/<SYMBOL>.csv`, returning the path written
pub fn save_series(dir: &Path, symbol: &str, series: &PriceSeries) -> Result<PathBuf> {
    let path = series_path(dir, symbol);
    let file = File::create(&path)?;
    let written = write_points(file, series.points().iter())?;
    info!("Saved {} prices for {} to {}", written, symbol, path.display());
    Ok(path)
}

/// Serves ticker-named CSV files from a directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvSource {
    /// The directory holding `<SYMBOL>.csv` files
    pub dir: PathBuf,
    /// The date format of the first column, or `None` for RFC 3339
    pub date_format: Option<String>,
}

impl CsvSource {
    /// Serve files written by [`save_series`] from `dir`
    pub fn new(dir: impl Into<PathBuf>) -> CsvSource {
        CsvSource {
            dir: dir.into(),
            date_format: None,
        }
    }

    /// Parse the first column with a custom format instead
    pub fn with_date_format(mut self, format: impl Into<String>) -> CsvSource {
        self.date_format = Some(format.into());
        self
    }

    fn load(&self, symbol: &str, period: Period) -> Result<PriceSeries> {
        let path = series_path(&self.dir, symbol);
        let not_found = || Error::NotFound {
            symbol: symbol.to_string(),
            period: period.to_string(),
        };
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(err) => return Err(err.into()),
        };
        let series = read_series(file, self.date_format.as_deref())?;
        let last = series.last().ok_or_else(not_found)?.t;
        let series = match period.start_from(last) {
            Some(start) => PriceSeries::from_points(
                series
                    .points()
                    .iter()
                    .copied()
                    .filter(|point| point.t > start)
                    .collect(),
            )?,
            None => series,
        };
        info!("Read {} prices for {} from {}", series.len(), symbol, path.display());
        Ok(series)
    }
}

impl DataSource for CsvSource {
    fn fetch(&mut self, symbol: &str, period: Period) -> Result<PriceSeries> {
        self.load(symbol, period)
    }

    fn fetch_latest(&mut self, symbol: &str) -> Result<PricePoint> {
        let series = self.load(symbol, Period::Day1)?;
        series.last().copied().ok_or_else(|| Error::NotFound {
            symbol: symbol.to_string(),
            period: Period::Day1.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_dated_exports() {
        let data = "Date,Close\n2024-01-02,185.64\n2024-01-03,184.25\n";
        let series = read_series(data.as_bytes(), Some(DAILY_DATE)).unwrap();
        assert_eq!(series.closes(), vec![185.64, 184.25]);
        assert_eq!(
            series.points()[1].t.date_naive(),
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()
        );
    }

    #[test]
    fn rejects_garbage_prices() {
        let data = "Date,Close\n2024-01-02,lots\n";
        assert!(matches!(
            read_series(data.as_bytes(), Some(DAILY_DATE)),
            Err(Error::Domain(_))
        ));
    }
}
