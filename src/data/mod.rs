/*!
Data processing and IO functions
*/
use crate::*;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use ta::Close;

pub mod csv_store;
pub mod fake;
pub mod scale;
pub mod window;
pub mod yahoo;

/// A single closing price observation for a stock
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct PricePoint<D = DateTime<Utc>, F = CpuFloat> {
    /// This point's timestamp
    #[serde(rename = "Date")]
    pub t: D,
    /// The closing price at this point
    #[serde(rename = "Close")]
    pub c: F,
}

impl PricePoint {
    /// Create a new price point
    #[inline]
    pub fn new(t: DateTime<Utc>, c: CpuFloat) -> PricePoint {
        PricePoint { t, c }
    }

    /// The calendar day of this point at an exchange `utc_offset` seconds east of UTC
    #[inline]
    pub fn trading_day(&self, utc_offset: i32) -> NaiveDate {
        (self.t + Duration::seconds(utc_offset as i64)).date_naive()
    }

    /// Whether this point falls on the same exchange-local trading day as another
    #[inline]
    pub fn same_period(&self, other: &PricePoint, utc_offset: i32) -> bool {
        self.trading_day(utc_offset) == other.trading_day(utc_offset)
    }
}

impl<D, F> Close for PricePoint<D, F>
where
    F: Copy + Into<f64>,
{
    #[inline]
    fn close(&self) -> f64 {
        self.c.into()
    }
}

/// What happened to a live point merged into a series
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Merge {
    /// The point belonged to the last entry's period, whose price was replaced in place
    Replaced,
    /// The point started a new period and was appended
    Appended,
    /// The point was older than the last entry and was ignored
    Stale,
}

/// An ordered series of daily closing prices
///
/// Timestamps are strictly increasing and every price is finite and positive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
    utc_offset: i32,
}

impl PriceSeries {
    /// Build a series from points, checking ordering and prices
    pub fn from_points(points: Vec<PricePoint>) -> Result<PriceSeries> {
        for (i, point) in points.iter().enumerate() {
            check_price(point)?;
            if i > 0 && points[i - 1].t >= point.t {
                return Err(Error::domain(format!(
                    "timestamps out of order at index {}: {} follows {}",
                    i,
                    point.t,
                    points[i - 1].t
                )));
            }
        }
        Ok(PriceSeries {
            points,
            utc_offset: 0,
        })
    }

    /// Build a series from closing prices on consecutive days starting at `start`
    pub fn daily(start: DateTime<Utc>, closes: &[CpuFloat]) -> Result<PriceSeries> {
        let points = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PricePoint::new(start + Duration::days(i as i64), c))
            .collect();
        PriceSeries::from_points(points)
    }

    /// Set the offset in seconds east of UTC of the exchange this series trades on
    pub fn with_utc_offset(mut self, utc_offset: i32) -> PriceSeries {
        self.utc_offset = utc_offset;
        self
    }

    /// The offset in seconds east of UTC of the exchange this series trades on
    #[inline]
    pub fn utc_offset(&self) -> i32 {
        self.utc_offset
    }

    /// The points of this series, oldest first
    #[inline]
    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    /// The closing prices of this series, oldest first
    pub fn closes(&self) -> Vec<CpuFloat> {
        self.points.iter().map(|point| point.c).collect()
    }

    /// The most recent point
    #[inline]
    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    /// The number of points in this series
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether this series has no points
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Merge a live point into the series.
    ///
    /// A point on the last entry's exchange-local trading day overwrites that entry's price, keeping its timestamp;
    /// a point from a later period is appended; anything older is ignored.
    pub fn merge_latest(&mut self, point: PricePoint) -> Result<Merge> {
        check_price(&point)?;
        let last = match self.points.last_mut() {
            Some(last) => last,
            None => {
                self.points.push(point);
                return Ok(Merge::Appended);
            }
        };
        if point.same_period(last, self.utc_offset) {
            last.c = point.c;
            Ok(Merge::Replaced)
        } else if point.t > last.t {
            self.points.push(point);
            Ok(Merge::Appended)
        } else {
            Ok(Merge::Stale)
        }
    }
}

fn check_price(point: &PricePoint) -> Result<()> {
    if point.c.is_finite() && point.c > 0.0 {
        Ok(())
    } else {
        Err(Error::domain(format!(
            "invalid closing price {} at {}",
            point.c, point.t
        )))
    }
}

/// A span of history to request from a data source
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Period {
    /// One day
    Day1,
    /// Five days
    Day5,
    /// One month
    Month1,
    /// Three months
    Month3,
    /// Six months
    Month6,
    /// One year
    Year1,
    /// Two years
    Year2,
    /// Five years
    Year5,
    /// Ten years
    Year10,
    /// Year to date
    YearToDate,
    /// All available history
    Max,
}

/// The period fetched when nothing else is requested
pub const DEFAULT_PERIOD: Period = Period::Year5;

impl Default for Period {
    fn default() -> Period {
        DEFAULT_PERIOD
    }
}

impl Period {
    /// This period as a range string, e.g. `5y`
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day1 => "1d",
            Period::Day5 => "5d",
            Period::Month1 => "1mo",
            Period::Month3 => "3mo",
            Period::Month6 => "6mo",
            Period::Year1 => "1y",
            Period::Year2 => "2y",
            Period::Year5 => "5y",
            Period::Year10 => "10y",
            Period::YearToDate => "ytd",
            Period::Max => "max",
        }
    }

    /// The first instant covered by this period, counting back from `end`. `None` covers everything.
    pub fn start_from(&self, end: DateTime<Utc>) -> Option<DateTime<Utc>> {
        use chrono::{Datelike, TimeZone};
        let days = match self {
            Period::Day1 => 1,
            Period::Day5 => 5,
            Period::Month1 => 30,
            Period::Month3 => 91,
            Period::Month6 => 182,
            Period::Year1 => 365,
            Period::Year2 => 730,
            Period::Year5 => 1826,
            Period::Year10 => 3652,
            Period::YearToDate => {
                return Utc.with_ymd_and_hms(end.year(), 1, 1, 0, 0, 0).single();
            }
            Period::Max => return None,
        };
        Some(end - Duration::days(days))
    }
}

impl Display for Period {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Period> {
        let period = match s.trim() {
            "1d" => Period::Day1,
            "5d" => Period::Day5,
            "1mo" => Period::Month1,
            "3mo" => Period::Month3,
            "6mo" => Period::Month6,
            "1y" => Period::Year1,
            "2y" => Period::Year2,
            "5y" => Period::Year5,
            "10y" => Period::Year10,
            "ytd" => Period::YearToDate,
            "max" => Period::Max,
            other => return Err(Error::Validation(format!("unknown period {:?}", other))),
        };
        Ok(period)
    }
}

/// A source of daily closing prices
pub trait DataSource {
    /// Fetch the daily closing prices of `symbol` over `period`
    fn fetch(&mut self, symbol: &str, period: Period) -> Result<PriceSeries>;
    /// Fetch the most recent intraday price of `symbol`
    fn fetch_latest(&mut self, symbol: &str) -> Result<PricePoint>;
}

impl<S: DataSource + ?Sized> DataSource for &mut S {
    fn fetch(&mut self, symbol: &str, period: Period) -> Result<PriceSeries> {
        (**self).fetch(symbol, period)
    }

    fn fetch_latest(&mut self, symbol: &str) -> Result<PricePoint> {
        (**self).fetch_latest(symbol)
    }
}

impl<S: DataSource + ?Sized> DataSource for Box<S> {
    fn fetch(&mut self, symbol: &str, period: Period) -> Result<PriceSeries> {
        (**self).fetch(symbol, period)
    }

    fn fetch_latest(&mut self, symbol: &str) -> Result<PricePoint> {
        (**self).fetch_latest(symbol)
    }
}
