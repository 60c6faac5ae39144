/*!
Generate fake daily price data, for testing purposes
*/
use super::{DataSource, Period, PricePoint, PriceSeries};
use crate::{Error, Result};
use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// A trait implemented by price generators
pub trait PriceGen {
    /// Generate the next price, jumping forward a given amount of time
    fn price_after(&mut self, after: Duration) -> f64;
}

/// Generate fake prices using a time-weighted geometric random walk
#[derive(Debug, Clone)]
pub struct PriceRandomWalk<R> {
    /// The RNG used by this random walk
    pub rng: R,
    /// The current price
    pub price: f64,
    /// The expected log-return per day
    pub drift: f64,
    /// The standard deviation of the log-return per day
    pub volatility: f64,
}

impl<R: Rng> PriceGen for PriceRandomWalk<R> {
    fn price_after(&mut self, after: Duration) -> f64 {
        let days = after.num_seconds() as f64 / 86_400.0;
        let z: f64 = self.rng.sample(StandardNormal);
        self.price *= (self.drift * days + self.volatility * days.sqrt() * z).exp();
        self.price
    }
}

/// Iterate over weekdays, starting at (and including, if a weekday) a given instant
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TradingDays(pub DateTime<Utc>);

impl Iterator for TradingDays {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<DateTime<Utc>> {
        while matches!(self.0.weekday(), Weekday::Sat | Weekday::Sun) {
            self.0 = self.0 + Duration::days(1);
        }
        let day = self.0;
        self.0 = day + Duration::days(1);
        Some(day)
    }
}

/// A data source serving a reproducible random walk for any symbol
#[derive(Debug, Clone)]
pub struct FakeSource {
    /// Mixed with each symbol to seed its walk
    pub seed: u64,
    /// The last instant served
    pub end: DateTime<Utc>,
    /// The price each walk starts from
    pub start_price: f64,
    /// The daily volatility of each walk
    pub volatility: f64,
    /// Symbols which this source pretends not to know
    pub missing: Vec<String>,
    ticks: u64,
}

impl FakeSource {
    /// A source whose history ends at `end`
    pub fn new(seed: u64, end: DateTime<Utc>) -> FakeSource {
        FakeSource {
            seed,
            end,
            start_price: 40.0,
            volatility: 0.02,
            missing: Vec::new(),
            ticks: 0,
        }
    }

    /// Pretend that `symbol` has no data
    pub fn without(mut self, symbol: &str) -> FakeSource {
        self.missing.push(symbol.to_string());
        self
    }

    fn rng(&self, symbol: &str) -> StdRng {
        let mixed = symbol
            .bytes()
            .fold(self.seed, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        StdRng::seed_from_u64(mixed)
    }

    fn check(&self, symbol: &str, period: Period) -> Result<()> {
        if self.missing.iter().any(|missing| missing == symbol) {
            Err(Error::NotFound {
                symbol: symbol.to_string(),
                period: period.to_string(),
            })
        } else {
            Ok(())
        }
    }
}

impl DataSource for FakeSource {
    fn fetch(&mut self, symbol: &str, period: Period) -> Result<PriceSeries> {
        self.check(symbol, period)?;
        let start = period
            .start_from(self.end)
            .unwrap_or_else(|| self.end - Duration::days(3652));
        let mut walk = PriceRandomWalk {
            rng: self.rng(symbol),
            price: self.start_price,
            drift: 0.0002,
            volatility: self.volatility,
        };
        let mut points: Vec<PricePoint> = Vec::new();
        for t in TradingDays(start).take_while(|t| *t <= self.end) {
            let after = points
                .last()
                .map(|last| t - last.t)
                .unwrap_or_else(|| Duration::days(1));
            points.push(PricePoint::new(t, walk.price_after(after)));
        }
        if points.is_empty() {
            return Err(Error::NotFound {
                symbol: symbol.to_string(),
                period: period.to_string(),
            });
        }
        PriceSeries::from_points(points)
    }

    fn fetch_latest(&mut self, symbol: &str) -> Result<PricePoint> {
        self.check(symbol, Period::Day1)?;
        let last = *self.fetch(symbol, Period::Day5)?.last().ok_or_else(|| Error::NotFound {
            symbol: symbol.to_string(),
            period: Period::Day1.to_string(),
        })?;
        // Wiggle the last close a little on every tick
        self.ticks += 1;
        let mut rng = StdRng::seed_from_u64(self.ticks);
        let z: f64 = rng.sample(StandardNormal);
        Ok(PricePoint::new(last.t, last.c * (1.0 + 0.001 * z)))
    }
}
