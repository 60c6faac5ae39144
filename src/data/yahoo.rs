/*!
[Yahoo Finance](https://finance.yahoo.com/) chart API data source
*/
use super::csv_store::save_series;
use super::{DataSource, Period, PricePoint, PriceSeries};
use crate::{Error, Result};
use chrono::{TimeZone, Utc};
use reqwest::Url;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The Yahoo Finance API base URL
pub const YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: Meta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
struct Meta {
    #[serde(default)]
    gmtoffset: i32,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// The rows of a chart payload, and the exchange they trade on
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoints {
    /// Every row with a closing price, in payload order
    pub points: Vec<PricePoint>,
    /// The exchange's offset in seconds east of UTC
    pub utc_offset: i32,
}

/// Parse a chart API payload into price points, skipping rows without a closing price.
///
/// A "Not Found" API error, or a payload without any rows, is reported as [`Error::NotFound`].
pub fn parse_chart(symbol: &str, period: &str, body: &str) -> Result<ChartPoints> {
    let not_found = || Error::NotFound {
        symbol: symbol.to_string(),
        period: period.to_string(),
    };
    let response: ChartResponse = serde_json::from_str(body).map_err(|err| Error::Fetch {
        symbol: symbol.to_string(),
        reason: format!("unreadable response: {}", err),
    })?;
    if let Some(error) = response.chart.error {
        if error.code == "Not Found" {
            return Err(not_found());
        }
        return Err(Error::Fetch {
            symbol: symbol.to_string(),
            reason: format!("{}: {}", error.code, error.description),
        });
    }
    let data = match response.chart.result.and_then(|result| result.into_iter().next()) {
        Some(data) => data,
        None => return Err(not_found()),
    };
    let utc_offset = data.meta.gmtoffset;
    let closes = data
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|quote| quote.close)
        .unwrap_or_default();
    let points: Vec<PricePoint> = data
        .timestamp
        .iter()
        .zip(closes)
        .filter_map(|(&ts, close)| {
            let t = Utc.timestamp_opt(ts, 0).single()?;
            Some(PricePoint::new(t, close?))
        })
        .collect();
    if points.is_empty() {
        return Err(not_found());
    }
    Ok(ChartPoints { points, utc_offset })
}

/// The chart API URL for `symbol`, with the symbol percent-encoded as a single path segment
pub fn chart_url(base_url: &str, symbol: &str, interval: &str, range: &str) -> Result<Url> {
    let bad_base = |reason: String| Error::Fetch {
        symbol: symbol.to_string(),
        reason: format!("bad base URL {:?}: {}", base_url, reason),
    };
    let mut url = Url::parse(base_url).map_err(|err| bad_base(err.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| bad_base("cannot hold a path".into()))?
        .pop_if_empty()
        .extend(&["v8", "finance", "chart", symbol]);
    url.query_pairs_mut()
        .append_pair("interval", interval)
        .append_pair("range", range);
    Ok(url)
}

/// Keep the last point of every run of equal or decreasing timestamps
fn dedup_sorted(mut points: Vec<PricePoint>) -> Vec<PricePoint> {
    points.sort_by_key(|point| point.t);
    let mut out: Vec<PricePoint> = Vec::with_capacity(points.len());
    for point in points {
        match out.last_mut() {
            Some(last) if last.t == point.t => *last = point,
            _ => out.push(point),
        }
    }
    out
}

/// A blocking Yahoo Finance client
#[derive(Debug, Clone)]
pub struct YahooSource {
    base_url: String,
    client: reqwest::blocking::Client,
    /// If set, every fetched history is also written to `<dir>/<SYMBOL>.csv`
    pub save_dir: Option<PathBuf>,
}

impl YahooSource {
    /// Create a new client against the public API
    pub fn new() -> Result<YahooSource> {
        YahooSource::with_base_url(YAHOO_BASE_URL)
    }

    /// Create a new client against another API root
    pub fn with_base_url(base_url: impl Into<String>) -> Result<YahooSource> {
        let client = reqwest::blocking::Client::builder()
            .user_agent("Mozilla/5.0")
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| Error::Fetch {
                symbol: String::new(),
                reason: format!("could not build HTTP client: {}", err),
            })?;
        Ok(YahooSource {
            base_url: base_url.into(),
            client,
            save_dir: None,
        })
    }

    /// Persist fetched histories to `dir`
    pub fn saving_to(mut self, dir: impl Into<PathBuf>) -> YahooSource {
        self.save_dir = Some(dir.into());
        self
    }

    fn chart(&self, symbol: &str, interval: &str, range: &str) -> Result<ChartPoints> {
        let url = chart_url(&self.base_url, symbol, interval, range)?;
        debug!("Fetching {}", url);
        let fetch_err = |err: reqwest::Error| Error::Fetch {
            symbol: symbol.to_string(),
            reason: err.to_string(),
        };
        // Unknown symbols answer 404 with a chart error body, so the status is not checked here
        let body = self
            .client
            .get(url)
            .send()
            .map_err(fetch_err)?
            .text()
            .map_err(fetch_err)?;
        parse_chart(symbol, range, &body)
    }
}

impl DataSource for YahooSource {
    fn fetch(&mut self, symbol: &str, period: Period) -> Result<PriceSeries> {
        let chart = self.chart(symbol, "1d", period.as_str())?;
        let series = PriceSeries::from_points(dedup_sorted(chart.points))?
            .with_utc_offset(chart.utc_offset);
        info!("Fetched {} daily closes for {}", series.len(), symbol);
        if let Some(dir) = &self.save_dir {
            // Persistence is a convenience: failing to write does not fail the fetch
            if let Err(err) = save_series(dir, symbol, &series) {
                warn!("Could not save {}: {}", symbol, err);
            }
        }
        Ok(series)
    }

    fn fetch_latest(&mut self, symbol: &str) -> Result<PricePoint> {
        let chart = self.chart(symbol, "1m", Period::Day1.as_str())?;
        chart.points.last().copied().ok_or_else(|| Error::NotFound {
            symbol: symbol.to_string(),
            period: Period::Day1.to_string(),
        })
    }
}
