//! Price history from the public Yahoo chart endpoint.
//!
//! Fetches OHLCV bars from Yahoo's v8 chart API for any supported interval.
//! Daily and coarser intervals come back with a `Date` column, intraday
//! intervals with a `Datetime` column, mirroring the provider's own exports.
//!
//! The endpoint is unofficial and its payload shape can change without notice.
//! A response that no longer matches the expected shape is an error, never a
//! silently empty table.

use chrono::NaiveDate;
use polars::prelude::*;
use serde::Deserialize;
use tracing::{debug, info};

use super::provider::{DataProvider, ProviderError, RawTable};
use super::query::InstrumentQuery;
use crate::schema::{self, CLOSE, DATE, DATETIME, HIGH, LOW, OPEN, VOLUME};

const BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

/// Top-level body of a `/v8/finance/chart/{symbol}` reply.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
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
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

/// Blocking client for the chart endpoint.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl YahooProvider {
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_base_url(BASE_URL)
    }

    /// Point the provider at another chart endpoint (mirrors, test servers).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| ProviderError::NetworkUnreachable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Build the chart API URL for a query. The end date is inclusive.
    fn chart_url(&self, query: &InstrumentQuery) -> String {
        let start_ts = day_start(query.start());
        let end_ts = day_start(query.end()) + 86_399;
        format!(
            "{}/{}?period1={start_ts}&period2={end_ts}&interval={}",
            self.base_url,
            query.symbol(),
            query.interval()
        )
    }

    /// Parse the chart API response into a raw table.
    fn parse_response(
        query: &InstrumentQuery,
        resp: ChartResponse,
    ) -> Result<RawTable, ProviderError> {
        let symbol = query.symbol();
        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => ProviderError::SymbolNotFound {
                symbol: symbol.to_string(),
            },
            Some(err) => {
                ProviderError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            }
            None => ProviderError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ResponseFormatChanged("result array is empty".into()))?;

        let timestamps = data
            .timestamp
            .ok_or_else(|| ProviderError::SymbolNotFound {
                symbol: symbol.to_string(),
            })?;

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ResponseFormatChanged("no quote data".into()))?;

        let n = timestamps.len();
        for (field, len) in [
            (OPEN, quote.open.len()),
            (HIGH, quote.high.len()),
            (LOW, quote.low.len()),
            (CLOSE, quote.close.len()),
            (VOLUME, quote.volume.len()),
        ] {
            if len != n {
                return Err(ProviderError::ResponseFormatChanged(format!(
                    "{field} has {len} values for {n} timestamps"
                )));
            }
        }

        let millis: Vec<i64> = timestamps.iter().map(|ts| ts * 1000).collect();
        let ts_name = if query.interval().is_intraday() { DATETIME } else { DATE };
        let ts_series = Series::new(ts_name.into(), millis).cast(&schema::timestamp_dtype())?;

        Ok(RawTable::new()
            .with_column(ts_name, ts_series)
            .with_column(OPEN, Series::new(OPEN.into(), quote.open))
            .with_column(HIGH, Series::new(HIGH.into(), quote.high))
            .with_column(LOW, Series::new(LOW.into(), quote.low))
            .with_column(CLOSE, Series::new(CLOSE.into(), quote.close))
            .with_column(VOLUME, Series::new(VOLUME.into(), quote.volume)))
    }
}

fn day_start(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(&self, query: &InstrumentQuery) -> Result<RawTable, ProviderError> {
        let url = self.chart_url(query);
        debug!(%url, "requesting chart");

        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| ProviderError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::SymbolNotFound {
                symbol: query.symbol().to_string(),
            });
        }
        if !status.is_success() {
            return Err(ProviderError::Http {
                status: status.as_u16(),
            });
        }

        let chart: ChartResponse = resp.json().map_err(|e| {
            ProviderError::ResponseFormatChanged(format!(
                "failed to parse response for {}: {e}",
                query.symbol()
            ))
        })?;

        let table = Self::parse_response(query, chart)?;
        info!(symbol = query.symbol(), rows = table.height(), "fetched chart");
        Ok(table)
    }
}
