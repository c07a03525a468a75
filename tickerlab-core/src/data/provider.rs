//! Data provider trait, raw response table and structured error types.
//!
//! The DataProvider trait abstracts over data sources (Yahoo Finance, CSV import)
//! so the fetcher can be pointed at a mock in tests.

use polars::prelude::*;
use thiserror::Error;

use super::query::InstrumentQuery;

/// Header of one raw column.
///
/// Providers returning several symbols at once label columns with a
/// `(field, symbol)` pair; single-symbol responses use plain names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnHeader {
    Flat(String),
    /// Levels from outermost to innermost.
    Levels(Vec<String>),
}

impl ColumnHeader {
    pub fn levels<I, S>(levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ColumnHeader::Levels(levels.into_iter().map(Into::into).collect())
    }

    pub fn is_multi_level(&self) -> bool {
        matches!(self, ColumnHeader::Levels(levels) if levels.len() > 1)
    }

    /// The field name this header carries once the symbol-grouping levels
    /// are dropped: the first non-empty level.
    pub fn field_name(&self) -> &str {
        match self {
            ColumnHeader::Flat(name) => name,
            ColumnHeader::Levels(levels) => levels
                .iter()
                .map(|l| l.trim())
                .find(|l| !l.is_empty())
                .unwrap_or(""),
        }
    }
}

impl From<&str> for ColumnHeader {
    fn from(name: &str) -> Self {
        ColumnHeader::Flat(name.to_string())
    }
}

/// One column of a provider response.
#[derive(Debug, Clone)]
pub struct RawColumn {
    pub header: ColumnHeader,
    pub values: Series,
}

/// A provider response before normalization.
///
/// Column names and dtypes are whatever the provider produced.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    columns: Vec<RawColumn>,
}

impl RawTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, header: impl Into<ColumnHeader>, values: Series) -> Self {
        self.push(header, values);
        self
    }

    pub fn push(&mut self, header: impl Into<ColumnHeader>, values: Series) {
        self.columns.push(RawColumn {
            header: header.into(),
            values,
        });
    }

    pub fn columns(&self) -> &[RawColumn] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<RawColumn> {
        self.columns
    }

    pub fn has_multi_level_header(&self) -> bool {
        self.columns.iter().any(|c| c.header.is_multi_level())
    }

    pub fn height(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }
}

impl From<DataFrame> for RawTable {
    fn from(df: DataFrame) -> Self {
        let columns = df
            .get_columns()
            .iter()
            .map(|c| RawColumn {
                header: ColumnHeader::Flat(c.name().to_string()),
                values: c.as_materialized_series().clone(),
            })
            .collect();
        Self { columns }
    }
}

/// Errors raised by a provider while talking to its backend.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("HTTP {status} from provider")]
    Http { status: u16 },

    #[error("rate limited by provider")]
    RateLimited,

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    Polars(#[from] PolarsError),
}

/// Structured error types for the fetch stage.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("failed to fetch data for {symbol}: {source}")]
    Fetch {
        symbol: String,
        #[source]
        source: ProviderError,
    },

    #[error("no data has been fetched; call fetch_data() first")]
    NotFetched,

    #[error("table has no valid date column (tried {tried:?})")]
    MissingTimestampColumn { tried: Vec<String> },

    #[error("unexpected table shape: {0}")]
    DataShape(String),

    #[error("invalid timestamp in column '{column}': {value}")]
    InvalidTimestamp { column: String, value: String },

    #[error("data error: {0}")]
    Polars(#[from] PolarsError),
}

/// Trait for market-data providers.
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch the raw time series for a query.
    fn fetch(&self, query: &InstrumentQuery) -> Result<RawTable, ProviderError>;
}
