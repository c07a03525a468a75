//! Serializable pipeline configuration.
//!
//! A run is described by one TOML file:
//!
//! ```toml
//! symbol = "AAPL"
//! start = "2024-01-01"
//! interval = "1d"
//!
//! [output]
//! path = "aapl.csv"
//!
//! [output.csv]
//! delimiter = ";"
//!
//! [output.xlsx]
//! sheet_name = "Prices"
//!
//! [chart]
//! enabled = true
//! ```

use std::io;
use std::path::{Path, PathBuf};

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tickerlab_core::{DataError, InstrumentQuery, Interval, Period};

use crate::export::{CsvOverrides, ExportFormat, XlsxOverrides};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("no symbol given")]
    MissingSymbol,

    #[error("conflicting settings: {0}")]
    Conflict(String),

    #[error(transparent)]
    Query(#[from] DataError),
}

/// Everything needed to run fetch, process, export and chart for one symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Ticker symbol, e.g. `AAPL` or `ETL.PA`.
    pub symbol: Option<String>,

    /// Start of the range (inclusive). Defaults to one year before `end`.
    pub start: Option<NaiveDate>,

    /// End of the range (inclusive). Defaults to today.
    pub end: Option<NaiveDate>,

    /// Range shorthand ending on `end`; mutually exclusive with `start`.
    pub period: Option<Period>,

    #[serde(default)]
    pub interval: Interval,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub chart: ChartConfig,
}

/// Where raw data comes from. Without a CSV path the network provider is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    pub csv: Option<PathBuf>,
    /// Stacked header rows in the CSV file.
    pub header_rows: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            csv: None,
            header_rows: 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Export destination. No path, no export.
    pub path: Option<PathBuf>,
    /// Inferred from the path extension when absent.
    pub format: Option<ExportFormat>,
    pub csv: CsvOverrides,
    pub xlsx: XlsxOverrides,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChartConfig {
    pub enabled: bool,
    pub title: Option<String>,
    /// 16-color palette for terminals without true color.
    pub basic_colors: bool,
}

impl PipelineConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Resolve the instrument query, filling date defaults relative to `today`.
    pub fn query(&self, today: NaiveDate) -> Result<InstrumentQuery, ConfigError> {
        let symbol = self
            .symbol
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingSymbol)?;
        let end = self.end.unwrap_or(today);

        let query = match (self.start, self.period) {
            (Some(_), Some(period)) => {
                return Err(ConfigError::Conflict(format!(
                    "both a start date and period '{period}' were given"
                )))
            }
            (None, Some(period)) => {
                InstrumentQuery::from_period(symbol, period, end, self.interval)?
            }
            (start, None) => {
                let start = start.unwrap_or_else(|| default_start(end));
                InstrumentQuery::new(symbol, start, end, self.interval)?
            }
        };
        Ok(query)
    }

    /// The export format to use, if an output path is configured.
    pub fn output_format(&self) -> Option<ExportFormat> {
        let path = self.output.path.as_deref()?;
        Some(self.output.format.unwrap_or_else(|| ExportFormat::from_path(path)))
    }
}

fn default_start(end: NaiveDate) -> NaiveDate {
    end.checked_sub_months(Months::new(12)).unwrap_or(NaiveDate::MIN)
}
