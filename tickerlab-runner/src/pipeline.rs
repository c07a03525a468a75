//! Stage orchestration: fetch, process, export.
//!
//! Stages run strictly in order and each failure is reported with the name of
//! the stage it came from. Nothing is exported when an earlier stage fails.

use std::path::PathBuf;

use chrono::NaiveDate;
use polars::prelude::DataFrame;
use thiserror::Error;
use tickerlab_core::data::{CsvProvider, ProviderError, YahooProvider};
use tickerlab_core::{
    calculate_indicators, DataError, DataFetcher, DataProvider, InstrumentQuery, ProcessError,
};
use tracing::info;

use crate::config::{ConfigError, PipelineConfig, SourceConfig};
use crate::export::{ExportError, Exporter};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration failed: {0}")]
    Config(#[from] ConfigError),

    #[error("provider setup failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("fetch stage failed: {0}")]
    Fetch(#[from] DataError),

    #[error("process stage failed: {0}")]
    Process(#[from] ProcessError),

    #[error("export stage failed: {0}")]
    Export(#[from] ExportError),
}

/// Result of a full run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub query: InstrumentQuery,
    /// Normalized table with the indicator columns appended.
    pub data: DataFrame,
    /// Destination written by the export stage, if any.
    pub exported: Option<PathBuf>,
}

/// Build the provider named by `source`: the CSV importer when a path is set,
/// the network provider otherwise.
pub fn provider_for(source: &SourceConfig) -> Result<Box<dyn DataProvider>, PipelineError> {
    match &source.csv {
        Some(path) => Ok(Box::new(
            CsvProvider::new(path).with_header_rows(source.header_rows),
        )),
        None => Ok(Box::new(YahooProvider::new()?)),
    }
}

/// Fetch and normalize.
pub fn fetch(
    query: InstrumentQuery,
    provider: Box<dyn DataProvider>,
) -> Result<DataFrame, PipelineError> {
    let mut fetcher = DataFetcher::new(query, provider);
    fetcher.fetch_data()?;
    Ok(fetcher.into_data()?)
}

/// Fetch, normalize and append indicators.
pub fn analyze(
    query: InstrumentQuery,
    provider: Box<dyn DataProvider>,
) -> Result<DataFrame, PipelineError> {
    let data = fetch(query, provider)?;
    Ok(calculate_indicators(&data)?)
}

/// Write `data` to the configured destination. Returns the path written, or
/// `None` when no output path is configured.
pub fn export(data: &DataFrame, config: &PipelineConfig) -> Result<Option<PathBuf>, PipelineError> {
    let (Some(path), Some(format)) = (&config.output.path, config.output_format()) else {
        return Ok(None);
    };
    let output = &config.output;
    Exporter::export(data, path, format, output.csv.clone(), output.xlsx.clone())?;
    Ok(Some(path.clone()))
}

/// Run every configured stage with an explicit provider.
pub fn run_with_provider(
    config: &PipelineConfig,
    provider: Box<dyn DataProvider>,
    today: NaiveDate,
) -> Result<PipelineOutput, PipelineError> {
    let query = config.query(today)?;
    let data = analyze(query.clone(), provider)?;

    let exported = export(&data, config)?;

    info!(
        symbol = query.symbol(),
        rows = data.height(),
        exported = exported.is_some(),
        "pipeline finished"
    );
    Ok(PipelineOutput {
        query,
        data,
        exported,
    })
}

/// Run every configured stage, choosing the provider from the config.
pub fn run(config: &PipelineConfig, today: NaiveDate) -> Result<PipelineOutput, PipelineError> {
    let provider = provider_for(&config.source)?;
    run_with_provider(config, provider, today)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickerlab_core::data::RawTable;
    use tickerlab_core::Interval;

    struct Unreachable;

    impl DataProvider for Unreachable {
        fn name(&self) -> &str {
            "unreachable"
        }

        fn fetch(&self, _query: &InstrumentQuery) -> Result<RawTable, ProviderError> {
            Err(ProviderError::NetworkUnreachable("connection refused".into()))
        }
    }

    fn query() -> InstrumentQuery {
        let d = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        InstrumentQuery::new("AAPL", d, d, Interval::OneDay).unwrap()
    }

    #[test]
    fn fetch_failure_names_the_stage() {
        let err = analyze(query(), Box::new(Unreachable)).unwrap_err();
        assert!(matches!(err, PipelineError::Fetch(DataError::Fetch { .. })));
        let msg = err.to_string();
        assert!(msg.starts_with("fetch stage failed"), "{msg}");
        assert!(msg.contains("AAPL"), "{msg}");
    }

    #[test]
    fn config_failure_stops_before_fetch() {
        let err = run_with_provider(
            &PipelineConfig::default(),
            Box::new(Unreachable),
            NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Config(ConfigError::MissingSymbol)));
    }

    #[test]
    fn csv_source_selects_csv_provider() {
        let source = SourceConfig {
            csv: Some("prices.csv".into()),
            header_rows: 2,
        };
        assert_eq!(provider_for(&source).unwrap().name(), "csv_import");
    }
}
