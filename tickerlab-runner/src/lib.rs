//! TickerLab Runner: pipeline orchestration and export.
//!
//! This crate builds on `tickerlab-core` to provide:
//! - TOML pipeline configuration with date defaults
//! - Stage orchestration (fetch, process, export) with stage-tagged errors
//! - CSV export with per-setting overrides, and `.xlsx` export

pub mod config;
pub mod export;
pub mod pipeline;

pub use config::{ChartConfig, ConfigError, OutputConfig, PipelineConfig, SourceConfig};
pub use export::{
    CsvEncoding, CsvOptions, CsvOverrides, ExportError, ExportFormat, Exporter, XlsxOverrides,
    INDEX_HEADER,
};
pub use pipeline::{
    analyze, export, fetch, provider_for, run, run_with_provider, PipelineError, PipelineOutput,
};
