//! End-to-end pipeline tests with an in-memory provider and temp-file exports.

use chrono::NaiveDate;
use polars::prelude::*;
use tickerlab_core::data::{
    coerce_numeric, CsvProvider, DataProvider, InstrumentQuery, Normalizer, ProviderError,
    RawTable,
};
use tickerlab_core::schema::{CLOSE, DATE, INDICATOR_COLUMNS, OHLCV};
use tickerlab_runner::{
    run, run_with_provider, CsvOverrides, ExportError, OutputConfig, PipelineConfig,
    PipelineError, SourceConfig, XlsxOverrides,
};

struct SyntheticProvider {
    bars: usize,
}

impl DataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(&self, query: &InstrumentQuery) -> Result<RawTable, ProviderError> {
        let dates: Vec<String> = (0..self.bars)
            .map(|i| (query.start() + chrono::Duration::days(i as i64)).to_string())
            .collect();
        let closes: Vec<f64> = (0..self.bars)
            .map(|i| 50.0 + (i as f64 / 4.0).cos() * 3.0 + i as f64 * 0.11)
            .collect();
        let df = df!(
            "Date" => dates,
            "Open" => closes.iter().map(|c| c - 0.25).collect::<Vec<_>>(),
            "High" => closes.iter().map(|c| c + 0.75).collect::<Vec<_>>(),
            "Low" => closes.iter().map(|c| c - 1.0).collect::<Vec<_>>(),
            "Close" => &closes,
            "Volume" => (0..self.bars as i64).map(|i| 500_000 + i * 17).collect::<Vec<_>>(),
        )?;
        Ok(RawTable::from(df))
    }
}

fn config(output: Option<std::path::PathBuf>) -> PipelineConfig {
    PipelineConfig {
        symbol: Some("MSFT".into()),
        start: NaiveDate::from_ymd_opt(2024, 1, 1),
        end: NaiveDate::from_ymd_opt(2024, 12, 31),
        output: OutputConfig {
            path: output,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
}

#[test]
fn csv_export_round_trips_prices_and_indicators() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("msft.csv");
    let output = run_with_provider(
        &config(Some(path.clone())),
        Box::new(SyntheticProvider { bars: 90 }),
        today(),
    )
    .unwrap();
    assert_eq!(output.exported.as_deref(), Some(path.as_path()));

    let raw = CsvProvider::new(&path).fetch(&output.query).unwrap();
    let reread = Normalizer::normalize(raw).unwrap();
    assert_eq!(reread.height(), output.data.height());
    assert_eq!(reread.height(), 90);

    for name in std::iter::once(DATE).chain(OHLCV) {
        let expected = output.data.column(name).unwrap().as_materialized_series();
        let actual = reread.column(name).unwrap().as_materialized_series();
        assert!(expected.equals_missing(actual), "{name} changed in round trip");
    }
    for name in INDICATOR_COLUMNS {
        let expected = output.data.column(name).unwrap().as_materialized_series();
        let actual = coerce_numeric(reread.column(name).unwrap().as_materialized_series()).unwrap();
        assert!(expected.equals_missing(&actual), "{name} changed in round trip");
    }
}

#[test]
fn no_output_path_skips_export() {
    let output = run_with_provider(&config(None), Box::new(SyntheticProvider { bars: 30 }), today())
        .unwrap();
    assert!(output.exported.is_none());
    assert_eq!(output.data.width(), 6 + INDICATOR_COLUMNS.len());
}

#[test]
fn forced_xlsx_format_on_csv_path_fails_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.csv");
    let mut config = config(Some(path.clone()));
    config.output.format = Some(tickerlab_runner::ExportFormat::Xlsx);

    let err = run_with_provider(&config, Box::new(SyntheticProvider { bars: 30 }), today())
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Export(ExportError::WrongExtension { .. })
    ));
    assert!(err.to_string().starts_with("export stage failed"));
    assert!(!path.exists());
}

#[test]
fn short_history_fails_in_process_stage_and_exports_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.csv");
    let err = run_with_provider(
        &config(Some(path.clone())),
        Box::new(SyntheticProvider { bars: 12 }),
        today(),
    )
    .unwrap_err();
    assert!(err.to_string().starts_with("process stage failed"));
    assert!(!path.exists());
}

#[test]
fn spreadsheet_export_writes_workbook() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("msft.xlsx");
    let output = run_with_provider(
        &config(Some(path.clone())),
        Box::new(SyntheticProvider { bars: 40 }),
        today(),
    )
    .unwrap();
    assert_eq!(output.exported, Some(path.clone()));
    assert!(std::fs::metadata(&path).unwrap().len() > 0);
}

#[test]
fn csv_overrides_apply_through_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("semi.csv");
    let mut config = config(Some(path.clone()));
    config.output.csv = CsvOverrides {
        delimiter: Some(';'),
        ..Default::default()
    };
    run_with_provider(&config, Box::new(SyntheticProvider { bars: 25 }), today()).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let header = text.lines().next().unwrap();
    assert!(header.starts_with("Date;Open;High;Low;Close;Volume;SMA_20"), "{header}");

    let query = config.query(today()).unwrap();
    let raw = CsvProvider::new(&path)
        .with_delimiter(b';')
        .fetch(&query)
        .unwrap();
    let reread = Normalizer::normalize(raw).unwrap();
    assert_eq!(reread.column(CLOSE).unwrap().null_count(), 0);
}

#[test]
fn run_reads_a_local_source_and_exports() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("prices.csv");
    let mut text = String::from("Date,Open,High,Low,Close,Volume\n");
    for i in 0..45 {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + chrono::Duration::days(i);
        let close = 120.0 + (i as f64 * 0.7).sin() * 4.0;
        text.push_str(&format!(
            "{day},{},{},{},{close},{}\n",
            close - 0.5,
            close + 1.0,
            close - 1.5,
            10_000 + i * 3
        ));
    }
    std::fs::write(&source, text).unwrap();

    let target = dir.path().join("from_file.xlsx");
    let mut config = config(Some(target.clone()));
    config.source = SourceConfig {
        csv: Some(source),
        header_rows: 1,
    };
    config.output.xlsx = XlsxOverrides {
        sheet_name: Some("Prices".into()),
    };

    let output = run(&config, today()).unwrap();
    assert_eq!(output.data.height(), 45);
    assert_eq!(output.data.column(CLOSE).unwrap().null_count(), 0);
    assert_eq!(output.exported.as_deref(), Some(target.as_path()));
    assert!(std::fs::read(&target).unwrap().starts_with(b"PK"));
}

#[test]
fn run_with_missing_local_source_fails_in_fetch_stage() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("never.csv");
    let mut config = config(Some(target.clone()));
    config.source.csv = Some(dir.path().join("absent.csv"));

    let err = run(&config, today()).unwrap_err();
    assert!(matches!(err, PipelineError::Fetch(_)), "{err}");
    assert!(!target.exists());
}
