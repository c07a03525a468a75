//! Processor: validate a price table and append indicator columns.
//!
//! Appends `SMA_20`, `RSI_14` and the MACD triple (`MACD`, `MACD_Signal`,
//! `MACD_Hist`, 12/26/9). Indicator warmup rows are null, never zero, and the
//! row count of the cleaned input is preserved.

use polars::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use crate::data::normalize::coerce_numeric;
use crate::data::DataError;
use crate::indicators::{Indicator, Macd, Rsi, Sma};
use crate::schema::{CLOSE, MACD, MACD_HIST, MACD_SIGNAL, RSI_14, SMA_20};

pub const SMA_PERIOD: usize = 20;
pub const RSI_PERIOD: usize = 14;

/// Rows needed before the slowest required indicator produces a value.
pub const MIN_ROWS: usize = SMA_PERIOD;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("input data must be a table with at least one column")]
    NotTabular,

    #[error("table must contain a '{0}' column")]
    MissingColumn(String),

    #[error("not enough data points for indicators: {available} valid rows, {required} required")]
    InsufficientData { required: usize, available: usize },

    #[error("close price coercion failed: {0}")]
    Coercion(#[from] DataError),

    #[error("indicator computation failed: {0}")]
    Polars(#[from] PolarsError),
}

/// Holds the input table and, once computed, the processed table.
#[derive(Debug, Clone)]
pub struct DataProcessor {
    data: DataFrame,
    processed: Option<DataFrame>,
}

impl DataProcessor {
    pub fn new(data: DataFrame) -> Self {
        Self {
            data,
            processed: None,
        }
    }

    pub fn calculate_indicators(&mut self) -> Result<&DataFrame, ProcessError> {
        let processed = calculate_indicators(&self.data)?;
        Ok(self.processed.insert(processed))
    }

    pub fn processed(&self) -> Option<&DataFrame> {
        self.processed.as_ref()
    }
}

/// Validate `data` and return a copy extended with the indicator columns.
pub fn calculate_indicators(data: &DataFrame) -> Result<DataFrame, ProcessError> {
    if data.width() == 0 {
        return Err(ProcessError::NotTabular);
    }

    let close = data
        .column(CLOSE)
        .map_err(|_| ProcessError::MissingColumn(CLOSE.to_string()))?
        .as_materialized_series()
        .clone();

    let mut df = data.clone();
    df.with_column(coerce_numeric(&close)?)?;
    let df_height = df.height();
    let mut df = df.drop_nulls(Some(&[CLOSE.to_string()][..]))?;
    if df.height() < df_height {
        debug!(dropped = df_height - df.height(), "dropped rows without a close price");
    }

    if df.height() < MIN_ROWS {
        return Err(ProcessError::InsufficientData {
            required: MIN_ROWS,
            available: df.height(),
        });
    }

    let closes: Vec<f64> = df
        .column(CLOSE)?
        .f64()?
        .into_no_null_iter()
        .collect();

    let macd = Macd::default().compute_all(&closes);
    let columns = [
        (SMA_20, Sma::new(SMA_PERIOD).compute(&closes)),
        (RSI_14, Rsi::new(RSI_PERIOD).compute(&closes)),
        (MACD, macd.macd),
        (MACD_SIGNAL, macd.signal),
        (MACD_HIST, macd.hist),
    ];
    for (name, values) in columns {
        df.with_column(nan_to_null(name, &values))?;
    }

    info!(rows = df.height(), "calculated indicators");
    Ok(df)
}

fn nan_to_null(name: &str, values: &[f64]) -> Series {
    let values: Vec<Option<f64>> = values
        .iter()
        .map(|&v| (!v.is_nan()).then_some(v))
        .collect();
    Series::new(name.into(), values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::INDICATOR_COLUMNS;

    fn ramp(n: usize) -> DataFrame {
        let dates: Vec<String> = (0..n)
            .map(|i| {
                let day = chrono::NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
                (day + chrono::Duration::days(i as i64)).to_string()
            })
            .collect();
        let closes: Vec<i64> = (30..30 + n as i64).collect();
        df!("Date" => dates, "Close" => closes).unwrap()
    }

    #[test]
    fn adds_all_indicator_columns() {
        let mut processor = DataProcessor::new(ramp(30));
        let result = processor.calculate_indicators().unwrap();
        for col in INDICATOR_COLUMNS {
            assert!(result.column(col).is_ok(), "missing {col}");
        }
        assert_eq!(result.width(), 2 + 5);
        assert_eq!(result.height(), 30);
        assert!(processor.processed().is_some());
    }

    #[test]
    fn warmup_rows_are_null_not_zero() {
        let result = calculate_indicators(&ramp(40)).unwrap();
        let sma = result.column(SMA_20).unwrap();
        assert_eq!(sma.null_count(), 19);
        assert_eq!(sma.f64().unwrap().get(19), Some(39.5));
        assert_eq!(result.column(RSI_14).unwrap().null_count(), 14);
        assert_eq!(result.column(MACD).unwrap().null_count(), 33);
        assert_eq!(result.column(MACD_HIST).unwrap().null_count(), 33);
    }

    #[test]
    fn insufficient_data() {
        let err = calculate_indicators(&ramp(10)).unwrap_err();
        assert!(matches!(
            err,
            ProcessError::InsufficientData { required: 20, available: 10 }
        ));
        assert!(err.to_string().contains("not enough data points"));
    }

    #[test]
    fn missing_close_column() {
        let df = df!("Date" => &["2025-09-01"], "Open" => &[1.0]).unwrap();
        let err = calculate_indicators(&df).unwrap_err();
        assert!(matches!(&err, ProcessError::MissingColumn(c) if c == CLOSE));
        assert!(err.to_string().contains("must contain a 'Close' column"));
    }

    #[test]
    fn empty_frame_is_not_tabular() {
        let err = calculate_indicators(&DataFrame::empty()).unwrap_err();
        assert!(matches!(err, ProcessError::NotTabular));
    }

    #[test]
    fn unparseable_closes_are_dropped_before_counting() {
        let mut closes: Vec<Option<&str>> = (0..25).map(|_| Some("10.5")).collect();
        closes[3] = Some("n/a");
        closes[7] = None;
        let df = df!("Close" => closes).unwrap();
        let result = calculate_indicators(&df).unwrap();
        assert_eq!(result.height(), 23);
        assert_eq!(result.column(CLOSE).unwrap().dtype(), &DataType::Float64);

        let mut short: Vec<Option<&str>> = (0..20).map(|_| Some("1")).collect();
        short[0] = Some("bad");
        let err = calculate_indicators(&df!("Close" => short).unwrap()).unwrap_err();
        assert!(matches!(err, ProcessError::InsufficientData { available: 19, .. }));
    }

    #[test]
    fn input_is_not_mutated() {
        let input = ramp(25);
        let _ = calculate_indicators(&input).unwrap();
        assert_eq!(input.width(), 2);
        assert_eq!(input.column(CLOSE).unwrap().dtype(), &DataType::Int64);
    }
}
