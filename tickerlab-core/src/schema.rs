//! Canonical column names and dtypes for normalized and processed tables.

use polars::prelude::*;

/// Canonical timestamp column after normalization.
pub const DATE: &str = "Date";
/// Alternate timestamp column name used by the provider for intraday data.
pub const DATETIME: &str = "Datetime";

pub const OPEN: &str = "Open";
pub const HIGH: &str = "High";
pub const LOW: &str = "Low";
pub const CLOSE: &str = "Close";
pub const VOLUME: &str = "Volume";

/// The five numeric price-bar columns, in provider order.
pub const OHLCV: [&str; 5] = [CLOSE, HIGH, LOW, OPEN, VOLUME];

pub const SMA_20: &str = "SMA_20";
pub const RSI_14: &str = "RSI_14";
pub const MACD: &str = "MACD";
pub const MACD_SIGNAL: &str = "MACD_Signal";
pub const MACD_HIST: &str = "MACD_Hist";

/// Columns appended by the processor, in the order they are added.
pub const INDICATOR_COLUMNS: [&str; 5] = [SMA_20, RSI_14, MACD, MACD_SIGNAL, MACD_HIST];

/// Dtype of the canonical timestamp column.
pub fn timestamp_dtype() -> DataType {
    DataType::Datetime(TimeUnit::Milliseconds, None)
}

/// Expected schema of a processed table.
pub struct ProcessedSchema;

impl ProcessedSchema {
    pub fn schema() -> Schema {
        let mut fields = vec![Field::new(DATE.into(), timestamp_dtype())];
        fields.extend(
            [OPEN, HIGH, LOW, CLOSE, VOLUME]
                .into_iter()
                .chain(INDICATOR_COLUMNS)
                .map(|name| Field::new(name.into(), DataType::Float64)),
        );
        Schema::from_iter(fields)
    }

    /// Validate a DataFrame against the processed schema.
    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        let expected = Self::schema();
        let actual = df.schema();

        for field in expected.iter_fields() {
            let actual_dtype = actual
                .get(field.name())
                .ok_or_else(|| SchemaError::MissingColumn(field.name().to_string()))?;
            if actual_dtype != field.dtype() {
                return Err(SchemaError::TypeMismatch {
                    column: field.name().to_string(),
                    expected: field.dtype().clone(),
                    actual: actual_dtype.clone(),
                });
            }
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Type mismatch in column {column}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },
}
