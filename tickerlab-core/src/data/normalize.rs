//! Normalization of provider responses into the canonical table shape.
//!
//! After normalization a table has exactly one timestamp column named `Date`
//! (`Datetime(ms)`), every OHLCV column it carries is `Float64`, and no row
//! has a missing OHLCV value.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use tracing::debug;

use super::provider::{DataError, RawTable};
use crate::schema::{self, DATE, DATETIME, OHLCV};

const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

const OFFSET_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z"];

/// Normalizer for raw provider tables.
pub struct Normalizer;

impl Normalizer {
    /// Flatten headers, then clean.
    pub fn normalize(raw: RawTable) -> Result<DataFrame, DataError> {
        let df = Self::flatten(raw)?;
        Self::clean(df)
    }

    /// Collapse multi-level headers to their field-name level.
    pub fn flatten(raw: RawTable) -> Result<DataFrame, DataError> {
        if raw.has_multi_level_header() {
            debug!("flattening multi-level column header");
        }

        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(raw.columns().len());
        for raw_col in raw.into_columns() {
            let name = raw_col.header.field_name().to_string();
            if name.is_empty() {
                return Err(DataError::DataShape("column with an empty header".into()));
            }
            if !seen.insert(name.clone()) {
                return Err(DataError::DataShape(format!(
                    "column '{name}' appears more than once after flattening the header"
                )));
            }
            columns.push(Column::from(raw_col.values.with_name(name.into())));
        }

        DataFrame::new(columns).map_err(|e| DataError::DataShape(e.to_string()))
    }

    /// Locate and coerce the timestamp column, coerce OHLCV to floats and drop
    /// rows with missing prices. Idempotent.
    pub fn clean(mut df: DataFrame) -> Result<DataFrame, DataError> {
        let ts_name = Self::locate_timestamp(&df)?;
        if ts_name == DATETIME {
            df.rename(DATETIME, DATE.into())?;
        }

        let ts = df.column(DATE)?.as_materialized_series().clone();
        df.with_column(coerce_timestamp(&ts)?)?;

        let present: Vec<String> = OHLCV
            .into_iter()
            .filter(|name| df.get_column_index(name).is_some())
            .map(str::to_string)
            .collect();
        for name in &present {
            let values = df.column(name)?.as_materialized_series().clone();
            df.with_column(coerce_numeric(&values)?)?;
        }

        let before = df.height();
        let df = df.drop_nulls(Some(present.as_slice()))?;
        if df.height() < before {
            debug!(dropped = before - df.height(), "dropped rows with missing prices");
        }

        Ok(df)
    }

    /// `Date` first, then `Datetime`. Both present is ambiguous.
    fn locate_timestamp(df: &DataFrame) -> Result<&'static str, DataError> {
        let has_date = df.get_column_index(DATE).is_some();
        let has_datetime = df.get_column_index(DATETIME).is_some();
        match (has_date, has_datetime) {
            (true, true) => Err(DataError::DataShape(format!(
                "both '{DATE}' and '{DATETIME}' columns present"
            ))),
            (true, false) => Ok(DATE),
            (false, true) => Ok(DATETIME),
            (false, false) => Err(DataError::MissingTimestampColumn {
                tried: vec![DATE.to_string(), DATETIME.to_string()],
            }),
        }
    }
}

/// Coerce a timestamp column to `Datetime(ms)`.
///
/// Integers are epoch milliseconds. Empty strings become null; any other
/// unparseable string is an error.
pub fn coerce_timestamp(series: &Series) -> Result<Series, DataError> {
    let target = schema::timestamp_dtype();
    let name = series.name().clone();

    let coerced = match series.dtype() {
        DataType::Datetime(_, _) | DataType::Date => series.cast(&target)?,
        dt if dt.is_integer() => series.cast(&DataType::Int64)?.cast(&target)?,
        DataType::String => {
            let mut millis = Vec::with_capacity(series.len());
            for value in series.str()?.iter() {
                let parsed = match value.map(str::trim) {
                    None | Some("") => None,
                    Some(s) => Some(parse_timestamp(s).ok_or_else(|| {
                        DataError::InvalidTimestamp {
                            column: name.to_string(),
                            value: s.to_string(),
                        }
                    })?),
                };
                millis.push(parsed);
            }
            Series::new(name.clone(), millis).cast(&target)?
        }
        other => {
            return Err(DataError::DataShape(format!(
                "column '{name}' has dtype {other}, which is not a date/time"
            )))
        }
    };

    Ok(coerced.with_name(name))
}

/// Coerce a column to `Float64`. Unparseable values and NaN become null.
pub fn coerce_numeric(series: &Series) -> Result<Series, DataError> {
    let name = series.name().clone();
    let values: Vec<Option<f64>> = match series.dtype() {
        DataType::String => series
            .str()?
            .iter()
            .map(|v| v.and_then(|s| s.trim().parse::<f64>().ok()))
            .collect(),
        _ => {
            let floats = series.cast(&DataType::Float64)?;
            floats.f64()?.iter().collect()
        }
    };
    let values: Vec<Option<f64>> = values
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect();
    Ok(Series::new(name, values))
}

fn parse_timestamp(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for fmt in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.timestamp_millis());
        }
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}
