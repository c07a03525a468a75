//! Export stage: write a table to delimited text or to an `.xlsx` workbook.
//!
//! Neither writer emits an index column unless asked to. Timestamp columns are
//! rendered with the configured date format in CSV and as real date cells in
//! spreadsheets.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Days between 0001-01-01 (CE day 1) and the Unix epoch.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Header of the optional row-number column.
pub const INDEX_HEADER: &str = "index";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("cannot export: input must be a table with at least one column")]
    NotTabular,

    #[error("invalid export destination: {0}")]
    InvalidDestination(String),

    #[error("spreadsheet export requires a .xlsx path, got '{}'", path.display())]
    WrongExtension { path: PathBuf },

    #[error("invalid export option: {0}")]
    InvalidOption(String),

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("csv writer error: {0}")]
    Csv(#[from] csv::Error),

    #[error("xlsx writer error: {0}")]
    Xlsx(#[from] XlsxError),

    #[error("{0}")]
    Polars(#[from] PolarsError),
}

/// Output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Xlsx,
}

impl ExportFormat {
    /// `.xlsx` (any case) selects a spreadsheet, everything else CSV.
    pub fn from_path(path: &Path) -> Self {
        if has_xlsx_extension(path) {
            Self::Xlsx
        } else {
            Self::Csv
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "xlsx" => Ok(Self::Xlsx),
            other => Err(ExportError::InvalidOption(format!(
                "unknown export format '{other}' (expected csv or xlsx)"
            ))),
        }
    }
}

/// Text encoding of CSV output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CsvEncoding {
    #[default]
    #[serde(rename = "utf-8")]
    Utf8,
    /// UTF-8 with a leading byte-order mark, for spreadsheet apps that sniff it.
    #[serde(rename = "utf-8-bom")]
    Utf8Bom,
}

/// Fully resolved CSV writer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub date_format: String,
    /// Prepend a 0-based row number column headed `index`.
    pub index: bool,
    pub encoding: CsvEncoding,
    /// Fixed number of decimals; `None` writes the shortest round-trip form.
    pub float_precision: Option<usize>,
    pub header: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            date_format: "%Y-%m-%d".to_string(),
            index: false,
            encoding: CsvEncoding::Utf8,
            float_precision: None,
            header: true,
        }
    }
}

impl CsvOptions {
    /// Defaults with each `Some` override applied. Every other setting keeps
    /// its default.
    pub fn with_overrides(overrides: &CsvOverrides) -> Result<Self, ExportError> {
        let defaults = Self::default();

        let delimiter = match overrides.delimiter {
            None => defaults.delimiter,
            Some(c) if c.is_ascii() => c as u8,
            Some(c) => {
                return Err(ExportError::InvalidOption(format!(
                    "delimiter '{c}' is not a single-byte character"
                )))
            }
        };

        let date_format = overrides
            .date_format
            .clone()
            .unwrap_or(defaults.date_format);
        if date_format.is_empty()
            || StrftimeItems::new(&date_format).any(|item| matches!(item, Item::Error))
        {
            return Err(ExportError::InvalidOption(format!(
                "invalid date format '{date_format}'"
            )));
        }

        Ok(Self {
            delimiter,
            date_format,
            index: overrides.index.unwrap_or(defaults.index),
            encoding: overrides.encoding.unwrap_or(defaults.encoding),
            float_precision: overrides.float_precision.or(defaults.float_precision),
            header: overrides.header.unwrap_or(defaults.header),
        })
    }
}

/// Caller-supplied CSV settings. Unset fields fall back to [`CsvOptions::default`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CsvOverrides {
    pub delimiter: Option<char>,
    pub date_format: Option<String>,
    pub index: Option<bool>,
    pub encoding: Option<CsvEncoding>,
    pub float_precision: Option<usize>,
    pub header: Option<bool>,
}

/// Caller-supplied workbook settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct XlsxOverrides {
    /// Worksheet name; the writer names it `Sheet1` otherwise.
    pub sheet_name: Option<String>,
}

/// Writes processed tables to disk.
pub struct Exporter;

impl Exporter {
    /// Write `df` as delimited text.
    pub fn to_csv(
        df: &DataFrame,
        path: impl AsRef<Path>,
        overrides: CsvOverrides,
    ) -> Result<(), ExportError> {
        let path = path.as_ref();
        if df.width() == 0 {
            return Err(ExportError::NotTabular);
        }
        check_destination(path)?;
        let options = CsvOptions::with_overrides(&overrides)?;

        let mut columns: Vec<(String, Vec<String>)> = Vec::with_capacity(df.width() + 1);
        if options.index {
            let rows = (0..df.height()).map(|i| i.to_string()).collect();
            columns.push((INDEX_HEADER.to_string(), rows));
        }
        for column in df.get_columns() {
            columns.push((
                column.name().to_string(),
                format_column(column.as_materialized_series(), &options)?,
            ));
        }

        let io_err = |source: io::Error| ExportError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut file = BufWriter::new(File::create(path).map_err(io_err)?);
        if options.encoding == CsvEncoding::Utf8Bom {
            file.write_all(UTF8_BOM).map_err(io_err)?;
        }

        let mut wtr = csv::WriterBuilder::new()
            .delimiter(options.delimiter)
            .from_writer(file);
        if options.header {
            wtr.write_record(columns.iter().map(|(name, _)| name.as_str()))?;
        }
        for row in 0..df.height() {
            wtr.write_record(columns.iter().map(|(_, cells)| cells[row].as_str()))?;
        }
        wtr.flush().map_err(io_err)?;

        info!(path = %path.display(), rows = df.height(), "exported CSV");
        Ok(())
    }

    /// Write `df` to a single-sheet `.xlsx` workbook.
    ///
    /// The extension and sheet name are checked before anything touches the
    /// filesystem.
    pub fn to_excel(
        df: &DataFrame,
        path: impl AsRef<Path>,
        overrides: XlsxOverrides,
    ) -> Result<(), ExportError> {
        let path = path.as_ref();
        if df.width() == 0 {
            return Err(ExportError::NotTabular);
        }
        check_destination(path)?;
        if !has_xlsx_extension(path) {
            return Err(ExportError::WrongExtension {
                path: path.to_path_buf(),
            });
        }

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        if let Some(name) = &overrides.sheet_name {
            sheet.set_name(name).map_err(|e| {
                ExportError::InvalidOption(format!("invalid sheet name '{name}': {e}"))
            })?;
        }
        let bold = Format::new().set_bold();
        for (idx, column) in df.get_columns().iter().enumerate() {
            let col = u16::try_from(idx).map_err(|_| XlsxError::RowColumnLimitError)?;
            sheet.write_string_with_format(0, col, column.name().as_str(), &bold)?;
            write_sheet_column(sheet, col, column.as_materialized_series())?;
        }

        workbook.save(path).map_err(|e| match e {
            XlsxError::IoError(source) => ExportError::Io {
                path: path.to_path_buf(),
                source,
            },
            other => ExportError::Xlsx(other),
        })?;

        info!(path = %path.display(), rows = df.height(), "exported spreadsheet");
        Ok(())
    }

    /// Dispatch on `format`. Only the overrides for that format are used.
    pub fn export(
        df: &DataFrame,
        path: impl AsRef<Path>,
        format: ExportFormat,
        csv: CsvOverrides,
        xlsx: XlsxOverrides,
    ) -> Result<(), ExportError> {
        match format {
            ExportFormat::Csv => Self::to_csv(df, path, csv),
            ExportFormat::Xlsx => Self::to_excel(df, path, xlsx),
        }
    }
}

fn has_xlsx_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"))
}

fn check_destination(path: &Path) -> Result<(), ExportError> {
    if path.as_os_str().is_empty() {
        return Err(ExportError::InvalidDestination("path is empty".into()));
    }
    if path.is_dir() {
        return Err(ExportError::InvalidDestination(format!(
            "{} is a directory",
            path.display()
        )));
    }
    Ok(())
}

fn to_naive_datetime(value: i64, unit: TimeUnit) -> Option<NaiveDateTime> {
    let dt = match unit {
        TimeUnit::Nanoseconds => DateTime::from_timestamp(
            value.div_euclid(1_000_000_000),
            value.rem_euclid(1_000_000_000) as u32,
        )?,
        TimeUnit::Microseconds => DateTime::from_timestamp(
            value.div_euclid(1_000_000),
            (value.rem_euclid(1_000_000) * 1_000) as u32,
        )?,
        TimeUnit::Milliseconds => DateTime::from_timestamp_millis(value)?,
    };
    Some(dt.naive_utc())
}

fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(EPOCH_DAYS_FROM_CE)?)
}

fn format_float(value: f64, precision: Option<usize>) -> String {
    if value.is_nan() {
        return String::new();
    }
    match precision {
        Some(p) => format!("{value:.p$}"),
        None => value.to_string(),
    }
}

/// Render every cell of `series` as text. Nulls become empty fields.
fn format_column(series: &Series, options: &CsvOptions) -> Result<Vec<String>, ExportError> {
    let fmt = options.date_format.as_str();
    let cells = match series.dtype() {
        DataType::Datetime(unit, _) => {
            let unit = *unit;
            let ints = series.cast(&DataType::Int64)?;
            ints.i64()?
                .into_iter()
                .map(|v| {
                    v.and_then(|v| to_naive_datetime(v, unit))
                        .map(|dt| dt.format(fmt).to_string())
                        .unwrap_or_default()
                })
                .collect()
        }
        DataType::Date => {
            let days = series.cast(&DataType::Int32)?;
            days.i32()?
                .into_iter()
                .map(|v| {
                    v.and_then(days_to_date)
                        .map(|d| d.and_time(NaiveTime::MIN).format(fmt).to_string())
                        .unwrap_or_default()
                })
                .collect()
        }
        DataType::Float64 => series
            .f64()?
            .into_iter()
            .map(|v| v.map(|v| format_float(v, options.float_precision)).unwrap_or_default())
            .collect(),
        DataType::Float32 => series
            .f32()?
            .into_iter()
            .map(|v| match (v, options.float_precision) {
                (Some(v), _) if v.is_nan() => String::new(),
                (Some(v), Some(p)) => format!("{v:.p$}"),
                (Some(v), None) => v.to_string(),
                (None, _) => String::new(),
            })
            .collect(),
        _ => {
            let text = series.cast(&DataType::String)?;
            text.str()?
                .into_iter()
                .map(|v| v.unwrap_or_default().to_string())
                .collect()
        }
    };
    Ok(cells)
}

fn sheet_row(idx: usize) -> Result<u32, ExportError> {
    u32::try_from(idx + 1).map_err(|_| ExportError::Xlsx(XlsxError::RowColumnLimitError))
}

/// Write one column below its header. Nulls are left blank.
fn write_sheet_column(sheet: &mut Worksheet, col: u16, series: &Series) -> Result<(), ExportError> {
    match series.dtype() {
        DataType::Datetime(unit, _) => {
            let unit = *unit;
            let ints = series.cast(&DataType::Int64)?;
            let values: Vec<Option<NaiveDateTime>> = ints
                .i64()?
                .into_iter()
                .map(|v| v.and_then(|v| to_naive_datetime(v, unit)))
                .collect();
            let all_midnight = values.iter().flatten().all(|dt| dt.time() == NaiveTime::MIN);
            let format = Format::new().set_num_format(if all_midnight {
                "yyyy-mm-dd"
            } else {
                "yyyy-mm-dd hh:mm:ss"
            });
            for (idx, value) in values.iter().enumerate() {
                if let Some(dt) = value {
                    sheet.write_datetime_with_format(sheet_row(idx)?, col, dt, &format)?;
                }
            }
        }
        DataType::Date => {
            let format = Format::new().set_num_format("yyyy-mm-dd");
            let days = series.cast(&DataType::Int32)?;
            for (idx, value) in days.i32()?.into_iter().enumerate() {
                if let Some(date) = value.and_then(days_to_date) {
                    sheet.write_datetime_with_format(sheet_row(idx)?, col, &date, &format)?;
                }
            }
        }
        DataType::Boolean => {
            for (idx, value) in series.bool()?.into_iter().enumerate() {
                if let Some(b) = value {
                    sheet.write_boolean(sheet_row(idx)?, col, b)?;
                }
            }
        }
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64
        | DataType::Float32
        | DataType::Float64 => {
            let floats = series.cast(&DataType::Float64)?;
            for (idx, value) in floats.f64()?.into_iter().enumerate() {
                if let Some(v) = value.filter(|v| v.is_finite()) {
                    sheet.write_number(sheet_row(idx)?, col, v)?;
                }
            }
        }
        _ => {
            let text = series.cast(&DataType::String)?;
            for (idx, value) in text.str()?.into_iter().enumerate() {
                if let Some(s) = value {
                    sheet.write_string(sheet_row(idx)?, col, s)?;
                }
            }
        }
    }
    Ok(())
}
