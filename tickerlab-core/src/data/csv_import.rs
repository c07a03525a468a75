//! CSV import provider.
//!
//! Reads a previously exported price file as the provider response, every
//! column as untyped text. Normalization does the typing, exactly as it does
//! for network responses. Files with stacked header rows (field name above
//! symbol) yield multi-level headers.

use std::path::PathBuf;

use polars::prelude::*;
use tracing::info;

use super::provider::{ColumnHeader, DataProvider, ProviderError, RawTable};
use super::query::InstrumentQuery;

/// Provider backed by a local CSV file.
#[derive(Debug, Clone)]
pub struct CsvProvider {
    path: PathBuf,
    header_rows: usize,
    delimiter: u8,
}

impl CsvProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            header_rows: 1,
            delimiter: b',',
        }
    }

    /// Number of stacked header rows, outermost first.
    pub fn with_header_rows(mut self, header_rows: usize) -> Self {
        self.header_rows = header_rows.max(1);
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    fn read(&self) -> Result<RawTable, ProviderError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(self.delimiter)
            .flexible(false)
            .from_path(&self.path)?;

        let mut records = reader.records();
        let mut header_rows: Vec<Vec<String>> = Vec::with_capacity(self.header_rows);
        for _ in 0..self.header_rows {
            let record = records.next().ok_or_else(|| {
                ProviderError::ResponseFormatChanged(format!(
                    "{} ends inside its header",
                    self.path.display()
                ))
            })??;
            header_rows.push(record.iter().map(str::to_string).collect());
        }

        let width = header_rows[0].len();
        let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); width];
        for record in records {
            let record = record?;
            for (col, field) in cells.iter_mut().zip(record.iter()) {
                col.push((!field.is_empty()).then(|| field.to_string()));
            }
        }

        let mut table = RawTable::new();
        for (idx, values) in cells.into_iter().enumerate() {
            let header = if self.header_rows == 1 {
                ColumnHeader::Flat(header_rows[0][idx].clone())
            } else {
                ColumnHeader::levels(header_rows.iter().map(|row| row[idx].clone()))
            };
            let name = format!("column_{idx}");
            table.push(header, Series::new(name.into(), values));
        }
        Ok(table)
    }
}

impl DataProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv_import"
    }

    fn fetch(&self, query: &InstrumentQuery) -> Result<RawTable, ProviderError> {
        let table = self.read()?;
        info!(
            symbol = query.symbol(),
            path = %self.path.display(),
            rows = table.height(),
            "imported CSV"
        );
        Ok(table)
    }
}
