//! Fetcher: query a provider and hold the normalized table.

use polars::prelude::DataFrame;
use tracing::info;

use super::normalize::Normalizer;
use super::provider::{DataError, DataProvider};
use super::query::InstrumentQuery;

/// Retrieves and normalizes the time series for one instrument query.
pub struct DataFetcher {
    query: InstrumentQuery,
    provider: Box<dyn DataProvider>,
    data: Option<DataFrame>,
}

impl DataFetcher {
    pub fn new(query: InstrumentQuery, provider: Box<dyn DataProvider>) -> Self {
        Self {
            query,
            provider,
            data: None,
        }
    }

    pub fn query(&self) -> &InstrumentQuery {
        &self.query
    }

    /// Fetch from the provider, normalize, and keep the result.
    ///
    /// On failure any previously fetched table is kept untouched.
    pub fn fetch_data(&mut self) -> Result<&DataFrame, DataError> {
        info!(
            provider = self.provider.name(),
            symbol = self.query.symbol(),
            start = %self.query.start(),
            end = %self.query.end(),
            interval = %self.query.interval(),
            "fetching"
        );

        let raw = self
            .provider
            .fetch(&self.query)
            .map_err(|source| DataError::Fetch {
                symbol: self.query.symbol().to_string(),
                source,
            })?;
        let df = Normalizer::normalize(raw)?;
        info!(rows = df.height(), "normalized");

        Ok(self.data.insert(df))
    }

    /// The fetched table. Fails when `fetch_data` has not succeeded yet.
    pub fn data(&self) -> Result<&DataFrame, DataError> {
        self.data.as_ref().ok_or(DataError::NotFetched)
    }

    /// Hand over the fetched table.
    pub fn into_data(self) -> Result<DataFrame, DataError> {
        self.data.ok_or(DataError::NotFetched)
    }
}
