//! Fetch stage: instrument queries, providers and normalization.

pub mod csv_import;
pub mod fetcher;
pub mod normalize;
pub mod provider;
pub mod query;
pub mod yahoo;

pub use csv_import::CsvProvider;
pub use fetcher::DataFetcher;
pub use normalize::{coerce_numeric, coerce_timestamp, Normalizer};
pub use provider::{ColumnHeader, DataError, DataProvider, ProviderError, RawColumn, RawTable};
pub use query::{InstrumentQuery, Interval, Period};
pub use yahoo::YahooProvider;
