//! TickerLab Core: fetch and process stages of the price-analysis pipeline.
//!
//! - Instrument queries and market-data providers (Yahoo Finance, CSV import)
//! - Normalization of provider responses into one canonical table shape
//! - Indicator library (SMA, EMA, RSI, MACD)
//! - Processor that validates a price table and appends indicator columns

pub mod data;
pub mod indicators;
pub mod processor;
pub mod schema;

pub use data::{DataError, DataFetcher, DataProvider, InstrumentQuery, Interval, Period};
pub use processor::{calculate_indicators, DataProcessor, ProcessError};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: pipeline types can cross thread boundaries.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<InstrumentQuery>();
        require_sync::<InstrumentQuery>();
        require_send::<DataFetcher>();
        require_send::<DataProcessor>();
        require_sync::<DataProcessor>();
        require_send::<DataError>();
        require_send::<ProcessError>();
        require_send::<data::YahooProvider>();
        require_sync::<data::YahooProvider>();
        require_send::<data::CsvProvider>();
        require_sync::<data::CsvProvider>();
    }
}
