//! Indicator library.
//!
//! Indicators are pure functions: a price series in, a numeric series of the
//! same length out. Warmup positions hold `f64::NAN`; the processor turns them
//! into missing values when it builds table columns.
//!
//! Moving averages seed on a full window. RSI uses Wilder smoothing.

pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use ema::{ema_of_series, ema_seeded_at, Ema};
pub use macd::{Macd, MacdSeries};
pub use rsi::Rsi;
pub use sma::Sma;

/// A transform from one price series to one indicator series.
///
/// Output at index `t` only reads inputs up to and including `t`.
pub trait Indicator: Send + Sync {
    /// Short identifier such as `sma_20`.
    fn name(&self) -> &str;

    /// Leading NaN positions before the first real value.
    fn lookback(&self) -> usize;

    /// Output has the same length as `values`.
    fn compute(&self, values: &[f64]) -> Vec<f64>;
}

/// Fails the test unless `actual` is within `tol` of `expected`.
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, tol: f64) {
    let gap = (actual - expected).abs();
    assert!(gap < tol, "expected {expected}, got {actual} (off by {gap}, tolerance {tol})");
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
