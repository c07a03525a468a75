//! Exponential moving average with smoothing factor `2 / (period + 1)`.
//!
//! The recursion starts from the simple mean of the first full window, so the
//! first value sits on index `period - 1`. Once a NaN enters the recursion
//! every later value is NaN.

use super::Indicator;

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            name: format!("ema_{period}"),
        }
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, values: &[f64]) -> Vec<f64> {
        ema_of_series(values, self.period)
    }
}

/// EMA seeded on the first full window.
pub fn ema_of_series(values: &[f64], period: usize) -> Vec<f64> {
    match period {
        0 => vec![f64::NAN; values.len()],
        p => ema_seeded_at(values, p, p - 1),
    }
}

/// EMA whose seed is the mean of the `period` values ending at `seed_index`.
///
/// Everything before `seed_index` is NaN. MACD seeds both of its EMAs on the
/// same bar through this.
pub fn ema_seeded_at(values: &[f64], period: usize, seed_index: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || seed_index + 1 < period || seed_index >= values.len() {
        return out;
    }

    let seed_window = &values[seed_index + 1 - period..=seed_index];
    let mut ema = seed_window.iter().sum::<f64>() / period as f64;
    out[seed_index] = ema;

    let alpha = 2.0 / (period as f64 + 1.0);
    for (slot, &x) in out[seed_index + 1..].iter_mut().zip(&values[seed_index + 1..]) {
        ema += alpha * (x - ema);
        *slot = ema;
    }
    out
}
