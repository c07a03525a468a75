//! Simple moving average: arithmetic mean of the trailing `period` values.
//!
//! The first value lands on index `period - 1`. A NaN anywhere in a window
//! makes that window's mean NaN.

use super::Indicator;

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            name: format!("sma_{period}"),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, values: &[f64]) -> Vec<f64> {
        let mut out = vec![f64::NAN; values.len()];
        if values.len() < self.period {
            return out;
        }
        let width = self.period as f64;
        for (slot, window) in out[self.lookback()..]
            .iter_mut()
            .zip(values.windows(self.period))
        {
            *slot = window.iter().sum::<f64>() / width;
        }
        out
    }
}
