//! Moving Average Convergence/Divergence (MACD).
//!
//! MACD line = EMA(fast) - EMA(slow); signal = EMA(signal) of the MACD line;
//! histogram = MACD - signal.
//!
//! Both price EMAs are seeded on the window ending at bar `slow - 1`, the signal
//! EMA on the first `signal` MACD values. All three lines are reported from
//! bar `(slow - 1) + (signal - 1)` onward (33 for 12/26/9) and are NaN before.

use super::ema::ema_seeded_at;
use super::Indicator;

/// The three MACD lines, each aligned to the input.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub hist: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
    name: String,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        assert!(fast >= 1 && signal >= 1, "MACD periods must be >= 1");
        assert!(fast < slow, "MACD fast period must be shorter than slow period");
        Self {
            fast,
            slow,
            signal,
            name: format!("macd_{fast}_{slow}_{signal}"),
        }
    }

    pub fn compute_all(&self, values: &[f64]) -> MacdSeries {
        let n = values.len();
        let mut out = MacdSeries {
            macd: vec![f64::NAN; n],
            signal: vec![f64::NAN; n],
            hist: vec![f64::NAN; n],
        };

        let first = self.lookback();
        if n <= first {
            return out;
        }

        let seed = self.slow - 1;
        let fast = ema_seeded_at(values, self.fast, seed);
        let slow = ema_seeded_at(values, self.slow, seed);
        let line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal = ema_seeded_at(&line, self.signal, first);

        for i in first..n {
            out.macd[i] = line[i];
            out.signal[i] = signal[i];
            out.hist[i] = line[i] - signal[i];
        }
        out
    }
}

impl Default for Macd {
    /// 12 / 26 / 9.
    fn default() -> Self {
        Self::new(12, 26, 9)
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        (self.slow - 1) + (self.signal - 1)
    }

    /// The MACD line.
    fn compute(&self, values: &[f64]) -> Vec<f64> {
        self.compute_all(values).macd
    }
}
