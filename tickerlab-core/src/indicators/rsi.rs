//! Relative strength index with Wilder smoothing.
//!
//! The first average gain and loss are plain means over the first `period`
//! price changes. Each later average is `(prev * (period - 1) + current) / period`.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss), so the first value sits on
//! index `period`. A window with no movement at all reads 0, the TA-Lib convention.

use super::Indicator;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, values: &[f64]) -> Vec<f64> {
        let mut out = vec![f64::NAN; values.len()];
        if values.len() <= self.period {
            return out;
        }

        let moves: Vec<(f64, f64)> = values.windows(2).map(|w| gain_loss(w[1] - w[0])).collect();
        let n = self.period as f64;

        let (mut avg_gain, mut avg_loss) = moves[..self.period]
            .iter()
            .fold((0.0, 0.0), |(g, l), &(gain, loss)| (g + gain, l + loss));
        avg_gain /= n;
        avg_loss /= n;
        out[self.period] = rsi_from(avg_gain, avg_loss);

        // moves[i - 1] is the change into bar i
        for (slot, &(gain, loss)) in out[self.period + 1..].iter_mut().zip(&moves[self.period..]) {
            avg_gain = (avg_gain * (n - 1.0) + gain) / n;
            avg_loss = (avg_loss * (n - 1.0) + loss) / n;
            *slot = rsi_from(avg_gain, avg_loss);
        }
        out
    }
}

/// Split a price change into (gain, loss), both non-negative. NaN stays NaN.
fn gain_loss(change: f64) -> (f64, f64) {
    if change.is_nan() {
        (f64::NAN, f64::NAN)
    } else if change > 0.0 {
        (change, 0.0)
    } else {
        (0.0, -change)
    }
}

fn rsi_from(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_gain.is_nan() || avg_loss.is_nan() {
        return f64::NAN;
    }
    match (avg_gain > 0.0, avg_loss > 0.0) {
        (false, false) => 0.0,
        (true, false) => 100.0,
        (false, true) => 0.0,
        (true, true) => 100.0 - 100.0 / (1.0 + avg_gain / avg_loss),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::assert_approx;
    use proptest::prelude::*;

    #[test]
    fn seed_value_by_hand() {
        // changes: +2, -1, +3, -2 -> period 4 seed: gain 5/4, loss 3/4
        let out = Rsi::new(4).compute(&[10.0, 12.0, 11.0, 14.0, 12.0]);
        assert!(out[..4].iter().all(|v| v.is_nan()));
        assert_approx(out[4], 100.0 - 100.0 / (1.0 + 5.0 / 3.0), 1e-12);
    }

    #[test]
    fn wilder_step_by_hand() {
        // period 2: seed over +1, +1 -> gain 1, loss 0 (RSI 100)
        // next change -2: gain (1 * 1 + 0) / 2 = 0.5, loss (0 + 2) / 2 = 1
        let out = Rsi::new(2).compute(&[5.0, 6.0, 7.0, 5.0]);
        assert_approx(out[2], 100.0, 1e-12);
        assert_approx(out[3], 100.0 - 100.0 / 1.5, 1e-12);
    }

    #[test]
    fn one_directional_series_hit_the_rails() {
        let up: Vec<f64> = (0..20).map(f64::from).collect();
        let down: Vec<f64> = up.iter().rev().copied().collect();
        assert_approx(Rsi::new(14).compute(&up)[19], 100.0, 1e-12);
        assert_approx(Rsi::new(14).compute(&down)[19], 0.0, 1e-12);
    }

    #[test]
    fn flat_series_reads_zero() {
        let out = Rsi::new(14).compute(&[42.0; 16]);
        assert_approx(out[14], 0.0, 1e-12);
        assert_approx(out[15], 0.0, 1e-12);
    }

    #[test]
    fn movement_after_a_flat_stretch_leaves_zero() {
        let mut values = vec![10.0; 4];
        values.push(11.0);
        let out = Rsi::new(3).compute(&values);
        assert_approx(out[3], 0.0, 1e-12);
        assert_approx(out[4], 100.0, 1e-12);
    }

    #[test]
    fn too_short_is_all_nan() {
        assert!(Rsi::new(14).compute(&[1.0; 14]).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn nan_input_poisons_the_rest() {
        let out = Rsi::new(2).compute(&[1.0, 2.0, 1.5, f64::NAN, 3.0, 4.0]);
        assert!(!out[2].is_nan());
        assert!(out[3..].iter().all(|v| v.is_nan()));
    }

    proptest! {
        #[test]
        fn rsi_stays_within_bounds(values in prop::collection::vec(1.0f64..1000.0, 15..200)) {
            let out = Rsi::new(14).compute(&values);
            prop_assert!(out[..14].iter().all(|v| v.is_nan()));
            for v in &out[14..] {
                prop_assert!((0.0..=100.0).contains(v), "RSI out of bounds: {}", v);
            }
        }
    }
}
