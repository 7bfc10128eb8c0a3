//! Numerically stable log-probability arithmetic.
//!
//! Mirrors the shape of `bio::stats::LogProb` (a newtype over a natural-log
//! probability with `ln_add_exp`/`ln_sum_exp` helpers), reimplemented locally
//! since the `bio` crate itself is genomics-specific and otherwise unused
//! here.

use serde::{Deserialize, Serialize};

/// A probability represented in log-space, `LogProb(p) == p.ln()`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct LogProb(pub f64);

impl LogProb {
    pub fn ln_zero() -> Self {
        LogProb(f64::NEG_INFINITY)
    }

    pub fn ln_one() -> Self {
        LogProb(0.0)
    }

    pub fn from_prob(p: f64) -> Self {
        LogProb(p.ln())
    }

    pub fn exp(self) -> f64 {
        self.0.exp()
    }

    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }

    /// `ln(exp(self) + exp(other))`, computed without over/underflow.
    pub fn ln_add_exp(self, other: LogProb) -> LogProb {
        LogProb(ln_add_exp(self.0, other.0))
    }

    /// `ln(1 - exp(self))`, valid for `self <= 0`.
    pub fn ln_one_minus_exp(self) -> LogProb {
        LogProb(ln_one_minus_exp(self.0))
    }

    /// `ln(sum(exp(values)))`.
    pub fn ln_sum_exp(values: &[LogProb]) -> LogProb {
        LogProb(log_sum_exp(values.iter().map(|v| v.0)))
    }
}

impl std::ops::Add for LogProb {
    type Output = LogProb;

    fn add(self, rhs: LogProb) -> LogProb {
        LogProb(self.0 + rhs.0)
    }
}

/// `ln(exp(a) + exp(b))`.
pub fn ln_add_exp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let hi = a.max(b);
    let lo = a.min(b);
    hi + (lo - hi).exp().ln_1p()
}

/// `ln(1 - exp(x))` for `x <= 0`, stable near `x == 0`.
pub fn ln_one_minus_exp(x: f64) -> f64 {
    if x > 0.0 {
        return f64::NAN;
    }
    if x == f64::NEG_INFINITY {
        return 0.0;
    }
    if x > -std::f64::consts::LN_2 {
        (-x.exp_m1()).ln()
    } else {
        (-x.exp()).ln_1p()
    }
}

/// log-sum-exp over an arbitrary iterator of log-values.
pub fn log_sum_exp(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut max = f64::NEG_INFINITY;
    let mut count = 0usize;
    let collected: Vec<f64> = values.into_iter().collect();
    for &v in &collected {
        count += 1;
        if v > max {
            max = v;
        }
    }
    if count == 0 || max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    let sum: f64 = collected.iter().map(|&v| (v - max).exp()).sum();
    max + sum.ln()
}

/// log-sum-exp over a slice, weighted equally then divided by `n` — used to
/// turn a sum of log-likelihoods over posterior draws into a log-average
/// (`lppd_i` in the WAIC evaluator, §4.G).
pub fn log_mean_exp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }
    log_sum_exp(values.iter().copied()) - (values.len() as f64).ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn add_exp_matches_naive() {
        let a = -2.0_f64;
        let b = -3.5_f64;
        let naive = (a.exp() + b.exp()).ln();
        assert_relative_eq!(ln_add_exp(a, b), naive, epsilon = 1e-12);
    }

    #[test]
    fn add_exp_handles_neg_infinity() {
        assert_eq!(ln_add_exp(f64::NEG_INFINITY, -1.0), -1.0);
        assert_eq!(ln_add_exp(-1.0, f64::NEG_INFINITY), -1.0);
    }

    #[test]
    fn one_minus_exp_matches_naive() {
        let x = -0.001_f64;
        let naive = (1.0 - x.exp()).ln();
        assert_relative_eq!(ln_one_minus_exp(x), naive, epsilon = 1e-9);
    }

    #[test]
    fn log_mean_exp_of_equal_values_is_that_value() {
        let values = vec![-1.0; 5];
        assert_relative_eq!(log_mean_exp(&values), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn log_sum_exp_empty_is_neg_infinity() {
        assert_eq!(log_sum_exp(std::iter::empty()), f64::NEG_INFINITY);
    }
}
