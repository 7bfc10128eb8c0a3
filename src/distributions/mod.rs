//! Distribution primitives (component A).
//!
//! Thin wrappers over `statrs::distribution` providing the uniform surface
//! the rest of the crate needs: `pdf`/`ln_pdf`/`cdf`/`quantile`/`sample`. All
//! density evaluations used for inference go through log-space (`ln_pdf`) so
//! mixtures and WAIC can accumulate with `logprob::log_sum_exp` without
//! underflow.

pub mod logprob;
pub mod lognormal;

use rand::Rng;
use statrs::distribution::ContinuousCDF;

/// Draw `n` i.i.d. samples from any `statrs` distribution that implements
/// `rand::distributions::Distribution<f64>`.
pub fn sample_n<D, R>(dist: &D, n: usize, rng: &mut R) -> Vec<f64>
where
    D: rand::distributions::Distribution<f64>,
    R: Rng + ?Sized,
{
    (0..n).map(|_| dist.sample(rng)).collect()
}

/// Equal-tailed credible interval `[quantile((1-level)/2), quantile((1+level)/2)]`
/// from any distribution exposing `inverse_cdf`.
pub fn closed_form_credible_interval<D>(dist: &D, level: f64) -> (f64, f64)
where
    D: ContinuousCDF<f64, f64>,
{
    let alpha = (1.0 - level) / 2.0;
    (dist.inverse_cdf(alpha), dist.inverse_cdf(1.0 - alpha))
}

/// Sample mean and (population, i.e. denominator `n`) variance — used both
/// for Monte-Carlo fallback statistics and for moment-matching defaults in
/// the conjugate engines.
pub fn sample_moments(xs: &[f64]) -> (f64, f64) {
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    (mean, var)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_moments_of_constant_is_zero_variance() {
        let xs = vec![4.0; 10];
        let (mean, var) = sample_moments(&xs);
        assert_eq!(mean, 4.0);
        assert_eq!(var, 0.0);
    }
}
