//! Closed-form posteriors produced by the conjugate engines (component C).

use rand::RngCore;
use serde::Serialize;
use statrs::distribution::{Continuous, ContinuousCDF};

use crate::data::StandardData;
use crate::distributions::{closed_form_credible_interval, sample_n};
use crate::errors::{Error, Result};
use crate::rng::rng_from_seed;

use super::{Posterior, PosteriorSummary};

/// `Beta(alpha, beta)` posterior over a conversion rate (Beta-Binomial,
/// §4.C). The "data domain" this posterior reports on is the rate itself —
/// the quantity an A/B test actually cares about.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BetaPosterior {
    pub alpha: f64,
    pub beta: f64,
}

impl BetaPosterior {
    pub fn new(alpha: f64, beta: f64) -> Result<Self> {
        if alpha <= 0.0 || beta <= 0.0 {
            return Err(Error::invalid_parameters(
                "Beta posterior requires alpha > 0 and beta > 0",
            ));
        }
        Ok(BetaPosterior { alpha, beta })
    }

    fn dist(&self) -> statrs::distribution::Beta {
        statrs::distribution::Beta::new(self.alpha, self.beta)
            .expect("alpha, beta already validated positive")
    }
}

impl Posterior for BetaPosterior {
    fn family(&self) -> &'static str {
        "beta"
    }

    fn mean(&self) -> Vec<f64> {
        vec![self.alpha / (self.alpha + self.beta)]
    }

    fn variance(&self) -> Vec<f64> {
        let (a, b) = (self.alpha, self.beta);
        let s = a + b;
        vec![(a * b) / (s * s * (s + 1.0))]
    }

    fn credible_interval(&self, level: f64) -> Vec<(f64, f64)> {
        vec![closed_form_credible_interval(&self.dist(), level)]
    }

    fn sample(&self, n: usize, rng: &mut dyn RngCore) -> Vec<f64> {
        sample_n(&self.dist(), n, rng)
    }

    fn log_pdf(&self, x: f64) -> f64 {
        self.dist().ln_pdf(x)
    }

    fn summarize(&self) -> PosteriorSummary {
        PosteriorSummary {
            family: self.family().to_string(),
            parameters: serde_json::json!({"alpha": self.alpha, "beta": self.beta}),
            mean: self.mean(),
            variance: self.variance(),
        }
    }

    fn waic_log_lik(&self, data: &StandardData, s_draws: usize, seed: u64) -> Result<Vec<Vec<f64>>> {
        let (successes, trials) = match *data {
            StandardData::Binomial { successes, trials } => (successes, trials),
            _ => {
                return Err(Error::WAICUnavailable {
                    message: "beta-binomial WAIC requires binomial data".into(),
                })
            }
        };
        let mut rng = rng_from_seed(seed);
        let dist = self.dist();
        let thetas = sample_n(&dist, s_draws, &mut rng);
        let outcomes: Vec<bool> = (0..trials).map(|i| i < successes).collect();
        Ok(outcomes
            .iter()
            .map(|&converted| {
                thetas
                    .iter()
                    .map(|&p| if converted { p.ln() } else { (1.0 - p).ln() })
                    .collect()
            })
            .collect())
    }
}

/// `Gamma(alpha, beta)` posterior over an exponential rate
/// (Gamma-Exponential, §4.C). `beta` is the rate parameter of the Gamma
/// prior/posterior itself (`statrs::distribution::Gamma` is `(shape,
/// rate)`-parameterized already).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GammaRatePosterior {
    pub shape: f64,
    pub rate: f64,
}

impl GammaRatePosterior {
    pub fn new(shape: f64, rate: f64) -> Result<Self> {
        if shape <= 0.0 || rate <= 0.0 {
            return Err(Error::invalid_parameters(
                "Gamma posterior requires shape > 0 and rate > 0",
            ));
        }
        Ok(GammaRatePosterior { shape, rate })
    }

    fn dist(&self) -> statrs::distribution::Gamma {
        statrs::distribution::Gamma::new(self.shape, self.rate)
            .expect("shape, rate already validated positive")
    }

    /// Mean of `1/rate` under the posterior, which exists iff `shape > 1`
    /// (§4.C / §8).
    pub fn mean_reciprocal_rate(&self) -> Option<f64> {
        if self.shape > 1.0 {
            Some(self.rate / (self.shape - 1.0))
        } else {
            None
        }
    }
}

impl Posterior for GammaRatePosterior {
    fn family(&self) -> &'static str {
        "gamma"
    }

    fn mean(&self) -> Vec<f64> {
        vec![self.shape / self.rate]
    }

    fn variance(&self) -> Vec<f64> {
        vec![self.shape / (self.rate * self.rate)]
    }

    fn credible_interval(&self, level: f64) -> Vec<(f64, f64)> {
        vec![closed_form_credible_interval(&self.dist(), level)]
    }

    fn sample(&self, n: usize, rng: &mut dyn RngCore) -> Vec<f64> {
        sample_n(&self.dist(), n, rng)
    }

    fn log_pdf(&self, x: f64) -> f64 {
        self.dist().ln_pdf(x)
    }

    fn summarize(&self) -> PosteriorSummary {
        PosteriorSummary {
            family: self.family().to_string(),
            parameters: serde_json::json!({"shape": self.shape, "rate": self.rate}),
            mean: self.mean(),
            variance: self.variance(),
        }
    }

    fn waic_log_lik(&self, data: &StandardData, s_draws: usize, seed: u64) -> Result<Vec<Vec<f64>>> {
        let values = match data {
            StandardData::Continuous { values, .. } => values.clone(),
            _ => {
                return Err(Error::WAICUnavailable {
                    message: "gamma-exponential WAIC requires continuous data".into(),
                })
            }
        };
        let mut rng = rng_from_seed(seed);
        let thetas = sample_n(&self.dist(), s_draws, &mut rng);
        Ok(values
            .iter()
            .map(|&x| thetas.iter().map(|&rate| rate.ln() - rate * x).collect())
            .collect())
    }
}

/// Posterior-predictive of `log X` under a Normal-Inverse-Gamma conjugate
/// update (LogNormal-NIG, §4.C): Student-t with `2a` degrees of freedom,
/// location `mu`, scale `sqrt(b(lambda+1)/(a*lambda))`.
///
/// Unlike `BetaPosterior`/`GammaRatePosterior`, `mean`/`variance`/
/// `credible_interval` have no convenient closed form here (the
/// posterior-predictive is exact but its moments are awkward), so they are
/// derived from the lazy Monte-Carlo cache described in §3/§9 instead.
#[derive(Debug)]
pub struct NigLogNormalPosterior {
    pub mu: f64,
    pub lambda: f64,
    pub a: f64,
    pub b: f64,
    mc: super::MonteCarloCache,
    mc_seed: u64,
}

impl NigLogNormalPosterior {
    pub fn new(mu: f64, lambda: f64, a: f64, b: f64) -> Result<Self> {
        Self::with_seed(mu, lambda, a, b, crate::config::DEFAULT_SEED)
    }

    pub fn with_seed(mu: f64, lambda: f64, a: f64, b: f64, seed: u64) -> Result<Self> {
        if lambda <= 0.0 || a <= 0.0 || b <= 0.0 {
            return Err(Error::invalid_parameters(
                "NIG posterior requires lambda, a, b > 0",
            ));
        }
        Ok(NigLogNormalPosterior {
            mu,
            lambda,
            a,
            b,
            mc: super::MonteCarloCache::new(),
            mc_seed: seed,
        })
    }

    /// Scale of the Student-t posterior-predictive of `log X`.
    pub fn predictive_scale(&self) -> f64 {
        (self.b * (self.lambda + 1.0) / (self.a * self.lambda)).sqrt()
    }

    /// Degrees of freedom of the Student-t posterior-predictive of `log X`.
    pub fn predictive_df(&self) -> f64 {
        2.0 * self.a
    }

    fn predictive_student_t(&self) -> statrs::distribution::StudentsT {
        statrs::distribution::StudentsT::new(self.mu, self.predictive_scale(), self.predictive_df())
            .expect("NIG parameters already validated")
    }

    /// Exact posterior-predictive sampler (§4.C): draw `sigma2 ~
    /// InverseGamma(a, b)`, then `mu ~ N(mu, sigma2/lambda)`, then `X =
    /// exp(N(mu, sigma2))`.
    fn draw_log_params(&self, n: usize, rng: &mut dyn RngCore) -> Vec<(f64, f64)> {
        let inv_gamma = statrs::distribution::InverseGamma::new(self.a, self.b)
            .expect("a, b already validated positive");
        (0..n)
            .map(|_| {
                let sigma2 = sample_n(&inv_gamma, 1, rng)[0];
                let mu_draw_dist =
                    statrs::distribution::Normal::new(self.mu, (sigma2 / self.lambda).sqrt())
                        .expect("sigma2 > 0 almost surely under InverseGamma");
                let mu_draw = sample_n(&mu_draw_dist, 1, rng)[0];
                (mu_draw, sigma2)
            })
            .collect()
    }
}

impl Posterior for NigLogNormalPosterior {
    fn family(&self) -> &'static str {
        "lognormal"
    }

    fn mean(&self) -> Vec<f64> {
        let cache = self.mc_cache();
        vec![super::mc_mean(cache)]
    }

    fn variance(&self) -> Vec<f64> {
        let cache = self.mc_cache();
        let mean = super::mc_mean(cache);
        vec![super::mc_variance(cache, mean)]
    }

    fn credible_interval(&self, level: f64) -> Vec<(f64, f64)> {
        vec![super::mc_credible_interval(self.mc_cache(), level)]
    }

    fn sample(&self, n: usize, rng: &mut dyn RngCore) -> Vec<f64> {
        self.draw_log_params(n, rng)
            .into_iter()
            .map(|(mu, sigma2)| {
                let normal = statrs::distribution::Normal::new(mu, sigma2.sqrt())
                    .expect("sigma2 > 0 almost surely");
                sample_n(&normal, 1, rng)[0].exp()
            })
            .collect()
    }

    fn log_pdf(&self, x: f64) -> f64 {
        if x <= 0.0 {
            return f64::NEG_INFINITY;
        }
        self.predictive_student_t().ln_pdf(x.ln()) - x.ln()
    }

    fn summarize(&self) -> PosteriorSummary {
        PosteriorSummary {
            family: self.family().to_string(),
            parameters: serde_json::json!({
                "mu": self.mu, "lambda": self.lambda, "a": self.a, "b": self.b
            }),
            mean: self.mean(),
            variance: self.variance(),
        }
    }

    fn waic_log_lik(&self, data: &StandardData, s_draws: usize, seed: u64) -> Result<Vec<Vec<f64>>> {
        let values = match data {
            StandardData::Continuous { values, .. } => values.clone(),
            _ => {
                return Err(Error::WAICUnavailable {
                    message: "lognormal WAIC requires continuous data".into(),
                })
            }
        };
        let mut rng = rng_from_seed(seed);
        let thetas = self.draw_log_params(s_draws, &mut rng);
        Ok(values
            .iter()
            .map(|&x| {
                let ln_x = x.ln();
                thetas
                    .iter()
                    .map(|&(mu, sigma2)| {
                        let normal = statrs::distribution::Normal::new(mu, sigma2.sqrt())
                            .expect("sigma2 > 0 almost surely");
                        normal.ln_pdf(ln_x) - ln_x
                    })
                    .collect()
            })
            .collect())
    }
}

impl NigLogNormalPosterior {
    fn mc_cache(&self) -> &[f64] {
        self.mc.get_or_init(|| {
            let mut rng = rng_from_seed(self.mc_seed);
            Posterior::sample(self, super::MC_CACHE_SIZE, &mut rng)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn beta_posterior_mean_matches_formula() {
        let post = BetaPosterior::new(1.0, 1.0).unwrap();
        let post = BetaPosterior::new(post.alpha + 120.0, post.beta + 2000.0 - 120.0).unwrap();
        assert_relative_eq!(post.mean()[0], 120.0 / 2002.0, epsilon = 1e-12);
    }

    #[test]
    fn beta_posterior_rejects_non_positive_params() {
        assert!(BetaPosterior::new(0.0, 1.0).is_err());
        assert!(BetaPosterior::new(1.0, -1.0).is_err());
    }

    #[test]
    fn gamma_posterior_mean_reciprocal_requires_shape_over_one() {
        let post = GammaRatePosterior::new(0.5, 1.0).unwrap();
        assert!(post.mean_reciprocal_rate().is_none());
        let post = GammaRatePosterior::new(8.0, 8.6).unwrap();
        assert!(post.mean_reciprocal_rate().is_some());
    }

    #[test]
    fn nig_predictive_df_and_scale() {
        let post = NigLogNormalPosterior::new(2.0, 1.0, 2.0, 1.0).unwrap();
        assert_relative_eq!(post.predictive_df(), 4.0, epsilon = 1e-12);
        assert!(post.predictive_scale() > 0.0);
    }

    #[test]
    fn nig_mean_is_close_to_an_independent_mc_average() {
        let post = NigLogNormalPosterior::new(2.0, 5.0, 5.0, 3.0).unwrap();
        let mean = post.mean()[0];
        let mut rng = rng_from_seed(7);
        let draws = Posterior::sample(&post, 20_000, &mut rng);
        let direct_mean = draws.iter().sum::<f64>() / draws.len() as f64;
        // Two independent 10k/20k-draw Monte-Carlo estimates of the same
        // quantity should agree within a generous multiple of their
        // standard error, not bit-for-bit.
        assert!(
            (mean - direct_mean).abs() < 0.2 * mean.abs().max(1.0),
            "mean={}, direct_mean={}",
            mean,
            direct_mean
        );
    }
}
