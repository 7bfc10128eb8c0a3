//! Mixture posteriors produced by the EM engines (component D, §4.D).

use ordered_float::NotNan;
use rand::distributions::{Distribution, WeightedIndex};
use rand::RngCore;
use serde::Serialize;
use statrs::distribution::{Continuous, Normal};

use crate::data::StandardData;
use crate::distributions::logprob::log_sum_exp;
use crate::errors::{Error, Result};
use crate::rng::rng_from_seed;

use super::{MonteCarloCache, Posterior, PosteriorSummary, MC_CACHE_SIZE};

/// A single mixture component. For a Normal mixture, `mean`/`variance` are
/// in the data domain. For a LogNormal mixture, they are the log-space
/// component parameters `(mu_k, sigma_k^2)` — EM itself fits in log-space
/// (§4.D: "LogNormal mixture transforms to yi = log xi first; all
/// statistics live in log-space"), so this is what the fitting procedure
/// actually produces.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MixtureComponent {
    pub mean: f64,
    pub variance: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MixtureFamily {
    Normal,
    LogNormal,
}

impl MixtureFamily {
    pub fn name(&self) -> &'static str {
        match self {
            MixtureFamily::Normal => "normal-mixture",
            MixtureFamily::LogNormal => "lognormal-mixture",
        }
    }
}

#[derive(Debug)]
pub struct MixturePosterior {
    pub family: MixtureFamily,
    /// Sorted by increasing mean (§4.D: "components sorted by increasing
    /// mu").
    pub components: Vec<MixtureComponent>,
    mc: MonteCarloCache,
    mc_seed: u64,
}

impl MixturePosterior {
    pub fn new(family: MixtureFamily, mut components: Vec<MixtureComponent>, seed: u64) -> Result<Self> {
        if components.is_empty() {
            return Err(Error::invalid_parameters(
                "a mixture posterior needs at least one component",
            ));
        }
        let weight_sum: f64 = components.iter().map(|c| c.weight).sum();
        if (weight_sum - 1.0).abs() > 1e-6 {
            return Err(Error::invalid_parameters(format!(
                "mixture weights must sum to 1, got {}",
                weight_sum
            )));
        }
        components.sort_unstable_by_key(|c| NotNan::new(c.mean).expect("NaN component mean"));
        Ok(MixturePosterior {
            family,
            components,
            mc: MonteCarloCache::new(),
            mc_seed: seed,
        })
    }

    fn weighted_index(&self) -> WeightedIndex<f64> {
        WeightedIndex::new(self.components.iter().map(|c| c.weight))
            .expect("weights already validated non-negative and summing to 1")
    }

    fn mc_cache(&self) -> &[f64] {
        self.mc.get_or_init(|| {
            let mut rng = rng_from_seed(self.mc_seed);
            Posterior::sample(self, MC_CACHE_SIZE, &mut rng)
        })
    }
}

impl Posterior for MixturePosterior {
    fn family(&self) -> &'static str {
        self.family.name()
    }

    fn mean(&self) -> Vec<f64> {
        match self.family {
            MixtureFamily::Normal => {
                vec![self.components.iter().map(|c| c.weight * c.mean).sum()]
            }
            MixtureFamily::LogNormal => {
                vec![self
                    .components
                    .iter()
                    .map(|c| c.weight * (c.mean + c.variance / 2.0).exp())
                    .sum()]
            }
        }
    }

    fn variance(&self) -> Vec<f64> {
        let mean = self.mean()[0];
        let second_moment: f64 = match self.family {
            MixtureFamily::Normal => self
                .components
                .iter()
                .map(|c| c.weight * (c.variance + c.mean * c.mean))
                .sum(),
            MixtureFamily::LogNormal => self
                .components
                .iter()
                .map(|c| c.weight * (2.0 * c.mean + 2.0 * c.variance).exp())
                .sum(),
        };
        vec![(second_moment - mean * mean).max(0.0)]
    }

    fn credible_interval(&self, level: f64) -> Vec<(f64, f64)> {
        vec![super::mc_credible_interval(self.mc_cache(), level)]
    }

    fn sample(&self, n: usize, rng: &mut dyn RngCore) -> Vec<f64> {
        let idx = self.weighted_index();
        (0..n)
            .map(|_| {
                let k = idx.sample(rng);
                let c = &self.components[k];
                let normal =
                    Normal::new(c.mean, c.variance.sqrt()).expect("component variance >= floor > 0");
                let draw = crate::distributions::sample_n(&normal, 1, rng)[0];
                match self.family {
                    MixtureFamily::Normal => draw,
                    MixtureFamily::LogNormal => draw.exp(),
                }
            })
            .collect()
    }

    fn log_pdf(&self, x: f64) -> f64 {
        let y = match self.family {
            MixtureFamily::Normal => x,
            MixtureFamily::LogNormal => {
                if x <= 0.0 {
                    return f64::NEG_INFINITY;
                }
                x.ln()
            }
        };
        let log_terms: Vec<f64> = self
            .components
            .iter()
            .map(|c| {
                let normal = Normal::new(c.mean, c.variance.sqrt())
                    .expect("component variance >= floor > 0");
                c.weight.ln() + normal.ln_pdf(y)
            })
            .collect();
        let ln_density_y = log_sum_exp(log_terms);
        match self.family {
            MixtureFamily::Normal => ln_density_y,
            MixtureFamily::LogNormal => ln_density_y - x.ln(),
        }
    }

    fn summarize(&self) -> PosteriorSummary {
        PosteriorSummary {
            family: self.family().to_string(),
            parameters: serde_json::json!({
                "components": self.components.iter().map(|c| {
                    serde_json::json!({"mean": c.mean, "variance": c.variance, "weight": c.weight})
                }).collect::<Vec<_>>()
            }),
            mean: self.mean(),
            variance: self.variance(),
        }
    }

    /// EM produces a point estimate, not a posterior over components, so
    /// every WAIC draw repeats the same fitted density (§4.D / trait docs).
    fn waic_log_lik(&self, data: &StandardData, s_draws: usize, _seed: u64) -> Result<Vec<Vec<f64>>> {
        let values = match data {
            StandardData::Continuous { values, .. } => values.clone(),
            _ => {
                return Err(Error::WAICUnavailable {
                    message: "mixture WAIC requires continuous data".into(),
                })
            }
        };
        Ok(values
            .iter()
            .map(|&x| {
                let ll = self.log_pdf(x);
                vec![ll; s_draws]
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn two_component_normal() -> MixturePosterior {
        MixturePosterior::new(
            MixtureFamily::Normal,
            vec![
                MixtureComponent {
                    mean: -3.0,
                    variance: 1.0,
                    weight: 0.5,
                },
                MixtureComponent {
                    mean: 3.0,
                    variance: 1.0,
                    weight: 0.5,
                },
            ],
            1,
        )
        .unwrap()
    }

    #[test]
    fn rejects_weights_not_summing_to_one() {
        let result = MixturePosterior::new(
            MixtureFamily::Normal,
            vec![MixtureComponent {
                mean: 0.0,
                variance: 1.0,
                weight: 0.5,
            }],
            1,
        );
        assert!(result.is_err());
    }

    #[test]
    fn components_are_sorted_by_mean() {
        let post = MixturePosterior::new(
            MixtureFamily::Normal,
            vec![
                MixtureComponent {
                    mean: 3.0,
                    variance: 1.0,
                    weight: 0.5,
                },
                MixtureComponent {
                    mean: -3.0,
                    variance: 1.0,
                    weight: 0.5,
                },
            ],
            1,
        )
        .unwrap();
        assert_eq!(post.components[0].mean, -3.0);
    }

    #[test]
    fn normal_mixture_mean_is_weighted_average() {
        let post = two_component_normal();
        assert_relative_eq!(post.mean()[0], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn log_pdf_matches_log_sum_exp_of_components() {
        let post = two_component_normal();
        let expected = log_sum_exp(
            post.components
                .iter()
                .map(|c| {
                    let n = Normal::new(c.mean, c.variance.sqrt()).unwrap();
                    c.weight.ln() + n.ln_pdf(0.5)
                })
                .collect::<Vec<_>>(),
        );
        assert_relative_eq!(post.log_pdf(0.5), expected, epsilon = 1e-12);
    }

    #[test]
    fn lognormal_mixture_mean_has_closed_form() {
        let post = MixturePosterior::new(
            MixtureFamily::LogNormal,
            vec![MixtureComponent {
                mean: 0.0,
                variance: 1.0,
                weight: 1.0,
            }],
            1,
        )
        .unwrap();
        // A single lognormal component: E[X] = exp(mu + sigma^2/2).
        assert_relative_eq!(post.mean()[0], (0.5_f64).exp(), epsilon = 1e-9);
    }
}
