//! Component D: the shared EM algorithm backing Normal and LogNormal
//! mixtures. LogNormal mixtures are fit by transforming the data to
//! log-space first and delegating to the same loop (§4.D).

use std::time::Instant;

use rand::Rng;
use statrs::distribution::{Continuous, Normal};

use crate::api::Diagnostics;
use crate::concurrency::{CancellationToken, YieldSink};
use crate::data::StandardData;
use crate::distributions::logprob::log_sum_exp;
use crate::distributions::sample_moments;
use crate::errors::{Error, Result};
use crate::posterior::mixture::{MixtureComponent, MixtureFamily, MixturePosterior};
use crate::rng::rng_from_seed;

const TOL: f64 = 1e-6;
const MAX_ITER: u32 = 200;
/// EM yields every `batch_size = 64` points within an iteration (§5).
const BATCH_SIZE: usize = 64;

/// k-means++ seeding (§4.D): first center uniform, subsequent centers drawn
/// proportional to squared distance from the nearest already-chosen center.
fn kmeans_pp_init(xs: &[f64], k: usize, rng: &mut impl Rng) -> Vec<f64> {
    let mut centers = Vec::with_capacity(k);
    centers.push(xs[rng.gen_range(0..xs.len())]);
    while centers.len() < k {
        let weights: Vec<f64> = xs
            .iter()
            .map(|&x| {
                centers
                    .iter()
                    .map(|&c| (x - c).powi(2))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            centers.push(xs[rng.gen_range(0..xs.len())]);
            continue;
        }
        let mut target = rng.gen::<f64>() * total;
        let mut chosen = xs[xs.len() - 1];
        for (&x, &w) in xs.iter().zip(weights.iter()) {
            if target <= w {
                chosen = x;
                break;
            }
            target -= w;
        }
        centers.push(chosen);
    }
    centers
}

fn log_likelihood(xs: &[f64], means: &[f64], variances: &[f64], weights: &[f64]) -> f64 {
    xs.iter()
        .map(|&x| {
            let terms: Vec<f64> = means
                .iter()
                .zip(variances.iter())
                .zip(weights.iter())
                .map(|((&mu, &var), &w)| {
                    let normal = Normal::new(mu, var.sqrt()).expect("variance floored positive");
                    w.ln() + normal.ln_pdf(x)
                })
                .collect();
            log_sum_exp(terms)
        })
        .sum()
}

/// Fit a K-component Normal mixture to `xs` (already in the space EM should
/// operate in — the LogNormal caller transforms to `ln(x)` first).
pub fn fit_mixture(
    xs: &[f64],
    k: usize,
    seed: u64,
    cancel: &CancellationToken,
    yield_sink: &mut dyn YieldSink,
) -> Result<(Vec<MixtureComponent>, bool, u32, f64)> {
    let needed = k.max(2);
    if xs.len() < needed {
        return Err(Error::NotEnoughData {
            needed,
            got: xs.len(),
        });
    }
    let mut rng = rng_from_seed(seed);
    let (_, total_variance) = sample_moments(xs);
    let floor = (total_variance.max(1e-12)) * 1e-6;
    let pooled_sigma = total_variance.max(1e-12).sqrt();

    let mut means = kmeans_pp_init(xs, k, &mut rng);
    let mut variances = vec![(pooled_sigma / (k as f64).sqrt()).powi(2).max(floor); k];
    let mut weights = vec![1.0 / k as f64; k];

    let mut prev_ll = log_likelihood(xs, &means, &variances, &weights);
    let mut converged = false;
    let mut final_iter = 0;

    for iter in 0..MAX_ITER {
        cancel.check()?;
        final_iter = iter + 1;

        // E-step: log responsibilities via log-sum-exp, normalized per point.
        let mut resp = vec![vec![0.0_f64; k]; xs.len()];
        for (i, &x) in xs.iter().enumerate() {
            if i > 0 && i % BATCH_SIZE == 0 {
                cancel.check()?;
                yield_sink.on_yield();
            }
            let log_terms: Vec<f64> = (0..k)
                .map(|j| {
                    let normal =
                        Normal::new(means[j], variances[j].sqrt()).expect("variance floored");
                    weights[j].ln() + normal.ln_pdf(x)
                })
                .collect();
            let denom = log_sum_exp(log_terms.clone());
            for j in 0..k {
                resp[i][j] = (log_terms[j] - denom).exp();
            }
        }

        // M-step.
        let mut n_k = vec![0.0; k];
        for row in &resp {
            for j in 0..k {
                n_k[j] += row[j];
            }
        }
        let n = xs.len() as f64;
        let mut new_means = vec![0.0; k];
        for j in 0..k {
            if n_k[j] > 0.0 {
                new_means[j] = xs
                    .iter()
                    .zip(resp.iter())
                    .map(|(&x, r)| r[j] * x)
                    .sum::<f64>()
                    / n_k[j];
            } else {
                new_means[j] = means[j];
            }
        }
        let mut new_variances = vec![0.0; k];
        for j in 0..k {
            if n_k[j] > 0.0 {
                let raw = xs
                    .iter()
                    .zip(resp.iter())
                    .map(|(&x, r)| r[j] * (x - new_means[j]).powi(2))
                    .sum::<f64>()
                    / n_k[j];
                new_variances[j] = raw.max(floor);
            } else {
                new_variances[j] = variances[j];
            }
        }
        let mut new_weights: Vec<f64> = n_k.iter().map(|&nk| nk / n).collect();

        // Reinitialize components that have collapsed (§4.D).
        let min_weight = 1.0 / (10.0 * n);
        for j in 0..k {
            if new_weights[j] < min_weight {
                new_means[j] = xs[rng.gen_range(0..xs.len())];
                new_variances[j] = pooled_sigma.powi(2).max(floor);
                new_weights[j] = min_weight;
            }
        }
        let weight_sum: f64 = new_weights.iter().sum();
        for w in new_weights.iter_mut() {
            *w /= weight_sum;
        }

        means = new_means;
        variances = new_variances;
        weights = new_weights;

        yield_sink.on_yield();

        let ll = log_likelihood(xs, &means, &variances, &weights);
        let improvement = ll - prev_ll;
        prev_ll = ll;
        if improvement.abs() < TOL * prev_ll.abs().max(1.0) {
            converged = true;
            break;
        }
    }

    let components = (0..k)
        .map(|j| MixtureComponent {
            mean: means[j],
            variance: variances[j],
            weight: weights[j],
        })
        .collect();
    Ok((components, converged, final_iter, prev_ll))
}

/// Sum of squared deviations of weights from uniform — used by the router to
/// break ties between otherwise-equal-likelihood fits in favor of balance
/// (§4.D "Tie-breaks").
pub fn weight_balance_penalty(weights: &[f64]) -> f64 {
    let k = weights.len() as f64;
    weights.iter().map(|&w| (w - 1.0 / k).powi(2)).sum()
}

fn mixture_diagnostics(
    model_type: &str,
    started: Instant,
    converged: bool,
    iterations: u32,
    ll: f64,
) -> Diagnostics {
    Diagnostics {
        converged,
        iterations,
        runtime_ms: started.elapsed().as_secs_f64() * 1000.0,
        model_type: model_type.to_string(),
        log_likelihood: Some(ll),
    }
}

pub fn fit_normal_mixture(
    data: &StandardData,
    k: usize,
    seed: u64,
    cancel: &CancellationToken,
    yield_sink: &mut dyn YieldSink,
) -> Result<(MixturePosterior, Diagnostics)> {
    let started = Instant::now();
    let values = match data {
        StandardData::Continuous { values, .. } => values,
        _ => return Err(Error::invalid_data("normal-mixture requires Continuous data")),
    };
    let (components, converged, iterations, ll) =
        fit_mixture(values, k, seed, cancel, yield_sink)?;
    let posterior = MixturePosterior::new(MixtureFamily::Normal, components, seed)?;
    Ok((
        posterior,
        mixture_diagnostics("normal-mixture", started, converged, iterations, ll),
    ))
}

pub fn fit_lognormal_mixture(
    data: &StandardData,
    k: usize,
    seed: u64,
    cancel: &CancellationToken,
    yield_sink: &mut dyn YieldSink,
) -> Result<(MixturePosterior, Diagnostics)> {
    let started = Instant::now();
    let values = match data {
        StandardData::Continuous {
            values,
            positive_only,
        } => {
            if !*positive_only {
                return Err(Error::invalid_data(
                    "lognormal-mixture requires strictly positive values",
                ));
            }
            values
        }
        _ => {
            return Err(Error::invalid_data(
                "lognormal-mixture requires Continuous data",
            ))
        }
    };
    let logs: Vec<f64> = values.iter().map(|x| x.ln()).collect();
    let (components, converged, iterations, ll) =
        fit_mixture(&logs, k, seed, cancel, yield_sink)?;
    let posterior = MixturePosterior::new(MixtureFamily::LogNormal, components, seed)?;
    Ok((
        posterior,
        mixture_diagnostics("lognormal-mixture", started, converged, iterations, ll),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::NoopYieldSink;
    use rand::distributions::Distribution;

    fn synthetic_two_component(seed: u64) -> Vec<f64> {
        let mut rng = rng_from_seed(seed);
        let comp_a = Normal::new(-3.0, 1.0).unwrap();
        let comp_b = Normal::new(3.0, 1.0).unwrap();
        (0..400)
            .map(|i| {
                if i % 2 == 0 {
                    comp_a.sample(&mut rng)
                } else {
                    comp_b.sample(&mut rng)
                }
            })
            .collect()
    }

    #[test]
    fn fits_two_well_separated_components() {
        let xs = synthetic_two_component(11);
        let cancel = CancellationToken::new();
        let mut sink = NoopYieldSink;
        let (components, _converged, _iter, _ll) =
            fit_mixture(&xs, 2, 7, &cancel, &mut sink).unwrap();
        assert_eq!(components.len(), 2);
        let weight_sum: f64 = components.iter().map(|c| c.weight).sum();
        assert!((weight_sum - 1.0).abs() < 1e-9);
        assert!(components.iter().all(|c| c.variance >= 0.0));
        // fit_mixture does not sort by mean (that's MixturePosterior::new's
        // job), so check recovery regardless of component order.
        let mut means: Vec<f64> = components.iter().map(|c| c.mean).collect();
        means.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert!((means[0] - -3.0).abs() < 1.0, "means={:?}", means);
        assert!((means[1] - 3.0).abs() < 1.0, "means={:?}", means);
    }

    #[test]
    fn cancellation_is_observed() {
        let xs = synthetic_two_component(3);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut sink = NoopYieldSink;
        let result = fit_mixture(&xs, 2, 7, &cancel, &mut sink);
        assert!(result.is_err());
    }

    #[test]
    fn weight_balance_penalty_is_zero_for_uniform() {
        assert!(weight_balance_penalty(&[0.5, 0.5]) < 1e-12);
    }

    #[test]
    fn single_point_single_component_is_rejected() {
        let cancel = CancellationToken::new();
        let mut sink = NoopYieldSink;
        let result = fit_mixture(&[1.0], 1, 7, &cancel, &mut sink);
        assert!(matches!(
            result,
            Err(Error::NotEnoughData { needed: 2, got: 1 })
        ));
    }
}
