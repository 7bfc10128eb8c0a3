//! Component B: the uniform posterior protocol.
//!
//! Every concrete posterior (conjugate, mixture, compound) implements
//! `Posterior`. Statistics are either analytic (closed-form posteriors
//! compute them directly) or derived from a lazily-initialized, memoized,
//! sorted Monte-Carlo cache (`MonteCarloCache`) — the same mechanism the
//! teacher's `Cache`/`CacheEntry` composition uses to avoid a class
//! hierarchy: compose a cache value into whichever posterior needs it,
//! rather than deriving behaviour through inheritance.

pub mod compound;
pub mod conjugate;
pub mod mixture;

use once_cell::sync::OnceCell;
use ordered_float::NotNan;
use rand::RngCore;
use serde::Serialize;

/// Default Monte-Carlo sample size for the lazy cache (§3: "a sorted
/// sequence of ≥10,000 draws").
pub const MC_CACHE_SIZE: usize = 10_000;

/// A one-shot, memoized, sorted cache of Monte-Carlo draws.
///
/// Computed on first demand and reused for every subsequent `mean`,
/// `variance`, or `credible_interval` call that needs it. Released when the
/// owning posterior is dropped, since it is plain owned data.
#[derive(Debug, Default)]
pub struct MonteCarloCache {
    draws: OnceCell<Vec<f64>>,
}

impl MonteCarloCache {
    pub fn new() -> Self {
        MonteCarloCache {
            draws: OnceCell::new(),
        }
    }

    /// Returns the sorted cache, computing it via `generate` on first call.
    pub fn get_or_init(&self, generate: impl FnOnce() -> Vec<f64>) -> &[f64] {
        self.draws.get_or_init(|| {
            let mut draws = generate();
            draws.sort_unstable_by_key(|&x| NotNan::new(x).expect("NaN in Monte-Carlo draws"));
            draws
        })
    }
}

/// Mean of an already-sorted (order does not matter here) sample.
pub fn mc_mean(sorted: &[f64]) -> f64 {
    sorted.iter().sum::<f64>() / sorted.len() as f64
}

/// Population variance of a sample, given its mean.
pub fn mc_variance(sorted: &[f64], mean: f64) -> f64 {
    sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / sorted.len() as f64
}

/// Linear-interpolated quantile of a sorted sample, `p in [0, 1]`.
pub fn mc_quantile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let pos = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = pos - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

/// Equal-tailed credible interval from a sorted Monte-Carlo sample.
pub fn mc_credible_interval(sorted: &[f64], level: f64) -> (f64, f64) {
    let alpha = (1.0 - level) / 2.0;
    (mc_quantile(sorted, alpha), mc_quantile(sorted, 1.0 - alpha))
}

/// Gaussian kernel density estimate of the log-density at `x`, using
/// Silverman's rule of thumb for the bandwidth. Used where a posterior has
/// no tractable closed-form or composed density (the compound posterior's
/// joint predictive `Y = B * V`).
pub fn mc_kde_log_pdf(sorted: &[f64], x: f64) -> f64 {
    let n = sorted.len() as f64;
    let mean = mc_mean(sorted);
    let sd = mc_variance(sorted, mean).sqrt().max(1e-12);
    let bandwidth = 1.06 * sd * n.powf(-0.2);
    let log_terms: Vec<f64> = sorted
        .iter()
        .map(|&xi| {
            let z = (x - xi) / bandwidth;
            -0.5 * z * z - bandwidth.ln() - 0.5 * (2.0 * std::f64::consts::PI).ln()
        })
        .collect();
    crate::distributions::logprob::log_sum_exp(log_terms) - n.ln()
}

/// Serializable summary a collaborator can reconstruct client-side (§6):
/// `{family, parameters, cached_summary}`. The crate does not mandate a byte
/// layout beyond this struct's own `serde` derive.
#[derive(Debug, Clone, Serialize)]
pub struct PosteriorSummary {
    pub family: String,
    pub parameters: serde_json::Value,
    pub mean: Vec<f64>,
    pub variance: Vec<f64>,
}

/// The uniform interface over every heterogeneous posterior (§4.B).
pub trait Posterior: std::fmt::Debug {
    /// Family tag, e.g. `"beta"`, `"normal-mixture"`, `"compound"`.
    fn family(&self) -> &'static str;

    fn mean(&self) -> Vec<f64>;

    fn variance(&self) -> Vec<f64>;

    /// Equal-tailed credible interval at the given level (`level in (0, 1)`).
    fn credible_interval(&self, level: f64) -> Vec<(f64, f64)>;

    /// Draw `n` i.i.d. samples on the data domain.
    fn sample(&self, n: usize, rng: &mut dyn RngCore) -> Vec<f64>;

    /// Log density (or log mass) of `x` on the data domain. Required by
    /// WAIC (§4.G); must be finite for every point in the fitted data for
    /// WAIC to be computable.
    fn log_pdf(&self, x: f64) -> f64;

    /// A JSON-serializable summary suitable for a collaborator to
    /// reconstruct the posterior client-side.
    fn summarize(&self) -> PosteriorSummary;

    /// Build the `L[i][s]` log-likelihood matrix WAIC needs (§4.G):
    /// `s_draws` independent parameter realizations, each scored against
    /// every point in `data`.
    ///
    /// Posteriors with genuine parameter uncertainty (the conjugate,
    /// closed-form families) draw a different parameter per column. Fits
    /// obtained by point estimation (EM mixtures have no posterior over
    /// their weights/means/variances, only a fitted MLE) repeat the same
    /// fitted estimate in every column; WAIC then degenerates gracefully to
    /// an AIC-like criterion with `p_WAIC ≈ 0`, which is the standard
    /// convention for scoring point estimates on an information criterion.
    fn waic_log_lik(
        &self,
        data: &crate::data::StandardData,
        s_draws: usize,
        seed: u64,
    ) -> crate::errors::Result<Vec<Vec<f64>>>;
}
