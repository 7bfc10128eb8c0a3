//! Component G: the WAIC evaluator.

use serde::Serialize;

use crate::concurrency::{CancellationToken, YieldSink};
use crate::data::StandardData;
use crate::distributions::logprob::log_mean_exp;
use crate::errors::{Error, Result};
use crate::posterior::Posterior;

/// Default number of posterior draws used to build the log-likelihood
/// matrix (§4.G).
pub const S_DRAWS: usize = 1000;

/// `-2(lppd - p_WAIC)`, plus its constituent parts, for one candidate
/// posterior against the data it was fit on.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct WaicInfo {
    pub waic: f64,
    pub lppd: f64,
    pub p_waic: f64,
    pub elpd: f64,
}

/// Unbiased sample variance (denominator `S - 1`) of a row of the
/// log-likelihood matrix.
fn unbiased_variance(row: &[f64]) -> f64 {
    let s = row.len() as f64;
    if s <= 1.0 {
        return 0.0;
    }
    let mean = row.iter().sum::<f64>() / s;
    row.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (s - 1.0)
}

/// Rows processed between cooperative yield points in the reduction loop
/// below (§5: "WAIC sample generation yields every 1000 draws").
const WAIC_YIELD_BATCH: usize = 1000;

/// Builds the `L[i][s]` matrix via `posterior.waic_log_lik` and reduces it
/// to `lppd`, `p_WAIC`, `WAIC`, `elpd` (§4.G).
pub fn compute_waic(
    posterior: &dyn Posterior,
    data: &StandardData,
    s_draws: usize,
    seed: u64,
    cancel: &CancellationToken,
    yield_sink: &mut dyn YieldSink,
) -> Result<WaicInfo> {
    cancel.check()?;
    let matrix = posterior.waic_log_lik(data, s_draws, seed)?;
    if matrix.is_empty() {
        return Err(Error::WAICUnavailable {
            message: "no data points to score".into(),
        });
    }
    let mut lppd = 0.0;
    let mut p_waic = 0.0;
    for (i, row) in matrix.iter().enumerate() {
        if i > 0 && i % WAIC_YIELD_BATCH == 0 {
            cancel.check()?;
            yield_sink.on_yield();
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(Error::WAICUnavailable {
                message: "non-finite log-likelihood encountered".into(),
            });
        }
        lppd += log_mean_exp(row);
        p_waic += unbiased_variance(row);
    }
    cancel.check()?;
    let elpd = lppd - p_waic;
    Ok(WaicInfo {
        waic: -2.0 * elpd,
        lppd,
        p_waic,
        elpd,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::{CancellationToken, NoopYieldSink};
    use crate::data::StandardData;
    use crate::posterior::conjugate::BetaPosterior;

    #[test]
    fn waic_is_finite_for_a_well_fit_beta_binomial() {
        let data = StandardData::binomial(120, 2000).unwrap();
        let posterior = BetaPosterior::new(121.0, 1881.0).unwrap();
        let cancel = CancellationToken::new();
        let mut sink = NoopYieldSink;
        let info = compute_waic(&posterior, &data, 200, 1, &cancel, &mut sink).unwrap();
        assert!(info.waic.is_finite());
        assert!(info.p_waic >= 0.0);
    }

    #[test]
    fn waic_rejects_mismatched_data_shape() {
        let data = StandardData::continuous(vec![1.0, 2.0]).unwrap();
        let posterior = BetaPosterior::new(2.0, 2.0).unwrap();
        let cancel = CancellationToken::new();
        let mut sink = NoopYieldSink;
        assert!(compute_waic(&posterior, &data, 200, 1, &cancel, &mut sink).is_err());
    }

    #[test]
    fn waic_observes_cancellation() {
        let data = StandardData::binomial(120, 2000).unwrap();
        let posterior = BetaPosterior::new(121.0, 1881.0).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut sink = NoopYieldSink;
        assert!(compute_waic(&posterior, &data, 200, 1, &cancel, &mut sink).is_err());
    }
}
