//! Component E: the frequency × severity compound engine.

use std::time::Instant;

use crate::api::Diagnostics;
use crate::concurrency::{CancellationToken, YieldSink};
use crate::config::{FitOptions, PriorParams};
use crate::data::StandardData;
use crate::errors::{Error, Result};
use crate::posterior::compound::CompoundPosterior;
use crate::posterior::Posterior;

use super::{conjugate, em};

/// Which continuous family to fit the severity half with. The router picks
/// this after enumerating candidates over the positive-valued subset; the
/// engine itself is agnostic to *why* a family was chosen.
#[derive(Debug, Clone, Copy)]
pub enum SeverityConfig {
    Gamma,
    LogNormal,
    NormalMixture(usize),
    LogNormalMixture(usize),
}

impl SeverityConfig {
    fn tag(&self) -> String {
        match self {
            SeverityConfig::Gamma => "gamma".to_string(),
            SeverityConfig::LogNormal => "lognormal".to_string(),
            SeverityConfig::NormalMixture(k) => format!("normal-mixture-{}", k),
            SeverityConfig::LogNormalMixture(k) => format!("lognormal-mixture-{}", k),
        }
    }
}

/// Builds `freq_data = Binomial{successes, trials}` and `sev_data =
/// Continuous{values = {value | converted & value > 0}}` from user-level
/// data, fits each half independently, and composes them (§4.E).
///
/// The frequency Beta prior is taken from `options.prior_params` when it is
/// a `Beta` variant; the severity half always uses its own family's default
/// prior — a compound-specific resolution, since `FitOptions` carries only
/// one `PriorParams` slot and the two halves generally need different
/// families of prior.
pub fn fit_compound(
    data: &StandardData,
    severity: SeverityConfig,
    options: &FitOptions,
    cancel: &CancellationToken,
    yield_sink: &mut dyn YieldSink,
) -> Result<(CompoundPosterior, Diagnostics)> {
    let started = Instant::now();
    let users = match data {
        StandardData::UserLevel { users } => users,
        _ => return Err(Error::invalid_data("compound requires UserLevel data")),
    };
    if users.is_empty() {
        return Err(Error::NotEnoughData { needed: 1, got: 0 });
    }

    let trials = users.len() as u64;
    let successes = users.iter().filter(|u| u.converted).count() as u64;
    let freq_data = StandardData::binomial(successes, trials)?;
    let freq_prior = match options.prior_params {
        Some(p @ PriorParams::Beta { .. }) => Some(p),
        _ => None,
    };
    let (freq_posterior, freq_diag) = conjugate::fit_beta_binomial(&freq_data, freq_prior)?;

    let sev_values: Vec<f64> = users
        .iter()
        .filter(|u| u.converted && u.value > 0.0)
        .map(|u| u.value)
        .collect();
    if sev_values.is_empty() {
        return Err(Error::NotEnoughData { needed: 1, got: 0 });
    }
    let sev_data = StandardData::continuous(sev_values)?;

    let (severity_posterior, severity_diag): (Box<dyn Posterior>, Diagnostics) = match severity {
        SeverityConfig::Gamma => {
            let (p, d) = conjugate::fit_gamma_exponential(&sev_data, None)?;
            (Box::new(p), d)
        }
        SeverityConfig::LogNormal => {
            let (p, d) = conjugate::fit_lognormal_nig(&sev_data, None, options.seed)?;
            (Box::new(p), d)
        }
        SeverityConfig::NormalMixture(k) => {
            let (p, d) = em::fit_normal_mixture(&sev_data, k, options.seed, cancel, yield_sink)?;
            (Box::new(p), d)
        }
        SeverityConfig::LogNormalMixture(k) => {
            let (p, d) =
                em::fit_lognormal_mixture(&sev_data, k, options.seed, cancel, yield_sink)?;
            (Box::new(p), d)
        }
    };

    let posterior = CompoundPosterior::new(freq_posterior, severity_posterior, options.seed);
    let diagnostics = Diagnostics {
        converged: freq_diag.converged && severity_diag.converged,
        iterations: severity_diag.iterations,
        runtime_ms: started.elapsed().as_secs_f64() * 1000.0,
        model_type: format!("compound-beta-{}", severity.tag()),
        log_likelihood: severity_diag.log_likelihood,
    };
    Ok((posterior, diagnostics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::NoopYieldSink;
    use crate::data::UserRecord;

    fn sample_users() -> Vec<UserRecord> {
        let mut users = Vec::new();
        for _ in 0..40 {
            users.push(UserRecord::new(true, 12.0).unwrap());
        }
        for _ in 0..460 {
            users.push(UserRecord::new(false, 0.0).unwrap());
        }
        users
    }

    #[test]
    fn fits_compound_beta_gamma() {
        let data = StandardData::user_level(sample_users()).unwrap();
        let options = FitOptions::default();
        let cancel = CancellationToken::new();
        let mut sink = NoopYieldSink;
        let (posterior, diag) =
            fit_compound(&data, SeverityConfig::Gamma, &options, &cancel, &mut sink).unwrap();
        assert!(diag.converged);
        assert!(posterior.expected_value_per_user() > 0.0);
    }

    #[test]
    fn rejects_non_user_level_data() {
        let data = StandardData::binomial(1, 2).unwrap();
        let options = FitOptions::default();
        let cancel = CancellationToken::new();
        let mut sink = NoopYieldSink;
        assert!(
            fit_compound(&data, SeverityConfig::Gamma, &options, &cancel, &mut sink).is_err()
        );
    }
}
