//! Component F: the model router.
//!
//! An explicit state pipeline (`Detect -> Enumerate -> (Fit, Score)* ->
//! Select -> Report`) over candidate `ModelConfig`s — no hidden shared
//! mutation, matching the teacher's preference for a visible state enum
//! over implicit control flow (§4.F / §9).

pub mod candidates;

use log::warn;
use serde::Serialize;

use crate::concurrency::{CancellationToken, YieldSink};
use crate::config::{BusinessContext, FitOptions, ModelHint};
use crate::data::StandardData;
use crate::engines::{compound, conjugate, em};
use crate::errors::{Error, Result};
use crate::posterior::mixture::MixtureFamily;
use crate::posterior::Posterior;
use crate::waic::{compute_waic, WaicInfo, S_DRAWS};

pub use crate::rng::seed_for_candidate;

/// Conjugate "simple" family (one component, closed form).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Family {
    Beta,
    Gamma,
    LogNormal,
}

/// The router's decision (§3): a tagged tree, since `Compound` nests two
/// sub-configs.
#[derive(Debug, Clone, Serialize)]
pub enum ModelConfig {
    Simple {
        family: Family,
        components: u32,
    },
    Mixture {
        family: MixtureFamily,
        components: u32,
    },
    Compound {
        frequency: Box<ModelConfig>,
        severity: Box<ModelConfig>,
    },
}

impl ModelConfig {
    pub fn components(&self) -> u32 {
        match self {
            ModelConfig::Simple { components, .. } => *components,
            ModelConfig::Mixture { components, .. } => *components,
            ModelConfig::Compound { severity, .. } => severity.components(),
        }
    }

    pub fn model_type(&self) -> String {
        match self {
            ModelConfig::Simple {
                family: Family::Beta,
                ..
            } => "beta-binomial".to_string(),
            ModelConfig::Simple {
                family: Family::Gamma,
                ..
            } => "gamma".to_string(),
            ModelConfig::Simple {
                family: Family::LogNormal,
                ..
            } => "lognormal".to_string(),
            ModelConfig::Mixture {
                family: MixtureFamily::Normal,
                components,
            } => format!("normal-mixture-{}", components),
            ModelConfig::Mixture {
                family: MixtureFamily::LogNormal,
                components,
            } => format!("lognormal-mixture-{}", components),
            ModelConfig::Compound { severity, .. } => {
                format!("compound-beta-{}", severity.model_type())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Reported only when `options.return_route_info` is set (§6).
#[derive(Debug, Clone, Serialize)]
pub struct RouteInfo {
    pub config: ModelConfig,
    pub confidence: Confidence,
    pub reasoning: Vec<String>,
    /// `(config, delta_waic, akaike_weight)` for every candidate that was
    /// successfully fit, including the winner (`delta_waic == 0.0`).
    pub alternatives: Vec<(ModelConfig, f64, f64)>,
}

/// `5 * (K - 1)` WAIC-unit complexity penalty per extra mixture component,
/// doubled (an additional `+5`) under `prefer_simple` (§4.F step 2).
fn complexity_penalty(config: &ModelConfig, prefer_simple: bool) -> f64 {
    let extra = (config.components().saturating_sub(1)) as f64;
    let per_component = if prefer_simple { 10.0 } else { 5.0 };
    per_component * extra
}

/// A small WAIC-unit nudge toward the family a `business_context` favors
/// (§6): `Revenue` prefers LogNormal-family severity, `Conversion` prefers
/// the Beta/binomial shortcut. Not large enough to override a genuinely
/// better fit, only to break near-ties in the documented direction.
fn business_context_bias(config: &ModelConfig, business_context: Option<BusinessContext>) -> f64 {
    const BIAS: f64 = 2.0;
    let is_lognormal_family = |c: &ModelConfig| {
        matches!(
            c,
            ModelConfig::Simple {
                family: Family::LogNormal,
                ..
            } | ModelConfig::Mixture {
                family: MixtureFamily::LogNormal,
                ..
            }
        )
    };
    let family_of_interest = match config {
        ModelConfig::Compound { severity, .. } => is_lognormal_family(severity),
        other => is_lognormal_family(other),
    };
    match business_context {
        Some(BusinessContext::Revenue) if family_of_interest => -BIAS,
        Some(BusinessContext::Conversion) if matches!(config, ModelConfig::Simple { family: Family::Beta, .. }) => {
            -BIAS
        }
        _ => 0.0,
    }
}

fn effective_data(config: &ModelConfig, data: &StandardData) -> Result<StandardData> {
    match (config, data) {
        (
            ModelConfig::Simple {
                family: Family::Beta,
                ..
            },
            StandardData::Continuous { values, .. },
        ) => {
            let successes = values.iter().filter(|&&v| v == 1.0).count() as u64;
            StandardData::binomial(successes, values.len() as u64)
        }
        _ => Ok(data.clone()),
    }
}

fn severity_config(config: &ModelConfig) -> Result<compound::SeverityConfig> {
    match config {
        ModelConfig::Simple {
            family: Family::Gamma,
            ..
        } => Ok(compound::SeverityConfig::Gamma),
        ModelConfig::Simple {
            family: Family::LogNormal,
            ..
        } => Ok(compound::SeverityConfig::LogNormal),
        ModelConfig::Mixture {
            family: MixtureFamily::Normal,
            components,
        } => Ok(compound::SeverityConfig::NormalMixture(*components as usize)),
        ModelConfig::Mixture {
            family: MixtureFamily::LogNormal,
            components,
        } => Ok(compound::SeverityConfig::LogNormalMixture(*components as usize)),
        other => Err(Error::invalid_parameters(format!(
            "{:?} cannot be used as a compound severity model",
            other
        ))),
    }
}

fn fit_candidate(
    config: &ModelConfig,
    data: &StandardData,
    options: &FitOptions,
    cancel: &CancellationToken,
    yield_sink: &mut dyn YieldSink,
) -> Result<(Box<dyn Posterior>, crate::api::Diagnostics)> {
    match config {
        ModelConfig::Simple {
            family: Family::Beta,
            ..
        } => {
            let (p, d) = conjugate::fit_beta_binomial(data, options.prior_params)?;
            Ok((Box::new(p), d))
        }
        ModelConfig::Simple {
            family: Family::Gamma,
            ..
        } => {
            let (p, d) = conjugate::fit_gamma_exponential(data, options.prior_params)?;
            Ok((Box::new(p), d))
        }
        ModelConfig::Simple {
            family: Family::LogNormal,
            ..
        } => {
            let (p, d) = conjugate::fit_lognormal_nig(data, options.prior_params, options.seed)?;
            Ok((Box::new(p), d))
        }
        ModelConfig::Mixture {
            family: MixtureFamily::Normal,
            components,
        } => {
            let (p, d) = em::fit_normal_mixture(
                data,
                *components as usize,
                options.seed,
                cancel,
                yield_sink,
            )?;
            Ok((Box::new(p), d))
        }
        ModelConfig::Mixture {
            family: MixtureFamily::LogNormal,
            components,
        } => {
            let (p, d) = em::fit_lognormal_mixture(
                data,
                *components as usize,
                options.seed,
                cancel,
                yield_sink,
            )?;
            Ok((Box::new(p), d))
        }
        ModelConfig::Compound { severity, .. } => {
            let sev = severity_config(severity)?;
            let (p, d) = compound::fit_compound(data, sev, options, cancel, yield_sink)?;
            Ok((Box::new(p), d))
        }
    }
}

/// One fitted candidate, held until `Select` chooses a winner.
struct Fitted {
    config: ModelConfig,
    posterior: Box<dyn Posterior>,
    diagnostics: crate::api::Diagnostics,
    data: StandardData,
}

/// The router's explicit states, matching §4.F's state machine.
enum State {
    Detect,
    Enumerate,
    FitScore(Vec<ModelConfig>),
    Select(Vec<(Fitted, Option<WaicInfo>)>),
}

pub struct Router;

impl Router {
    /// Runs the full `Detect -> Enumerate -> (Fit, Score)* -> Select ->
    /// Report` pipeline and returns the winning posterior, its diagnostics,
    /// and (if requested) a `RouteInfo`.
    pub fn route(
        hint: ModelHint,
        data: &StandardData,
        options: &FitOptions,
        cancel: &CancellationToken,
        yield_sink: &mut dyn YieldSink,
    ) -> Result<(
        Box<dyn Posterior>,
        crate::api::Diagnostics,
        Option<RouteInfo>,
        Option<WaicInfo>,
    )> {
        let mut state = State::Detect;
        loop {
            state = match state {
                State::Detect => State::Enumerate,
                State::Enumerate => {
                    let candidates = candidates::enumerate(hint, data, options.max_components)?;
                    State::FitScore(candidates)
                }
                State::FitScore(candidates) => {
                    let mut fitted = Vec::new();
                    for config in candidates {
                        cancel.check()?;
                        let eff_data = effective_data(&config, data)?;
                        match fit_candidate(&config, &eff_data, options, cancel, yield_sink) {
                            Ok((posterior, diagnostics)) => {
                                fitted.push((
                                    Fitted {
                                        config,
                                        posterior,
                                        diagnostics,
                                        data: eff_data,
                                    },
                                    None,
                                ));
                            }
                            Err(err) => {
                                warn!("candidate {:?} failed to fit: {}", config, err);
                            }
                        }
                    }
                    if fitted.is_empty() {
                        return Err(Error::invalid_data(
                            "no candidate model could be fit to this data",
                        ));
                    }
                    State::Select(fitted)
                }
                State::Select(mut fitted) => {
                    let n = data.len();
                    let should_score = options.use_waic && n >= 20 && fitted.len() > 1;
                    if should_score {
                        for (i, (candidate, waic_slot)) in fitted.iter_mut().enumerate() {
                            cancel.check()?;
                            let seed_i = seed_for_candidate(options.seed, i);
                            match compute_waic(
                                candidate.posterior.as_ref(),
                                &candidate.data,
                                S_DRAWS,
                                seed_i,
                                cancel,
                                yield_sink,
                            ) {
                                Ok(info) => *waic_slot = Some(info),
                                Err(Error::Cancelled) => return Err(Error::Cancelled),
                                Err(err) => {
                                    warn!(
                                        "WAIC unavailable for candidate {:?}: {}",
                                        candidate.config, err
                                    );
                                }
                            }
                        }
                    }

                    let (winner_idx, confidence, reasoning) = select_winner(
                        &fitted,
                        should_score,
                        n,
                        options.prefer_simple,
                        options.business_context,
                    );

                    let alternatives: Vec<(ModelConfig, f64, f64)> = if should_score {
                        build_alternatives(&fitted, options.prefer_simple, options.business_context)
                    } else {
                        Vec::new()
                    };

                    let winner_waic = fitted[winner_idx].1;

                    let Fitted {
                        config,
                        posterior,
                        diagnostics,
                        ..
                    } = fitted.remove(winner_idx);

                    let route_info = if options.return_route_info {
                        Some(RouteInfo {
                            config,
                            confidence,
                            reasoning,
                            alternatives,
                        })
                    } else {
                        None
                    };
                    return Ok((posterior, diagnostics, route_info, winner_waic));
                }
            }
        }
    }
}

fn penalized_waic(
    config: &ModelConfig,
    info: &WaicInfo,
    prefer_simple: bool,
    business_context: Option<BusinessContext>,
) -> f64 {
    info.waic + complexity_penalty(config, prefer_simple) + business_context_bias(config, business_context)
}

fn select_winner(
    fitted: &[(Fitted, Option<WaicInfo>)],
    should_score: bool,
    n: usize,
    prefer_simple: bool,
    business_context: Option<BusinessContext>,
) -> (usize, Confidence, Vec<String>) {
    if fitted.len() == 1 {
        let confidence = if n < 20 { Confidence::Low } else { Confidence::High };
        return (
            0,
            confidence,
            vec!["only one viable candidate for this data shape".to_string()],
        );
    }
    if !should_score {
        let reason = if n < 20 {
            format!("sample size {} < 20: skipping WAIC scoring", n)
        } else {
            "WAIC scoring disabled".to_string()
        };
        return (0, Confidence::Low, vec![reason]);
    }

    let mut best_idx = 0;
    let mut best_score = f64::INFINITY;
    let mut second_best = f64::INFINITY;
    let mut any_scored = false;
    for (i, (candidate, waic)) in fitted.iter().enumerate() {
        if let Some(info) = waic {
            any_scored = true;
            let score = penalized_waic(&candidate.config, info, prefer_simple, business_context);
            if score < best_score {
                second_best = best_score;
                best_score = score;
                best_idx = i;
            } else if score < second_best {
                second_best = score;
            }
        }
    }
    if !any_scored {
        return (
            0,
            Confidence::Low,
            vec!["no candidate produced a usable WAIC score".to_string()],
        );
    }
    let confidence = if second_best - best_score >= 10.0 {
        Confidence::High
    } else {
        Confidence::Medium
    };
    (
        best_idx,
        confidence,
        vec![format!(
            "selected by minimum penalized WAIC ({:.3} vs next best {:.3})",
            best_score, second_best
        )],
    )
}

fn build_alternatives(
    fitted: &[(Fitted, Option<WaicInfo>)],
    prefer_simple: bool,
    business_context: Option<BusinessContext>,
) -> Vec<(ModelConfig, f64, f64)> {
    let scored: Vec<(usize, f64)> = fitted
        .iter()
        .enumerate()
        .filter_map(|(i, (candidate, waic))| {
            waic.as_ref().map(|info| {
                (
                    i,
                    penalized_waic(&candidate.config, info, prefer_simple, business_context),
                )
            })
        })
        .collect();
    if scored.is_empty() {
        return Vec::new();
    }
    let best = scored
        .iter()
        .map(|(_, s)| *s)
        .fold(f64::INFINITY, f64::min);
    let raw_weights: Vec<f64> = scored
        .iter()
        .map(|(_, s)| (-0.5 * (s - best)).exp())
        .collect();
    let total: f64 = raw_weights.iter().sum();
    scored
        .iter()
        .zip(raw_weights.iter())
        .map(|((i, s), w)| (fitted[*i].0.config.clone(), s - best, w / total))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::NoopYieldSink;
    use crate::config::FitOptionsBuilder;
    use crate::rng::rng_from_seed;

    #[test]
    fn routes_binomial_data_to_beta_binomial() {
        let data = StandardData::binomial(120, 2000).unwrap();
        let options = FitOptions::default();
        let cancel = CancellationToken::new();
        let mut sink = NoopYieldSink;
        let (posterior, _diag, _route, _waic) =
            Router::route(ModelHint::Auto, &data, &options, &cancel, &mut sink).unwrap();
        assert_eq!(posterior.family(), "beta");
    }

    #[test]
    fn small_n_reports_low_confidence() {
        let data = StandardData::continuous(vec![1.0, 2.0, 3.0, 1.5]).unwrap();
        let options = FitOptionsBuilder::default()
            .return_route_info(true)
            .build()
            .unwrap();
        let cancel = CancellationToken::new();
        let mut sink = NoopYieldSink;
        let (_posterior, _diag, route, _waic) =
            Router::route(ModelHint::Auto, &data, &options, &cancel, &mut sink).unwrap();
        assert_eq!(route.unwrap().confidence, Confidence::Low);
    }

    #[test]
    fn binary_data_picks_beta_binomial() {
        let data =
            StandardData::continuous(vec![0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 1.0])
                .unwrap();
        let options = FitOptions::default();
        let cancel = CancellationToken::new();
        let mut sink = NoopYieldSink;
        let (posterior, _diag, _route, _waic) =
            Router::route(ModelHint::Auto, &data, &options, &cancel, &mut sink).unwrap();
        assert_eq!(posterior.family(), "beta");
    }

    /// Router accuracy (§8): on data genuinely drawn from family `F`, the
    /// router should pick `F` with high probability. The full property
    /// ("n >= 5000, 100 seeds, probability >= 0.9") is expensive to run on
    /// every `cargo test`; this is the documented smaller-sample smoke test.
    #[test]
    fn router_recovers_generating_family_across_seeds() {
        use rand::distributions::Distribution as _;
        use statrs::distribution::Gamma as GammaDist;

        let generator = GammaDist::new(4.0, 1.0).unwrap();
        let seeds: Vec<u64> = (0..20).collect();
        let mut hits = 0;
        for &seed in &seeds {
            let mut rng = rng_from_seed(1000 + seed);
            let values: Vec<f64> = (0..500).map(|_| generator.sample(&mut rng)).collect();
            let data = StandardData::continuous(values).unwrap();
            let options = FitOptionsBuilder::default()
                .seed(seed)
                .max_components(1u32)
                .build()
                .unwrap();
            let cancel = CancellationToken::new();
            let mut sink = NoopYieldSink;
            if let Ok((posterior, ..)) =
                Router::route(ModelHint::Auto, &data, &options, &cancel, &mut sink)
            {
                if posterior.family() == "gamma" {
                    hits += 1;
                }
            }
        }
        let hit_rate = hits as f64 / seeds.len() as f64;
        assert!(hit_rate >= 0.9, "hit_rate={}", hit_rate);
    }
}
