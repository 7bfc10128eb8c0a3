//! Candidate enumeration (§4.F step 1: shape detection).

use crate::config::{ModelHint, ModelName};
use crate::data::StandardData;
use crate::distributions::sample_moments;
use crate::errors::{Error, Result};
use crate::posterior::mixture::MixtureFamily;

use super::{Family, ModelConfig};

fn is_binary(values: &[f64]) -> bool {
    values.iter().all(|&v| v == 0.0 || v == 1.0)
}

/// Enumerates the candidate `ModelConfig`s consistent with `data`'s shape
/// and `max_components`, honoring an explicit `hint` when given (restricting
/// to configs compatible with that named model; `Error::ModelMismatch` if
/// none are).
pub fn enumerate(
    hint: ModelHint,
    data: &StandardData,
    max_components: u32,
) -> Result<Vec<ModelConfig>> {
    let shape_candidates = by_shape(data, max_components)?;
    match hint {
        ModelHint::Auto => Ok(shape_candidates),
        ModelHint::Named(name) => {
            let filtered: Vec<ModelConfig> = shape_candidates
                .into_iter()
                .filter(|c| c.matches_name(name))
                .collect();
            if filtered.is_empty() {
                Err(Error::ModelMismatch {
                    hint: name.to_string(),
                    shape: data.shape_name().to_string(),
                })
            } else {
                Ok(filtered)
            }
        }
    }
}

fn by_shape(data: &StandardData, max_components: u32) -> Result<Vec<ModelConfig>> {
    match data {
        StandardData::Binomial { .. } => Ok(vec![ModelConfig::Simple {
            family: Family::Beta,
            components: 1,
        }]),
        StandardData::UserLevel { .. } => Ok(severity_candidates(max_components)
            .into_iter()
            .map(|severity| ModelConfig::Compound {
                frequency: Box::new(ModelConfig::Simple {
                    family: Family::Beta,
                    components: 1,
                }),
                severity: Box::new(severity),
            })
            .collect()),
        StandardData::Continuous {
            values,
            positive_only,
        } => continuous_candidates(values, *positive_only, max_components),
        StandardData::Summary { .. } => Ok(vec![ModelConfig::Simple {
            family: Family::Gamma,
            components: 1,
        }]),
    }
}

fn severity_candidates(max_components: u32) -> Vec<ModelConfig> {
    let mut out = vec![
        ModelConfig::Simple {
            family: Family::Gamma,
            components: 1,
        },
        ModelConfig::Simple {
            family: Family::LogNormal,
            components: 1,
        },
    ];
    for k in 2..=max_components {
        out.push(ModelConfig::Mixture {
            family: MixtureFamily::LogNormal,
            components: k,
        });
    }
    out
}

fn continuous_candidates(
    values: &[f64],
    positive_only: bool,
    max_components: u32,
) -> Result<Vec<ModelConfig>> {
    if is_binary(values) {
        return Ok(vec![ModelConfig::Simple {
            family: Family::Beta,
            components: 1,
        }]);
    }
    if positive_only {
        let (mean, variance) = sample_moments(values);
        let cv = variance.sqrt() / mean.max(1e-12);
        let mut candidates = Vec::new();
        if cv <= 1.0 {
            candidates.push(ModelConfig::Simple {
                family: Family::Gamma,
                components: 1,
            });
            candidates.push(ModelConfig::Simple {
                family: Family::LogNormal,
                components: 1,
            });
        } else {
            candidates.push(ModelConfig::Simple {
                family: Family::LogNormal,
                components: 1,
            });
            candidates.push(ModelConfig::Simple {
                family: Family::Gamma,
                components: 1,
            });
        }
        if max_components > 1 {
            for k in 2..=max_components {
                candidates.push(ModelConfig::Mixture {
                    family: MixtureFamily::LogNormal,
                    components: k,
                });
                candidates.push(ModelConfig::Mixture {
                    family: MixtureFamily::Normal,
                    components: k,
                });
            }
        }
        Ok(candidates)
    } else {
        let top = max_components.max(2);
        Ok((1..=top)
            .map(|k| ModelConfig::Mixture {
                family: MixtureFamily::Normal,
                components: k,
            })
            .collect())
    }
}

impl ModelConfig {
    fn matches_name(&self, name: ModelName) -> bool {
        matches!(
            (self, name),
            (ModelConfig::Simple { family: Family::Beta, .. }, ModelName::BetaBinomial)
                | (ModelConfig::Simple { family: Family::Gamma, .. }, ModelName::Gamma)
                | (ModelConfig::Simple { family: Family::LogNormal, .. }, ModelName::LogNormal)
                | (ModelConfig::Mixture { family: MixtureFamily::Normal, .. }, ModelName::NormalMixture)
                | (ModelConfig::Mixture { family: MixtureFamily::LogNormal, .. }, ModelName::LogNormalMixture)
        ) || matches!(
            (self, name),
            (ModelConfig::Compound { severity, .. }, ModelName::CompoundBetaGamma)
                if matches!(severity.as_ref(), ModelConfig::Simple { family: Family::Gamma, .. })
        ) || matches!(
            (self, name),
            (ModelConfig::Compound { severity, .. }, ModelName::CompoundBetaLogNormal)
                if matches!(severity.as_ref(), ModelConfig::Simple { family: Family::LogNormal, .. })
        ) || matches!(
            (self, name),
            (ModelConfig::Compound { severity, .. }, ModelName::CompoundBetaLogNormalMixture)
                if matches!(severity.as_ref(), ModelConfig::Mixture { family: MixtureFamily::LogNormal, .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binomial_data_has_one_candidate() {
        let data = StandardData::binomial(3, 10).unwrap();
        let candidates = enumerate(ModelHint::Auto, &data, 4).unwrap();
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn binary_continuous_routes_to_beta() {
        let data = StandardData::continuous(vec![0.0, 1.0, 0.0, 1.0, 1.0]).unwrap();
        let candidates = enumerate(ModelHint::Auto, &data, 4).unwrap();
        assert!(matches!(
            candidates[0],
            ModelConfig::Simple {
                family: Family::Beta,
                ..
            }
        ));
    }

    #[test]
    fn hint_mismatch_is_an_error() {
        let data = StandardData::binomial(3, 10).unwrap();
        let result = enumerate(
            ModelHint::Named(ModelName::LogNormal),
            &data,
            4,
        );
        assert!(result.is_err());
    }

    #[test]
    fn positive_continuous_enumerates_mixtures_when_max_components_allows() {
        let data = StandardData::continuous(vec![1.0, 2.0, 3.0, 1.5, 2.5]).unwrap();
        let candidates = enumerate(ModelHint::Auto, &data, 3).unwrap();
        assert!(candidates
            .iter()
            .any(|c| matches!(c, ModelConfig::Mixture { components: 3, .. })));
    }
}
