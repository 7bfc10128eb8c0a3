//! `LogNormal(mu, sigma)` with an explicit point-mass degenerate case at
//! `sigma == 0`, per §4.A: "The LogNormal degenerate case (σ=0) is a point
//! mass at exp(μ); its pdf is +∞ at that point, 0 elsewhere."

use rand::Rng;
use statrs::distribution::{ContinuousCDF, LogNormal};

const DEGENERATE_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy)]
pub enum LogNormalDist {
    Proper(LogNormal),
    Degenerate { point: f64 },
}

impl LogNormalDist {
    pub fn new(mu: f64, sigma: f64) -> Self {
        if sigma.abs() < DEGENERATE_EPSILON {
            LogNormalDist::Degenerate { point: mu.exp() }
        } else {
            LogNormalDist::Proper(LogNormal::new(mu, sigma).expect("sigma already validated > 0"))
        }
    }

    pub fn ln_pdf(&self, x: f64) -> f64 {
        match self {
            LogNormalDist::Proper(d) => {
                use statrs::distribution::Continuous;
                d.ln_pdf(x)
            }
            LogNormalDist::Degenerate { point } => {
                if (x - point).abs() < DEGENERATE_EPSILON {
                    f64::INFINITY
                } else {
                    f64::NEG_INFINITY
                }
            }
        }
    }

    pub fn cdf(&self, x: f64) -> f64 {
        match self {
            LogNormalDist::Proper(d) => d.cdf(x),
            LogNormalDist::Degenerate { point } => {
                if x < *point {
                    0.0
                } else {
                    1.0
                }
            }
        }
    }

    pub fn inverse_cdf(&self, p: f64) -> f64 {
        match self {
            LogNormalDist::Proper(d) => d.inverse_cdf(p),
            LogNormalDist::Degenerate { point } => *point,
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<f64> {
        match self {
            LogNormalDist::Proper(d) => crate::distributions::sample_n(d, n, rng),
            LogNormalDist::Degenerate { point } => vec![*point; n],
        }
    }

    pub fn mean(&self) -> f64 {
        match self {
            LogNormalDist::Proper(d) => {
                use statrs::statistics::Distribution as _;
                d.mean().unwrap_or(f64::NAN)
            }
            LogNormalDist::Degenerate { point } => *point,
        }
    }

    pub fn variance(&self) -> f64 {
        match self {
            LogNormalDist::Proper(d) => {
                use statrs::statistics::Distribution as _;
                d.variance().unwrap_or(f64::NAN)
            }
            LogNormalDist::Degenerate { .. } => 0.0,
        }
    }
}
