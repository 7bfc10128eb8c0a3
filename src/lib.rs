//! A Bayesian inference engine for A/B-test style analysis of business
//! metrics — conversion rates, revenue per user, waiting times, and
//! combinations thereof.
//!
//! The entry point is [`fit`]: given a data sample, an optional model hint,
//! and [`FitOptions`], it returns a fitted [`Posterior`] plus convergence
//! diagnostics. Three subsystems do the real work: the [`router`] (data
//! shape detection and WAIC-based model selection), the [`engines`]
//! (conjugate updates, EM mixtures, compound decomposition), and the
//! [`posterior`] protocol itself (a uniform `mean`/`variance`/
//! `credible_interval`/`sample`/`log_pdf` surface over both closed-form and
//! Monte-Carlo-backed posteriors).
//!
//! Everything else — CLI shells, UI widgets, plotting, transport,
//! persistence — is an external collaborator's job. This crate has no
//! binary target and mandates no wire format; collaborators serialize
//! posteriors themselves via [`posterior::PosteriorSummary`].

pub mod api;
pub mod concurrency;
pub mod config;
pub mod data;
pub mod distributions;
pub mod engines;
pub mod errors;
pub mod posterior;
pub mod rng;
pub mod router;
pub mod waic;

pub use api::{fit, fit_with_control, Diagnostics, FitResult};
pub use config::{
    BusinessContext, FitOptions, FitOptionsBuilder, ModelHint, ModelName, PriorParams,
};
pub use data::{normalize, StandardData, UserRecord};
pub use errors::{Error, Result};
pub use posterior::{Posterior, PosteriorSummary};
pub use router::{Confidence, ModelConfig, RouteInfo};
pub use waic::WaicInfo;
