//! Inference engines (components C, D, E): turn `StandardData` + options
//! into a fitted `Posterior` plus `Diagnostics`. Each engine is a pure
//! function — no engine mutates its inputs or retains state between calls.

pub mod compound;
pub mod conjugate;
pub mod em;

use std::time::Instant;

use crate::api::Diagnostics;

/// Diagnostics for a non-iterative (closed-form) fit: always converged,
/// took one "iteration", no log-likelihood trace to report.
pub(crate) fn closed_form_diagnostics(model_type: &str, started: Instant) -> Diagnostics {
    Diagnostics {
        converged: true,
        iterations: 1,
        runtime_ms: started.elapsed().as_secs_f64() * 1000.0,
        model_type: model_type.to_string(),
        log_likelihood: None,
    }
}
