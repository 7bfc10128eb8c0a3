//! The public entry point (§6): `fit()` and its result types.

use std::time::Instant;

use log::debug;
use serde::Serialize;

use crate::concurrency::{CancellationToken, NoopYieldSink, YieldSink};
use crate::config::{FitOptions, ModelHint};
use crate::data::StandardData;
use crate::errors::Result;
use crate::posterior::Posterior;
use crate::router::{Router, RouteInfo};
use crate::waic::WaicInfo;

/// Convergence and timing information about a single `fit()` call. Always
/// present, even when the underlying model is a closed-form conjugate
/// update (`converged` is trivially `true`, `iterations` is `1`).
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub converged: bool,
    pub iterations: u32,
    pub runtime_ms: f64,
    pub model_type: String,
    pub log_likelihood: Option<f64>,
}

/// The full result of a `fit()` call.
pub struct FitResult {
    pub posterior: Box<dyn Posterior>,
    pub diagnostics: Diagnostics,
    pub route_info: Option<RouteInfo>,
    pub waic_info: Option<WaicInfo>,
}

/// Fit `data` to a posterior, using `model_hint` to steer (or fully pin)
/// the model router (§6).
///
/// `options.return_route_info` controls whether `FitResult::route_info` is
/// populated; `waic_info` mirrors whatever WAIC the router itself computed
/// while scoring candidates (`None` when there was nothing to score, e.g. a
/// single-candidate shape or `use_waic = false`).
pub fn fit(model_hint: ModelHint, data: StandardData, options: FitOptions) -> Result<FitResult> {
    fit_with_control(
        model_hint,
        data,
        options,
        &CancellationToken::new(),
        &mut NoopYieldSink,
    )
}

/// As `fit`, but lets a caller embedding a cooperative event loop supply its
/// own `CancellationToken` and `YieldSink` (§5).
pub fn fit_with_control(
    model_hint: ModelHint,
    data: StandardData,
    options: FitOptions,
    cancel: &CancellationToken,
    yield_sink: &mut dyn YieldSink,
) -> Result<FitResult> {
    options.validate()?;
    let started = Instant::now();
    let (posterior, mut diagnostics, route_info, waic_info) =
        Router::route(model_hint, &data, &options, cancel, yield_sink)?;
    diagnostics.runtime_ms = started.elapsed().as_secs_f64() * 1000.0;
    debug!(
        "fit() selected model_type={} converged={} in {:.3}ms",
        diagnostics.model_type, diagnostics.converged, diagnostics.runtime_ms
    );
    Ok(FitResult {
        posterior,
        diagnostics,
        route_info,
        waic_info,
    })
}
