//! End-to-end scenarios against the public `fit()` surface.

use approx::assert_relative_eq;
use bayes_engine::{
    fit, BusinessContext, Confidence, FitOptionsBuilder, ModelHint, ModelName, Posterior,
    StandardData, UserRecord,
};
use rand::distributions::Distribution;
use rand::{Rng, SeedableRng};
use statrs::distribution::LogNormal;

fn logger() {
    let _ = fern::Dispatch::new()
        .level(log::LevelFilter::Warn)
        .chain(std::io::stdout())
        .apply();
}

#[test]
fn beta_binomial_conversion_rate() {
    logger();
    let data = StandardData::binomial(120, 2000).unwrap();
    let result = fit(
        ModelHint::Named(ModelName::BetaBinomial),
        data,
        Default::default(),
    )
    .unwrap();
    let mean = result.posterior.mean()[0];
    assert_relative_eq!(mean, 0.0605, epsilon = 2e-3);
    let (lo, hi) = result.posterior.credible_interval(0.95)[0];
    assert!(lo >= 0.040 && lo <= 0.060, "lo={}", lo);
    assert!(hi >= 0.065 && hi <= 0.080, "hi={}", hi);
}

#[test]
fn gamma_waiting_time_rate() {
    logger();
    let data = StandardData::continuous(vec![1.2, 0.8, 2.1, 0.5, 1.7, 0.9, 1.3]).unwrap();
    let result = fit(ModelHint::Named(ModelName::Gamma), data, Default::default()).unwrap();
    assert_relative_eq!(result.posterior.mean()[0], 8.0 / 8.6, epsilon = 1e-6);
}

#[test]
fn lognormal_revenue_median() {
    logger();
    let values = vec![10.0, 15.0, 12.0, 50.0, 200.0, 18.0, 22.0];
    let log_mean = values.iter().map(|x: &f64| x.ln()).sum::<f64>() / values.len() as f64;
    let data = StandardData::continuous(values).unwrap();
    let options = FitOptionsBuilder::default().seed(1u64).build().unwrap();
    let result = fit(ModelHint::Named(ModelName::LogNormal), data, options).unwrap();
    // A zero-width credible interval at level 0 returns both quantile ends
    // at the median.
    let median = result.posterior.credible_interval(0.0)[0].0;
    let expected = log_mean.exp();
    assert!(
        (median - expected).abs() < 0.35 * expected,
        "median={}, expected={}",
        median,
        expected
    );
}

#[test]
fn lognormal_mixture_recovers_two_components() {
    logger();
    let mut rng = rand::rngs::StdRng::seed_from_u64(1);
    let comp_a = LogNormal::new(3.0, 0.3).unwrap();
    let comp_b = LogNormal::new(5.0, 0.4).unwrap();
    let values: Vec<f64> = (0..2000)
        .map(|_| {
            if rng.gen::<f64>() < 0.7 {
                comp_a.sample(&mut rng)
            } else {
                comp_b.sample(&mut rng)
            }
        })
        .collect();
    let data = StandardData::continuous(values).unwrap();
    let options = FitOptionsBuilder::default()
        .seed(1u64)
        .max_components(2u32)
        .build()
        .unwrap();
    let result = fit(ModelHint::Named(ModelName::LogNormalMixture), data, options).unwrap();
    assert_eq!(result.posterior.family(), "lognormal-mixture");
    let summary = result.posterior.summarize();
    let components = summary.parameters["components"]
        .as_array()
        .expect("mixture posterior reports its components");
    assert_eq!(components.len(), 2);
    // Components are sorted ascending by mean (MixturePosterior::new), so
    // index 0 is the mu=3 component and index 1 is the mu=5 component.
    let weight_a = components[0]["weight"].as_f64().unwrap();
    let weight_b = components[1]["weight"].as_f64().unwrap();
    let mean_a = components[0]["mean"].as_f64().unwrap();
    let mean_b = components[1]["mean"].as_f64().unwrap();
    assert!((weight_a - 0.7).abs() < 0.05, "weight_a={}", weight_a);
    assert!((weight_b - 0.3).abs() < 0.05, "weight_b={}", weight_b);
    assert!((mean_a - 3.0).abs() < 0.1, "mean_a={}", mean_a);
    assert!((mean_b - 5.0).abs() < 0.1, "mean_b={}", mean_b);
}

#[test]
fn compound_beta_lognormal_expected_value_per_user() {
    logger();
    let mut rng = rand::rngs::StdRng::seed_from_u64(1);
    let severity = LogNormal::new(4.0, 0.5).unwrap();
    let mut users = Vec::with_capacity(2000);
    for _ in 0..2000 {
        let converted = rng.gen::<f64>() < 0.08;
        let value = if converted { severity.sample(&mut rng) } else { 0.0 };
        users.push(UserRecord::new(converted, value).unwrap());
    }
    let data = StandardData::user_level(users).unwrap();
    let options = FitOptionsBuilder::default()
        .seed(1u64)
        .business_context(BusinessContext::Revenue)
        .return_route_info(true)
        .build()
        .unwrap();
    let result = fit(ModelHint::Auto, data, options).unwrap();
    assert!(result.diagnostics.model_type.starts_with("compound-beta-"));

    let expected = result.posterior.mean()[0];
    // 0.08 * E[LogNormal(4, 0.5)] = 0.08 * exp(4 + 0.5^2 / 2) ~= 4.95.
    assert!(
        (expected - 4.95).abs() < 0.75,
        "expected_value_per_user={}",
        expected
    );
    // Per-user predictive over the zero-inflated joint Y = B*V: most mass
    // sits at zero, the rest in a heavy lognormal tail, so the interval is
    // wide rather than tight around the mean.
    let (lo, hi) = result.posterior.credible_interval(0.95)[0];
    assert!(lo >= 0.0, "lo={}", lo);
    assert!(hi - lo > 10.0, "lo={}, hi={}", lo, hi);
}

#[test]
fn auto_routes_small_binary_sample_to_beta_binomial() {
    logger();
    let data =
        StandardData::continuous(vec![0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 1.0]).unwrap();
    let options = FitOptionsBuilder::default()
        .return_route_info(true)
        .build()
        .unwrap();
    let result = fit(ModelHint::Auto, data, options).unwrap();
    assert_eq!(result.posterior.family(), "beta");
    let route = result.route_info.unwrap();
    assert_eq!(route.confidence, Confidence::Low);
}

#[test]
fn model_mismatch_is_reported() {
    logger();
    let data = StandardData::binomial(3, 10).unwrap();
    let result = fit(
        ModelHint::Named(ModelName::LogNormal),
        data,
        Default::default(),
    );
    assert!(result.is_err());
}
