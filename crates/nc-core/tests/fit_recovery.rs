//! Decay-fit recovery on synthetic curves and streams.

use nc_common::{DecayModel, Event, EventStream, ErrorCategory};
use nc_config::AnalysisConfig;
use nc_core::fit::{exp_two, log_two};
use nc_core::{combine_fit, run_feynman, run_rossi, DecayFitEngine, FitOptions, Outcome};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn rel_close(a: f64, b: f64, rel: f64) -> bool {
    (a - b).abs() <= rel * b.abs()
}

fn engine() -> DecayFitEngine {
    DecayFitEngine::new(FitOptions::default()).unwrap()
}

/// Emissions every ~500 ns on average, partner delayed by Exp(mean 25 ns).
fn paired_stream(seed: u64, pairs: usize) -> EventStream {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut t = 0.0;
    let mut events = Vec::with_capacity(2 * pairs);
    for _ in 0..pairs {
        t += -(1.0 - rng.random::<f64>()).ln() * 500.0;
        let delay = -(1.0 - rng.random::<f64>()).ln() * 25.0;
        events.push(Event::new(t, 1));
        events.push(Event::new(t + delay, 2));
    }
    EventStream::new(events).unwrap()
}

#[test]
fn log_two_recovers_both_terms_from_either_order() {
    let x: Vec<f64> = (0..30).map(|i| 5.0 * 1.3f64.powi(i)).collect();
    let y: Vec<f64> = x
        .iter()
        .map(|&t| log_two(t, 1.5, 0.02, 0.8, 0.0008))
        .collect();

    let engine = engine();
    let fast_first = engine
        .fit(DecayModel::LogTwo, &x, &y, Some(&[1.2, 0.015, 1.0, 0.001]))
        .unwrap();
    let slow_first = engine
        .fit(DecayModel::LogTwo, &x, &y, Some(&[1.0, 0.001, 1.2, 0.015]))
        .unwrap();
    assert_eq!(fast_first, slow_first);

    let [fast, slow] = [&fast_first.terms[0], &fast_first.terms[1]];
    assert!(rel_close(fast.rate.value, 0.02, 1e-3), "{}", fast.rate.value);
    assert!(rel_close(slow.rate.value, 0.0008, 1e-3), "{}", slow.rate.value);
    assert!(rel_close(fast.amplitude.value, 1.5, 1e-3));
    assert!(rel_close(slow.lifetime.value, 1250.0, 1e-3));
}

#[test]
fn exp_two_fit_feeds_alpha_combination() {
    let x: Vec<f64> = (0..200).map(|i| 1.0 + 2.0 * i as f64).collect();
    let y: Vec<f64> = x
        .iter()
        .map(|&t| exp_two(t, 400.0, 0.08, 150.0, 0.01, 5.0))
        .collect();
    let fit = engine()
        .fit(DecayModel::ExpTwo, &x, &y, Some(&[300.0, 0.06, 200.0, 0.012, 4.0]))
        .unwrap();
    assert!(rel_close(fit.terms[0].rate.value, 0.08, 1e-3));
    assert!(rel_close(fit.terms[1].rate.value, 0.01, 1e-3));
    assert!(rel_close(fit.offset.unwrap().value, 5.0, 1e-3));

    let alpha = combine_fit(&fit).unwrap();
    assert!((0.0..=1.0).contains(&alpha.mixing_fraction));
    assert!(alpha.combined_rate > 0.01 && alpha.combined_rate < 0.08);
    assert!(alpha.variance.is_finite());
}

#[test]
fn identical_terms_are_rejected_not_returned() {
    let x: Vec<f64> = (0..100).map(|i| 0.5 + i as f64).collect();
    let y: Vec<f64> = x.iter().map(|&t| 300.0 * (-0.05 * t).exp() + 2.0).collect();
    let err = engine()
        .fit(DecayModel::ExpTwo, &x, &y, Some(&[150.0, 0.05, 150.0, 0.05, 2.0]))
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Fit);
}

#[test]
fn rossi_pipeline_recovers_pair_lifetime() {
    let events = paired_stream(42, 40_000);

    let mut config = AnalysisConfig::default();
    config.rossi.reset_time = 250.0;
    config.rossi.number_bins = 50;
    config.rossi.model = DecayModel::ExpOne;

    let report = run_rossi(events, &config).unwrap();
    assert_eq!(report.events, 80_000);
    let fit = match &report.fit {
        Outcome::Accepted(fit) => fit,
        Outcome::Rejected(e) => panic!("fit rejected: {}", e.message),
    };
    let rate = fit.primary().rate.value;
    assert!(rel_close(rate, 0.04, 0.1), "rate {rate}");
    assert!(report.alpha.is_none());
}

#[test]
fn feynman_pipeline_fit_is_weighted_by_propagated_uncertainty() {
    let mut config = AnalysisConfig::default();
    config.feynman.gate_widths = Some((0..12).map(|i| 5.0 * 1.5f64.powi(i)).collect());
    let report = run_feynman(paired_stream(7, 20_000), &config).unwrap();
    assert!(report.weighted);
    assert!(report.curve.sigma.iter().all(|s| *s > 0.0));

    let fit = match &report.fit {
        Outcome::Accepted(fit) => fit,
        Outcome::Rejected(e) => panic!("fit rejected: {}", e.message),
    };
    let curve = &report.curve;
    let engine = DecayFitEngine::from_config(&config.fit).unwrap();
    let weighted = engine
        .fit_weighted(report.model, &curve.x, &curve.y, Some(curve.sigma.as_slice()), None)
        .unwrap();
    assert_eq!(fit, &weighted);
    if let Ok(unweighted) = engine.fit(report.model, &curve.x, &curve.y, None) {
        assert_ne!(unweighted.parameters, fit.parameters);
    }

    // partners trail by Exp(mean 25 ns): rate 0.04 per ns
    let rate = fit.primary().rate.value;
    assert!(rel_close(rate, 0.04, 0.2), "rate {rate}");
}
