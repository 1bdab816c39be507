//! Integration tests for harmonic analysis.
//!
//! Tests the full analysis pipeline including fitting, synthesis,
//! residual metrics and the component report.

use std::f64::consts::PI;

use tide_harmonics::analysis::phase_difference;
use tide_harmonics::io::{parse_component_report, write_component_report};
use tide_harmonics::{
    ConstituentTable, Epoch, FitConfig, FitError, HarmonicAnalysis, HarmonicModel, TimeSeries,
    error_inf, error_mean, error_sum_squares, synthesize,
};

fn hourly(n: usize) -> Vec<f64> {
    (0..n).map(|i| i as f64).collect()
}

/// Model over the table's pulsations with the given amplitudes and phases.
fn model_for(table: &ConstituentTable, amplitudes: &[f64], phases: &[f64], mean: f64) -> HarmonicModel {
    HarmonicModel::new(table.pulsations(), amplitudes.to_vec(), phases.to_vec(), mean).unwrap()
}

#[test]
fn test_round_trip_recovers_model() {
    let table = ConstituentTable::standard()
        .select(&["M2", "S2", "N2", "K1", "O1", "Q1", "Mf"])
        .unwrap();
    let amplitudes = [1.2, 0.4, 0.2, 0.15, 0.1, 0.03, 0.05];
    let phases = [0.1, -2.5, 1.3, 3.0, -0.7, 0.0, 2.2];
    let truth = model_for(&table, &amplitudes, &phases, 1.5);

    // ~62 days of hourly data separates every pair in the table
    let times = hourly(1500);
    let heights = synthesize(&times, &truth).unwrap();

    let analysis = HarmonicAnalysis::from_table(&table);
    let fit = analysis.fit(&times, &heights, 1.5).unwrap();
    assert!(!fit.is_rank_deficient());

    for (i, name) in table.names().iter().enumerate() {
        let amp = fit.model.amplitudes()[i];
        let phase = fit.model.phases()[i];
        assert!(
            (amp - amplitudes[i]).abs() < 1e-6,
            "{} amplitude error: expected {:.6}, got {:.6}",
            name,
            amplitudes[i],
            amp
        );
        assert!(
            phase_difference(phase, phases[i]).abs() < 1e-6,
            "{} phase error: expected {:.6}, got {:.6}",
            name,
            phases[i],
            phase
        );
    }
}

#[test]
fn test_round_trip_with_mean_term() {
    let table = ConstituentTable::principal().with_mean_term();
    let truth = model_for(&table, &[1.0, 0.5, 0.2, 0.1, 0.3], &[0.5, -1.0, 2.0, 0.0, 0.0], 2.0);

    let times = hourly(800);
    let heights = synthesize(&times, &truth).unwrap();
    let fit = HarmonicAnalysis::from_table(&table)
        .fit(&times, &heights, 2.0)
        .unwrap();

    // Zero pulsation contributes a single column
    assert_eq!(fit.expected_rank, 9);
    assert_eq!(fit.rank, 9);

    let mut model = fit.model;
    assert!((model.amplitudes()[4] - 0.3).abs() < 1e-6);

    let level = model.fold_mean_term().unwrap();
    assert!(
        (level - 2.3).abs() < 1e-6,
        "Absolute mean level: expected 2.3, got {:.6}",
        level
    );
    assert_eq!(model.mean(), 0.0);
    assert!(error_inf(&times, &heights, &model).unwrap() < 1e-6);
}

#[test]
fn test_zero_residual() {
    let table = ConstituentTable::principal();
    let truth = model_for(&table, &[1.0, 0.4, 0.2, 0.1], &[0.2, 0.4, 0.6, 0.8], 0.0);

    let times = hourly(720);
    let heights = synthesize(&times, &truth).unwrap();
    let fit = HarmonicAnalysis::from_table(&table)
        .fit(&times, &heights, 0.0)
        .unwrap();

    let worst = error_inf(&times, &heights, &fit.model).unwrap();
    let average = error_mean(&times, &heights, &fit.model).unwrap();
    let ss = error_sum_squares(&times, &heights, &fit.model).unwrap();
    assert!(worst < 1e-8, "errorInf should vanish, got {:.3e}", worst);
    assert!(average < 1e-8, "errorMean should vanish, got {:.3e}", average);
    assert!(ss < 1e-12);
}

#[test]
fn test_quarter_period_scenario() {
    let times = [0.0, 1.0, 2.0, 3.0];
    let analysis = HarmonicAnalysis::new(vec![PI / 2.0]);

    // 1 + 2·cos(πt/2)
    let cosine = [3.0, 1.0, -1.0, 1.0];
    let fit = analysis.fit(&times, &cosine, 1.0).unwrap();
    assert!((fit.model.amplitudes()[0] - 2.0).abs() < 1e-9);
    assert!(fit.model.phases()[0].abs() < 1e-9);
    assert!(error_inf(&times, &cosine, &fit.model).unwrap() < 1e-9);

    // 1 + 2·sin(πt/2): same amplitude, a quarter cycle behind
    let sine = [1.0, 3.0, 1.0, -1.0];
    let fit = analysis.fit(&times, &sine, 1.0).unwrap();
    assert!((fit.model.amplitudes()[0] - 2.0).abs() < 1e-9);
    assert!((fit.model.phases()[0] + PI / 2.0).abs() < 1e-9);
    assert!(error_inf(&times, &sine, &fit.model).unwrap() < 1e-9);
    assert!(error_mean(&times, &sine, &fit.model).unwrap() < 1e-9);
}

#[test]
fn test_too_few_samples() {
    let analysis = HarmonicAnalysis::from_table(&ConstituentTable::principal());
    let times = hourly(7);
    let heights = vec![0.0; 7];

    let result = analysis.fit(&times, &heights, 0.0);
    assert!(
        matches!(
            result,
            Err(FitError::Underdetermined {
                samples: 7,
                required: 8
            })
        ),
        "Expected under-determined error, got {:?}",
        result
    );
}

#[test]
fn test_fit_window_synthesize_full_series() {
    let table = ConstituentTable::standard().select(&["M2", "K1"]).unwrap();
    let truth = model_for(&table, &[0.8, 0.25], &[1.0, -0.4], 3.0);

    let times = hourly(2000);
    let heights = synthesize(&times, &truth).unwrap();
    let series = TimeSeries::new(times, heights, Epoch::Offset { first_raw: 0.0 }).unwrap();

    // Fit only the first 500 samples against the full-series mean
    let window = series.range(0, 500).unwrap();
    let fit = HarmonicAnalysis::from_table(&table)
        .fit(window.time, window.height, series.mean())
        .unwrap();

    // Full-series mean differs slightly from 3.0, so residuals stay small but finite
    let worst = error_inf(series.time(), series.height(), &fit.model).unwrap();
    assert!(
        worst < 0.05,
        "Prediction outside the fit window drifted: {:.4}",
        worst
    );
}

#[test]
fn test_duplicate_pulsations_least_norm() {
    let w = 2.0 * PI / 12.42;
    let truth = HarmonicModel::new(vec![w], vec![1.0], vec![0.3], 0.0).unwrap();
    let times = hourly(200);
    let heights = synthesize(&times, &truth).unwrap();

    let analysis = HarmonicAnalysis::new(vec![w, w])
        .with_config(FitConfig::default().with_singular_tolerance(1e-10));
    let fit = analysis.fit(&times, &heights, 0.0).unwrap();

    assert!(fit.is_rank_deficient());
    assert_eq!(fit.rank, 2);
    // Least-norm splits the component evenly
    let amps = fit.model.amplitudes();
    assert!((amps[0] - 0.5).abs() < 1e-6 && (amps[1] - 0.5).abs() < 1e-6);
    assert!(error_inf(&times, &heights, &fit.model).unwrap() < 1e-8);
}

#[test]
fn test_report_drives_prediction() {
    let table = ConstituentTable::principal();
    let truth = model_for(&table, &[1.1, 0.3, 0.2, 0.1], &[0.3, 1.2, -2.0, 0.9], 0.5);
    let times = hourly(720);
    let heights = synthesize(&times, &truth).unwrap();
    let fit = HarmonicAnalysis::from_table(&table)
        .fit(&times, &heights, 0.5)
        .unwrap();

    let epoch = Epoch::Offset { first_raw: 0.0 };
    let text = write_component_report(&epoch, &table.names(), &fit.model).unwrap();
    let report = parse_component_report(&text).unwrap();

    assert_eq!(report.names, vec!["M2", "S2", "K1", "O1"]);
    let future: Vec<f64> = (720..744).map(|i| i as f64).collect();
    let expected = synthesize(&future, &truth).unwrap();
    let predicted = synthesize(&future, &report.model).unwrap();
    for (p, e) in predicted.iter().zip(&expected) {
        assert!((p - e).abs() < 1e-5, "predicted {:.6}, expected {:.6}", p, e);
    }
}

#[test]
fn test_minimum_record_length() {
    // M2 vs S2 separation requires ~355 hours
    let hours = ConstituentTable::principal().minimum_record_length();
    assert!(
        hours > 300.0 && hours < 400.0,
        "Minimum record length should be ~355 hours, got {:.1} hours",
        hours
    );
}
