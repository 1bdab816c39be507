//! Residual metrics between observations and a harmonic model.
//!
//! Residuals are `|height_i - model(time_i)|`; each metric is a single pass
//! over the samples using [`HarmonicModel::evaluate`]. Every metric rejects
//! non-finite samples.

use thiserror::Error;

use super::model::HarmonicModel;

/// Error type for residual metrics.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MetricsError {
    /// Time and height arrays differ in length
    #[error("Length mismatch: {times} times vs {heights} heights")]
    LengthMismatch { times: usize, heights: usize },

    /// No samples to aggregate
    #[error("Residual metrics need at least one sample")]
    Empty,

    /// NaN or infinite time or height
    #[error("Non-finite sample at index {index}")]
    NonFiniteSample { index: usize },
}

fn check(times: &[f64], heights: &[f64]) -> Result<(), MetricsError> {
    if times.len() != heights.len() {
        return Err(MetricsError::LengthMismatch {
            times: times.len(),
            heights: heights.len(),
        });
    }
    if times.is_empty() {
        return Err(MetricsError::Empty);
    }
    if let Some(index) = times
        .iter()
        .zip(heights)
        .position(|(t, h)| !t.is_finite() || !h.is_finite())
    {
        return Err(MetricsError::NonFiniteSample { index });
    }
    Ok(())
}

fn residuals<'a>(
    times: &'a [f64],
    heights: &'a [f64],
    model: &'a HarmonicModel,
) -> impl Iterator<Item = f64> + 'a {
    times
        .iter()
        .zip(heights)
        .map(|(&t, &h)| h - model.evaluate(t))
}

/// Maximum absolute residual.
pub fn error_inf(
    times: &[f64],
    heights: &[f64],
    model: &HarmonicModel,
) -> Result<f64, MetricsError> {
    check(times, heights)?;
    Ok(residuals(times, heights, model)
        .map(f64::abs)
        .fold(0.0, f64::max))
}

/// Mean absolute residual.
pub fn error_mean(
    times: &[f64],
    heights: &[f64],
    model: &HarmonicModel,
) -> Result<f64, MetricsError> {
    check(times, heights)?;
    let sum: f64 = residuals(times, heights, model).map(f64::abs).sum();
    Ok(sum / times.len() as f64)
}

/// Sum of squared residuals.
pub fn error_sum_squares(
    times: &[f64],
    heights: &[f64],
    model: &HarmonicModel,
) -> Result<f64, MetricsError> {
    check(times, heights)?;
    Ok(residuals(times, heights, model).map(|r| r * r).sum())
}

/// All residual statistics from one pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResidualMetrics {
    /// Maximum absolute residual
    pub max_abs: f64,
    /// Mean absolute residual
    pub mean_abs: f64,
    /// Sum of squared residuals
    pub sum_squares: f64,
    /// Root mean square residual
    pub rmse: f64,
    /// Bias: mean(height - model)
    pub bias: f64,
    /// Number of samples
    pub n_points: usize,
}

impl ResidualMetrics {
    /// Compute residual metrics of `model` against observed `heights`.
    pub fn compute(
        times: &[f64],
        heights: &[f64],
        model: &HarmonicModel,
    ) -> Result<Self, MetricsError> {
        check(times, heights)?;

        let mut max_abs = 0.0_f64;
        let mut sum_abs = 0.0;
        let mut sum_squares = 0.0;
        let mut sum = 0.0;
        for r in residuals(times, heights, model) {
            max_abs = max_abs.max(r.abs());
            sum_abs += r.abs();
            sum_squares += r * r;
            sum += r;
        }

        let n = times.len() as f64;
        Ok(Self {
            max_abs,
            mean_abs: sum_abs / n,
            sum_squares,
            rmse: (sum_squares / n).sqrt(),
            bias: sum / n,
            n_points: times.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const TOL: f64 = 1e-10;

    fn quarter_model() -> HarmonicModel {
        HarmonicModel::new(vec![PI / 2.0], vec![2.0], vec![0.0], 1.0).unwrap()
    }

    #[test]
    fn test_perfect_match() {
        let model = quarter_model();
        let times = [0.0, 1.0, 2.0, 3.0];
        let heights = [3.0, 1.0, -1.0, 1.0];

        assert!(error_inf(&times, &heights, &model).unwrap() < TOL);
        assert!(error_mean(&times, &heights, &model).unwrap() < TOL);
        assert!(error_sum_squares(&times, &heights, &model).unwrap() < TOL);
    }

    #[test]
    fn test_known_residuals() {
        let model = quarter_model();
        let times = [0.0, 1.0, 2.0, 3.0];
        // Residuals: +0.5, -0.1, 0, +0.2
        let heights = [3.5, 0.9, -1.0, 1.2];

        assert!((error_inf(&times, &heights, &model).unwrap() - 0.5).abs() < TOL);
        assert!((error_mean(&times, &heights, &model).unwrap() - 0.2).abs() < TOL);
        assert!((error_sum_squares(&times, &heights, &model).unwrap() - 0.30).abs() < TOL);

        let metrics = ResidualMetrics::compute(&times, &heights, &model).unwrap();
        assert!((metrics.max_abs - 0.5).abs() < TOL);
        assert!((metrics.mean_abs - 0.2).abs() < TOL);
        assert!((metrics.bias - 0.15).abs() < TOL);
        assert!((metrics.rmse - (0.30_f64 / 4.0).sqrt()).abs() < TOL);
        assert_eq!(metrics.n_points, 4);
    }

    #[test]
    fn test_length_mismatch() {
        let model = quarter_model();
        assert_eq!(
            error_inf(&[0.0, 1.0], &[1.0], &model),
            Err(MetricsError::LengthMismatch {
                times: 2,
                heights: 1
            })
        );
    }

    #[test]
    fn test_empty() {
        let model = quarter_model();
        assert_eq!(error_mean(&[], &[], &model), Err(MetricsError::Empty));
    }

    #[test]
    fn test_non_finite_sample() {
        let model = quarter_model();
        let times = [0.0, 1.0, 2.0];
        let heights = [3.0, f64::NAN, -1.0];
        let expected = Err(MetricsError::NonFiniteSample { index: 1 });

        assert_eq!(error_inf(&times, &heights, &model), expected);
        assert_eq!(error_mean(&times, &heights, &model), expected);
        assert_eq!(error_sum_squares(&times, &heights, &model), expected);
        assert_eq!(
            ResidualMetrics::compute(&[0.0, f64::INFINITY], &[3.0, 1.0], &model),
            Err(MetricsError::NonFiniteSample { index: 1 })
        );
    }
}
