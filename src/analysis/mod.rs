//! Tidal harmonic analysis: fitting, synthesis and residual metrics.
//!
//! This module provides tools for:
//! - Holding a water-level record as parallel time/height arrays
//! - Decomposing it into constituent harmonics using least-squares fitting
//! - Resynthesizing a predicted curve from the fitted model
//! - Reporting residual error between observations and the model
//!
//! # Mathematical Background
//!
//! Tidal signal decomposition around a supplied mean level η₀:
//! ```text
//! η(t) - η₀ = Σᵢ [Aᵢ cos(ωᵢt) + Bᵢ sin(ωᵢt)]
//! ```
//!
//! Where:
//! - ωᵢ is the constituent pulsation in rad/h, t is in hours
//! - Amplitude: Hᵢ = √(Aᵢ² + Bᵢ²)
//! - Phase: φᵢ = atan2(-Bᵢ, Aᵢ), so that Aᵢ cos(ωᵢt) + Bᵢ sin(ωᵢt) = Hᵢ cos(ωᵢt + φᵢ)
//!
//! This is a linear least-squares problem.
//!
//! # Example
//!
//! ```ignore
//! use tide_harmonics::analysis::{HarmonicAnalysis, synthesize, error_inf};
//! use tide_harmonics::io::{ReaderConfig, read_series};
//!
//! let series = read_series(&text, &ReaderConfig::default())?;
//! let analysis = HarmonicAnalysis::from_table(&ConstituentTable::standard());
//! let window = series.range(0, series.len() / 2)?;
//! let fit = analysis.fit(window.time, window.height, series.mean())?;
//!
//! let predicted = synthesize(series.time(), &fit.model)?;
//! println!("max residual: {:.3} m", error_inf(series.time(), series.height(), &fit.model)?);
//! ```

mod harmonic;
mod metrics;
mod model;
mod synthesis;

pub use harmonic::{FitConfig, FitError, HarmonicAnalysis, HarmonicFit};
pub use metrics::{MetricsError, ResidualMetrics, error_inf, error_mean, error_sum_squares};
pub use model::{HarmonicModel, ModelError};
pub use synthesis::{SynthesisError, synthesize, synthesize_components};

use std::f64::consts::PI;
use std::fmt;

use chrono::NaiveDateTime;
use thiserror::Error;

/// Error type for series construction and sub-range selection.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SeriesError {
    /// Time and height arrays differ in length
    #[error("Length mismatch: {times} times vs {heights} heights")]
    LengthMismatch { times: usize, heights: usize },

    /// No samples
    #[error("Series contains no samples")]
    Empty,

    /// Time decreases at the given sample index
    #[error("Non-monotonic time at sample {index}")]
    NonMonotonic { index: usize },

    /// Sub-range outside the series
    #[error("Invalid range [{lo}, {hi}) for series of length {len}")]
    InvalidRange { lo: usize, hi: usize, len: usize },

    /// Scale factor that would corrupt the heights
    #[error("Invalid height scale factor: {0}")]
    InvalidScale(f64),
}

/// The instant that `time = 0` refers to.
#[derive(Clone, Debug, PartialEq)]
pub enum Epoch {
    /// Calendar instant parsed from the first valid row
    Calendar {
        /// Raw text of the first valid time field
        label: String,
        /// Parsed instant
        instant: NaiveDateTime,
    },
    /// Numeric time column: no calendar reference exists
    Offset {
        /// First raw time value (before unit scaling)
        first_raw: f64,
    },
}

impl Epoch {
    /// Human-readable label used in reports.
    pub fn label(&self) -> String {
        match self {
            Epoch::Calendar { label, .. } => label.clone(),
            Epoch::Offset { first_raw } => format!("t0={first_raw}"),
        }
    }

    /// Calendar instant, if the series was read in pattern mode.
    pub fn instant(&self) -> Option<NaiveDateTime> {
        match self {
            Epoch::Calendar { instant, .. } => Some(*instant),
            Epoch::Offset { .. } => None,
        }
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Water-level record as parallel time (hours since epoch) and height arrays.
///
/// Invariants: `time.len() == height.len() > 0`, time is non-decreasing,
/// `mean` is the arithmetic mean of all heights.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSeries {
    time: Vec<f64>,
    height: Vec<f64>,
    mean: f64,
    epoch: Epoch,
}

impl TimeSeries {
    /// Create a series from parallel arrays, validating the invariants.
    pub fn new(time: Vec<f64>, height: Vec<f64>, epoch: Epoch) -> Result<Self, SeriesError> {
        if time.len() != height.len() {
            return Err(SeriesError::LengthMismatch {
                times: time.len(),
                heights: height.len(),
            });
        }
        if time.is_empty() {
            return Err(SeriesError::Empty);
        }
        if let Some(i) = time.windows(2).position(|w| w[1] < w[0]) {
            return Err(SeriesError::NonMonotonic { index: i + 1 });
        }

        let mean = mean(&height);
        Ok(Self {
            time,
            height,
            mean,
            epoch,
        })
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Always false for a constructed series; kept for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Times in hours since the epoch.
    pub fn time(&self) -> &[f64] {
        &self.time
    }

    /// Heights.
    pub fn height(&self) -> &[f64] {
        &self.height
    }

    /// Mean of all heights (not of any sub-range).
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Reference instant for `time = 0`.
    pub fn epoch(&self) -> &Epoch {
        &self.epoch
    }

    /// Duration of the series (last time - first time).
    pub fn duration(&self) -> f64 {
        self.time[self.time.len() - 1] - self.time[0]
    }

    /// Multiply every height by `factor` (e.g. 0.01 for cm → m) and recompute the mean.
    pub fn scale_heights(&mut self, factor: f64) -> Result<(), SeriesError> {
        if !factor.is_finite() || factor == 0.0 {
            return Err(SeriesError::InvalidScale(factor));
        }
        for h in &mut self.height {
            *h *= factor;
        }
        self.mean = mean(&self.height);
        Ok(())
    }

    /// Borrowed view of the contiguous index interval `[lo, hi)`.
    pub fn range(&self, lo: usize, hi: usize) -> Result<SeriesView<'_>, SeriesError> {
        if lo >= hi || hi > self.len() {
            return Err(SeriesError::InvalidRange {
                lo,
                hi,
                len: self.len(),
            });
        }
        Ok(SeriesView {
            time: &self.time[lo..hi],
            height: &self.height[lo..hi],
            mean: self.mean,
            epoch: &self.epoch,
        })
    }

    /// View over the whole series.
    pub fn view(&self) -> SeriesView<'_> {
        SeriesView {
            time: &self.time,
            height: &self.height,
            mean: self.mean,
            epoch: &self.epoch,
        }
    }

    /// Index interval covering times in `[t_start, t_end]`.
    pub fn index_range(&self, t_start: f64, t_end: f64) -> (usize, usize) {
        let lo = self.time.partition_point(|&t| t < t_start);
        let hi = self.time.partition_point(|&t| t <= t_end);
        (lo, hi.max(lo))
    }

    /// Consume the series into its parts.
    pub fn into_parts(self) -> (Vec<f64>, Vec<f64>, f64, Epoch) {
        (self.time, self.height, self.mean, self.epoch)
    }
}

/// Borrowed sub-range of a [`TimeSeries`].
///
/// Carries the parent's full-series mean and epoch; never owns samples.
#[derive(Clone, Copy, Debug)]
pub struct SeriesView<'a> {
    /// Times in hours
    pub time: &'a [f64],
    /// Heights
    pub height: &'a [f64],
    /// Mean of the parent series
    pub mean: f64,
    /// Epoch of the parent series
    pub epoch: &'a Epoch,
}

impl SeriesView<'_> {
    /// Number of samples in the view.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Check if the view is empty.
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// Arithmetic mean, 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Wrap a phase angle to the range [0, 2π).
pub fn wrap_phase(phase: f64) -> f64 {
    let p = phase.rem_euclid(2.0 * PI);
    // rem_euclid can round up to exactly 2π for tiny negative inputs
    if p >= 2.0 * PI { 0.0 } else { p }
}

/// Compute phase difference wrapped to [-π, π].
pub fn phase_difference(phase1: f64, phase2: f64) -> f64 {
    let diff = phase1 - phase2;
    let mut wrapped = diff % (2.0 * PI);
    if wrapped > PI {
        wrapped -= 2.0 * PI;
    } else if wrapped < -PI {
        wrapped += 2.0 * PI;
    }
    wrapped
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-10;

    fn offset_epoch() -> Epoch {
        Epoch::Offset { first_raw: 0.0 }
    }

    #[test]
    fn test_time_series_creation() {
        let ts = TimeSeries::new(
            vec![0.0, 1.0, 2.0, 3.0],
            vec![1.0, 2.0, 3.0, 4.0],
            offset_epoch(),
        )
        .unwrap();

        assert_eq!(ts.len(), 4);
        assert!((ts.duration() - 3.0).abs() < TOL);
        assert!((ts.mean() - 2.5).abs() < TOL);
    }

    #[test]
    fn test_length_mismatch() {
        let result = TimeSeries::new(vec![0.0, 1.0], vec![1.0], offset_epoch());
        assert_eq!(
            result,
            Err(SeriesError::LengthMismatch {
                times: 2,
                heights: 1
            })
        );
    }

    #[test]
    fn test_empty_rejected() {
        let result = TimeSeries::new(vec![], vec![], offset_epoch());
        assert_eq!(result, Err(SeriesError::Empty));
    }

    #[test]
    fn test_non_monotonic_rejected() {
        let result = TimeSeries::new(vec![0.0, 2.0, 1.0], vec![0.0; 3], offset_epoch());
        assert_eq!(result, Err(SeriesError::NonMonotonic { index: 2 }));
    }

    #[test]
    fn test_scale_heights_updates_mean() {
        let mut ts =
            TimeSeries::new(vec![0.0, 1.0], vec![100.0, 300.0], offset_epoch()).unwrap();
        ts.scale_heights(0.01).unwrap();

        assert!((ts.height()[1] - 3.0).abs() < TOL);
        assert!((ts.mean() - 2.0).abs() < TOL);
        assert!(ts.scale_heights(f64::NAN).is_err());
    }

    #[test]
    fn test_range_view() {
        let ts = TimeSeries::new(
            vec![0.0, 1.0, 2.0, 3.0],
            vec![1.0, 2.0, 3.0, 4.0],
            offset_epoch(),
        )
        .unwrap();

        let view = ts.range(1, 3).unwrap();
        assert_eq!(view.time, &[1.0, 2.0]);
        assert_eq!(view.height, &[2.0, 3.0]);
        // View keeps the full-series mean
        assert!((view.mean - 2.5).abs() < TOL);

        assert!(ts.range(2, 2).is_err());
        assert!(ts.range(0, 5).is_err());
    }

    #[test]
    fn test_index_range() {
        let ts = TimeSeries::new(
            vec![0.0, 1.0, 2.0, 3.0, 4.0],
            vec![0.0; 5],
            offset_epoch(),
        )
        .unwrap();
        assert_eq!(ts.index_range(1.0, 3.0), (1, 4));
        assert_eq!(ts.index_range(10.0, 20.0), (5, 5));
    }

    #[test]
    fn test_epoch_label() {
        assert_eq!(Epoch::Offset { first_raw: 12.5 }.label(), "t0=12.5");
    }

    #[test]
    fn test_wrap_phase() {
        assert!((wrap_phase(0.0) - 0.0).abs() < TOL);
        assert!((wrap_phase(PI) - PI).abs() < TOL);
        assert!((wrap_phase(-PI) - PI).abs() < TOL);
        assert!((wrap_phase(3.0 * PI) - PI).abs() < TOL);
        assert!((wrap_phase(-PI / 2.0) - 1.5 * PI).abs() < TOL);
    }

    #[test]
    fn test_phase_difference() {
        assert!((phase_difference(0.1, 0.0) - 0.1).abs() < TOL);
        assert!((phase_difference(0.0, 0.1) - (-0.1)).abs() < TOL);

        // Wrap around
        let diff = phase_difference(0.1, 2.0 * PI - 0.1);
        assert!((diff - 0.2).abs() < TOL);
    }
}
