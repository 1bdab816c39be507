//! Harmonic analysis for tidal time series.
//!
//! Decomposes a water-level record into constituent harmonics using
//! least-squares fitting around a supplied mean level.
//!
//! # Mathematical Background
//!
//! The deviation from the mean is modeled as:
//! ```text
//! η(t) - η₀ = Σᵢ [Aᵢ cos(ωᵢt) + Bᵢ sin(ωᵢt)]
//! ```
//!
//! This is rewritten as a linear least-squares problem:
//! ```text
//! d = X * β  where  β = [A₁, B₁, A₂, B₂, ...]ᵀ
//! ```
//!
//! `X` is solved through its thin SVD. Singular values below the cut-off are
//! dropped, which yields the minimum-norm solution when `X` is rank
//! deficient (duplicate pulsations, or the all-zero sine column of a
//! zero pulsation).
//!
//! After solving, the amplitude and phase are recovered:
//! ```text
//! Hᵢ = √(Aᵢ² + Bᵢ²)
//! φᵢ = atan2(-Bᵢ, Aᵢ)
//! ```
//! so that `Aᵢ cos(ωᵢt) + Bᵢ sin(ωᵢt) = Hᵢ cos(ωᵢt + φᵢ)`.

use faer::Mat;
use thiserror::Error;
use tracing::{debug, warn};

use super::model::{HarmonicModel, ModelError};
use crate::constituents::ConstituentTable;

/// Error type for harmonic fitting.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FitError {
    /// Time and height arrays differ in length
    #[error("Length mismatch: {times} times vs {heights} heights")]
    LengthMismatch { times: usize, heights: usize },

    /// Empty pulsation set
    #[error("No pulsations to fit")]
    NoPulsations,

    /// Negative or non-finite pulsation
    #[error("Invalid pulsation at index {index}: {value}")]
    InvalidPulsation { index: usize, value: f64 },

    /// Non-finite time or height sample
    #[error("Non-finite sample at index {index}")]
    NonFiniteSample { index: usize },

    /// Non-finite mean level
    #[error("Invalid mean level: {0}")]
    InvalidMean(f64),

    /// Fewer samples than independent unknowns
    #[error("Under-determined fit: {samples} samples, need at least {required}")]
    Underdetermined { samples: usize, required: usize },

    /// SVD did not converge
    #[error("Singular value decomposition failed")]
    Decomposition,

    /// Fitted components could not form a model
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Solver options.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FitConfig {
    /// Relative singular value cut-off; `None` uses `ε · max(m, n)`
    pub singular_tolerance: Option<f64>,
}

impl FitConfig {
    /// Set the relative singular value cut-off.
    pub fn with_singular_tolerance(mut self, tolerance: f64) -> Self {
        self.singular_tolerance = Some(tolerance);
        self
    }
}

/// Result of a fit: the model plus solve diagnostics.
#[derive(Clone, Debug)]
pub struct HarmonicFit {
    /// Fitted model (mean is the supplied mean level)
    pub model: HarmonicModel,
    /// Numerical rank of the design matrix
    pub rank: usize,
    /// Rank expected for distinct pulsations
    pub expected_rank: usize,
    /// Ratio of largest to smallest singular value (∞ when singular)
    pub condition_number: f64,
}

impl HarmonicFit {
    /// True when amplitudes/phases are a least-norm choice among many.
    pub fn is_rank_deficient(&self) -> bool {
        self.rank < self.expected_rank
    }
}

/// Harmonic analysis configuration and fitting.
///
/// Performs least-squares fitting of a fixed pulsation set to time series
/// data. The pulsation order fixes the order of the output components.
#[derive(Clone, Debug)]
pub struct HarmonicAnalysis {
    pulsations: Vec<f64>,
    config: FitConfig,
}

impl HarmonicAnalysis {
    /// Create analyzer for the given pulsations (rad/h).
    pub fn new(pulsations: Vec<f64>) -> Self {
        Self {
            pulsations,
            config: FitConfig::default(),
        }
    }

    /// Create analyzer for every constituent of a table, in table order.
    pub fn from_table(table: &ConstituentTable) -> Self {
        Self::new(table.pulsations())
    }

    /// Replace the solver options.
    pub fn with_config(mut self, config: FitConfig) -> Self {
        self.config = config;
        self
    }

    /// Pulsations being analyzed.
    pub fn pulsations(&self) -> &[f64] {
        &self.pulsations
    }

    /// Number of independent unknowns: two per oscillating pulsation, one per zero pulsation.
    pub fn expected_rank(&self) -> usize {
        self.pulsations
            .iter()
            .map(|&w| if w == 0.0 { 1 } else { 2 })
            .sum()
    }

    /// Minimum number of samples for a determined fit: twice the pulsation
    /// count, zero pulsations included.
    ///
    /// This is at least [`expected_rank`](Self::expected_rank), so a record
    /// that could only be interpolated exactly is refused.
    pub fn minimum_samples(&self) -> usize {
        2 * self.pulsations.len()
    }

    /// Build the design matrix `[cos(ω₁t), sin(ω₁t), cos(ω₂t), sin(ω₂t), ...]`.
    pub fn design_matrix(&self, times: &[f64]) -> Mat<f64> {
        let n_cols = 2 * self.pulsations.len();
        let mut a = Mat::<f64>::zeros(times.len(), n_cols);
        for (i, &t) in times.iter().enumerate() {
            for (j, &omega) in self.pulsations.iter().enumerate() {
                let (sin, cos) = (omega * t).sin_cos();
                a[(i, 2 * j)] = cos;
                a[(i, 2 * j + 1)] = sin;
            }
        }
        a
    }

    fn validate(&self, times: &[f64], heights: &[f64], mean: f64) -> Result<(), FitError> {
        if times.len() != heights.len() {
            return Err(FitError::LengthMismatch {
                times: times.len(),
                heights: heights.len(),
            });
        }
        if self.pulsations.is_empty() {
            return Err(FitError::NoPulsations);
        }
        if let Some((index, &value)) = self
            .pulsations
            .iter()
            .enumerate()
            .find(|&(_, w)| !w.is_finite() || *w < 0.0)
        {
            return Err(FitError::InvalidPulsation { index, value });
        }
        if !mean.is_finite() {
            return Err(FitError::InvalidMean(mean));
        }
        if let Some(index) = times
            .iter()
            .zip(heights)
            .position(|(t, h)| !t.is_finite() || !h.is_finite())
        {
            return Err(FitError::NonFiniteSample { index });
        }

        let required = self.minimum_samples();
        if times.len() < required {
            return Err(FitError::Underdetermined {
                samples: times.len(),
                required,
            });
        }
        Ok(())
    }

    /// Fit amplitudes and phases to `heights - mean` at `times` (hours).
    ///
    /// # Errors
    /// - `LengthMismatch` if times and heights differ in length
    /// - `Underdetermined` if there are fewer samples than unknowns
    /// - `NoPulsations` / `InvalidPulsation` for a bad pulsation set
    pub fn fit(&self, times: &[f64], heights: &[f64], mean: f64) -> Result<HarmonicFit, FitError> {
        self.validate(times, heights, mean)?;

        let n_data = times.len();
        let n_cols = 2 * self.pulsations.len();
        let a = self.design_matrix(times);
        let deviation: Vec<f64> = heights.iter().map(|&h| h - mean).collect();

        let svd = a.as_ref().thin_svd().map_err(|_| FitError::Decomposition)?;
        let u = svd.U();
        let v = svd.V();
        let s = svd.S().column_vector();
        let n_sv = s.nrows();

        let mut s_max = 0.0_f64;
        let mut s_min = f64::INFINITY;
        for k in 0..n_sv {
            s_max = s_max.max(s[k]);
            s_min = s_min.min(s[k]);
        }
        let relative = self
            .config
            .singular_tolerance
            .unwrap_or(f64::EPSILON * n_data.max(n_cols) as f64);
        let cutoff = relative * s_max;

        // x = V Σ⁺ Uᵀ d
        let mut x = vec![0.0; n_cols];
        let mut rank = 0;
        for k in 0..n_sv {
            let sigma = s[k];
            if sigma <= cutoff {
                continue;
            }
            rank += 1;
            let mut utd = 0.0;
            for (r, &d) in deviation.iter().enumerate() {
                utd += u[(r, k)] * d;
            }
            let coef = utd / sigma;
            for (c, xc) in x.iter_mut().enumerate() {
                *xc += v[(c, k)] * coef;
            }
        }

        let mut amplitudes = Vec::with_capacity(self.pulsations.len());
        let mut phases = Vec::with_capacity(self.pulsations.len());
        for pair in x.chunks_exact(2) {
            let (a_coef, b_coef) = (pair[0], pair[1]);
            amplitudes.push(a_coef.hypot(b_coef));
            phases.push((-b_coef).atan2(a_coef));
        }

        let condition_number = if s_min > 0.0 {
            s_max / s_min
        } else {
            f64::INFINITY
        };
        let expected_rank = self.expected_rank();

        debug!(
            samples = n_data,
            pulsations = self.pulsations.len(),
            rank,
            condition_number,
            "harmonic fit solved"
        );
        if rank < expected_rank {
            warn!(
                rank,
                expected_rank,
                "design matrix is rank deficient; amplitudes and phases are a least-norm choice"
            );
        }

        let model = HarmonicModel::new(self.pulsations.clone(), amplitudes, phases, mean)?;
        Ok(HarmonicFit {
            model,
            rank,
            expected_rank,
            condition_number,
        })
    }
}
