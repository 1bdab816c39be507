//! Harmonic synthesis: evaluate a fitted model at arbitrary times.
//!
//! ```text
//! η(t) = mean + Σᵢ Hᵢ cos(ωᵢt + φᵢ)
//! ```
//!
//! With the `parallel` feature, long query vectors are evaluated with rayon.

use thiserror::Error;

use super::model::{HarmonicModel, ModelError};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Query length above which the parallel path is taken.
#[cfg(feature = "parallel")]
const PARALLEL_THRESHOLD: usize = 4096;

/// Error type for synthesis.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SynthesisError {
    /// No query times
    #[error("Synthesis requested for zero query times")]
    EmptyQuery,

    /// Components do not form a valid model
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Predicted heights at each query time.
pub fn synthesize(times: &[f64], model: &HarmonicModel) -> Result<Vec<f64>, SynthesisError> {
    if times.is_empty() {
        return Err(SynthesisError::EmptyQuery);
    }

    #[cfg(feature = "parallel")]
    {
        if times.len() >= PARALLEL_THRESHOLD {
            return Ok(times.par_iter().map(|&t| model.evaluate(t)).collect());
        }
    }

    Ok(times.iter().map(|&t| model.evaluate(t)).collect())
}

/// Synthesize directly from component arrays.
///
/// # Errors
/// - `Model(ComponentMismatch)` if the three component arrays differ in length
/// - `EmptyQuery` if `times` is empty
pub fn synthesize_components(
    times: &[f64],
    pulsations: &[f64],
    amplitudes: &[f64],
    phases: &[f64],
    mean: f64,
) -> Result<Vec<f64>, SynthesisError> {
    let model = HarmonicModel::new(
        pulsations.to_vec(),
        amplitudes.to_vec(),
        phases.to_vec(),
        mean,
    )?;
    synthesize(times, &model)
}
