//! Fitted harmonic model.
//!
//! A model is the tuple (pulsations, amplitudes, phases, mean). It evaluates
//! as:
//! ```text
//! η(t) = mean + Σᵢ Hᵢ cos(ωᵢt + φᵢ)
//! ```

use thiserror::Error;

use super::wrap_phase;

/// Error type for model construction.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    /// Component arrays differ in length
    #[error(
        "Component length mismatch: {pulsations} pulsations, {amplitudes} amplitudes, {phases} phases"
    )]
    ComponentMismatch {
        pulsations: usize,
        amplitudes: usize,
        phases: usize,
    },

    /// No components at all
    #[error("Model has no components")]
    Empty,

    /// Non-finite component value
    #[error("Non-finite {field} at index {index}")]
    NonFinite { field: &'static str, index: usize },
}

/// Harmonic model: one amplitude/phase pair per pulsation, plus a mean level.
#[derive(Clone, Debug, PartialEq)]
pub struct HarmonicModel {
    pulsations: Vec<f64>,
    amplitudes: Vec<f64>,
    phases: Vec<f64>,
    mean: f64,
}

impl HarmonicModel {
    /// Create a model, checking that all component arrays line up.
    pub fn new(
        pulsations: Vec<f64>,
        amplitudes: Vec<f64>,
        phases: Vec<f64>,
        mean: f64,
    ) -> Result<Self, ModelError> {
        if pulsations.len() != amplitudes.len() || pulsations.len() != phases.len() {
            return Err(ModelError::ComponentMismatch {
                pulsations: pulsations.len(),
                amplitudes: amplitudes.len(),
                phases: phases.len(),
            });
        }
        if pulsations.is_empty() {
            return Err(ModelError::Empty);
        }
        for (field, values) in [
            ("pulsation", &pulsations),
            ("amplitude", &amplitudes),
            ("phase", &phases),
        ] {
            if let Some(index) = values.iter().position(|v| !v.is_finite()) {
                return Err(ModelError::NonFinite { field, index });
            }
        }
        if !mean.is_finite() {
            return Err(ModelError::NonFinite {
                field: "mean",
                index: 0,
            });
        }

        Ok(Self {
            pulsations,
            amplitudes,
            phases,
            mean,
        })
    }

    /// Pulsations in rad/h.
    pub fn pulsations(&self) -> &[f64] {
        &self.pulsations
    }

    /// Amplitudes.
    pub fn amplitudes(&self) -> &[f64] {
        &self.amplitudes
    }

    /// Phases in radians, as fitted (not normalized).
    pub fn phases(&self) -> &[f64] {
        &self.phases
    }

    /// Phases reduced to [0, 2π).
    pub fn wrapped_phases(&self) -> Vec<f64> {
        self.phases.iter().map(|&p| wrap_phase(p)).collect()
    }

    /// Mean level added to every synthesized sample.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.pulsations.len()
    }

    /// Always false for a constructed model; kept for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.pulsations.is_empty()
    }

    /// Evaluate the model at time t (hours).
    #[inline]
    pub fn evaluate(&self, t: f64) -> f64 {
        let mut eta = self.mean;
        for ((&omega, &amplitude), &phase) in self
            .pulsations
            .iter()
            .zip(&self.amplitudes)
            .zip(&self.phases)
        {
            eta += amplitude * (omega * t + phase).cos();
        }
        eta
    }

    /// Index of the zero-frequency component, if any.
    pub fn mean_term_index(&self) -> Option<usize> {
        self.pulsations.iter().position(|&w| w == 0.0)
    }

    /// Fold the zero-frequency component into an absolute mean level.
    ///
    /// The level `mean + H·cos(φ)` becomes that component's amplitude, its
    /// phase becomes 0 and the model mean becomes 0, so evaluation is
    /// unchanged. Returns the absolute level, or `None` when the model has
    /// no zero-frequency component (the model is left as is).
    pub fn fold_mean_term(&mut self) -> Option<f64> {
        let k = self.mean_term_index()?;
        let level = self.mean + self.amplitudes[k] * self.phases[k].cos();
        self.amplitudes[k] = level;
        self.phases[k] = 0.0;
        self.mean = 0.0;
        Some(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const TOL: f64 = 1e-12;

    #[test]
    fn test_component_mismatch() {
        let result = HarmonicModel::new(vec![1.0, 2.0], vec![1.0], vec![0.0, 0.0], 0.0);
        assert_eq!(
            result,
            Err(ModelError::ComponentMismatch {
                pulsations: 2,
                amplitudes: 1,
                phases: 2
            })
        );
    }

    #[test]
    fn test_empty_model() {
        let result = HarmonicModel::new(vec![], vec![], vec![], 0.0);
        assert_eq!(result, Err(ModelError::Empty));
    }

    #[test]
    fn test_non_finite_rejected() {
        let result = HarmonicModel::new(vec![1.0], vec![f64::NAN], vec![0.0], 0.0);
        assert_eq!(
            result,
            Err(ModelError::NonFinite {
                field: "amplitude",
                index: 0
            })
        );
    }

    #[test]
    fn test_evaluate() {
        let model = HarmonicModel::new(vec![PI / 2.0], vec![2.0], vec![0.0], 1.0).unwrap();
        assert!((model.evaluate(0.0) - 3.0).abs() < TOL);
        assert!((model.evaluate(1.0) - 1.0).abs() < TOL);
        assert!((model.evaluate(2.0) - (-1.0)).abs() < TOL);
    }

    #[test]
    fn test_fold_mean_term_preserves_evaluation() {
        let mut model =
            HarmonicModel::new(vec![0.5, 0.0], vec![1.0, 0.3], vec![0.2, PI], 2.0).unwrap();
        let before: Vec<f64> = (0..10).map(|i| model.evaluate(i as f64)).collect();

        let level = model.fold_mean_term().unwrap();
        assert!((level - 1.7).abs() < TOL);
        assert!((model.amplitudes()[1] - 1.7).abs() < TOL);
        assert_eq!(model.phases()[1], 0.0);
        assert_eq!(model.mean(), 0.0);

        for (i, b) in before.iter().enumerate() {
            assert!((model.evaluate(i as f64) - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_fold_without_mean_term() {
        let mut model = HarmonicModel::new(vec![0.5], vec![1.0], vec![0.2], 2.0).unwrap();
        assert_eq!(model.fold_mean_term(), None);
        assert_eq!(model.mean(), 2.0);
    }

    #[test]
    fn test_wrapped_phases() {
        let model = HarmonicModel::new(vec![1.0, 2.0], vec![1.0, 1.0], vec![-PI / 2.0, 7.0], 0.0)
            .unwrap();
        let wrapped = model.wrapped_phases();
        assert!((wrapped[0] - 1.5 * PI).abs() < 1e-10);
        assert!((wrapped[1] - (7.0 - 2.0 * PI)).abs() < 1e-10);
        // Stored phases untouched
        assert_eq!(model.phases()[0], -PI / 2.0);
    }
}
