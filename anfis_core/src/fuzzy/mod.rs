//! Adaptive neuro-fuzzy inference engine.
//!
//! The forward path is split into small stateless stages that mirror the
//! classic ANFIS layers:
//!
//! 1. [`membership`] - Gaussian membership degrees per input and function
//! 2. [`rules`] - rule firing strengths from the antecedent table
//! 3. [`inference`] - Takagi-Sugeno consequents, weighted average, logistic squash
//!
//! [`model::FuzzyModel`] owns the trainable parameters and ties the stages
//! together; training lives in [`crate::learner`].

pub mod inference;
pub mod membership;
pub mod model;
pub mod rules;

use std::fmt;

pub use inference::{combine, rule_outputs, sigmoid, ForwardPass, STRENGTH_EPSILON};
pub use membership::{gaussian, MembershipDegrees, MembershipSet, INITIAL_WIDTH, WIDTH_FLOOR};
pub use model::{
    FuzzyModel, ModelArtifact, ModelConfig, ModelParameters, MODEL_ARTIFACT_VERSION,
};
pub use rules::{RuleBase, RuleGeneration};

/// Errors raised by model construction and inference.
#[derive(Debug, Clone, PartialEq)]
pub enum FuzzyError {
    /// A structural parameter is out of range.
    InvalidShape { parameter: String, reason: String },
    /// The feature batch does not have `n_inputs` columns.
    DimensionMismatch { expected: usize, got: usize },
    /// Feature rows and labels differ in length.
    LabelCountMismatch { samples: usize, labels: usize },
}

impl FuzzyError {
    pub(crate) fn invalid_shape(parameter: &str, reason: impl Into<String>) -> Self {
        FuzzyError::InvalidShape {
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FuzzyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FuzzyError::InvalidShape { parameter, reason } => {
                write!(f, "Invalid model shape for '{}': {}", parameter, reason)
            }
            FuzzyError::DimensionMismatch { expected, got } => write!(
                f,
                "Feature dimension mismatch: model expects {} inputs, got {}",
                expected, got
            ),
            FuzzyError::LabelCountMismatch { samples, labels } => write!(
                f,
                "Label count mismatch: {} samples but {} labels",
                samples, labels
            ),
        }
    }
}

impl std::error::Error for FuzzyError {}
