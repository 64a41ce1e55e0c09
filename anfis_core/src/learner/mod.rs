//! Gradient-descent training for fuzzy models.
//!
//! - [`loss`] - clipped binary cross-entropy and accuracy
//! - [`gradient`] - backward pass through the fuzzy layers
//! - [`training`] - mini-batch loop with early stopping
//! - [`metrics`] - binary and multi-class evaluation

pub mod error;
pub mod gradient;
pub mod loss;
pub mod metrics;
pub mod training;

pub use error::TrainingError;
pub use gradient::{GradientMode, Gradients};
pub use loss::{binary_accuracy, binary_cross_entropy, BCE_EPSILON};
pub use metrics::{
    BinaryMetrics, ClassMetrics, ClassificationReport, ConfusionMatrix, MulticlassMetrics,
};
pub use training::{Trainer, TrainingConfig};
