//! # ANFIS Core
//!
//! A deterministic neuro-fuzzy engine for grading produce from hand-engineered
//! visual features. Binary Takagi-Sugeno fuzzy models are trained by gradient
//! descent, combined into a one-vs-all ensemble, and improved by an
//! active-learning loop that requests synthetic samples where the ensemble is
//! least confident.
//!
//! ## Quick Start
//!
//! ```rust
//! use anfis_core::{
//!     ClusterConfig, ClusterDataset, EnsembleConfig, LabelMapping, ModelConfig,
//!     OneVsAllEnsemble, TrainingConfig,
//! };
//!
//! let data = ClusterDataset::generate(ClusterConfig::default()).unwrap().into_set();
//! let labels = LabelMapping::from_classes(["healthy", "rot"]).unwrap();
//! let config = EnsembleConfig {
//!     model: ModelConfig { n_inputs: 2, n_rules: 4, n_membership_functions: 2, ..ModelConfig::default() },
//!     training: TrainingConfig { max_epochs: 20, learning_rate: 0.5, ..TrainingConfig::default() },
//!     ..EnsembleConfig::default()
//! };
//!
//! let ensemble = OneVsAllEnsemble::train(&config, &labels, &data, &data).unwrap();
//! let metrics = ensemble.evaluate(data.features.view(), data.labels.view()).unwrap();
//! println!("accuracy: {:.3}", metrics.accuracy);
//! ```
//!
//! ## Core Modules
//!
//! - [`fuzzy`] - Membership, rule and inference layers plus the model type
//! - [`learner`] - Loss, gradients, the training loop and metrics
//! - [`ensemble`] - One-vs-all multi-class wrapper
//! - [`active`] - Uncertainty-driven active learning and robustness checks
//! - [`data`] - Feature schema, normalizers, labels and splits
//! - [`registry`] - Loaded artifacts for serving
//! - [`config`] - Pipeline configuration via TOML
//! - [`logging`] - JSON line-delimited run logs

pub mod active;
pub mod checkpoint;
pub mod config;
pub mod data;
pub mod ensemble;
pub mod fuzzy;
pub mod learner;
pub mod logging;
pub mod registry;
pub mod training;

pub use active::{
    evaluate_robustness, ActiveLearner, ActiveLearningConfig, ActiveLearningError,
    ActiveLearningOutcome, ActiveLearningPhase, ActiveLearningReport, ClusterGenerator,
    GeneratorError, IterationRecord, Perturbation, RobustnessConfig, RobustnessReport,
    StopReason, SyntheticGenerator, SyntheticSample,
};
pub use checkpoint::{CheckpointError, Checkpointable};
pub use config::{ConfigError, DataConfig, PipelineConfig};
pub use data::{
    mix_hybrid, stratified_split, train_val_test_split, ClusterConfig, ClusterDataset, DataError,
    DatasetSplit, FeatureError, FeatureMap, FeatureSchema, LabelMapping, LabeledSet, Normalizer,
    NormalizerKind, Preprocessing, ProduceFeatures, FEATURE_NAMES,
};
pub use ensemble::{
    ClassWeighting, EnsembleConfig, EnsembleError, NormalizationPolicy, OneVsAllEnsemble,
};
pub use fuzzy::{FuzzyError, FuzzyModel, ModelConfig, RuleGeneration};
pub use learner::{
    BinaryMetrics, GradientMode, MulticlassMetrics, Trainer, TrainingConfig, TrainingError,
};
pub use logging::RunLogger;
pub use registry::{ModelRegistry, RegistryError, SharedRegistry};
pub use training::{EpochRecord, TrainingHistory};
