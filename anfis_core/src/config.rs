//! Pipeline configuration via TOML files.
//!
//! Every section and key is optional; missing values fall back to the
//! defaults of the corresponding config struct. Values are validated when
//! the raw TOML is converted, so a loaded [`PipelineConfig`] is always usable.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::active::{ActiveLearningConfig, RobustnessConfig};
use crate::data::NormalizerKind;
use crate::ensemble::{ClassWeighting, EnsembleConfig, NormalizationPolicy};
use crate::fuzzy::{ModelConfig, RuleGeneration};
use crate::learner::GradientMode;
use crate::learner::TrainingConfig;

/// Full pipeline configuration loaded from a TOML file.
///
/// # Examples
///
/// ```
/// use anfis_core::PipelineConfig;
///
/// let config = PipelineConfig::load_from_file("config/anfis.toml")
///     .unwrap_or_else(|_| PipelineConfig::default());
///
/// println!("{} rules per model", config.ensemble.model.n_rules);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PipelineConfig {
    /// Model structure, training loop, normalization and class weighting.
    pub ensemble: EnsembleConfig,
    pub active_learning: ActiveLearningConfig,
    pub data: DataConfig,
    pub robustness: RobustnessConfig,
}

/// Dataset preparation settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DataConfig {
    pub normalizer: NormalizerKind,
    pub validation_fraction: f64,
    pub test_fraction: f64,
    /// Share of real samples when mixing with synthetic data.
    pub real_ratio: f64,
    pub seed: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            normalizer: NormalizerKind::MinMax,
            validation_fraction: default_validation_fraction(),
            test_fraction: default_test_fraction(),
            real_ratio: default_real_ratio(),
            seed: default_seed(),
        }
    }
}

impl PipelineConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_str(&contents)
    }

    pub fn from_str(toml_str: &str) -> Result<Self, ConfigError> {
        let raw: RawPipelineConfig =
            toml::from_str(toml_str).map_err(|err| ConfigError::Parse(err.to_string()))?;

        let model = model_config(&raw.model)?;
        let training = training_config(&raw.training)?;
        let ensemble = EnsembleConfig {
            model,
            training,
            normalization: normalization_policy(&raw.ensemble.normalization)?,
            class_weighting: class_weighting(&raw.ensemble.class_weighting)?,
        };

        Ok(Self {
            ensemble,
            active_learning: active_learning_config(raw.active_learning)?,
            data: data_config(&raw.data)?,
            robustness: RobustnessConfig {
                lighting_factors: raw.robustness.lighting_factors,
                rotation_angles: raw.robustness.rotation_angles,
            },
        })
    }
}

fn model_config(raw: &RawModel) -> Result<ModelConfig, ConfigError> {
    if raw.n_inputs == 0 {
        return Err(ConfigError::Parse("model.n_inputs must be positive".into()));
    }
    if raw.n_rules == 0 {
        return Err(ConfigError::Parse("model.n_rules must be positive".into()));
    }
    if raw.n_membership_functions == 0 {
        return Err(ConfigError::Parse(
            "model.n_membership_functions must be positive".into(),
        ));
    }
    let rule_generation = match raw.rule_generation.as_str() {
        "grid_pair" => RuleGeneration::GridPair,
        "full_tuple" => RuleGeneration::FullTuple { seed: raw.seed },
        other => {
            return Err(ConfigError::Parse(format!(
                "model.rule_generation must be \"grid_pair\" or \"full_tuple\", got \"{}\"",
                other
            )))
        }
    };
    if rule_generation == RuleGeneration::GridPair
        && raw.n_rules > raw.n_membership_functions * raw.n_membership_functions
    {
        return Err(ConfigError::Parse(format!(
            "model.n_rules ({}) exceeds the {}x{} membership grid",
            raw.n_rules, raw.n_membership_functions, raw.n_membership_functions
        )));
    }
    let gradient_mode = match raw.gradient_mode.as_str() {
        "raw_strength" => GradientMode::RawStrength,
        "exact" => GradientMode::Exact,
        other => {
            return Err(ConfigError::Parse(format!(
                "model.gradient_mode must be \"raw_strength\" or \"exact\", got \"{}\"",
                other
            )))
        }
    };
    Ok(ModelConfig {
        n_inputs: raw.n_inputs,
        n_rules: raw.n_rules,
        n_membership_functions: raw.n_membership_functions,
        rule_generation,
        gradient_mode,
        seed: raw.seed,
    })
}

fn training_config(raw: &RawTraining) -> Result<TrainingConfig, ConfigError> {
    let config = TrainingConfig {
        max_epochs: raw.max_epochs,
        learning_rate: raw.learning_rate,
        patience: raw.patience,
        batch_size: raw.batch_size,
        seed: raw.seed,
    };
    config
        .validate()
        .map_err(|err| ConfigError::Parse(format!("training: {}", err)))?;
    Ok(config)
}

fn normalization_policy(value: &str) -> Result<NormalizationPolicy, ConfigError> {
    match value {
        "sum" => Ok(NormalizationPolicy::Sum),
        "softmax" => Ok(NormalizationPolicy::Softmax),
        other => Err(ConfigError::Parse(format!(
            "ensemble.normalization must be \"sum\" or \"softmax\", got \"{}\"",
            other
        ))),
    }
}

fn class_weighting(value: &str) -> Result<ClassWeighting, ConfigError> {
    match value {
        "uniform" => Ok(ClassWeighting::Uniform),
        "balanced" => Ok(ClassWeighting::Balanced),
        other => Err(ConfigError::Parse(format!(
            "ensemble.class_weighting must be \"uniform\" or \"balanced\", got \"{}\"",
            other
        ))),
    }
}

fn active_learning_config(raw: RawActiveLearning) -> Result<ActiveLearningConfig, ConfigError> {
    let config = ActiveLearningConfig {
        confidence_threshold: raw.confidence_threshold,
        max_iterations: raw.max_iterations,
        samples_per_iteration: raw.samples_per_iteration,
        healthy_class: raw.healthy_class,
        false_negative_targets: raw.false_negative_targets,
        low_confidence_targets: raw.low_confidence_targets,
        low_confidence_margin: raw.low_confidence_margin,
        seed: raw.seed,
    };
    config
        .validate()
        .map_err(|err| ConfigError::Parse(format!("active_learning: {}", err)))?;
    Ok(config)
}

fn data_config(raw: &RawData) -> Result<DataConfig, ConfigError> {
    let normalizer = match raw.normalizer.as_str() {
        "min_max" => NormalizerKind::MinMax,
        "z_score" => NormalizerKind::ZScore,
        other => {
            return Err(ConfigError::Parse(format!(
                "data.normalizer must be \"min_max\" or \"z_score\", got \"{}\"",
                other
            )))
        }
    };
    for (name, value) in [
        ("validation_fraction", raw.validation_fraction),
        ("test_fraction", raw.test_fraction),
    ] {
        if !(value > 0.0 && value < 1.0) {
            return Err(ConfigError::Parse(format!(
                "data.{} must lie in (0, 1), got {}",
                name, value
            )));
        }
    }
    if raw.validation_fraction + raw.test_fraction >= 1.0 {
        return Err(ConfigError::Parse(
            "data.validation_fraction + data.test_fraction must be below 1".into(),
        ));
    }
    if !(raw.real_ratio > 0.0 && raw.real_ratio <= 1.0) {
        return Err(ConfigError::Parse(format!(
            "data.real_ratio must lie in (0, 1], got {}",
            raw.real_ratio
        )));
    }
    Ok(DataConfig {
        normalizer,
        validation_fraction: raw.validation_fraction,
        test_fraction: raw.test_fraction,
        real_ratio: raw.real_ratio,
        seed: raw.seed,
    })
}

#[derive(Debug, Default, Deserialize)]
struct RawPipelineConfig {
    #[serde(default)]
    model: RawModel,
    #[serde(default)]
    training: RawTraining,
    #[serde(default)]
    ensemble: RawEnsemble,
    #[serde(default)]
    active_learning: RawActiveLearning,
    #[serde(default)]
    data: RawData,
    #[serde(default)]
    robustness: RawRobustness,
}

#[derive(Debug, Deserialize)]
struct RawModel {
    #[serde(default = "default_n_inputs")]
    n_inputs: usize,
    #[serde(default = "default_n_rules")]
    n_rules: usize,
    #[serde(default = "default_n_membership_functions")]
    n_membership_functions: usize,
    #[serde(default = "default_rule_generation")]
    rule_generation: String,
    #[serde(default = "default_gradient_mode")]
    gradient_mode: String,
    #[serde(default = "default_seed")]
    seed: u64,
}

impl Default for RawModel {
    fn default() -> Self {
        Self {
            n_inputs: default_n_inputs(),
            n_rules: default_n_rules(),
            n_membership_functions: default_n_membership_functions(),
            rule_generation: default_rule_generation(),
            gradient_mode: default_gradient_mode(),
            seed: default_seed(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawTraining {
    #[serde(default = "default_max_epochs")]
    max_epochs: usize,
    #[serde(default = "default_learning_rate")]
    learning_rate: f64,
    #[serde(default = "default_patience")]
    patience: usize,
    #[serde(default = "default_batch_size")]
    batch_size: usize,
    #[serde(default = "default_seed")]
    seed: u64,
}

impl Default for RawTraining {
    fn default() -> Self {
        Self {
            max_epochs: default_max_epochs(),
            learning_rate: default_learning_rate(),
            patience: default_patience(),
            batch_size: default_batch_size(),
            seed: default_seed(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawEnsemble {
    #[serde(default = "default_normalization")]
    normalization: String,
    #[serde(default = "default_class_weighting")]
    class_weighting: String,
}

impl Default for RawEnsemble {
    fn default() -> Self {
        Self {
            normalization: default_normalization(),
            class_weighting: default_class_weighting(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawActiveLearning {
    #[serde(default = "default_confidence_threshold")]
    confidence_threshold: f64,
    #[serde(default = "default_max_iterations")]
    max_iterations: usize,
    #[serde(default = "default_samples_per_iteration")]
    samples_per_iteration: usize,
    #[serde(default = "default_healthy_class")]
    healthy_class: String,
    #[serde(default = "default_false_negative_targets")]
    false_negative_targets: Vec<String>,
    #[serde(default = "default_low_confidence_targets")]
    low_confidence_targets: Vec<String>,
    #[serde(default = "default_low_confidence_margin")]
    low_confidence_margin: f64,
    #[serde(default = "default_seed")]
    seed: u64,
}

impl Default for RawActiveLearning {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            max_iterations: default_max_iterations(),
            samples_per_iteration: default_samples_per_iteration(),
            healthy_class: default_healthy_class(),
            false_negative_targets: default_false_negative_targets(),
            low_confidence_targets: default_low_confidence_targets(),
            low_confidence_margin: default_low_confidence_margin(),
            seed: default_seed(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawData {
    #[serde(default = "default_normalizer")]
    normalizer: String,
    #[serde(default = "default_validation_fraction")]
    validation_fraction: f64,
    #[serde(default = "default_test_fraction")]
    test_fraction: f64,
    #[serde(default = "default_real_ratio")]
    real_ratio: f64,
    #[serde(default = "default_seed")]
    seed: u64,
}

impl Default for RawData {
    fn default() -> Self {
        Self {
            normalizer: default_normalizer(),
            validation_fraction: default_validation_fraction(),
            test_fraction: default_test_fraction(),
            real_ratio: default_real_ratio(),
            seed: default_seed(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawRobustness {
    #[serde(default = "default_lighting_factors")]
    lighting_factors: Vec<f64>,
    #[serde(default = "default_rotation_angles")]
    rotation_angles: Vec<f64>,
}

impl Default for RawRobustness {
    fn default() -> Self {
        Self {
            lighting_factors: default_lighting_factors(),
            rotation_angles: default_rotation_angles(),
        }
    }
}

fn default_seed() -> u64 {
    42
}

fn default_n_inputs() -> usize {
    ModelConfig::default().n_inputs
}

fn default_n_rules() -> usize {
    ModelConfig::default().n_rules
}

fn default_n_membership_functions() -> usize {
    ModelConfig::default().n_membership_functions
}

fn default_rule_generation() -> String {
    "grid_pair".to_string()
}

fn default_gradient_mode() -> String {
    "raw_strength".to_string()
}

fn default_max_epochs() -> usize {
    TrainingConfig::default().max_epochs
}

fn default_learning_rate() -> f64 {
    TrainingConfig::default().learning_rate
}

fn default_patience() -> usize {
    TrainingConfig::default().patience
}

fn default_batch_size() -> usize {
    TrainingConfig::default().batch_size
}

fn default_normalization() -> String {
    "sum".to_string()
}

fn default_class_weighting() -> String {
    "uniform".to_string()
}

fn default_confidence_threshold() -> f64 {
    ActiveLearningConfig::default().confidence_threshold
}

fn default_max_iterations() -> usize {
    ActiveLearningConfig::default().max_iterations
}

fn default_samples_per_iteration() -> usize {
    ActiveLearningConfig::default().samples_per_iteration
}

fn default_healthy_class() -> String {
    ActiveLearningConfig::default().healthy_class
}

fn default_false_negative_targets() -> Vec<String> {
    ActiveLearningConfig::default().false_negative_targets
}

fn default_low_confidence_targets() -> Vec<String> {
    ActiveLearningConfig::default().low_confidence_targets
}

fn default_low_confidence_margin() -> f64 {
    ActiveLearningConfig::default().low_confidence_margin
}

fn default_normalizer() -> String {
    "min_max".to_string()
}

fn default_validation_fraction() -> f64 {
    0.15
}

fn default_test_fraction() -> f64 {
    0.15
}

fn default_real_ratio() -> f64 {
    0.7
}

fn default_lighting_factors() -> Vec<f64> {
    RobustnessConfig::default().lighting_factors
}

fn default_rotation_angles() -> Vec<f64> {
    RobustnessConfig::default().rotation_angles
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "IO error: {}", err),
            ConfigError::Parse(err) => write!(f, "Parse error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        ConfigError::Io(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = PipelineConfig::from_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.ensemble.normalization, NormalizationPolicy::Sum);
        assert_eq!(config.ensemble.model.rule_generation, RuleGeneration::GridPair);
        assert_eq!(config.ensemble.model.gradient_mode, GradientMode::RawStrength);
    }

    #[test]
    fn parses_custom_values() {
        let toml = r#"
[model]
n_inputs = 2
n_rules = 9
n_membership_functions = 3
rule_generation = "full_tuple"
gradient_mode = "exact"
seed = 7

[training]
learning_rate = 0.5
patience = 5

[ensemble]
normalization = "softmax"
class_weighting = "balanced"

[active_learning]
confidence_threshold = 0.6
healthy_class = "good"
false_negative_targets = ["rot"]

[data]
normalizer = "z_score"
real_ratio = 0.5
"#;
        let config = PipelineConfig::from_str(toml).unwrap();
        assert_eq!(config.ensemble.model.n_rules, 9);
        assert_eq!(
            config.ensemble.model.rule_generation,
            RuleGeneration::FullTuple { seed: 7 }
        );
        assert_eq!(config.ensemble.model.gradient_mode, GradientMode::Exact);
        assert_eq!(config.ensemble.training.patience, 5);
        assert_eq!(config.ensemble.training.max_epochs, 500);
        assert_eq!(config.ensemble.normalization, NormalizationPolicy::Softmax);
        assert_eq!(config.ensemble.class_weighting, ClassWeighting::Balanced);
        assert_eq!(config.active_learning.healthy_class, "good");
        assert_eq!(config.active_learning.false_negative_targets, vec!["rot"]);
        assert_eq!(config.active_learning.max_iterations, 10);
        assert_eq!(config.data.normalizer, NormalizerKind::ZScore);
        assert_eq!(config.data.real_ratio, 0.5);
    }

    #[test]
    fn rejects_oversized_grid() {
        let toml = "[model]\nn_rules = 10\nn_membership_functions = 3";
        assert!(PipelineConfig::from_str(toml).is_err());
    }

    #[test]
    fn rejects_unknown_policy() {
        let toml = "[ensemble]\nnormalization = \"max\"";
        assert!(matches!(
            PipelineConfig::from_str(toml),
            Err(ConfigError::Parse(_))
        ));
        let toml = "[model]\ngradient_mode = \"adam\"";
        assert!(matches!(
            PipelineConfig::from_str(toml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn rejects_invalid_training() {
        assert!(PipelineConfig::from_str("[training]\npatience = 0").is_err());
        assert!(PipelineConfig::from_str("[active_learning]\nmax_iterations = 0").is_err());
    }

    #[test]
    fn shipped_config_parses() {
        let config = PipelineConfig::from_str(include_str!("../config/anfis.toml")).unwrap();
        assert_eq!(config.ensemble.model.n_inputs, 11);
        assert_eq!(config.robustness.lighting_factors.len(), 4);
    }
}
