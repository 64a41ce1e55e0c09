use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::inference::{rule_outputs, ForwardPass};
use super::membership::MembershipSet;
use super::rules::{RuleBase, RuleGeneration};
use super::FuzzyError;
use crate::checkpoint::{CheckpointError, Checkpointable};
use crate::learner::gradient::{GradientMode, Gradients};
use crate::learner::metrics::BinaryMetrics;
use crate::training::TrainingHistory;

/// Format version written into every persisted fuzzy model.
pub const MODEL_ARTIFACT_VERSION: u32 = 1;

/// Consequent weights start uniform in `[-scale, scale]`.
const CONSEQUENT_INIT_SCALE: f64 = 0.1;

/// Structural hyperparameters of a fuzzy model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub n_inputs: usize,
    pub n_rules: usize,
    pub n_membership_functions: usize,
    pub rule_generation: RuleGeneration,
    pub gradient_mode: GradientMode,
    /// Seed for consequent initialization.
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_inputs: 11,
            n_rules: 7,
            n_membership_functions: 7,
            rule_generation: RuleGeneration::GridPair,
            gradient_mode: GradientMode::RawStrength,
            seed: 42,
        }
    }
}

impl ModelConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Trainable state captured for best-epoch restoration.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParameters {
    pub membership: MembershipSet,
    pub consequents: Array2<f64>,
}

/// Binary ("this class vs rest") Takagi-Sugeno fuzzy classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyModel {
    membership: MembershipSet,
    rules: RuleBase,
    /// `[n_rules, n_inputs + 1]`, bias in the last column.
    consequents: Array2<f64>,
    gradient_mode: GradientMode,
    history: TrainingHistory,
}

impl FuzzyModel {
    /// Grid-initialized memberships and small seeded random consequents.
    pub fn new(config: &ModelConfig) -> Result<Self, FuzzyError> {
        let rules = RuleBase::generate(
            config.rule_generation,
            config.n_inputs,
            config.n_rules,
            config.n_membership_functions,
        )?;
        let membership = MembershipSet::grid(config.n_inputs, config.n_membership_functions);

        let mut rng = StdRng::seed_from_u64(config.seed);
        let consequents = Array2::from_shape_simple_fn((config.n_rules, config.n_inputs + 1), || {
            (rng.gen::<f64>() - 0.5) * 2.0 * CONSEQUENT_INIT_SCALE
        });

        Ok(Self {
            membership,
            rules,
            consequents,
            gradient_mode: config.gradient_mode,
            history: TrainingHistory::new(),
        })
    }

    pub fn n_inputs(&self) -> usize {
        self.membership.n_inputs()
    }

    pub fn n_rules(&self) -> usize {
        self.rules.n_rules()
    }

    pub fn n_membership_functions(&self) -> usize {
        self.membership.n_functions()
    }

    pub fn membership(&self) -> &MembershipSet {
        &self.membership
    }

    pub fn rules(&self) -> &RuleBase {
        &self.rules
    }

    pub fn consequents(&self) -> &Array2<f64> {
        &self.consequents
    }

    pub fn gradient_mode(&self) -> GradientMode {
        self.gradient_mode
    }

    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }

    pub(crate) fn set_history(&mut self, history: TrainingHistory) {
        self.history = history;
    }

    pub fn parameters(&self) -> ModelParameters {
        ModelParameters {
            membership: self.membership.clone(),
            consequents: self.consequents.clone(),
        }
    }

    pub fn restore(&mut self, parameters: ModelParameters) {
        self.membership = parameters.membership;
        self.consequents = parameters.consequents;
    }

    /// One gradient-descent step over every trainable parameter.
    pub(crate) fn update_parameters(&mut self, gradients: &Gradients, learning_rate: f64) {
        self.consequents
            .scaled_add(-learning_rate, &gradients.consequents);
        self.membership
            .descend(&gradients.centers, &gradients.widths, learning_rate);
    }

    fn check_dimension(&self, x: &ArrayView2<f64>) -> Result<(), FuzzyError> {
        if x.ncols() != self.n_inputs() {
            return Err(FuzzyError::DimensionMismatch {
                expected: self.n_inputs(),
                got: x.ncols(),
            });
        }
        Ok(())
    }

    /// Full forward evaluation, keeping every intermediate for backprop.
    pub fn forward(&self, x: ArrayView2<f64>) -> Result<ForwardPass, FuzzyError> {
        self.check_dimension(&x)?;
        let degrees = self.membership.degrees(x);
        let strengths = self.rules.strengths(&degrees);
        let outputs = rule_outputs(x, &self.consequents);
        Ok(ForwardPass::assemble(degrees, strengths, outputs))
    }

    /// Probability that each sample belongs to the positive class.
    pub fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, FuzzyError> {
        Ok(self.forward(x)?.output)
    }

    /// Binary labels, 1 where the probability exceeds 0.5.
    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<u8>, FuzzyError> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| u8::from(p > 0.5)))
    }

    pub fn evaluate(
        &self,
        x: ArrayView2<f64>,
        y: ArrayView1<u8>,
    ) -> Result<BinaryMetrics, FuzzyError> {
        if x.nrows() != y.len() {
            return Err(FuzzyError::LabelCountMismatch {
                samples: x.nrows(),
                labels: y.len(),
            });
        }
        let predictions = self.predict(x)?;
        Ok(BinaryMetrics::compute(predictions.view(), y))
    }

    pub fn to_artifact(&self) -> ModelArtifact {
        ModelArtifact {
            version: MODEL_ARTIFACT_VERSION,
            n_inputs: self.n_inputs(),
            n_rules: self.n_rules(),
            n_membership_functions: self.n_membership_functions(),
            rule_generation: self.rules.generation(),
            gradient_mode: self.gradient_mode,
            antecedents: self.rules.antecedents().clone(),
            centers: self.membership.centers().clone(),
            widths: self.membership.widths().clone(),
            consequents: self.consequents.clone(),
            history: self.history.clone(),
        }
    }

    /// Rebuild a model, checking every table against the declared shape.
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, FuzzyError> {
        let ModelArtifact {
            n_inputs,
            n_rules,
            n_membership_functions,
            rule_generation,
            gradient_mode,
            antecedents,
            centers,
            widths,
            consequents,
            history,
            ..
        } = artifact;

        if centers.dim() != (n_inputs, n_membership_functions) {
            return Err(FuzzyError::invalid_shape(
                "membership",
                format!(
                    "expected ({}, {}), found {:?}",
                    n_inputs,
                    n_membership_functions,
                    centers.dim()
                ),
            ));
        }
        if antecedents.dim() != (n_rules, n_inputs) {
            return Err(FuzzyError::invalid_shape(
                "rules",
                format!("expected ({}, {}), found {:?}", n_rules, n_inputs, antecedents.dim()),
            ));
        }
        if consequents.dim() != (n_rules, n_inputs + 1) {
            return Err(FuzzyError::invalid_shape(
                "consequents",
                format!(
                    "expected ({}, {}), found {:?}",
                    n_rules,
                    n_inputs + 1,
                    consequents.dim()
                ),
            ));
        }

        let membership = MembershipSet::from_parts(centers, widths)?;
        let rules = RuleBase::from_table(antecedents, rule_generation, n_membership_functions)?;

        Ok(Self {
            membership,
            rules,
            consequents,
            gradient_mode,
            history,
        })
    }
}

/// Persisted form of a [`FuzzyModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: u32,
    pub n_inputs: usize,
    pub n_rules: usize,
    pub n_membership_functions: usize,
    pub rule_generation: RuleGeneration,
    pub gradient_mode: GradientMode,
    pub antecedents: Array2<usize>,
    pub centers: Array2<f64>,
    pub widths: Array2<f64>,
    pub consequents: Array2<f64>,
    pub history: TrainingHistory,
}

impl Checkpointable for FuzzyModel {
    fn save_checkpoint<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), CheckpointError> {
        Self::write_snapshot(&self.to_artifact(), path)
    }

    fn load_checkpoint<P: AsRef<std::path::Path>>(path: P) -> Result<Self, CheckpointError> {
        let artifact: ModelArtifact = Self::read_snapshot(path, MODEL_ARTIFACT_VERSION)?;
        FuzzyModel::from_artifact(artifact)
            .map_err(|err| CheckpointError::InvalidFormat(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use uuid::Uuid;

    fn small_config() -> ModelConfig {
        ModelConfig {
            n_inputs: 2,
            n_rules: 4,
            n_membership_functions: 2,
            rule_generation: RuleGeneration::GridPair,
            gradient_mode: GradientMode::RawStrength,
            seed: 7,
        }
    }

    #[test]
    fn consequents_start_small_and_seeded() {
        let a = FuzzyModel::new(&small_config()).unwrap();
        let b = FuzzyModel::new(&small_config()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.consequents().dim(), (4, 3));
        assert!(a.consequents().iter().all(|w| w.abs() <= CONSEQUENT_INIT_SCALE));

        let c = FuzzyModel::new(&small_config().with_seed(8)).unwrap();
        assert_ne!(a.consequents(), c.consequents());
    }

    #[test]
    fn predictions_are_probabilities() {
        let model = FuzzyModel::new(&small_config()).unwrap();
        let x = array![[0.0, 0.0], [0.3, 0.9], [1.0, 1.0]];
        let proba = model.predict_proba(x.view()).unwrap();
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
        let labels = model.predict(x.view()).unwrap();
        for (label, p) in labels.iter().zip(proba.iter()) {
            assert_eq!(*label == 1, *p > 0.5);
        }
    }

    #[test]
    fn wrong_feature_count_is_rejected() {
        let model = FuzzyModel::new(&small_config()).unwrap();
        let err = model.predict_proba(array![[0.1, 0.2, 0.3]].view()).unwrap_err();
        assert_eq!(err, FuzzyError::DimensionMismatch { expected: 2, got: 3 });
    }

    #[test]
    fn restore_replaces_parameters() {
        let mut model = FuzzyModel::new(&small_config()).unwrap();
        let snapshot = model.parameters();
        model.consequents.fill(3.0);
        model.membership.set_center(0, 0, 0.4);
        model.restore(snapshot.clone());
        assert_eq!(model.parameters(), snapshot);
    }

    #[test]
    fn checkpoint_roundtrip_preserves_predictions() {
        let model = FuzzyModel::new(&small_config()).unwrap();
        let path = std::env::temp_dir().join(format!("fuzzy_model_{}.bin", Uuid::new_v4()));
        model.save_checkpoint(&path).unwrap();
        let loaded = FuzzyModel::load_checkpoint(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let x = array![[0.25, 0.75], [0.6, 0.1]];
        assert_eq!(
            model.predict_proba(x.view()).unwrap(),
            loaded.predict_proba(x.view()).unwrap()
        );
        assert_eq!(loaded.rules().generation(), RuleGeneration::GridPair);
        assert_eq!(loaded.gradient_mode(), GradientMode::RawStrength);
    }

    #[test]
    fn full_tuple_table_and_exact_mode_survive_checkpoint() {
        let config = ModelConfig {
            n_inputs: 4,
            n_rules: 6,
            n_membership_functions: 3,
            rule_generation: RuleGeneration::FullTuple { seed: 11 },
            gradient_mode: GradientMode::Exact,
            seed: 2,
        };
        let model = FuzzyModel::new(&config).unwrap();
        let path = std::env::temp_dir().join(format!("full_tuple_{}.bin", Uuid::new_v4()));
        model.save_checkpoint(&path).unwrap();
        let loaded = FuzzyModel::load_checkpoint(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.rules().generation(), RuleGeneration::FullTuple { seed: 11 });
        assert_eq!(loaded.rules().antecedents(), model.rules().antecedents());
        assert_eq!(loaded.gradient_mode(), GradientMode::Exact);
        let x = array![[0.1, 0.5, 0.9, 0.3], [0.7, 0.2, 0.4, 0.8]];
        assert_eq!(
            model.predict_proba(x.view()).unwrap(),
            loaded.predict_proba(x.view()).unwrap()
        );
    }

    #[test]
    fn missing_artifact_is_reported() {
        let path = std::env::temp_dir().join(format!("absent_{}.bin", Uuid::new_v4()));
        let err = FuzzyModel::load_checkpoint(&path).unwrap_err();
        assert!(matches!(err, CheckpointError::ArtifactNotFound(_)));
    }

    #[test]
    fn inconsistent_artifact_is_rejected() {
        let mut artifact = FuzzyModel::new(&small_config()).unwrap().to_artifact();
        artifact.consequents = Array2::zeros((3, 3));
        assert!(FuzzyModel::from_artifact(artifact).is_err());
    }
}
