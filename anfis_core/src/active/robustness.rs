//! Robustness of a trained ensemble under simulated capture conditions.
//!
//! Perturbations act on normalized feature rows: lighting scales every
//! feature by a factor, rotation by `1 + angle / 90 * 0.1`. Both clip to
//! [0, 1] afterwards.

use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ensemble::{EnsembleError, OneVsAllEnsemble};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Perturbation {
    Lighting { factor: f64 },
    Rotation { angle_degrees: f64 },
}

impl Perturbation {
    pub fn scale(&self) -> f64 {
        match *self {
            Perturbation::Lighting { factor } => factor,
            Perturbation::Rotation { angle_degrees } => 1.0 + angle_degrees / 90.0 * 0.1,
        }
    }

    pub fn apply(&self, x: ArrayView2<f64>) -> Array2<f64> {
        let scale = self.scale();
        x.mapv(|v| (v * scale).clamp(0.0, 1.0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustnessConfig {
    pub lighting_factors: Vec<f64>,
    pub rotation_angles: Vec<f64>,
}

impl Default for RobustnessConfig {
    fn default() -> Self {
        Self {
            lighting_factors: vec![0.5, 0.7, 1.3, 1.5],
            rotation_angles: vec![-15.0, -7.5, 7.5, 15.0],
        }
    }
}

impl RobustnessConfig {
    pub fn perturbations(&self) -> Vec<Perturbation> {
        self.lighting_factors
            .iter()
            .map(|&factor| Perturbation::Lighting { factor })
            .chain(
                self.rotation_angles
                    .iter()
                    .map(|&angle_degrees| Perturbation::Rotation { angle_degrees }),
            )
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerturbationResult {
    pub perturbation: Perturbation,
    pub accuracy: f64,
    pub macro_f1: f64,
    /// Baseline accuracy minus perturbed accuracy.
    pub accuracy_drop: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustnessReport {
    pub baseline_accuracy: f64,
    pub baseline_macro_f1: f64,
    pub results: Vec<PerturbationResult>,
}

impl RobustnessReport {
    pub fn mean_accuracy(&self) -> f64 {
        if self.results.is_empty() {
            return self.baseline_accuracy;
        }
        self.results.iter().map(|r| r.accuracy).sum::<f64>() / self.results.len() as f64
    }

    pub fn worst(&self) -> Option<&PerturbationResult> {
        self.results
            .iter()
            .min_by(|a, b| a.accuracy.total_cmp(&b.accuracy))
    }
}

pub fn evaluate_robustness(
    ensemble: &OneVsAllEnsemble,
    x: ArrayView2<f64>,
    y: ArrayView1<usize>,
    config: &RobustnessConfig,
) -> Result<RobustnessReport, EnsembleError> {
    let baseline = ensemble.evaluate(x, y)?;
    let mut results = Vec::new();
    for perturbation in config.perturbations() {
        let perturbed = perturbation.apply(x);
        let metrics = ensemble.evaluate(perturbed.view(), y)?;
        results.push(PerturbationResult {
            perturbation,
            accuracy: metrics.accuracy,
            macro_f1: metrics.macro_f1(),
            accuracy_drop: baseline.accuracy - metrics.accuracy,
        });
    }

    let report = RobustnessReport {
        baseline_accuracy: baseline.accuracy,
        baseline_macro_f1: baseline.macro_f1(),
        results,
    };
    info!(
        baseline = report.baseline_accuracy,
        mean = report.mean_accuracy(),
        "robustness evaluated"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::LabelMapping;
    use crate::ensemble::NormalizationPolicy;
    use crate::fuzzy::{FuzzyModel, ModelConfig};
    use ndarray::array;

    fn untrained_ensemble() -> OneVsAllEnsemble {
        let config = ModelConfig {
            n_inputs: 2,
            n_rules: 4,
            n_membership_functions: 2,
            ..ModelConfig::default()
        };
        let models = (0..3)
            .map(|class| FuzzyModel::new(&config.with_seed(class)).unwrap())
            .collect();
        let labels = LabelMapping::from_classes(["healthy", "mildew", "rot"]).unwrap();
        OneVsAllEnsemble::from_models(models, labels, NormalizationPolicy::Sum).unwrap()
    }

    #[test]
    fn rotation_scale_is_small() {
        let p = Perturbation::Rotation { angle_degrees: 15.0 };
        assert!((p.scale() - (1.0 + 1.0 / 60.0)).abs() < 1e-12);
        let p = Perturbation::Rotation { angle_degrees: -7.5 };
        assert!(p.scale() < 1.0);
    }

    #[test]
    fn perturbed_values_are_clipped() {
        let x = array![[0.2, 0.8], [0.9, 0.0]];
        let bright = Perturbation::Lighting { factor: 1.5 }.apply(x.view());
        assert!((bright[[0, 0]] - 0.3).abs() < 1e-12);
        assert_eq!(bright[[0, 1]], 1.0);
        assert_eq!(bright[[1, 0]], 1.0);
        let dark = Perturbation::Lighting { factor: 0.5 }.apply(x.view());
        assert_eq!(dark, array![[0.1, 0.4], [0.45, 0.0]]);
    }

    #[test]
    fn default_config_covers_both_kinds() {
        let perturbations = RobustnessConfig::default().perturbations();
        assert_eq!(perturbations.len(), 8);
        assert_eq!(perturbations[0], Perturbation::Lighting { factor: 0.5 });
        assert_eq!(
            perturbations[7],
            Perturbation::Rotation { angle_degrees: 15.0 }
        );
    }

    #[test]
    fn report_compares_each_perturbation_against_baseline() {
        let ensemble = untrained_ensemble();
        let x = array![[0.1, 0.2], [0.4, 0.9], [0.8, 0.3], [0.6, 0.6], [0.95, 0.05]];
        let y = array![0usize, 1, 2, 0, 1];
        let config = RobustnessConfig {
            lighting_factors: vec![1.0, 0.5],
            rotation_angles: vec![15.0],
        };

        let report = evaluate_robustness(&ensemble, x.view(), y.view(), &config).unwrap();
        let baseline = ensemble.evaluate(x.view(), y.view()).unwrap();
        assert_eq!(report.baseline_accuracy, baseline.accuracy);
        assert_eq!(report.baseline_macro_f1, baseline.macro_f1());
        assert_eq!(report.results.len(), 3);

        // unit lighting leaves every row untouched
        assert_eq!(report.results[0].accuracy, baseline.accuracy);
        assert_eq!(report.results[0].accuracy_drop, 0.0);

        for result in &report.results {
            let perturbed = result.perturbation.apply(x.view());
            let metrics = ensemble.evaluate(perturbed.view(), y.view()).unwrap();
            assert_eq!(result.accuracy, metrics.accuracy);
            assert_eq!(result.accuracy_drop, baseline.accuracy - metrics.accuracy);
        }

        let mean = report.results.iter().map(|r| r.accuracy).sum::<f64>() / 3.0;
        assert!((report.mean_accuracy() - mean).abs() < 1e-12);
        let worst = report.worst().unwrap();
        assert!(report.results.iter().all(|r| worst.accuracy <= r.accuracy));
    }

    #[test]
    fn mismatched_labels_are_rejected() {
        let ensemble = untrained_ensemble();
        let x = array![[0.1, 0.2], [0.4, 0.9]];
        let y = array![0usize];
        assert!(evaluate_robustness(&ensemble, x.view(), y.view(), &RobustnessConfig::default())
            .is_err());
    }
}
