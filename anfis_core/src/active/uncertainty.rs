//! Uncertainty sampling and synthetic-target planning.

use std::collections::BTreeSet;

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::controller::ActiveLearningConfig;
use super::ActiveLearningError;
use crate::data::LabelMapping;

/// Rescale a binary probability's distance from 0.5 into [0, 1].
#[inline]
pub fn confidence(probability: f64) -> f64 {
    (probability - 0.5).abs() * 2.0
}

/// A validation sample whose prediction fell below the confidence threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UncertainSample {
    pub index: usize,
    pub true_class: usize,
    pub predicted_class: usize,
    /// Raw one-vs-all score of the predicted class.
    pub probability: f64,
    pub confidence: f64,
}

/// Samples whose confidence is strictly below `threshold`.
///
/// The predicted class is the arg-max of the normalized distribution `probs`
/// (ties pick the lowest class). Confidence is measured on that class's raw
/// one-vs-all score in `raw`, the binary probability the 0.5 pivot refers
/// to. Normalized values would shrink towards `1 / n_classes` as classes are
/// added and mark confident multi-class predictions as uncertain.
pub fn select_uncertain(
    probs: &Array2<f64>,
    raw: &Array2<f64>,
    truth: ArrayView1<usize>,
    threshold: f64,
) -> Vec<UncertainSample> {
    probs
        .rows()
        .into_iter()
        .zip(raw.rows())
        .zip(truth.iter())
        .enumerate()
        .filter_map(|(index, ((row, raw_row), &true_class))| {
            let (predicted_class, _) = row.iter().copied().enumerate().fold(
                (0usize, f64::NEG_INFINITY),
                |best, (class, p)| if p > best.1 { (class, p) } else { best },
            );
            let probability = raw_row[predicted_class];
            let confidence = confidence(probability);
            (confidence < threshold).then_some(UncertainSample {
                index,
                true_class,
                predicted_class,
                probability,
                confidence,
            })
        })
        .collect()
}

/// Configured target classes resolved against a label mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetPolicy {
    pub healthy: usize,
    pub false_negative: Vec<usize>,
    pub low_confidence: Vec<usize>,
    pub low_confidence_margin: f64,
}

impl TargetPolicy {
    /// Unknown target names are dropped with a warning; an empty list falls
    /// back to every non-healthy class. The healthy class must exist.
    pub fn resolve(
        config: &ActiveLearningConfig,
        labels: &LabelMapping,
    ) -> Result<Self, ActiveLearningError> {
        let healthy = labels
            .index_of(&config.healthy_class)
            .ok_or_else(|| ActiveLearningError::UnknownClass(config.healthy_class.clone()))?;

        let defects: Vec<usize> = (0..labels.len()).filter(|&c| c != healthy).collect();
        let resolve_list = |names: &[String]| -> Vec<usize> {
            let mut seen = BTreeSet::new();
            let resolved: Vec<usize> = names
                .iter()
                .filter_map(|name| match labels.index_of(name) {
                    Some(index) if index != healthy => Some(index),
                    Some(_) => None,
                    None => {
                        warn!(class = %name, "configured target class not in label mapping, skipping");
                        None
                    }
                })
                .filter(|&index| seen.insert(index))
                .collect();
            if resolved.is_empty() {
                defects.clone()
            } else {
                resolved
            }
        };

        Ok(Self {
            healthy,
            false_negative: resolve_list(&config.false_negative_targets),
            low_confidence: resolve_list(&config.low_confidence_targets),
            low_confidence_margin: config.low_confidence_margin,
        })
    }
}

/// Classes to request synthetic samples for, ascending and de-duplicated.
///
/// - truly healthy but predicted as a defect: the healthy class
/// - truly a defect but predicted healthy: the false-negative targets
/// - one defect mistaken for another: the true defect class
/// - `|p - 0.5|` under the low-confidence margin: the low-confidence targets
///
/// If nothing matched, healthy plus the first two false-negative targets.
pub fn plan_targets(uncertain: &[UncertainSample], policy: &TargetPolicy) -> Vec<usize> {
    let mut targets = BTreeSet::new();
    let margin = policy.low_confidence_margin;

    for sample in uncertain {
        let truly_healthy = sample.true_class == policy.healthy;
        let predicted_healthy = sample.predicted_class == policy.healthy;

        if truly_healthy && !predicted_healthy {
            targets.insert(policy.healthy);
        } else if !truly_healthy && predicted_healthy {
            targets.extend(policy.false_negative.iter().copied());
        } else if !truly_healthy && sample.predicted_class != sample.true_class {
            targets.insert(sample.true_class);
        }

        if (sample.probability - 0.5).abs() < margin {
            targets.extend(policy.low_confidence.iter().copied());
        }
    }

    if targets.is_empty() {
        targets.insert(policy.healthy);
        targets.extend(policy.false_negative.iter().take(2).copied());
    }
    targets.into_iter().collect()
}

/// Split `total` requests evenly across `targets`, at least one each.
pub fn allocate(targets: &[usize], total: usize) -> Vec<(usize, usize)> {
    if targets.is_empty() {
        return Vec::new();
    }
    let per_target = (total / targets.len()).max(1);
    targets.iter().map(|&class| (class, per_target)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn labels() -> LabelMapping {
        // sorted: anthracnose 0, blight 1, healthy 2, mildew 3, rot 4
        LabelMapping::fit(["healthy", "anthracnose", "blight", "rot", "mildew"]).unwrap()
    }

    fn policy() -> TargetPolicy {
        TargetPolicy::resolve(&ActiveLearningConfig::default(), &labels()).unwrap()
    }

    fn sample(true_class: usize, predicted_class: usize, probability: f64) -> UncertainSample {
        UncertainSample {
            index: 0,
            true_class,
            predicted_class,
            probability,
            confidence: confidence(probability),
        }
    }

    #[test]
    fn confidence_rescales_distance_from_half() {
        assert_eq!(confidence(0.5), 0.0);
        assert_eq!(confidence(1.0), 1.0);
        assert!((confidence(0.15) - 0.7).abs() < 1e-12);
    }

    #[test]
    fn selects_only_below_threshold() {
        let probs = array![[0.95, 0.05], [0.6, 0.4], [0.3, 0.7]];
        let truth = array![0usize, 1, 1];
        let uncertain = select_uncertain(&probs, &probs, truth.view(), 0.7);
        let indices: Vec<usize> = uncertain.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![1, 2]);
        assert_eq!(uncertain[0].predicted_class, 0);
        assert_eq!(uncertain[1].predicted_class, 1);
    }

    #[test]
    fn confidence_reads_the_raw_winning_score() {
        // five classes, clearly separated by the one-vs-all models
        let raw = array![[0.95, 0.3, 0.2, 0.1, 0.1], [0.55, 0.5, 0.45, 0.1, 0.1]];
        let probs = crate::ensemble::normalize_rows(&raw, crate::ensemble::NormalizationPolicy::Sum);
        assert!(probs[[0, 0]] < 0.6);

        let truth = array![0usize, 0];
        let uncertain = select_uncertain(&probs, &raw, truth.view(), 0.7);
        assert_eq!(uncertain.len(), 1);
        assert_eq!(uncertain[0].index, 1);
        assert_eq!(uncertain[0].predicted_class, 0);
        assert_eq!(uncertain[0].probability, 0.55);
    }

    #[test]
    fn duplicate_target_names_resolve_once() {
        let config = ActiveLearningConfig {
            false_negative_targets: vec!["rot".into(), "blight".into(), "rot".into()],
            ..ActiveLearningConfig::default()
        };
        let policy = TargetPolicy::resolve(&config, &labels()).unwrap();
        assert_eq!(policy.false_negative, vec![4, 1]);
    }

    #[test]
    fn unknown_targets_are_skipped() {
        let policy = policy();
        assert_eq!(policy.healthy, 2);
        // "sunscald" and "insect" are absent; only mildew resolves
        assert_eq!(policy.low_confidence, vec![3]);
        assert_eq!(policy.false_negative, vec![0, 1, 4]);
    }

    #[test]
    fn missing_healthy_class_is_an_error() {
        let config = ActiveLearningConfig {
            healthy_class: "pristine".into(),
            ..ActiveLearningConfig::default()
        };
        assert_eq!(
            TargetPolicy::resolve(&config, &labels()).unwrap_err(),
            ActiveLearningError::UnknownClass("pristine".into())
        );
    }

    #[test]
    fn error_patterns_map_to_targets() {
        let policy = policy();
        // false positive, confident enough to skip the low-confidence rule
        assert_eq!(plan_targets(&[sample(2, 4, 0.8)], &policy), vec![2]);
        // false negative
        assert_eq!(plan_targets(&[sample(0, 2, 0.8)], &policy), vec![0, 1, 4]);
        // defect confusion
        assert_eq!(plan_targets(&[sample(4, 1, 0.8)], &policy), vec![4]);
        // correct but low confidence
        assert_eq!(plan_targets(&[sample(1, 1, 0.55)], &policy), vec![3]);
        // correct and outside the margin: fallback
        assert_eq!(plan_targets(&[sample(1, 1, 0.8)], &policy), vec![0, 1, 2]);
    }

    #[test]
    fn allocation_is_even_with_floor_of_one() {
        assert_eq!(allocate(&[1, 3], 50), vec![(1, 25), (3, 25)]);
        assert_eq!(allocate(&[0, 1, 2], 2), vec![(0, 1), (1, 1), (2, 1)]);
        assert!(allocate(&[], 10).is_empty());
    }
}
