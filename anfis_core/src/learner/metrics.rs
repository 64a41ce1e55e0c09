//! Evaluation metrics. Any ratio with a zero denominator is reported as 0.0.

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// Metrics for a single "class vs rest" model, positive label 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinaryMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl BinaryMetrics {
    pub fn compute(predictions: ArrayView1<u8>, targets: ArrayView1<u8>) -> Self {
        let (mut tp, mut fp, mut fn_, mut correct) = (0usize, 0usize, 0usize, 0usize);
        for (&p, &t) in predictions.iter().zip(targets.iter()) {
            let (p, t) = (p == 1, t == 1);
            match (p, t) {
                (true, true) => tp += 1,
                (true, false) => fp += 1,
                (false, true) => fn_ += 1,
                (false, false) => {}
            }
            if p == t {
                correct += 1;
            }
        }

        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        Self {
            accuracy: ratio(correct, predictions.len()),
            precision,
            recall,
            f1: f1(precision, recall),
        }
    }
}

/// Counts indexed `[true_class, predicted_class]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    counts: Array2<usize>,
}

impl ConfusionMatrix {
    pub fn new(n_classes: usize) -> Self {
        Self {
            counts: Array2::zeros((n_classes, n_classes)),
        }
    }

    /// Pairs with an index outside `n_classes` are ignored.
    pub fn from_predictions(
        truth: ArrayView1<usize>,
        predicted: ArrayView1<usize>,
        n_classes: usize,
    ) -> Self {
        let mut matrix = Self::new(n_classes);
        for (&t, &p) in truth.iter().zip(predicted.iter()) {
            matrix.record(t, p);
        }
        matrix
    }

    pub fn record(&mut self, truth: usize, predicted: usize) {
        if truth < self.n_classes() && predicted < self.n_classes() {
            self.counts[[truth, predicted]] += 1;
        }
    }

    pub fn n_classes(&self) -> usize {
        self.counts.nrows()
    }

    pub fn get(&self, truth: usize, predicted: usize) -> usize {
        self.counts[[truth, predicted]]
    }

    pub fn counts(&self) -> &Array2<usize> {
        &self.counts
    }

    pub fn total(&self) -> usize {
        self.counts.sum()
    }

    pub fn correct(&self) -> usize {
        self.counts.diag().sum()
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.correct(), self.total())
    }

    /// Samples whose true class is `class`.
    pub fn support(&self, class: usize) -> usize {
        self.counts.row(class).sum()
    }

    /// Samples predicted as `class`.
    pub fn predicted_count(&self, class: usize) -> usize {
        self.counts.column(class).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class precision/recall/F1 with macro and support-weighted averages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub per_class: Vec<ClassMetrics>,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    pub fn from_confusion(matrix: &ConfusionMatrix) -> Self {
        let per_class: Vec<ClassMetrics> = (0..matrix.n_classes())
            .map(|class| {
                let tp = matrix.get(class, class);
                let precision = ratio(tp, matrix.predicted_count(class));
                let recall = ratio(tp, matrix.support(class));
                ClassMetrics {
                    precision,
                    recall,
                    f1: f1(precision, recall),
                    support: matrix.support(class),
                }
            })
            .collect();

        let total = matrix.total();
        let n = per_class.len().max(1) as f64;
        let mean = |field: fn(&ClassMetrics) -> f64| per_class.iter().map(field).sum::<f64>() / n;
        let weighted = |field: fn(&ClassMetrics) -> f64| {
            if total == 0 {
                0.0
            } else {
                per_class
                    .iter()
                    .map(|m| field(m) * m.support as f64)
                    .sum::<f64>()
                    / total as f64
            }
        };

        let macro_avg = ClassMetrics {
            precision: mean(|m| m.precision),
            recall: mean(|m| m.recall),
            f1: mean(|m| m.f1),
            support: total,
        };
        let weighted_avg = ClassMetrics {
            precision: weighted(|m| m.precision),
            recall: weighted(|m| m.recall),
            f1: weighted(|m| m.f1),
            support: total,
        };

        Self {
            per_class,
            macro_avg,
            weighted_avg,
        }
    }
}

/// Everything the ensemble evaluation produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MulticlassMetrics {
    pub accuracy: f64,
    pub report: ClassificationReport,
    pub confusion: ConfusionMatrix,
}

impl MulticlassMetrics {
    pub fn compute(truth: ArrayView1<usize>, predicted: ArrayView1<usize>, n_classes: usize) -> Self {
        let confusion = ConfusionMatrix::from_predictions(truth, predicted, n_classes);
        let report = ClassificationReport::from_confusion(&confusion);
        Self {
            accuracy: confusion.accuracy(),
            report,
            confusion,
        }
    }

    pub fn macro_f1(&self) -> f64 {
        self.report.macro_avg.f1
    }

    pub fn weighted_f1(&self) -> f64 {
        self.report.weighted_avg.f1
    }
}
