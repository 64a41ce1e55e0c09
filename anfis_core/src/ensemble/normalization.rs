use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Row sums at or below this fall back to a uniform distribution.
const SUM_EPSILON: f64 = 1e-15;

/// How per-class probabilities become a distribution.
///
/// The two policies disagree near ties, so the choice is persisted with the
/// ensemble rather than inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NormalizationPolicy {
    /// Divide by the row sum.
    #[default]
    Sum,
    /// Softmax over the raw probabilities.
    Softmax,
}

/// Normalize every row of `[samples, n_classes]` scores to sum to 1.
pub fn normalize_rows(scores: &Array2<f64>, policy: NormalizationPolicy) -> Array2<f64> {
    let n_classes = scores.ncols();
    let mut out = scores.clone();
    if n_classes == 0 {
        return out;
    }
    let uniform = 1.0 / n_classes as f64;

    for mut row in out.axis_iter_mut(Axis(0)) {
        match policy {
            NormalizationPolicy::Sum => {
                let sum = row.sum();
                if sum > SUM_EPSILON && sum.is_finite() {
                    row /= sum;
                } else {
                    row.fill(uniform);
                }
            }
            NormalizationPolicy::Softmax => {
                let max = row.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
                row.mapv_inplace(|v| (v - max).exp());
                let sum = row.sum();
                if sum > 0.0 && sum.is_finite() {
                    row /= sum;
                } else {
                    row.fill(uniform);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn assert_rows_sum_to_one(probs: &Array2<f64>) {
        for row in probs.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn sum_policy_divides_by_total() {
        let scores = array![[0.2, 0.6, 0.2], [0.9, 0.9, 0.0]];
        let probs = normalize_rows(&scores, NormalizationPolicy::Sum);
        assert_rows_sum_to_one(&probs);
        assert!((probs[[0, 1]] - 0.6).abs() < 1e-12);
        assert!((probs[[1, 0]] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn all_zero_scores_become_uniform() {
        let scores = array![[0.0, 0.0, 0.0, 0.0]];
        for policy in [NormalizationPolicy::Sum, NormalizationPolicy::Softmax] {
            let probs = normalize_rows(&scores, policy);
            assert!(probs.iter().all(|&p| (p - 0.25).abs() < 1e-12));
        }
    }

    #[test]
    fn softmax_keeps_ordering() {
        let scores = array![[0.1, 0.7, 0.3]];
        let probs = normalize_rows(&scores, NormalizationPolicy::Softmax);
        assert_rows_sum_to_one(&probs);
        assert!(probs[[0, 1]] > probs[[0, 2]]);
        assert!(probs[[0, 2]] > probs[[0, 0]]);
    }
}
