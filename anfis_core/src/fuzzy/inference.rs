//! Takagi-Sugeno consequents and output combination.

use ndarray::{s, Array1, Array2, ArrayView2, Axis};

use super::membership::MembershipDegrees;

/// Replaces a strength sum that is exactly zero (every rule inactive).
pub const STRENGTH_EPSILON: f64 = 1e-10;

/// Numerically stable logistic function.
#[inline]
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Linear rule outputs `weights . x + bias`, `[samples, n_rules]`.
///
/// `consequents` is `[n_rules, n_inputs + 1]` with the bias in the last column.
pub fn rule_outputs(x: ArrayView2<f64>, consequents: &Array2<f64>) -> Array2<f64> {
    let n_inputs = consequents.ncols() - 1;
    let weights = consequents.slice(s![.., ..n_inputs]);
    let bias = consequents.column(n_inputs);
    x.dot(&weights.t()) + &bias
}

/// Per-sample strength sums with an all-zero row replaced by [`STRENGTH_EPSILON`].
pub fn strength_sums(strengths: &Array2<f64>) -> Array1<f64> {
    strengths
        .sum_axis(Axis(1))
        .mapv(|sum| if sum > 0.0 { sum } else { STRENGTH_EPSILON })
}

/// Weighted average of rule outputs squashed into [0, 1].
pub fn combine(strengths: &Array2<f64>, outputs: &Array2<f64>) -> Array1<f64> {
    let sums = strength_sums(strengths);
    let weighted = (strengths * outputs).sum_axis(Axis(1));
    (weighted / sums).mapv(sigmoid)
}

/// Everything the backward pass needs from one forward evaluation.
#[derive(Debug, Clone)]
pub struct ForwardPass {
    pub degrees: MembershipDegrees,
    /// Raw firing strengths, `[samples, n_rules]`.
    pub strengths: Array2<f64>,
    /// Strengths divided by their (floored) per-sample sum.
    pub normalized: Array2<f64>,
    pub rule_outputs: Array2<f64>,
    /// Weighted average before the logistic squash.
    pub combined: Array1<f64>,
    /// Probability of the positive class.
    pub output: Array1<f64>,
}

impl ForwardPass {
    pub(crate) fn assemble(
        degrees: MembershipDegrees,
        strengths: Array2<f64>,
        rule_outputs: Array2<f64>,
    ) -> Self {
        let sums = strength_sums(&strengths);
        let normalized = &strengths / &sums.view().insert_axis(Axis(1));
        let combined = (&normalized * &rule_outputs).sum_axis(Axis(1));
        let output = combined.mapv(sigmoid);
        Self {
            degrees,
            strengths,
            normalized,
            rule_outputs,
            combined,
            output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn sigmoid_is_symmetric_and_bounded() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-15);
        assert!((sigmoid(3.0) + sigmoid(-3.0) - 1.0).abs() < 1e-12);
        assert!(sigmoid(-800.0) >= 0.0);
        assert!(sigmoid(800.0) <= 1.0);
    }

    #[test]
    fn rule_outputs_apply_weights_and_bias() {
        let x = array![[1.0, 2.0], [0.0, 0.5]];
        let consequents = array![[1.0, 1.0, 0.5], [-2.0, 0.0, 1.0]];
        let outputs = rule_outputs(x.view(), &consequents);
        assert_eq!(outputs, array![[3.5, -1.0], [1.0, 1.0]]);
    }

    #[test]
    fn combine_is_weighted_average_through_sigmoid() {
        let strengths = array![[0.5, 0.5], [1.0, 0.0]];
        let outputs = array![[2.0, 0.0], [-1.0, 5.0]];
        let probs = combine(&strengths, &outputs);
        assert!((probs[0] - sigmoid(1.0)).abs() < 1e-12);
        assert!((probs[1] - sigmoid(-1.0)).abs() < 1e-12);
    }

    #[test]
    fn inactive_rules_do_not_divide_by_zero() {
        let strengths = array![[0.0, 0.0]];
        let outputs = array![[4.0, -4.0]];
        let probs = combine(&strengths, &outputs);
        assert_eq!(probs[0], 0.5);
    }

    #[test]
    fn forward_pass_matches_combine() {
        let strengths = array![[0.2, 0.6], [0.0, 0.0]];
        let outputs = array![[1.0, -3.0], [2.0, 2.0]];
        let pass = ForwardPass::assemble(Vec::new(), strengths.clone(), outputs.clone());
        let expected = combine(&strengths, &outputs);
        for (a, b) in pass.output.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
        assert!((pass.normalized[[0, 0]] - 0.25).abs() < 1e-12);
        assert_eq!(pass.normalized[[1, 1]], 0.0);
    }
}
