//! Backward pass for binary cross-entropy through the fuzzy layers.
//!
//! With `z = sum_r s̄_r f_r` (normalized strengths `s̄`, raw strengths `s`,
//! rule outputs `f`) and `p = sigmoid(z)`, the loss derivative w.r.t. `z` is
//! `p - t`. Two update rules are available, selected by [`GradientMode`]:
//!
//! [`GradientMode::RawStrength`] (default):
//! - consequents: `(p - t) * s_r * [x, 1]`
//! - membership `(i, j)`: `(p - t) * mu_ij` times `(x_i - c)/w²` for the
//!   center and `(x_i - c)²/w³` for the width
//!
//! [`GradientMode::Exact`]:
//! - consequents: `(p - t) * s̄_r * [x, 1]`
//! - membership `(i, j)`: `(p - t) * sum_{r uses (i, j)} s̄_r (f_r - z)` times
//!   the same Gaussian factors
//!
//! Every gradient is averaged over the batch.

use ndarray::{s, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::fuzzy::{FuzzyModel, ForwardPass};

/// Which update rule a model trains with. Persisted with the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GradientMode {
    /// Raw firing strengths for consequents, per-function membership
    /// degrees for the Gaussians. Reproduces reference training histories.
    #[default]
    RawStrength,
    /// True derivative of the loss through the normalized weighted average.
    Exact,
}

/// Loss gradients, shaped like the parameters they update.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    /// `[n_rules, n_inputs + 1]`
    pub consequents: Array2<f64>,
    /// `[n_inputs, n_membership_functions]`
    pub centers: Array2<f64>,
    /// `[n_inputs, n_membership_functions]`
    pub widths: Array2<f64>,
}

impl Gradients {
    /// `pass` must come from `model.forward(x)`. The update rule follows
    /// `model.gradient_mode()`.
    pub fn compute(
        model: &FuzzyModel,
        pass: &ForwardPass,
        x: ArrayView2<f64>,
        targets: ArrayView1<f64>,
    ) -> Self {
        let error = &pass.output - &targets;
        match model.gradient_mode() {
            GradientMode::RawStrength => raw_strength(model, pass, x, error.view()),
            GradientMode::Exact => exact(model, pass, x, error.view()),
        }
    }
}

/// Batch mean of `error * weights * [x, 1]`, one row per rule.
fn consequent_gradient(
    weights: &Array2<f64>,
    x: ArrayView2<f64>,
    error: ArrayView1<f64>,
) -> Array2<f64> {
    let n_inputs = x.ncols();
    let scale = 1.0 / x.nrows().max(1) as f64;
    let weighted = weights * &error.insert_axis(Axis(1));

    let mut consequents = Array2::zeros((weights.ncols(), n_inputs + 1));
    consequents
        .slice_mut(s![.., ..n_inputs])
        .assign(&(weighted.t().dot(&x) * scale));
    consequents
        .column_mut(n_inputs)
        .assign(&(weighted.sum_axis(Axis(0)) * scale));
    consequents
}

fn raw_strength(
    model: &FuzzyModel,
    pass: &ForwardPass,
    x: ArrayView2<f64>,
    error: ArrayView1<f64>,
) -> Gradients {
    let scale = 1.0 / x.nrows().max(1) as f64;
    let membership = model.membership();
    let mut centers = Array2::<f64>::zeros((model.n_inputs(), model.n_membership_functions()));
    let mut widths = Array2::zeros(centers.raw_dim());

    for (input, degrees) in pass.degrees.iter().enumerate() {
        let column = x.column(input);
        for function in 0..model.n_membership_functions() {
            let center = membership.center(input, function);
            let width = membership.width(input, function);
            let w2 = width * width;
            let w3 = w2 * width;

            let (mut dc, mut dw) = (0.0, 0.0);
            for (sample, &value) in column.iter().enumerate() {
                let d = error[sample] * degrees[[sample, function]];
                let diff = value - center;
                dc += d * diff / w2;
                dw += d * diff * diff / w3;
            }
            centers[[input, function]] = dc * scale;
            widths[[input, function]] = dw * scale;
        }
    }

    Gradients {
        consequents: consequent_gradient(&pass.strengths, x, error),
        centers,
        widths,
    }
}

fn exact(
    model: &FuzzyModel,
    pass: &ForwardPass,
    x: ArrayView2<f64>,
    error: ArrayView1<f64>,
) -> Gradients {
    let scale = 1.0 / x.nrows().max(1) as f64;
    let weighted = &pass.normalized * &error.insert_axis(Axis(1));
    let spread = &pass.rule_outputs - &pass.combined.view().insert_axis(Axis(1));
    let delta = &weighted * &spread;

    let membership = model.membership();
    let rules = model.rules();
    let mut centers = Array2::<f64>::zeros((model.n_inputs(), model.n_membership_functions()));
    let mut widths = Array2::zeros(centers.raw_dim());

    for input in 0..model.n_inputs() {
        let column = x.column(input);
        for rule in 0..model.n_rules() {
            let function = rules.function_for(rule, input);
            let center = membership.center(input, function);
            let width = membership.width(input, function);
            let w2 = width * width;
            let w3 = w2 * width;

            let (mut dc, mut dw) = (0.0, 0.0);
            for (sample, &value) in column.iter().enumerate() {
                let d = delta[[sample, rule]];
                let diff = value - center;
                dc += d * diff / w2;
                dw += d * diff * diff / w3;
            }

            centers[[input, function]] += dc * scale;
            widths[[input, function]] += dw * scale;
        }
    }

    Gradients {
        consequents: consequent_gradient(&pass.normalized, x, error),
        centers,
        widths,
    }
}
