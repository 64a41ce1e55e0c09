//! Gaussian membership functions.
//!
//! Every input dimension owns `n_membership_functions` `(center, width)`
//! pairs. Widths are never allowed below [`WIDTH_FLOOR`]: setters clamp, and
//! evaluation reads widths through the floor as well, so a degenerate width
//! can never produce NaN or infinite degrees.

use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use super::FuzzyError;

/// Smallest width a membership function may have.
pub const WIDTH_FLOOR: f64 = 0.01;

/// Width assigned to every function at grid initialization.
pub const INITIAL_WIDTH: f64 = 0.2;

/// Per input: `[samples, n_membership_functions]` degrees.
pub type MembershipDegrees = Vec<Array2<f64>>;

/// Gaussian degree `exp(-0.5 * ((x - center) / width)^2)` with the width floored.
#[inline]
pub fn gaussian(x: f64, center: f64, width: f64) -> f64 {
    let width = floor_width(width);
    let z = (x - center) / width;
    (-0.5 * z * z).exp()
}

#[inline]
fn floor_width(width: f64) -> f64 {
    // NaN.max(floor) is floor
    width.max(WIDTH_FLOOR)
}

/// Membership parameters for all inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipSet {
    /// `[n_inputs, n_membership_functions]`
    centers: Array2<f64>,
    /// `[n_inputs, n_membership_functions]`
    widths: Array2<f64>,
}

impl MembershipSet {
    /// Centers evenly spaced over [0, 1], widths at [`INITIAL_WIDTH`].
    ///
    /// Assumes inputs are already normalized into the unit interval.
    pub fn grid(n_inputs: usize, n_functions: usize) -> Self {
        let spacing = if n_functions > 1 {
            Array1::linspace(0.0, 1.0, n_functions)
        } else {
            Array1::zeros(n_functions)
        };
        let centers = Array2::from_shape_fn((n_inputs, n_functions), |(_, j)| spacing[j]);
        let widths = Array2::from_elem((n_inputs, n_functions), INITIAL_WIDTH);
        Self { centers, widths }
    }

    /// Build from explicit parameters. Widths below the floor are clamped.
    pub fn from_parts(centers: Array2<f64>, widths: Array2<f64>) -> Result<Self, FuzzyError> {
        if centers.dim() != widths.dim() {
            return Err(FuzzyError::invalid_shape(
                "membership",
                format!(
                    "centers {:?} and widths {:?} differ in shape",
                    centers.dim(),
                    widths.dim()
                ),
            ));
        }
        if centers.iter().any(|c| !c.is_finite()) {
            return Err(FuzzyError::invalid_shape(
                "membership",
                "centers must be finite",
            ));
        }
        let widths = widths.mapv(floor_width);
        Ok(Self { centers, widths })
    }

    pub fn n_inputs(&self) -> usize {
        self.centers.nrows()
    }

    pub fn n_functions(&self) -> usize {
        self.centers.ncols()
    }

    pub fn centers(&self) -> &Array2<f64> {
        &self.centers
    }

    pub fn widths(&self) -> &Array2<f64> {
        &self.widths
    }

    pub fn center(&self, input: usize, function: usize) -> f64 {
        self.centers[[input, function]]
    }

    pub fn width(&self, input: usize, function: usize) -> f64 {
        floor_width(self.widths[[input, function]])
    }

    pub fn set_center(&mut self, input: usize, function: usize, center: f64) {
        self.centers[[input, function]] = center;
    }

    /// Set a width, clamping it to [`WIDTH_FLOOR`].
    pub fn set_width(&mut self, input: usize, function: usize, width: f64) {
        self.widths[[input, function]] = floor_width(width);
    }

    /// Gradient step on all parameters; widths are re-floored afterwards.
    pub(crate) fn descend(&mut self, grad_centers: &Array2<f64>, grad_widths: &Array2<f64>, lr: f64) {
        self.centers.scaled_add(-lr, grad_centers);
        self.widths.scaled_add(-lr, grad_widths);
        self.widths.mapv_inplace(floor_width);
    }

    /// Degrees for every input/function pair over a batch.
    ///
    /// The caller guarantees `x` has `n_inputs` columns.
    pub fn degrees(&self, x: ArrayView2<f64>) -> MembershipDegrees {
        let n_samples = x.nrows();
        (0..self.n_inputs())
            .map(|input| {
                let column = x.column(input);
                Array2::from_shape_fn((n_samples, self.n_functions()), |(s, j)| {
                    gaussian(column[s], self.center(input, j), self.width(input, j))
                })
            })
            .collect()
    }
}
