//! Per-feature scaling fitted on training data.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use super::features::FeatureError;
use super::DataError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NormalizerKind {
    /// Rescale each feature into [0, 1]; the fuzzy grid assumes this range.
    #[default]
    MinMax,
    ZScore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Normalizer {
    MinMax { min: Array1<f64>, max: Array1<f64> },
    ZScore { mean: Array1<f64>, std: Array1<f64> },
}

impl Normalizer {
    pub fn fit(kind: NormalizerKind, x: ArrayView2<f64>) -> Result<Self, DataError> {
        if x.nrows() == 0 {
            return Err(DataError::EmptyDataset);
        }

        Ok(match kind {
            NormalizerKind::MinMax => {
                let min = x.fold_axis(Axis(0), f64::INFINITY, |acc, &v| acc.min(v));
                let max = x.fold_axis(Axis(0), f64::NEG_INFINITY, |acc, &v| acc.max(v));
                Normalizer::MinMax { min, max }
            }
            NormalizerKind::ZScore => {
                let mean = x.mean_axis(Axis(0)).ok_or(DataError::EmptyDataset)?;
                let std = x.std_axis(Axis(0), 0.0);
                Normalizer::ZScore { mean, std }
            }
        })
    }

    pub fn kind(&self) -> NormalizerKind {
        match self {
            Normalizer::MinMax { .. } => NormalizerKind::MinMax,
            Normalizer::ZScore { .. } => NormalizerKind::ZScore,
        }
    }

    pub fn n_features(&self) -> usize {
        match self {
            Normalizer::MinMax { min, .. } => min.len(),
            Normalizer::ZScore { mean, .. } => mean.len(),
        }
    }

    /// Constant features map to 0.0 under min-max and are left centred under z-score.
    pub fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, DataError> {
        if x.ncols() != self.n_features() {
            return Err(FeatureError::DimensionMismatch {
                expected: self.n_features(),
                got: x.ncols(),
            }
            .into());
        }

        let mut out = x.to_owned();
        for mut row in out.rows_mut() {
            self.scale_row(row.view_mut());
        }
        Ok(out)
    }

    pub fn transform_row(&self, row: ArrayView1<f64>) -> Result<Array1<f64>, DataError> {
        if row.len() != self.n_features() {
            return Err(FeatureError::DimensionMismatch {
                expected: self.n_features(),
                got: row.len(),
            }
            .into());
        }
        let mut out = row.to_owned();
        self.scale_row(out.view_mut());
        Ok(out)
    }

    pub fn fit_transform(
        kind: NormalizerKind,
        x: ArrayView2<f64>,
    ) -> Result<(Self, Array2<f64>), DataError> {
        let normalizer = Self::fit(kind, x)?;
        let transformed = normalizer.transform(x)?;
        Ok((normalizer, transformed))
    }

    fn scale_row(&self, mut row: ndarray::ArrayViewMut1<f64>) {
        match self {
            Normalizer::MinMax { min, max } => {
                for ((value, &lo), &hi) in row.iter_mut().zip(min.iter()).zip(max.iter()) {
                    let range = hi - lo;
                    *value = if range > 0.0 { (*value - lo) / range } else { 0.0 };
                }
            }
            Normalizer::ZScore { mean, std } => {
                for ((value, &mu), &sigma) in row.iter_mut().zip(mean.iter()).zip(std.iter()) {
                    let sigma = if sigma > 0.0 { sigma } else { 1.0 };
                    *value = (*value - mu) / sigma;
                }
            }
        }
    }
}
