//! Labeled datasets and the splits built from them.

use std::collections::BTreeMap;

use ndarray::{concatenate, Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::DataError;

/// Feature rows paired with class indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledSet {
    pub features: Array2<f64>,
    pub labels: Array1<usize>,
}

impl LabeledSet {
    pub fn new(features: Array2<f64>, labels: Array1<usize>) -> Result<Self, DataError> {
        if features.nrows() != labels.len() {
            return Err(DataError::LengthMismatch {
                rows: features.nrows(),
                labels: labels.len(),
            });
        }
        Ok(Self { features, labels })
    }

    /// Stack owned rows into one set in a single allocation.
    pub fn from_rows(n_features: usize, rows: &[(Array1<f64>, usize)]) -> Result<Self, DataError> {
        let mut flat = Vec::with_capacity(rows.len() * n_features);
        let mut labels = Vec::with_capacity(rows.len());
        for (row, label) in rows {
            if row.len() != n_features {
                return Err(super::FeatureError::DimensionMismatch {
                    expected: n_features,
                    got: row.len(),
                }
                .into());
            }
            flat.extend(row.iter().copied());
            labels.push(*label);
        }
        let features = Array2::from_shape_vec((rows.len(), n_features), flat).map_err(|_| {
            DataError::LengthMismatch {
                rows: rows.len(),
                labels: labels.len(),
            }
        })?;
        Self::new(features, Array1::from(labels))
    }

    pub fn empty(n_features: usize) -> Self {
        Self {
            features: Array2::zeros((0, n_features)),
            labels: Array1::zeros(0),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            features: self.features.select(Axis(0), indices),
            labels: self.labels.select(Axis(0), indices),
        }
    }

    /// Append rows from `other`; both sets must have the same width.
    pub fn extend(&mut self, other: &LabeledSet) -> Result<(), DataError> {
        if other.is_empty() {
            return Ok(());
        }
        if self.n_features() != other.n_features() && !self.is_empty() {
            return Err(super::FeatureError::DimensionMismatch {
                expected: self.n_features(),
                got: other.n_features(),
            }
            .into());
        }
        if self.is_empty() {
            *self = other.clone();
            return Ok(());
        }

        let features = concatenate(Axis(0), &[self.features.view(), other.features.view()])
            .map_err(|_| DataError::LengthMismatch {
                rows: self.features.nrows() + other.features.nrows(),
                labels: self.len() + other.len(),
            })?;
        let labels = concatenate(Axis(0), &[self.labels.view(), other.labels.view()]).map_err(
            |_| DataError::LengthMismatch {
                rows: features.nrows(),
                labels: self.len() + other.len(),
            },
        )?;
        self.features = features;
        self.labels = labels;
        Ok(())
    }

    pub fn push(&mut self, row: ArrayView1<f64>, label: usize) -> Result<(), DataError> {
        let features = row.to_owned().insert_axis(Axis(0));
        let other = LabeledSet::new(features, Array1::from(vec![label]))?;
        self.extend(&other)
    }

    /// Sample count per class index.
    pub fn class_counts(&self) -> BTreeMap<usize, usize> {
        let mut counts = BTreeMap::new();
        for &label in self.labels.iter() {
            *counts.entry(label).or_insert(0) += 1;
        }
        counts
    }

    /// Row indices grouped by class, in ascending class order.
    fn indices_by_class(&self) -> BTreeMap<usize, Vec<usize>> {
        let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (index, &label) in self.labels.iter().enumerate() {
            groups.entry(label).or_default().push(index);
        }
        groups
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSplit {
    pub train: LabeledSet,
    pub validation: LabeledSet,
    pub test: LabeledSet,
}

fn check_fraction(name: &'static str, value: f64) -> Result<(), DataError> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(DataError::InvalidRatio { name, value })
    }
}

/// Split keeping class proportions; returns `(rest, held_out)`.
///
/// Each class contributes `round(count * fraction)` rows to the held-out side.
pub fn stratified_split(
    set: &LabeledSet,
    fraction: f64,
    seed: u64,
) -> Result<(LabeledSet, LabeledSet), DataError> {
    check_fraction("fraction", fraction)?;
    if set.is_empty() {
        return Err(DataError::EmptyDataset);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut rest = Vec::new();
    let mut held_out = Vec::new();

    for (_, mut indices) in set.indices_by_class() {
        indices.shuffle(&mut rng);
        let take = (indices.len() as f64 * fraction).round() as usize;
        held_out.extend_from_slice(&indices[..take]);
        rest.extend_from_slice(&indices[take..]);
    }

    rest.shuffle(&mut rng);
    held_out.shuffle(&mut rng);
    Ok((set.select(&rest), set.select(&held_out)))
}

/// Stratified train / validation / test split.
///
/// The test share is carved out first; the validation fraction is then taken
/// relative to what remains, so the validation set is `val_fraction` of the
/// whole dataset.
pub fn train_val_test_split(
    set: &LabeledSet,
    val_fraction: f64,
    test_fraction: f64,
    seed: u64,
) -> Result<DatasetSplit, DataError> {
    check_fraction("val_fraction", val_fraction)?;
    check_fraction("test_fraction", test_fraction)?;
    let remaining = 1.0 - test_fraction;
    check_fraction("val_fraction + test_fraction", val_fraction + test_fraction)?;

    let (rest, test) = stratified_split(set, test_fraction, seed)?;
    let (train, validation) = stratified_split(&rest, val_fraction / remaining, seed.wrapping_add(1))?;
    Ok(DatasetSplit {
        train,
        validation,
        test,
    })
}

/// Combine real and synthetic rows so real data makes up `real_ratio` of the result.
///
/// Every real row is kept; `real_len * (1 - r) / r` synthetic rows are drawn
/// at random (fewer if the synthetic set is smaller). `real_ratio == 1.0`
/// returns the real set shuffled.
pub fn mix_hybrid(
    real: &LabeledSet,
    synthetic: &LabeledSet,
    real_ratio: f64,
    seed: u64,
) -> Result<LabeledSet, DataError> {
    if !(real_ratio > 0.0 && real_ratio <= 1.0) {
        return Err(DataError::InvalidRatio {
            name: "real_ratio",
            value: real_ratio,
        });
    }
    if real.is_empty() {
        return Err(DataError::EmptyDataset);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let wanted = (real.len() as f64 * (1.0 - real_ratio) / real_ratio) as usize;
    let mut synthetic_indices: Vec<usize> = (0..synthetic.len()).collect();
    synthetic_indices.shuffle(&mut rng);
    synthetic_indices.truncate(wanted.min(synthetic.len()));

    let mut mixed = real.clone();
    mixed.extend(&synthetic.select(&synthetic_indices))?;

    let mut order: Vec<usize> = (0..mixed.len()).collect();
    order.shuffle(&mut rng);
    Ok(mixed.select(&order))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balanced(per_class: usize, classes: usize) -> LabeledSet {
        let n = per_class * classes;
        let features = Array2::from_shape_fn((n, 2), |(i, j)| (i * 2 + j) as f64);
        let labels = Array1::from_shape_fn(n, |i| i % classes);
        LabeledSet::new(features, labels).unwrap()
    }

    #[test]
    fn stratified_split_keeps_proportions() {
        let set = balanced(20, 3);
        let (rest, held) = stratified_split(&set, 0.25, 7).unwrap();
        assert_eq!(held.len(), 15);
        assert_eq!(rest.len(), 45);
        for (_, count) in held.class_counts() {
            assert_eq!(count, 5);
        }
    }

    #[test]
    fn split_is_seeded() {
        let set = balanced(10, 2);
        let a = stratified_split(&set, 0.3, 1).unwrap();
        let b = stratified_split(&set, 0.3, 1).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn three_way_split_sizes() {
        let set = balanced(40, 2);
        let split = train_val_test_split(&set, 0.2, 0.2, 3).unwrap();
        assert_eq!(split.test.len(), 16);
        assert_eq!(split.validation.len(), 16);
        assert_eq!(split.train.len(), 48);
        assert!(train_val_test_split(&set, 0.6, 0.5, 3).is_err());
    }

    #[test]
    fn hybrid_mix_respects_ratio() {
        let real = balanced(30, 2);
        let synthetic = balanced(50, 2);
        let mixed = mix_hybrid(&real, &synthetic, 0.75, 9).unwrap();
        assert_eq!(mixed.len(), 60 + 20);

        let scarce = balanced(2, 2);
        let mixed = mix_hybrid(&real, &scarce, 0.5, 9).unwrap();
        assert_eq!(mixed.len(), 64);

        assert!(mix_hybrid(&real, &synthetic, 0.0, 9).is_err());
    }

    #[test]
    fn extend_and_push() {
        let mut set = LabeledSet::empty(2);
        set.push(ndarray::array![0.1, 0.2].view(), 1).unwrap();
        set.extend(&balanced(1, 2)).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.labels.to_vec(), vec![1, 0, 1]);
        assert!(set.push(ndarray::array![0.1].view(), 0).is_err());
    }

    #[test]
    fn from_rows_stacks_in_order() {
        let rows = vec![
            (ndarray::array![0.1, 0.2], 1),
            (ndarray::array![0.3, 0.4], 0),
            (ndarray::array![0.5, 0.6], 1),
        ];
        let set = LabeledSet::from_rows(2, &rows).unwrap();
        assert_eq!(set.features, ndarray::array![[0.1, 0.2], [0.3, 0.4], [0.5, 0.6]]);
        assert_eq!(set.labels.to_vec(), vec![1, 0, 1]);

        assert_eq!(LabeledSet::from_rows(2, &[]).unwrap(), LabeledSet::empty(2));
        assert!(LabeledSet::from_rows(3, &rows).is_err());
    }
}
