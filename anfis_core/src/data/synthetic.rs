//! Deterministic clustered datasets for tests, benchmarks and demos.
//!
//! Each class is a cloud of uniform noise around a center, clipped to the
//! unit hypercube so it can be fed to a grid-initialized model directly.

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::split::LabeledSet;
use super::{DataError, FeatureError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// One center per class; all of the same length.
    pub centers: Vec<Vec<f64>>,
    pub samples_per_class: usize,
    /// Half-width of the uniform noise added to every coordinate.
    pub noise_level: f64,
    pub seed: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            centers: vec![vec![0.2, 0.2], vec![0.8, 0.8]],
            samples_per_class: 50,
            noise_level: 0.1,
            seed: 42,
        }
    }
}

impl ClusterConfig {
    /// Random centers in [0.15, 0.85] for `n_classes` classes of width `n_features`.
    pub fn random_centers(n_classes: usize, n_features: usize, seed: u64) -> Vec<Vec<f64>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n_classes)
            .map(|_| {
                (0..n_features)
                    .map(|_| 0.15 + rng.gen::<f64>() * 0.7)
                    .collect()
            })
            .collect()
    }
}

pub struct ClusterDataset {
    pub set: LabeledSet,
    pub config: ClusterConfig,
}

impl ClusterDataset {
    pub fn generate(config: ClusterConfig) -> Result<Self, DataError> {
        let n_features = config.centers.first().map(Vec::len).unwrap_or(0);
        if n_features == 0 || config.samples_per_class == 0 {
            return Err(DataError::EmptyDataset);
        }
        if let Some(bad) = config.centers.iter().find(|c| c.len() != n_features) {
            return Err(FeatureError::DimensionMismatch {
                expected: n_features,
                got: bad.len(),
            }
            .into());
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let n = config.centers.len() * config.samples_per_class;
        let mut rows: Vec<(Vec<f64>, usize)> = Vec::with_capacity(n);

        for (class, center) in config.centers.iter().enumerate() {
            for _ in 0..config.samples_per_class {
                let row = center
                    .iter()
                    .map(|&c| {
                        let noise = rng.gen::<f64>() * config.noise_level * 2.0 - config.noise_level;
                        (c + noise).clamp(0.0, 1.0)
                    })
                    .collect();
                rows.push((row, class));
            }
        }

        rows.shuffle(&mut rng);

        let mut features = Array2::zeros((n, n_features));
        let mut labels = Array1::zeros(n);
        for (i, (row, class)) in rows.into_iter().enumerate() {
            features.row_mut(i).assign(&Array1::from(row));
            labels[i] = class;
        }

        Ok(Self {
            set: LabeledSet::new(features, labels)?,
            config,
        })
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn into_set(self) -> LabeledSet {
        self.set
    }
}
