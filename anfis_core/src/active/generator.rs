//! Boundary to the synthetic-data generator.
//!
//! Image synthesis and feature extraction live outside this crate; the loop
//! only needs feature rows for a requested class. [`ClusterGenerator`] fills
//! that role for tests and demos by sampling around per-class prototypes.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::{Array1, Axis};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::data::LabeledSet;

#[derive(Debug, Clone, PartialEq)]
pub enum GeneratorError {
    /// The generator has no recipe for this class.
    UnsupportedClass { class: usize, name: String },
    Failed(String),
}

impl fmt::Display for GeneratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorError::UnsupportedClass { class, name } => {
                write!(f, "No generator for class {} ('{}')", class, name)
            }
            GeneratorError::Failed(msg) => write!(f, "Synthetic generation failed: {}", msg),
        }
    }
}

impl std::error::Error for GeneratorError {}

/// Produces feature rows (already in model space) for a target class.
pub trait SyntheticGenerator {
    fn generate(
        &mut self,
        class: usize,
        class_name: &str,
        count: usize,
        rng: &mut StdRng,
    ) -> Result<Vec<Array1<f64>>, GeneratorError>;
}

/// A generated row with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticSample {
    pub id: Uuid,
    pub class_index: usize,
    pub features: Array1<f64>,
    pub is_synthetic: bool,
}

impl SyntheticSample {
    pub fn new(class_index: usize, features: Array1<f64>) -> Self {
        Self {
            id: Uuid::new_v4(),
            class_index,
            features,
            is_synthetic: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Prototype {
    mean: Array1<f64>,
    spread: Array1<f64>,
}

/// Samples uniformly within `mean ± spread` per class, clipped to [0, 1].
#[derive(Debug, Clone, Default)]
pub struct ClusterGenerator {
    prototypes: BTreeMap<usize, Prototype>,
}

/// Spread floor so a class with identical rows still yields variation.
const MIN_SPREAD: f64 = 0.02;

impl ClusterGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prototype(mut self, class: usize, mean: Array1<f64>, spread: Array1<f64>) -> Self {
        self.prototypes.insert(class, Prototype { mean, spread });
        self
    }

    /// Per-class mean and standard deviation of an existing set.
    pub fn fit(set: &LabeledSet) -> Self {
        let mut generator = Self::new();
        for class in set.class_counts().into_keys() {
            let indices: Vec<usize> = set
                .labels
                .iter()
                .enumerate()
                .filter(|(_, &label)| label == class)
                .map(|(i, _)| i)
                .collect();
            let rows = set.features.select(Axis(0), &indices);
            if let Some(mean) = rows.mean_axis(Axis(0)) {
                let spread = rows.std_axis(Axis(0), 0.0).mapv(|s| s.max(MIN_SPREAD));
                generator.prototypes.insert(class, Prototype { mean, spread });
            }
        }
        generator
    }

    pub fn supports(&self, class: usize) -> bool {
        self.prototypes.contains_key(&class)
    }
}

impl SyntheticGenerator for ClusterGenerator {
    fn generate(
        &mut self,
        class: usize,
        class_name: &str,
        count: usize,
        rng: &mut StdRng,
    ) -> Result<Vec<Array1<f64>>, GeneratorError> {
        let prototype = self
            .prototypes
            .get(&class)
            .ok_or_else(|| GeneratorError::UnsupportedClass {
                class,
                name: class_name.to_string(),
            })?;

        Ok((0..count)
            .map(|_| {
                Array1::from_shape_fn(prototype.mean.len(), |i| {
                    let noise = (rng.gen::<f64>() * 2.0 - 1.0) * prototype.spread[i];
                    (prototype.mean[i] + noise).clamp(0.0, 1.0)
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    #[test]
    fn fit_learns_class_prototypes() {
        let set = LabeledSet::new(
            array![[0.1, 0.1], [0.2, 0.1], [0.9, 0.8], [0.8, 0.8]],
            array![0, 0, 1, 1],
        )
        .unwrap();
        let mut generator = ClusterGenerator::fit(&set);
        assert!(generator.supports(0) && generator.supports(1));
        assert!(!generator.supports(2));

        let mut rng = StdRng::seed_from_u64(1);
        let rows = generator.generate(1, "rot", 20, &mut rng).unwrap();
        assert_eq!(rows.len(), 20);
        for row in rows {
            assert!(row[0] > 0.7 && row[0] <= 0.95 + 1e-12);
            assert!((row[1] - 0.8).abs() <= MIN_SPREAD + 1e-12);
        }
    }

    #[test]
    fn unknown_class_is_an_error() {
        let mut generator = ClusterGenerator::new();
        let mut rng = StdRng::seed_from_u64(1);
        let err = generator.generate(4, "mildew", 3, &mut rng).unwrap_err();
        assert_eq!(
            err,
            GeneratorError::UnsupportedClass {
                class: 4,
                name: "mildew".into()
            }
        );
    }

    #[test]
    fn samples_are_tagged_synthetic() {
        let sample = SyntheticSample::new(2, array![0.5, 0.5]);
        assert!(sample.is_synthetic);
        assert_ne!(sample.id, SyntheticSample::new(2, array![0.5, 0.5]).id);
    }
}
