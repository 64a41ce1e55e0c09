//! Named feature vectors.
//!
//! The extractor hands over a name → value map. [`FeatureSchema`] fixes the
//! order in which those names become columns; the same schema is persisted
//! with the fitted normalizer and reused at inference time.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Column order of the production feature vector.
pub const FEATURE_NAMES: [&str; 11] = [
    "h_mean",
    "s_mean",
    "v_mean",
    "h_std",
    "s_std",
    "v_std",
    "glcm_contrast",
    "glcm_homogeneity",
    "contour_area",
    "circularity",
    "solidity",
];

/// Raw extractor output.
pub type FeatureMap = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureError {
    MissingFeature(String),
    DuplicateFeature(String),
    NonFinite { name: String, value: f64 },
    EmptySchema,
    DimensionMismatch { expected: usize, got: usize },
}

impl fmt::Display for FeatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureError::MissingFeature(name) => write!(f, "Missing feature '{}'", name),
            FeatureError::DuplicateFeature(name) => {
                write!(f, "Feature '{}' declared more than once", name)
            }
            FeatureError::NonFinite { name, value } => {
                write!(f, "Feature '{}' is not finite: {}", name, value)
            }
            FeatureError::EmptySchema => write!(f, "Feature schema has no names"),
            FeatureError::DimensionMismatch { expected, got } => write!(
                f,
                "Feature vector has {} values, schema declares {}",
                got, expected
            ),
        }
    }
}

impl std::error::Error for FeatureError {}

/// Ordered list of feature names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::produce()
    }
}

impl FeatureSchema {
    pub fn new<I, S>(names: I) -> Result<Self, FeatureError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(FeatureError::EmptySchema);
        }
        let mut seen = HashSet::new();
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(FeatureError::DuplicateFeature(name.clone()));
            }
        }
        Ok(Self { names })
    }

    /// The eleven colour, texture and shape statistics.
    pub fn produce() -> Self {
        Self {
            names: FEATURE_NAMES.iter().map(|name| name.to_string()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Assemble one row in schema order. Extra keys in `map` are ignored.
    pub fn vectorize(&self, map: &FeatureMap) -> Result<Array1<f64>, FeatureError> {
        self.names
            .iter()
            .map(|name| {
                let value = *map
                    .get(name)
                    .ok_or_else(|| FeatureError::MissingFeature(name.clone()))?;
                if !value.is_finite() {
                    return Err(FeatureError::NonFinite {
                        name: name.clone(),
                        value,
                    });
                }
                Ok(value)
            })
            .collect::<Result<Vec<f64>, _>>()
            .map(Array1::from)
    }

    pub fn matrix(&self, maps: &[FeatureMap]) -> Result<Array2<f64>, FeatureError> {
        let mut matrix = Array2::zeros((maps.len(), self.len()));
        for (row, map) in maps.iter().enumerate() {
            matrix.row_mut(row).assign(&self.vectorize(map)?);
        }
        Ok(matrix)
    }

    /// Inverse of [`FeatureSchema::vectorize`].
    pub fn to_map(&self, values: &[f64]) -> Result<FeatureMap, FeatureError> {
        if values.len() != self.len() {
            return Err(FeatureError::DimensionMismatch {
                expected: self.len(),
                got: values.len(),
            });
        }
        Ok(self
            .names
            .iter()
            .cloned()
            .zip(values.iter().copied())
            .collect())
    }
}

/// Strongly typed form of the production feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProduceFeatures {
    pub h_mean: f64,
    pub s_mean: f64,
    pub v_mean: f64,
    pub h_std: f64,
    pub s_std: f64,
    pub v_std: f64,
    pub glcm_contrast: f64,
    pub glcm_homogeneity: f64,
    pub contour_area: f64,
    pub circularity: f64,
    pub solidity: f64,
}

impl ProduceFeatures {
    /// Values in [`FEATURE_NAMES`] order.
    pub fn to_array(&self) -> [f64; 11] {
        [
            self.h_mean,
            self.s_mean,
            self.v_mean,
            self.h_std,
            self.s_std,
            self.v_std,
            self.glcm_contrast,
            self.glcm_homogeneity,
            self.contour_area,
            self.circularity,
            self.solidity,
        ]
    }

    pub fn from_array(values: [f64; 11]) -> Self {
        let [h_mean, s_mean, v_mean, h_std, s_std, v_std, glcm_contrast, glcm_homogeneity, contour_area, circularity, solidity] =
            values;
        Self {
            h_mean,
            s_mean,
            v_mean,
            h_std,
            s_std,
            v_std,
            glcm_contrast,
            glcm_homogeneity,
            contour_area,
            circularity,
            solidity,
        }
    }

    pub fn from_map(map: &FeatureMap) -> Result<Self, FeatureError> {
        let row = FeatureSchema::produce().vectorize(map)?;
        let mut values = [0.0; 11];
        for (slot, value) in values.iter_mut().zip(row.iter()) {
            *slot = *value;
        }
        Ok(Self::from_array(values))
    }

    pub fn to_map(&self) -> FeatureMap {
        FEATURE_NAMES
            .iter()
            .map(|name| name.to_string())
            .zip(self.to_array())
            .collect()
    }
}
