//! Companion artifact holding everything needed to turn extractor output into
//! model input: the feature order, the fitted normalizer and the class names.

use std::path::Path;

use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use super::features::{FeatureMap, FeatureSchema};
use super::labels::LabelMapping;
use super::normalizer::{Normalizer, NormalizerKind};
use super::DataError;
use crate::checkpoint::{CheckpointError, Checkpointable};

pub const PREPROCESSING_ARTIFACT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct Preprocessing {
    pub schema: FeatureSchema,
    pub normalizer: Normalizer,
    pub labels: LabelMapping,
}

#[derive(Serialize, Deserialize)]
struct PreprocessingArtifact {
    version: u32,
    schema: FeatureSchema,
    normalizer: Normalizer,
    labels: LabelMapping,
}

impl Preprocessing {
    /// Fit the normalizer on raw training rows laid out in `schema` order.
    pub fn fit(
        schema: FeatureSchema,
        kind: NormalizerKind,
        raw_features: ArrayView2<f64>,
        labels: LabelMapping,
    ) -> Result<Self, DataError> {
        if raw_features.ncols() != schema.len() {
            return Err(super::FeatureError::DimensionMismatch {
                expected: schema.len(),
                got: raw_features.ncols(),
            }
            .into());
        }
        let normalizer = Normalizer::fit(kind, raw_features)?;
        Ok(Self {
            schema,
            normalizer,
            labels,
        })
    }

    pub fn prepare(&self, features: &FeatureMap) -> Result<Array1<f64>, DataError> {
        let row = self.schema.vectorize(features)?;
        self.normalizer.transform_row(row.view())
    }

    pub fn prepare_batch(&self, batch: &[FeatureMap]) -> Result<Array2<f64>, DataError> {
        let raw = self.schema.matrix(batch)?;
        self.normalizer.transform(raw.view())
    }

    pub fn transform(&self, raw_features: ArrayView2<f64>) -> Result<Array2<f64>, DataError> {
        self.normalizer.transform(raw_features)
    }
}

impl Checkpointable for Preprocessing {
    fn save_checkpoint<P: AsRef<Path>>(&self, path: P) -> Result<(), CheckpointError> {
        let artifact = PreprocessingArtifact {
            version: PREPROCESSING_ARTIFACT_VERSION,
            schema: self.schema.clone(),
            normalizer: self.normalizer.clone(),
            labels: self.labels.clone(),
        };
        Self::write_snapshot(&artifact, path)
    }

    fn load_checkpoint<P: AsRef<Path>>(path: P) -> Result<Self, CheckpointError> {
        let artifact: PreprocessingArtifact =
            Self::read_snapshot(path, PREPROCESSING_ARTIFACT_VERSION)?;
        if artifact.normalizer.n_features() != artifact.schema.len() {
            return Err(CheckpointError::InvalidFormat(format!(
                "normalizer covers {} features, schema declares {}",
                artifact.normalizer.n_features(),
                artifact.schema.len()
            )));
        }
        Ok(Self {
            schema: artifact.schema,
            normalizer: artifact.normalizer,
            labels: artifact.labels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use uuid::Uuid;

    fn fitted() -> Preprocessing {
        let schema = FeatureSchema::new(["area", "hue"]).unwrap();
        let raw = array![[100.0, 0.2], [300.0, 0.6]];
        let labels = LabelMapping::fit(["healthy", "rot"]).unwrap();
        Preprocessing::fit(schema, NormalizerKind::MinMax, raw.view(), labels).unwrap()
    }

    #[test]
    fn prepare_uses_schema_order() {
        let pre = fitted();
        let mut map = FeatureMap::new();
        map.insert("hue".into(), 0.4);
        map.insert("area".into(), 200.0);
        let row = pre.prepare(&map).unwrap();
        assert!((row[0] - 0.5).abs() < 1e-12);
        assert!((row[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn checkpoint_roundtrip() {
        let pre = fitted();
        let path = std::env::temp_dir().join(format!("preprocessing_{}.bin", Uuid::new_v4()));
        pre.save_checkpoint(&path).unwrap();
        let loaded = Preprocessing::load_checkpoint(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, pre);
    }

    #[test]
    fn schema_width_must_match() {
        let schema = FeatureSchema::new(["only"]).unwrap();
        let labels = LabelMapping::fit(["a"]).unwrap();
        let raw = array![[1.0, 2.0]];
        assert!(Preprocessing::fit(schema, NormalizerKind::MinMax, raw.view(), labels).is_err());
    }
}
