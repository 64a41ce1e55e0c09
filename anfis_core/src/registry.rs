//! Loaded artifacts for a serving layer.
//!
//! A [`ModelRegistry`] pairs a trained ensemble with the preprocessing it was
//! trained behind and never changes after load. [`SharedRegistry`] lets
//! readers keep using the registry they already hold while a reload swaps in
//! a new one.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, RwLock};

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use tracing::info;

use crate::checkpoint::{CheckpointError, Checkpointable};
use crate::data::{DataError, FeatureMap, Preprocessing};
use crate::ensemble::{EnsembleError, OneVsAllEnsemble};
use crate::learner::MulticlassMetrics;

pub const ENSEMBLE_FILE: &str = "ensemble.bin";
pub const PREPROCESSING_FILE: &str = "preprocessing.bin";

#[derive(Debug)]
pub enum RegistryError {
    Checkpoint(CheckpointError),
    Data(DataError),
    Ensemble(EnsembleError),
    /// Ensemble and preprocessing artifacts disagree.
    Inconsistent(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::Checkpoint(err) => write!(f, "Artifact error: {}", err),
            RegistryError::Data(err) => write!(f, "Input error: {}", err),
            RegistryError::Ensemble(err) => write!(f, "Inference error: {}", err),
            RegistryError::Inconsistent(msg) => write!(f, "Inconsistent artifacts: {}", msg),
        }
    }
}

impl std::error::Error for RegistryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegistryError::Checkpoint(err) => Some(err),
            RegistryError::Data(err) => Some(err),
            RegistryError::Ensemble(err) => Some(err),
            RegistryError::Inconsistent(_) => None,
        }
    }
}

impl From<CheckpointError> for RegistryError {
    fn from(err: CheckpointError) -> Self {
        RegistryError::Checkpoint(err)
    }
}

impl From<DataError> for RegistryError {
    fn from(err: DataError) -> Self {
        RegistryError::Data(err)
    }
}

impl From<EnsembleError> for RegistryError {
    fn from(err: EnsembleError) -> Self {
        RegistryError::Ensemble(err)
    }
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    ensemble: OneVsAllEnsemble,
    preprocessing: Preprocessing,
}

impl ModelRegistry {
    pub fn new(ensemble: OneVsAllEnsemble, preprocessing: Preprocessing) -> Result<Self, RegistryError> {
        if ensemble.labels() != &preprocessing.labels {
            return Err(RegistryError::Inconsistent(format!(
                "ensemble classes {:?} differ from preprocessing classes {:?}",
                ensemble.labels().classes(),
                preprocessing.labels.classes()
            )));
        }
        if ensemble.n_inputs() != preprocessing.schema.len() {
            return Err(RegistryError::Inconsistent(format!(
                "ensemble expects {} inputs, schema has {} features",
                ensemble.n_inputs(),
                preprocessing.schema.len()
            )));
        }
        Ok(Self {
            ensemble,
            preprocessing,
        })
    }

    /// Read `ensemble.bin` and `preprocessing.bin` from `dir`.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self, RegistryError> {
        let dir = dir.as_ref();
        let ensemble = OneVsAllEnsemble::load_checkpoint(dir.join(ENSEMBLE_FILE))?;
        let preprocessing = Preprocessing::load_checkpoint(dir.join(PREPROCESSING_FILE))?;
        let registry = Self::new(ensemble, preprocessing)?;
        info!(
            dir = %dir.display(),
            classes = registry.ensemble.n_classes(),
            "model registry loaded"
        );
        Ok(registry)
    }

    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<(), RegistryError> {
        let dir = dir.as_ref();
        self.ensemble.save_checkpoint(dir.join(ENSEMBLE_FILE))?;
        self.preprocessing.save_checkpoint(dir.join(PREPROCESSING_FILE))?;
        Ok(())
    }

    pub fn ensemble(&self) -> &OneVsAllEnsemble {
        &self.ensemble
    }

    pub fn preprocessing(&self) -> &Preprocessing {
        &self.preprocessing
    }

    pub fn class_names(&self) -> &[String] {
        self.ensemble.labels().classes()
    }

    fn prepare(&self, features: &FeatureMap) -> Result<Array2<f64>, RegistryError> {
        let row = self.preprocessing.prepare(features)?;
        Ok(row.insert_axis(Axis(0)))
    }

    /// Predicted class name for one extracted feature map.
    pub fn predict(&self, features: &FeatureMap) -> Result<String, RegistryError> {
        let x = self.prepare(features)?;
        let mut labels = self.ensemble.predict_labels(x.view())?;
        labels
            .pop()
            .ok_or_else(|| RegistryError::Inconsistent("ensemble returned no prediction".into()))
    }

    pub fn predict_proba(&self, features: &FeatureMap) -> Result<BTreeMap<String, f64>, RegistryError> {
        let x = self.prepare(features)?;
        let mut probs = self.ensemble.predict_named_proba(x.view())?;
        probs
            .pop()
            .ok_or_else(|| RegistryError::Inconsistent("ensemble returned no probabilities".into()))
    }

    /// Evaluate on raw (unnormalized) feature rows in schema order.
    pub fn evaluate(
        &self,
        raw_features: ArrayView2<f64>,
        y: ArrayView1<usize>,
    ) -> Result<MulticlassMetrics, RegistryError> {
        let x = self.preprocessing.transform(raw_features)?;
        Ok(self.ensemble.evaluate(x.view(), y)?)
    }
}

/// Reloadable handle; readers get an `Arc` snapshot.
#[derive(Debug, Clone)]
pub struct SharedRegistry {
    inner: Arc<RwLock<Arc<ModelRegistry>>>,
}

impl SharedRegistry {
    pub fn new(registry: ModelRegistry) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(registry))),
        }
    }

    pub fn current(&self) -> Arc<ModelRegistry> {
        match self.inner.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn swap(&self, registry: ModelRegistry) -> Arc<ModelRegistry> {
        let next = Arc::new(registry);
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, next)
    }

    /// Load from `dir` and swap in; on failure the current registry stays.
    pub fn reload<P: AsRef<Path>>(&self, dir: P) -> Result<(), RegistryError> {
        let registry = ModelRegistry::load(dir)?;
        self.swap(registry);
        Ok(())
    }
}
