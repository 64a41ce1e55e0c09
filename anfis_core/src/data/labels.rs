use std::collections::BTreeSet;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use super::DataError;

/// Bidirectional class index ↔ class name mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelMapping {
    classes: Vec<String>,
}

impl LabelMapping {
    /// Sorted unique class names, indexed in that order.
    pub fn fit<I, S>(labels: I) -> Result<Self, DataError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let unique: BTreeSet<String> = labels
            .into_iter()
            .map(|label| label.as_ref().to_string())
            .collect();
        if unique.is_empty() {
            return Err(DataError::EmptyDataset);
        }
        Ok(Self {
            classes: unique.into_iter().collect(),
        })
    }

    /// Keep the given order; names must be unique.
    pub fn from_classes<I, S>(classes: I) -> Result<Self, DataError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let classes: Vec<String> = classes.into_iter().map(Into::into).collect();
        if classes.is_empty() {
            return Err(DataError::EmptyDataset);
        }
        let mut seen = BTreeSet::new();
        for class in &classes {
            if !seen.insert(class.as_str()) {
                return Err(DataError::UnknownLabel(format!("duplicate class '{}'", class)));
            }
        }
        Ok(Self { classes })
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.classes.iter().position(|class| class == name)
    }

    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }

    pub fn encode<S: AsRef<str>>(&self, labels: &[S]) -> Result<Array1<usize>, DataError> {
        labels
            .iter()
            .map(|label| {
                let label = label.as_ref();
                self.index_of(label)
                    .ok_or_else(|| DataError::UnknownLabel(label.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Array1::from)
    }

    pub fn decode(&self, indices: &[usize]) -> Result<Vec<String>, DataError> {
        indices
            .iter()
            .map(|&index| {
                self.name_of(index)
                    .map(str::to_string)
                    .ok_or(DataError::UnknownClassIndex(index))
            })
            .collect()
    }
}
