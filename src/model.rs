use serde::Deserialize;
use std::{fs, io, path::Path};
use thiserror::Error;

use crate::types::FeatureRecord;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("pipeline artifact '{0}' not found")]
    NotFound(String),
    #[error("failed to read pipeline artifact: {0}")]
    Corrupt(String),
    #[error("pipeline artifact incompatible: {0}")]
    Incompatible(String),
}

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("pipeline references unknown feature '{0}'")]
    UnknownFeature(String),
    #[error("value '{value}' for '{feature}' was not seen in training")]
    UnseenCategory { feature: String, value: String },
    #[error("prediction is not a finite number")]
    NotFinite,
}

#[derive(Debug, Deserialize)]
struct CategoricalSpec {
    name: String,
    categories: Vec<String>,
}

// On-disk artifact layout. The declared ordering is the authoritative
// input order: numeric values first, then the one-hot block per
// categorical, each in artifact order.
#[derive(Debug, Deserialize)]
struct PipelineJson {
    model_type: String,
    numeric_features: Vec<String>,
    categorical_features: Vec<CategoricalSpec>,
    coefficients: Vec<f64>,
    intercept: f64,
}

/// A fitted linear regression pipeline: one-hot encoding for the
/// categoricals, then dot product plus intercept. Stateless after load,
/// safe to share behind an `Arc`.
#[derive(Debug)]
pub struct Pipeline {
    numeric_features: Vec<String>,
    categorical_features: Vec<CategoricalSpec>,
    coefficients: Vec<f64>,
    intercept: f64,
}

impl Pipeline {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(LoadError::NotFound(path.display().to_string()))
            }
            Err(e) => return Err(LoadError::Corrupt(e.to_string())),
        };

        let spec: PipelineJson =
            serde_json::from_str(&raw).map_err(|e| LoadError::Corrupt(e.to_string()))?;

        if spec.model_type != "linear_regression" {
            return Err(LoadError::Incompatible(format!(
                "unsupported model_type '{}'",
                spec.model_type
            )));
        }

        // Probe the declared shape before accepting the artifact.
        let in_dim = spec.numeric_features.len()
            + spec
                .categorical_features
                .iter()
                .map(|c| c.categories.len())
                .sum::<usize>();
        if spec.coefficients.len() != in_dim {
            return Err(LoadError::Incompatible(format!(
                "coefficient count {} does not match declared input dim {}",
                spec.coefficients.len(),
                in_dim
            )));
        }

        Ok(Self {
            numeric_features: spec.numeric_features,
            categorical_features: spec.categorical_features,
            coefficients: spec.coefficients,
            intercept: spec.intercept,
        })
    }

    pub fn in_dim(&self) -> usize {
        self.coefficients.len()
    }

    // Map a record -> ordered input vector per the artifact's layout.
    fn vectorize(&self, record: &FeatureRecord) -> Result<Vec<f64>, PredictError> {
        let mut x = Vec::with_capacity(self.coefficients.len());
        for name in &self.numeric_features {
            let v = record
                .numeric(name)
                .ok_or_else(|| PredictError::UnknownFeature(name.clone()))?;
            x.push(v);
        }
        for cat in &self.categorical_features {
            let value = record
                .categorical(&cat.name)
                .ok_or_else(|| PredictError::UnknownFeature(cat.name.clone()))?;
            if !cat.categories.iter().any(|c| c == value) {
                return Err(PredictError::UnseenCategory {
                    feature: cat.name.clone(),
                    value: value.to_string(),
                });
            }
            for c in &cat.categories {
                x.push(if c == value { 1.0 } else { 0.0 });
            }
        }
        Ok(x)
    }

    /// Predicted delivery time in minutes, rounded to 2 decimal places.
    pub fn predict(&self, record: &FeatureRecord) -> Result<f64, PredictError> {
        let x = self.vectorize(record)?;
        let y = self
            .coefficients
            .iter()
            .zip(&x)
            .map(|(w, xi)| w * xi)
            .sum::<f64>()
            + self.intercept;
        if !y.is_finite() {
            return Err(PredictError::NotFinite);
        }
        Ok(round2(y))
    }
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
