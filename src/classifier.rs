use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("Failed to read model file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse model file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid model file: {0}")]
    BadModel(String),
    #[error("Missing required feature: {0}")]
    MissingFeature(String),
    #[error("Feature '{0}' must be a number")]
    NonNumericFeature(String),
}

/// Parameters of the pretrained potability classifier, exported to JSON.
///
/// `features` gives the input ordering the model was trained with; samples
/// may arrive with keys in any order and are reassembled to match.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelSpec {
    pub features: Vec<String>,
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
    pub weights: Vec<f64>,
    pub bias: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Potable,
    NotPotable,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Potable => "Potable",
            Label::NotPotable => "Not Potable",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Classification {
    pub label: Label,
    /// `[P(Not Potable), P(Potable)]`, summing to 1.
    pub probabilities: [f64; 2],
}

impl Classification {
    /// Probability of the predicted label, as a percentage.
    pub fn confidence_pct(&self) -> f64 {
        match self.label {
            Label::NotPotable => self.probabilities[0] * 100.0,
            Label::Potable => self.probabilities[1] * 100.0,
        }
    }
}

/// Adapter over the pretrained binary classifier. Stateless after load:
/// the same sample always yields the same classification.
#[derive(Debug, Clone)]
pub struct Classifier {
    spec: ModelSpec,
}

impl Classifier {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let text = fs::read_to_string(path)?;
        let spec: ModelSpec = serde_json::from_str(&text)?;
        Self::from_spec(spec)
    }

    pub fn from_spec(spec: ModelSpec) -> Result<Self, ClassifierError> {
        let n = spec.features.len();
        if n == 0 {
            return Err(ClassifierError::BadModel("empty feature list".to_string()));
        }
        if spec.means.len() != n || spec.scales.len() != n || spec.weights.len() != n {
            return Err(ClassifierError::BadModel(format!(
                "parameter lengths do not match {} features",
                n
            )));
        }
        if spec.scales.iter().any(|s| *s == 0.0 || !s.is_finite()) {
            return Err(ClassifierError::BadModel(
                "scales must be finite and non-zero".to_string(),
            ));
        }
        Ok(Self { spec })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.spec.features
    }

    /// Classify one sample. The sample must carry every feature the model
    /// names, as JSON numbers; extra keys (lat, lon, ...) are ignored.
    #[instrument(skip(self, sample))]
    pub fn classify(&self, sample: &Map<String, Value>) -> Result<Classification, ClassifierError> {
        let mut z = self.spec.bias;
        for (i, name) in self.spec.features.iter().enumerate() {
            let value = sample
                .get(name)
                .ok_or_else(|| ClassifierError::MissingFeature(name.clone()))?;
            let x = value
                .as_f64()
                .ok_or_else(|| ClassifierError::NonNumericFeature(name.clone()))?;
            z += self.spec.weights[i] * (x - self.spec.means[i]) / self.spec.scales[i];
        }

        let p_potable = sigmoid(z);
        let label = if p_potable >= 0.5 {
            Label::Potable
        } else {
            Label::NotPotable
        };
        debug!("Classified sample: {} (p_potable={:.4})", label.as_str(), p_potable);

        Ok(Classification {
            label,
            probabilities: [1.0 - p_potable, p_potable],
        })
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
