//! Trained artifacts: the black-box predictors published to the registry.
//!
//! The registry ships a dense feed-forward network as JSON:
//!
//! ```json
//! { "features": ["wine_type", "fixed_acidity"],
//!   "layers": [ { "weights": [[0.1, 0.2]], "bias": [0.0], "activation": "linear" } ] }
//! ```
//!
//! `weights` is `[out][in]`. Shapes are checked once at load time so `predict`
//! only has to check the request width.

use std::fmt;
use serde::{Deserialize, Serialize};
use crate::error::ArtifactError;

pub trait TrainedArtifact: Send + Sync + fmt::Debug {
    fn schema(&self) -> &FeatureSchema;
    fn predict(&self, features: &FeatureVector) -> Result<f64, ArtifactError>;
}

/// Ordered feature names the artifact was trained on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSchema { names: Vec<String> }

impl FeatureSchema {
    pub fn new<I, S>(names: I) -> Self where I: IntoIterator<Item = S>, S: Into<String> {
        Self { names: names.into_iter().map(Into::into).collect() }
    }
    pub fn names(&self) -> &[String] { &self.names }
    pub fn len(&self) -> usize { self.names.len() }
    pub fn is_empty(&self) -> bool { self.names.is_empty() }

    /// Count must always match; names, when the caller sent them, must match in order.
    pub fn validate(&self, features: &FeatureVector) -> Result<(), String> {
        if features.len() != self.len() {
            return Err(format!("expected {} features, got {}", self.len(), features.len()));
        }
        if let Some(names) = features.names() {
            if names.len() != self.len() {
                return Err(format!("expected {} feature names, got {}", self.len(), names.len()));
            }
            if let Some((i, (got, want))) = names.iter().zip(&self.names).enumerate().find(|(_, (g, w))| g != w) {
                return Err(format!("feature {i} is '{got}', model expects '{want}'"));
            }
        }
        if let Some(i) = features.values().iter().position(|v| !v.is_finite()) {
            return Err(format!("feature {i} is not a finite number"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Vec<f64>,
    names: Option<Vec<String>>,
}

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self { Self { values, names: None } }

    /// Names and values are paired positionally; length mismatches surface in
    /// `FeatureSchema::validate`.
    pub fn named(names: Vec<String>, values: Vec<f64>) -> Self { Self { values, names: Some(names) } }

    pub fn values(&self) -> &[f64] { &self.values }
    pub fn names(&self) -> Option<&[String]> { self.names.as_deref() }
    pub fn len(&self) -> usize { self.values.len() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation { #[default] Linear, Relu, Sigmoid, Tanh }

impl Activation {
    fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Linear => x,
            Activation::Relu => x.max(0.0),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Tanh => x.tanh(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
    #[serde(default)]
    pub activation: Activation,
}

impl DenseLayer {
    fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.weights.iter().zip(&self.bias)
            .map(|(row, b)| self.activation.apply(row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + b))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct NetworkDoc { features: Vec<String>, layers: Vec<DenseLayer> }

/// Feed-forward regression network with a single output unit.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseNetwork {
    schema: FeatureSchema,
    layers: Vec<DenseLayer>,
}

impl DenseNetwork {
    pub fn new(schema: FeatureSchema, layers: Vec<DenseLayer>) -> Result<Self, ArtifactError> {
        if schema.is_empty() {
            return Err(ArtifactError::Shape { layer: 0, reason: "feature schema is empty".into() });
        }
        if layers.is_empty() {
            return Err(ArtifactError::Shape { layer: 0, reason: "network has no layers".into() });
        }
        let mut width = schema.len();
        for (i, layer) in layers.iter().enumerate() {
            if layer.weights.is_empty() || layer.weights.len() != layer.bias.len() {
                return Err(ArtifactError::Shape { layer: i, reason: format!("{} weight rows for {} biases", layer.weights.len(), layer.bias.len()) });
            }
            if let Some(row) = layer.weights.iter().find(|r| r.len() != width) {
                return Err(ArtifactError::Shape { layer: i, reason: format!("weight row has {} inputs, expected {width}", row.len()) });
            }
            if layer.weights.iter().flatten().chain(&layer.bias).any(|v| !v.is_finite()) {
                return Err(ArtifactError::Shape { layer: i, reason: "non-finite parameter".into() });
            }
            width = layer.bias.len();
        }
        if width != 1 {
            return Err(ArtifactError::Shape { layer: layers.len() - 1, reason: format!("output width {width}, expected 1") });
        }
        Ok(Self { schema, layers })
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, ArtifactError> {
        let doc: NetworkDoc = serde_json::from_slice(bytes)?;
        Self::new(FeatureSchema::new(doc.features), doc.layers)
    }

    /// Single linear layer: `score = weights · x + bias`.
    pub fn linear(schema: FeatureSchema, weights: Vec<f64>, bias: f64) -> Result<Self, ArtifactError> {
        Self::new(schema, vec![DenseLayer { weights: vec![weights], bias: vec![bias], activation: Activation::Linear }])
    }
}

impl TrainedArtifact for DenseNetwork {
    fn schema(&self) -> &FeatureSchema { &self.schema }

    fn predict(&self, features: &FeatureVector) -> Result<f64, ArtifactError> {
        if features.values().len() != self.schema.len() {
            return Err(ArtifactError::Width { expected: self.schema.len(), got: features.values().len() });
        }
        let out = self.layers.iter().fold(features.values().to_vec(), |acc, layer| layer.forward(&acc));
        match out.first() {
            Some(score) if score.is_finite() => Ok(*score),
            _ => Err(ArtifactError::NonFinite),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(n: usize) -> FeatureSchema { FeatureSchema::new((0..n).map(|i| format!("f{i}"))) }

    #[test]
    fn two_layer_forward_pass() {
        let json = br#"{
            "features": ["a", "b"],
            "layers": [
                { "weights": [[1.0, -1.0], [0.5, 0.5]], "bias": [0.0, 1.0], "activation": "relu" },
                { "weights": [[2.0, 1.0]], "bias": [0.25] }
            ]
        }"#;
        let net = DenseNetwork::from_slice(json).unwrap();
        // hidden = relu([3-1, 0.5*3+0.5*1+1]) = [2, 3]; out = 2*2 + 3 + 0.25
        let score = net.predict(&FeatureVector::new(vec![3.0, 1.0])).unwrap();
        assert!((score - 7.25).abs() < 1e-12);
        // relu clamps the negative branch
        let score = net.predict(&FeatureVector::new(vec![0.0, 2.0])).unwrap();
        assert!((score - 2.25).abs() < 1e-12);
    }

    #[test]
    fn rejects_mismatched_shapes() {
        let bad_input = DenseNetwork::new(schema(3), vec![DenseLayer { weights: vec![vec![1.0, 1.0]], bias: vec![0.0], activation: Activation::Linear }]);
        assert!(matches!(bad_input, Err(ArtifactError::Shape { layer: 0, .. })));
        let two_outputs = DenseNetwork::new(schema(1), vec![DenseLayer { weights: vec![vec![1.0], vec![2.0]], bias: vec![0.0, 0.0], activation: Activation::Relu }]);
        assert!(matches!(two_outputs, Err(ArtifactError::Shape { .. })));
        let bias_mismatch = DenseNetwork::new(schema(1), vec![DenseLayer { weights: vec![vec![1.0]], bias: vec![0.0, 1.0], activation: Activation::Linear }]);
        assert!(bias_mismatch.is_err());
        assert!(DenseNetwork::new(schema(2), vec![]).is_err());
        assert!(matches!(DenseNetwork::from_slice(b"{not json"), Err(ArtifactError::Decode(_))));
    }

    #[test]
    fn predict_checks_width() {
        let net = DenseNetwork::linear(schema(2), vec![1.0, 1.0], 0.0).unwrap();
        let err = net.predict(&FeatureVector::new(vec![1.0])).unwrap_err();
        assert!(matches!(err, ArtifactError::Width { expected: 2, got: 1 }));
    }

    #[test]
    fn schema_validation_reports_first_difference() {
        let s = FeatureSchema::new(["a", "b", "c"]);
        assert!(s.validate(&FeatureVector::new(vec![1.0, 2.0, 3.0])).is_ok());
        let err = s.validate(&FeatureVector::named(vec!["a".into(), "c".into(), "b".into()], vec![1.0, 2.0, 3.0])).unwrap_err();
        assert!(err.contains("feature 1"), "{err}");
        let err = s.validate(&FeatureVector::new(vec![1.0])).unwrap_err();
        assert!(err.contains("expected 3"), "{err}");
        let err = s.validate(&FeatureVector::named(vec!["a".into(), "b".into(), "c".into()], vec![1.0, 2.0])).unwrap_err();
        assert!(err.contains("expected 3 features, got 2"), "{err}");
        let err = s.validate(&FeatureVector::named(vec!["a".into()], vec![1.0, 2.0, 3.0])).unwrap_err();
        assert!(err.contains("feature names"), "{err}");
        assert!(s.validate(&FeatureVector::new(vec![1.0, f64::NAN, 3.0])).is_err());
    }

    #[test]
    fn sigmoid_and_tanh_activations() {
        let net = DenseNetwork::new(schema(1), vec![
            DenseLayer { weights: vec![vec![1.0]], bias: vec![0.0], activation: Activation::Sigmoid },
            DenseLayer { weights: vec![vec![1.0]], bias: vec![0.0], activation: Activation::Tanh },
        ]).unwrap();
        let score = net.predict(&FeatureVector::new(vec![0.0])).unwrap();
        assert!((score - 0.5f64.tanh()).abs() < 1e-12);
    }
}
