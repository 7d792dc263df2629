use thiserror::Error;
use crate::registry::ModelVersion;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact decode failed: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("layer {layer}: {reason}")]
    Shape { layer: usize, reason: String },
    #[error("expected {expected} features, got {got}")]
    Width { expected: usize, got: usize },
    #[error("artifact produced a non-finite score")]
    NonFinite,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("registry returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected registry payload: {0}")]
    Decode(String),
    #[error("{0} not found in registry")]
    NotFound(String),
    #[error("invalid registry endpoint '{0}'")]
    InvalidEndpoint(String),
    #[error("unsupported artifact source '{0}'")]
    UnsupportedSource(String),
    #[error("invalid artifact: {0}")]
    InvalidArtifact(#[from] ArtifactError),
    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

/// Failures on the load path: cold start, steady-state refresh and manual reload.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("registry unavailable: {0}")]
    RegistryUnavailable(#[source] RegistryError),
    #[error("no version of model '{0}' published")]
    NoVersionPublished(String),
    #[error("fetching {model}@{version} failed: {source}")]
    ArtifactFetchFailed {
        model: String,
        version: ModelVersion,
        #[source]
        source: RegistryError,
    },
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("model '{0}' not loaded. Please train and register a model first.")]
    ModelUnavailable(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("model metadata unavailable: {0}")]
    MetadataUnavailable(#[source] RegistryError),
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Error)]
#[error("invalid configuration: {0}")]
pub struct InvalidConfig(pub String);
