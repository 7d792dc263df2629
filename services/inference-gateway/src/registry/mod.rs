//! Model registry interface: the external system of record mapping a model name to
//! an ordered set of versions, each with an artifact and metadata.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::artifact::TrainedArtifact;
use crate::error::RegistryError;

pub mod memory;
pub mod mlflow;

pub use memory::InMemoryRegistry;
pub use mlflow::MlflowRegistry;

/// Registry-assigned version number; higher is newer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelVersion(pub u64);

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl FromStr for ModelVersion {
    type Err = RegistryError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(ModelVersion).map_err(|_| RegistryError::Decode(format!("version '{s}' is not an integer")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub run_id: String,
    pub status: String,
    /// Milliseconds since the Unix epoch, as reported by the registry.
    pub created_at: i64,
}

#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Highest published version, `None` when the model has no versions yet.
    async fn latest_version(&self, model: &str) -> Result<Option<ModelVersion>, RegistryError>;
    async fn fetch_artifact(&self, model: &str, version: ModelVersion) -> Result<Arc<dyn TrainedArtifact>, RegistryError>;
    async fn get_metadata(&self, model: &str, version: ModelVersion) -> Result<ModelMetadata, RegistryError>;
}
