use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;
use crate::error::ServiceError;
use crate::holder::ModelHolder;
use crate::registry::{ModelRegistry, ModelVersion};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub loaded: bool,
    pub version: Option<ModelVersion>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub model_name: String,
    pub version: ModelVersion,
    pub run_id: String,
    pub status: String,
    /// Registry creation time in epoch milliseconds.
    pub creation_timestamp: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub loaded_at: DateTime<Utc>,
}

pub struct HealthReporter {
    holder: Arc<ModelHolder>,
    registry: Arc<dyn ModelRegistry>,
    model_name: String,
}

impl HealthReporter {
    pub fn new(holder: Arc<ModelHolder>, registry: Arc<dyn ModelRegistry>, model_name: impl Into<String>) -> Self {
        Self { holder, registry, model_name: model_name.into() }
    }

    pub fn health(&self) -> HealthStatus {
        let version = self.holder.version();
        HealthStatus { loaded: version.is_some(), version }
    }

    pub async fn info(&self) -> Result<ModelInfo, ServiceError> {
        let model = self.holder.snapshot().ok_or_else(|| ServiceError::ModelUnavailable(self.model_name.clone()))?;
        let meta = self.registry.get_metadata(&self.model_name, model.version()).await.map_err(|e| {
            warn!(model = %self.model_name, version = %model.version(), error = %e, "metadata_lookup_failed");
            ServiceError::MetadataUnavailable(e)
        })?;
        Ok(ModelInfo {
            model_name: self.model_name.clone(),
            version: model.version(),
            run_id: meta.run_id,
            status: meta.status,
            creation_timestamp: meta.created_at,
            created_at: DateTime::<Utc>::from_timestamp_millis(meta.created_at),
            loaded_at: model.loaded_at(),
        })
    }
}
