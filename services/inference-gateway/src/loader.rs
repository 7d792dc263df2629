//! Cold-start loading: keep asking the registry for the first model until it
//! answers or the attempt budget runs out.

use std::sync::Arc;
use std::time::Duration;
use serving_resilience::{retry_async, Exhausted, RetryPolicy};
use tracing::{info, instrument};
use crate::error::LoadError;
use crate::holder::ActiveModel;
use crate::metrics::METRICS;
use crate::registry::{ModelRegistry, ModelVersion};

#[derive(Clone)]
pub struct ArtifactLoader {
    registry: Arc<dyn ModelRegistry>,
}

impl ArtifactLoader {
    pub fn new(registry: Arc<dyn ModelRegistry>) -> Self { Self { registry } }

    /// Retries "registry down", "nothing published yet" and "fetch failed" alike,
    /// sleeping `retry_delay` between attempts. Returns the last attempt's error
    /// once `max_attempts` is spent.
    #[instrument(skip(self))]
    pub async fn load_initial(&self, model_name: &str, max_attempts: u32, retry_delay: Duration) -> Result<ActiveModel, LoadError> {
        let policy = RetryPolicy::fixed(max_attempts, retry_delay);
        let result = retry_async(&policy, |attempt| {
            info!(attempt, max_attempts = policy.max_attempts, "registry_connect_attempt");
            self.load_latest(model_name)
        }).await;
        match &result {
            Ok(model) => { METRICS.startup_attempts.with_label_values(&["loaded"]).inc(); info!(version = %model.version(), "initial_model_loaded"); }
            Err(_) => METRICS.startup_attempts.with_label_values(&["exhausted"]).inc(),
        }
        result.map_err(Exhausted::into_inner)
    }

    /// One attempt: resolve the latest version, then fetch it.
    pub async fn load_latest(&self, model_name: &str) -> Result<ActiveModel, LoadError> {
        let version = self.latest(model_name).await?;
        info!(%version, "latest_version_found");
        self.fetch_version(model_name, version).await
    }

    pub async fn latest(&self, model_name: &str) -> Result<ModelVersion, LoadError> {
        match self.registry.latest_version(model_name).await {
            Ok(Some(v)) => Ok(v),
            Ok(None) => Err(LoadError::NoVersionPublished(model_name.to_string())),
            Err(e) => Err(LoadError::RegistryUnavailable(e)),
        }
    }

    pub async fn fetch_version(&self, model_name: &str, version: ModelVersion) -> Result<ActiveModel, LoadError> {
        let artifact = self.registry.fetch_artifact(model_name, version).await
            .map_err(|source| LoadError::ArtifactFetchFailed { model: model_name.to_string(), version, source })?;
        Ok(ActiveModel::new(artifact, version))
    }
}
