//! MLflow model registry over its REST API.
//!
//! Versions come from `model-versions/search`, metadata from `model-versions/get`,
//! and the artifact is the `artifact_file` found under the version's `source`,
//! downloaded through the tracking server's artifact proxy.

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};
use crate::artifact::{DenseNetwork, TrainedArtifact};
use crate::config::RegistryConfig;
use crate::error::RegistryError;
use super::{ModelMetadata, ModelRegistry, ModelVersion};

const SEARCH_PATH: &str = "api/2.0/mlflow/model-versions/search";
const GET_PATH: &str = "api/2.0/mlflow/model-versions/get";
const ARTIFACTS_PATH: &str = "api/2.0/mlflow-artifacts/artifacts/";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    model_versions: Vec<MlflowModelVersion>,
}

#[derive(Debug, Deserialize)]
struct GetResponse { model_version: MlflowModelVersion }

#[derive(Debug, Deserialize)]
struct MlflowModelVersion {
    version: String,
    #[serde(default)]
    run_id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    creation_timestamp: i64,
    #[serde(default)]
    source: String,
}

#[derive(Debug, Clone)]
pub struct MlflowRegistry {
    client: Client,
    base: Url,
    artifact_file: String,
}

impl MlflowRegistry {
    pub fn new(cfg: &RegistryConfig) -> Result<Self, RegistryError> {
        let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
        Self::with_client(client, &cfg.url, &cfg.artifact_file)
    }

    pub fn with_client(client: Client, base_url: &str, artifact_file: &str) -> Result<Self, RegistryError> {
        // a trailing slash keeps `join` from dropping the last path segment of the base
        let normalized = if base_url.ends_with('/') { base_url.to_string() } else { format!("{base_url}/") };
        let base = Url::parse(&normalized).map_err(|_| RegistryError::InvalidEndpoint(base_url.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") { return Err(RegistryError::InvalidEndpoint(base_url.to_string())); }
        Ok(Self { client, base, artifact_file: artifact_file.trim_matches('/').to_string() })
    }

    fn endpoint(&self, path: &str) -> Result<Url, RegistryError> {
        self.base.join(path).map_err(|_| RegistryError::InvalidEndpoint(format!("{}{path}", self.base)))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<T, RegistryError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND { return Err(RegistryError::NotFound(what.to_string())); }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RegistryError::Status { status: status.as_u16(), body });
        }
        resp.json::<T>().await.map_err(|e| RegistryError::Decode(e.to_string()))
    }

    async fn model_version(&self, model: &str, version: ModelVersion) -> Result<MlflowModelVersion, RegistryError> {
        let mut url = self.endpoint(GET_PATH)?;
        url.query_pairs_mut().append_pair("name", model).append_pair("version", &version.to_string());
        let resp: GetResponse = self.get_json(url, &format!("{model}@{version}")).await?;
        Ok(resp.model_version)
    }

    /// Maps a version's `source` to a download URL for the artifact file.
    fn artifact_url(&self, source: &str) -> Result<Url, RegistryError> {
        let file = &self.artifact_file;
        if let Some(path) = source.strip_prefix("mlflow-artifacts:") {
            let path = path.trim_start_matches('/').trim_end_matches('/');
            if path.is_empty() { return Err(RegistryError::UnsupportedSource(source.to_string())); }
            return self.endpoint(&format!("{ARTIFACTS_PATH}{path}/{file}"));
        }
        if source.starts_with("http://") || source.starts_with("https://") {
            return Url::parse(&format!("{}/{file}", source.trim_end_matches('/')))
                .map_err(|_| RegistryError::UnsupportedSource(source.to_string()));
        }
        Err(RegistryError::UnsupportedSource(source.to_string()))
    }
}

#[async_trait]
impl ModelRegistry for MlflowRegistry {
    #[instrument(skip(self))]
    async fn latest_version(&self, model: &str) -> Result<Option<ModelVersion>, RegistryError> {
        let mut url = self.endpoint(SEARCH_PATH)?;
        url.query_pairs_mut().append_pair("filter", &format!("name='{model}'"));
        let resp: SearchResponse = self.get_json(url, model).await?;
        let mut latest: Option<ModelVersion> = None;
        for mv in &resp.model_versions {
            let v: ModelVersion = mv.version.parse()?;
            latest = latest.max(Some(v));
        }
        debug!(versions = resp.model_versions.len(), latest = ?latest, "registry_search");
        Ok(latest)
    }

    #[instrument(skip(self))]
    async fn fetch_artifact(&self, model: &str, version: ModelVersion) -> Result<Arc<dyn TrainedArtifact>, RegistryError> {
        let mv = self.model_version(model, version).await?;
        let url = self.artifact_url(&mv.source)?;
        debug!(%url, "artifact_download");
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND { return Err(RegistryError::NotFound(format!("{model}@{version}/{}", self.artifact_file))); }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RegistryError::Status { status: status.as_u16(), body });
        }
        let bytes = resp.bytes().await?;
        let network = DenseNetwork::from_slice(&bytes)?;
        Ok(Arc::new(network))
    }

    #[instrument(skip(self))]
    async fn get_metadata(&self, model: &str, version: ModelVersion) -> Result<ModelMetadata, RegistryError> {
        let mv = self.model_version(model, version).await?;
        Ok(ModelMetadata { run_id: mv.run_id, status: mv.status, created_at: mv.creation_timestamp })
    }
}
