//! In-process registry for tests and local runs, with fault injection and call counters.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use parking_lot::Mutex;
use crate::artifact::TrainedArtifact;
use crate::error::RegistryError;
use super::{ModelMetadata, ModelRegistry, ModelVersion};

struct Entry { artifact: Arc<dyn TrainedArtifact>, metadata: ModelMetadata }

#[derive(Default)]
struct State {
    models: HashMap<String, BTreeMap<ModelVersion, Entry>>,
    unreachable: bool,
    latest_failures: u32,
    fetch_failures: u32,
    metadata_unavailable: bool,
    fetch_delay: Option<Duration>,
}

#[derive(Default)]
pub struct InMemoryRegistry {
    state: Mutex<State>,
    latest_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl InMemoryRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn publish(&self, model: &str, version: u64, artifact: Arc<dyn TrainedArtifact>) -> ModelVersion {
        let metadata = ModelMetadata {
            run_id: format!("run-{version}"),
            status: "READY".into(),
            created_at: chrono::Utc::now().timestamp_millis(),
        };
        self.publish_with_metadata(model, version, artifact, metadata)
    }

    pub fn publish_with_metadata(&self, model: &str, version: u64, artifact: Arc<dyn TrainedArtifact>, metadata: ModelMetadata) -> ModelVersion {
        let v = ModelVersion(version);
        self.state.lock().models.entry(model.to_string()).or_default().insert(v, Entry { artifact, metadata });
        v
    }

    /// Every `latest_version` call fails while set.
    pub fn set_unreachable(&self, unreachable: bool) { self.state.lock().unreachable = unreachable; }
    /// The next `n` `latest_version` calls fail.
    pub fn fail_next_latest(&self, n: u32) { self.state.lock().latest_failures = n; }
    /// The next `n` `fetch_artifact` calls fail.
    pub fn fail_next_fetches(&self, n: u32) { self.state.lock().fetch_failures = n; }
    pub fn set_metadata_unavailable(&self, unavailable: bool) { self.state.lock().metadata_unavailable = unavailable; }
    pub fn set_fetch_delay(&self, delay: Option<Duration>) { self.state.lock().fetch_delay = delay; }

    pub fn latest_calls(&self) -> usize { self.latest_calls.load(Ordering::SeqCst) }
    pub fn fetch_calls(&self) -> usize { self.fetch_calls.load(Ordering::SeqCst) }
}

#[async_trait]
impl ModelRegistry for InMemoryRegistry {
    async fn latest_version(&self, model: &str) -> Result<Option<ModelVersion>, RegistryError> {
        self.latest_calls.fetch_add(1, Ordering::SeqCst);
        let mut st = self.state.lock();
        if st.unreachable { return Err(RegistryError::Unavailable("registry unreachable".into())); }
        if st.latest_failures > 0 {
            st.latest_failures -= 1;
            return Err(RegistryError::Unavailable("injected failure".into()));
        }
        Ok(st.models.get(model).and_then(|versions| versions.keys().next_back().copied()))
    }

    async fn fetch_artifact(&self, model: &str, version: ModelVersion) -> Result<Arc<dyn TrainedArtifact>, RegistryError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.state.lock().fetch_delay;
        if let Some(d) = delay { tokio::time::sleep(d).await; }
        let mut st = self.state.lock();
        if st.fetch_failures > 0 {
            st.fetch_failures -= 1;
            return Err(RegistryError::Unavailable("injected fetch failure".into()));
        }
        st.models.get(model)
            .and_then(|versions| versions.get(&version))
            .map(|e| e.artifact.clone())
            .ok_or_else(|| RegistryError::NotFound(format!("{model}@{version}")))
    }

    async fn get_metadata(&self, model: &str, version: ModelVersion) -> Result<ModelMetadata, RegistryError> {
        let st = self.state.lock();
        if st.metadata_unavailable { return Err(RegistryError::Unavailable("metadata lookup failed".into())); }
        st.models.get(model)
            .and_then(|versions| versions.get(&version))
            .map(|e| e.metadata.clone())
            .ok_or_else(|| RegistryError::NotFound(format!("{model}@{version}")))
    }
}
