//! The single swappable slot holding the model that answers requests.
//!
//! Readers take an `Arc` snapshot and score against it for the rest of their
//! request; a swap only replaces the pointer, so it never waits on readers and
//! readers never see a version paired with another version's artifact.

use std::fmt;
use std::sync::Arc;
use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::info;
use crate::artifact::TrainedArtifact;
use crate::registry::ModelVersion;

#[derive(Debug, Clone)]
pub struct ActiveModel {
    artifact: Arc<dyn TrainedArtifact>,
    version: ModelVersion,
    loaded_at: DateTime<Utc>,
}

impl ActiveModel {
    pub fn new(artifact: Arc<dyn TrainedArtifact>, version: ModelVersion) -> Self {
        Self { artifact, version, loaded_at: Utc::now() }
    }
    pub fn artifact(&self) -> &Arc<dyn TrainedArtifact> { &self.artifact }
    pub fn version(&self) -> ModelVersion { self.version }
    pub fn loaded_at(&self) -> DateTime<Utc> { self.loaded_at }
}

pub struct ModelHolder {
    current: ArcSwapOption<ActiveModel>,
    installed: watch::Sender<Option<ModelVersion>>,
}

impl Default for ModelHolder {
    fn default() -> Self { Self::new() }
}

impl ModelHolder {
    pub fn new() -> Self {
        let (installed, _) = watch::channel(None);
        Self { current: ArcSwapOption::empty(), installed }
    }

    pub fn snapshot(&self) -> Option<Arc<ActiveModel>> { self.current.load_full() }

    pub fn swap(&self, new: ActiveModel) {
        let version = new.version;
        let previous = self.current.swap(Some(Arc::new(new)));
        info!(from = ?previous.as_ref().map(|m| m.version), to = %version, "model_swapped");
        self.installed.send_replace(Some(version));
    }

    /// Resolves with the installed version once any model has been swapped in.
    pub async fn wait_loaded(&self) -> Option<ModelVersion> {
        let mut rx = self.installed.subscribe();
        let loaded = rx.wait_for(|v| v.is_some()).await.ok().and_then(|v| *v);
        loaded
    }

    pub fn is_loaded(&self) -> bool { (*self.current.load()).is_some() }

    pub fn version(&self) -> Option<ModelVersion> {
        let guard = self.current.load();
        (*guard).as_ref().map(|m| m.version)
    }
}

impl fmt::Debug for ModelHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHolder").field("version", &self.version()).finish()
    }
}
