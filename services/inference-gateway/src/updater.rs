//! Steady-state refresh: compare the registry's latest version with the held one
//! and swap in a new artifact when they differ.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use crate::error::LoadError;
use crate::holder::ModelHolder;
use crate::loader::ArtifactLoader;
use crate::metrics::METRICS;
use crate::registry::ModelVersion;

/// What caused an update check; only used to label metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger { Request, Interval, Manual }

impl Trigger {
    fn as_str(self) -> &'static str {
        match self { Trigger::Request => "request", Trigger::Interval => "interval", Trigger::Manual => "manual" }
    }
}

pub struct UpdateChecker {
    holder: Arc<ModelHolder>,
    loader: ArtifactLoader,
    model_name: String,
    // at most one fetch+swap at a time; steady-state checks skip instead of waiting
    refresh_lock: Mutex<()>,
}

impl UpdateChecker {
    pub fn new(holder: Arc<ModelHolder>, loader: ArtifactLoader, model_name: impl Into<String>) -> Self {
        Self { holder, loader, model_name: model_name.into(), refresh_lock: Mutex::new(()) }
    }

    pub fn model_name(&self) -> &str { &self.model_name }

    /// Returns `true` only when a different version was fetched and installed.
    /// Registry errors and fetch failures are logged and leave the holder as it was.
    pub async fn maybe_update(&self) -> bool { self.check(Trigger::Request).await }

    pub async fn check(&self, trigger: Trigger) -> bool {
        let latest = match self.loader.latest(&self.model_name).await {
            Ok(v) => v,
            Err(e) => {
                debug!(model = %self.model_name, error = %e, "update_check_skipped");
                record(trigger, "registry_error");
                return false;
            }
        };
        if self.holder.version() == Some(latest) {
            record(trigger, "unchanged");
            return false;
        }

        // a fetch already in flight answers for everyone; waiting on it would queue
        // requests behind a slow or failing artifact store
        let Ok(_guard) = self.refresh_lock.try_lock() else {
            debug!(model = %self.model_name, version = %latest, "update_in_flight");
            record(trigger, "in_flight");
            return false;
        };
        if self.holder.version() == Some(latest) {
            record(trigger, "unchanged");
            return false;
        }
        let current = self.holder.version();
        info!(model = %self.model_name, from = ?current, to = %latest, "model_update_detected");
        match self.loader.fetch_version(&self.model_name, latest).await {
            Ok(model) => {
                self.holder.swap(model);
                record(trigger, "applied");
                true
            }
            Err(e) => {
                warn!(model = %self.model_name, version = %latest, error = %e, "model_update_failed");
                record(trigger, "fetch_failed");
                false
            }
        }
    }

    /// Fetches and installs the latest version even if it is already held.
    pub async fn force_reload(&self) -> Result<ModelVersion, LoadError> {
        let _guard = self.refresh_lock.lock().await;
        let latest = self.loader.latest(&self.model_name).await.inspect_err(|_| record(Trigger::Manual, "registry_error"))?;
        let model = self.loader.fetch_version(&self.model_name, latest).await.inspect_err(|e| {
            warn!(model = %self.model_name, version = %latest, error = %e, "manual_reload_failed");
            record(Trigger::Manual, "fetch_failed");
        })?;
        self.holder.swap(model);
        record(Trigger::Manual, "applied");
        Ok(latest)
    }

    /// Background poller for interval mode. The first check runs one full period after start.
    pub fn spawn_poller(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        let period = period.max(Duration::from_secs(1));
        info!(model = %self.model_name, interval_secs = period.as_secs(), "update_poller_started");
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if self.check(Trigger::Interval).await {
                    info!(version = ?self.holder.version(), "poller_installed_model");
                }
            }
        })
    }
}

fn record(trigger: Trigger, result: &str) {
    METRICS.model_updates.with_label_values(&[trigger.as_str(), result]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{DenseNetwork, FeatureSchema, TrainedArtifact};
    use crate::holder::ActiveModel;
    use crate::registry::InMemoryRegistry;

    const MODEL: &str = "wine-quality-model";

    fn artifact(score: f64) -> Arc<dyn TrainedArtifact> {
        Arc::new(DenseNetwork::linear(FeatureSchema::new(["x"]), vec![0.0], score).unwrap())
    }

    fn setup() -> (Arc<InMemoryRegistry>, Arc<ModelHolder>, Arc<UpdateChecker>) {
        let reg = Arc::new(InMemoryRegistry::new());
        let holder = Arc::new(ModelHolder::new());
        let checker = Arc::new(UpdateChecker::new(holder.clone(), ArtifactLoader::new(reg.clone()), MODEL));
        (reg, holder, checker)
    }

    #[tokio::test]
    async fn equal_versions_skip_fetch() {
        let (reg, holder, checker) = setup();
        reg.publish(MODEL, 1, artifact(1.0));
        holder.swap(ActiveModel::new(artifact(1.0), ModelVersion(1)));
        assert!(!checker.maybe_update().await);
        assert_eq!(reg.latest_calls(), 1);
        assert_eq!(reg.fetch_calls(), 0);
    }

    #[tokio::test]
    async fn newer_version_is_installed() {
        let (reg, holder, checker) = setup();
        reg.publish(MODEL, 1, artifact(1.0));
        holder.swap(ActiveModel::new(artifact(1.0), ModelVersion(1)));
        reg.publish(MODEL, 2, artifact(2.0));
        assert!(checker.maybe_update().await);
        assert_eq!(holder.version(), Some(ModelVersion(2)));
        assert!(!checker.maybe_update().await);
        assert_eq!(reg.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn fetch_failure_leaves_loaded_holder_untouched() {
        let (reg, holder, checker) = setup();
        reg.publish(MODEL, 1, artifact(1.0));
        holder.swap(ActiveModel::new(artifact(1.0), ModelVersion(1)));
        let before = holder.snapshot().unwrap();
        reg.publish(MODEL, 2, artifact(2.0));
        reg.fail_next_fetches(1);
        assert!(!checker.maybe_update().await);
        let after = holder.snapshot().unwrap();
        assert_eq!(after.version(), ModelVersion(1));
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[tokio::test]
    async fn fetch_failure_leaves_unloaded_holder_unloaded() {
        let (reg, holder, checker) = setup();
        reg.publish(MODEL, 1, artifact(1.0));
        reg.fail_next_fetches(1);
        assert!(!checker.maybe_update().await);
        assert!(!holder.is_loaded());
        // next check succeeds
        assert!(checker.maybe_update().await);
        assert_eq!(holder.version(), Some(ModelVersion(1)));
    }

    #[tokio::test]
    async fn registry_errors_are_absorbed() {
        let (reg, holder, checker) = setup();
        reg.set_unreachable(true);
        assert!(!checker.maybe_update().await);
        assert!(!holder.is_loaded());
        assert_eq!(reg.fetch_calls(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_checks_fetch_once() {
        let (reg, holder, checker) = setup();
        reg.publish(MODEL, 1, artifact(1.0));
        holder.swap(ActiveModel::new(artifact(1.0), ModelVersion(1)));
        reg.publish(MODEL, 2, artifact(2.0));
        reg.set_fetch_delay(Some(Duration::from_millis(50)));

        let tasks: Vec<_> = (0..8).map(|_| {
            let checker = checker.clone();
            tokio::spawn(async move { checker.maybe_update().await })
        }).collect();
        let mut applied = 0;
        for t in tasks { if t.await.unwrap() { applied += 1; } }

        assert_eq!(applied, 1);
        assert_eq!(reg.fetch_calls(), 1);
        assert_eq!(holder.version(), Some(ModelVersion(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn failing_store_does_not_queue_requests() {
        let (reg, holder, checker) = setup();
        reg.publish(MODEL, 1, artifact(1.0));
        holder.swap(ActiveModel::new(artifact(1.0), ModelVersion(1)));
        reg.publish(MODEL, 2, artifact(2.0));
        reg.set_fetch_delay(Some(Duration::from_millis(200)));
        reg.fail_next_fetches(8);

        let tasks: Vec<_> = (0..8).map(|_| {
            let checker = checker.clone();
            tokio::spawn(async move {
                let start = tokio::time::Instant::now();
                let updated = checker.maybe_update().await;
                (updated, start.elapsed())
            })
        }).collect();
        for t in tasks {
            let (updated, waited) = t.await.unwrap();
            assert!(!updated);
            assert!(waited < Duration::from_millis(250), "request waited {waited:?}");
        }
        assert_eq!(reg.fetch_calls(), 1);
        assert_eq!(holder.version(), Some(ModelVersion(1)));

        // the next check after the failure tries again
        reg.fail_next_fetches(0);
        assert!(checker.maybe_update().await);
        assert_eq!(holder.version(), Some(ModelVersion(2)));
    }

    #[tokio::test]
    async fn force_reload_refetches_held_version() {
        let (reg, holder, checker) = setup();
        reg.publish(MODEL, 3, artifact(3.0));
        holder.swap(ActiveModel::new(artifact(3.0), ModelVersion(3)));
        assert_eq!(checker.force_reload().await.unwrap(), ModelVersion(3));
        assert_eq!(reg.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn force_reload_without_versions() {
        let (_reg, holder, checker) = setup();
        let err = checker.force_reload().await.unwrap_err();
        assert!(matches!(err, LoadError::NoVersionPublished(_)));
        assert!(!holder.is_loaded());
    }

    #[tokio::test]
    async fn force_reload_fetch_failure() {
        let (reg, holder, checker) = setup();
        reg.publish(MODEL, 1, artifact(1.0));
        reg.fail_next_fetches(1);
        let err = checker.force_reload().await.unwrap_err();
        assert!(matches!(err, LoadError::ArtifactFetchFailed { version: ModelVersion(1), .. }));
        assert!(!holder.is_loaded());
    }

    #[tokio::test(start_paused = true)]
    async fn poller_installs_new_versions() {
        let (reg, holder, checker) = setup();
        let handle = checker.clone().spawn_poller(Duration::from_secs(30));

        // nothing happens before the first period elapses
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(reg.latest_calls(), 0);

        reg.publish(MODEL, 1, artifact(1.0));
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(holder.version(), Some(ModelVersion(1)));

        reg.publish(MODEL, 2, artifact(2.0));
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(holder.version(), Some(ModelVersion(2)));
        handle.abort();
    }
}
