//! Wires the holder, loader, updater and HTTP state around one registry.

use std::sync::Arc;
use axum::Router;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use crate::config::{GatewayConfig, UpdateMode};
use crate::health::HealthReporter;
use crate::holder::ModelHolder;
use crate::http::{self, AppState};
use crate::loader::ArtifactLoader;
use crate::registry::ModelRegistry;
use crate::service::PredictionService;
use crate::updater::UpdateChecker;

pub struct Gateway {
    config: GatewayConfig,
    holder: Arc<ModelHolder>,
    loader: ArtifactLoader,
    updater: Arc<UpdateChecker>,
    state: AppState,
}

impl Gateway {
    pub fn new(config: GatewayConfig, registry: Arc<dyn ModelRegistry>) -> Self {
        let name = config.model.name.clone();
        let holder = Arc::new(ModelHolder::new());
        let loader = ArtifactLoader::new(registry.clone());
        let updater = Arc::new(UpdateChecker::new(holder.clone(), loader.clone(), name.clone()));
        let state = AppState {
            predictor: Arc::new(PredictionService::new(holder.clone(), updater.clone(), config.update.mode)),
            health: Arc::new(HealthReporter::new(holder.clone(), registry, name.clone())),
            updater: updater.clone(),
            model_name: Arc::from(name),
        };
        Self { config, holder, loader, updater, state }
    }

    pub fn holder(&self) -> &Arc<ModelHolder> { &self.holder }
    pub fn config(&self) -> &GatewayConfig { &self.config }

    /// Cold start. Exhausting the retry budget is not fatal: the gateway serves
    /// 503s until a reload or the poller installs a model.
    pub async fn warm_start(&self) -> bool {
        let cfg = &self.config;
        match self.loader.load_initial(&cfg.model.name, cfg.startup.max_attempts, cfg.retry_delay()).await {
            Ok(model) => { self.holder.swap(model); true }
            Err(e) => {
                warn!(model = %cfg.model.name, error = %e, "starting_without_model");
                false
            }
        }
    }

    /// Spawns the background poller when `update.mode = interval`.
    pub fn spawn_poller(&self) -> Option<JoinHandle<()>> {
        match self.config.update.mode {
            UpdateMode::Interval => Some(self.updater.clone().spawn_poller(self.config.update_interval())),
            UpdateMode::PerRequest => { info!("per_request_update_checks"); None }
        }
    }

    /// Marks the process ready once a model is installed, by warm start, reload
    /// or the poller. Until then `/ready` answers 503.
    pub fn spawn_readiness(&self) -> JoinHandle<()> {
        let holder = self.holder.clone();
        tokio::spawn(async move {
            if let Some(version) = holder.wait_loaded().await {
                serving_core::mark_ready();
                info!(%version, "gateway_ready");
            }
        })
    }

    pub fn router(&self) -> Router { http::router(self.state.clone()) }
}
