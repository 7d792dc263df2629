use std::sync::Arc;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};
use crate::artifact::FeatureVector;
use crate::config::UpdateMode;
use crate::error::ServiceError;
use crate::holder::ModelHolder;
use crate::metrics::METRICS;
use crate::registry::ModelVersion;
use crate::updater::UpdateChecker;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub raw_score: f64,
    pub rounded_class: i64,
    pub version_used: ModelVersion,
    pub update_occurred: bool,
}

/// Round half to even: 2.5 -> 2, 3.5 -> 4.
pub fn round_class(score: f64) -> i64 { score.round_ties_even() as i64 }

pub struct PredictionService {
    holder: Arc<ModelHolder>,
    updater: Arc<UpdateChecker>,
    mode: UpdateMode,
}

impl PredictionService {
    pub fn new(holder: Arc<ModelHolder>, updater: Arc<UpdateChecker>, mode: UpdateMode) -> Self {
        Self { holder, updater, mode }
    }

    pub fn model_name(&self) -> &str { self.updater.model_name() }

    pub async fn predict(&self, features: FeatureVector) -> Result<PredictionResult, ServiceError> {
        let started = Instant::now();
        let res = self.predict_inner(features).await;
        let outcome = match &res {
            Ok(_) => "ok",
            Err(ServiceError::ModelUnavailable(_)) => "model_unavailable",
            Err(ServiceError::InvalidInput(_)) => "invalid_input",
            Err(_) => "internal",
        };
        METRICS.predictions.with_label_values(&[outcome]).inc();
        METRICS.prediction_latency_seconds.with_label_values(&[]).observe(started.elapsed().as_secs_f64());
        res
    }

    async fn predict_inner(&self, features: FeatureVector) -> Result<PredictionResult, ServiceError> {
        // unloaded gateways answer 503 without touching the registry
        if self.holder.snapshot().is_none() {
            return Err(ServiceError::ModelUnavailable(self.model_name().to_string()));
        }
        let update_occurred = match self.mode {
            UpdateMode::PerRequest => self.updater.maybe_update().await,
            UpdateMode::Interval => false,
        };
        let model = self.holder.snapshot().ok_or_else(|| ServiceError::ModelUnavailable(self.model_name().to_string()))?;

        let artifact = model.artifact();
        artifact.schema().validate(&features).map_err(ServiceError::InvalidInput)?;
        let raw_score = artifact.predict(&features).map_err(|e| {
            warn!(version = %model.version(), error = %e, "prediction_failed");
            ServiceError::Internal(e.to_string())
        })?;
        if !raw_score.is_finite() {
            return Err(ServiceError::Internal("model produced a non-finite score".into()));
        }
        let rounded_class = round_class(raw_score);
        debug!(version = %model.version(), raw_score, rounded_class, update_occurred, "prediction");
        Ok(PredictionResult { raw_score, rounded_class, version_used: model.version(), update_occurred })
    }
}
