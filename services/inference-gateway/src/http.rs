//! HTTP surface: prediction, health, model info and manual reload, plus the
//! shared ops routes from `serving_core`.

use std::sync::Arc;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use crate::artifact::FeatureVector;
use crate::error::{LoadError, ServiceError};
use crate::health::{HealthReporter, ModelInfo};
use crate::registry::ModelVersion;
use crate::service::PredictionService;
use crate::updater::UpdateChecker;
use crate::wine::WineFeatures;

#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<PredictionService>,
    pub health: Arc<HealthReporter>,
    pub updater: Arc<UpdateChecker>,
    pub model_name: Arc<str>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/model/info", get(model_info))
        .route("/predict", post(predict))
        .route("/model/reload", post(reload))
        .merge(serving_core::ops_router::<AppState>())
        .with_state(state)
}

/// Either a raw ordered vector or the named wine body.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PredictRequest {
    Raw { features: Vec<f64>, #[serde(default)] names: Option<Vec<String>> },
    Wine(WineFeatures),
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub quality_prediction: f64,
    pub quality_class: i64,
    pub model_updated: bool,
    pub model_version: ModelVersion,
    pub model_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wine_type: Option<String>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    model_loaded: bool,
    model_name: String,
    model_version: Option<ModelVersion>,
}

#[derive(Debug)]
pub struct ApiError { status: StatusCode, detail: String }

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self { Self { status, detail: detail.into() } }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        let status = match &e {
            ServiceError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::MetadataUnavailable(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError::new(status, e.to_string())
    }
}

impl From<LoadError> for ApiError {
    fn from(e: LoadError) -> Self {
        match e {
            LoadError::NoVersionPublished(model) => ApiError::new(StatusCode::NOT_FOUND, format!("No model '{model}' found")),
            // a failed version lookup reads as "nothing published" on this route
            LoadError::RegistryUnavailable(err) => ApiError::new(StatusCode::NOT_FOUND, format!("No model found: {err}")),
            e @ LoadError::ArtifactFetchFailed { .. } => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }
}

async fn root(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "message": "Wine Quality Prediction API", "status": "running", "model_name": &*state.model_name }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let h = state.health.health();
    Json(HealthResponse { status: "healthy", model_loaded: h.loaded, model_name: state.model_name.to_string(), model_version: h.version })
}

async fn model_info(State(state): State<AppState>) -> Result<Json<ModelInfo>, ApiError> {
    Ok(Json(state.health.info().await?))
}

async fn predict(State(state): State<AppState>, Json(req): Json<PredictRequest>) -> Result<Json<PredictResponse>, ApiError> {
    let (features, wine_type) = match req {
        PredictRequest::Raw { features, names: Some(names) } => (FeatureVector::named(names, features), None),
        PredictRequest::Raw { features, names: None } => (FeatureVector::new(features), None),
        PredictRequest::Wine(wine) => {
            let kind = wine.wine_type.clone();
            (wine.into_feature_vector()?, Some(kind))
        }
    };
    let res = state.predictor.predict(features).await.inspect_err(|e| {
        if matches!(e, ServiceError::Internal(_)) { warn!(error = %e, "predict_internal_error"); }
    })?;
    Ok(Json(PredictResponse {
        quality_prediction: res.raw_score,
        quality_class: res.rounded_class,
        model_updated: res.update_occurred,
        model_version: res.version_used,
        model_name: state.model_name.to_string(),
        wine_type,
    }))
}

async fn reload(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let version = state.updater.force_reload().await?;
    info!(%version, "manual_reload_complete");
    Ok(Json(json!({ "message": "Model reloaded successfully", "model_version": version })))
}
