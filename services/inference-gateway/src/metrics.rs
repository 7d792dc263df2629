//! Gateway metrics, exported through `serving_core`'s `/metrics` route.
use once_cell::sync::Lazy;
use prometheus::{HistogramVec, IntCounterVec};
use serving_core::{register_counter_vec, register_histogram_vec};

pub struct GatewayMetrics {
    /// label `outcome`: ok | model_unavailable | invalid_input | internal
    pub predictions: IntCounterVec,
    pub prediction_latency_seconds: HistogramVec,
    /// labels `trigger` (request | interval | manual) and `result` (applied | unchanged | in_flight | registry_error | fetch_failed)
    pub model_updates: IntCounterVec,
    /// label `result`: loaded | exhausted
    pub startup_attempts: IntCounterVec,
}

pub static METRICS: Lazy<GatewayMetrics> = Lazy::new(|| GatewayMetrics {
    predictions: register_counter_vec("gateway_predictions_total", "Prediction requests by outcome", &["outcome"]),
    prediction_latency_seconds: register_histogram_vec(
        "gateway_prediction_latency_seconds",
        "Prediction latency including any inline model update",
        &[],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
    ),
    model_updates: register_counter_vec("gateway_model_updates_total", "Model update checks by trigger and result", &["trigger", "result"]),
    startup_attempts: register_counter_vec("gateway_startup_loads_total", "Cold-start load outcomes", &["result"]),
});
