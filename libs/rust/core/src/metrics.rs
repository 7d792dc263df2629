//! Prometheus helpers. Metrics live in the process-wide default registry so every
//! crate in the service shows up on the same `/metrics` scrape.

use axum::{http::{header, StatusCode}, response::{IntoResponse, Response}};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, TextEncoder};

/// Creates and registers a counter family. Registration conflicts are logged and the
/// unregistered metric is still returned, so callers never have to handle them.
pub fn register_counter_vec(name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    let counter = IntCounterVec::new(Opts::new(name, help), labels).expect("metric name and labels are valid identifiers");
    if let Err(e) = prometheus::default_registry().register(Box::new(counter.clone())) {
        tracing::warn!(metric = name, error = %e, "metric_register_failed");
    }
    counter
}

pub fn register_histogram_vec(name: &str, help: &str, labels: &[&str], buckets: Vec<f64>) -> HistogramVec {
    let histogram = HistogramVec::new(HistogramOpts::new(name, help).buckets(buckets), labels).expect("metric name and labels are valid identifiers");
    if let Err(e) = prometheus::default_registry().register(Box::new(histogram.clone())) {
        tracing::warn!(metric = name, error = %e, "metric_register_failed");
    }
    histogram
}

pub async fn metrics_handler() -> Response {
    let metric_families = prometheus::default_registry().gather();
    let mut buf = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&metric_families, &mut buf) {
        return (StatusCode::INTERNAL_SERVER_ERROR, format!("encode error: {e}")).into_response();
    }
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain; version=0.0.4")], buf).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scrape_contains_registered_counter() {
        let c = register_counter_vec("serving_core_test_events_total", "test counter", &["kind"]);
        c.with_label_values(&["a"]).inc();
        let resp = metrics_handler().await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("serving_core_test_events_total"));
    }

    #[test]
    fn duplicate_registration_is_tolerated() {
        let a = register_counter_vec("serving_core_dup_total", "dup", &["k"]);
        let b = register_counter_vec("serving_core_dup_total", "dup", &["k"]);
        a.with_label_values(&["x"]).inc();
        b.with_label_values(&["x"]).inc();
    }
}
