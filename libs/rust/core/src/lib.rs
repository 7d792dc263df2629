//! Core shared utilities for model serving services: tracing, layered config,
//! liveness/readiness flags and the ops router (`/live`, `/ready`, `/metrics`).

use anyhow::Result;
use tracing::info;
use once_cell::sync::OnceCell;
use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::de::DeserializeOwned;
use config::{builder::DefaultState, ConfigBuilder, ConfigError};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod metrics;
pub use metrics::{register_counter_vec, register_histogram_vec, metrics_handler};

static TRACING_INIT: OnceCell<()> = OnceCell::new();
static NODE_LIVENESS: AtomicBool = AtomicBool::new(true);
static NODE_READINESS: AtomicBool = AtomicBool::new(false);

pub fn mark_ready() { NODE_READINESS.store(true, Ordering::SeqCst); }
pub fn clear_ready() { NODE_READINESS.store(false, Ordering::SeqCst); }
pub fn is_ready() -> bool { NODE_READINESS.load(Ordering::SeqCst) }
pub fn is_live() -> bool { NODE_LIVENESS.load(Ordering::SeqCst) }

/// Installs the global subscriber once per process. `RUST_LOG` drives the filter
/// (default `info`); `GATEWAY_JSON_LOG=1` switches to flattened JSON lines.
pub fn init_tracing(service: &str) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| -> Result<()> {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let json = std::env::var("GATEWAY_JSON_LOG").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
        let registry = tracing_subscriber::registry().with(env_filter);
        if json {
            registry
                .with(tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_span_list(false))
                .try_init()?;
        } else {
            registry
                .with(tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_line_number(true))
                .try_init()?;
        }
        Ok(())
    })?;
    info!(service, "tracing initialized");
    Ok(())
}

/// Loads `T` from, lowest precedence first: the defaults installed by `defaults`,
/// the optional file named by `{PREFIX}_CONFIG_FILE`, `{PREFIX}__SECTION__KEY`
/// environment variables, and finally `env_aliases` (`(ENV_VAR, config.key)`) for
/// variable names inherited from older deployments.
pub fn load_config<T, F>(prefix: &str, env_aliases: &[(&str, &str)], defaults: F) -> Result<T>
where
    T: DeserializeOwned,
    F: FnOnce(ConfigBuilder<DefaultState>) -> Result<ConfigBuilder<DefaultState>, ConfigError>,
{
    let mut builder = defaults(config::Config::builder())?;
    if let Ok(file) = std::env::var(format!("{prefix}_CONFIG_FILE")) {
        info!(%file, "loading config file");
        builder = builder.add_source(config::File::with_name(&file).required(false));
    }
    builder = builder.add_source(config::Environment::with_prefix(prefix).separator("__").try_parsing(true));
    for (var, key) in env_aliases {
        builder = builder.set_override_option(*key, std::env::var(var).ok())?;
    }
    let cfg = builder.build()?;
    Ok(cfg.try_deserialize()?)
}

/// Liveness, readiness and Prometheus scrape routes, merged into a service router.
pub fn ops_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/live", get(|| async { Json(serde_json::json!({"live": is_live()})) }))
        .route("/ready", get(ready_handler))
        .route("/metrics", get(metrics_handler))
}

async fn ready_handler() -> impl IntoResponse {
    let ready = is_ready();
    let status = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(serde_json::json!({"ready": ready})))
}

/// Resolves on Ctrl-C or SIGTERM and clears readiness so probes drain traffic first.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await { tracing::error!(error=?e, "ctrl_c handler failed"); }
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => { sig.recv().await; }
            Err(e) => { tracing::error!(error=?e, "sigterm handler failed"); std::future::pending::<()>().await; }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    clear_ready();
    info!("shutdown_signal_received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde::Deserialize;
    use tower::ServiceExt;

    #[derive(Debug, Deserialize)]
    struct Sample { name: String, port: u16, nested: Nested }

    #[derive(Debug, Deserialize)]
    struct Nested { retries: u32 }

    #[tokio::test]
    async fn ready_flips_with_flag() {
        let app: Router = ops_router();
        clear_ready();
        let resp = app.clone().oneshot(Request::get("/ready").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        mark_ready();
        let resp = app.clone().oneshot(Request::get("/ready").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let resp = app.oneshot(Request::get("/live").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[test]
    fn env_layers_over_defaults_and_aliases_win() {
        std::env::set_var("CORETEST__NESTED__RETRIES", "9");
        std::env::set_var("CORETEST_LEGACY_NAME", "from-alias");
        let cfg: Sample = load_config("CORETEST", &[("CORETEST_LEGACY_NAME", "name")], |b| {
            b.set_default("name", "default")?
                .set_default("port", 8000)?
                .set_default("nested.retries", 5)
        }).unwrap();
        assert_eq!(cfg.name, "from-alias");
        assert_eq!(cfg.port, 8000);
        assert_eq!(cfg.nested.retries, 9);
    }

    #[test]
    fn unset_alias_keeps_default() {
        let cfg: Sample = load_config("CORETEST_UNSET", &[("CORETEST_UNSET_NEVER_DEFINED", "name")], |b| {
            b.set_default("name", "default")?
                .set_default("port", 1)?
                .set_default("nested.retries", 2)
        }).unwrap();
        assert_eq!(cfg.name, "default");
        assert_eq!(cfg.nested.retries, 2);
    }
}
