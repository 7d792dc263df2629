use std::sync::Arc;
use anyhow::{Context, Result};
use inference_gateway::{Gateway, GatewayConfig, MlflowRegistry};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    serving_core::init_tracing("inference-gateway")?;
    let cfg = GatewayConfig::load().context("loading gateway config")?;
    info!(model = %cfg.model.name, registry = %cfg.registry.url, mode = ?cfg.update.mode, "starting_inference_gateway");

    let registry = MlflowRegistry::new(&cfg.registry).context("building registry client")?;
    let gateway = Gateway::new(cfg, Arc::new(registry));
    gateway.warm_start().await;
    let _poller = gateway.spawn_poller();

    let addr = gateway.config().bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("binding {addr}"))?;
    info!(%addr, "http_listening");
    let _readiness = gateway.spawn_readiness();
    axum::serve(listener, gateway.router())
        .with_graceful_shutdown(serving_core::shutdown_signal())
        .await?;
    info!("inference_gateway_stopped");
    Ok(())
}
