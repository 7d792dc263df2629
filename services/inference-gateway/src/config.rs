use std::time::Duration;
use config::{builder::DefaultState, ConfigBuilder, ConfigError};
use serde::Deserialize;
use crate::error::InvalidConfig;

/// Environment prefix: `GATEWAY__REGISTRY__URL`, `GATEWAY_CONFIG_FILE`, ...
pub const ENV_PREFIX: &str = "GATEWAY";

/// Variable names used by the original docker-compose deployment.
pub const ENV_ALIASES: &[(&str, &str)] = &[
    ("MLFLOW_TRACKING_URI", "registry.url"),
    ("MODEL_NAME", "model.name"),
];

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub http: HttpConfig,
    pub registry: RegistryConfig,
    pub model: ModelConfig,
    pub startup: StartupConfig,
    pub update: UpdateConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig { pub host: String, pub port: u16 }

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    pub url: String,
    pub timeout_ms: u64,
    pub artifact_file: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig { pub name: String }

#[derive(Debug, Clone, Deserialize)]
pub struct StartupConfig {
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
    /// Check the registry inline on every prediction.
    PerRequest,
    /// Poll from a background task; predictions only read the holder.
    Interval,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateConfig {
    pub mode: UpdateMode,
    pub interval_secs: u64,
}

impl GatewayConfig {
    pub fn load() -> anyhow::Result<Self> {
        let cfg: Self = serving_core::load_config(ENV_PREFIX, ENV_ALIASES, Self::defaults)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn defaults(b: ConfigBuilder<DefaultState>) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        b.set_default("http.host", "0.0.0.0")?
            .set_default("http.port", 8000)?
            .set_default("registry.url", "http://mlflow:5000")?
            .set_default("registry.timeout_ms", 10_000)?
            .set_default("registry.artifact_file", "model.json")?
            .set_default("model.name", "wine-quality-model")?
            .set_default("startup.max_attempts", 5)?
            .set_default("startup.retry_delay_ms", 5_000)?
            .set_default("update.mode", "per_request")?
            .set_default("update.interval_secs", 30)
    }

    pub fn validate(&self) -> Result<(), InvalidConfig> {
        if self.model.name.trim().is_empty() { return Err(InvalidConfig("model.name must not be empty".into())); }
        if !(self.registry.url.starts_with("http://") || self.registry.url.starts_with("https://")) {
            return Err(InvalidConfig(format!("registry.url '{}' must be an http(s) URL", self.registry.url)));
        }
        if self.registry.timeout_ms == 0 { return Err(InvalidConfig("registry.timeout_ms must be > 0".into())); }
        if self.update.mode == UpdateMode::Interval && self.update.interval_secs == 0 {
            return Err(InvalidConfig("update.interval_secs must be >= 1 in interval mode".into()));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String { format!("{}:{}", self.http.host, self.http.port) }
    pub fn retry_delay(&self) -> Duration { Duration::from_millis(self.startup.retry_delay_ms) }
    pub fn update_interval(&self) -> Duration { Duration::from_secs(self.update.interval_secs.max(1)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_defaults() -> GatewayConfig {
        GatewayConfig::defaults(config::Config::builder()).unwrap().build().unwrap().try_deserialize().unwrap()
    }

    #[test]
    fn defaults_match_original_deployment() {
        let cfg = from_defaults();
        assert_eq!(cfg.registry.url, "http://mlflow:5000");
        assert_eq!(cfg.model.name, "wine-quality-model");
        assert_eq!(cfg.startup.max_attempts, 5);
        assert_eq!(cfg.retry_delay(), Duration::from_secs(5));
        assert_eq!(cfg.update.mode, UpdateMode::PerRequest);
        assert_eq!(cfg.bind_addr(), "0.0.0.0:8000");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut cfg = from_defaults();
        cfg.model.name = " ".into();
        assert!(cfg.validate().is_err());

        let mut cfg = from_defaults();
        cfg.registry.url = "mlflow:5000".into();
        assert!(cfg.validate().is_err());

        let mut cfg = from_defaults();
        cfg.update.mode = UpdateMode::Interval;
        cfg.update.interval_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn interval_mode_parses_from_string() {
        let cfg: GatewayConfig = GatewayConfig::defaults(config::Config::builder()).unwrap()
            .set_override("update.mode", "interval").unwrap()
            .build().unwrap().try_deserialize().unwrap();
        assert_eq!(cfg.update.mode, UpdateMode::Interval);
    }
}
