//! Inference gateway: serves predictions from the latest registered model version
//! and swaps in newer versions without restarting.

pub mod artifact;
pub mod config;
pub mod error;
pub mod gateway;
pub mod health;
pub mod holder;
pub mod http;
pub mod loader;
pub mod metrics;
pub mod registry;
pub mod service;
pub mod updater;
pub mod wine;

pub use artifact::{DenseNetwork, FeatureSchema, FeatureVector, TrainedArtifact};
pub use config::{GatewayConfig, UpdateMode};
pub use error::{LoadError, RegistryError, ServiceError};
pub use gateway::Gateway;
pub use holder::{ActiveModel, ModelHolder};
pub use registry::{InMemoryRegistry, MlflowRegistry, ModelRegistry, ModelVersion};
pub use service::{PredictionResult, PredictionService};
pub use updater::UpdateChecker;
