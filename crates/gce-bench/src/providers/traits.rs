//! Provider trait and common types for compute providers.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur during provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The instance named in a delete does not exist.
    #[error("Instance not found: {0}")]
    NotFound(String),

    /// A long-running operation finished with an error.
    #[error("Operation {operation} failed: {message}")]
    Operation { operation: String, message: String },

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Could not obtain credentials.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProviderError {
    /// Whether this error means the target does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Long-running operation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    /// Queued, not started.
    Pending,
    /// In progress.
    Running,
    /// Terminal; check `error` for the outcome.
    Done,
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Handle to a provider-side asynchronous operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    /// Operation name, used to poll it.
    pub name: String,
    /// Current status.
    pub status: OperationStatus,
    /// Error summary once the operation is done and failed.
    pub error: Option<String>,
}

/// A listed instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Instance name.
    pub name: String,
    /// Provider status string (e.g. `RUNNING`).
    pub status: Option<String>,
    /// Machine type, short form (e.g. `e2-micro`).
    pub machine_type: Option<String>,
}

/// Request to create a new instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSpec {
    /// Instance name.
    pub name: String,
    /// Machine type, short form (e.g. `e2-micro`).
    pub machine_type: String,
    /// Boot disk size in GB.
    pub disk_size_gb: u64,
    /// Boot disk source image.
    pub source_image: String,
    /// Network name.
    pub network: String,
    /// Startup script attached as instance metadata.
    pub startup_script: String,
}

/// Trait for compute providers.
#[async_trait]
pub trait ComputeProvider: Send + Sync {
    /// List all instances, in provider order.
    async fn list_instances(&self) -> Result<Vec<Instance>, ProviderError>;

    /// Submit an instance creation request.
    async fn insert_instance(&self, spec: InstanceSpec) -> Result<Operation, ProviderError>;

    /// Submit an instance deletion request.
    async fn delete_instance(&self, name: &str) -> Result<Operation, ProviderError>;

    /// Block until `op` is done, or `timeout` passes.
    ///
    /// A done operation that carries an error is returned as
    /// [`ProviderError::Operation`].
    async fn wait_for_operation(
        &self,
        op: &Operation,
        timeout: Duration,
    ) -> Result<Operation, ProviderError>;
}
