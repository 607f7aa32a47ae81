//! Crate-level error type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::providers::ProviderError;
use crate::remote::RemoteExecError;

/// Any failure surfaced by [`BenchRunner`](crate::BenchRunner).
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration incomplete.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Provider call or its operation failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Benchmark retrieval failed.
    #[error(transparent)]
    RemoteExec(#[from] RemoteExecError),

    /// Writing progress output failed.
    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the target instance does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Provider(e) if e.is_not_found())
    }
}

/// Result alias for this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
