//! Runtime configuration resolved from the environment.
//!
//! Values come from process environment variables, optionally seeded from a
//! local `.env` file. Every optional variable has a documented fallback; the
//! project ID has none and must be present before any provider call is made.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

/// Project that owns the instances (required).
pub const ENV_PROJECT_ID: &str = "GCP_PROJECT_ID";
/// Zone instances are created in.
pub const ENV_ZONE: &str = "GCP_ZONE";
/// Boot disk source image.
pub const ENV_SOURCE_IMAGE: &str = "GCP_SOURCE_IMAGE";
/// VPC network name.
pub const ENV_NETWORK_NAME: &str = "GCP_NETWORK_NAME";
/// Seconds to wait for the startup script before fetching results.
pub const ENV_WAIT_TIME: &str = "GCP_WAIT_TIME";
/// Readiness strategy: `fixed` or `poll`.
pub const ENV_READINESS: &str = "GCP_READINESS";
/// Seconds between log fetches when polling for readiness.
pub const ENV_POLL_INTERVAL: &str = "GCP_POLL_INTERVAL";
/// Upper bound in seconds on waiting for a zonal operation.
pub const ENV_OPERATION_TIMEOUT: &str = "GCP_OPERATION_TIMEOUT";
/// Compute Engine REST endpoint.
pub const ENV_COMPUTE_ENDPOINT: &str = "GCP_COMPUTE_ENDPOINT";
/// OAuth access token; when unset one is requested from `gcloud`.
pub const ENV_ACCESS_TOKEN: &str = "GCP_ACCESS_TOKEN";
/// Path to the `gcloud` binary.
pub const ENV_GCLOUD_BIN: &str = "GCLOUD_BIN";

/// Default zone.
pub const DEFAULT_ZONE: &str = "us-central1-a";

/// Default boot image.
pub const DEFAULT_SOURCE_IMAGE: &str = "projects/debian-cloud/global/images/family/debian-11";

/// Default network.
pub const DEFAULT_NETWORK: &str = "default";

/// Default benchmark wait.
pub const DEFAULT_WAIT_SECS: u64 = 120;

/// Default readiness poll interval.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;

/// Default operation timeout.
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 600;

/// Default Compute Engine v1 endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://compute.googleapis.com/compute/v1";

/// Default `gcloud` binary, resolved through `PATH`.
pub const DEFAULT_GCLOUD_BIN: &str = "gcloud";

/// Errors raised while resolving or validating configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable with no default was not provided.
    #[error("Missing required configuration: {0} is not set")]
    MissingRequiredConfig(&'static str),

    /// Readiness strategy name not recognised.
    #[error("Unknown readiness strategy: {0}. Supported: fixed, poll")]
    UnknownReadiness(String),
}

/// How to decide that the startup script has produced its results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Readiness {
    /// Sleep for the configured wait time, then fetch once.
    #[default]
    Fixed,
    /// Re-read the log until the completion marker shows up or the wait
    /// time runs out.
    Poll,
}

impl std::fmt::Display for Readiness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed => write!(f, "fixed"),
            Self::Poll => write!(f, "poll"),
        }
    }
}

impl std::str::FromStr for Readiness {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "poll" => Ok(Self::Poll),
            _ => Err(ConfigError::UnknownReadiness(s.to_string())),
        }
    }
}

/// Resolved configuration, built once at start-up and passed explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// GCP project ID.
    pub project_id: String,
    /// Zone (e.g. `us-central1-a`).
    pub zone: String,
    /// Boot disk source image reference.
    pub source_image: String,
    /// Network name (not the full resource path).
    pub network: String,
    /// How long to wait for benchmarks after creation.
    pub wait_time: Duration,
    /// Readiness strategy.
    pub readiness: Readiness,
    /// Interval between log fetches in [`Readiness::Poll`] mode.
    pub poll_interval: Duration,
    /// Upper bound on waiting for a zonal operation.
    pub operation_timeout: Duration,
    /// Compute Engine REST endpoint, without trailing slash.
    pub api_base_url: String,
    /// Pre-issued OAuth access token.
    pub access_token: Option<String>,
    /// `gcloud` binary used for tokens and remote execution.
    pub gcloud_bin: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_vars(|_| None)
    }
}

impl Config {
    /// Load `.env` (if any) into the process environment, then resolve.
    ///
    /// A missing or unreadable `.env` file is not an error.
    #[must_use]
    pub fn load() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "Loaded .env file"),
            Err(e) if e.not_found() => debug!("No .env file found"),
            Err(e) => warn!(error = %e, "Ignoring .env file that could not be loaded"),
        }
        Self::from_env()
    }

    /// Resolve from the current process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset. Unparseable numbers fall back to
    /// their default with a warning.
    #[must_use]
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let string_or = |key: &str, fallback: &str| get(key).unwrap_or_else(|| fallback.to_string());
        let secs_or = |key: &str, fallback: u64| {
            let secs = match get(key) {
                Some(raw) => raw.parse::<u64>().unwrap_or_else(|e| {
                    warn!(var = key, value = %raw, error = %e, fallback, "Invalid value, using default");
                    fallback
                }),
                None => fallback,
            };
            Duration::from_secs(secs)
        };

        let readiness = match get(ENV_READINESS) {
            Some(raw) => raw.parse::<Readiness>().unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to fixed readiness");
                Readiness::Fixed
            }),
            None => Readiness::default(),
        };

        Self {
            project_id: get(ENV_PROJECT_ID).unwrap_or_default(),
            zone: string_or(ENV_ZONE, DEFAULT_ZONE),
            source_image: string_or(ENV_SOURCE_IMAGE, DEFAULT_SOURCE_IMAGE),
            network: string_or(ENV_NETWORK_NAME, DEFAULT_NETWORK),
            wait_time: secs_or(ENV_WAIT_TIME, DEFAULT_WAIT_SECS),
            readiness,
            poll_interval: secs_or(ENV_POLL_INTERVAL, DEFAULT_POLL_INTERVAL_SECS),
            operation_timeout: secs_or(ENV_OPERATION_TIMEOUT, DEFAULT_OPERATION_TIMEOUT_SECS),
            api_base_url: string_or(ENV_COMPUTE_ENDPOINT, DEFAULT_API_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            access_token: get(ENV_ACCESS_TOKEN),
            gcloud_bin: string_or(ENV_GCLOUD_BIN, DEFAULT_GCLOUD_BIN),
        }
    }

    /// Check that everything a provider call needs is present.
    ///
    /// # Errors
    /// Returns [`ConfigError::MissingRequiredConfig`] when the project ID is
    /// empty or whitespace.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project_id.trim().is_empty() {
            return Err(ConfigError::MissingRequiredConfig(ENV_PROJECT_ID));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_with(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_vars(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = config_with(&[(ENV_PROJECT_ID, "my-project")]);

        assert_eq!(config.project_id, "my-project");
        assert_eq!(config.zone, "us-central1-a");
        assert_eq!(
            config.source_image,
            "projects/debian-cloud/global/images/family/debian-11"
        );
        assert_eq!(config.network, "default");
        assert_eq!(config.wait_time, Duration::from_secs(120));
        assert_eq!(config.readiness, Readiness::Fixed);
        assert_eq!(config.operation_timeout, Duration::from_secs(600));
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.gcloud_bin, "gcloud");
        assert!(config.access_token.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_project_fails_validation() {
        let config = config_with(&[(ENV_ZONE, "europe-west1-b")]);
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingRequiredConfig(ENV_PROJECT_ID))
        );

        let blank = config_with(&[(ENV_PROJECT_ID, "   ")]);
        assert_eq!(
            blank.validate(),
            Err(ConfigError::MissingRequiredConfig(ENV_PROJECT_ID))
        );
    }

    #[test]
    fn test_empty_values_fall_back() {
        let config = config_with(&[
            (ENV_PROJECT_ID, "p"),
            (ENV_ZONE, ""),
            (ENV_NETWORK_NAME, ""),
            (ENV_WAIT_TIME, ""),
        ]);
        assert_eq!(config.zone, DEFAULT_ZONE);
        assert_eq!(config.network, DEFAULT_NETWORK);
        assert_eq!(config.wait_time, Duration::from_secs(DEFAULT_WAIT_SECS));
    }

    #[test]
    fn test_overrides() {
        let config = config_with(&[
            (ENV_PROJECT_ID, "p"),
            (ENV_ZONE, "asia-east1-a"),
            (ENV_SOURCE_IMAGE, "projects/ubuntu-os-cloud/global/images/family/ubuntu-2204-lts"),
            (ENV_NETWORK_NAME, "bench-net"),
            (ENV_WAIT_TIME, "30"),
            (ENV_READINESS, "POLL"),
            (ENV_POLL_INTERVAL, "5"),
            (ENV_COMPUTE_ENDPOINT, "http://localhost:8080/"),
            (ENV_ACCESS_TOKEN, "ya29.token"),
        ]);
        assert_eq!(config.zone, "asia-east1-a");
        assert_eq!(config.network, "bench-net");
        assert_eq!(config.wait_time, Duration::from_secs(30));
        assert_eq!(config.readiness, Readiness::Poll);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.api_base_url, "http://localhost:8080");
        assert_eq!(config.access_token.as_deref(), Some("ya29.token"));
    }

    #[test]
    fn test_invalid_numbers_use_defaults() {
        let config = config_with(&[
            (ENV_PROJECT_ID, "p"),
            (ENV_WAIT_TIME, "two minutes"),
            (ENV_OPERATION_TIMEOUT, "-1"),
            (ENV_READINESS, "eventually"),
        ]);
        assert_eq!(config.wait_time, Duration::from_secs(DEFAULT_WAIT_SECS));
        assert_eq!(
            config.operation_timeout,
            Duration::from_secs(DEFAULT_OPERATION_TIMEOUT_SECS)
        );
        assert_eq!(config.readiness, Readiness::Fixed);
    }

    #[test]
    fn test_readiness_parse() {
        assert_eq!("fixed".parse::<Readiness>(), Ok(Readiness::Fixed));
        assert_eq!(" Poll ".parse::<Readiness>(), Ok(Readiness::Poll));
        assert!(matches!(
            "soon".parse::<Readiness>(),
            Err(ConfigError::UnknownReadiness(_))
        ));
        assert_eq!(Readiness::Poll.to_string(), "poll");
    }
}
