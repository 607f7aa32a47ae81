//! Compute Engine REST API client implementation.
//!
//! API Documentation: <https://cloud.google.com/compute/docs/reference/rest/v1/instances>

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::models::{
    AccessConfig, ApiErrorBody, AttachedDisk, AttachedDiskInitializeParams, GceInstance,
    GceOperation, InstanceList, InstanceResource, Metadata, MetadataItem, NetworkInterface,
};
use crate::config::Config;
use crate::providers::traits::{
    ComputeProvider, Instance, InstanceSpec, Operation, OperationStatus, ProviderError,
};
use crate::startup_script::STARTUP_SCRIPT_KEY;

/// Default timeout for API requests.
///
/// `zoneOperations.wait` holds the connection for up to two minutes, so this
/// has to be longer than that.
const DEFAULT_TIMEOUT_SECS: u64 = 150;

/// Pause between consecutive operation waits.
const POLL_INTERVAL_MILLIS: u64 = 500;

/// Compute Engine provider, scoped to one project and zone.
#[derive(Clone)]
pub struct Gce {
    /// HTTP client.
    client: Client,
    /// REST endpoint, e.g. `https://compute.googleapis.com/compute/v1`.
    base_url: String,
    /// OAuth bearer token.
    access_token: String,
    /// Project ID.
    project_id: String,
    /// Zone.
    zone: String,
}

impl Gce {
    /// Create a provider with an explicit access token.
    ///
    /// # Errors
    /// Returns [`ProviderError::Config`] if the configuration is incomplete,
    /// or an HTTP error if the client cannot be built.
    pub fn new(config: &Config, access_token: impl Into<String>) -> Result<Self, ProviderError> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
            access_token: access_token.into(),
            project_id: config.project_id.clone(),
            zone: config.zone.clone(),
        })
    }

    /// Create a provider, taking the token from the config or from
    /// `gcloud auth print-access-token`.
    ///
    /// The configuration is validated before any credential lookup.
    ///
    /// # Errors
    /// Returns [`ProviderError::Config`] if the configuration is incomplete,
    /// or [`ProviderError::Auth`] if no token can be obtained.
    pub async fn from_config(config: &Config) -> Result<Self, ProviderError> {
        config.validate()?;

        let token = match &config.access_token {
            Some(token) => token.clone(),
            None => gcloud_access_token(&config.gcloud_bin).await?,
        };

        Self::new(config, token)
    }

    fn zone_url(&self) -> String {
        format!(
            "{}/projects/{}/zones/{}",
            self.base_url, self.project_id, self.zone
        )
    }

    /// Make an authenticated GET request.
    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        debug!(url = %url, "GET request");

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Make an authenticated POST request with a JSON body.
    async fn post<T, B>(&self, url: &str, body: &B) -> Result<T, ProviderError>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize,
    {
        debug!(url = %url, "POST request");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Make an authenticated POST request with an empty body, giving up
    /// after `timeout`.
    async fn post_empty<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<T, ProviderError> {
        debug!(url = %url, timeout_ms = timeout.as_millis(), "POST request (empty body)");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .timeout(timeout)
            .body("")
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Make an authenticated DELETE request.
    async fn delete<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ProviderError> {
        debug!(url = %url, "DELETE request");

        let response = self
            .client
            .delete(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Handle API response, parsing JSON or error.
    ///
    /// Every non-success status, 404 included, is a [`ProviderError::Api`];
    /// callers decide what a 404 means for them.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            serde_json::from_str(&text).map_err(|e| {
                warn!(error = %e, body = %text, "Failed to parse response");
                ProviderError::Serialization(e)
            })
        } else {
            Err(ProviderError::Api {
                status: status.as_u16(),
                message: error_message(&text),
            })
        }
    }

    /// Build the insert body for `spec`.
    fn to_instance_resource(&self, spec: InstanceSpec) -> InstanceResource {
        InstanceResource {
            name: spec.name,
            machine_type: machine_type_path(&self.zone, &spec.machine_type),
            disks: vec![AttachedDisk {
                boot: true,
                auto_delete: true,
                disk_type: "PERSISTENT".to_string(),
                initialize_params: AttachedDiskInitializeParams {
                    disk_size_gb: spec.disk_size_gb.to_string(),
                    source_image: spec.source_image,
                },
            }],
            network_interfaces: vec![NetworkInterface {
                network: network_path(&self.project_id, &spec.network),
                access_configs: vec![AccessConfig {
                    name: "External NAT".to_string(),
                    access_type: "ONE_TO_ONE_NAT".to_string(),
                }],
            }],
            metadata: Metadata {
                items: vec![MetadataItem {
                    key: STARTUP_SCRIPT_KEY.to_string(),
                    value: spec.startup_script,
                }],
            },
        }
    }

    /// Convert API instance to our `Instance` type.
    fn to_instance(instance: GceInstance) -> Instance {
        Instance {
            name: instance.name,
            status: instance.status,
            machine_type: instance
                .machine_type
                .as_deref()
                .and_then(|url| url.rsplit('/').next())
                .map(str::to_string),
        }
    }

    /// Convert API operation to our `Operation` type.
    fn to_operation(op: GceOperation) -> Operation {
        let error = op.error.map(|e| e.summary()).or_else(|| {
            op.http_error_status_code
                .filter(|code| *code >= 400)
                .map(|code| {
                    format!(
                        "HTTP {code}: {}",
                        op.http_error_message.as_deref().unwrap_or("error")
                    )
                })
        });

        Operation {
            name: op.name,
            status: op.status,
            error,
        }
    }
}

#[async_trait]
impl ComputeProvider for Gce {
    async fn list_instances(&self) -> Result<Vec<Instance>, ProviderError> {
        let url = format!("{}/instances", self.zone_url());
        let mut instances = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let query: Vec<(&str, &str)> = page_token
                .as_deref()
                .map(|token| vec![("pageToken", token)])
                .unwrap_or_default();

            let page: InstanceList = self.get(&url, &query).await?;
            instances.extend(page.items.into_iter().map(Self::to_instance));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(count = instances.len(), zone = %self.zone, "Listed instances");
        Ok(instances)
    }

    async fn insert_instance(&self, spec: InstanceSpec) -> Result<Operation, ProviderError> {
        info!(
            name = %spec.name,
            machine_type = %spec.machine_type,
            zone = %self.zone,
            "Creating instance"
        );

        let body = self.to_instance_resource(spec);
        let op: GceOperation = self
            .post(&format!("{}/instances", self.zone_url()), &body)
            .await?;

        Ok(Self::to_operation(op))
    }

    async fn delete_instance(&self, name: &str) -> Result<Operation, ProviderError> {
        info!(name = %name, zone = %self.zone, "Deleting instance");

        let op: GceOperation = self
            .delete(&format!("{}/instances/{name}", self.zone_url()))
            .await
            .map_err(|e| match e {
                ProviderError::Api { status, .. } if status == StatusCode::NOT_FOUND.as_u16() => {
                    ProviderError::NotFound(name.to_string())
                }
                other => other,
            })?;

        Ok(Self::to_operation(op))
    }

    async fn wait_for_operation(
        &self,
        op: &Operation,
        timeout: Duration,
    ) -> Result<Operation, ProviderError> {
        info!(operation = %op.name, timeout_secs = timeout.as_secs(), "Waiting for operation");

        let start = Instant::now();
        let url = format!("{}/operations/{}/wait", self.zone_url(), op.name);
        let mut current = op.clone();

        loop {
            if current.status == OperationStatus::Done {
                if let Some(message) = current.error.clone() {
                    return Err(ProviderError::Operation {
                        operation: current.name,
                        message,
                    });
                }
                info!(operation = %current.name, "Operation completed");
                return Ok(current);
            }

            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                return Err(ProviderError::Timeout(timeout));
            }

            // A single wait call may hold the connection; keep it within budget.
            let polled: GceOperation = match self.post_empty(&url, remaining).await {
                Err(ProviderError::Http(e)) if e.is_timeout() => {
                    return Err(ProviderError::Timeout(timeout));
                }
                result => result?,
            };
            current = Self::to_operation(polled);

            debug!(
                operation = %current.name,
                status = %current.status,
                elapsed_secs = start.elapsed().as_secs(),
                "Polling operation status"
            );

            if current.status != OperationStatus::Done {
                let pause = Duration::from_millis(POLL_INTERVAL_MILLIS)
                    .min(timeout.saturating_sub(start.elapsed()));
                tokio::time::sleep(pause).await;
            }
        }
    }
}

/// `projects/{project}/global/networks/{network}`.
fn network_path(project_id: &str, network: &str) -> String {
    format!("projects/{project_id}/global/networks/{network}")
}

/// `zones/{zone}/machineTypes/{machine_type}`.
fn machine_type_path(zone: &str, machine_type: &str) -> String {
    format!("zones/{zone}/machineTypes/{machine_type}")
}

/// Pull `error.message` out of a Google error body, falling back to the raw
/// text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.error.message)
        .unwrap_or_else(|| body.to_string())
}

/// Ask the `gcloud` CLI for an access token.
async fn gcloud_access_token(gcloud_bin: &str) -> Result<String, ProviderError> {
    debug!(gcloud = %gcloud_bin, "Requesting access token from gcloud");

    let output = Command::new(gcloud_bin)
        .args(["auth", "print-access-token"])
        .output()
        .await
        .map_err(|e| {
            ProviderError::Auth(format!(
                "failed to run `{gcloud_bin} auth print-access-token`: {e}. \
                 Install the Google Cloud SDK or set GCP_ACCESS_TOKEN"
            ))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProviderError::Auth(format!(
            "gcloud could not issue a token: {}. Run `gcloud auth login`",
            stderr.trim()
        )));
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(ProviderError::Auth("gcloud returned an empty token".to_string()));
    }
    Ok(token)
}
