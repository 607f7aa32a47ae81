//! Compute Engine v1 REST models.
//!
//! Field names are camelCase on the wire; `int64` values are JSON strings.

use serde::{Deserialize, Serialize};

use crate::providers::traits::OperationStatus;

// ============================================================================
// Instances
// ============================================================================

/// Response of `instances.list`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceList {
    /// Instances on this page. Omitted when the zone is empty.
    #[serde(default)]
    pub items: Vec<GceInstance>,
    /// Token for the next page, if any.
    pub next_page_token: Option<String>,
}

/// Instance as returned by the API (only the fields we read).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GceInstance {
    /// Instance name.
    pub name: String,
    /// Lifecycle status, e.g. `RUNNING`.
    pub status: Option<String>,
    /// Full machine type URL.
    pub machine_type: Option<String>,
}

/// Body of `instances.insert`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceResource {
    /// Instance name.
    pub name: String,
    /// `zones/{zone}/machineTypes/{type}`.
    pub machine_type: String,
    /// Attached disks; exactly one boot disk here.
    pub disks: Vec<AttachedDisk>,
    /// Network interfaces.
    pub network_interfaces: Vec<NetworkInterface>,
    /// Instance metadata.
    pub metadata: Metadata,
}

/// Disk attached to an instance.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedDisk {
    /// Boot disk flag.
    pub boot: bool,
    /// Delete the disk with the instance.
    pub auto_delete: bool,
    /// `PERSISTENT` or `SCRATCH`.
    #[serde(rename = "type")]
    pub disk_type: String,
    /// Parameters for a newly created disk.
    pub initialize_params: AttachedDiskInitializeParams,
}

/// Parameters for a disk created alongside the instance.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedDiskInitializeParams {
    /// Size in GB (int64, sent as a string).
    pub disk_size_gb: String,
    /// Source image.
    pub source_image: String,
}

/// Network interface.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    /// `projects/{p}/global/networks/{n}`.
    pub network: String,
    /// External access configs.
    pub access_configs: Vec<AccessConfig>,
}

/// External access configuration.
#[derive(Debug, Serialize)]
pub struct AccessConfig {
    /// Display name.
    pub name: String,
    /// Always `ONE_TO_ONE_NAT`.
    #[serde(rename = "type")]
    pub access_type: String,
}

/// Instance metadata.
#[derive(Debug, Serialize)]
pub struct Metadata {
    /// Key/value items.
    pub items: Vec<MetadataItem>,
}

/// One metadata entry.
#[derive(Debug, Serialize)]
pub struct MetadataItem {
    /// Key.
    pub key: String,
    /// Value.
    pub value: String,
}

// ============================================================================
// Operations
// ============================================================================

/// Zonal operation resource.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GceOperation {
    /// Operation name.
    pub name: String,
    /// `PENDING`, `RUNNING` or `DONE`.
    pub status: OperationStatus,
    /// Set once a done operation has failed.
    pub error: Option<OperationErrors>,
    /// HTTP status mirrored from the failed request.
    pub http_error_status_code: Option<u16>,
    /// HTTP message mirrored from the failed request.
    pub http_error_message: Option<String>,
}

/// Error block on a failed operation.
#[derive(Debug, Deserialize)]
pub struct OperationErrors {
    /// Individual errors.
    #[serde(default)]
    pub errors: Vec<OperationErrorItem>,
}

/// Single operation error.
#[derive(Debug, Deserialize)]
pub struct OperationErrorItem {
    /// Error code, e.g. `QUOTA_EXCEEDED`.
    pub code: Option<String>,
    /// Human-readable message.
    pub message: Option<String>,
}

impl OperationErrors {
    /// Join every error into one line.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.errors.is_empty() {
            return "unknown error".to_string();
        }
        self.errors
            .iter()
            .map(|e| match (&e.code, &e.message) {
                (Some(code), Some(msg)) => format!("{code}: {msg}"),
                (Some(code), None) => code.clone(),
                (None, Some(msg)) => msg.clone(),
                (None, None) => "unknown error".to_string(),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Google API error envelope.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    /// Error details.
    pub error: ApiErrorDetail,
}

/// Google API error details.
#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    /// Message.
    pub message: Option<String>,
}
