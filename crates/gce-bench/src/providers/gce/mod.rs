//! Google Compute Engine provider.
//!
//! Implements the [`ComputeProvider`](crate::providers::ComputeProvider)
//! trait on top of the Compute Engine v1 REST API. Insert and delete return
//! zonal operations, which are driven to completion through
//! `zoneOperations.wait`.
//!
//! ## Authentication
//!
//! Requests carry an OAuth bearer token, taken from `GCP_ACCESS_TOKEN` or
//! requested from `gcloud auth print-access-token`.

mod client;
mod models;

pub use client::Gce;
