//! Provider abstractions for cloud compute APIs.

pub mod gce;
mod traits;

pub use traits::{
    ComputeProvider, Instance, InstanceSpec, Operation, OperationStatus, ProviderError,
};
