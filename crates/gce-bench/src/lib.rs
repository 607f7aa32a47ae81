//! Benchmark Compute Engine machine types.
//!
//! This crate lists, creates and deletes Compute Engine instances. Every
//! created instance boots with a fixed startup script that runs sysbench,
//! stress-ng and fio; the results are read back over an IAP-tunnelled
//! `gcloud compute ssh` session.
//!
//! # Example
//!
//! ```rust,ignore
//! use gce_bench::{BenchRunner, Config, Gce, IapSsh};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load();
//!     let provider = Gce::from_config(&config).await?;
//!     let runner = BenchRunner::new(config.clone(), provider, IapSsh::new(&config))?;
//!
//!     let mut out = std::io::stdout();
//!     runner.create_instance(&mut out, "bench-1", "e2-micro").await?;
//!     runner.wait_for_benchmarks(&mut out, "bench-1").await?;
//!     println!("{}", runner.fetch_benchmark_results("bench-1").await?);
//!
//!     runner.delete_instance(&mut out, "bench-1").await?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bench;
pub mod config;
pub mod driver;
pub mod error;
pub mod providers;
pub mod remote;
pub mod startup_script;
pub mod ui;

pub use bench::BenchRunner;
pub use config::{Config, ConfigError, Readiness};
pub use error::{Error, Result};
pub use providers::gce::Gce;
pub use providers::{ComputeProvider, Instance, InstanceSpec, Operation, ProviderError};
pub use remote::{IapSsh, RemoteExecError, RemoteExecutor};
