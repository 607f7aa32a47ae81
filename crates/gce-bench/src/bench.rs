//! Instance lifecycle and benchmark retrieval.
//!
//! [`BenchRunner`] holds the resolved configuration and is the only thing
//! the driver talks to. Provider and remote execution are injected so the
//! same runner works against the real API or an in-memory stand-in.

use std::io::Write;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::{Config, Readiness};
use crate::error::Result;
use crate::providers::{ComputeProvider, InstanceSpec};
use crate::remote::RemoteExecutor;
use crate::startup_script::{self, BENCHMARK_LOG_PATH, STARTUP_SCRIPT};

/// Boot disk size for every instance.
pub const BOOT_DISK_SIZE_GB: u64 = 10;

/// Lists, creates and deletes benchmark instances and reads back results.
pub struct BenchRunner<P, R> {
    config: Config,
    provider: P,
    remote: R,
}

impl<P, R> BenchRunner<P, R>
where
    P: ComputeProvider,
    R: RemoteExecutor,
{
    /// Create a runner.
    ///
    /// # Errors
    /// Returns [`ConfigError`](crate::ConfigError) if the configuration has
    /// no project ID.
    pub fn new(config: Config, provider: P, remote: R) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            provider,
            remote,
        })
    }

    /// Creation request for `name`; everything except name and machine type
    /// comes from configuration.
    #[must_use]
    pub fn instance_spec(&self, name: &str, machine_type: &str) -> InstanceSpec {
        InstanceSpec {
            name: name.to_string(),
            machine_type: machine_type.to_string(),
            disk_size_gb: BOOT_DISK_SIZE_GB,
            source_image: self.config.source_image.clone(),
            network: self.config.network.clone(),
            startup_script: STARTUP_SCRIPT.to_string(),
        }
    }

    /// List instance names in provider order, reporting each to `out`.
    ///
    /// # Errors
    /// Returns a provider error if the listing fails.
    pub async fn list_instances<W: Write>(&self, out: &mut W) -> Result<Vec<String>> {
        writeln!(out, "Listing existing instances...")?;

        let instances = self.provider.list_instances().await?;
        let mut names = Vec::with_capacity(instances.len());
        for instance in instances {
            writeln!(out, " - Instance Name: {}", instance.name)?;
            names.push(instance.name);
        }

        if names.is_empty() {
            writeln!(out, "No instances found.")?;
        }

        debug!(count = names.len(), "Instances listed");
        Ok(names)
    }

    /// Create `name` with the benchmark startup script and wait for the
    /// insert operation to finish.
    ///
    /// No retries: a duplicate name or quota failure is returned as is.
    ///
    /// # Errors
    /// Returns a provider error if submission or the operation fails.
    pub async fn create_instance<W: Write>(
        &self,
        out: &mut W,
        name: &str,
        machine_type: &str,
    ) -> Result<()> {
        writeln!(out, "Starting instance creation...")?;
        writeln!(
            out,
            "Creating instance with name: {name} in zone: {}",
            self.config.zone
        )?;

        let op = self
            .provider
            .insert_instance(self.instance_spec(name, machine_type))
            .await?;
        self.provider
            .wait_for_operation(&op, self.config.operation_timeout)
            .await?;

        info!(name = %name, machine_type = %machine_type, "Instance created");
        writeln!(out, "Instance '{name}' created successfully.")?;
        Ok(())
    }

    /// Delete `name` and wait for the delete operation to finish.
    ///
    /// # Errors
    /// Returns [`ProviderError::NotFound`](crate::ProviderError::NotFound)
    /// if no such instance exists, or another provider error.
    pub async fn delete_instance<W: Write>(&self, out: &mut W, name: &str) -> Result<()> {
        let op = self.provider.delete_instance(name).await?;
        self.provider
            .wait_for_operation(&op, self.config.operation_timeout)
            .await?;

        info!(name = %name, "Instance deleted");
        writeln!(out, "Instance '{name}' deleted successfully.")?;
        Ok(())
    }

    /// Read the startup script log from `name`.
    ///
    /// Performs no retries and never modifies the instance.
    ///
    /// # Errors
    /// Returns [`RemoteExecError`](crate::RemoteExecError) if the session
    /// cannot be opened or the command fails.
    pub async fn fetch_benchmark_results(&self, name: &str) -> Result<String> {
        info!(name = %name, "Retrieving benchmark results");
        let output = self
            .remote
            .exec(name, &format!("cat {BENCHMARK_LOG_PATH}"))
            .await?;
        Ok(output)
    }

    /// Wait for the startup script on `name` according to the configured
    /// [`Readiness`] strategy.
    ///
    /// In poll mode, running out of time is not an error; the caller still
    /// fetches whatever the log holds.
    ///
    /// # Errors
    /// Only fails if writing to `out` fails.
    pub async fn wait_for_benchmarks<W: Write>(&self, out: &mut W, name: &str) -> Result<()> {
        let wait = self.config.wait_time;
        writeln!(
            out,
            "Waiting for benchmarks to complete ({} seconds)...",
            wait.as_secs()
        )?;

        match self.config.readiness {
            Readiness::Fixed => {
                tokio::time::sleep(wait).await;
            }
            Readiness::Poll => {
                let start = Instant::now();
                loop {
                    match self.fetch_benchmark_results(name).await {
                        Ok(log) if startup_script::is_complete(&log) => {
                            info!(
                                name = %name,
                                elapsed_secs = start.elapsed().as_secs(),
                                "Benchmarks finished"
                            );
                            return Ok(());
                        }
                        Ok(_) => debug!(name = %name, "Benchmarks still running"),
                        Err(e) => debug!(name = %name, error = %e, "Log not readable yet"),
                    }

                    let elapsed = start.elapsed();
                    if elapsed >= wait {
                        warn!(
                            name = %name,
                            wait_secs = wait.as_secs(),
                            "Benchmarks did not finish in time"
                        );
                        writeln!(
                            out,
                            "Benchmarks still running after {} seconds; results may be partial.",
                            wait.as_secs()
                        )?;
                        return Ok(());
                    }

                    tokio::time::sleep(self.config.poll_interval.min(wait - elapsed)).await;
                }
            }
        }

        Ok(())
    }
}
