//! Remote command execution on instances.
//!
//! Instances may have no public SSH ingress, so commands go through
//! `gcloud compute ssh --tunnel-through-iap`.

use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::Config;

/// Errors from running a command on an instance.
#[derive(Error, Debug)]
pub enum RemoteExecError {
    /// The local SSH tooling could not be started.
    #[error("failed to start remote session via {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on the local session process failed.
    #[error("remote session I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The session could not be established or the command exited non-zero.
    #[error("remote command failed ({}): {output}", exit_label(.code))]
    Failed { code: Option<i32>, output: String },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

/// Runs a single command on a named instance and returns its output.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run `command` on `instance`, returning stdout and stderr combined in
    /// the order they were written.
    async fn exec(&self, instance: &str, command: &str) -> Result<String, RemoteExecError>;
}

/// `gcloud compute ssh` over an Identity-Aware Proxy tunnel.
#[derive(Debug, Clone)]
pub struct IapSsh {
    gcloud_bin: String,
    project_id: String,
    zone: String,
}

impl IapSsh {
    /// Build from the resolved configuration.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            gcloud_bin: config.gcloud_bin.clone(),
            project_id: config.project_id.clone(),
            zone: config.zone.clone(),
        }
    }

    /// Arguments passed to `gcloud`.
    fn args(&self, instance: &str, command: &str) -> Vec<String> {
        vec![
            "compute".to_string(),
            "ssh".to_string(),
            instance.to_string(),
            format!("--project={}", self.project_id),
            format!("--zone={}", self.zone),
            "--tunnel-through-iap".to_string(),
            "--command".to_string(),
            command.to_string(),
        ]
    }
}

#[async_trait]
impl RemoteExecutor for IapSsh {
    async fn exec(&self, instance: &str, command: &str) -> Result<String, RemoteExecError> {
        info!(instance = %instance, zone = %self.zone, "Running remote command over IAP");
        debug!(command = %command, "Remote command");

        let mut child = Command::new(&self.gcloud_bin)
            .args(self.args(instance, command))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RemoteExecError::Spawn {
                program: self.gcloud_bin.clone(),
                source,
            })?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_lines(stderr, tx.clone()));
        }
        drop(tx);

        let mut combined = Vec::new();
        while let Some(chunk) = rx.recv().await {
            combined.extend_from_slice(&chunk);
        }
        for reader in readers {
            let _ = reader.await;
        }

        let status = child.wait().await?;
        let combined = String::from_utf8_lossy(&combined).into_owned();

        if !status.success() {
            return Err(RemoteExecError::Failed {
                code: status.code(),
                output: combined,
            });
        }

        Ok(combined)
    }
}

/// Send each line of `stream`, newline included, to `tx` as it arrives.
fn forward_lines<S>(stream: S, tx: mpsc::UnboundedSender<Vec<u8>>) -> JoinHandle<()>
where
    S: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut line = Vec::new();
        loop {
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send(std::mem::take(&mut line)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "Stopped reading remote output");
                    break;
                }
            }
        }
    })
}
