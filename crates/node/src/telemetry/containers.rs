use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;

use super::TelemetryError;

/// A running container as reported by the runtime
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContainerRecord {
    /// Container name; the runtime may join several with `,`
    #[serde(rename = "Names")]
    pub names: String,
    /// Lifecycle state; older runtimes omit it
    #[serde(rename = "State", default)]
    pub state: String,
}

impl ContainerRecord {
    /// Primary container name
    pub fn name(&self) -> &str {
        self.names.split(',').next().unwrap_or_default().trim()
    }

    pub fn is_running(&self) -> bool {
        self.state.is_empty() || self.state == "running"
    }
}

/// Lists containers running on the host
#[async_trait::async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn list(&self) -> Result<Vec<ContainerRecord>, TelemetryError>;
}

/// [`ContainerRuntime`] backed by the `docker` CLI
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
    timeout: Duration,
}

impl DockerCli {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self { binary: binary.into(), timeout }
    }
}

#[async_trait::async_trait]
impl ContainerRuntime for DockerCli {
    async fn list(&self) -> Result<Vec<ContainerRecord>, TelemetryError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["ps", "--format", "{{json .}}"]);
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                TelemetryError::Enumeration(format!("{} ps exceeded {:?}", self.binary, self.timeout))
            })?
            .map_err(|e| TelemetryError::Enumeration(format!("{}: {e}", self.binary)))?;

        if !output.status.success() {
            return Err(TelemetryError::Enumeration(format!(
                "{} ps exited with {}: {}",
                self.binary,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_ps_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Decode `docker ps --format '{{json .}}'` output, one record per line
pub(crate) fn parse_ps_output(stdout: &str) -> Result<Vec<ContainerRecord>, TelemetryError> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            serde_json::from_str(line)
                .map_err(|e| TelemetryError::Enumeration(format!("unexpected ps record: {e}")))
        })
        .collect()
}
