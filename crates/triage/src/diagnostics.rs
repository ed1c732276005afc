//! Remote health diagnostics.
//!
//! Runs three commands on the app host over SSH and folds the results into a
//! single [`HealthRecord`]:
//! - container status (`service\tstate\tstatus` lines)
//! - job queue query (pass/fail only, rows are not inspected)
//! - disk usage (free text)
//!
//! Only the container listing is essential. If it fails the other two commands
//! are skipped and the record carries the error instead of services.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::command::{CommandOutput, CommandRunner, CommandSpec};
use crate::config::{Config, RemoteCommands, Timeouts};
use crate::log::DiagnosticsLog;

/// State reported by compose for a container that is up.
pub const RUNNING_STATE: &str = "running";

/// Placeholder for a signal that couldn't be collected.
pub const UNKNOWN: &str = "unknown";

/// One container service from the status listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub name: String,
    pub state: String,
    /// Human status text, e.g. "Up 2 hours"; may be empty
    pub status: String,
}

impl ServiceRecord {
    pub fn new(name: &str, state: &str, status: &str) -> Self {
        Self {
            name: name.to_string(),
            state: state.to_string(),
            status: status.to_string(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == RUNNING_STATE
    }
}

/// Job queue signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    /// The queue query succeeded
    Healthy,
    Unknown,
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Unknown => write!(f, "{UNKNOWN}"),
        }
    }
}

/// Aggregated outcome of one diagnostics pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub healthy: bool,
    pub services: Vec<ServiceRecord>,
    pub services_running: usize,
    pub services_total: usize,
    pub queue_status: QueueStatus,
    pub disk_usage: String,
    /// Set when the container listing itself could not be collected
    pub error: Option<String>,
}

impl HealthRecord {
    /// Build a record from parsed services and the secondary signals.
    ///
    /// An empty service list is never healthy.
    pub fn from_services(
        services: Vec<ServiceRecord>,
        queue_status: QueueStatus,
        disk_usage: impl Into<String>,
    ) -> Self {
        let services_total = services.len();
        let services_running = services.iter().filter(|s| s.is_running()).count();

        Self {
            healthy: services_total > 0 && services_running == services_total,
            services,
            services_running,
            services_total,
            queue_status,
            disk_usage: disk_usage.into(),
            error: None,
        }
    }

    /// Record for a host whose containers couldn't be listed.
    pub fn unavailable(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::from_services(Vec::new(), QueueStatus::Unknown, UNKNOWN)
        }
    }
}

/// Parse container status output into service records.
///
/// Blank lines and lines with fewer than two tab-separated fields are skipped.
/// Fields are kept verbatim so the state must match `running` exactly.
pub fn parse_services(stdout: &str) -> Vec<ServiceRecord> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let line = line.strip_suffix('\r').unwrap_or(line);
            let mut fields = line.split('\t');
            let name = fields.next()?;
            let state = fields.next()?;
            let status = fields.next().unwrap_or_default();
            Some(ServiceRecord::new(name, state, status))
        })
        .collect()
}

/// Collects health signals from the app host over SSH.
pub struct DiagnosticsCollector {
    runner: Arc<dyn CommandRunner>,
    host: String,
    ssh_key_path: PathBuf,
    commands: RemoteCommands,
    timeouts: Timeouts,
}

impl DiagnosticsCollector {
    pub fn new(runner: Arc<dyn CommandRunner>, config: &Config) -> Self {
        Self {
            runner,
            host: config.host.clone(),
            ssh_key_path: config.ssh_key_path.clone(),
            commands: config.commands.clone(),
            timeouts: config.timeouts,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn ssh(&self, command: &str, timeout: Duration, label: &str) -> CommandSpec {
        CommandSpec::new("ssh")
            .arg("-i")
            .arg(self.ssh_key_path.display().to_string())
            .args([
                "-o",
                "BatchMode=yes",
                "-o",
                "StrictHostKeyChecking=accept-new",
                "-o",
                "ConnectTimeout=10",
            ])
            .arg(self.host.as_str())
            .arg(command)
            .timeout(timeout)
            .label(format!("ssh {label}"))
    }

    /// Run a remote command, folding spawn failures into a failed output.
    async fn run(&self, spec: &CommandSpec) -> CommandOutput {
        match self.runner.run(spec).await {
            Ok(output) => output,
            Err(e) => CommandOutput::failure(e.to_string()),
        }
    }

    /// Run all three checks in order and aggregate them.
    pub async fn collect(&self, log: &dyn DiagnosticsLog) -> HealthRecord {
        log.info(&format!("Collecting diagnostics from {}", self.host));

        let spec = self.ssh(&self.commands.containers, self.timeouts.containers, "containers");
        let containers = self.run(&spec).await;
        if !containers.ok {
            log.error(&format!(
                "Container status check failed on {}: {}",
                self.host, containers.stderr
            ));
            return HealthRecord::unavailable(containers.stderr);
        }

        let services = parse_services(&containers.stdout);
        let listed = containers
            .stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .count();
        log.debug(&format!(
            "Parsed {} services ({} malformed lines skipped)",
            services.len(),
            listed - services.len()
        ));

        let spec = self.ssh(&self.commands.queue, self.timeouts.queue, "queue");
        let queue = self.run(&spec).await;
        let queue_status = if queue.ok {
            QueueStatus::Healthy
        } else {
            log.warn(&format!("Queue check failed: {}", queue.stderr));
            QueueStatus::Unknown
        };

        let spec = self.ssh(&self.commands.disk, self.timeouts.disk, "disk");
        let disk = self.run(&spec).await;
        let disk_usage = match disk.stdout.trim() {
            usage if disk.ok && !usage.is_empty() => usage.to_string(),
            _ => {
                if !disk.ok {
                    log.warn(&format!("Disk usage check failed: {}", disk.stderr));
                }
                UNKNOWN.to_string()
            }
        };

        let record = HealthRecord::from_services(services, queue_status, disk_usage);
        log.info(&format!(
            "Diagnostics complete: {}/{} services running, queue {}, healthy={}",
            record.services_running, record.services_total, record.queue_status, record.healthy
        ));
        record
    }
}
