//! External command execution.
//!
//! Every collaborator (`gh`, `ssh`) is reached through a [`CommandRunner`], so
//! the workflow can be driven by a scripted runner in tests. [`ProcessRunner`]
//! is the real implementation: it spawns the child with piped output and kills
//! it if the deadline passes.

use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::error::{Result, TriageError};
use crate::log::DiagnosticsLog;

/// Bound applied to commands that don't set their own timeout.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// A single command invocation.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
    /// Short name used in logs and errors (e.g. `gh issue view`)
    pub label: String,
}

impl CommandSpec {
    #[must_use]
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            env: Vec::new(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
            label: program.to_string(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// Outcome of one command execution.
///
/// A timeout is reported here rather than as an error so callers that only
/// degrade a signal can treat it like any other failed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub ok: bool,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            ok: true,
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    pub fn failure(stderr: impl Into<String>) -> Self {
        Self {
            ok: false,
            stderr: stderr.into(),
            ..Self::default()
        }
    }

    pub fn timed_out(after: Duration) -> Self {
        Self {
            ok: false,
            stderr: format!("timed out after {}s", after.as_secs()),
            timed_out: true,
            ..Self::default()
        }
    }

    /// Convert into the command's stdout, or the matching stage error.
    pub fn into_stdout(self, spec: &CommandSpec) -> Result<String> {
        if self.timed_out {
            return Err(TriageError::Timeout {
                command: spec.label.clone(),
                secs: spec.timeout.as_secs(),
            });
        }
        if !self.ok {
            return Err(TriageError::CommandFailed {
                command: spec.label.clone(),
                stderr: self.stderr,
            });
        }
        Ok(self.stdout)
    }
}

/// Executes external commands.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion or until its timeout.
    ///
    /// Only failures to start or wait on the process are errors; non-zero
    /// exits and timeouts come back as a [`CommandOutput`] with `ok == false`.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

/// Runs commands as local child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        debug!(command = %spec.label, timeout_secs = spec.timeout.as_secs(), "Running command");

        let child = Command::new(&spec.program)
            .args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TriageError::Unexpected(format!("failed to spawn {}: {e}", spec.label)))?;

        // Dropping the wait future on timeout drops the child, which kills it
        match timeout(spec.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                let mut stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                if !output.status.success() && stderr.is_empty() {
                    stderr = format!("exited with {}", output.status);
                }
                Ok(CommandOutput {
                    ok: output.status.success(),
                    stdout,
                    stderr,
                    timed_out: false,
                })
            }
            Ok(Err(e)) => Err(TriageError::Unexpected(format!(
                "failed waiting on {}: {e}",
                spec.label
            ))),
            Err(_) => Ok(CommandOutput::timed_out(spec.timeout)),
        }
    }
}

/// Records an `Executing: <label>` line in the diagnostics log before each
/// command it delegates.
pub struct LoggingRunner {
    inner: Arc<dyn CommandRunner>,
    log: Arc<dyn DiagnosticsLog>,
}

impl LoggingRunner {
    pub fn new(inner: Arc<dyn CommandRunner>, log: Arc<dyn DiagnosticsLog>) -> Self {
        Self { inner, log }
    }
}

#[async_trait]
impl CommandRunner for LoggingRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.log.info(&format!("Executing: {}", spec.label));
        self.inner.run(spec).await
    }
}
