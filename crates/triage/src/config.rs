//! Run configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::command::DEFAULT_COMMAND_TIMEOUT;

/// Default repository holding support tickets.
pub const DEFAULT_REPO: &str = "acme/support";
/// Default SSH destination for diagnostics.
pub const DEFAULT_HOST: &str = "deploy@app.internal";
/// Default private key used for SSH.
pub const DEFAULT_SSH_KEY: &str = "~/.ssh/id_ed25519";
/// Default directory containing the compose project on the host.
pub const DEFAULT_COMPOSE_DIR: &str = "/opt/app";
/// Default diagnostics log file.
pub const DEFAULT_LOG_FILE: &str = "/tmp/triage-diagnostics.log";

/// Per-command deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub tracker: Duration,
    pub containers: Duration,
    pub queue: Duration,
    pub disk: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            tracker: DEFAULT_COMMAND_TIMEOUT,
            containers: Duration::from_secs(20),
            queue: Duration::from_secs(15),
            disk: Duration::from_secs(10),
        }
    }
}

/// Shell commands executed on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommands {
    /// Must print `service\tstate\tstatus` lines
    pub containers: String,
    /// Only the exit status is consulted
    pub queue: String,
    pub disk: String,
}

impl RemoteCommands {
    /// Default commands for a compose project rooted at `compose_dir`.
    #[must_use]
    pub fn for_compose_dir(compose_dir: &str) -> Self {
        Self {
            containers: format!(
                "cd {compose_dir} && docker compose ps --all --format '{{{{.Service}}}}\\t{{{{.State}}}}\\t{{{{.Status}}}}'"
            ),
            queue: format!(
                "cd {compose_dir} && docker compose exec -T db psql -U postgres -tAc \"SELECT status, COUNT(*) FROM jobs GROUP BY status\""
            ),
            disk: "df -h / | tail -n 1".to_string(),
        }
    }
}

impl Default for RemoteCommands {
    fn default() -> Self {
        Self::for_compose_dir(DEFAULT_COMPOSE_DIR)
    }
}

/// Everything a run needs, built once and passed to each stage.
#[derive(Debug, Clone)]
pub struct Config {
    /// Tracker repository, `owner/name`
    pub repo: String,
    /// SSH destination, `user@host`
    pub host: String,
    pub ssh_key_path: PathBuf,
    pub log_file: PathBuf,
    /// Forwarded to `gh` as `GH_TOKEN` when present
    pub gh_token: Option<String>,
    pub timeouts: Timeouts,
    pub commands: RemoteCommands,
    /// Render the report without commenting or closing
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repo: DEFAULT_REPO.to_string(),
            host: DEFAULT_HOST.to_string(),
            ssh_key_path: expand_home(DEFAULT_SSH_KEY),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            gh_token: None,
            timeouts: Timeouts::default(),
            commands: RemoteCommands::default(),
            dry_run: false,
        }
    }
}

/// Read the tracker token from `GH_TOKEN`, falling back to `GITHUB_TOKEN`.
pub fn token_from_env() -> Option<String> {
    ["GH_TOKEN", "GITHUB_TOKEN"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.trim().is_empty())
}

/// Expand a leading `~/` using `HOME`.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return Path::new(&home).join(rest);
        }
    }
    PathBuf::from(path)
}
