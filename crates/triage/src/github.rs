//! Ticket tracker access via the `gh` CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::command::{CommandRunner, CommandSpec};
use crate::error::{Result, TriageError};

/// Fields requested from `gh issue view --json`.
pub const TICKET_FIELDS: &str = "title,body,author,state,createdAt";

/// A support ticket, fetched via `gh issue view --json`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    /// Not part of the `gh` payload; filled in from the requested number
    #[serde(default)]
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub author: Author,
    pub state: String,
    pub created_at: DateTime<Utc>,
}

/// Ticket author
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Author {
    pub login: String,
}

impl Ticket {
    /// Parse from `gh issue view --json` output
    pub fn from_gh_output(id: u64, json: &str) -> Result<Self> {
        let mut ticket: Self =
            serde_json::from_str(json).map_err(|source| TriageError::MalformedJson {
                command: "gh issue view".to_string(),
                source,
            })?;
        ticket.id = id;
        Ok(ticket)
    }
}

/// GitHub client for interacting with issues via the `gh` CLI
#[derive(Clone)]
pub struct GitHubClient {
    runner: Arc<dyn CommandRunner>,
    /// Repository path (owner/repo)
    repo: String,
    token: Option<String>,
    timeout: Duration,
}

impl GitHubClient {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        repo: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            repo: repo.to_string(),
            token,
            timeout,
        }
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    fn gh(&self, subcommand: &str, issue_number: u64) -> CommandSpec {
        let mut spec = CommandSpec::new("gh")
            .args(["issue", subcommand])
            .arg(issue_number.to_string())
            .args(["--repo", self.repo.as_str()])
            .timeout(self.timeout)
            .label(format!("gh issue {subcommand}"));
        if let Some(token) = &self.token {
            spec = spec.env("GH_TOKEN", token);
        }
        spec
    }

    /// Fetch an issue's title, body, author, state and creation time.
    pub async fn view_issue(&self, issue_number: u64) -> Result<Ticket> {
        let spec = self.gh("view", issue_number).args(["--json", TICKET_FIELDS]);
        debug!(repo = %self.repo, issue = issue_number, "Fetching issue");

        let stdout = self.runner.run(&spec).await?.into_stdout(&spec)?;
        Ticket::from_gh_output(issue_number, &stdout)
    }

    /// Add a comment to an issue
    pub async fn add_issue_comment(&self, issue_number: u64, body: &str) -> Result<()> {
        let spec = self.gh("comment", issue_number).args(["--body", body]);
        self.runner.run(&spec).await?.into_stdout(&spec)?;
        Ok(())
    }

    /// Close an issue with a closing comment
    pub async fn close_issue(&self, issue_number: u64, comment: &str) -> Result<()> {
        let spec = self.gh("close", issue_number).args(["--comment", comment]);
        self.runner.run(&spec).await?.into_stdout(&spec)?;
        Ok(())
    }
}
