//! Close-or-escalate decision for a triaged issue.

use crate::diagnostics::HealthRecord;
use crate::github::GitHubClient;
use crate::log::DiagnosticsLog;

/// What the resolver did with the issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Issue closed with a confirmation comment
    Closed,
    /// Issue left open for a human
    Escalated,
    /// Issue was healthy but `gh issue close` failed; the report stays posted
    CloseFailed,
}

/// Comment attached when closing a healthy issue.
pub fn close_comment(services_total: usize) -> String {
    format!(
        "✅ Verified healthy - Closing automatically. All {services_total} services operational. \
         Reopen if issues persist."
    )
}

/// Closes issues whose diagnostics came back healthy.
pub struct Resolver {
    github: GitHubClient,
}

impl Resolver {
    #[must_use]
    pub fn new(github: GitHubClient) -> Self {
        Self { github }
    }

    /// Close the issue if `health` is healthy, otherwise leave it open.
    ///
    /// Leaving it open is the whole escalation: one warning, no other action.
    /// A failed close is logged and returned as [`Resolution::CloseFailed`];
    /// the posted report stands.
    pub async fn resolve(
        &self,
        issue_number: u64,
        health: &HealthRecord,
        log: &dyn DiagnosticsLog,
    ) -> Resolution {
        if !health.healthy {
            log.warn(&format!(
                "Issue #{issue_number} not auto-resolved: {}/{} services running, leaving open",
                health.services_running, health.services_total
            ));
            return Resolution::Escalated;
        }

        let comment = close_comment(health.services_total);
        if let Err(e) = self.github.close_issue(issue_number, &comment).await {
            log.error(&format!("Failed to close issue #{issue_number}: {e}"));
            return Resolution::CloseFailed;
        }

        log.info(&format!(
            "Closed issue #{issue_number} in {}",
            self.github.repo()
        ));
        Resolution::Closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandOutput;
    use crate::diagnostics::{QueueStatus, ServiceRecord};
    use crate::log::{LogLevel, MemoryLog};
    use crate::testing::ScriptedRunner;
    use std::sync::Arc;
    use std::time::Duration;

    fn resolver(runner: &Arc<ScriptedRunner>) -> Resolver {
        Resolver::new(GitHubClient::new(
            runner.clone(),
            "acme/support",
            None,
            Duration::from_secs(30),
        ))
    }

    fn health(states: &[&str]) -> HealthRecord {
        let services = states
            .iter()
            .enumerate()
            .map(|(i, state)| ServiceRecord::new(&format!("svc{i}"), state, ""))
            .collect();
        HealthRecord::from_services(services, QueueStatus::Healthy, "1%")
    }

    #[test]
    fn test_close_comment() {
        assert_eq!(
            close_comment(3),
            "✅ Verified healthy - Closing automatically. All 3 services operational. \
             Reopen if issues persist."
        );
    }

    #[tokio::test]
    async fn test_healthy_closes_once() {
        let runner = Arc::new(ScriptedRunner::new());
        let log = MemoryLog::new();

        let resolution = resolver(&runner)
            .resolve(5, &health(&["running", "running", "running"]), &log)
            .await;

        assert_eq!(resolution, Resolution::Closed);
        assert_eq!(runner.count("issue close"), 1);
        assert!(runner.calls()[0]
            .args
            .iter()
            .any(|a| a.contains("3 services operational")));
        assert_eq!(log.count(LogLevel::Warn), 0);
    }

    #[tokio::test]
    async fn test_unhealthy_leaves_open() {
        let runner = Arc::new(ScriptedRunner::new());
        let log = MemoryLog::new();

        let resolution = resolver(&runner)
            .resolve(5, &health(&["running", "exited"]), &log)
            .await;

        assert_eq!(resolution, Resolution::Escalated);
        assert!(runner.calls().is_empty());
        assert_eq!(log.count(LogLevel::Warn), 1);
        assert!(log.messages(LogLevel::Warn)[0].contains("1/2"));
    }

    #[tokio::test]
    async fn test_empty_listing_leaves_open() {
        let runner = Arc::new(ScriptedRunner::new());
        let resolution = resolver(&runner)
            .resolve(5, &health(&[]), &MemoryLog::new())
            .await;

        assert_eq!(resolution, Resolution::Escalated);
        assert_eq!(runner.count("issue close"), 0);
    }

    #[tokio::test]
    async fn test_close_failure_is_reported() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("issue close", CommandOutput::failure("HTTP 502"));
        let log = MemoryLog::new();

        let resolution = resolver(&runner)
            .resolve(5, &health(&["running"]), &log)
            .await;

        assert_eq!(resolution, Resolution::CloseFailed);
        assert_eq!(runner.count("issue close"), 1);
        assert_eq!(log.count(LogLevel::Error), 1);
    }
}
