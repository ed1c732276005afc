//! Workflow driver: fetch → diagnose → report → close or escalate.
//!
//! Each stage runs only after the previous one finished. A failure while
//! fetching or reporting ends the run in [`WorkflowState::Failed`]. A failed
//! close is logged and the run still ends in [`WorkflowState::Done`];
//! nothing is retried and nothing is persisted between runs, so running the
//! same issue twice posts two reports.

use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::command::{CommandRunner, LoggingRunner};
use crate::config::Config;
use crate::diagnostics::{DiagnosticsCollector, HealthRecord};
use crate::error::TriageError;
use crate::github::GitHubClient;
use crate::log::DiagnosticsLog;
use crate::report::{render_report, ReportContext, ReportPublisher};
use crate::resolver::{Resolution, Resolver};

/// Workflow stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Fetching,
    Diagnosing,
    Reporting,
    Closing,
    Escalating,
    Done,
    Failed,
}

impl WorkflowState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::Diagnosing => "diagnosing",
            Self::Reporting => "reporting",
            Self::Closing => "closing",
            Self::Escalating => "escalating",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one workflow run.
#[derive(Debug)]
pub struct RunSummary {
    pub issue_number: u64,
    pub final_state: WorkflowState,
    /// Stage that failed, when `final_state` is `Failed`
    pub failed_at: Option<WorkflowState>,
    pub health: Option<HealthRecord>,
    pub resolution: Option<Resolution>,
    /// Rendered report, present once diagnostics completed
    pub report: Option<String>,
    pub error: Option<TriageError>,
}

impl RunSummary {
    fn new(issue_number: u64) -> Self {
        Self {
            issue_number,
            final_state: WorkflowState::Fetching,
            failed_at: None,
            health: None,
            resolution: None,
            report: None,
            error: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.final_state == WorkflowState::Done
    }
}

/// Drives a single triage run.
pub struct Workflow {
    config: Config,
    github: GitHubClient,
    collector: DiagnosticsCollector,
    publisher: ReportPublisher,
    resolver: Resolver,
    log: Arc<dyn DiagnosticsLog>,
}

impl Workflow {
    pub fn new(
        config: Config,
        runner: Arc<dyn CommandRunner>,
        log: Arc<dyn DiagnosticsLog>,
    ) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(LoggingRunner::new(runner, log.clone()));
        let github = GitHubClient::new(
            runner.clone(),
            &config.repo,
            config.gh_token.clone(),
            config.timeouts.tracker,
        );
        let collector = DiagnosticsCollector::new(runner, &config);

        Self {
            publisher: ReportPublisher::new(github.clone()),
            resolver: Resolver::new(github.clone()),
            github,
            collector,
            config,
            log,
        }
    }

    fn enter(&self, summary: &mut RunSummary, next: WorkflowState) {
        self.log.debug(&format!(
            "Issue #{}: {} -> {}",
            summary.issue_number, summary.final_state, next
        ));
        summary.final_state = next;
    }

    fn fail(&self, summary: &mut RunSummary, error: TriageError) {
        summary.failed_at = Some(summary.final_state);
        summary.error = Some(error);
        self.enter(summary, WorkflowState::Failed);
    }

    /// Run the full workflow for one issue.
    pub async fn run(&self, issue_number: u64) -> RunSummary {
        let started = Instant::now();
        let mut summary = RunSummary::new(issue_number);
        let log = self.log.as_ref();

        log.info(&format!(
            "Starting triage for issue #{issue_number} in {}",
            self.config.repo
        ));

        let ticket = match self.github.view_issue(issue_number).await {
            Ok(ticket) => ticket,
            Err(e) => {
                log.error(&format!("Failed to fetch issue #{issue_number}: {e}"));
                self.fail(&mut summary, e);
                return summary;
            }
        };
        log.info(&format!(
            "Fetched issue #{issue_number}: \"{}\" by {} ({})",
            ticket.title, ticket.author.login, ticket.state
        ));

        self.enter(&mut summary, WorkflowState::Diagnosing);
        let health = self.collector.collect(log).await;

        self.enter(&mut summary, WorkflowState::Reporting);
        let ctx = ReportContext {
            ticket: &ticket,
            host: self.collector.host(),
            elapsed: started.elapsed(),
            generated_at: Utc::now(),
        };
        let report = render_report(&health, &ctx);
        summary.report = Some(report.clone());
        summary.health = Some(health.clone());

        if self.config.dry_run {
            log.info("Dry run: skipping report comment and close");
            self.enter(&mut summary, WorkflowState::Done);
            return summary;
        }

        if let Err(e) = self.publisher.publish(issue_number, &report, log).await {
            self.fail(&mut summary, e);
            return summary;
        }

        let next = if health.healthy {
            WorkflowState::Closing
        } else {
            WorkflowState::Escalating
        };
        self.enter(&mut summary, next);

        let resolution = self.resolver.resolve(issue_number, &health, log).await;
        summary.resolution = Some(resolution);
        self.enter(&mut summary, WorkflowState::Done);

        log.info(&format!(
            "Triage for issue #{issue_number} finished in {:.1}s: {}",
            started.elapsed().as_secs_f64(),
            summary.final_state
        ));
        summary
    }
}
