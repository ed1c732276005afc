//! Triage report rendering and publishing.

use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::time::Duration;

use crate::diagnostics::HealthRecord;
use crate::error::Result;
use crate::github::{GitHubClient, Ticket};
use crate::log::DiagnosticsLog;

/// Services listed individually before the "and N more" line.
pub const MAX_LISTED_SERVICES: usize = 10;

/// Inputs to the report besides the health record.
#[derive(Debug, Clone)]
pub struct ReportContext<'a> {
    pub ticket: &'a Ticket,
    pub host: &'a str,
    pub elapsed: Duration,
    pub generated_at: DateTime<Utc>,
}

/// Render the triage report as Markdown.
pub fn render_report(health: &HealthRecord, ctx: &ReportContext<'_>) -> String {
    let mut msg = String::new();

    if health.healthy {
        msg.push_str("## ✅ Automated Triage: All Systems Operational\n\n");
    } else {
        msg.push_str("## ⚠️ Automated Triage: Attention Required\n\n");
    }

    msg.push_str("### 🔍 Diagnosis\n\n");
    let _ = writeln!(
        msg,
        "- **Services running**: {}/{}",
        health.services_running, health.services_total
    );
    let _ = writeln!(msg, "- **Job queue**: {}", health.queue_status);
    let _ = writeln!(msg, "- **Disk usage**: `{}`", health.disk_usage);
    if let Some(error) = &health.error {
        let _ = writeln!(msg, "- **Collection error**: `{}`", error.trim());
    }
    msg.push('\n');

    msg.push_str("### 🛠️ Actions Taken\n\n");
    let _ = writeln!(
        msg,
        "1. Reviewed issue #{} (\"{}\") opened by @{}",
        ctx.ticket.id, ctx.ticket.title, ctx.ticket.author.login
    );
    let _ = writeln!(msg, "2. Connected to `{}` and checked container status", ctx.host);
    msg.push_str("3. Checked job queue and disk usage\n");
    if health.healthy {
        msg.push_str("4. Verified every service is running; closing this issue\n\n");
    } else {
        msg.push_str("4. Found services that need attention; leaving this issue open for manual review\n\n");
    }

    msg.push_str("### 📋 Service Status\n\n");
    if health.services.is_empty() {
        msg.push_str("_No services reported._\n");
    }
    for service in health.services.iter().take(MAX_LISTED_SERVICES) {
        let icon = if service.is_running() { "✅" } else { "❌" };
        let _ = write!(msg, "- {icon} `{}`: {}", service.name, service.state);
        if !service.status.is_empty() {
            let _ = write!(msg, " ({})", service.status);
        }
        msg.push('\n');
    }
    if health.services_total > MAX_LISTED_SERVICES {
        let _ = writeln!(
            msg,
            "- ...and {} more",
            health.services_total - MAX_LISTED_SERVICES
        );
    }
    msg.push('\n');

    msg.push_str("### 📊 Resources\n\n");
    let _ = writeln!(msg, "| Check | Result |");
    let _ = writeln!(msg, "|-------|--------|");
    let _ = writeln!(msg, "| Job queue | {} |", health.queue_status);
    let _ = writeln!(msg, "| Disk | `{}` |", health.disk_usage);
    msg.push('\n');

    msg.push_str("### 🛡️ Prevention\n\n");
    if health.healthy {
        msg.push_str(
            "All services are healthy. If the problem comes back, reopen this issue \
             with the time it occurred so logs can be correlated.\n\n",
        );
    } else {
        msg.push_str(
            "Automated checks could not confirm recovery. An operator should inspect \
             the failing services and their logs before this issue is closed.\n\n",
        );
    }

    msg.push_str("---\n");
    let _ = writeln!(
        msg,
        "_Automated diagnostics completed in {:.1}s at {}_",
        ctx.elapsed.as_secs_f64(),
        ctx.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    msg
}

/// Posts rendered reports as issue comments.
pub struct ReportPublisher {
    github: GitHubClient,
}

impl ReportPublisher {
    #[must_use]
    pub fn new(github: GitHubClient) -> Self {
        Self { github }
    }

    pub async fn publish(
        &self,
        issue_number: u64,
        report: &str,
        log: &dyn DiagnosticsLog,
    ) -> Result<()> {
        match self.github.add_issue_comment(issue_number, report).await {
            Ok(()) => {
                log.info(&format!("Posted triage report to issue #{issue_number}"));
                Ok(())
            }
            Err(e) => {
                log.error(&format!(
                    "Failed to post triage report to issue #{issue_number}: {e}"
                ));
                Err(e)
            }
        }
    }
}
