//! End-to-end triage runs against a scripted command runner.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use triage::{
    CommandOutput, CommandRunner, CommandSpec, Config, LogLevel, MemoryLog, Resolution,
    TriageError, Workflow, WorkflowState,
};

const VIEW_JSON: &str = r#"{
    "title": "App returning 502",
    "body": "Since this morning",
    "author": {"login": "customer-success"},
    "state": "OPEN",
    "createdAt": "2026-10-19T07:15:00Z"
}"#;

/// Answers `gh` and `ssh` calls from a fixed script and records every call.
#[derive(Default)]
struct FakeRunbook {
    containers: String,
    responses: Vec<(&'static str, CommandOutput)>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl FakeRunbook {
    fn with_containers(containers: &str) -> Self {
        Self {
            containers: containers.to_string(),
            ..Self::default()
        }
    }

    fn on(mut self, pattern: &'static str, output: CommandOutput) -> Self {
        self.responses.push((pattern, output));
        self
    }

    fn lines(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|spec| format!("{} {}", spec.program, spec.args.join(" ")))
            .collect()
    }

    fn count(&self, pattern: &str) -> usize {
        self.lines().iter().filter(|l| l.contains(pattern)).count()
    }
}

#[async_trait]
impl CommandRunner for FakeRunbook {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, TriageError> {
        self.calls.lock().unwrap().push(spec.clone());
        let line = format!("{} {}", spec.program, spec.args.join(" "));

        if let Some((_, output)) = self.responses.iter().find(|(p, _)| line.contains(p)) {
            return Ok(output.clone());
        }

        let output = if line.contains("issue view") {
            CommandOutput::success(VIEW_JSON)
        } else if line.contains("docker compose ps") {
            CommandOutput::success(self.containers.clone())
        } else if line.contains("df -h") {
            CommandOutput::success("/dev/vda1  80G  31G  49G  39% /\n")
        } else {
            CommandOutput::success("")
        };
        Ok(output)
    }
}

fn comment_body(runner: &FakeRunbook) -> String {
    let calls = runner.calls.lock().unwrap();
    let spec = calls
        .iter()
        .find(|s| s.args.get(1).is_some_and(|a| a == "comment"))
        .expect("report comment posted");
    let idx = spec.args.iter().position(|a| a == "--body").unwrap();
    spec.args[idx + 1].clone()
}

#[tokio::test]
async fn test_one_exited_service_leaves_issue_open() {
    let runner = Arc::new(FakeRunbook::with_containers(
        "web\trunning\tUp 2h\nworker\trunning\tUp 2h\ndb\texited\tExited(1)\n",
    ));
    let log = Arc::new(MemoryLog::new());

    let summary = Workflow::new(Config::default(), runner.clone(), log.clone())
        .run(1234)
        .await;

    assert!(summary.succeeded());
    assert_eq!(summary.resolution, Some(Resolution::Escalated));
    let health = summary.health.as_ref().unwrap();
    assert_eq!(health.services_running, 2);
    assert_eq!(health.services_total, 3);
    assert!(!health.healthy);

    assert_eq!(runner.count("issue close"), 0);
    assert_eq!(runner.count("issue comment"), 1);
    assert_eq!(log.count(LogLevel::Warn), 1);

    let body = comment_body(&runner);
    assert!(body.contains("❌ `db`"));
    assert!(body.contains("✅ `web`"));
}

#[tokio::test]
async fn test_all_running_closes_issue() {
    let runner = Arc::new(FakeRunbook::with_containers(
        "web\trunning\tUp 2h\nworker\trunning\tUp 2h\ndb\trunning\tUp 2h\n",
    ));
    let log = Arc::new(MemoryLog::new());

    let summary = Workflow::new(Config::default(), runner.clone(), log.clone())
        .run(1234)
        .await;

    assert!(summary.succeeded());
    assert_eq!(summary.resolution, Some(Resolution::Closed));
    assert_eq!(log.count(LogLevel::Warn), 0);

    let closes: Vec<String> = runner
        .lines()
        .into_iter()
        .filter(|l| l.contains("issue close"))
        .collect();
    assert_eq!(closes.len(), 1);
    assert!(closes[0].contains("3 services operational"));
    assert!(closes[0].starts_with("gh issue close 1234 --repo acme/support"));
}

#[tokio::test]
async fn test_stage_order() {
    let runner = Arc::new(FakeRunbook::with_containers("web\trunning\tUp\n"));

    Workflow::new(Config::default(), runner.clone(), Arc::new(MemoryLog::new()))
        .run(8)
        .await;

    let lines = runner.lines();
    assert_eq!(lines.len(), 6);
    assert!(lines[0].starts_with("gh issue view 8"));
    assert!(lines[1].contains("docker compose ps"));
    assert!(lines[2].contains("psql"));
    assert!(lines[3].contains("df -h"));
    assert!(lines[4].starts_with("gh issue comment 8"));
    assert!(lines[5].starts_with("gh issue close 8"));
}

#[tokio::test]
async fn test_unreachable_host_reports_and_escalates() {
    let runner = Arc::new(
        FakeRunbook::default().on(
            "docker compose ps",
            CommandOutput::failure("ssh: connect to host app.internal port 22: Connection timed out"),
        ),
    );
    let log = Arc::new(MemoryLog::new());

    let summary = Workflow::new(Config::default(), runner.clone(), log.clone())
        .run(77)
        .await;

    assert_eq!(summary.final_state, WorkflowState::Done);
    assert_eq!(summary.resolution, Some(Resolution::Escalated));
    assert_eq!(runner.count("psql"), 0);
    assert_eq!(runner.count("df -h"), 0);
    assert!(comment_body(&runner).contains("Connection timed out"));
    assert_eq!(log.count(LogLevel::Warn), 1);
}

#[tokio::test]
async fn test_empty_listing_is_not_auto_closed() {
    let runner = Arc::new(FakeRunbook::with_containers(""));

    let summary = Workflow::new(Config::default(), runner.clone(), Arc::new(MemoryLog::new()))
        .run(5)
        .await;

    assert_eq!(summary.resolution, Some(Resolution::Escalated));
    assert_eq!(runner.count("issue close"), 0);
}

#[tokio::test]
async fn test_rerun_posts_duplicate_report() {
    let runner = Arc::new(FakeRunbook::with_containers("web\texited\tExited (137)\n"));
    let workflow = Workflow::new(Config::default(), runner.clone(), Arc::new(MemoryLog::new()));

    workflow.run(9).await;
    workflow.run(9).await;

    assert_eq!(runner.count("issue comment 9"), 2);
}

#[tokio::test]
async fn test_comment_timeout_fails_run() {
    let runner = Arc::new(
        FakeRunbook::with_containers("web\trunning\tUp\n").on(
            "issue comment",
            CommandOutput::timed_out(std::time::Duration::from_secs(30)),
        ),
    );

    let summary = Workflow::new(Config::default(), runner.clone(), Arc::new(MemoryLog::new()))
        .run(11)
        .await;

    assert_eq!(summary.failed_at, Some(WorkflowState::Reporting));
    let error = summary.error.unwrap();
    assert_eq!(error.kind(), triage::ErrorKind::Timeout);
    assert_eq!(error.to_string(), "gh issue comment timed out after 30s");
    assert_eq!(runner.count("issue close"), 0);
}

#[tokio::test]
async fn test_close_failure_keeps_report_and_exits_clean() {
    let runner = Arc::new(
        FakeRunbook::with_containers("web\trunning\tUp 2h\nworker\trunning\tUp 2h\n")
            .on("issue close", CommandOutput::failure("HTTP 502")),
    );
    let log = Arc::new(MemoryLog::new());

    let summary = Workflow::new(Config::default(), runner.clone(), log.clone())
        .run(1234)
        .await;

    assert!(summary.succeeded());
    assert_eq!(summary.final_state, WorkflowState::Done);
    assert_eq!(summary.resolution, Some(Resolution::CloseFailed));
    assert_eq!(runner.count("issue comment"), 1);
    assert_eq!(runner.count("issue close"), 1);
    assert_eq!(log.count(LogLevel::Error), 1);
    assert!(log.messages(LogLevel::Error)[0].contains("HTTP 502"));
}

#[tokio::test]
async fn test_padded_running_state_is_not_auto_closed() {
    let runner = Arc::new(FakeRunbook::with_containers("web\t running \tUp\n"));

    let summary = Workflow::new(Config::default(), runner.clone(), Arc::new(MemoryLog::new()))
        .run(6)
        .await;

    assert_eq!(summary.health.as_ref().map(|h| h.services_running), Some(0));
    assert_eq!(summary.resolution, Some(Resolution::Escalated));
    assert_eq!(runner.count("issue close"), 0);
}
