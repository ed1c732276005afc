//! Triage CLI
//!
//! Runs the triage runbook for one support issue:
//! `triage <issue_number>` exits 0 when the run completes and 1 otherwise.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use triage::config::{
    self, RemoteCommands, DEFAULT_COMPOSE_DIR, DEFAULT_HOST, DEFAULT_LOG_FILE, DEFAULT_REPO,
    DEFAULT_SSH_KEY,
};
use triage::{Config, FileLog, ProcessRunner, Resolution, RunSummary, Workflow};

/// Diagnose the app host for a support issue, report back, and auto-close when healthy
#[derive(Parser)]
#[command(name = "triage")]
#[command(version)]
struct Cli {
    /// Issue number to triage
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    issue_number: u64,

    /// Repository holding the issue (owner/name)
    #[arg(long, env = "TRIAGE_REPO", default_value = DEFAULT_REPO)]
    repo: String,

    /// SSH destination for diagnostics (user@host)
    #[arg(long, env = "TRIAGE_HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// Private key used for SSH
    #[arg(long, env = "TRIAGE_SSH_KEY", default_value = DEFAULT_SSH_KEY)]
    ssh_key: String,

    /// Compose project directory on the host
    #[arg(long, env = "TRIAGE_COMPOSE_DIR", default_value = DEFAULT_COMPOSE_DIR)]
    compose_dir: String,

    /// Append-only diagnostics log
    #[arg(long, env = "TRIAGE_LOG_FILE", default_value = DEFAULT_LOG_FILE)]
    log_file: PathBuf,

    /// Print the report instead of commenting on or closing the issue
    #[arg(long)]
    dry_run: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> Config {
        let gh_token = config::token_from_env();
        if gh_token.is_none() {
            debug!("No GH_TOKEN or GITHUB_TOKEN set, relying on gh's own auth");
        }

        Config {
            repo: self.repo,
            host: self.host,
            ssh_key_path: config::expand_home(&self.ssh_key),
            log_file: self.log_file,
            gh_token,
            commands: RemoteCommands::for_compose_dir(&self.compose_dir),
            dry_run: self.dry_run,
            ..Config::default()
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "triage=debug" } else { "triage=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Exit status for a command line clap rejected or answered itself.
///
/// Usage errors exit 1; `--help` and `--version` exit 0.
fn usage_exit_status(err: &clap::Error) -> u8 {
    u8::from(err.use_stderr())
}

fn print_summary(summary: &RunSummary, dry_run: bool) {
    let issue = summary.issue_number;

    if let Some(error) = &summary.error {
        let stage = summary
            .failed_at
            .map_or_else(|| "unknown".to_string(), |s| s.to_string());
        println!(
            "{} triage of issue #{issue} failed while {stage}: {error}",
            "✗".red().bold()
        );
        return;
    }

    if dry_run {
        if let Some(report) = &summary.report {
            println!("{report}");
        }
        println!("{} dry run for issue #{issue} complete", "✓".green().bold());
        return;
    }

    match summary.resolution {
        Some(Resolution::Closed) => {
            println!("{} issue #{issue} resolved and closed", "✓".green().bold());
        }
        Some(Resolution::CloseFailed) => {
            println!(
                "{} issue #{issue} reported healthy but could not be closed",
                "!".yellow().bold()
            );
        }
        Some(Resolution::Escalated) | None => {
            println!(
                "{} issue #{issue} left open for manual review",
                "!".yellow().bold()
            );
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(usage_exit_status(&e));
        }
    };

    init_tracing(cli.verbose);

    let dry_run = cli.dry_run;
    match run(cli).await {
        Ok(summary) => {
            print_summary(&summary, dry_run);
            if summary.succeeded() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            error!("Triage aborted: {e:?}");
            println!("{} triage aborted: {e}", "✗".red().bold());
            ExitCode::FAILURE
        }
    }
}

/// Run the workflow on its own task so a panic surfaces as an error here.
async fn run(cli: Cli) -> Result<RunSummary> {
    let issue_number = cli.issue_number;
    let config = cli.into_config();
    let log = Arc::new(FileLog::open(&config.log_file));
    debug!(path = %log.path().display(), "Diagnostics log opened");

    let workflow = Workflow::new(config, Arc::new(ProcessRunner), log);
    tokio::spawn(async move { workflow.run(issue_number).await })
        .await
        .with_context(|| format!("Triage workflow for issue #{issue_number} panicked"))
}
