//! Ticket triage runbook.
//!
//! Fetches a support issue, checks the app host's containers, job queue and
//! disk over SSH, posts a report on the issue, and closes it when every
//! container is running.

pub mod command;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod github;
pub mod log;
pub mod report;
pub mod resolver;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use command::{CommandOutput, CommandRunner, CommandSpec, LoggingRunner, ProcessRunner};
pub use config::Config;
pub use diagnostics::{HealthRecord, QueueStatus, ServiceRecord};
pub use error::{ErrorKind, TriageError};
pub use log::{DiagnosticsLog, FileLog, LogLevel, MemoryLog};
pub use resolver::Resolution;
pub use workflow::{RunSummary, Workflow, WorkflowState};
