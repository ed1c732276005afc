//! Scripted command runner for unit tests.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::command::{CommandOutput, CommandRunner, CommandSpec};
use crate::error::{Result, TriageError};

/// Returns canned outputs for commands whose rendered line contains a pattern.
///
/// Unmatched commands succeed with empty stdout.
#[derive(Default)]
pub struct ScriptedRunner {
    responses: Mutex<Vec<(String, Option<CommandOutput>)>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, pattern: &str, output: CommandOutput) {
        self.responses
            .lock()
            .unwrap()
            .push((pattern.to_string(), Some(output)));
    }

    /// Make matching commands fail to spawn.
    pub fn on_spawn_error(&self, pattern: &str) {
        self.responses
            .lock()
            .unwrap()
            .push((pattern.to_string(), None));
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls whose rendered line contains `pattern`.
    pub fn count(&self, pattern: &str) -> usize {
        self.calls()
            .iter()
            .filter(|spec| render(spec).contains(pattern))
            .count()
    }
}

fn render(spec: &CommandSpec) -> String {
    format!("{} {}", spec.program, spec.args.join(" "))
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(spec.clone());

        let line = render(spec);
        let responses = self.responses.lock().unwrap();
        match responses.iter().find(|(pattern, _)| line.contains(pattern.as_str())) {
            Some((_, Some(output))) => Ok(output.clone()),
            Some((_, None)) => Err(TriageError::Unexpected(format!(
                "failed to spawn {}",
                spec.label
            ))),
            None => Ok(CommandOutput::success("")),
        }
    }
}
