//! Per-task results and the aggregated dispatch verdict.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::EventKind;

/// Message recorded for a task whose outcome was not known in time
pub const STILL_RUNNING: &str =
    "Still running async, but answering. Check log for detailed result...";

/// Exit status recorded when a task never produced one of its own
pub const FAILED_TO_RUN: i32 = -1;

/// What a task invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// External executable run as a subprocess
    Action,

    /// In-process plugin call
    Hook,
}

/// Outcome of a single task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub name: String,

    pub kind: TaskKind,

    pub stdout: String,

    pub stderr: String,

    /// `None` when the task did not finish before its timeout
    pub exit_status: Option<i32>,

    pub timed_out: bool,

    /// Wall-clock time spent waiting on the task
    pub duration_ms: Option<u64>,
}

impl ExecutionResult {
    pub fn finished(
        name: impl Into<String>,
        kind: TaskKind,
        exit_status: i32,
        stdout: String,
        stderr: String,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            stdout,
            stderr,
            exit_status: Some(exit_status),
            timed_out: false,
            duration_ms: None,
        }
    }

    /// A task that could not be run at all (spawn error, hook error, panic)
    pub fn failed_to_run(name: impl Into<String>, kind: TaskKind, error: impl Into<String>) -> Self {
        Self::finished(name, kind, FAILED_TO_RUN, String::new(), error.into())
    }

    /// A task still running when its wait expired; its outcome is unknown
    pub fn timed_out(name: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            name: name.into(),
            kind,
            stdout: STILL_RUNNING.to_string(),
            stderr: STILL_RUNNING.to_string(),
            exit_status: None,
            timed_out: true,
            duration_ms: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// True only for a known, non-zero exit status
    pub fn is_failure(&self) -> bool {
        !self.timed_out && matches!(self.exit_status, Some(status) if status != 0)
    }

    /// Verdict log lines for this result, in order
    pub fn log_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if self.timed_out {
            lines.push(format!("[{}]:{}", self.name, STILL_RUNNING));
            return lines;
        }
        if self.kind == TaskKind::Action {
            lines.push(format!("[{}]:ProcOut:\n{}", self.name, self.stdout));
            lines.push(format!("[{}]:ProcErr:\n{}", self.name, self.stderr));
        } else if !self.stderr.is_empty() {
            lines.push(format!("[{}]:{}", self.name, self.stderr));
        }
        if self.is_failure() {
            lines.push(format!("[{}]:Failed!", self.name));
        } else {
            lines.push(format!("[{}]:Success!", self.name));
        }
        lines
    }
}

/// Aggregate pass/fail status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Success only if both sides succeeded
    pub fn and(self, other: Outcome) -> Outcome {
        if self.is_success() && other.is_success() {
            Self::Success
        } else {
            Self::Failure
        }
    }
}

/// Results of one engine run, in submission order.
///
/// On failure the list stops at the failing task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub outcome: Outcome,
    pub results: Vec<ExecutionResult>,
    pub log: Vec<String>,
}

impl RunReport {
    pub fn empty() -> Self {
        Self {
            outcome: Outcome::Success,
            results: Vec::new(),
            log: Vec::new(),
        }
    }
}

/// The aggregated outcome of one dispatch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchVerdict {
    pub dispatch_id: Uuid,

    pub received_at: DateTime<Utc>,

    pub event: EventKind,

    pub overall_status: Outcome,

    pub action_log: Vec<String>,

    pub hook_log: Vec<String>,

    pub actions: Vec<ExecutionResult>,

    pub hooks: Vec<ExecutionResult>,
}

impl DispatchVerdict {
    /// Merge the action and hook runs of one dispatch
    pub fn new(event: EventKind, actions: RunReport, hooks: RunReport) -> Self {
        Self {
            dispatch_id: Uuid::new_v4(),
            received_at: Utc::now(),
            event,
            overall_status: actions.outcome.and(hooks.outcome),
            action_log: actions.log,
            hook_log: hooks.log,
            actions: actions.results,
            hooks: hooks.results,
        }
    }

    pub fn is_success(&self) -> bool {
        self.overall_status.is_success()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} actions and {} hooks executed for event '{}'",
            self.actions.len(),
            self.hooks.len(),
            self.event
        )
    }

    /// Both logs, actions first
    pub fn full_log(&self) -> String {
        self.action_log
            .iter()
            .chain(self.hook_log.iter())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
