//! Bounded-concurrency task runner.
//!
//! Tasks are submitted to a worker pool of `workers` permits (one per task
//! when unset). Results are then awaited one at a time in submission order,
//! each with its own wall-clock timeout:
//!
//! - A wait that expires records the task as timed out with an unknown exit
//!   status. The task is left running and logs its own outcome when it
//!   finishes. A timeout alone never fails the run.
//! - The first task with a non-zero exit status ends the run as a failure.
//!   Tasks after it are neither awaited nor reported, and keep running.
//!
//! `cancel_on_timeout` hardens the first rule: the timed-out task is aborted
//! and an action subprocess is killed. Hooks already running on a blocking
//! thread cannot be interrupted and run to completion regardless.
//!
//! Tasks left behind by either rule are kept in [`DetachedTasks`] so a
//! short-lived process can wait for them with [`DetachedTasks::drain`]
//! before exiting.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::hook::{Hook, HookArgs};
use crate::config::ResolvedConfig;
use crate::domain::{Event, ExecutionResult, Outcome, RunReport, TaskKind};

/// An external executable to run with a JSON argument document
#[derive(Debug, Clone)]
pub struct ActionTask {
    /// File name within the action namespace
    pub name: String,
    pub program: PathBuf,
    /// Written to a transient file whose path is `argv[1]`
    pub arguments: Value,
    /// Passed as `argv[2]`
    pub event: String,
}

/// Where a hook's arguments come from
#[derive(Debug, Clone)]
pub enum HookInput {
    Args(HookArgs),

    /// Built by the hook's own `get_args` on the worker thread, so a
    /// misbehaving plugin fails its task instead of the dispatch
    Event {
        event: Event,
        config: Arc<ResolvedConfig>,
    },
}

/// An in-process hook and its arguments
#[derive(Debug, Clone)]
pub struct HookTask {
    pub hook: Hook,
    pub input: HookInput,
}

impl HookTask {
    pub fn with_args(hook: Hook, args: HookArgs) -> Self {
        Self {
            hook,
            input: HookInput::Args(args),
        }
    }

    pub fn for_event(hook: Hook, event: Event, config: Arc<ResolvedConfig>) -> Self {
        Self {
            hook,
            input: HookInput::Event { event, config },
        }
    }
}

#[derive(Debug, Clone)]
pub enum Task {
    Action(ActionTask),
    Hook(HookTask),
}

impl Task {
    pub fn name(&self) -> &str {
        match self {
            Self::Action(action) => &action.name,
            Self::Hook(hook) => &hook.hook.identity,
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            Self::Action(_) => TaskKind::Action,
            Self::Hook(_) => TaskKind::Hook,
        }
    }
}

/// Engine settings for one run
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Pool size; `None` runs every task at once
    pub workers: Option<usize>,
    /// How long to wait on each task
    pub timeout: Duration,
    pub cancel_on_timeout: bool,
}

impl EngineSettings {
    pub fn new(timeout: Duration) -> Self {
        Self {
            workers: None,
            timeout,
            cancel_on_timeout: false,
        }
    }

    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_cancel_on_timeout(mut self, cancel: bool) -> Self {
        self.cancel_on_timeout = cancel;
        self
    }
}

/// Tasks still running after the run that submitted them returned
#[derive(Debug, Default)]
pub struct DetachedTasks {
    handles: Mutex<Vec<(String, JoinHandle<ExecutionResult>)>>,
}

impl DetachedTasks {
    pub fn new() -> Self {
        Self::default()
    }

    fn adopt(&self, tasks: impl IntoIterator<Item = (String, JoinHandle<ExecutionResult>)>) {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.retain(|(_, handle)| !handle.is_finished());
        handles.extend(tasks);
    }

    /// Number of detached tasks not yet finished
    pub fn pending(&self) -> usize {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .count()
    }

    /// Wait for every detached task to finish and log its outcome.
    ///
    /// Returns how many tasks were waited on.
    pub async fn drain(&self) -> usize {
        let handles =
            std::mem::take(&mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner));
        if handles.is_empty() {
            return 0;
        }

        info!(tasks = handles.len(), "Waiting for detached tasks");
        let count = handles.len();
        for (name, handle) in handles {
            match handle.await {
                Ok(_) => {}
                Err(e) if e.is_cancelled() => debug!(task = %name, "Detached task was cancelled"),
                Err(e) => error!(task = %name, error = %e, "Detached task panicked"),
            }
        }
        count
    }
}

/// Runs tasks on a bounded pool and aggregates a verdict
#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    settings: EngineSettings,
    detached: Arc<DetachedTasks>,
}

impl ExecutionEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            detached: Arc::new(DetachedTasks::new()),
        }
    }

    /// Share a detached-task tracker with other engines
    pub fn with_detached(mut self, detached: Arc<DetachedTasks>) -> Self {
        self.detached = detached;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn detached(&self) -> &Arc<DetachedTasks> {
        &self.detached
    }

    /// Run tasks and report their results in submission order
    pub async fn run(&self, tasks: Vec<Task>) -> RunReport {
        if tasks.is_empty() {
            return RunReport::empty();
        }

        let total = tasks.len();
        let workers = self.settings.workers.unwrap_or(total).max(1);
        info!(tasks = total, workers, "Running tasks");

        let pool = Arc::new(Semaphore::new(workers));
        let kill_on_timeout = self.settings.cancel_on_timeout;

        let submitted: Vec<(String, TaskKind, JoinHandle<ExecutionResult>)> = tasks
            .into_iter()
            .map(|task| {
                let name = task.name().to_string();
                let kind = task.kind();
                let pool = Arc::clone(&pool);
                let handle = tokio::spawn(async move {
                    // The pool is never closed
                    let _permit = pool.acquire_owned().await.ok();
                    execute(task, kill_on_timeout).await
                });
                (name, kind, handle)
            })
            .collect();

        let mut report = RunReport::empty();
        let mut pending = submitted.into_iter().enumerate();

        while let Some((index, (name, kind, mut handle))) = pending.next() {
            info!("[Running: <{}/{}> - {}]", index + 1, total, name);
            let waited = Instant::now();

            let result = match timeout(self.settings.timeout, &mut handle).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_error)) => {
                    error!(task = %name, error = %join_error, "Task panicked");
                    ExecutionResult::failed_to_run(&name, kind, join_error.to_string())
                }
                Err(_) => {
                    if self.settings.cancel_on_timeout {
                        warn!(task = %name, "Task timed out, cancelling");
                        handle.abort();
                    } else {
                        warn!(
                            task = %name,
                            "[{}]:Still running async, but answering. Check log for detailed result...",
                            name
                        );
                    }
                    let result = ExecutionResult::timed_out(&name, kind)
                        .with_duration(waited.elapsed().as_millis() as u64);
                    // Aborted tasks are kept too, so draining waits for their cleanup
                    self.detached.adopt([(name.clone(), handle)]);
                    result
                }
            };

            report.log.extend(result.log_lines());
            let failed = result.is_failure();
            report.results.push(result);

            if failed {
                error!(task = %name, "Task failed, skipping remaining results");
                self.detached
                    .adopt(pending.map(|(_, (name, _, handle))| (name, handle)));
                report.outcome = Outcome::Failure;
                return report;
            }
        }

        report
    }
}

/// Run one task to completion and log its outcome
async fn execute(task: Task, kill_on_timeout: bool) -> ExecutionResult {
    let started = Instant::now();
    let result = match task {
        Task::Action(action) => run_action(action, kill_on_timeout).await,
        Task::Hook(hook) => run_hook(hook).await,
    };
    let result = result.with_duration(started.elapsed().as_millis() as u64);
    log_result(&result);
    result
}

async fn run_action(task: ActionTask, kill_on_timeout: bool) -> ExecutionResult {
    info!(action = %task.name, event = %task.event, "Running action");
    match invoke_action(&task, kill_on_timeout).await {
        Ok(output) => ExecutionResult::finished(
            &task.name,
            TaskKind::Action,
            output.status.code().unwrap_or(crate::domain::FAILED_TO_RUN),
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ),
        Err(e) => ExecutionResult::failed_to_run(&task.name, TaskKind::Action, format!("{:#}", e)),
    }
}

/// Write the argument document and run the executable.
///
/// The argument file lives in a temporary directory removed on every exit
/// path, including cancellation.
async fn invoke_action(task: &ActionTask, kill_on_timeout: bool) -> Result<std::process::Output> {
    let workdir = tempfile::tempdir().context("Failed to create argument directory")?;
    let args_path = workdir.path().join(&task.name);

    tokio::fs::write(&args_path, task.arguments.to_string())
        .await
        .with_context(|| format!("Failed to write arguments for action '{}'", task.name))?;

    let output = Command::new(&task.program)
        .arg(&args_path)
        .arg(&task.event)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(kill_on_timeout)
        .output()
        .await
        .with_context(|| format!("Failed to run action '{}'", task.program.display()))?;

    Ok(output)
}

async fn run_hook(task: HookTask) -> ExecutionResult {
    let HookTask { hook, input } = task;
    let identity = hook.identity.clone();
    info!(hook = %identity, "Running hook");

    let invocation = tokio::task::spawn_blocking(move || {
        let args = match input {
            HookInput::Args(args) => args,
            HookInput::Event { event, config } => hook.handler.get_args(&event, &config),
        };
        hook.invoke(&args)
    });

    match invocation.await {
        Ok(Ok(status)) => {
            ExecutionResult::finished(identity, TaskKind::Hook, status, String::new(), String::new())
        }
        Ok(Err(e)) => ExecutionResult::failed_to_run(identity, TaskKind::Hook, format!("{:#}", e)),
        Err(join_error) => {
            ExecutionResult::failed_to_run(identity, TaskKind::Hook, join_error.to_string())
        }
    }
}

/// Out-of-band record of a finished task, written even if nobody waits on it
fn log_result(result: &ExecutionResult) {
    if result.kind == TaskKind::Action {
        info!("[{}]:ProcOut:\n{}", result.name, result.stdout.replace('|', "\n"));
        info!("[{}]:ProcErr:\n{}", result.name, result.stderr.replace('|', "\n"));
    } else if !result.stderr.is_empty() {
        info!("[{}]:{}", result.name, result.stderr);
    }

    if result.is_failure() {
        error!(
            status = ?result.exit_status,
            duration_ms = ?result.duration_ms,
            "[{}]:Failed!",
            result.name
        );
    } else {
        info!(duration_ms = ?result.duration_ms, "[{}]:Success!", result.name);
    }
}
