//! End-to-end handling of one webhook delivery.
//!
//! payload → [`classify`] → action matching + hook lookup → engine runs →
//! merged [`DispatchVerdict`]. Classification errors abort before anything
//! is scheduled; task errors only ever show up in the verdict.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, instrument};

use super::engine::{ActionTask, DetachedTasks, EngineSettings, ExecutionEngine, HookTask, Task};
use super::matcher::{list_namespace, match_actions};
use super::registry::HookRegistry;
use crate::adapters::{classify, invocation_args, ClassifyError};
use crate::config::ResolvedConfig;
use crate::domain::{DispatchVerdict, Event};

/// Event header value for provider ping deliveries
pub const PING_EVENT: &str = "ping";

/// Errors that abort a dispatch before any task runs
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error("Failed to read action namespace: {0:#}")]
    Namespace(anyhow::Error),
}

/// Response for one delivery, ready for an HTTP layer to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResponse {
    pub status: u16,
    pub body: String,
}

impl DeliveryResponse {
    fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Wires payload classification, matching and execution together
pub struct Dispatcher {
    config: Arc<ResolvedConfig>,
    registry: Arc<HookRegistry>,
    detached: Arc<DetachedTasks>,
}

impl Dispatcher {
    pub fn new(config: ResolvedConfig, registry: Arc<HookRegistry>) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            detached: Arc::new(DetachedTasks::new()),
        }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<HookRegistry> {
        &self.registry
    }

    /// Tasks of earlier dispatches that are still running
    pub fn detached(&self) -> &Arc<DetachedTasks> {
        &self.detached
    }

    /// Wait for timed-out and abandoned tasks of every dispatch so far.
    ///
    /// Call before the process exits, or their outcome never reaches the log.
    pub async fn drain(&self) -> usize {
        self.detached.drain().await
    }

    /// Handle a raw delivery body and map the verdict to a response
    pub async fn handle_delivery(&self, body: &[u8], event_header: Option<&str>) -> DeliveryResponse {
        if event_header == Some(PING_EVENT) {
            return DeliveryResponse::new(200, "pong");
        }

        let payload: Value = match serde_json::from_slice(body) {
            Ok(payload) => payload,
            Err(e) => return DeliveryResponse::new(400, DispatchError::from(e).to_string()),
        };

        match self.dispatch(&payload, event_header).await {
            Ok(verdict) if verdict.is_success() => DeliveryResponse::new(200, verdict.summary()),
            Ok(verdict) => DeliveryResponse::new(500, verdict.full_log()),
            Err(e) => DeliveryResponse::new(500, e.to_string()),
        }
    }

    /// Classify a payload and run its matching actions and hooks
    #[instrument(skip(self, payload))]
    pub async fn dispatch(
        &self,
        payload: &Value,
        event_header: Option<&str>,
    ) -> Result<DispatchVerdict, DispatchError> {
        let event = classify(payload, event_header).map_err(|e| {
            error!(error = %e, "Failed to classify payload");
            e
        })?;
        info!(
            provider = %event.provider,
            event = %event.kind,
            repository = ?event.repo_name(),
            branch = ?event.branch(),
            "Classified delivery"
        );

        let action_tasks = self.action_tasks(&event)?;
        let hook_tasks = self.hook_tasks(&event);
        info!(
            actions = action_tasks.len(),
            hooks = hook_tasks.len(),
            "Executing tasks for event: {}",
            event.kind
        );

        let action_engine = self.action_engine();
        let hook_engine = self.hook_engine();
        let (actions, hooks) = tokio::join!(
            action_engine.run(action_tasks),
            hook_engine.run(hook_tasks),
        );

        let verdict = DispatchVerdict::new(event.kind.clone(), actions, hooks);
        if verdict.is_success() {
            info!(dispatch_id = %verdict.dispatch_id, "{}", verdict.summary());
        } else {
            error!(dispatch_id = %verdict.dispatch_id, "Dispatch failed");
        }
        Ok(verdict)
    }

    /// Names of the actions an event would run, in namespace order
    pub fn matched_actions(&self, event: &Event) -> Result<Vec<String>, DispatchError> {
        let namespace = list_namespace(&self.config.actions_dir(event.provider))
            .map_err(DispatchError::Namespace)?;
        Ok(match_actions(
            &namespace,
            event.kind.as_str(),
            event.repo_name(),
            event.branch(),
        ))
    }

    fn action_tasks(&self, event: &Event) -> Result<Vec<Task>, DispatchError> {
        let dir = self.config.actions_dir(event.provider);
        let arguments = invocation_args(event, &self.config);

        Ok(self
            .matched_actions(event)?
            .into_iter()
            .map(|name| {
                Task::Action(ActionTask {
                    program: dir.join(&name),
                    name,
                    arguments: arguments.clone(),
                    event: event.kind.to_string(),
                })
            })
            .collect())
    }

    fn hook_tasks(&self, event: &Event) -> Vec<Task> {
        self.registry
            .get_hooks(Some(event.kind.as_str()), event.repo_name(), event.branch())
            .into_iter()
            .map(|(_, hook)| {
                Task::Hook(HookTask::for_event(hook, event.clone(), Arc::clone(&self.config)))
            })
            .collect()
    }

    fn action_engine(&self) -> ExecutionEngine {
        let execution = &self.config.execution;
        ExecutionEngine::new(
            EngineSettings::new(execution.action_timeout)
                .with_workers(execution.workers)
                .with_cancel_on_timeout(execution.cancel_on_timeout),
        )
        .with_detached(Arc::clone(&self.detached))
    }

    fn hook_engine(&self) -> ExecutionEngine {
        let execution = &self.config.execution;
        ExecutionEngine::new(
            EngineSettings::new(execution.hook_timeout)
                .with_workers(execution.workers)
                .with_cancel_on_timeout(execution.cancel_on_timeout),
        )
        .with_detached(Arc::clone(&self.detached))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(
            ResolvedConfig::with_actions_path("/nonexistent/hookshub/actions"),
            Arc::new(HookRegistry::new()),
        )
    }

    #[tokio::test]
    async fn test_ping_short_circuits() {
        let response = dispatcher().handle_delivery(b"not json", Some("ping")).await;
        assert_eq!(response, DeliveryResponse::new(200, "pong"));
    }

    #[tokio::test]
    async fn test_invalid_json_is_bad_request() {
        let response = dispatcher().handle_delivery(b"{", Some("push")).await;
        assert_eq!(response.status, 400);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_server_error() {
        let body = json!({"object_kind": null}).to_string();
        let response = dispatcher().handle_delivery(body.as_bytes(), None).await;
        assert_eq!(response.status, 500);
        assert!(response.body.contains("object_kind"));
    }

    #[tokio::test]
    async fn test_nothing_to_run_succeeds() {
        let payload = json!({
            "ref": "refs/heads/main",
            "commits": [],
            "repository": {"name": "docs"}
        });
        let verdict = dispatcher().dispatch(&payload, Some("push")).await.unwrap();
        assert!(verdict.is_success());
        assert!(verdict.actions.is_empty());
        assert!(verdict.hooks.is_empty());
    }
}
