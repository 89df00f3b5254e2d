//! Plugins bundled with hookshub.

use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tracing::info;

use super::hook::{Hook, HookArgs, HookHandler, Plugin};
use crate::config::ResolvedConfig;
use crate::domain::Event;

pub const EVENT_LOG_HOOK: &str = "hookshub_builtin_event_log";

/// Records every delivery it sees in the tracing log
pub struct EventLogHook;

impl HookHandler for EventLogHook {
    fn get_args(&self, event: &Event, _config: &ResolvedConfig) -> HookArgs {
        let mut args = HookArgs::new();
        args.insert("provider".into(), Value::from(event.provider.as_str()));
        args.insert("event".into(), Value::from(event.kind.as_str()));
        args.insert(
            "repository".into(),
            event.repo_name().map_or(Value::Null, Value::from),
        );
        args.insert("branch".into(), Value::from(event.branch_or_unknown()));
        args
    }

    fn run(&self, args: &HookArgs) -> Result<i32> {
        let field = |key: &str| args.get(key).cloned().unwrap_or(Value::Null);
        let provider = field("provider");
        let event = field("event");
        let repository = field("repository");
        let branch = field("branch");

        info!(
            provider = %provider,
            event = %event,
            repository = %repository,
            branch = %branch,
            "Webhook received"
        );
        Ok(0)
    }
}

/// Plugin providing [`EventLogHook`] for every event
pub struct EventLogPlugin;

impl Plugin for EventLogPlugin {
    fn name(&self) -> &str {
        "event-log"
    }

    fn load(&self) -> Result<Hook> {
        Ok(Hook::new(EVENT_LOG_HOOK, Arc::new(EventLogHook)))
    }
}

/// Every bundled plugin
pub fn builtin_plugins() -> Vec<Arc<dyn Plugin>> {
    vec![Arc::new(EventLogPlugin)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::classify;
    use serde_json::json;

    #[test]
    fn test_event_log_args() {
        let event = classify(
            &json!({"ref": "refs/heads/main", "commits": [], "repository": {"name": "docs"}}),
            None,
        )
        .unwrap();
        let config = ResolvedConfig::with_actions_path("/tmp/actions");

        let args = EventLogHook.get_args(&event, &config);
        assert_eq!(args["event"], "push");
        assert_eq!(args["repository"], "docs");
        assert_eq!(args["branch"], "main");
        assert_eq!(EventLogHook.run(&args).unwrap(), 0);
    }

    #[test]
    fn test_event_log_tolerates_missing_fields() {
        let mut args = HookArgs::new();
        args.insert("event".into(), Value::from("ping"));
        assert_eq!(EventLogHook.run(&args).unwrap(), 0);
    }
}
