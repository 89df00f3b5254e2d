//! In-process hooks and the plugins that provide them.
//!
//! A hook is a handler registered against optional event, repository and
//! branch filters. Hooks run with full process privileges; nothing here
//! sandboxes them.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::ResolvedConfig;
use crate::domain::Event;

/// Argument mapping handed to a hook
pub type HookArgs = Map<String, Value>;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("Args for hook {0} were not set before running")]
    ArgsNotSet(String),
}

/// Behavior of an in-process hook
pub trait HookHandler: Send + Sync {
    /// Build the arguments for one invocation. An empty mapping means the
    /// hook is not ready to run and its invocation fails.
    fn get_args(&self, _event: &Event, _config: &ResolvedConfig) -> HookArgs {
        HookArgs::new()
    }

    /// Run the hook; the returned value is its exit status (0 is success).
    ///
    /// Called on a blocking worker thread.
    fn run(&self, args: &HookArgs) -> Result<i32>;
}

/// A registered hook
#[derive(Clone)]
pub struct Hook {
    pub identity: String,
    pub handler: Arc<dyn HookHandler>,
    pub event: Option<String>,
    pub repository: Option<String>,
    pub branch: Option<String>,
    pub enabled: bool,
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("identity", &self.identity)
            .field("event", &self.event)
            .field("repository", &self.repository)
            .field("branch", &self.branch)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl Hook {
    /// An enabled hook with no filters
    pub fn new(identity: impl Into<String>, handler: Arc<dyn HookHandler>) -> Self {
        Self {
            identity: identity.into(),
            handler,
            event: None,
            repository: None,
            branch: None,
            enabled: true,
        }
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Whether the hook applies to a query; unset values on either side
    /// match anything on that dimension
    pub fn matches(&self, event: Option<&str>, repository: Option<&str>, branch: Option<&str>) -> bool {
        dimension_matches(self.event.as_deref(), event)
            && dimension_matches(self.repository.as_deref(), repository)
            && dimension_matches(self.branch.as_deref(), branch)
    }

    /// Build arguments and run the handler
    pub fn invoke(&self, args: &HookArgs) -> Result<i32> {
        if args.is_empty() {
            return Err(HookError::ArgsNotSet(self.identity.clone()).into());
        }
        self.handler.run(args)
    }
}

fn dimension_matches(filter: Option<&str>, query: Option<&str>) -> bool {
    match (
        filter.filter(|f| !f.is_empty()),
        query.filter(|q| !q.is_empty()),
    ) {
        (Some(filter), Some(query)) => filter == query,
        _ => true,
    }
}

/// Source of a hook, loaded on registry reload
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn load(&self) -> Result<Hook>;
}
