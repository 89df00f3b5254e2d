//! Core dispatch logic.
//!
//! This module contains:
//! - Matcher: Action selection by naming convention
//! - Hook/Registry: In-process hooks and their process-wide catalog
//! - Engine: Bounded-concurrency task execution
//! - Dispatcher: End-to-end handling of one delivery

pub mod builtin;
pub mod dispatcher;
pub mod engine;
pub mod hook;
pub mod matcher;
pub mod registry;

// Re-export commonly used types
pub use builtin::{builtin_plugins, EventLogPlugin};
pub use dispatcher::{DeliveryResponse, DispatchError, Dispatcher, PING_EVENT};
pub use engine::{
    ActionTask, DetachedTasks, EngineSettings, ExecutionEngine, HookInput, HookTask, Task,
};
pub use hook::{Hook, HookArgs, HookError, HookHandler, Plugin};
pub use matcher::{list_namespace, match_actions, ActionPattern};
pub use registry::{HookRegistry, ReloadSummary};
