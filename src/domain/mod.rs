//! Domain types for hookshub.
//!
//! This module contains the core data structures:
//! - Event: Canonical classification of a webhook payload
//! - Result: Per-task results, run reports and dispatch verdicts

pub mod event;
pub mod result;

// Re-export commonly used types
pub use event::{Event, EventKind, Provider, RepoRef, UNKNOWN_BRANCH};
pub use result::{
    DispatchVerdict, ExecutionResult, Outcome, RunReport, TaskKind, FAILED_TO_RUN, STILL_RUNNING,
};
