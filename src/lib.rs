//! hookshub - Webhook dispatcher for source-control events
//!
//! Receives webhook payloads from GitHub, GitLab or any other sender,
//! classifies them into a canonical event and runs what is registered for
//! that event.
//!
//! # Architecture
//!
//! - Payloads are classified into an `Event` (kind, repository, branches)
//! - Actions are executables selected from a directory by file name
//! - Hooks are in-process plugins selected by event/repository/branch filters
//! - Both run on a bounded worker pool with a per-task timeout, and one
//!   failing task fails the delivery
//!
//! # Modules
//!
//! - `adapters`: Provider payload adapters (GitHub, GitLab, generic)
//! - `core`: Matching, hook registry, execution engine, dispatcher
//! - `domain`: Data structures (Event, ExecutionResult, DispatchVerdict)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Dispatch a stored delivery
//! hookshub dispatch --payload delivery.json --event push
//!
//! # Show which actions it would run
//! hookshub actions --payload delivery.json
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use adapters::{classify, ClassifyError};
pub use config::ResolvedConfig;
pub use core::{Dispatcher, ExecutionEngine, HookRegistry};
pub use domain::{DispatchVerdict, Event, EventKind, ExecutionResult, Outcome, Provider, RepoRef};
