//! Process-wide catalog of in-process hooks.
//!
//! The table is guarded by a read/write lock: enumeration works on a
//! consistent snapshot and never observes a half-applied registration.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::{error, info};

use super::hook::{Hook, Plugin};

/// Outcome of a registry reload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadSummary {
    /// Identities registered, in plugin order
    pub loaded: Vec<String>,
    /// `(plugin name, error)` for plugins that failed to load
    pub failed: Vec<(String, String)>,
}

/// Registered hooks, in registration order
#[derive(Debug, Default)]
pub struct HookRegistry {
    hooks: RwLock<Vec<Hook>>,
    last_loaded: RwLock<Option<DateTime<Utc>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook, replacing any hook with the same identity in place
    pub fn register(&self, hook: Hook) -> String {
        let identity = hook.identity.clone();
        let mut hooks = self.hooks.write().unwrap_or_else(PoisonError::into_inner);

        match hooks.iter_mut().find(|existing| existing.identity == identity) {
            Some(existing) => *existing = hook,
            None => hooks.push(hook),
        }

        identity
    }

    /// Enabled hooks matching the query, as `(identity, hook)` pairs
    pub fn get_hooks(
        &self,
        event: Option<&str>,
        repository: Option<&str>,
        branch: Option<&str>,
    ) -> Vec<(String, Hook)> {
        let hooks = self.hooks.read().unwrap_or_else(PoisonError::into_inner);
        hooks
            .iter()
            .filter(|hook| hook.enabled && hook.matches(event, repository, branch))
            .map(|hook| (hook.identity.clone(), hook.clone()))
            .collect()
    }

    pub fn enable(&self, identity: &str) -> bool {
        self.set_enabled(identity, true)
    }

    pub fn disable(&self, identity: &str) -> bool {
        self.set_enabled(identity, false)
    }

    /// Returns false when no hook has that identity
    fn set_enabled(&self, identity: &str, enabled: bool) -> bool {
        let mut hooks = self.hooks.write().unwrap_or_else(PoisonError::into_inner);
        match hooks.iter_mut().find(|hook| hook.identity == identity) {
            Some(hook) => {
                hook.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Load every plugin and register its hook.
    ///
    /// A plugin that fails to load is logged and skipped; the rest still load.
    pub fn reload(&self, plugins: &[Arc<dyn Plugin>]) -> ReloadSummary {
        let mut summary = ReloadSummary::default();

        for plugin in plugins {
            match plugin.load() {
                Ok(hook) => {
                    let identity = self.register(hook);
                    summary.loaded.push(identity);
                }
                Err(e) => {
                    error!(plugin = %plugin.name(), error = %e, "Could not load plugin");
                    summary
                        .failed
                        .push((plugin.name().to_string(), format!("{:#}", e)));
                }
            }
        }

        *self
            .last_loaded
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());

        info!(
            loaded = summary.loaded.len(),
            failed = summary.failed.len(),
            "Hooks reloaded"
        );
        summary
    }

    /// All registered hooks, enabled or not
    pub fn all(&self) -> Vec<Hook> {
        self.hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.hooks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_loaded(&self) -> Option<DateTime<Utc>> {
        *self.last_loaded.read().unwrap_or_else(PoisonError::into_inner)
    }
}
