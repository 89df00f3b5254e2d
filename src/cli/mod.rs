//! Command-line interface for hookshub.
//!
//! Provides commands for dispatching stored deliveries, inspecting how a
//! payload is classified and which actions it selects, and showing the
//! registered hooks and resolved configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use crate::adapters::classify;
use crate::config::{load_config, load_config_from, ResolvedConfig};
use crate::core::{builtin_plugins, Dispatcher, HookRegistry};

/// hookshub - Webhook dispatcher for source-control events
#[derive(Parser, Debug)]
#[command(name = "hookshub")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to .hookshub/config.yaml in this or a parent directory)
    #[arg(short, long, global = true, env = "HOOKSHUB_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Dispatch a delivery: run its matching actions and hooks
    Dispatch {
        /// JSON payload file
        #[arg(short, long)]
        payload: PathBuf,

        /// Event header sent with the delivery (e.g. X-GitHub-Event)
        #[arg(short, long)]
        event: Option<String>,

        /// Worker pool size (one worker per task if not set)
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Classify a payload and print the resulting event
    Classify {
        /// JSON payload file
        #[arg(short, long)]
        payload: PathBuf,

        /// Event header sent with the delivery
        #[arg(short, long)]
        event: Option<String>,
    },

    /// List the actions a payload would run
    Actions {
        /// JSON payload file
        #[arg(short, long)]
        payload: PathBuf,

        /// Event header sent with the delivery
        #[arg(short, long)]
        event: Option<String>,
    },

    /// List registered hooks
    Hooks,

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = match self.config {
            Some(ref path) => load_config_from(path)?,
            None => load_config()?,
        };

        match self.command {
            Commands::Dispatch {
                payload,
                event,
                workers,
            } => dispatch(config, &payload, event.as_deref(), workers).await,
            Commands::Classify { payload, event } => show_event(&payload, event.as_deref()),
            Commands::Actions { payload, event } => {
                list_actions(config, &payload, event.as_deref())
            }
            Commands::Hooks => list_hooks(),
            Commands::Config => show_config(&config),
        }
    }
}

fn read_payload(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read payload file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Payload is not valid JSON: {}", path.display()))
}

fn load_registry() -> Arc<HookRegistry> {
    let registry = Arc::new(HookRegistry::new());
    let summary = registry.reload(&builtin_plugins());
    for (plugin, error) in &summary.failed {
        eprintln!("Could not load plugin {}: {}", plugin, error);
    }
    registry
}

/// Dispatch a stored delivery and print the verdict
async fn dispatch(
    mut config: ResolvedConfig,
    payload_path: &Path,
    event: Option<&str>,
    workers: Option<usize>,
) -> Result<()> {
    if workers.is_some() {
        config.execution.workers = workers.filter(|w| *w > 0);
    }

    let body = std::fs::read(payload_path)
        .with_context(|| format!("Failed to read payload file: {}", payload_path.display()))?;

    let dispatcher = Dispatcher::new(config, load_registry());
    let response = dispatcher.handle_delivery(&body, event).await;

    // Timed-out and abandoned tasks only report through the log
    let drained = dispatcher.drain().await;
    if drained > 0 {
        eprintln!("[Waited for {} detached tasks]", drained);
    }

    if response.is_success() {
        println!("{}", response.body);
        Ok(())
    } else {
        eprintln!("{}", response.body);
        anyhow::bail!("Dispatch failed with status {}", response.status)
    }
}

/// Print the classified event as JSON
fn show_event(payload_path: &Path, event: Option<&str>) -> Result<()> {
    let payload = read_payload(payload_path)?;
    let event = classify(&payload, event)?;
    println!("{}", serde_json::to_string_pretty(&event)?);
    Ok(())
}

/// Print the actions a payload selects
fn list_actions(config: ResolvedConfig, payload_path: &Path, event: Option<&str>) -> Result<()> {
    let payload = read_payload(payload_path)?;
    let event = classify(&payload, event)?;
    let dir = config.actions_dir(event.provider);

    let dispatcher = Dispatcher::new(config, Arc::new(HookRegistry::new()));
    let actions = dispatcher.matched_actions(&event)?;

    println!(
        "Event: {} (repository: {}, branch: {})",
        event.kind,
        event.repo_name().unwrap_or("-"),
        event.branch_or_unknown()
    );
    if actions.is_empty() {
        println!("No actions in {}", dir.display());
        return Ok(());
    }
    for action in actions {
        println!("  {}", dir.join(action).display());
    }
    Ok(())
}

/// Print registered hooks and their filters
fn list_hooks() -> Result<()> {
    let registry = load_registry();
    let hooks = registry.all();

    if hooks.is_empty() {
        println!("No hooks registered");
        return Ok(());
    }

    println!(
        "{:<36} {:<20} {:<20} {:<15} {:<8}",
        "HOOK", "EVENT", "REPOSITORY", "BRANCH", "ENABLED"
    );
    println!("{}", "-".repeat(103));
    for hook in hooks {
        println!(
            "{:<36} {:<20} {:<20} {:<15} {:<8}",
            hook.identity,
            hook.event.as_deref().unwrap_or("*"),
            hook.repository.as_deref().unwrap_or("*"),
            hook.branch.as_deref().unwrap_or("*"),
            hook.enabled
        );
    }
    Ok(())
}

/// Show resolved configuration (tokens masked)
fn show_config(config: &ResolvedConfig) -> Result<()> {
    fn mask(token: &Option<String>) -> &'static str {
        if token.is_some() {
            "(set)"
        } else {
            "(not set)"
        }
    }

    println!("hookshub configuration");
    println!("======================\n");

    match &config.config_file {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (none found, using defaults)"),
    }

    println!("\nActions path: {}", config.actions_path.display());
    println!("GitHub token: {}", mask(&config.github_token));
    println!("GitLab token: {}", mask(&config.gitlab_token));
    println!(
        "Vhost path:   {}",
        config.vhost_path.as_deref().unwrap_or("(not set)")
    );
    println!("Nginx port:   {}", config.nginx_port);

    let execution = &config.execution;
    println!("\nExecution:");
    println!("  action timeout:    {:?}", execution.action_timeout);
    println!("  hook timeout:      {:?}", execution.hook_timeout);
    match execution.workers {
        Some(workers) => println!("  workers:           {}", workers),
        None => println!("  workers:           one per task"),
    }
    println!("  cancel on timeout: {}", execution.cancel_on_timeout);

    Ok(())
}
