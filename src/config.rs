//! Configuration for hookshub.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (HOOKSHUB_*)
//! 2. Config file (.hookshub/config.yaml)
//! 3. Defaults (~/.hookshub)
//!
//! Config file discovery:
//! - Searches current directory and parents for .hookshub/config.yaml
//! - Relative paths in the config file are resolved against the project root
//!   (the parent of .hookshub/)

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::Provider;

const DEFAULT_NGINX_PORT: &str = "80";
const DEFAULT_ACTION_TIMEOUT_SECS: u64 = 30;
const DEFAULT_HOOK_TIMEOUT_SECS: u64 = 10;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub actions: ActionsConfig,
    #[serde(default)]
    pub tokens: TokensConfig,
    #[serde(default)]
    pub vhost_path: Option<String>,
    #[serde(default)]
    pub nginx_port: Option<String>,
    #[serde(default)]
    pub execution: Option<ExecutionConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionsConfig {
    /// Root of the per-provider action directories
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokensConfig {
    pub github: Option<String>,
    pub gitlab: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    pub action_timeout_seconds: Option<u64>,
    pub hook_timeout_seconds: Option<u64>,
    pub workers: Option<usize>,
    pub cancel_on_timeout: Option<bool>,
}

/// Resolved configuration consulted at dispatch time
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Root of the action namespaces (`<root>/<provider>/`)
    pub actions_path: PathBuf,
    pub github_token: Option<String>,
    pub gitlab_token: Option<String>,
    /// Root under which actions publish built sites
    pub vhost_path: Option<String>,
    pub nginx_port: String,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Execution settings
    pub execution: ExecutionSettings,
}

#[derive(Debug, Clone)]
pub struct ExecutionSettings {
    pub action_timeout: Duration,
    pub hook_timeout: Duration,
    /// Worker pool size; `None` means one worker per task
    pub workers: Option<usize>,
    /// Abort tasks (and kill action subprocesses) whose wait expires
    pub cancel_on_timeout: bool,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            action_timeout: Duration::from_secs(DEFAULT_ACTION_TIMEOUT_SECS),
            hook_timeout: Duration::from_secs(DEFAULT_HOOK_TIMEOUT_SECS),
            workers: None,
            cancel_on_timeout: false,
        }
    }
}

impl ResolvedConfig {
    /// Defaults rooted at the given action directory
    pub fn with_actions_path(actions_path: impl Into<PathBuf>) -> Self {
        Self {
            actions_path: actions_path.into(),
            github_token: None,
            gitlab_token: None,
            vhost_path: None,
            nginx_port: DEFAULT_NGINX_PORT.to_string(),
            config_file: None,
            execution: ExecutionSettings::default(),
        }
    }

    /// Action namespace directory for a provider
    pub fn actions_dir(&self, provider: Provider) -> PathBuf {
        self.actions_path.join(provider.as_str())
    }

    /// Token handed to actions for the given provider
    pub fn token_for(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::GitHub => self.github_token.as_deref(),
            Provider::GitLab => self.gitlab_token.as_deref(),
            Provider::Generic => None,
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".hookshub").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env_var(name) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("Invalid value for {}: '{}'", name, raw)),
        None => Ok(None),
    }
}

/// Load configuration from all sources
pub fn load_config() -> Result<ResolvedConfig> {
    let config_file = find_config_file();
    let file = match config_file {
        Some(ref path) => Some(load_config_file(path)?),
        None => None,
    };
    resolve(file, config_file)
}

/// Load configuration from an explicit config file (env vars still win)
pub fn load_config_from(path: &Path) -> Result<ResolvedConfig> {
    let file = load_config_file(path)?;
    resolve(Some(file), Some(path.to_path_buf()))
}

fn resolve(file: Option<ConfigFile>, config_file: Option<PathBuf>) -> Result<ResolvedConfig> {
    let default_root = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".hookshub")
        .join("actions");

    // Base directory is the parent of .hookshub/ (i.e., grandparent of config.yaml)
    let base_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .and_then(Path::parent)
        .unwrap_or(Path::new("."))
        .to_path_buf();

    let file_actions = file.as_ref().and_then(|f| f.actions.path.clone());
    let actions_path = if let Some(env_path) = env_var("HOOKSHUB_ACTIONS_PATH") {
        PathBuf::from(env_path)
    } else if let Some(ref path) = file_actions {
        resolve_path(&base_dir, path)
    } else {
        default_root
    };

    let execution = file.as_ref().and_then(|f| f.execution.clone());
    let defaults = ExecutionSettings::default();
    let execution = ExecutionSettings {
        action_timeout: env_parse::<u64>("HOOKSHUB_ACTION_TIMEOUT")?
            .or_else(|| execution.as_ref().and_then(|e| e.action_timeout_seconds))
            .map(Duration::from_secs)
            .unwrap_or(defaults.action_timeout),
        hook_timeout: env_parse::<u64>("HOOKSHUB_HOOK_TIMEOUT")?
            .or_else(|| execution.as_ref().and_then(|e| e.hook_timeout_seconds))
            .map(Duration::from_secs)
            .unwrap_or(defaults.hook_timeout),
        workers: env_parse::<usize>("HOOKSHUB_WORKERS")?
            .or_else(|| execution.as_ref().and_then(|e| e.workers))
            .filter(|workers| *workers > 0),
        cancel_on_timeout: env_parse::<bool>("HOOKSHUB_CANCEL_ON_TIMEOUT")?
            .or_else(|| execution.as_ref().and_then(|e| e.cancel_on_timeout))
            .unwrap_or(defaults.cancel_on_timeout),
    };

    Ok(ResolvedConfig {
        actions_path,
        github_token: env_var("HOOKSHUB_GITHUB_TOKEN")
            .or_else(|| file.as_ref().and_then(|f| f.tokens.github.clone())),
        gitlab_token: env_var("HOOKSHUB_GITLAB_TOKEN")
            .or_else(|| file.as_ref().and_then(|f| f.tokens.gitlab.clone())),
        vhost_path: env_var("HOOKSHUB_VHOST_PATH")
            .or_else(|| file.as_ref().and_then(|f| f.vhost_path.clone())),
        nginx_port: env_var("HOOKSHUB_NGINX_PORT")
            .or_else(|| file.as_ref().and_then(|f| f.nginx_port.clone()))
            .unwrap_or_else(|| DEFAULT_NGINX_PORT.to_string()),
        config_file,
        execution,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let hookshub_dir = temp.path().join(".hookshub");
        std::fs::create_dir_all(&hookshub_dir).unwrap();

        let config_path = hookshub_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1.0"
actions:
  path: ./actions
tokens:
  github: gh-secret
vhost_path: /var/www
execution:
  action_timeout_seconds: 5
  workers: 4
"#
        )
        .unwrap();

        let config = load_config_file(&config_path).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.actions.path, Some("./actions".to_string()));
        assert_eq!(config.tokens.github, Some("gh-secret".to_string()));
        assert_eq!(config.tokens.gitlab, None);
        assert_eq!(config.vhost_path, Some("/var/www".to_string()));

        let execution = config.execution.unwrap();
        assert_eq!(execution.action_timeout_seconds, Some(5));
        assert_eq!(execution.hook_timeout_seconds, None);
        assert_eq!(execution.workers, Some(4));
    }

    #[test]
    fn test_execution_defaults() {
        let settings = ExecutionSettings::default();
        assert_eq!(settings.action_timeout, Duration::from_secs(30));
        assert_eq!(settings.hook_timeout, Duration::from_secs(10));
        assert_eq!(settings.workers, None);
        assert!(!settings.cancel_on_timeout);
    }

    #[test]
    fn test_actions_dir_per_provider() {
        let config = ResolvedConfig::with_actions_path("/srv/hookshub/actions");
        assert_eq!(
            config.actions_dir(Provider::GitHub),
            PathBuf::from("/srv/hookshub/actions/github")
        );
        assert_eq!(
            config.actions_dir(Provider::GitLab),
            PathBuf::from("/srv/hookshub/actions/gitlab")
        );
        assert_eq!(config.nginx_port, "80");
    }

    #[test]
    fn test_token_for_provider() {
        let config = ResolvedConfig {
            github_token: Some("gh".to_string()),
            gitlab_token: Some("gl".to_string()),
            ..ResolvedConfig::with_actions_path("/tmp")
        };
        assert_eq!(config.token_for(Provider::GitHub), Some("gh"));
        assert_eq!(config.token_for(Provider::GitLab), Some("gl"));
        assert_eq!(config.token_for(Provider::Generic), None);
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/subdir")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }
}
