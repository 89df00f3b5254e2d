//! Provider adapters for inbound webhook payloads.
//!
//! Each adapter wraps a raw JSON payload from one provider and exposes the
//! same capability set: event kind, repository, branches, metadata and the
//! argument document handed to actions. [`classify`] picks the adapter with
//! an explicit discriminant check and folds it into an [`Event`].

pub mod generic;
pub mod github;
pub mod gitlab;

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::ResolvedConfig;
use crate::domain::{Event, EventKind, Provider, RepoRef};

pub use generic::GenericPayload;
pub use github::GitHubPayload;
pub use gitlab::GitLabPayload;

/// Errors that abort classification of a payload
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("Payload is not a JSON object")]
    NotAnObject,

    #[error("Malformed {provider} payload: missing or invalid '{field}'")]
    MalformedPayload { provider: Provider, field: String },
}

impl ClassifyError {
    pub(crate) fn missing(provider: Provider, field: impl Into<String>) -> Self {
        Self::MalformedPayload {
            provider,
            field: field.into(),
        }
    }
}

/// Branches involved in an event; either may be unknown
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Branches {
    pub source: Option<String>,
    pub target: Option<String>,
}

impl Branches {
    pub fn single(branch: Option<String>) -> Self {
        Self {
            source: branch,
            target: None,
        }
    }
}

/// Capability set shared by every provider payload
pub trait ProviderPayload {
    fn provider(&self) -> Provider;

    /// Event kind; fails when fields required by the inferred kind are absent
    fn kind(&self) -> Result<EventKind, ClassifyError>;

    fn repository(&self) -> Result<Option<RepoRef>, ClassifyError>;

    /// Best effort: lookups that fail yield unknown branches, never errors
    fn branches(&self, kind: &EventKind) -> Branches;

    fn metadata(&self, kind: &EventKind) -> BTreeMap<String, Value>;
}

/// Which adapter handles a payload
pub fn detect_provider(payload: &Map<String, Value>) -> Provider {
    if payload.contains_key("object_kind") {
        Provider::GitLab
    } else if payload.contains_key("hook") {
        Provider::Generic
    } else if payload.get("repository").map_or(false, Value::is_object) {
        Provider::GitHub
    } else {
        Provider::Generic
    }
}

/// Classify a raw payload into an [`Event`].
///
/// `event_hint` is the provider's event-type header; only the generic
/// adapter consults it, the body drives everything else.
pub fn classify(payload: &Value, event_hint: Option<&str>) -> Result<Event, ClassifyError> {
    let object = payload.as_object().ok_or(ClassifyError::NotAnObject)?;

    match detect_provider(object) {
        Provider::GitHub => build_event(&GitHubPayload::new(object)),
        Provider::GitLab => build_event(&GitLabPayload::new(object)),
        Provider::Generic => build_event(&GenericPayload::new(object, event_hint)),
    }
}

fn build_event(payload: &dyn ProviderPayload) -> Result<Event, ClassifyError> {
    let kind = payload.kind()?;
    let repository = payload.repository()?;
    let branches = payload.branches(&kind);
    let provider_metadata = payload.metadata(&kind);

    Ok(Event {
        provider: payload.provider(),
        kind,
        repository,
        source_branch: branches.source,
        target_branch: branches.target,
        provider_metadata,
    })
}

/// JSON document written for an action invocation
pub fn invocation_args(event: &Event, config: &ResolvedConfig) -> Value {
    let mut args = Map::new();
    args.insert("event".into(), Value::from(event.kind.as_str()));
    args.insert("provider".into(), Value::from(event.provider.as_str()));

    let repo = event.repository.as_ref();
    args.insert("repo_name".into(), opt_str(repo.map(|r| r.name.as_str())));
    args.insert(
        "repo_full_name".into(),
        opt_str(repo.and_then(|r| r.full_name.as_deref())),
    );
    args.insert(
        "ssh_url".into(),
        opt_str(repo.and_then(|r| r.clone_url_ssh.as_deref())),
    );
    args.insert(
        "http_url".into(),
        opt_str(repo.and_then(|r| r.clone_url_http.as_deref())),
    );
    args.insert(
        "repo_id".into(),
        repo.and_then(|r| r.id).map_or(Value::Null, Value::from),
    );

    args.insert("branch_name".into(), Value::from(event.branch_or_unknown()));
    args.insert("source_branch".into(), opt_str(event.source_branch.as_deref()));
    args.insert("target_branch".into(), opt_str(event.target_branch.as_deref()));

    args.insert("token".into(), opt_str(config.token_for(event.provider)));
    args.insert("vhost_path".into(), opt_str(config.vhost_path.as_deref()));
    args.insert("port".into(), Value::from(config.nginx_port.as_str()));

    for (key, value) in &event.provider_metadata {
        args.entry(key.clone()).or_insert_with(|| value.clone());
    }

    Value::Object(args)
}

fn opt_str(value: Option<&str>) -> Value {
    value.map_or(Value::Null, Value::from)
}

/// Follow a `/`-separated path of object keys
pub(crate) fn lookup<'a>(payload: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut keys = path.split('/');
    let first = payload.get(keys.next()?)?;
    keys.try_fold(first, |value, key| value.get(key))
}

pub(crate) fn lookup_str(payload: &Map<String, Value>, path: &str) -> Option<String> {
    lookup(payload, path)
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Branch from a full ref: the third `/` segment of `refs/heads/<branch>`
pub(crate) fn branch_from_ref(full_ref: &str) -> Option<String> {
    full_ref
        .split('/')
        .nth(2)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

/// Copy the listed paths into a metadata map under the given keys
pub(crate) fn collect_metadata(
    payload: &Map<String, Value>,
    fields: &[(&str, &str)],
) -> BTreeMap<String, Value> {
    fields
        .iter()
        .filter_map(|(key, path)| {
            lookup(payload, path)
                .filter(|value| !value.is_null())
                .map(|value| (key.to_string(), value.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_detect_provider() {
        assert_eq!(
            detect_provider(&object(json!({"object_kind": "push"}))),
            Provider::GitLab
        );
        assert_eq!(
            detect_provider(&object(json!({"hook": {}, "repository": {}}))),
            Provider::Generic
        );
        assert_eq!(
            detect_provider(&object(json!({"repository": {"name": "x"}}))),
            Provider::GitHub
        );
        assert_eq!(
            detect_provider(&object(json!({"scope": "team"}))),
            Provider::Generic
        );
    }

    #[test]
    fn test_branch_from_ref() {
        assert_eq!(branch_from_ref("refs/heads/main"), Some("main".to_string()));
        assert_eq!(branch_from_ref("refs/heads"), None);
        assert_eq!(branch_from_ref("refs/heads/"), None);
        assert_eq!(branch_from_ref("main"), None);
    }

    #[test]
    fn test_lookup_nested() {
        let payload = object(json!({"pull_request": {"base": {"ref": "main"}}}));
        assert_eq!(
            lookup_str(&payload, "pull_request/base/ref"),
            Some("main".to_string())
        );
        assert_eq!(lookup_str(&payload, "pull_request/head/ref"), None);
    }

    #[test]
    fn test_non_object_payload_is_rejected() {
        assert_eq!(
            classify(&json!(["push"]), None),
            Err(ClassifyError::NotAnObject)
        );
    }

    #[test]
    fn test_invocation_args_use_provider_token() {
        let payload = json!({
            "ref": "refs/heads/main",
            "commits": [],
            "repository": {
                "name": "docs",
                "full_name": "acme/docs",
                "ssh_url": "git@github.com:acme/docs.git",
                "clone_url": "https://github.com/acme/docs.git",
                "id": 7
            }
        });
        let event = classify(&payload, None).unwrap();
        let config = ResolvedConfig {
            github_token: Some("gh-token".to_string()),
            gitlab_token: Some("gl-token".to_string()),
            vhost_path: Some("/var/www".to_string()),
            ..ResolvedConfig::with_actions_path("/tmp/actions")
        };

        let args = invocation_args(&event, &config);
        assert_eq!(args["event"], "push");
        assert_eq!(args["repo_name"], "docs");
        assert_eq!(args["repo_full_name"], "acme/docs");
        assert_eq!(args["http_url"], "https://github.com/acme/docs.git");
        assert_eq!(args["branch_name"], "main");
        assert_eq!(args["token"], "gh-token");
        assert_eq!(args["vhost_path"], "/var/www");
        assert_eq!(args["port"], "80");
        assert_eq!(args["repo_id"], 7);
    }
}
