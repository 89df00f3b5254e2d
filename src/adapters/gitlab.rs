//! GitLab payload adapter.
//!
//! GitLab deliveries name their kind in `object_kind`, so no key sniffing
//! is needed. Repository details live under `project` on current payloads
//! and under `repository` on older ones.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::{
    branch_from_ref, collect_metadata, lookup, lookup_str, Branches, ClassifyError,
    ProviderPayload,
};
use crate::domain::{EventKind, Provider, RepoRef};

const METADATA_FIELDS: &[(&str, &str)] = &[
    ("action", "object_attributes/action"),
    ("state", "object_attributes/state"),
    ("item_id", "object_attributes/id"),
    ("merge_request_id", "object_attributes/iid"),
    ("user", "user/username"),
];

/// A GitLab delivery
pub struct GitLabPayload<'a> {
    payload: &'a Map<String, Value>,
}

impl<'a> GitLabPayload<'a> {
    pub fn new(payload: &'a Map<String, Value>) -> Self {
        Self { payload }
    }

    fn project_id(&self) -> Option<&Value> {
        lookup(self.payload, "project/id")
            .or_else(|| self.payload.get("project_id"))
            .filter(|id| !id.is_null())
    }
}

impl ProviderPayload for GitLabPayload<'_> {
    fn provider(&self) -> Provider {
        Provider::GitLab
    }

    fn kind(&self) -> Result<EventKind, ClassifyError> {
        self.payload
            .get("object_kind")
            .and_then(Value::as_str)
            .filter(|kind| !kind.is_empty())
            .map(EventKind::from)
            .ok_or_else(|| ClassifyError::missing(Provider::GitLab, "object_kind"))
    }

    fn repository(&self) -> Result<Option<RepoRef>, ClassifyError> {
        if let Some(name) = lookup_str(self.payload, "project/name") {
            return Ok(Some(RepoRef {
                name,
                full_name: lookup_str(self.payload, "project/path_with_namespace"),
                clone_url_ssh: lookup_str(self.payload, "project/git_ssh_url"),
                clone_url_http: lookup_str(self.payload, "project/git_http_url"),
                id: self.project_id().and_then(Value::as_u64),
            }));
        }

        let name = lookup_str(self.payload, "repository/name")
            .ok_or_else(|| ClassifyError::missing(Provider::GitLab, "project.name"))?;

        Ok(Some(RepoRef {
            name,
            full_name: None,
            clone_url_ssh: lookup_str(self.payload, "repository/git_ssh_url"),
            clone_url_http: lookup_str(self.payload, "repository/git_http_url")
                .or_else(|| lookup_str(self.payload, "repository/url")),
            id: self.project_id().and_then(Value::as_u64),
        }))
    }

    fn branches(&self, kind: &EventKind) -> Branches {
        match kind {
            EventKind::Push => Branches::single(
                lookup_str(self.payload, "ref").and_then(|full_ref| branch_from_ref(&full_ref)),
            ),
            EventKind::MergeRequest => Branches {
                source: lookup_str(self.payload, "object_attributes/source_branch"),
                target: lookup_str(self.payload, "object_attributes/target_branch"),
            },
            EventKind::Note => Branches {
                source: lookup_str(self.payload, "merge_request/source_branch"),
                target: lookup_str(self.payload, "merge_request/target_branch"),
            },
            EventKind::Pipeline => {
                Branches::single(lookup_str(self.payload, "object_attributes/ref"))
            }
            EventKind::Build => Branches::single(lookup_str(self.payload, "ref")),
            _ => Branches::default(),
        }
    }

    fn metadata(&self, _kind: &EventKind) -> BTreeMap<String, Value> {
        let mut metadata = collect_metadata(self.payload, METADATA_FIELDS);
        if let Some(project_id) = self.project_id() {
            metadata.insert("project_id".to_string(), project_id.clone());
        }
        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_kind_from_object_kind() {
        let payload = object(json!({"object_kind": "merge_request"}));
        assert_eq!(
            GitLabPayload::new(&payload).kind().unwrap(),
            EventKind::MergeRequest
        );

        let payload = object(json!({"object_kind": "deployment"}));
        assert_eq!(
            GitLabPayload::new(&payload).kind().unwrap(),
            EventKind::Deployment
        );
    }

    #[test]
    fn test_non_string_object_kind_is_malformed() {
        let payload = object(json!({"object_kind": 3}));
        assert!(matches!(
            GitLabPayload::new(&payload).kind(),
            Err(ClassifyError::MalformedPayload { .. })
        ));
    }

    #[test]
    fn test_repository_falls_back_to_legacy_object() {
        let payload = object(json!({
            "object_kind": "push",
            "project_id": 15,
            "repository": {"name": "docs", "url": "git@example.com:acme/docs.git"}
        }));
        let repo = GitLabPayload::new(&payload).repository().unwrap().unwrap();
        assert_eq!(repo.name, "docs");
        assert_eq!(repo.id, Some(15));
        assert_eq!(
            repo.clone_url_http.as_deref(),
            Some("git@example.com:acme/docs.git")
        );
    }

    #[test]
    fn test_tag_push_has_no_branch() {
        let payload = object(json!({"object_kind": "tag_push", "ref": "refs/tags/v1.0"}));
        let branches = GitLabPayload::new(&payload).branches(&EventKind::TagPush);
        assert_eq!(branches, Branches::default());
    }

    #[test]
    fn test_merge_request_metadata() {
        let payload = object(json!({
            "object_kind": "merge_request",
            "project": {"id": 3, "name": "docs"},
            "object_attributes": {"id": 99, "iid": 4, "action": "open", "state": "opened"}
        }));
        let metadata = GitLabPayload::new(&payload).metadata(&EventKind::MergeRequest);
        assert_eq!(metadata.get("project_id"), Some(&json!(3)));
        assert_eq!(metadata.get("item_id"), Some(&json!(99)));
        assert_eq!(metadata.get("merge_request_id"), Some(&json!(4)));
        assert_eq!(metadata.get("action"), Some(&json!("open")));
    }
}
