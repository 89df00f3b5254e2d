//! GitHub payload adapter.
//!
//! GitHub deliveries carry no discriminant field in the body, so the event
//! kind is inferred from which keys are present. Payload shapes overlap
//! (a `deployment_status` delivery also carries `deployment`, a review
//! carries `pull_request`), so [`KIND_RULES`] is evaluated top to bottom
//! and the first matching key wins. Its order is the disambiguation logic.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::{
    branch_from_ref, collect_metadata, lookup_str, Branches, ClassifyError, ProviderPayload,
};
use crate::domain::{EventKind, Provider, RepoRef};

type KindRule = (
    &'static str,
    fn(&Map<String, Value>) -> Result<EventKind, ClassifyError>,
);

/// Ordered `(key, kind)` decision list; first present key wins
pub const KIND_RULES: &[KindRule] = &[
    ("commits", |_| Ok(EventKind::Push)),
    ("master_branch", |_| Ok(EventKind::Create)),
    // Create deliveries also carry `ref_type`
    ("ref_type", |_| Ok(EventKind::Delete)),
    ("deployment_status", |_| Ok(EventKind::DeploymentStatus)),
    // Deployment status deliveries also carry `deployment`
    ("deployment", |_| Ok(EventKind::Deployment)),
    ("forkee", |_| Ok(EventKind::Fork)),
    ("pages", |_| Ok(EventKind::Gollum)),
    ("issue", issue_kind),
    ("scope", |_| Ok(EventKind::Membership)),
    ("build", |_| Ok(EventKind::PageBuild)),
    ("member", |_| Ok(EventKind::Member)),
    ("review", |_| Ok(EventKind::PullRequestReview)),
    ("comment", comment_kind),
    // Reviews and review comments also carry `pull_request`
    ("pull_request", |_| Ok(EventKind::PullRequest)),
    ("release", |_| Ok(EventKind::Release)),
    ("state", |_| Ok(EventKind::Status)),
    // Membership deliveries also carry `team`
    ("team", |_| Ok(EventKind::TeamAdd)),
    ("organization", |_| Ok(EventKind::Repository)),
    // Most deliveries carry `action`; only watch is left by this point
    ("action", |_| Ok(EventKind::Watch)),
];

fn issue_kind(payload: &Map<String, Value>) -> Result<EventKind, ClassifyError> {
    let action = payload
        .get("action")
        .and_then(Value::as_str)
        .ok_or_else(|| ClassifyError::missing(Provider::GitHub, "action"))?;

    Ok(if action == "created" {
        EventKind::IssueComment
    } else {
        EventKind::Issues
    })
}

fn comment_kind(payload: &Map<String, Value>) -> Result<EventKind, ClassifyError> {
    Ok(if payload.contains_key("pull_request") {
        EventKind::PullRequestReviewComment
    } else {
        EventKind::CommitComment
    })
}

const METADATA_FIELDS: &[(&str, &str)] = &[
    ("action", "action"),
    ("sender", "sender/login"),
    ("state", "state"),
];

/// A GitHub delivery
pub struct GitHubPayload<'a> {
    payload: &'a Map<String, Value>,
}

impl<'a> GitHubPayload<'a> {
    pub fn new(payload: &'a Map<String, Value>) -> Self {
        Self { payload }
    }
}

impl ProviderPayload for GitHubPayload<'_> {
    fn provider(&self) -> Provider {
        Provider::GitHub
    }

    fn kind(&self) -> Result<EventKind, ClassifyError> {
        for (key, resolve) in KIND_RULES {
            if self.payload.contains_key(*key) {
                return resolve(self.payload);
            }
        }
        // No distinguishing key at all
        Ok(EventKind::Public)
    }

    fn repository(&self) -> Result<Option<RepoRef>, ClassifyError> {
        let name = lookup_str(self.payload, "repository/name")
            .ok_or_else(|| ClassifyError::missing(Provider::GitHub, "repository.name"))?;

        Ok(Some(RepoRef {
            name,
            full_name: lookup_str(self.payload, "repository/full_name"),
            clone_url_ssh: lookup_str(self.payload, "repository/ssh_url"),
            clone_url_http: lookup_str(self.payload, "repository/clone_url"),
            id: self
                .payload
                .get("repository")
                .and_then(|repo| repo.get("id"))
                .and_then(Value::as_u64),
        }))
    }

    fn branches(&self, kind: &EventKind) -> Branches {
        match kind {
            EventKind::Create | EventKind::Delete => {
                let is_branch = lookup_str(self.payload, "ref_type").as_deref() == Some("branch");
                Branches::single(
                    lookup_str(self.payload, "ref").filter(|_| is_branch),
                )
            }
            EventKind::PullRequest
            | EventKind::PullRequestReview
            | EventKind::PullRequestReviewComment => Branches {
                source: lookup_str(self.payload, "pull_request/head/ref"),
                target: lookup_str(self.payload, "pull_request/base/ref"),
            },
            EventKind::Push => Branches::single(
                lookup_str(self.payload, "ref").and_then(|full_ref| branch_from_ref(&full_ref)),
            ),
            _ => Branches::default(),
        }
    }

    fn metadata(&self, kind: &EventKind) -> BTreeMap<String, Value> {
        let mut metadata = collect_metadata(self.payload, METADATA_FIELDS);

        let number = if kind.is_change_request() {
            self.payload
                .get("number")
                .or_else(|| self.payload.get("pull_request").and_then(|pr| pr.get("number")))
        } else if matches!(kind, EventKind::Issues | EventKind::IssueComment) {
            self.payload.get("issue").and_then(|issue| issue.get("number"))
        } else {
            None
        };
        if let Some(number) = number.filter(|n| !n.is_null()) {
            metadata.insert("number".to_string(), number.clone());
        }

        metadata
    }
}
