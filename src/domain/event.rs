//! Canonical, provider-independent view of a webhook delivery.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Placeholder handed to actions when no branch could be resolved.
pub const UNKNOWN_BRANCH: &str = "None";

/// Source-control host that sent the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    GitHub,
    GitLab,
    /// Anything without a recognized provider discriminant
    Generic,
}

impl Provider {
    /// Directory name of this provider's action namespace
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GitHub => "github",
            Self::GitLab => "gitlab",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of event carried by a payload.
///
/// GitHub and GitLab share `push`; everything else is provider specific.
/// Unrecognized kinds are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum EventKind {
    CommitComment,
    Create,
    Delete,
    Deployment,
    DeploymentStatus,
    Fork,
    Gollum,
    IssueComment,
    Issues,
    Member,
    Membership,
    PageBuild,
    Public,
    PullRequest,
    PullRequestReview,
    PullRequestReviewComment,
    Push,
    Release,
    Repository,
    Status,
    TeamAdd,
    Watch,
    TagPush,
    Issue,
    Note,
    MergeRequest,
    WikiPage,
    Pipeline,
    Build,
    Other(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::CommitComment => "commit_comment",
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Deployment => "deployment",
            Self::DeploymentStatus => "deployment_status",
            Self::Fork => "fork",
            Self::Gollum => "gollum",
            Self::IssueComment => "issue_comment",
            Self::Issues => "issues",
            Self::Member => "member",
            Self::Membership => "membership",
            Self::PageBuild => "page_build",
            Self::Public => "public",
            Self::PullRequest => "pull_request",
            Self::PullRequestReview => "pull_request_review",
            Self::PullRequestReviewComment => "pull_request_review_comment",
            Self::Push => "push",
            Self::Release => "release",
            Self::Repository => "repository",
            Self::Status => "status",
            Self::TeamAdd => "team_add",
            Self::Watch => "watch",
            Self::TagPush => "tag_push",
            Self::Issue => "issue",
            Self::Note => "note",
            Self::MergeRequest => "merge_request",
            Self::WikiPage => "wiki_page",
            Self::Pipeline => "pipeline",
            Self::Build => "build",
            Self::Other(kind) => kind,
        }
    }

    /// Kinds whose payload describes a change request between two branches
    pub fn is_change_request(&self) -> bool {
        matches!(
            self,
            Self::PullRequest
                | Self::PullRequestReview
                | Self::PullRequestReviewComment
                | Self::MergeRequest
        )
    }
}

impl From<&str> for EventKind {
    fn from(kind: &str) -> Self {
        match kind {
            "commit_comment" => Self::CommitComment,
            "create" => Self::Create,
            "delete" => Self::Delete,
            "deployment" => Self::Deployment,
            "deployment_status" => Self::DeploymentStatus,
            "fork" => Self::Fork,
            "gollum" => Self::Gollum,
            "issue_comment" => Self::IssueComment,
            "issues" => Self::Issues,
            "member" => Self::Member,
            "membership" => Self::Membership,
            "page_build" => Self::PageBuild,
            "public" => Self::Public,
            "pull_request" => Self::PullRequest,
            "pull_request_review" => Self::PullRequestReview,
            "pull_request_review_comment" => Self::PullRequestReviewComment,
            "push" => Self::Push,
            "release" => Self::Release,
            "repository" => Self::Repository,
            "status" => Self::Status,
            "team_add" => Self::TeamAdd,
            "watch" => Self::Watch,
            "tag_push" => Self::TagPush,
            "issue" => Self::Issue,
            "note" => Self::Note,
            "merge_request" => Self::MergeRequest,
            "wiki_page" => Self::WikiPage,
            "pipeline" => Self::Pipeline,
            "build" => Self::Build,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for EventKind {
    fn from(kind: String) -> Self {
        Self::from(kind.as_str())
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Repository identity extracted from a payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    /// Short repository name, used for action and hook matching
    pub name: String,

    /// Namespaced name (`owner/name`)
    pub full_name: Option<String>,

    pub clone_url_ssh: Option<String>,

    pub clone_url_http: Option<String>,

    /// Provider-side numeric identifier
    pub id: Option<u64>,
}

impl RepoRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            full_name: None,
            clone_url_ssh: None,
            clone_url_http: None,
            id: None,
        }
    }
}

/// A classified webhook delivery.
///
/// Derived from the payload alone; classifying the same payload twice
/// yields equal values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub provider: Provider,

    pub kind: EventKind,

    /// Absent only for generic payloads without a repository object
    pub repository: Option<RepoRef>,

    /// Branch the change comes from (or the only branch involved)
    pub source_branch: Option<String>,

    /// Branch a change request targets
    pub target_branch: Option<String>,

    /// Provider-specific fields forwarded to actions
    #[serde(default)]
    pub provider_metadata: BTreeMap<String, Value>,
}

impl Event {
    pub fn repo_name(&self) -> Option<&str> {
        self.repository
            .as_ref()
            .map(|repo| repo.name.as_str())
            .filter(|name| !name.is_empty())
    }

    /// Branch used to select actions and hooks.
    ///
    /// GitHub change requests act on their base branch, GitLab merge
    /// requests on their source branch.
    pub fn branch(&self) -> Option<&str> {
        let (first, second) = match self.provider {
            Provider::GitHub | Provider::Generic => (&self.target_branch, &self.source_branch),
            Provider::GitLab => (&self.source_branch, &self.target_branch),
        };
        first.as_deref().or(second.as_deref())
    }

    /// Same as [`Event::branch`], falling back to [`UNKNOWN_BRANCH`]
    pub fn branch_or_unknown(&self) -> &str {
        self.branch().unwrap_or(UNKNOWN_BRANCH)
    }

    pub fn metadata(&self, key: &str) -> Option<&Value> {
        self.provider_metadata.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(provider: Provider, source: Option<&str>, target: Option<&str>) -> Event {
        Event {
            provider,
            kind: EventKind::PullRequest,
            repository: Some(RepoRef::new("docs")),
            source_branch: source.map(str::to_string),
            target_branch: target.map(str::to_string),
            provider_metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn test_kind_string_roundtrip() {
        for kind in ["push", "deployment_status", "merge_request", "tag_push"] {
            assert_eq!(EventKind::from(kind).as_str(), kind);
        }
        assert_eq!(
            EventKind::from("confidential_issue"),
            EventKind::Other("confidential_issue".to_string())
        );
    }

    #[test]
    fn test_kind_serializes_as_plain_string() {
        let json = serde_json::to_string(&EventKind::PullRequestReview).unwrap();
        assert_eq!(json, "\"pull_request_review\"");
    }

    #[test]
    fn test_github_matches_on_target_branch() {
        let event = event(Provider::GitHub, Some("feature"), Some("main"));
        assert_eq!(event.branch(), Some("main"));
    }

    #[test]
    fn test_gitlab_matches_on_source_branch() {
        let event = event(Provider::GitLab, Some("feature"), Some("main"));
        assert_eq!(event.branch(), Some("feature"));
    }

    #[test]
    fn test_unknown_branch_sentinel() {
        let event = event(Provider::GitHub, None, None);
        assert_eq!(event.branch(), None);
        assert_eq!(event.branch_or_unknown(), UNKNOWN_BRANCH);
    }

    #[test]
    fn test_empty_repo_name_is_absent() {
        let mut event = event(Provider::Generic, None, None);
        event.repository = Some(RepoRef::new(""));
        assert_eq!(event.repo_name(), None);
    }
}
