//! Action matching by naming convention.
//!
//! An action is an executable whose file name encodes what it reacts to.
//! A name is selected when it matches any of these patterns:
//!
//! - `{event}-{repo}-{branch}*`
//! - `{event}-{repo}_*`
//! - `{event}-{repo}.ext`
//! - `{event}_*`
//! - `{event}.ext`
//!
//! Patterns are prefix/suffix anchored; a name merely containing the event
//! is not selected.

use std::path::Path;

use anyhow::{Context, Result};

/// One of the naming patterns an action name can follow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionPattern {
    EventRepoBranch,
    EventRepoPrefixed,
    EventRepoExact,
    EventPrefixed,
    EventExact,
}

impl ActionPattern {
    pub const ALL: [ActionPattern; 5] = [
        Self::EventRepoBranch,
        Self::EventRepoPrefixed,
        Self::EventRepoExact,
        Self::EventPrefixed,
        Self::EventExact,
    ];

    /// Whether `name` follows this pattern; patterns needing an absent
    /// repository or branch never match
    pub fn matches(&self, name: &str, event: &str, repo: Option<&str>, branch: Option<&str>) -> bool {
        match self {
            Self::EventRepoBranch => match (repo, branch) {
                (Some(repo), Some(branch)) => {
                    name.starts_with(&format!("{}-{}-{}", event, repo, branch))
                }
                _ => false,
            },
            Self::EventRepoPrefixed => {
                repo.map_or(false, |repo| name.starts_with(&format!("{}-{}_", event, repo)))
            }
            Self::EventRepoExact => repo.map_or(false, |repo| {
                is_stem_with_extension(name, &format!("{}-{}", event, repo))
            }),
            Self::EventPrefixed => name.starts_with(&format!("{}_", event)),
            Self::EventExact => is_stem_with_extension(name, event),
        }
    }
}

/// `name` is exactly `{stem}.{ext}` with a non-empty, dot-free extension
fn is_stem_with_extension(name: &str, stem: &str) -> bool {
    name.strip_prefix(stem)
        .and_then(|rest| rest.strip_prefix('.'))
        .map_or(false, |ext| !ext.is_empty() && !ext.contains('.'))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Select the action names for an event, keeping namespace order
pub fn match_actions<S: AsRef<str>>(
    namespace: &[S],
    event: &str,
    repo: Option<&str>,
    branch: Option<&str>,
) -> Vec<String> {
    let repo = non_empty(repo);
    let branch = non_empty(branch);

    namespace
        .iter()
        .map(|name| name.as_ref())
        .filter(|name| {
            ActionPattern::ALL
                .iter()
                .any(|pattern| pattern.matches(name, event, repo, branch))
        })
        .map(str::to_string)
        .collect()
}

/// List the action namespace under `dir`: regular file names, sorted.
///
/// A missing directory is an empty namespace.
pub fn list_namespace(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list action directory: {}", dir.display()))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry
            .with_context(|| format!("Failed to read entry in {}", dir.display()))?;
        let file_type = entry.file_type()?;
        if !file_type.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }

    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_exact_needs_an_extension() {
        let pattern = ActionPattern::EventExact;
        assert!(pattern.matches("push.sh", "push", None, None));
        assert!(!pattern.matches("push", "push", None, None));
        assert!(!pattern.matches("push.", "push", None, None));
        assert!(!pattern.matches("pushy.sh", "push", None, None));
        assert!(!pattern.matches("push.tar.gz", "push", None, None));
    }

    #[test]
    fn test_repo_patterns_need_a_repo() {
        assert!(!ActionPattern::EventRepoPrefixed.matches("push-docs_ci.sh", "push", None, None));
        assert!(ActionPattern::EventRepoPrefixed.matches(
            "push-docs_ci.sh",
            "push",
            Some("docs"),
            None
        ));
        assert!(ActionPattern::EventRepoExact.matches("push-docs.py", "push", Some("docs"), None));
    }

    #[test]
    fn test_branch_pattern_needs_repo_and_branch() {
        let name = "push-docs-main_publish.sh";
        let pattern = ActionPattern::EventRepoBranch;
        assert!(pattern.matches(name, "push", Some("docs"), Some("main")));
        assert!(!pattern.matches(name, "push", Some("docs"), None));
        assert!(!pattern.matches(name, "push", None, Some("main")));
        assert!(!pattern.matches(name, "push", Some("docs"), Some("develop")));
    }

    #[test]
    fn test_empty_repo_is_treated_as_absent() {
        let matched = match_actions(&["push-_x.sh", "push.sh"], "push", Some(""), None);
        assert_eq!(matched, vec!["push.sh".to_string()]);
    }

    #[test]
    fn test_missing_namespace_dir_is_empty() {
        let names = list_namespace(Path::new("/nonexistent/hookshub/actions")).unwrap();
        assert!(names.is_empty());
    }
}
