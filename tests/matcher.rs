//! Action Matching Integration Tests
//!
//! Tests for selecting actions from a namespace by file name.

use hookshub::core::{list_namespace, match_actions};
use tempfile::TempDir;

#[test]
fn test_matches_event_and_repo_prefixed_names() {
    let namespace = ["push_deploy.sh", "push-myrepo_ci.sh", "unrelated.sh"];

    let matched = match_actions(&namespace, "push", Some("myrepo"), Some("main"));
    assert_eq!(matched, vec!["push_deploy.sh", "push-myrepo_ci.sh"]);
}

#[test]
fn test_all_five_patterns() {
    let namespace = [
        "push-docs-main_publish.sh",
        "push-docs_lint.sh",
        "push-docs.py",
        "push_notify.sh",
        "push.py",
    ];

    let matched = match_actions(&namespace, "push", Some("docs"), Some("main"));
    assert_eq!(matched, namespace.to_vec());
}

#[test]
fn test_other_repo_and_branch_are_excluded() {
    let namespace = [
        "push-docs-develop_publish.sh",
        "push-web_lint.sh",
        "push-web.py",
        "pull_request_comment.py",
    ];

    let matched = match_actions(&namespace, "push", Some("docs"), Some("main"));
    assert!(matched.is_empty());
}

#[test]
fn test_substring_is_not_a_match() {
    let namespace = ["deploy-push.sh", "on_push.sh", "pushy.sh", "xpush_deploy.sh"];

    let matched = match_actions(&namespace, "push", Some("docs"), Some("main"));
    assert!(matched.is_empty());
}

#[test]
fn test_bare_patterns_without_repo_or_branch() {
    let namespace = ["status_notify.sh", "status.py", "status-docs_x.sh", "status-docs-main.sh"];

    let matched = match_actions(&namespace, "status", None, None);
    assert_eq!(matched, vec!["status_notify.sh", "status.py"]);

    // Repository known, branch unknown
    let matched = match_actions(&namespace, "status", Some("docs"), None);
    assert_eq!(matched, vec!["status_notify.sh", "status.py", "status-docs_x.sh"]);
}

#[test]
fn test_namespace_order_is_preserved() {
    let namespace = ["push_b.sh", "push_a.sh", "push.py"];

    let matched = match_actions(&namespace, "push", None, None);
    assert_eq!(matched, vec!["push_b.sh", "push_a.sh", "push.py"]);
}

#[test]
fn test_list_namespace_lists_sorted_files_only() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("push_b.sh"), "").unwrap();
    std::fs::write(temp.path().join("push_a.sh"), "").unwrap();
    std::fs::create_dir(temp.path().join("push_dir")).unwrap();

    let names = list_namespace(temp.path()).unwrap();
    assert_eq!(names, vec!["push_a.sh", "push_b.sh"]);
}
