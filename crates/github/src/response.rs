//! Typed views of the two GitHub REST documents the fetcher reads.
//!
//! Only the fields that end up in a record are modelled. Counters GitHub
//! always returns are required, so a truncated or foreign body fails to
//! decode instead of silently reporting zeros.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RepoDocument {
    pub owner: Owner,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub default_branch: Option<String>,
    pub stargazers_count: u64,
    pub watchers_count: u64,
    pub forks_count: u64,
    /// Open issues plus open pull requests, as GitHub counts them.
    pub open_issues_count: u64,
    /// Only present on the single-repository endpoint.
    #[serde(default)]
    pub subscribers_count: Option<u64>,
    #[serde(default)]
    pub network_count: Option<u64>,
    /// Kilobytes.
    pub size: u64,
    pub fork: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub has_issues: bool,
    #[serde(default)]
    pub has_wiki: bool,
    #[serde(default)]
    pub has_pages: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Owner {
    pub login: String,
}

/// One entry of `GET /repos/{owner}/{name}/issues`. Pull requests show up in
/// the same listing and carry a `pull_request` object.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct IssueItem {
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

impl IssueItem {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenCounts {
    pub issues: u64,
    pub pull_requests: u64,
}

impl OpenCounts {
    pub fn from_items(items: &[IssueItem]) -> Self {
        let pull_requests = items.iter().filter(|i| i.is_pull_request()).count() as u64;
        Self {
            issues: items.len() as u64 - pull_requests,
            pull_requests,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_minimal_repository() {
        let doc: RepoDocument = serde_json::from_str(
            r#"{
                "owner": {"login": "a"},
                "stargazers_count": 10,
                "watchers_count": 10,
                "forks_count": 2,
                "open_issues_count": 1,
                "size": 64,
                "fork": false,
                "language": null
            }"#,
        )
        .unwrap();
        assert_eq!(doc.owner.login, "a");
        assert_eq!(doc.language, None);
        assert_eq!(doc.subscribers_count, None);
        assert!(!doc.archived);
    }

    #[test]
    fn missing_required_counter_is_an_error() {
        let err = serde_json::from_str::<RepoDocument>(
            r#"{"owner": {"login": "a"}, "watchers_count": 1, "forks_count": 0,
                "open_issues_count": 0, "size": 1, "fork": false}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("stargazers_count"));
    }

    #[test]
    fn negative_counter_is_rejected() {
        let result = serde_json::from_str::<RepoDocument>(
            r#"{"owner": {"login": "a"}, "stargazers_count": -1, "watchers_count": 1,
                "forks_count": 0, "open_issues_count": 0, "size": 1, "fork": false}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn splits_issues_and_pull_requests() {
        let items: Vec<IssueItem> = serde_json::from_str(
            r#"[
                {"number": 1},
                {"number": 2, "pull_request": {"url": "x"}},
                {"number": 3, "pull_request": {"url": "y"}}
            ]"#,
        )
        .unwrap();
        assert_eq!(
            OpenCounts::from_items(&items),
            OpenCounts {
                issues: 1,
                pull_requests: 2
            }
        );
    }
}
