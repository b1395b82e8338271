use ghmon_core::model::record::Record;
use ghmon_core::model::repo::RepoId;

use crate::response::{OpenCounts, RepoDocument};

pub const MEASUREMENT: &str = "github_repo_stats";

pub const TAG_KEYS: [&str; 4] = ["repo", "owner", "language", "default_branch"];

pub const COUNT_FIELDS: [&str; 9] = [
    "stars",
    "watchers",
    "forks",
    "open_issues",
    "open_prs",
    "total_issues",
    "subscribers",
    "size_kb",
    "network_count",
];

pub const FLAG_FIELDS: [&str; 5] = [
    "is_fork",
    "is_archived",
    "has_issues",
    "has_wiki",
    "has_pages",
];

/// Pure mapping from the decoded documents to a record; the timestamp is
/// the only input that changes between identical responses.
pub fn build_record(
    repo: &RepoId,
    doc: &RepoDocument,
    open: OpenCounts,
    timestamp: i64,
) -> Record {
    let language = doc.language.as_deref().filter(|l| !l.is_empty()).unwrap_or("none");
    let default_branch = doc
        .default_branch
        .as_deref()
        .filter(|b| !b.is_empty())
        .unwrap_or("main");

    Record::new(MEASUREMENT, timestamp)
        .with_tag("repo", repo.as_str())
        .with_tag("owner", doc.owner.login.as_str())
        .with_tag("language", language)
        .with_tag("default_branch", default_branch)
        .with_field("stars", doc.stargazers_count as f64)
        .with_field("watchers", doc.watchers_count as f64)
        .with_field("forks", doc.forks_count as f64)
        .with_field("open_issues", open.issues as f64)
        .with_field("open_prs", open.pull_requests as f64)
        .with_field("total_issues", doc.open_issues_count as f64)
        .with_field("subscribers", doc.subscribers_count.unwrap_or(0) as f64)
        .with_field("size_kb", doc.size as f64)
        .with_field("network_count", doc.network_count.unwrap_or(0) as f64)
        .with_flag("is_fork", doc.fork)
        .with_flag("is_archived", doc.archived)
        .with_flag("has_issues", doc.has_issues)
        .with_flag("has_wiki", doc.has_wiki)
        .with_flag("has_pages", doc.has_pages)
}
