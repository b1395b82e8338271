use serde_json::{Value, json};

/// A trimmed `GET /repos/{owner}/{name}` body: 10 stars, 2 forks and three
/// open issues-plus-PRs.
pub fn repo_json(owner: &str, name: &str) -> Value {
    json!({
        "id": 1296269,
        "name": name,
        "full_name": format!("{owner}/{name}"),
        "owner": { "login": owner, "type": "Organization" },
        "private": false,
        "fork": false,
        "language": "Rust",
        "default_branch": "main",
        "stargazers_count": 10,
        "watchers_count": 10,
        "forks_count": 2,
        "open_issues_count": 3,
        "subscribers_count": 4,
        "network_count": 2,
        "size": 512,
        "archived": false,
        "has_issues": true,
        "has_wiki": false,
        "has_pages": false
    })
}

/// An open-issues listing holding `issues` plain issues followed by `prs`
/// pull requests.
pub fn issues_json(issues: usize, prs: usize) -> Value {
    let plain = (0..issues).map(|i| json!({ "number": i + 1, "state": "open" }));
    let pulls = (0..prs).map(|i| {
        json!({
            "number": issues + i + 1,
            "state": "open",
            "pull_request": { "url": format!("https://api.github.com/pulls/{}", issues + i + 1) }
        })
    });
    Value::Array(plain.chain(pulls).collect())
}
