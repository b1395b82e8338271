use std::time::Duration;

use ghmon_core::config::{Config, Secret};
use ghmon_core::model::record::Record;
use ghmon_core::model::repo::RepoId;
use ghmon_core::pipeline::RecordSource;
use ghmon_core::time::now_millis;
use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;

use crate::error::FetchError;
use crate::record::build_record;
use crate::response::{IssueItem, OpenCounts, RepoDocument};

const ACCEPT_V3: &str = "application/vnd.github.v3+json";
const ISSUES_PER_PAGE: &str = "100";

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub api_url: String,
    pub token: Option<Secret>,
    pub timeout: Duration,
}

impl FetcherConfig {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            api_url: cfg.github_api_url.clone(),
            token: cfg.github_token.clone(),
            timeout: cfg.fetch_timeout,
        }
    }
}

/// Reads a repository and its open issue listing, two GETs per call.
#[derive(Debug, Clone)]
pub struct GitHubFetcher {
    client: Client,
    api_url: String,
}

impl GitHubFetcher {
    pub fn new(cfg: FetcherConfig) -> Result<Self, FetchError> {
        let headers = default_headers(cfg.token.as_ref())?;
        let client = Client::builder()
            .timeout(cfg.timeout)
            .default_headers(headers)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self {
            client,
            api_url: cfg.api_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn fetch(&self, repo: &RepoId) -> Result<Record, FetchError> {
        let repo_url = format!("{}/repos/{}/{}", self.api_url, repo.owner(), repo.name());
        let doc: RepoDocument = self.get_json(&repo_url, &[]).await?;

        let issues_url = format!("{repo_url}/issues");
        let listing: Result<Vec<IssueItem>, FetchError> = self
            .get_json(
                &issues_url,
                &[("state", "open"), ("per_page", ISSUES_PER_PAGE)],
            )
            .await;
        // A repository with issues disabled answers 410 here; it still gets a record.
        let open = match listing {
            Ok(items) => OpenCounts::from_items(&items),
            Err(FetchError::Status { status, .. }) => {
                tracing::warn!(
                    repo = %repo,
                    status,
                    "issue listing unavailable; counting zero open issues and PRs"
                );
                OpenCounts::default()
            }
            Err(err) => return Err(err),
        };

        let record = build_record(repo, &doc, open, now_millis());
        tracing::info!(
            repo = %repo,
            stars = doc.stargazers_count,
            forks = doc.forks_count,
            open_issues = open.issues,
            open_prs = open.pull_requests,
            "fetched repository stats"
        );
        Ok(record)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        let transport = |source: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            source,
        };

        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = resp.bytes().await.map_err(transport)?;
        serde_json::from_slice(&body).map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

impl RecordSource for GitHubFetcher {
    type Error = FetchError;

    async fn fetch(&self, repo: &RepoId) -> Result<Record, FetchError> {
        GitHubFetcher::fetch(self, repo).await
    }
}

fn default_headers(token: Option<&Secret>) -> Result<HeaderMap, FetchError> {
    let mut out = HeaderMap::new();
    out.insert(ACCEPT, HeaderValue::from_static(ACCEPT_V3));
    out.insert(
        USER_AGENT,
        HeaderValue::from_static(concat!("ghmon/", env!("CARGO_PKG_VERSION"))),
    );
    if let Some(token) = token {
        let mut value = HeaderValue::try_from(format!("Bearer {}", token.expose())).map_err(
            |e| FetchError::Header {
                name: "authorization",
                reason: e.to_string(),
            },
        )?;
        value.set_sensitive(true);
        out.insert(AUTHORIZATION, value);
    }
    Ok(out)
}
