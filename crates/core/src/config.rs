use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GhmonError, Result};
use crate::model::repo::{RepoId, parse_repo_list};
use crate::time::{parse_duration_str, parse_interval};

/// A bearer credential. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn masked(&self) -> String {
        let visible: String = self.0.chars().take(4).collect();
        if self.0.chars().count() <= 8 {
            "****".to_string()
        } else {
            format!("{visible}****")
        }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({})", self.masked())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub arc_url: String,
    pub arc_token: Option<Secret>,
    pub arc_database: String,
    pub repos: Vec<RepoId>,
    pub github_token: Option<Secret>,
    pub github_api_url: String,
    pub interval: Duration,
    pub request_delay: Duration,
    pub fetch_timeout: Duration,
    pub ship_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            arc_url: "http://localhost:8000".to_string(),
            arc_token: None,
            arc_database: "default".to_string(),
            repos: Vec::new(),
            github_token: None,
            github_api_url: "https://api.github.com".to_string(),
            interval: Duration::from_secs(600),
            request_delay: Duration::from_secs(1),
            fetch_timeout: Duration::from_secs(10),
            ship_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        let config_path = config_file_path();
        if let Some(file_overrides) = load_file_overrides(&config_path)? {
            apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        let env_overrides = load_env_overrides(|key| env::var(key).ok())?;
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        Ok(cfg)
    }

    /// Checks everything a run needs. Must pass before any client is built.
    pub fn validate(&self) -> Result<()> {
        if self.arc_token.is_none() {
            return Err(GhmonError::Config(
                "ARC_TOKEN is required (bearer token for the Arc write API)".to_string(),
            ));
        }
        if self.repos.is_empty() {
            return Err(GhmonError::Config(
                "GITHUB_REPOS is required (example: GITHUB_REPOS=owner/repo1,owner/repo2)"
                    .to_string(),
            ));
        }
        if self.interval.is_zero() {
            return Err(GhmonError::Config("interval must be greater than zero".to_string()));
        }
        check_http_url("arc_url", &self.arc_url)?;
        check_http_url("github_api_url", &self.github_api_url)?;
        Ok(())
    }

    pub fn arc_token(&self) -> Result<&Secret> {
        self.arc_token
            .as_ref()
            .ok_or_else(|| GhmonError::Config("ARC_TOKEN is required".to_string()))
    }

    pub fn redacted(&self) -> RedactedConfig {
        RedactedConfig {
            arc_url: self.arc_url.clone(),
            arc_token: self.arc_token.as_ref().map(Secret::masked),
            arc_database: self.arc_database.clone(),
            repos: self.repos.iter().map(ToString::to_string).collect(),
            github_token: self.github_token.as_ref().map(Secret::masked),
            github_api_url: self.github_api_url.clone(),
            interval: humantime::format_duration(self.interval).to_string(),
            request_delay: humantime::format_duration(self.request_delay).to_string(),
            fetch_timeout: humantime::format_duration(self.fetch_timeout).to_string(),
            ship_timeout: humantime::format_duration(self.ship_timeout).to_string(),
        }
    }
}

/// Printable view of [`Config`] with credentials masked.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RedactedConfig {
    pub arc_url: String,
    pub arc_token: Option<String>,
    pub arc_database: String,
    pub repos: Vec<String>,
    pub github_token: Option<String>,
    pub github_api_url: String,
    pub interval: String,
    pub request_delay: String,
    pub fetch_timeout: String,
    pub ship_timeout: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RepoListValue {
    List(Vec<String>),
    Csv(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum IntervalValue {
    Seconds(u64),
    Text(String),
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    arc_url: Option<String>,
    arc_token: Option<String>,
    arc_database: Option<String>,
    repos: Option<RepoListValue>,
    github_token: Option<String>,
    github_api_url: Option<String>,
    interval: Option<IntervalValue>,
    request_delay: Option<String>,
    fetch_timeout: Option<String>,
    ship_timeout: Option<String>,
}

fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var("GHMON_CONFIG") {
        return PathBuf::from(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"));
    config_home.join("ghmon/config.toml")
}

fn load_file_overrides(path: &Path) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| GhmonError::Config(format!("failed reading {}: {e}", path.display())))?;
    let parsed: ConfigOverrides = toml::from_str(&raw)
        .map_err(|e| GhmonError::Config(format!("failed parsing {}: {e}", path.display())))?;
    Ok(Some(parsed))
}

fn load_env_overrides<F>(lookup: F) -> Result<ConfigOverrides>
where
    F: Fn(&str) -> Option<String>,
{
    // Empty values count as unset, the way shell exports of "" usually mean.
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    Ok(ConfigOverrides {
        arc_url: get("ARC_URL"),
        arc_token: get("ARC_TOKEN"),
        arc_database: get("ARC_DATABASE"),
        repos: get("GITHUB_REPOS").map(RepoListValue::Csv),
        github_token: get("GITHUB_TOKEN"),
        github_api_url: get("GITHUB_API_URL"),
        interval: get("INTERVAL_SECONDS").map(IntervalValue::Text),
        request_delay: get("GHMON_REQUEST_DELAY"),
        fetch_timeout: get("GHMON_FETCH_TIMEOUT"),
        ship_timeout: get("GHMON_SHIP_TIMEOUT"),
    })
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.arc_url {
        cfg.arc_url = v.trim().trim_end_matches('/').to_string();
    }
    if let Some(v) = overrides.arc_token {
        cfg.arc_token = Some(Secret::new(v.trim()));
    }
    if let Some(v) = overrides.arc_database {
        cfg.arc_database = v.trim().to_string();
    }
    if let Some(v) = overrides.repos {
        let parsed = match v {
            RepoListValue::Csv(raw) => parse_repo_list(&raw),
            RepoListValue::List(items) => parse_repo_list(&items.join(",")),
        };
        cfg.repos =
            parsed.map_err(|e| GhmonError::Config(format!("bad repos in {source}: {e}")))?;
    }
    if let Some(v) = overrides.github_token {
        cfg.github_token = Some(Secret::new(v.trim()));
    }
    if let Some(v) = overrides.github_api_url {
        cfg.github_api_url = v.trim().trim_end_matches('/').to_string();
    }
    if let Some(v) = overrides.interval {
        cfg.interval = match v {
            IntervalValue::Seconds(secs) => Duration::from_secs(secs),
            IntervalValue::Text(raw) => parse_interval(&raw).map_err(|e| {
                GhmonError::Config(format!("bad interval in {source}: {e} (value={raw})"))
            })?,
        };
    }
    if let Some(v) = overrides.request_delay {
        cfg.request_delay = parse_duration_str(&v).map_err(|e| {
            GhmonError::Config(format!("bad request_delay in {source}: {e} (value={v})"))
        })?;
    }
    if let Some(v) = overrides.fetch_timeout {
        cfg.fetch_timeout = parse_duration_str(&v).map_err(|e| {
            GhmonError::Config(format!("bad fetch_timeout in {source}: {e} (value={v})"))
        })?;
    }
    if let Some(v) = overrides.ship_timeout {
        cfg.ship_timeout = parse_duration_str(&v).map_err(|e| {
            GhmonError::Config(format!("bad ship_timeout in {source}: {e} (value={v})"))
        })?;
    }
    Ok(())
}

fn check_http_url(name: &str, url: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(GhmonError::Config(format!(
            "{name} must start with http:// or https://, got {url}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config> {
        let mut cfg = Config::default();
        apply_overrides(&mut cfg, load_env_overrides(env_of(pairs))?, "environment")?;
        Ok(cfg)
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.arc_url, "http://localhost:8000");
        assert_eq!(cfg.arc_database, "default");
        assert_eq!(cfg.interval, Duration::from_secs(600));
        assert_eq!(cfg.request_delay, Duration::from_secs(1));
        assert_eq!(cfg.github_api_url, "https://api.github.com");
        assert!(cfg.arc_token.is_none());
    }

    #[test]
    fn env_overrides_populate_config() {
        let cfg = from_pairs(&[
            ("ARC_URL", "http://arc:8000/"),
            ("ARC_TOKEN", "arc-secret-token"),
            ("ARC_DATABASE", "github"),
            ("GITHUB_REPOS", "tokio-rs/tokio, serde-rs/serde"),
            ("GITHUB_TOKEN", "ghp_abcdefgh"),
            ("INTERVAL_SECONDS", "60"),
            ("GHMON_REQUEST_DELAY", "250ms"),
        ])
        .unwrap();

        assert_eq!(cfg.arc_url, "http://arc:8000");
        assert_eq!(cfg.arc_token.as_ref().map(Secret::expose), Some("arc-secret-token"));
        assert_eq!(cfg.arc_database, "github");
        assert_eq!(cfg.repos.len(), 2);
        assert_eq!(cfg.repos[1].as_str(), "serde-rs/serde");
        assert_eq!(cfg.interval, Duration::from_secs(60));
        assert_eq!(cfg.request_delay, Duration::from_millis(250));
        cfg.validate().unwrap();
    }

    #[test]
    fn missing_arc_token_fails_validation() {
        let cfg = from_pairs(&[("GITHUB_REPOS", "a/b")]).unwrap();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("ARC_TOKEN"));
    }

    #[test]
    fn empty_values_are_treated_as_unset() {
        let cfg = from_pairs(&[("ARC_TOKEN", "  "), ("GITHUB_REPOS", "a/b")]).unwrap();
        assert!(cfg.arc_token.is_none());
    }

    #[test]
    fn missing_repos_fails_validation() {
        let cfg = from_pairs(&[("ARC_TOKEN", "t"), ("GITHUB_REPOS", " , ")]).unwrap();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("GITHUB_REPOS"));
    }

    #[test]
    fn bad_values_are_reported_with_source() {
        let err = from_pairs(&[("INTERVAL_SECONDS", "often")]).unwrap_err();
        assert!(err.to_string().contains("bad interval in environment"));

        let err = from_pairs(&[("GITHUB_REPOS", "not-a-repo")]).unwrap_err();
        assert!(err.to_string().contains("bad repos in environment"));
    }

    #[test]
    fn rejects_non_http_urls() {
        let cfg = from_pairs(&[
            ("ARC_TOKEN", "t"),
            ("GITHUB_REPOS", "a/b"),
            ("ARC_URL", "localhost:8000"),
        ])
        .unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn file_overrides_accept_arrays_and_integer_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
arc_url = "http://arc.internal:8000"
arc_database = "stats"
repos = ["a/b", "c/d"]
interval = 120
fetch_timeout = "5s"
"#,
        )
        .unwrap();

        let overrides = load_file_overrides(&path).unwrap().unwrap();
        let mut cfg = Config::default();
        apply_overrides(&mut cfg, overrides, "config file").unwrap();

        assert_eq!(cfg.arc_url, "http://arc.internal:8000");
        assert_eq!(cfg.arc_database, "stats");
        assert_eq!(cfg.repos.len(), 2);
        assert_eq!(cfg.interval, Duration::from_secs(120));
        assert_eq!(cfg.fetch_timeout, Duration::from_secs(5));
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_file_overrides(&dir.path().join("absent.toml")).unwrap().is_none());
    }

    #[test]
    fn redacted_masks_tokens() {
        let cfg = from_pairs(&[("ARC_TOKEN", "arc-secret-token"), ("GITHUB_TOKEN", "short")])
            .unwrap();
        let view = cfg.redacted();
        assert_eq!(view.arc_token.as_deref(), Some("arc-****"));
        assert_eq!(view.github_token.as_deref(), Some("****"));
        assert_eq!(view.interval, "10m");
        assert!(!format!("{cfg:?}").contains("secret-token"));
    }
}
