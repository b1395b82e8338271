use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GhmonError, Result};

/// A polled repository, always in `owner/name` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoId(String);

impl RepoId {
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let Some((owner, name)) = trimmed.split_once('/') else {
            return Err(GhmonError::InvalidArgument(format!(
                "repository must be owner/name, got {input:?}"
            )));
        };
        if !valid_segment(owner) || !valid_segment(name) {
            return Err(GhmonError::InvalidArgument(format!(
                "invalid repository identifier: {input:?}"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn owner(&self) -> &str {
        self.split().0
    }

    pub fn name(&self) -> &str {
        self.split().1
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn split(&self) -> (&str, &str) {
        self.0.split_once('/').unwrap_or((self.0.as_str(), ""))
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RepoId {
    type Error = GhmonError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<RepoId> for String {
    fn from(value: RepoId) -> Self {
        value.0
    }
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Parses a comma-separated repository list, skipping blank entries.
pub fn parse_repo_list(raw: &str) -> Result<Vec<RepoId>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(RepoId::parse)
        .collect()
}
