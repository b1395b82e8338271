use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("GET {url} returned HTTP {status}{}", status_hint(.status))]
    Status { url: String, status: u16 },

    #[error("GET {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("malformed response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid header {name}: {reason}")]
    Header { name: &'static str, reason: String },

    #[error("failed to build github http client: {0}")]
    Client(#[source] reqwest::Error),
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// GitHub answers 403 (and sometimes 429) when the rate limit is spent.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self.status(), Some(403 | 429))
    }
}

fn status_hint(status: &u16) -> &'static str {
    match status {
        404 => ": repository not found",
        403 | 429 => ": rate limit exceeded or access denied",
        _ => "",
    }
}
