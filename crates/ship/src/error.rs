use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShipError {
    #[error("failed to encode batch: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("failed to compress batch: {0}")]
    Compress(#[from] std::io::Error),

    #[error("invalid header {name}: {reason}")]
    Header { name: &'static str, reason: String },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("write rejected with HTTP {status}: {body}")]
    Status { status: u16, body: String },
}
