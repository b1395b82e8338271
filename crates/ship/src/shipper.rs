use std::io::Write;
use std::time::Duration;

use bytes::Bytes;
use flate2::Compression;
use flate2::write::GzEncoder;
use ghmon_core::config::{Config, Secret};
use ghmon_core::model::record::Batch;
use ghmon_core::pipeline::{BatchSink, ShipReport};
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_ENCODING, CONTENT_TYPE, HeaderMap, HeaderValue};

use crate::envelope;
use crate::error::ShipError;

pub const WRITE_PATH: &str = "/write/v2/msgpack";
pub const DATABASE_HEADER: &str = "x-arc-database";

const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone)]
pub struct ShipperConfig {
    pub endpoint: String,
    pub token: Secret,
    pub database: Option<String>,
    pub timeout: Duration,
}

impl ShipperConfig {
    pub fn from_config(cfg: &Config) -> ghmon_core::Result<Self> {
        Ok(Self {
            endpoint: cfg.arc_url.clone(),
            token: cfg.arc_token()?.clone(),
            database: Some(cfg.arc_database.clone()).filter(|db| !db.is_empty()),
            timeout: cfg.ship_timeout,
        })
    }
}

/// Writes one batch per request to an Arc instance. Best effort: a failed
/// write is reported to the caller and the batch is not kept.
#[derive(Debug, Clone)]
pub struct ArcShipper {
    client: Client,
    url: String,
    headers: HeaderMap,
}

impl ArcShipper {
    pub fn new(cfg: ShipperConfig) -> Result<Self, ShipError> {
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = ?e, "failed to build arc http client; using defaults");
                Client::new()
            });
        let url = format!("{}{WRITE_PATH}", cfg.endpoint.trim_end_matches('/'));
        let headers = build_headers(&cfg)?;
        Ok(Self {
            client,
            url,
            headers,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn ship(&self, batch: &Batch) -> Result<ShipReport, ShipError> {
        if batch.is_empty() {
            return Ok(ShipReport::Skipped);
        }

        let packed = envelope::encode(batch)?;
        let body = gzip(&packed)?;
        let compressed_bytes = body.len();

        let resp = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .body(body)
            .send()
            .await
            .map_err(|source| ShipError::Transport {
                url: self.url.clone(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ShipError::Status {
                status: status.as_u16(),
                body: truncate(&text, MAX_ERROR_BODY),
            });
        }

        tracing::debug!(
            url = %self.url,
            records = batch.len(),
            raw_bytes = packed.len(),
            compressed_bytes,
            "batch accepted"
        );
        Ok(ShipReport::Sent {
            records: batch.len(),
            compressed_bytes,
        })
    }
}

impl BatchSink for ArcShipper {
    type Error = ShipError;

    async fn ship(&self, batch: &Batch) -> Result<ShipReport, ShipError> {
        ArcShipper::ship(self, batch).await
    }
}

fn build_headers(cfg: &ShipperConfig) -> Result<HeaderMap, ShipError> {
    let mut out = HeaderMap::new();
    out.insert(CONTENT_TYPE, HeaderValue::from_static(envelope::CONTENT_TYPE));
    out.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));

    let mut auth = HeaderValue::try_from(format!("Bearer {}", cfg.token.expose())).map_err(
        |e| ShipError::Header {
            name: "authorization",
            reason: e.to_string(),
        },
    )?;
    auth.set_sensitive(true);
    out.insert(AUTHORIZATION, auth);

    if let Some(db) = &cfg.database {
        let value = HeaderValue::try_from(db.as_str()).map_err(|e| ShipError::Header {
            name: DATABASE_HEADER,
            reason: e.to_string(),
        })?;
        out.insert(DATABASE_HEADER, value);
    }
    Ok(out)
}

fn gzip(body: &[u8]) -> std::io::Result<Bytes> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(body)?;
    Ok(Bytes::from(encoder.finish()?))
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
