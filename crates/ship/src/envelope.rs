//! MessagePack envelope accepted by the Arc `write/v2/msgpack` endpoint.
//!
//! ```text
//! { "batch": [ { "m": str, "t": int-ms, "tags": {str: str}, "fields": {str: f64} }, ... ] }
//! ```
//!
//! Structs are written as maps (`to_vec_named`) because the backend looks
//! records up by key, not by position.

use std::collections::BTreeMap;

use ghmon_core::model::record::{Batch, Record};
use serde::{Deserialize, Serialize};

pub const CONTENT_TYPE: &str = "application/msgpack";

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    batch: Vec<WireRecordRef<'a>>,
}

#[derive(Serialize)]
struct WireRecordRef<'a> {
    m: &'a str,
    t: i64,
    tags: &'a BTreeMap<String, String>,
    fields: &'a BTreeMap<String, f64>,
}

#[derive(Deserialize)]
struct Envelope {
    batch: Vec<WireRecord>,
}

#[derive(Deserialize)]
struct WireRecord {
    m: String,
    t: i64,
    #[serde(default)]
    tags: BTreeMap<String, String>,
    fields: BTreeMap<String, f64>,
}

pub fn encode(batch: &Batch) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    let envelope = EnvelopeRef {
        batch: batch
            .records()
            .iter()
            .map(|r| WireRecordRef {
                m: &r.measurement,
                t: r.timestamp,
                tags: &r.tags,
                fields: &r.fields,
            })
            .collect(),
    };
    rmp_serde::to_vec_named(&envelope)
}

pub fn decode(bytes: &[u8]) -> Result<Batch, rmp_serde::decode::Error> {
    let envelope: Envelope = rmp_serde::from_slice(bytes)?;
    Ok(envelope
        .batch
        .into_iter()
        .map(|w| Record {
            measurement: w.m,
            timestamp: w.t,
            tags: w.tags,
            fields: w.fields,
        })
        .collect::<Vec<_>>()
        .into())
}
