//! Seams between the collection loop and the systems it talks to.
//!
//! The loop only needs "turn a repository into a record" and "deliver a
//! batch"; the GitHub client and the Arc writer implement these, and tests
//! substitute in-memory fakes.

use std::future::Future;

use crate::model::record::{Batch, Record};
use crate::model::repo::RepoId;

/// Produces one record per repository, or fails for that repository only.
pub trait RecordSource {
    type Error: std::error::Error + Send + Sync + 'static;

    fn fetch(&self, repo: &RepoId) -> impl Future<Output = Result<Record, Self::Error>> + Send;
}

/// Delivers a whole batch in one request.
pub trait BatchSink {
    type Error: std::error::Error + Send + Sync + 'static;

    fn ship(&self, batch: &Batch) -> impl Future<Output = Result<ShipReport, Self::Error>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShipReport {
    /// The backend answered with a success status.
    Sent {
        records: usize,
        compressed_bytes: usize,
    },
    /// Nothing to send; no request was made.
    Skipped,
}
