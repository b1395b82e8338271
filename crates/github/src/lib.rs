pub mod client;
pub mod error;
pub mod record;
pub mod response;

pub use client::{FetcherConfig, GitHubFetcher};
pub use error::FetchError;
pub use record::MEASUREMENT;
