//! Remote source: the HN Algolia search API.
//!
//! - [`client`] - HTTP fetching with retry, timeout and size limits
//! - [`types`] - JSON wire types and their mapping onto [`Article`](crate::storage::Article)

mod client;
mod types;

pub use client::{FetchError, HnClient, RemoteSource, DEFAULT_BASE_URL, DEFAULT_QUERY};
pub use types::{SearchHit, SearchResponse};
