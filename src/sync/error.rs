use thiserror::Error;

use crate::remote::FetchError;

/// Failures of the sync engine.
///
/// None of these are fatal: they travel as values in results and stream
/// items, never as panics.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The network is unreachable. `cache_empty` is set when there was also
    /// nothing local to fall back on.
    #[error("{}", no_connectivity_message(.cache_empty))]
    NoConnectivity { cache_empty: bool },

    #[error("remote fetch failed: {0}")]
    RemoteFetchFailed(#[from] FetchError),

    #[error("local store failed: {0:#}")]
    LocalStoreFailed(anyhow::Error),

    /// Anything else, e.g. a panicking background task.
    #[error("unexpected error: {0}")]
    Unknown(String),
}

fn no_connectivity_message(cache_empty: &bool) -> &'static str {
    if *cache_empty {
        "no connectivity and no cache"
    } else {
        "no connectivity"
    }
}

impl SyncError {
    /// Whether the failure comes from missing network rather than from a
    /// misbehaving server or store.
    pub fn is_connectivity(&self) -> bool {
        match self {
            SyncError::NoConnectivity { .. } => true,
            SyncError::RemoteFetchFailed(e) => e.is_connectivity(),
            SyncError::LocalStoreFailed(_) | SyncError::Unknown(_) => false,
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
