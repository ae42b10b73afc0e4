//! Offline-first synchronization between the local store and the remote
//! search API.

mod engine;
mod error;

pub use engine::{ArticlesRepository, SyncEngine};
pub use error::{SyncError, SyncResult};
