//! Connectivity signal: a point-in-time check plus a live stream of
//! network-availability transitions.
//!
//! - [`NetworkMonitor`] probes TCP reachability of the API host on an interval
//! - [`ManualConnectivity`] is driven by the caller (`--offline`, tests)
//!
//! Both publish through a `watch` channel with `send_if_modified`, so an
//! observer never sees the same state twice in a row.

mod manual;
mod monitor;

use async_trait::async_trait;
use futures::stream::BoxStream;

pub use manual::ManualConnectivity;
pub use monitor::NetworkMonitor;

/// Network availability as seen by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Available,
    /// Never reached the network since the last time it was checked.
    Unavailable,
    /// Was available, then went away.
    Lost,
}

impl ConnectionState {
    pub fn is_available(self) -> bool {
        self == ConnectionState::Available
    }

    /// State after a reachability check: an available network that fails a
    /// check becomes `Lost`; otherwise failure keeps the current offline state.
    pub(crate) fn after_check(self, reachable: bool) -> Self {
        match (self, reachable) {
            (_, true) => ConnectionState::Available,
            (ConnectionState::Available, false) => ConnectionState::Lost,
            (offline, false) => offline,
        }
    }
}

#[async_trait]
pub trait Connectivity: Send + Sync {
    /// Whether the network is reachable right now.
    async fn is_available(&self) -> bool;

    /// The current state, then every distinct transition. Dropping the
    /// stream unsubscribes.
    fn observe(&self) -> BoxStream<'static, ConnectionState>;
}
