use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;

use super::{ConnectionState, Connectivity};

/// Tracks reachability of one `host:port` by opening TCP connections.
///
/// A background task re-probes every `interval` and publishes only actual
/// transitions. The task is aborted when the monitor is dropped.
pub struct NetworkMonitor {
    addr: Arc<str>,
    probe_timeout: Duration,
    state: Arc<watch::Sender<ConnectionState>>,
    task: JoinHandle<()>,
}

impl NetworkMonitor {
    /// Probe once, then keep probing in the background.
    pub async fn spawn(addr: &str, interval: Duration, probe_timeout: Duration) -> Self {
        let addr: Arc<str> = Arc::from(addr);
        let initial = ConnectionState::Unavailable.after_check(probe(&addr, probe_timeout).await);
        tracing::info!(addr = %addr, state = ?initial, "Connectivity monitor started");

        let (state, _) = watch::channel(initial);
        let state = Arc::new(state);

        let task = tokio::spawn(probe_loop(
            Arc::clone(&addr),
            interval,
            probe_timeout,
            Arc::clone(&state),
        ));

        Self {
            addr,
            probe_timeout,
            state,
            task,
        }
    }

    pub fn current(&self) -> ConnectionState {
        *self.state.borrow()
    }
}

impl Drop for NetworkMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[async_trait]
impl Connectivity for NetworkMonitor {
    /// Runs a fresh probe and publishes its outcome, so the point query and
    /// the stream never disagree.
    async fn is_available(&self) -> bool {
        let reachable = probe(&self.addr, self.probe_timeout).await;
        publish(&self.state, reachable);
        reachable
    }

    fn observe(&self) -> BoxStream<'static, ConnectionState> {
        WatchStream::new(self.state.subscribe()).boxed()
    }
}

async fn probe(addr: &str, probe_timeout: Duration) -> bool {
    match tokio::time::timeout(probe_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            tracing::trace!(addr, error = %e, "Reachability probe failed");
            false
        }
        Err(_) => {
            tracing::trace!(addr, "Reachability probe timed out");
            false
        }
    }
}

fn publish(state: &watch::Sender<ConnectionState>, reachable: bool) {
    let changed = state.send_if_modified(|current| {
        let next = current.after_check(reachable);
        let changed = next != *current;
        *current = next;
        changed
    });
    if changed {
        tracing::info!(state = ?*state.borrow(), "Connectivity changed");
    }
}

async fn probe_loop(
    addr: Arc<str>,
    interval: Duration,
    probe_timeout: Duration,
    state: Arc<watch::Sender<ConnectionState>>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately and spawn() has just probed.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let reachable = probe(&addr, probe_timeout).await;
        publish(&state, reachable);
    }
}
