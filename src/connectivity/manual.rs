use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use super::{ConnectionState, Connectivity};

/// Connectivity that only changes when told to.
///
/// Clones share the same signal.
#[derive(Clone)]
pub struct ManualConnectivity {
    state: Arc<watch::Sender<ConnectionState>>,
}

impl ManualConnectivity {
    pub fn new(available: bool) -> Self {
        let initial = if available {
            ConnectionState::Available
        } else {
            ConnectionState::Unavailable
        };
        let (state, _) = watch::channel(initial);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn set_available(&self, available: bool) {
        let changed = self.state.send_if_modified(|state| {
            let next = state.after_check(available);
            let changed = next != *state;
            *state = next;
            changed
        });
        if changed {
            tracing::debug!(state = ?*self.state.borrow(), "Connectivity changed");
        }
    }

    pub fn current(&self) -> ConnectionState {
        *self.state.borrow()
    }
}

#[async_trait]
impl Connectivity for ManualConnectivity {
    async fn is_available(&self) -> bool {
        self.current().is_available()
    }

    fn observe(&self) -> BoxStream<'static, ConnectionState> {
        WatchStream::new(self.state.subscribe()).boxed()
    }
}
