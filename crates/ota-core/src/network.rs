use async_trait::async_trait;
use log::debug;
use ota_ports::{NetworkPort, NetworkState};
use tokio::sync::watch;

/// Network state fed by the host. Every publish that changes the state wakes
/// subscribers; identical publishes are dropped.
pub struct NetworkMonitor {
    state: watch::Sender<NetworkState>,
}

impl NetworkMonitor {
    #[must_use]
    pub fn new(initial: NetworkState) -> Self {
        let (state, _) = watch::channel(initial);
        Self { state }
    }

    /// Returns whether the state changed.
    pub fn publish(&self, next: NetworkState) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            debug!(
                "Network changed: connected={} wifi={}",
                next.connected, next.is_wifi
            );
        }
        changed
    }

    #[must_use]
    pub fn current(&self) -> NetworkState {
        *self.state.borrow()
    }
}

#[async_trait]
impl NetworkPort for NetworkMonitor {
    async fn sample(&self) -> NetworkState {
        self.current()
    }

    fn subscribe(&self) -> Option<watch::Receiver<NetworkState>> {
        Some(self.state.subscribe())
    }
}
