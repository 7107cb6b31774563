//! Online/offline signal
//!
//! The host reports "became online" / "became offline"; everything else reads
//! the current state or waits for changes.

use std::sync::Arc;

use log::info;
use tokio::sync::watch;

#[derive(Clone)]
pub struct Connectivity {
    tx: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    /// Start with the state read once at startup
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn is_offline(&self) -> bool {
        !self.is_online()
    }

    /// Record a connectivity change; repeats of the current state are ignored
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            info!("Connectivity changed: {}", if online { "online" } else { "offline" });
        }
    }

    /// Receiver that wakes on every change
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl std::fmt::Debug for Connectivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connectivity").field("online", &self.is_online()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_changes_are_observed() {
        let connectivity = Connectivity::new(false);
        let mut rx = connectivity.subscribe();
        assert!(connectivity.is_offline());

        connectivity.set_online(true);
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());
        assert!(connectivity.is_online());
    }

    #[tokio::test]
    async fn test_repeated_state_does_not_notify() {
        let connectivity = Connectivity::new(true);
        let rx = connectivity.subscribe();
        connectivity.set_online(true);
        assert!(!rx.has_changed().unwrap());
    }
}
