//! Sync lifecycle events
//!
//! Listeners are plain callbacks registered by reference; a panicking
//! listener is logged and skipped. Every event is also broadcast to async
//! subscribers.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

use log::error;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::domain::DomainError;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncEventKind {
    Start,
    Complete,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SyncEvent {
    /// A sync pass began
    SyncStarted,
    /// A sync pass finished; `synced` responses were uploaded
    SyncCompleted { synced: usize },
    SyncFailed { error: DomainError },
    /// Destination processing began for a response
    DestinationsStarted { response_id: Option<i64> },
    DestinationsCompleted { response_id: Option<i64> },
    /// One destination failed; the others still ran
    DestinationFailed {
        response_id: Option<i64>,
        destination: String,
        error: DomainError,
    },
}

impl SyncEvent {
    pub fn kind(&self) -> SyncEventKind {
        match self {
            SyncEvent::SyncStarted | SyncEvent::DestinationsStarted { .. } => SyncEventKind::Start,
            SyncEvent::SyncCompleted { .. } | SyncEvent::DestinationsCompleted { .. } => SyncEventKind::Complete,
            SyncEvent::SyncFailed { .. } | SyncEvent::DestinationFailed { .. } => SyncEventKind::Error,
        }
    }
}

pub type SyncListener = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

/// Listener registry plus broadcast channel
pub struct SyncEvents {
    listeners: Mutex<Vec<SyncListener>>,
    channel: broadcast::Sender<SyncEvent>,
}

impl Default for SyncEvents {
    fn default() -> Self {
        let (channel, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            listeners: Mutex::new(Vec::new()),
            channel,
        }
    }
}

fn same_listener(a: &SyncListener, b: &SyncListener) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl SyncEvents {
    pub fn new() -> Self {
        Self::default()
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<SyncListener>> {
        self.listeners.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a listener; registering the same one twice has no effect
    pub fn add_listener(&self, listener: &SyncListener) {
        let mut listeners = self.listeners();
        if !listeners.iter().any(|l| same_listener(l, listener)) {
            listeners.push(Arc::clone(listener));
        }
    }

    pub fn remove_listener(&self, listener: &SyncListener) {
        self.listeners().retain(|l| !same_listener(l, listener));
    }

    pub fn clear(&self) {
        self.listeners().clear();
    }

    pub fn listener_count(&self) -> usize {
        self.listeners().len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.channel.subscribe()
    }

    pub fn emit(&self, event: SyncEvent) {
        // Snapshot so listeners may add or remove listeners
        let listeners: Vec<SyncListener> = self.listeners().clone();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(&event))).is_err() {
                error!("Error in sync listener while handling {:?}", event.kind());
            }
        }
        // No subscribers is fine
        let _ = self.channel.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>) -> SyncListener {
        let counter = Arc::clone(counter);
        Arc::new(move |_event: &SyncEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_add_and_remove_by_reference() {
        let events = SyncEvents::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let a = counting(&hits);
        let b = counting(&hits);

        events.add_listener(&a);
        events.add_listener(&a);
        events.add_listener(&b);
        assert_eq!(events.listener_count(), 2);

        events.emit(SyncEvent::SyncStarted);
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        events.remove_listener(&a);
        events.emit(SyncEvent::SyncStarted);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_panicking_listener_does_not_break_others() {
        let events = SyncEvents::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let bad: SyncListener = Arc::new(|_event: &SyncEvent| panic!("listener bug"));
        let good = counting(&hits);

        events.add_listener(&bad);
        events.add_listener(&good);
        events.emit(SyncEvent::SyncCompleted { synced: 1 });
        events.emit(SyncEvent::SyncCompleted { synced: 2 });
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let events = SyncEvents::new();
        let mut rx = events.subscribe();

        events.emit(SyncEvent::SyncStarted);
        events.emit(SyncEvent::SyncFailed {
            error: DomainError::Database("disk full".into()),
        });

        assert_eq!(rx.recv().await.unwrap().kind(), SyncEventKind::Start);
        assert_eq!(rx.recv().await.unwrap().kind(), SyncEventKind::Error);
    }

    #[test]
    fn test_event_serialization() {
        let value = serde_json::to_value(SyncEvent::SyncCompleted { synced: 3 }).unwrap();
        assert_eq!(value, serde_json::json!({"event": "syncCompleted", "synced": 3}));
    }
}
