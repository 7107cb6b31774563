//! Sync Service
//!
//! Uploads offline-created responses once connectivity returns and forwards
//! finished responses to their destinations. One pass runs at a time; a
//! request made while offline or mid-pass is dropped, not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};

use super::connectivity::Connectivity;
use super::destinations::DestinationRegistry;
use super::events::{SyncEvent, SyncEvents, SyncListener};
use crate::domain::{DestinationKind, DomainError, DomainResult, FormDestination, FormResponse};
use crate::repository::ResponseStore;

/// Pushes one response to the backend
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, response: &FormResponse) -> DomainResult<()>;
}

/// Stand-in backend: waits `delay` and reports success
#[derive(Debug, Clone)]
pub struct SimulatedUploader {
    delay: Duration,
}

impl SimulatedUploader {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Uploader for SimulatedUploader {
    async fn upload(&self, response: &FormResponse) -> DomainResult<()> {
        tokio::time::sleep(self.delay).await;
        debug!("Uploaded response {:?}", response.id);
        Ok(())
    }
}

/// Outcome of forwarding one response
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub skipped: usize,
    /// Destination name and the error it reported
    pub failed: Vec<(String, DomainError)>,
}

struct SyncInner {
    responses: Arc<dyn ResponseStore>,
    connectivity: Connectivity,
    uploader: Arc<dyn Uploader>,
    destinations: DestinationRegistry,
    events: SyncEvents,
    syncing: AtomicBool,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

/// Clears the in-flight flag however the pass ends
struct SyncingGuard<'a>(&'a AtomicBool);

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct SyncService {
    inner: Arc<SyncInner>,
}

impl SyncService {
    pub fn new(
        responses: Arc<dyn ResponseStore>,
        connectivity: Connectivity,
        uploader: Arc<dyn Uploader>,
        destinations: DestinationRegistry,
    ) -> Self {
        Self {
            inner: Arc::new(SyncInner {
                responses,
                connectivity,
                uploader,
                destinations,
                events: SyncEvents::new(),
                syncing: AtomicBool::new(false),
                watcher: Mutex::new(None),
            }),
        }
    }

    fn watcher(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.inner.watcher.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_online(&self) -> bool {
        self.inner.connectivity.is_online()
    }

    pub fn is_syncing(&self) -> bool {
        self.inner.syncing.load(Ordering::SeqCst)
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.inner.connectivity
    }

    pub fn add_listener(&self, listener: &SyncListener) {
        self.inner.events.add_listener(listener);
    }

    pub fn remove_listener(&self, listener: &SyncListener) {
        self.inner.events.remove_listener(listener);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    /// Follow the connectivity signal: sync now if online, then on every
    /// offline to online transition. Without a runtime the service stays inert.
    pub fn start(&self) {
        let Ok(runtime) = Handle::try_current() else {
            warn!("No async runtime; sync service not started");
            return;
        };
        let mut watcher = self.watcher();
        if watcher.is_some() {
            return;
        }

        let mut rx = self.inner.connectivity.subscribe();
        let weak = Arc::downgrade(&self.inner);
        *watcher = Some(runtime.spawn(async move {
            let mut was_online = *rx.borrow_and_update();
            if was_online && !sync_weak(&weak).await {
                return;
            }
            while rx.changed().await.is_ok() {
                let online = *rx.borrow_and_update();
                if online && !was_online && !sync_weak(&weak).await {
                    break;
                }
                was_online = online;
            }
        }));
        info!("Sync service started ({})", if self.is_online() { "online" } else { "offline" });
    }

    /// Stop following connectivity and drop every listener
    pub fn dispose(&self) {
        if let Some(handle) = self.watcher().take() {
            handle.abort();
        }
        self.inner.events.clear();
        info!("Sync service disposed");
    }

    /// Upload every unsynced response and mark it synced.
    ///
    /// Returns `Ok(None)` when the pass was dropped (offline or already
    /// syncing), otherwise the number of responses synced.
    pub async fn sync(&self) -> DomainResult<Option<usize>> {
        if !self.is_online() {
            debug!("Offline; sync skipped");
            return Ok(None);
        }
        if self
            .inner
            .syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Sync already in progress; request dropped");
            return Ok(None);
        }
        let _guard = SyncingGuard(&self.inner.syncing);

        self.inner.events.emit(SyncEvent::SyncStarted);
        match self.upload_unsynced().await {
            Ok(synced) => {
                info!("Sync complete: {} responses synced", synced);
                self.inner.events.emit(SyncEvent::SyncCompleted { synced });
                Ok(Some(synced))
            }
            Err(e) => {
                error!("Sync failed: {}", e);
                self.inner.events.emit(SyncEvent::SyncFailed { error: e.clone() });
                Err(e)
            }
        }
    }

    async fn upload_unsynced(&self) -> DomainResult<usize> {
        let pending = self.inner.responses.list_unsynced().await?;
        debug!("{} responses waiting for sync", pending.len());

        let mut uploads = JoinSet::new();
        for response in pending {
            let inner = Arc::clone(&self.inner);
            uploads.spawn(async move {
                let Some(id) = response.id else {
                    return Ok(false);
                };
                inner.uploader.upload(&response).await?;
                Ok::<_, DomainError>(inner.responses.mark_synced(id).await?.is_some())
            });
        }

        let mut synced = 0;
        let mut failure = None;
        while let Some(joined) = uploads.join_next().await {
            match joined {
                Ok(Ok(true)) => synced += 1,
                Ok(Ok(false)) => {}
                Ok(Err(e)) => {
                    failure.get_or_insert(e);
                }
                Err(e) => {
                    failure.get_or_insert(DomainError::Unknown(format!("Upload task failed: {}", e)));
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(synced),
        }
    }

    /// Forward a response to each enabled destination in order. A failing
    /// destination is reported and the rest still run.
    pub async fn process_destinations(
        &self,
        response: &FormResponse,
        destinations: &[FormDestination],
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        if destinations.is_empty() {
            debug!("No destinations configured for response {:?}", response.id);
            return report;
        }

        let response_id = response.id;
        self.inner.events.emit(SyncEvent::DestinationsStarted { response_id });

        for destination in destinations {
            if !destination.enabled {
                report.skipped += 1;
                continue;
            }
            let handler = match &destination.kind {
                DestinationKind::Other(_) => None,
                kind => self.inner.destinations.handler_for(kind),
            };
            let Some(handler) = handler else {
                warn!("Unknown destination type: {} ({})", destination.kind.as_str(), destination.name);
                report.skipped += 1;
                continue;
            };

            match handler.deliver(response, destination).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    error!("Error processing destination {}: {}", destination.name, e);
                    self.inner.events.emit(SyncEvent::DestinationFailed {
                        response_id,
                        destination: destination.name.clone(),
                        error: e.clone(),
                    });
                    report.failed.push((destination.name.clone(), e));
                }
            }
        }

        self.inner.events.emit(SyncEvent::DestinationsCompleted { response_id });
        report
    }
}

/// Run one pass for a watcher; false once the service is gone
async fn sync_weak(weak: &Weak<SyncInner>) -> bool {
    let Some(inner) = weak.upgrade() else {
        return false;
    };
    // Failures were already logged and emitted
    let _ = SyncService { inner }.sync().await;
    true
}

impl Drop for SyncInner {
    fn drop(&mut self) {
        let watcher = self.watcher.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(handle) = watcher.take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for SyncService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncService")
            .field("online", &self.is_online())
            .field("syncing", &self.is_syncing())
            .finish()
    }
}
