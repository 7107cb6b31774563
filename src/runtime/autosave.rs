//! Debounced autosave timer
//!
//! Every `schedule` cancels the pending run and starts a new countdown, so only
//! the last request in a quiet period fires. A run that already started is
//! left to finish.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

struct Pending {
    handle: JoinHandle<()>,
    fired: Arc<AtomicBool>,
}

pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<Pending>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Cancel the pending countdown and run `task` after the delay
    pub fn schedule<F, Fut>(&self, task: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Ok(runtime) = Handle::try_current() else {
            warn!("No async runtime; autosave not scheduled");
            return;
        };

        let delay = self.delay;
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            flag.store(true, Ordering::SeqCst);
            task().await;
        });

        let previous = self.lock().replace(Pending { handle, fired });
        if let Some(previous) = previous {
            cancel_countdown(previous);
        }
    }

    /// Cancel a countdown that has not fired yet
    pub fn cancel(&self) {
        if let Some(pending) = self.lock().take() {
            cancel_countdown(pending);
        }
    }

    /// A countdown is running and has not fired
    pub fn is_pending(&self) -> bool {
        self.lock()
            .as_ref()
            .map(|p| !p.fired.load(Ordering::SeqCst) && !p.handle.is_finished())
            .unwrap_or(false)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Pending>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn cancel_countdown(pending: Pending) {
    if !pending.fired.load(Ordering::SeqCst) {
        debug!("Autosave countdown restarted");
        pending.handle.abort();
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter_task(counter: &Arc<AtomicUsize>) -> impl FnOnce() -> std::future::Ready<()> + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_quiet_period() {
        let debouncer = Debouncer::new(Duration::from_secs(5));
        let runs = Arc::new(AtomicUsize::new(0));

        debouncer.schedule(counter_task(&runs));
        assert!(debouncer.is_pending());

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_restarts_timer() {
        let debouncer = Debouncer::new(Duration::from_secs(5));
        let runs = Arc::new(AtomicUsize::new(0));

        debouncer.schedule(counter_task(&runs));
        tokio::time::sleep(Duration::from_secs(3)).await;
        debouncer.schedule(counter_task(&runs));
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_and_drop() {
        let runs = Arc::new(AtomicUsize::new(0));

        let debouncer = Debouncer::new(Duration::from_secs(1));
        debouncer.schedule(counter_task(&runs));
        debouncer.cancel();

        let dropped = Debouncer::new(Duration::from_secs(1));
        dropped.schedule(counter_task(&runs));
        drop(dropped);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_schedule_without_runtime_is_ignored() {
        let debouncer = Debouncer::new(Duration::from_secs(1));
        debouncer.schedule(|| std::future::ready(()));
        assert!(!debouncer.is_pending());
    }
}
