//! Cooperative cancellation shared between the signal listener and the batch loop
//!
//! The shutdown flag is a `watch` channel so readers can either poll it or
//! await it, and every write is visible to every subsequent read. It is set
//! at most once and never cleared. The per-job abort flag is reset at the
//! start of each job and raised only when a running job is torn down because
//! of a shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug)]
struct Inner {
    shutdown_tx: watch::Sender<bool>,
    job_aborted: AtomicBool,
}

/// Handle to the process-wide cancellation flags
///
/// Cloning is cheap; all clones observe the same flags.
#[derive(Debug, Clone)]
pub struct CancellationState {
    inner: Arc<Inner>,
}

impl Default for CancellationState {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationState {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                shutdown_tx,
                job_aborted: AtomicBool::new(false),
            }),
        }
    }

    /// Request a graceful shutdown
    ///
    /// Safe to call from a signal listener task: it performs no I/O.
    pub fn request_shutdown(&self) {
        self.inner.shutdown_tx.send_replace(true);
    }

    pub fn is_shutdown_requested(&self) -> bool {
        *self.inner.shutdown_tx.borrow()
    }

    /// Resolve once shutdown has been requested
    ///
    /// Resolves immediately if the flag is already set.
    pub async fn shutdown_requested(&self) {
        let mut rx = self.inner.shutdown_tx.subscribe();
        // The sender lives as long as `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|requested| *requested).await;
    }

    /// Clear the per-job abort flag before a new job starts
    pub fn begin_job(&self) {
        self.inner.job_aborted.store(false, Ordering::SeqCst);
    }

    /// Record that the current job was torn down by a shutdown request
    pub fn mark_job_aborted(&self) {
        self.inner.job_aborted.store(true, Ordering::SeqCst);
    }

    pub fn is_job_aborted(&self) -> bool {
        self.inner.job_aborted.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_shutdown_flag_is_sticky() {
        let cancel = CancellationState::new();
        assert!(!cancel.is_shutdown_requested());

        cancel.request_shutdown();
        cancel.request_shutdown();
        assert!(cancel.is_shutdown_requested());

        // begin_job only touches the per-job flag
        cancel.begin_job();
        assert!(cancel.is_shutdown_requested());
    }

    #[test]
    fn test_clones_share_state() {
        let cancel = CancellationState::new();
        let other = cancel.clone();
        other.request_shutdown();
        assert!(cancel.is_shutdown_requested());
    }

    #[test]
    fn test_job_abort_flag_resets_per_job() {
        let cancel = CancellationState::new();
        cancel.mark_job_aborted();
        assert!(cancel.is_job_aborted());

        cancel.begin_job();
        assert!(!cancel.is_job_aborted());
    }

    #[tokio::test]
    async fn test_shutdown_requested_wakes_waiter() {
        let cancel = CancellationState::new();
        let waiter = cancel.clone();
        let handle = tokio::spawn(async move { waiter.shutdown_requested().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        cancel.request_shutdown();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter should wake after shutdown")
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_requested_resolves_when_already_set() {
        let cancel = CancellationState::new();
        cancel.request_shutdown();
        tokio::time::timeout(Duration::from_millis(100), cancel.shutdown_requested())
            .await
            .expect("already-set flag should resolve immediately");
    }
}
