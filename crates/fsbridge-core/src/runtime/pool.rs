//! Bounded worker pool for backend I/O

use super::responder::Responder;
use crate::error::{Error, Result};
use crate::types::Payload;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::{debug, error};

/// Runs backend work on a tokio runtime with at most `max_in_flight` jobs
/// executing at once. Submission never blocks the caller.
#[derive(Clone)]
pub struct WorkerPool {
    handle: Handle,
    permits: Arc<Semaphore>,
    spawned: Arc<AtomicU64>,
    in_flight: Arc<AtomicUsize>,
}

impl WorkerPool {
    pub fn new(handle: Handle, max_in_flight: usize) -> Self {
        Self {
            handle,
            permits: Arc::new(Semaphore::new(max_in_flight)),
            spawned: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a pool on the ambient tokio runtime
    pub fn current(max_in_flight: usize) -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|e| Error::Internal(format!("No tokio runtime available: {}", e)))?;
        Ok(Self::new(handle, max_in_flight))
    }

    /// Run `work` and resolve `responder` with its result.
    ///
    /// Errors and panics inside `work` are converted into an error outcome at
    /// this boundary; the responder is resolved exactly once either way.
    pub fn submit<F>(&self, responder: Responder, work: F)
    where
        F: Future<Output = Result<Payload>> + Send + 'static,
    {
        self.spawn(async move {
            let operation = responder.operation().to_string();
            let result = match AssertUnwindSafe(work).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => Err(Error::Internal(format!(
                    "worker panicked: {}",
                    panic_message(&*panic)
                ))),
            };
            if let Err(e) = &result {
                debug!("{} failed: {}", operation, e);
            }
            responder.resolve(result.into());
        });
    }

    /// Run a job that resolves its own responders
    pub fn spawn<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_add(1, Ordering::SeqCst);

        let permits = Arc::clone(&self.permits);
        let in_flight = Arc::clone(&self.in_flight);

        self.handle.spawn(async move {
            // The semaphore is never closed, so acquisition only waits.
            if let Ok(_permit) = permits.acquire_owned().await {
                if let Err(panic) = AssertUnwindSafe(job).catch_unwind().await {
                    error!("Worker job panicked: {}", panic_message(&*panic));
                }
            }
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });
    }

    /// Total number of jobs ever submitted
    pub fn spawned(&self) -> u64 {
        self.spawned.load(Ordering::SeqCst)
    }

    /// Jobs submitted but not yet finished
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::UiLoop;
    use crate::types::Outcome;
    use std::time::Duration;

    #[tokio::test]
    async fn test_submit_resolves_on_ui_loop() {
        let mut ui = UiLoop::new();
        let pool = WorkerPool::current(2).unwrap();
        let (responder, rx) = Responder::channel("check-broker-available", ui.handle());

        pool.submit(responder, async { Ok(Payload::Text("done".to_string())) });

        let outcome = ui.run_until(rx).await.unwrap();
        assert_eq!(outcome, Outcome::Success(Payload::Text("done".to_string())));
        assert_eq!(pool.spawned(), 1);
    }

    #[tokio::test]
    async fn test_panic_becomes_internal_error() {
        let mut ui = UiLoop::new();
        let pool = WorkerPool::current(1).unwrap();
        let (responder, rx) = Responder::channel("read-tree-file", ui.handle());

        pool.submit(responder, async {
            let missing: Option<Payload> = None;
            Ok(missing.expect("kaboom"))
        });

        let outcome = ui.run_until(rx).await.unwrap();
        assert_eq!(outcome.error_code(), Some("INTERNAL"));
    }

    #[tokio::test]
    async fn test_in_flight_is_bounded() {
        let pool = WorkerPool::current(1).unwrap();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let (second_tx, mut second_rx) = tokio::sync::oneshot::channel::<()>();

        pool.spawn(async move {
            let _ = release_rx.await;
        });
        pool.spawn(async move {
            let _ = second_tx.send(());
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(second_rx.try_recv().is_err());
        assert_eq!(pool.in_flight(), 2);

        release_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), second_rx)
            .await
            .unwrap()
            .unwrap();
    }
}
