//! UI-affine execution context
//!
//! The host owns a [`UiLoop`] and drains it from the one thread it treats as the
//! UI thread. Everything else only holds a cloneable [`UiHandle`] and posts jobs.

use std::future::Future;
use tokio::sync::mpsc;
use tracing::trace;

/// A unit of work to run on the UI context
pub type UiJob = Box<dyn FnOnce() + Send + 'static>;

/// Cloneable handle for posting jobs onto the UI context
#[derive(Clone, Debug)]
pub struct UiHandle {
    tx: mpsc::UnboundedSender<UiJob>,
}

impl UiHandle {
    /// Post a job. Returns `false` if the loop has been dropped.
    pub fn post(&self, job: UiJob) -> bool {
        self.tx.send(job).is_ok()
    }
}

/// Single-consumer queue of UI jobs
pub struct UiLoop {
    tx: mpsc::UnboundedSender<UiJob>,
    rx: mpsc::UnboundedReceiver<UiJob>,
}

impl UiLoop {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    pub fn handle(&self) -> UiHandle {
        UiHandle {
            tx: self.tx.clone(),
        }
    }

    /// Run every job already queued without waiting. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        if ran > 0 {
            trace!("Ran {} queued UI jobs", ran);
        }
        ran
    }

    /// Wait for the next job and run it. Cancel safe.
    pub async fn turn(&mut self) {
        if let Some(job) = self.rx.recv().await {
            job();
        }
    }

    /// Keep running UI jobs until `fut` completes
    pub async fn run_until<F: Future>(&mut self, fut: F) -> F::Output {
        tokio::pin!(fut);
        loop {
            tokio::select! {
                biased;
                out = &mut fut => return out,
                Some(job) = self.rx.recv() => job(),
            }
        }
    }
}

impl Default for UiLoop {
    fn default() -> Self {
        Self::new()
    }
}
