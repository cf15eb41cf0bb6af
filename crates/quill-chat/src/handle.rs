//! Cancellation slot and request bookkeeping shared by a pipeline and its tasks.

use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use tokio_util::sync::CancellationToken;

/// A cloneable handle for observing a pipeline's request from external code.
///
/// All fields are `Arc`-wrapped, so cloning is cheap. Each pipeline owns its
/// own handle; nothing is shared between pipelines.
#[derive(Clone)]
pub struct PipelineHandle {
    pub(crate) cancel: Arc<Mutex<Option<CancellationToken>>>,
    pub(crate) generation: Arc<AtomicU64>,
    pub(crate) idle_notify: Arc<tokio::sync::Notify>,
    pub(crate) is_running: Arc<AtomicBool>,
}

impl PipelineHandle {
    pub(crate) fn new() -> Self {
        Self {
            cancel: Arc::new(Mutex::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
            idle_notify: Arc::new(tokio::sync::Notify::new()),
            is_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Retire any in-flight request and install a fresh token for a new one.
    ///
    /// Returns the new request's generation and token.
    pub(crate) fn arm(&self) -> (u64, CancellationToken) {
        let mut slot = self.cancel.lock();
        if let Some(previous) = slot.take() {
            previous.cancel();
        }
        let token = CancellationToken::new();
        *slot = Some(token.clone());
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.is_running.store(true, Ordering::Release);
        (generation, token)
    }

    /// Signal and clear the current token. Late events from the retired
    /// request no longer match the current generation.
    ///
    /// Returns `true` if a request was in flight.
    pub(crate) fn retire(&self) -> bool {
        let previous = self.cancel.lock().take();
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.mark_idle();
        match previous {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Release the slot after a request finished on its own
    pub(crate) fn finish(&self, generation: u64) {
        if !self.is_current(generation) {
            return;
        }
        self.cancel.lock().take();
        self.mark_idle();
    }

    fn mark_idle(&self) {
        self.is_running.store(false, Ordering::Release);
        self.idle_notify.notify_waiters();
    }

    /// Generation of the most recent request
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Whether `generation` still owns the pipeline
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }

    /// Wait until no request is in flight.
    pub async fn wait_for_idle(&self) {
        let notified = self.idle_notify.notified();
        if !self.is_running.load(Ordering::Acquire) {
            return;
        }
        notified.await;
    }

    /// Wait until no request is in flight, with a timeout.
    /// Returns `true` if idle was reached, `false` on timeout.
    pub async fn wait_for_idle_timeout(&self, timeout: std::time::Duration) -> bool {
        if !self.is_running.load(Ordering::Acquire) {
            return true;
        }
        tokio::time::timeout(timeout, self.wait_for_idle())
            .await
            .is_ok()
    }

    /// Whether a request is currently in flight.
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }
}
