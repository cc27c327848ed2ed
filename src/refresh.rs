//! Debounced refresh scheduling.
//!
//! A burst of refresh requests collapses into a single firing: every request
//! cancels the pending timer and starts a new one, so only the last request
//! of the burst has any effect.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::debug;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Observable state of a [`Debouncer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    PendingRefresh,
}

pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    /// Run `fire` once `delay` has passed without another call to `schedule`.
    ///
    /// Must be called from within a tokio runtime.  `fire` runs on the
    /// runtime without yielding, so a later `schedule` can cancel it before
    /// it starts but never interrupt it halfway.
    pub fn schedule<F>(&self, fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut pending = self.lock();
        if let Some(previous) = pending.take() {
            if !previous.is_finished() {
                debug!("Superseding pending refresh");
            }
            previous.abort();
        }
        let delay = self.delay;
        *pending = Some(tokio::spawn(async move {
            sleep(delay).await;
            fire();
        }));
    }

    pub fn state(&self) -> RefreshState {
        match self.lock().as_ref() {
            Some(handle) if !handle.is_finished() => RefreshState::PendingRefresh,
            _ => RefreshState::Idle,
        }
    }

    /// Drop any pending firing without running it.
    pub fn cancel(&self) {
        if let Some(handle) = self.lock().take() {
            handle.abort();
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
