//! One-shot inactivity timer
//!
//! At most one timer is live per watchdog. Arming replaces (and aborts) the
//! previous timer; cancelling aborts it. Every arm and cancel starts a new
//! generation, which lets an expiry that already fired detect that it has
//! been superseded.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

#[derive(Default)]
pub struct Watchdog {
    timer: Mutex<Option<JoinHandle<()>>>,
    generation: AtomicU64,
}

impl Watchdog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `on_expire` after `deadline` unless re-armed or cancelled first
    ///
    /// `on_expire` receives the generation this arm started, which is also
    /// returned. The expiry action runs on its own task, so it may re-arm or
    /// cancel this watchdog without cutting itself short; it should check
    /// [`is_current`](Self::is_current) before acting.
    pub fn arm<F, Fut>(&self, deadline: Duration, on_expire: F) -> u64
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let timer = tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            tokio::spawn(on_expire(generation));
        });

        if let Some(previous) = slot.replace(timer) {
            previous.abort();
        }
        generation
    }

    pub fn cancel(&self) {
        let mut slot = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(timer) = slot.take() {
            timer.abort();
        }
    }

    /// Whether `generation` is still the latest arm, with no re-arm or
    /// cancel since
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Whether a timer is waiting to fire
    pub fn is_armed(&self) -> bool {
        self.timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.cancel();
    }
}
