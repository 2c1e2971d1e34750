//! Periodic background actions
//!
//! Each scheduled action runs once immediately and then on every interval
//! tick. A run is awaited before the next tick is taken, so runs of the same
//! action never overlap.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::AppError;
use crate::event::{Event, EventBus};

pub struct PeriodicFetcher {
    bus: Arc<EventBus>,
    tasks: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
}

impl PeriodicFetcher {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawn a loop running `action` every `interval`
    ///
    /// A failed run is published as an error event; the schedule continues.
    pub fn schedule<F, Fut>(&self, name: &'static str, interval: Duration, action: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), AppError>> + Send + 'static,
    {
        let interval = interval.max(Duration::from_secs(1));
        let bus = self.bus.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                tracing::debug!(task = name, "Running scheduled fetch");
                if let Err(error) = action().await {
                    tracing::error!(task = name, %error, "Scheduled fetch failed");
                    bus.publish_or_report(Event::Error(error.user_message()));
                }
            }
        });

        tracing::info!(task = name, seconds = interval.as_secs(), "Scheduled task spawned");
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name, task));
    }

    /// Names of the scheduled actions
    pub fn scheduled(&self) -> Vec<&'static str> {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, _)| *name)
            .collect()
    }

    /// Stop every schedule
    pub fn shutdown(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for (name, task) in tasks {
            task.abort();
            tracing::debug!(task = name, "Scheduled task stopped");
        }
    }
}

impl Drop for PeriodicFetcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn runs_immediately_then_every_interval() {
        let fetcher = PeriodicFetcher::new(Arc::new(EventBus::new()));
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = runs.clone();
        fetcher.schedule("count", Duration::from_secs(300), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_runs_do_not_overlap() {
        let fetcher = PeriodicFetcher::new(Arc::new(EventBus::new()));
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        let (a, m) = (active.clone(), max_active.clone());
        fetcher.schedule("slow", Duration::from_secs(10), move || {
            let (active, max_active) = (a.clone(), m.clone());
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_active.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(25)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        });

        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_published_and_schedule_continues() {
        let bus = Arc::new(EventBus::new());
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = errors.clone();
        bus.subscribe(EventKind::Error, move |event| {
            sink.lock().unwrap().push(event.message().unwrap_or_default().to_string());
            Ok(())
        });

        let fetcher = PeriodicFetcher::new(bus);
        fetcher.schedule("failing", Duration::from_secs(60), || async {
            Err(AppError::RateLimited)
        });

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(
            *errors.lock().unwrap(),
            vec!["Rate limit exceeded", "Rate limit exceeded"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_all_schedules() {
        let fetcher = PeriodicFetcher::new(Arc::new(EventBus::new()));
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = runs.clone();
        fetcher.schedule("count", Duration::from_secs(5), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        assert_eq!(fetcher.scheduled(), vec!["count"]);

        tokio::time::sleep(Duration::from_secs(1)).await;
        fetcher.shutdown();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(fetcher.scheduled().is_empty());
    }
}
