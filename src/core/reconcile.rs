//! Deferred cost reconciliation.
//!
//! Hosted providers only know the real cost of a generation some time after
//! it finishes. Each reconciliation waits a warm-up period, then polls the
//! cost lookup until it answers or the attempts run out. Every handle gets
//! its own task; a failed lookup is logged and otherwise ignored.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::{AbortHandle, JoinHandle};

use super::models::CostInfo;
use crate::providers::CostLookup;

/// Default wait before the first lookup.
pub const DEFAULT_WARMUP: Duration = Duration::from_secs(10);

/// Default number of lookups.
pub const DEFAULT_ATTEMPTS: u32 = 8;

/// Default gap between lookups.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// Polling schedule for one reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSchedule {
    pub warmup: Duration,
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for ReconcileSchedule {
    fn default() -> Self {
        Self {
            warmup: DEFAULT_WARMUP,
            attempts: DEFAULT_ATTEMPTS,
            interval: DEFAULT_INTERVAL,
        }
    }
}

/// Handle to one running reconciliation.
#[derive(Debug, Clone)]
pub struct ReconcileHandle {
    abort: AbortHandle,
}

impl ReconcileHandle {
    /// Stop this reconciliation; the callback will not run.
    pub fn abort(&self) {
        self.abort.abort();
    }

    /// Whether the task has finished, resolved or not.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

/// Spawns and tracks reconciliation tasks.
pub struct CostReconciler {
    lookup: Arc<dyn CostLookup>,
    schedule: ReconcileSchedule,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for CostReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CostReconciler")
            .field("schedule", &self.schedule)
            .finish_non_exhaustive()
    }
}

impl CostReconciler {
    #[must_use]
    pub fn new(lookup: Arc<dyn CostLookup>, schedule: ReconcileSchedule) -> Self {
        Self {
            lookup,
            schedule,
            tasks: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub const fn schedule(&self) -> ReconcileSchedule {
        self.schedule
    }

    /// Start reconciling `generation_handle` in the background.
    ///
    /// `on_resolved` runs at most once, with the confirmed cost. Must be
    /// called from within a tokio runtime.
    pub fn reconcile<F>(&self, generation_handle: impl Into<String>, on_resolved: F) -> ReconcileHandle
    where
        F: FnOnce(CostInfo) + Send + 'static,
    {
        let handle = generation_handle.into();
        let lookup = Arc::clone(&self.lookup);
        let schedule = self.schedule;

        let task = tokio::spawn(async move {
            if let Some(cost) = poll(lookup.as_ref(), &handle, schedule).await {
                tracing::debug!(
                    generation = %handle,
                    total_cost = cost.total_cost,
                    "Cost confirmed"
                );
                on_resolved(cost);
            }
        });

        let abort = task.abort_handle();
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
        ReconcileHandle { abort }
    }

    /// Number of reconciliations still running.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|t| !t.is_finished())
            .count()
    }

    /// Wait for every tracked reconciliation to finish.
    pub async fn wait_all(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for task in tasks {
            // Aborted tasks report a JoinError; nothing to do with it.
            let _ = task.await;
        }
    }

    /// Abort every tracked reconciliation.
    pub fn shutdown(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        if !tasks.is_empty() {
            tracing::debug!(count = tasks.len(), "Aborting cost reconciliation");
        }
        for task in tasks {
            task.abort();
        }
    }
}

impl Drop for CostReconciler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn poll(lookup: &dyn CostLookup, handle: &str, schedule: ReconcileSchedule) -> Option<CostInfo> {
    tokio::time::sleep(schedule.warmup).await;

    for attempt in 1..=schedule.attempts {
        match lookup.lookup(handle).await {
            Ok(cost) => return Some(cost),
            Err(err) => {
                tracing::debug!(
                    generation = %handle,
                    attempt,
                    attempts = schedule.attempts,
                    error = %err,
                    "Cost lookup failed"
                );
            }
        }
        if attempt < schedule.attempts {
            tokio::time::sleep(schedule.interval).await;
        }
    }

    tracing::warn!(generation = %handle, attempts = schedule.attempts, "Gave up waiting for confirmed cost");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LmcError, Result};
    use futures::FutureExt;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails `failures` times, then succeeds.
    struct FlakyLookup {
        failures: u32,
        calls: AtomicU32,
    }

    impl CostLookup for FlakyLookup {
        fn lookup<'a>(&'a self, _handle: &'a str) -> BoxFuture<'a, Result<CostInfo>> {
            async move {
                let n = self.calls.fetch_add(1, Ordering::SeqCst);
                if n < self.failures {
                    Err(LmcError::ProviderApi {
                        provider: "test".to_string(),
                        status_code: Some(404),
                        message: "generation not found".to_string(),
                    })
                } else {
                    Ok(CostInfo {
                        total_cost: 0.0007,
                        confirmed: true,
                        ..CostInfo::default()
                    })
                }
            }
            .boxed()
        }
    }

    fn reconciler(failures: u32) -> (CostReconciler, Arc<FlakyLookup>) {
        let lookup = Arc::new(FlakyLookup {
            failures,
            calls: AtomicU32::new(0),
        });
        (
            CostReconciler::new(lookup.clone(), ReconcileSchedule::default()),
            lookup,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn resolves_after_warmup() {
        let (reconciler, lookup) = reconciler(0);
        let (tx, rx) = tokio::sync::oneshot::channel();
        let started = tokio::time::Instant::now();

        reconciler.reconcile("gen-1", move |cost| {
            let _ = tx.send(cost);
        });

        let cost = rx.await.unwrap();
        assert!(cost.confirmed);
        assert_eq!(started.elapsed(), DEFAULT_WARMUP);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_lookup_succeeds() {
        let (reconciler, lookup) = reconciler(3);
        let (tx, rx) = tokio::sync::oneshot::channel();
        let started = tokio::time::Instant::now();

        reconciler.reconcile("gen-1", move |cost| {
            let _ = tx.send(cost);
        });

        rx.await.unwrap();
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 4);
        assert_eq!(started.elapsed(), DEFAULT_WARMUP + DEFAULT_INTERVAL * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_silently() {
        let (reconciler, lookup) = reconciler(u32::MAX);
        let resolved = Arc::new(AtomicU32::new(0));
        let flag = Arc::clone(&resolved);

        reconciler.reconcile("gen-1", move |_| {
            flag.fetch_add(1, Ordering::SeqCst);
        });
        reconciler.wait_all().await;

        assert_eq!(lookup.calls.load(Ordering::SeqCst), DEFAULT_ATTEMPTS);
        assert_eq!(resolved.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn aborted_handle_never_resolves() {
        let (reconciler, lookup) = reconciler(0);
        let resolved = Arc::new(AtomicU32::new(0));
        let flag = Arc::clone(&resolved);

        let handle = reconciler.reconcile("gen-1", move |_| {
            flag.fetch_add(1, Ordering::SeqCst);
        });
        handle.abort();
        reconciler.wait_all().await;

        assert!(handle.is_finished());
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
        assert_eq!(resolved.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_aborts_everything() {
        let (reconciler, lookup) = reconciler(0);
        let a = reconciler.reconcile("a", |_| {});
        let b = reconciler.reconcile("b", |_| {});
        assert_eq!(reconciler.pending(), 2);

        reconciler.shutdown();
        assert_eq!(reconciler.pending(), 0);
        tokio::time::sleep(DEFAULT_WARMUP * 2).await;

        assert!(a.is_finished());
        assert!(b.is_finished());
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }
}
