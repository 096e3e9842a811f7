//! Timers for the renewal chain.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::sync::{Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

/// Fires a task at an absolute instant unless `cancel` fires first.
pub trait TaskScheduler: Send + Sync {
    fn schedule(&self, at: DateTime<Utc>, cancel: CancellationToken, task: BoxFuture<'static, ()>);
}

/// Spawns one tokio task per scheduled callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl TaskScheduler for TokioScheduler {
    fn schedule(&self, at: DateTime<Utc>, cancel: CancellationToken, task: BoxFuture<'static, ()>) {
        let delay = (at - Utc::now()).to_std().unwrap_or_default();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Scheduled task cancelled");
                }
                _ = tokio::time::sleep(delay) => task.await,
            }
        });
    }
}

struct PendingTask {
    at: DateTime<Utc>,
    cancel: CancellationToken,
    task: BoxFuture<'static, ()>,
}

/// Holds scheduled tasks until the owner fires them.
///
/// Useful when the caller drives time itself, e.g. from an external job
/// scheduler or in tests.
#[derive(Default)]
pub struct ManualScheduler {
    pending: Mutex<Vec<PendingTask>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks that are scheduled and not cancelled
    pub fn pending(&self) -> usize {
        self.lock().iter().filter(|t| !t.cancel.is_cancelled()).count()
    }

    /// Fire time of the earliest live task
    pub fn next_fire_time(&self) -> Option<DateTime<Utc>> {
        self.lock().iter().filter(|t| !t.cancel.is_cancelled()).map(|t| t.at).min()
    }

    /// Run the earliest task. Returns `false` when nothing live was scheduled.
    pub async fn run_next(&self) -> bool {
        let next = {
            let mut pending = self.lock();
            pending.retain(|t| !t.cancel.is_cancelled());
            let index = pending.iter().enumerate().min_by_key(|(_, t)| t.at).map(|(i, _)| i);
            index.map(|i| pending.remove(i))
        };

        match next {
            Some(pending) => {
                pending.task.await;
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<PendingTask>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TaskScheduler for ManualScheduler {
    fn schedule(&self, at: DateTime<Utc>, cancel: CancellationToken, task: BoxFuture<'static, ()>) {
        self.lock().push(PendingTask { at, cancel, task });
    }
}
