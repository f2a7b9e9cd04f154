//! Completion notifications for presentation layers.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::info;

/// Receives one notification per completed call path.
///
/// Called from worker threads in completion order, which is not call path
/// order. Implementations only observe; nothing they do affects results.
pub trait Progress: Sync {
    fn callpath_completed(&self);
}

impl<F> Progress for F
where
    F: Fn() + Sync,
{
    fn callpath_completed(&self) {
        self();
    }
}

/// Ignores all notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn callpath_completed(&self) {}
}

/// Logs a `modeler.progress` event per completed call path.
#[derive(Debug)]
pub struct LogProgress {
    total: usize,
    completed: AtomicUsize,
}

impl LogProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: AtomicUsize::new(0),
        }
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }
}

impl Progress for LogProgress {
    fn callpath_completed(&self) {
        let done = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        let msg = format!("{done}/{} call paths", self.total);
        info!(message = %msg, "modeler.progress");
    }
}
