//! Per-run state shared by the worker threads of one modeling run.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use extrap_entities::ModelId;

use crate::error::{ModelerError, ModelerErrorKind};

/// State scoped to one modeling run.
///
/// Holds the model identifier allocator and the cancellation flag. Two
/// runs with separate contexts never observe each other's identifiers, and
/// a context is `Sync`, so workers of one run share it by reference.
#[derive(Debug, Default)]
pub struct ModelingContext {
    next_id: AtomicU64,
    cancelled: AtomicBool,
}

impl ModelingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next model identifier. Monotonic across threads.
    pub fn next_id(&self) -> ModelId {
        ModelId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Asks the run to stop before its next call path.
    ///
    /// Call paths already being fitted finish; their results are discarded.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub(crate) fn check_cancelled(&self) -> Result<(), ModelerError> {
        if self.is_cancelled() {
            Err(ModelerError::new(ModelerErrorKind::Cancelled))
        } else {
            Ok(())
        }
    }
}
