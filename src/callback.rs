//! User callbacks and how they are executed.
//!
//! A [`Callback`] is an optional action plus a "defer" flag. Deferred
//! callbacks go through the [`Scheduler`] and run on a later pump; the rest
//! run inline in the pump that triggered them. An empty slot is a no-op.

use std::sync::Arc;

use log::warn;

use crate::scheduler::Scheduler;

/// A zero-argument action shared between the registry and the scheduler
/// queue. Capture atomics or a `Mutex` for state the action must mutate.
pub type Action = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone, Default)]
pub struct Callback {
    action: Option<Action>,
    deferred: bool,
}

impl core::fmt::Debug for Callback {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Callback")
            .field("bound", &self.action.is_some())
            .field("deferred", &self.deferred)
            .finish()
    }
}

impl Callback {
    pub fn new(action: impl Fn() + Send + Sync + 'static, deferred: bool) -> Self {
        Self {
            action: Some(Arc::new(action)),
            deferred,
        }
    }

    /// Empty slot.
    pub const fn none() -> Self {
        Self {
            action: None,
            deferred: false,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.action.is_some()
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    /// Run now, or queue on `scheduler` when deferred.
    pub fn fire(&self, scheduler: &Scheduler) {
        let Some(action) = &self.action else {
            return;
        };
        if self.deferred {
            if let Err(e) = scheduler.submit(action.clone()) {
                warn!("callback dropped: {}", e);
            }
        } else {
            action();
        }
    }
}
