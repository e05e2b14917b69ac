//! Deferred-callback scheduler.
//!
//! Interrupt handlers, timer handlers, and state machines hand zero-argument
//! actions to the scheduler; the main loop runs them later from
//! [`Scheduler::pump`]. This keeps work out of interrupt context and makes
//! callback execution order deterministic.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────────┐     ┌──────────────┐
//! │ GPIO ISR    │────▶│                  │     │              │
//! │ Timer cb    │────▶│  Action queue    │────▶│  pump()      │
//! │ Gestures    │────▶│  (critical-sect) │     │  (main loop) │
//! │ Outputs     │────▶│                  │     │              │
//! └─────────────┘     └──────────────────┘     └──────────────┘
//! ```
//!
//! The queue is bounded. A full queue rejects the action and counts the
//! drop; `pump()` reports new drops in the log.

use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use crate::callback::Action;
use crate::error::{Resource, Result};

/// Maximum number of pending actions.
pub const SCHEDULER_CAPACITY: usize = 32;

pub struct Scheduler {
    queue: Channel<CriticalSectionRawMutex, Action, SCHEDULER_CAPACITY>,
    dropped: AtomicU32,
    /// Drop count already logged by `pump()`.
    reported: AtomicU32,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            queue: Channel::new(),
            dropped: AtomicU32::new(0),
            reported: AtomicU32::new(0),
        }
    }

    /// Queue an action for the next pump.
    ///
    /// Never blocks and is safe from interrupt context. On overflow the
    /// action is dropped and counted.
    pub fn submit(&self, action: Action) -> Result<()> {
        if self.queue.try_send(action).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return Err(Resource::SchedulerQueue.into());
        }
        Ok(())
    }

    /// Run every action queued before this call, in FIFO order, exactly once.
    ///
    /// Actions submitted while pumping wait for the next call. Main context
    /// only. Returns the number of actions run.
    pub fn pump(&self) -> usize {
        let dropped = self.dropped.load(Ordering::Relaxed);
        let reported = self.reported.swap(dropped, Ordering::Relaxed);
        if dropped != reported {
            warn!(
                "scheduler: {} action(s) dropped (queue full, {} total)",
                dropped.wrapping_sub(reported),
                dropped
            );
        }

        let snapshot = self.queue.len();
        let mut ran = 0;
        for _ in 0..snapshot {
            match self.queue.try_receive() {
                Ok(action) => {
                    action();
                    ran += 1;
                }
                Err(_) => break,
            }
        }
        ran
    }

    /// Actions waiting for the next pump.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Total actions rejected because the queue was full.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
