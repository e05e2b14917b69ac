//! Software timers serviced from the pump context.
//!
//! Each debounce, gesture, and output state machine owns exactly one
//! [`SoftTimer`]. Arming always replaces whatever was pending
//! (cancel-then-arm), so a single timer can never have two deadlines.
//!
//! Time is the monotonic millisecond clock truncated to `u32`; every
//! comparison uses `wrapping_sub` so the ~49-day wrap is harmless.
//!
//! Timers are a bounded platform resource (one `esp_timer` each on the
//! device), so the service hands them out through a [`TimerPool`].

use log::debug;

use crate::error::{Resource, Result};

/// One cancellable single-shot or periodic timer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoftTimer {
    armed: Option<Armed>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Armed {
    start_ms: u32,
    delay_ms: u32,
    periodic: bool,
}

impl Armed {
    fn deadline(&self) -> u32 {
        self.start_ms.wrapping_add(self.delay_ms)
    }
}

impl SoftTimer {
    pub const fn new() -> Self {
        Self { armed: None }
    }

    /// Fire once, `delay_ms` after `from_ms`.
    pub fn start_once(&mut self, from_ms: u32, delay_ms: u32) {
        self.armed = Some(Armed {
            start_ms: from_ms,
            delay_ms,
            periodic: false,
        });
    }

    /// Fire every `period_ms`, first time `period_ms` after `from_ms`.
    /// A zero period is clamped to 1 ms.
    pub fn start_periodic(&mut self, from_ms: u32, period_ms: u32) {
        self.armed = Some(Armed {
            start_ms: from_ms,
            delay_ms: period_ms.max(1),
            periodic: true,
        });
    }

    pub fn stop(&mut self) {
        self.armed = None;
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn deadline(&self) -> Option<u32> {
        self.armed.map(|a| a.deadline())
    }

    /// Deadline if it is due at `now_ms`, without consuming it.
    pub fn due(&self, now_ms: u32) -> Option<u32> {
        let a = self.armed?;
        (now_ms.wrapping_sub(a.start_ms) >= a.delay_ms).then(|| a.deadline())
    }

    /// Consume one expiry. Returns the scheduled deadline (not `now_ms`) so
    /// callers timestamp events exactly even when the pump runs late.
    /// Periodic timers re-arm from their own deadline.
    pub fn poll(&mut self, now_ms: u32) -> Option<u32> {
        let deadline = self.due(now_ms)?;
        if let Some(a) = self.armed.as_mut().filter(|a| a.periodic) {
            a.start_ms = deadline;
        } else {
            self.armed = None;
        }
        Some(deadline)
    }
}

/// Returns whichever of two due deadlines came first relative to `now_ms`.
pub fn earliest(now_ms: u32, a: Option<u32>, b: Option<u32>) -> Option<u32> {
    match (a, b) {
        (Some(x), Some(y)) => Some(if now_ms.wrapping_sub(x) >= now_ms.wrapping_sub(y) { x } else { y }),
        (x, None) => x,
        (None, y) => y,
    }
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// Proof that one timer was taken from the pool. Not `Clone`: give it back
/// with [`TimerPool::release`].
#[derive(Debug, PartialEq, Eq)]
pub struct TimerLease(());

/// Fixed-size budget of timers.
#[derive(Debug)]
pub struct TimerPool {
    capacity: usize,
    in_use: usize,
}

impl TimerPool {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, in_use: 0 }
    }

    pub fn acquire(&mut self) -> Result<TimerLease> {
        if self.in_use >= self.capacity {
            return Err(Resource::Timer.into());
        }
        self.in_use += 1;
        debug!("timer pool: {}/{} in use", self.in_use, self.capacity);
        Ok(TimerLease(()))
    }

    pub fn release(&mut self, lease: TimerLease) {
        drop(lease);
        self.in_use = self.in_use.saturating_sub(1);
    }

    pub fn in_use(&self) -> usize {
        self.in_use
    }

    pub fn available(&self) -> usize {
        self.capacity - self.in_use
    }
}
