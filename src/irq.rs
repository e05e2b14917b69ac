//! Interrupt-side state shared with the pump.
//!
//! Edges are produced by:
//! - native GPIO interrupts (one latch per registered line)
//! - shared expander interrupt lines (one marker per expander IRQ)
//!
//! and consumed by [`GpioService::pump`](crate::app::service::GpioService::pump).
//!
//! ```text
//! ┌─────────────┐     ┌──────────────────┐     ┌──────────────┐
//! │ Pin ISR     │────▶│  Edge latches    │────▶│              │
//! │             │     │  (atomics)       │     │    pump()    │
//! │ Expander    │────▶│  Expander queue  │────▶│  (consumer)  │
//! │ ISR         │     │  (crit-section)  │     │              │
//! └─────────────┘     └──────────────────┘     └──────────────┘
//! ```
//!
//! ISRs receive an [`IrqSource`] instead of a pointer: line handles are arena
//! indices and are bounds-checked here, so a stale or bogus handle only
//! drops the edge.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::app::ports::ExpanderId;

/// Maximum number of registered inputs and buttons.
pub const MAX_LINES: usize = 32;

/// Pending expander interrupts. Duplicates are harmless: a re-poll reads
/// authoritative levels.
const EXPANDER_QUEUE_CAP: usize = 8;

/// Arena index of a registered input or button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IrqHandle(pub(crate) u16);

impl IrqHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What an interrupt binding reports to [`IrqShared::dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqSource {
    Line(IrqHandle),
    Expander(ExpanderId),
}

const EXPANDER_TAG: usize = 1 << 16;

impl IrqSource {
    /// Pack into a `usize` for C-style ISR argument slots.
    pub fn to_raw(self) -> usize {
        match self {
            Self::Line(h) => h.0 as usize,
            Self::Expander(ExpanderId(id)) => EXPANDER_TAG | id as usize,
        }
    }

    pub fn from_raw(raw: usize) -> Self {
        if raw & EXPANDER_TAG != 0 {
            Self::Expander(ExpanderId(raw as u8))
        } else {
            Self::Line(IrqHandle(raw as u16))
        }
    }
}

/// Latest raw edge seen on one line.
struct EdgeLatch {
    pending: AtomicBool,
    edge_ms: AtomicU32,
}

impl EdgeLatch {
    const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
            edge_ms: AtomicU32::new(0),
        }
    }
}

pub struct IrqShared {
    latches: [EdgeLatch; MAX_LINES],
    expanders: Channel<CriticalSectionRawMutex, ExpanderId, EXPANDER_QUEUE_CAP>,
    dropped: AtomicU32,
}

impl Default for IrqShared {
    fn default() -> Self {
        Self::new()
    }
}

impl IrqShared {
    pub const fn new() -> Self {
        Self {
            latches: [const { EdgeLatch::new() }; MAX_LINES],
            expanders: Channel::new(),
            dropped: AtomicU32::new(0),
        }
    }

    /// Route one interrupt. Safe to call from ISR context (lock-free for
    /// lines, critical-section for expanders).
    pub fn dispatch(&self, source: IrqSource, now_ms: u32) {
        match source {
            IrqSource::Line(h) => self.on_edge(h, now_ms),
            IrqSource::Expander(id) => {
                self.on_expander_irq(id);
            }
        }
    }

    /// Record a raw edge. A later edge overwrites an earlier unconsumed one,
    /// which is what makes the debounce re-arm "last edge wins".
    pub fn on_edge(&self, handle: IrqHandle, now_ms: u32) {
        let Some(latch) = self.latches.get(handle.index()) else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };
        latch.edge_ms.store(now_ms, Ordering::Relaxed);
        latch.pending.store(true, Ordering::Release);
    }

    /// Queue a re-poll of every input behind `expander`.
    /// Returns `false` if the queue was full (IRQ dropped).
    pub fn on_expander_irq(&self, expander: ExpanderId) -> bool {
        if self.expanders.try_send(expander).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        true
    }

    /// Interrupts dropped because of a bad handle or a full queue.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub(crate) fn take_edge(&self, handle: IrqHandle) -> Option<u32> {
        let latch = self.latches.get(handle.index())?;
        if !latch.pending.swap(false, Ordering::Acquire) {
            return None;
        }
        Some(latch.edge_ms.load(Ordering::Relaxed))
    }

    pub(crate) fn clear_edge(&self, handle: IrqHandle) {
        if let Some(latch) = self.latches.get(handle.index()) {
            latch.pending.store(false, Ordering::Release);
        }
    }

    pub(crate) fn take_expander(&self) -> Option<ExpanderId> {
        self.expanders.try_receive().ok()
    }
}
