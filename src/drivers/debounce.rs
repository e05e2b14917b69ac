//! Debounce core shared by [`Input`](super::input::Input) and
//! [`Button`](super::button::Button).
//!
//! ## State machine
//!
//! ```text
//!   Armed ──(edge)──▶ Debouncing ──(timer, level re-read)──▶ Armed
//!                        ▲    │
//!                        └────┘ further edges restart the quiet period
//! ```
//!
//! A settle is only reported when the re-read level differs from the last
//! settled level, so bounce that returns to the starting level before the
//! timer fires produces nothing.

use log::debug;

use crate::app::ports::{LineId, PinPort};
use crate::config::{InputConfig, PinMode};
use crate::drivers::timer::{SoftTimer, TimerLease};

/// A confirmed level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settle {
    /// When the quiet period ended (timer deadline).
    pub at_ms: u32,
    /// New electrical level.
    pub level: bool,
    /// `level == active_level`.
    pub active: bool,
}

pub struct Debouncer<P> {
    io: P,
    line: LineId,
    mode: PinMode,
    active_level: bool,
    debounce_ms: u32,
    last_level: bool,
    timer: SoftTimer,
    /// Present while attached.
    lease: Option<TimerLease>,
}

impl<P: PinPort> Debouncer<P> {
    /// Configure the pin and take the initial level with a direct read.
    pub(crate) fn new(mut io: P, line: LineId, config: &InputConfig) -> Self {
        io.set_mode(line, config.mode);
        let last_level = io.read(line, true);
        Self {
            io,
            line,
            mode: config.mode,
            active_level: config.active_level,
            debounce_ms: config.debounce_ms,
            last_level,
            timer: SoftTimer::new(),
            lease: None,
        }
    }

    pub fn line(&self) -> LineId {
        self.line
    }

    pub fn mode(&self) -> PinMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: PinMode) {
        self.mode = mode;
        self.io.set_mode(self.line, mode);
    }

    pub fn active_level(&self) -> bool {
        self.active_level
    }

    pub fn set_active_level(&mut self, level: bool) {
        self.active_level = level;
    }

    pub fn debounce_ms(&self) -> u32 {
        self.debounce_ms
    }

    /// Takes effect from the next edge.
    pub fn set_debounce_ms(&mut self, ms: u32) {
        self.debounce_ms = ms;
    }

    /// Last settled level.
    pub fn last_level(&self) -> bool {
        self.last_level
    }

    /// Whether the line reads active right now (direct read, not debounced).
    pub fn is_active(&mut self) -> bool {
        self.io.read(self.line, false) == self.active_level
    }

    pub fn is_attached(&self) -> bool {
        self.lease.is_some()
    }

    pub(crate) fn attach(&mut self, lease: TimerLease) {
        self.lease = Some(lease);
    }

    /// Cancel any pending settle and hand back the timer.
    pub(crate) fn detach(&mut self) -> Option<TimerLease> {
        self.timer.stop();
        self.lease.take()
    }

    /// Switch to another line. The caller detaches first.
    pub(crate) fn rebind(&mut self, line: LineId) {
        self.line = line;
        self.io.set_mode(line, self.mode);
        self.last_level = self.io.read(line, true);
    }

    /// Restart the quiet period from a raw edge.
    pub(crate) fn note_edge(&mut self, edge_ms: u32) {
        if self.is_attached() {
            self.timer.start_once(edge_ms, self.debounce_ms);
        }
    }

    /// Shared-interrupt path: read now and start debouncing only if the line
    /// moved away from its settled level.
    pub(crate) fn repoll(&mut self, now_ms: u32) -> bool {
        if !self.is_attached() || self.io.read(self.line, true) == self.last_level {
            return false;
        }
        self.timer.start_once(now_ms, self.debounce_ms);
        true
    }

    pub(crate) fn due(&self, now_ms: u32) -> Option<u32> {
        self.timer.due(now_ms)
    }

    /// Consume an expired debounce timer and re-read the line.
    pub(crate) fn fire(&mut self, now_ms: u32) -> Option<Settle> {
        let at_ms = self.timer.poll(now_ms)?;
        let level = self.io.read(self.line, true);
        if level == self.last_level {
            debug!("{:?}: bounce ignored", self.line);
            return None;
        }
        self.last_level = level;
        let active = level == self.active_level;
        debug!("{:?}: settled {} at {}ms", self.line, if active { "active" } else { "inactive" }, at_ms);
        Some(Settle { at_ms, level, active })
    }
}
