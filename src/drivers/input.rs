//! Debounced digital input with change / active / inactive callbacks.
//!
//! Each callback kind has exactly one slot; registering again replaces the
//! previous action. On a settled change the type-specific slot (active or
//! inactive) fires first, then the change slot.

use std::sync::Arc;

use crate::app::ports::{LineId, PinPort};
use crate::callback::Callback;
use crate::config::{InputConfig, PinMode};
use crate::drivers::debounce::{Debouncer, Settle};
use crate::drivers::timer::TimerLease;
use crate::scheduler::Scheduler;

const DEFAULT_ACTIVE_LABEL: &str = "ACTIVE";
const DEFAULT_INACTIVE_LABEL: &str = "NONE";

pub struct Input<P> {
    debounce: Debouncer<P>,
    scheduler: Arc<Scheduler>,
    on_change: Callback,
    on_active: Callback,
    on_inactive: Callback,
    active_label: String,
    inactive_label: String,
}

impl<P: PinPort> Input<P> {
    pub(crate) fn new(io: P, line: LineId, config: &InputConfig, scheduler: Arc<Scheduler>) -> Self {
        Self {
            debounce: Debouncer::new(io, line, config),
            scheduler,
            on_change: Callback::none(),
            on_active: Callback::none(),
            on_inactive: Callback::none(),
            active_label: DEFAULT_ACTIVE_LABEL.into(),
            inactive_label: DEFAULT_INACTIVE_LABEL.into(),
        }
    }

    // ── Callback slots ────────────────────────────────────────

    pub fn on_change(&mut self, action: impl Fn() + Send + Sync + 'static, deferred: bool) {
        self.on_change = Callback::new(action, deferred);
    }

    pub fn on_active(&mut self, action: impl Fn() + Send + Sync + 'static, deferred: bool) {
        self.on_active = Callback::new(action, deferred);
    }

    pub fn on_inactive(&mut self, action: impl Fn() + Send + Sync + 'static, deferred: bool) {
        self.on_inactive = Callback::new(action, deferred);
    }

    // ── Configuration ─────────────────────────────────────────

    pub fn line(&self) -> LineId {
        self.debounce.line()
    }

    pub fn mode(&self) -> PinMode {
        self.debounce.mode()
    }

    pub fn set_mode(&mut self, mode: PinMode) {
        self.debounce.set_mode(mode);
    }

    pub fn active_level(&self) -> bool {
        self.debounce.active_level()
    }

    pub fn set_active_level(&mut self, level: bool) {
        self.debounce.set_active_level(level);
    }

    pub fn debounce_ms(&self) -> u32 {
        self.debounce.debounce_ms()
    }

    pub fn set_debounce_ms(&mut self, ms: u32) {
        self.debounce.set_debounce_ms(ms);
    }

    pub fn set_state_labels(&mut self, active: &str, inactive: &str) {
        self.active_label = active.into();
        self.inactive_label = inactive.into();
    }

    // ── State ─────────────────────────────────────────────────

    /// Direct read of the line, bypassing debounce.
    pub fn is_active(&mut self) -> bool {
        self.debounce.is_active()
    }

    pub fn last_level(&self) -> bool {
        self.debounce.last_level()
    }

    /// Label for the current (direct-read) state.
    pub fn state_label(&mut self) -> &str {
        if self.debounce.is_active() {
            &self.active_label
        } else {
            &self.inactive_label
        }
    }

    pub fn is_attached(&self) -> bool {
        self.debounce.is_attached()
    }

    // ── Service hooks ─────────────────────────────────────────

    pub(crate) fn attach(&mut self, lease: TimerLease) {
        self.debounce.attach(lease);
    }

    pub(crate) fn detach(&mut self) -> Option<TimerLease> {
        self.debounce.detach()
    }

    pub(crate) fn rebind(&mut self, line: LineId) {
        self.debounce.rebind(line);
    }

    pub(crate) fn note_edge(&mut self, edge_ms: u32) {
        self.debounce.note_edge(edge_ms);
    }

    pub(crate) fn repoll(&mut self, now_ms: u32) -> bool {
        self.debounce.repoll(now_ms)
    }

    /// Run a due settle, if any.
    pub(crate) fn service(&mut self, now_ms: u32) {
        if let Some(settle) = self.debounce.fire(now_ms) {
            self.dispatch(settle);
        }
    }

    fn dispatch(&self, settle: Settle) {
        if settle.active {
            self.on_active.fire(&self.scheduler);
        } else {
            self.on_inactive.fire(&self.scheduler);
        }
        self.on_change.fire(&self.scheduler);
    }
}
