//! Debounced button with press, release, click, multi-click, long-click,
//! press-hold, and idle gestures.
//!
//! ## State machine
//!
//! ```text
//!   Idle ──press──▶ Pressed ──release──▶ Released ──(idle timeout)──▶ Idle
//!                     ▲                      │
//!                     └────────press─────────┘
//! ```
//!
//! One gesture timer per button carries three phases, so two of them are
//! never pending at once:
//!
//! | Phase        | Armed on | Period / delay              | Action                     |
//! |--------------|----------|-----------------------------|----------------------------|
//! | Hold poll    | press    | `hold_poll_ms`, periodic    | long-click / press-hold    |
//! | Click resolve| release  | `click_wait_ms`, once       | click / double / N-click   |
//! | Idle wait    | resolve  | `idle_ms - click_wait_ms`   | idle, reset session        |
//!
//! ## Listener re-arming
//!
//! Level-style listeners (pressed, released, idle, long-click, press-hold)
//! fire at most once until re-armed: a press re-arms released, idle,
//! long-click and press-hold; a release re-arms pressed; idle re-arms
//! everything. State-change listeners fire on every transition. Click-kind
//! listeners fire on every resolution that matches, unless a hold poll
//! already reported the long click for the last press.
//!
//! Timestamps are the settle time for press/release and the timer deadline
//! for the timed phases, so a late pump does not skew gesture timing.

use std::sync::Arc;

use log::debug;

use crate::app::ports::{LineId, PinPort};
use crate::callback::Callback;
use crate::config::{ButtonTiming, InputConfig, PinMode};
use crate::drivers::debounce::{Debouncer, Settle};
use crate::drivers::timer::{SoftTimer, TimerLease, earliest};
use crate::scheduler::Scheduler;

/// What a listener reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    Pressed,
    Released,
    Idle,
    /// Any of pressed, released, idle.
    StateChange,
    Click,
    DoubleClick,
    /// Held for at least `hold_ms`.
    LongClick,
    /// Exactly N clicks in one session.
    ClickCount(u32),
    /// Held for at least this many milliseconds.
    PressHold(u32),
}

impl Gesture {
    fn is_click_kind(self) -> bool {
        matches!(self, Self::Click | Self::DoubleClick | Self::ClickCount(_))
    }
}

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Idle,
    Pressed,
    Released,
}

impl ButtonState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Pressed => "pressed",
            Self::Released => "released",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    HoldPoll,
    ClickResolve,
    IdleWait,
}

#[derive(Debug)]
struct Listener {
    gesture: Gesture,
    callback: Callback,
    consumed: bool,
}

/// What one transition does to one listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Skip,
    Rearm,
    /// Fire unless already consumed, then mark consumed.
    Fire,
    /// Re-arm, then fire.
    Refire,
    /// Fire regardless of the consumed flag.
    Always,
}

pub struct Button<P> {
    debounce: Debouncer<P>,
    scheduler: Arc<Scheduler>,
    timing: ButtonTiming,
    hold_poll_ms: u32,

    state: ButtonState,
    click_count: u32,
    pressed_at: Option<u32>,
    released_at: Option<u32>,
    /// A hold poll saw `hold_ms` elapse during the current press.
    long_fired: bool,

    gesture_timer: SoftTimer,
    phase: Phase,
    gesture_lease: Option<TimerLease>,

    listeners: Vec<Listener>,
}

impl<P: PinPort> Button<P> {
    pub(crate) fn new(io: P, line: LineId, config: &InputConfig, timing: ButtonTiming, scheduler: Arc<Scheduler>) -> Self {
        let timing = timing.normalized();
        Self {
            debounce: Debouncer::new(io, line, config),
            scheduler,
            timing,
            hold_poll_ms: timing.hold_poll_ms(None),
            state: ButtonState::Idle,
            click_count: 0,
            pressed_at: None,
            released_at: None,
            long_fired: false,
            gesture_timer: SoftTimer::new(),
            phase: Phase::HoldPoll,
            gesture_lease: None,
            listeners: Vec::new(),
        }
    }

    // ── Registration ──────────────────────────────────────────

    /// Append a listener. Every listener for a gesture fires, in
    /// registration order.
    pub fn on_event(&mut self, gesture: Gesture, action: impl Fn() + Send + Sync + 'static, deferred: bool) {
        self.listeners.push(Listener {
            gesture,
            callback: Callback::new(action, deferred),
            consumed: false,
        });
        if matches!(gesture, Gesture::PressHold(_)) {
            self.recompute_hold_poll();
        }
    }

    pub fn on_press(&mut self, action: impl Fn() + Send + Sync + 'static, deferred: bool) {
        self.on_event(Gesture::Pressed, action, deferred);
    }

    pub fn on_release(&mut self, action: impl Fn() + Send + Sync + 'static, deferred: bool) {
        self.on_event(Gesture::Released, action, deferred);
    }

    pub fn on_idle(&mut self, action: impl Fn() + Send + Sync + 'static, deferred: bool) {
        self.on_event(Gesture::Idle, action, deferred);
    }

    pub fn on_change(&mut self, action: impl Fn() + Send + Sync + 'static, deferred: bool) {
        self.on_event(Gesture::StateChange, action, deferred);
    }

    pub fn on_click(&mut self, action: impl Fn() + Send + Sync + 'static, deferred: bool) {
        self.on_event(Gesture::Click, action, deferred);
    }

    pub fn on_double_click(&mut self, action: impl Fn() + Send + Sync + 'static, deferred: bool) {
        self.on_event(Gesture::DoubleClick, action, deferred);
    }

    pub fn on_long_click(&mut self, action: impl Fn() + Send + Sync + 'static, deferred: bool) {
        self.on_event(Gesture::LongClick, action, deferred);
    }

    pub fn on_click_count(&mut self, count: u32, action: impl Fn() + Send + Sync + 'static, deferred: bool) {
        self.on_event(Gesture::ClickCount(count), action, deferred);
    }

    pub fn on_press_hold(&mut self, hold_ms: u32, action: impl Fn() + Send + Sync + 'static, deferred: bool) {
        self.on_event(Gesture::PressHold(hold_ms), action, deferred);
    }

    // ── Timing ────────────────────────────────────────────────

    pub fn timing(&self) -> ButtonTiming {
        self.timing
    }

    pub fn click_wait_ms(&self) -> u32 {
        self.timing.click_wait_ms
    }

    pub fn set_click_wait_ms(&mut self, ms: u32) {
        self.timing.set_click_wait_ms(ms);
        self.recompute_hold_poll();
    }

    pub fn idle_ms(&self) -> u32 {
        self.timing.idle_ms
    }

    pub fn set_idle_ms(&mut self, ms: u32) {
        self.timing.set_idle_ms(ms);
    }

    pub fn hold_ms(&self) -> u32 {
        self.timing.hold_ms
    }

    pub fn set_hold_ms(&mut self, ms: u32) {
        self.timing.set_hold_ms(ms);
        self.recompute_hold_poll();
    }

    pub fn hold_poll_ms(&self) -> u32 {
        self.hold_poll_ms
    }

    fn recompute_hold_poll(&mut self) {
        let thresholds = self.listeners.iter().filter_map(|l| match l.gesture {
            Gesture::PressHold(ms) => Some(ms),
            _ => None,
        });
        self.hold_poll_ms = self.timing.hold_poll_ms(thresholds);
        debug!("{:?}: hold poll every {}ms", self.debounce.line(), self.hold_poll_ms);
    }

    // ── Input configuration ───────────────────────────────────

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

    // ── Session state ─────────────────────────────────────────

    pub fn state(&self) -> ButtonState {
        self.state
    }

    pub fn state_label(&self) -> &'static str {
        self.state.as_str()
    }

    pub fn click_count(&self) -> u32 {
        self.click_count
    }

    pub fn pressed_at(&self) -> Option<u32> {
        self.pressed_at
    }

    pub fn released_at(&self) -> Option<u32> {
        self.released_at
    }

    /// Direct read of the line, bypassing debounce.
    pub fn is_active(&mut self) -> bool {
        self.debounce.is_active()
    }

    pub fn last_level(&self) -> bool {
        self.debounce.last_level()
    }

    pub fn is_attached(&self) -> bool {
        self.debounce.is_attached()
    }

    // ── Service hooks ─────────────────────────────────────────

    pub(crate) fn attach(&mut self, debounce: TimerLease, gesture: TimerLease) {
        self.debounce.attach(debounce);
        self.gesture_lease = Some(gesture);
    }

    /// Stop both timers and hand back their leases.
    pub(crate) fn detach(&mut self) -> [Option<TimerLease>; 2] {
        self.gesture_timer.stop();
        [self.debounce.detach(), self.gesture_lease.take()]
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

    /// Process every due debounce and gesture deadline, oldest first. On
    /// equal deadlines the gesture timer runs first: it was armed earlier.
    pub(crate) fn service(&mut self, now_ms: u32) {
        loop {
            let settle_due = self.debounce.due(now_ms);
            let gesture_due = self.gesture_timer.due(now_ms);
            let Some(next) = earliest(now_ms, settle_due, gesture_due) else {
                break;
            };
            if gesture_due == Some(next) {
                self.on_gesture_timer(now_ms);
            } else if let Some(settle) = self.debounce.fire(now_ms) {
                self.on_settle(settle);
            }
        }
    }

    fn on_settle(&mut self, settle: Settle) {
        if settle.active {
            self.press(settle.at_ms);
        } else {
            self.release(settle.at_ms);
        }
    }

    fn on_gesture_timer(&mut self, now_ms: u32) {
        let Some(at) = self.gesture_timer.poll(now_ms) else {
            return;
        };
        match self.phase {
            Phase::HoldPoll => self.hold(at),
            Phase::ClickResolve => {
                self.resolve_clicks();
                self.phase = Phase::IdleWait;
                let wait = self.timing.idle_ms.saturating_sub(self.timing.click_wait_ms);
                self.gesture_timer.start_once(at, wait);
            }
            Phase::IdleWait => self.idle(),
        }
    }

    // ── Transitions ───────────────────────────────────────────

    fn press(&mut self, at: u32) {
        self.state = ButtonState::Pressed;
        self.pressed_at = Some(at);
        self.long_fired = false;
        self.click_count = match self.released_at {
            _ if self.click_count == 0 => 1,
            Some(r) if at.wrapping_sub(r) < self.timing.click_wait_ms => self.click_count + 1,
            _ => 1,
        };
        debug!("{:?}: pressed at {}ms (count {})", self.line(), at, self.click_count);

        self.phase = Phase::HoldPoll;
        self.gesture_timer.start_periodic(at, self.hold_poll_ms);

        self.dispatch(|g| match g {
            Gesture::Idle | Gesture::Released | Gesture::LongClick | Gesture::PressHold(_) => Step::Rearm,
            Gesture::Pressed => Step::Fire,
            Gesture::StateChange => Step::Refire,
            _ => Step::Skip,
        });
    }

    fn release(&mut self, at: u32) {
        self.state = ButtonState::Released;
        self.released_at = Some(at);
        debug!("{:?}: released at {}ms", self.line(), at);

        self.phase = Phase::ClickResolve;
        self.gesture_timer.start_once(at, self.timing.click_wait_ms);

        self.dispatch(|g| match g {
            Gesture::Pressed => Step::Rearm,
            Gesture::Released => Step::Fire,
            Gesture::StateChange => Step::Refire,
            _ => Step::Skip,
        });
    }

    fn hold(&mut self, at: u32) {
        let Some(pressed) = self.pressed_at else {
            return;
        };
        let held = at.wrapping_sub(pressed);
        let hold_ms = self.timing.hold_ms;
        if held >= hold_ms {
            self.long_fired = true;
        }
        self.dispatch(|g| match g {
            Gesture::LongClick if held >= hold_ms => Step::Fire,
            Gesture::PressHold(p) if held >= p => Step::Fire,
            _ => Step::Skip,
        });
    }

    fn resolve_clicks(&mut self) {
        let count = self.click_count;
        if count == 0 {
            return;
        }
        self.click_count = 0;
        if self.long_fired {
            debug!("{:?}: click suppressed by hold", self.line());
            return;
        }
        debug!("{:?}: {} click(s)", self.line(), count);
        self.dispatch(|g| match (g, count) {
            (Gesture::Click, 1) | (Gesture::DoubleClick, 2) => Step::Always,
            (Gesture::ClickCount(n), _) if n == count => Step::Always,
            _ => Step::Skip,
        });
    }

    fn idle(&mut self) {
        if self.released_at.is_none() {
            return;
        }
        self.state = ButtonState::Idle;
        debug!("{:?}: idle", self.line());
        self.dispatch(|g| match g {
            Gesture::Idle => Step::Fire,
            Gesture::StateChange => Step::Refire,
            g if g.is_click_kind() => Step::Skip,
            _ => Step::Rearm,
        });
        self.pressed_at = None;
        self.released_at = None;
        self.click_count = 0;
        self.long_fired = false;
    }

    fn dispatch(&mut self, step: impl Fn(Gesture) -> Step) {
        let scheduler = &self.scheduler;
        for l in self.listeners.iter_mut() {
            match step(l.gesture) {
                Step::Skip => {}
                Step::Rearm => l.consumed = false,
                Step::Fire => {
                    if !l.consumed {
                        l.callback.fire(scheduler);
                        l.consumed = true;
                    }
                }
                Step::Refire => {
                    l.callback.fire(scheduler);
                    l.consumed = true;
                }
                Step::Always => l.callback.fire(scheduler),
            }
        }
    }
}
