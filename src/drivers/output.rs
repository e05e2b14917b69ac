//! Timed digital output: delayed-on, auto-off, startup state, persistence,
//! and remote/mesh state sync.
//!
//! ## State machine
//!
//! ```text
//!   Off ──on()──▶ WaitingForOn ──(delay)──▶ On ──(auto-off)──▶ Off
//!    ▲                                       │
//!    └────────────────off()──────────────────┘
//! ```
//!
//! One timer carries either the on-delay or the auto-off, never both.
//! Arming always replaces what was pending, so the last `on()` wins.
//!
//! What "on" physically means is an [`Actuator`] chosen at construction:
//! a pin through [`PinPort`], any `embedded-hal` [`OutputPin`], or a pair
//! of callbacks for outputs with no pin at all.

use std::sync::{Arc, Mutex};

use embedded_hal::digital::OutputPin;
use log::{debug, info, warn};

use crate::adapters::time::Clock;
use crate::app::ports::{LineId, PinPort, RemoteSync, StorageError, StoragePort};
use crate::callback::Callback;
use crate::config::{OutputConfig, PinMode, StartupState};
use crate::drivers::timer::{SoftTimer, TimerLease};
use crate::scheduler::Scheduler;

/// Storage namespace for last output levels.
pub const STATE_NAMESPACE: &str = "gpiols";

// ───────────────────────────────────────────────────────────────
// Actuators
// ───────────────────────────────────────────────────────────────

/// Applies the logical on/off state to something physical.
pub trait Actuator {
    fn apply(&mut self, on: bool);

    /// Key for the persisted last level.
    fn state_key(&self) -> String;
}

/// Drives a [`LineId`] through a [`PinPort`].
pub struct PinActuator<P> {
    io: P,
    line: LineId,
    active_level: bool,
}

impl<P: PinPort> PinActuator<P> {
    /// Puts the line in output mode. The level is untouched until the first
    /// actuation.
    pub fn new(mut io: P, line: LineId, active_level: bool) -> Self {
        io.set_mode(line, PinMode::Output);
        Self { io, line, active_level }
    }

    pub fn active_level(&self) -> bool {
        self.active_level
    }

    pub fn set_active_level(&mut self, level: bool) {
        self.active_level = level;
    }
}

impl<P: PinPort> Actuator for PinActuator<P> {
    fn apply(&mut self, on: bool) {
        let level = if on { self.active_level } else { !self.active_level };
        self.io.write(self.line, level);
    }

    fn state_key(&self) -> String {
        self.line.state_key()
    }
}

/// Drives any `embedded-hal` output pin.
pub struct HalActuator<O> {
    pin: O,
    active_level: bool,
    key: String,
}

impl<O: OutputPin> HalActuator<O> {
    pub fn new(pin: O, active_level: bool, key: impl Into<String>) -> Self {
        Self {
            pin,
            active_level,
            key: key.into(),
        }
    }
}

impl<O: OutputPin> Actuator for HalActuator<O> {
    fn apply(&mut self, on: bool) {
        let level = if on { self.active_level } else { !self.active_level };
        let res = if level { self.pin.set_high() } else { self.pin.set_low() };
        if let Err(e) = res {
            warn!("{}: pin write failed: {:?}", self.key, e);
        }
    }

    fn state_key(&self) -> String {
        self.key.clone()
    }
}

/// An output with no pin: switching runs user callbacks.
pub struct VirtualActuator {
    name: String,
    on: Callback,
    off: Callback,
    scheduler: Arc<Scheduler>,
}

impl VirtualActuator {
    pub fn new(name: impl Into<String>, scheduler: Arc<Scheduler>) -> Self {
        Self {
            name: name.into(),
            on: Callback::none(),
            off: Callback::none(),
            scheduler,
        }
    }

    pub fn with_on(mut self, action: impl Fn() + Send + Sync + 'static, deferred: bool) -> Self {
        self.on = Callback::new(action, deferred);
        self
    }

    pub fn with_off(mut self, action: impl Fn() + Send + Sync + 'static, deferred: bool) -> Self {
        self.off = Callback::new(action, deferred);
        self
    }
}

impl Actuator for VirtualActuator {
    fn apply(&mut self, on: bool) {
        if on {
            self.on.fire(&self.scheduler);
        } else {
            self.off.fire(&self.scheduler);
        }
    }

    fn state_key(&self) -> String {
        format!("v{}", self.name)
    }
}

// ───────────────────────────────────────────────────────────────
// Output
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputPhase {
    Off,
    On,
    WaitingForOn,
}

/// Shared handle to a storage backend.
pub type SharedStorage = Arc<Mutex<dyn StoragePort + Send>>;

/// Shared handle to a remote sync backend.
pub type SharedRemote = Arc<Mutex<dyn RemoteSync + Send>>;

struct RemoteBinding {
    sync: SharedRemote,
    sub_path: String,
}

pub struct Output {
    actuator: Box<dyn Actuator + Send>,
    scheduler: Arc<Scheduler>,
    clock: Arc<dyn Clock + Send + Sync>,

    startup: StartupState,
    on_delay_ms: u32,
    auto_off_ms: u32,
    auto_off_enabled: bool,

    on: bool,
    phase: OutputPhase,
    timer: SoftTimer,
    lease: Option<TimerLease>,
    /// Duration requested by `on_for`, applied when the delay ends.
    pending_duration: Option<u32>,
    started: bool,

    on_label: String,
    off_label: String,

    on_power_on: Callback,
    on_power_off: Callback,
    on_power_changed: Callback,
    on_auto_off: Callback,

    storage: Option<SharedStorage>,
    remote: Option<RemoteBinding>,
    /// Set while applying a remote value so it is not echoed back.
    mute_publish: bool,
}

impl Output {
    pub(crate) fn new(
        actuator: Box<dyn Actuator + Send>,
        config: &OutputConfig,
        clock: Arc<dyn Clock + Send + Sync>,
        scheduler: Arc<Scheduler>,
        lease: TimerLease,
    ) -> Self {
        Self {
            actuator,
            scheduler,
            clock,
            startup: config.startup,
            on_delay_ms: config.on_delay_ms,
            auto_off_ms: config.auto_off_ms,
            auto_off_enabled: config.auto_off_ms > 0,
            on: false,
            phase: OutputPhase::Off,
            timer: SoftTimer::new(),
            lease: Some(lease),
            pending_duration: None,
            started: false,
            on_label: "ON".into(),
            off_label: "OFF".into(),
            on_power_on: Callback::none(),
            on_power_off: Callback::none(),
            on_power_changed: Callback::none(),
            on_auto_off: Callback::none(),
            storage: None,
            remote: None,
            mute_publish: false,
        }
    }

    // ── Switching ─────────────────────────────────────────────

    /// Switch on, after the configured on-delay if there is one.
    ///
    /// A second `on()` while the delay is pending switches on immediately
    /// unless `force` is set, in which case the delay restarts.
    pub fn on(&mut self, force: bool) {
        self.request_on(self.on_delay_ms, None, force);
    }

    /// Switch on with a one-off delay and duration. `duration_ms == 0`
    /// stays on. Neither value replaces the configured defaults.
    pub fn on_for(&mut self, on_delay_ms: u32, duration_ms: u32, force: bool) {
        self.request_on(on_delay_ms, Some(duration_ms), force);
    }

    /// Switch on for `pct` percent of the auto-off duration. Values outside
    /// `1..=100` are ignored.
    pub fn on_percentage(&mut self, pct: u8, force: bool) {
        if !(1..=100).contains(&pct) {
            debug!("{}: percentage {} ignored", self.actuator.state_key(), pct);
            return;
        }
        let duration = (u64::from(self.auto_off_ms) * u64::from(pct) / 100) as u32;
        self.request_on(self.on_delay_ms, Some(duration), force);
    }

    /// Cancel any pending delay or auto-off and switch off now.
    pub fn off(&mut self, force: bool) {
        self.timer.stop();
        self.pending_duration = None;
        self.phase = OutputPhase::Off;
        if self.on || force {
            self.actuate(false);
        }
    }

    pub fn toggle(&mut self) {
        if self.on { self.off(false) } else { self.on(false) }
    }

    pub fn set_state(&mut self, on: bool, force: bool) {
        if on { self.on(force) } else { self.off(force) }
    }

    /// Accepts `ON`/`1`/`TRUE` and `OFF`/`0`/`FALSE` in any case, with
    /// surrounding whitespace. Anything else is ignored.
    pub fn set_state_str(&mut self, state: &str, force: bool) {
        let s = state.trim();
        if ["ON", "1", "TRUE"].iter().any(|v| s.eq_ignore_ascii_case(v)) {
            self.on(force);
        } else if ["OFF", "0", "FALSE"].iter().any(|v| s.eq_ignore_ascii_case(v)) {
            self.off(force);
        } else {
            debug!("{}: unknown state {:?} ignored", self.actuator.state_key(), state);
        }
    }

    fn request_on(&mut self, delay_ms: u32, duration: Option<u32>, force: bool) {
        let now = self.clock.now_ms();
        if delay_ms > 0
            && self.phase != OutputPhase::On
            && (self.phase != OutputPhase::WaitingForOn || force)
        {
            debug!("{}: on in {}ms", self.actuator.state_key(), delay_ms);
            self.phase = OutputPhase::WaitingForOn;
            self.pending_duration = duration;
            self.timer.start_once(now, delay_ms);
            return;
        }
        self.activate(now, duration, force);
    }

    fn activate(&mut self, at: u32, duration: Option<u32>, force: bool) {
        self.phase = OutputPhase::On;
        self.pending_duration = None;
        if !self.on || force {
            self.actuate(true);
        }
        match duration {
            Some(ms) if ms > 0 => self.arm_auto_off(at, ms),
            Some(_) => self.timer.stop(),
            None if self.auto_off_enabled && self.auto_off_ms > 0 => self.arm_auto_off(at, self.auto_off_ms),
            None => {}
        }
    }

    fn arm_auto_off(&mut self, at: u32, ms: u32) {
        debug!("{}: auto-off in {}ms", self.actuator.state_key(), ms);
        self.timer.start_once(at, ms);
    }

    fn actuate(&mut self, on: bool) {
        self.on = on;
        self.actuator.apply(on);
        self.persist(on);
        self.publish(on);
        if on {
            self.on_power_on.fire(&self.scheduler);
        } else {
            self.on_power_off.fire(&self.scheduler);
        }
        self.on_power_changed.fire(&self.scheduler);
    }

    // ── Timer / lifecycle ─────────────────────────────────────

    /// Apply the startup state. Runs once; later calls are no-ops.
    pub fn begin(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        // Goes through on()/off() so a configured on-delay still applies.
        match self.startup {
            StartupState::None => {}
            StartupState::Off => self.off(true),
            StartupState::On => self.on(true),
            StartupState::LastState => {
                let on = self.load_last_state();
                self.set_state(on, true);
            }
        }
        info!("{}: started ({:?}), {}", self.actuator.state_key(), self.startup, self.state_label());
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Run a due delay or auto-off.
    pub(crate) fn service(&mut self, now_ms: u32) {
        let Some(at) = self.timer.poll(now_ms) else {
            return;
        };
        match self.phase {
            OutputPhase::WaitingForOn => {
                let duration = self.pending_duration.take();
                self.activate(at, duration, false);
            }
            OutputPhase::On => {
                debug!("{}: auto-off", self.actuator.state_key());
                self.off(false);
                self.on_auto_off.fire(&self.scheduler);
            }
            OutputPhase::Off => {}
        }
    }

    /// Stop the timer and hand back its lease.
    pub(crate) fn release(&mut self) -> Option<TimerLease> {
        self.timer.stop();
        self.lease.take()
    }

    // ── Callbacks ─────────────────────────────────────────────

    pub fn on_power_on(&mut self, action: impl Fn() + Send + Sync + 'static, deferred: bool) {
        self.on_power_on = Callback::new(action, deferred);
    }

    pub fn on_power_off(&mut self, action: impl Fn() + Send + Sync + 'static, deferred: bool) {
        self.on_power_off = Callback::new(action, deferred);
    }

    pub fn on_power_changed(&mut self, action: impl Fn() + Send + Sync + 'static, deferred: bool) {
        self.on_power_changed = Callback::new(action, deferred);
    }

    pub fn on_auto_off(&mut self, action: impl Fn() + Send + Sync + 'static, deferred: bool) {
        self.on_auto_off = Callback::new(action, deferred);
    }

    // ── Settings / state ──────────────────────────────────────

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn phase(&self) -> OutputPhase {
        self.phase
    }

    pub fn state_key(&self) -> String {
        self.actuator.state_key()
    }

    pub fn state_label(&self) -> &str {
        if self.on { &self.on_label } else { &self.off_label }
    }

    pub fn set_state_labels(&mut self, on: &str, off: &str) {
        self.on_label = on.into();
        self.off_label = off.into();
    }

    pub fn on_delay_ms(&self) -> u32 {
        self.on_delay_ms
    }

    pub fn set_on_delay_ms(&mut self, ms: u32) {
        self.on_delay_ms = ms;
    }

    pub fn auto_off_ms(&self) -> u32 {
        self.auto_off_ms
    }

    /// Sets the auto-off duration; auto-off is enabled iff `ms > 0`.
    pub fn set_auto_off_ms(&mut self, ms: u32) {
        self.auto_off_ms = ms;
        self.auto_off_enabled = ms > 0;
    }

    pub fn auto_off_enabled(&self) -> bool {
        self.auto_off_enabled
    }

    pub fn set_auto_off(&mut self, enabled: bool) {
        self.auto_off_enabled = enabled;
    }

    pub fn startup(&self) -> StartupState {
        self.startup
    }

    // ── Persistence ───────────────────────────────────────────

    pub fn attach_storage(&mut self, storage: SharedStorage) {
        self.storage = Some(storage);
    }

    fn persist(&self, on: bool) {
        let Some(storage) = &self.storage else {
            return;
        };
        let key = self.actuator.state_key();
        match storage.lock() {
            Ok(mut s) => {
                if let Err(e) = s.write(STATE_NAMESPACE, &key, &[u8::from(on)]) {
                    warn!("{}: persist failed: {}", key, e);
                }
            }
            Err(_) => warn!("{}: storage lock poisoned", key),
        }
    }

    fn load_last_state(&self) -> bool {
        let Some(storage) = &self.storage else {
            debug!("{}: no storage, last state off", self.actuator.state_key());
            return false;
        };
        let key = self.actuator.state_key();
        let Ok(s) = storage.lock() else {
            warn!("{}: storage lock poisoned", key);
            return false;
        };
        let mut buf = [0u8; 1];
        match s.read(STATE_NAMESPACE, &key, &mut buf) {
            Ok(1) => buf[0] != 0,
            Ok(_) | Err(StorageError::NotFound) => false,
            Err(e) => {
                warn!("{}: restore failed: {}", key, e);
                false
            }
        }
    }

    // ── Remote sync ───────────────────────────────────────────

    /// Mirror this output at `sub_path` (leading `/` optional).
    pub fn attach_remote(&mut self, sync: SharedRemote, sub_path: &str) {
        let sub_path = sub_path.trim_start_matches('/').to_string();
        info!("{}: remote sync at /{}", self.actuator.state_key(), sub_path);
        self.remote = Some(RemoteBinding { sync, sub_path });
    }

    pub fn detach_remote(&mut self) {
        self.remote = None;
    }

    /// Publishing happens on a later pump, off the switching path.
    fn publish(&self, on: bool) {
        if self.mute_publish {
            return;
        }
        let Some(binding) = &self.remote else {
            return;
        };
        let sync = binding.sync.clone();
        let path = binding.sub_path.clone();
        let submitted = self.scheduler.submit(Arc::new(move || match sync.lock() {
            Ok(mut s) => {
                if let Err(e) = s.publish(&path, on) {
                    warn!("{}: publish failed: {}", path, e);
                }
            }
            Err(_) => warn!("{}: remote lock poisoned", path),
        }));
        if let Err(e) = submitted {
            warn!("{}: publish dropped: {}", binding.sub_path, e);
        }
    }

    /// Apply a value that came from the remote without echoing it back.
    pub fn sync_state(&mut self, on: bool) {
        self.mute_publish = true;
        self.set_state(on, false);
        self.mute_publish = false;
    }

    /// Apply an inbound change notification. `data_path` of `/` carries an
    /// object keyed by sub-path; `/<sub_path>` carries the boolean itself.
    /// Anything else is ignored.
    pub fn apply_remote_update(&mut self, data_path: &str, value: &serde_json::Value) {
        let Some(binding) = &self.remote else {
            debug!("{}: no remote binding, update ignored", self.actuator.state_key());
            return;
        };
        let state = if data_path == "/" {
            value.get(binding.sub_path.as_str()).and_then(serde_json::Value::as_bool)
        } else if data_path.strip_prefix('/') == Some(binding.sub_path.as_str()) {
            value.as_bool()
        } else {
            None
        };
        if let Some(on) = state {
            self.sync_state(on);
        }
    }

    // ── Mesh property ─────────────────────────────────────────

    pub fn property_value(&self) -> &'static str {
        if self.on { "true" } else { "false" }
    }

    /// Apply a mesh property write. Returns `false` for unknown values.
    pub fn apply_property(&mut self, value: &str) -> bool {
        match value {
            "true" => self.on(false),
            "false" => self.off(false),
            "toggle" => self.toggle(),
            _ => return false,
        }
        true
    }
}
