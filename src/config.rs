//! Configuration parameters
//!
//! Tunables for inputs, buttons, and outputs. Every struct is serde-ready so
//! it can be stored alongside other device settings and loaded at boot.

use serde::{Deserialize, Serialize};

/// Electrical mode applied to a line before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PinMode {
    Input,
    InputPullUp,
    InputPullDown,
    Output,
}

/// Level an output takes right after boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartupState {
    /// Leave the line untouched.
    None,
    Off,
    On,
    /// Restore the level persisted before the last reset.
    LastState,
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Debounced input settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputConfig {
    pub mode: PinMode,
    /// Level that counts as "active" (`false` = LOW).
    pub active_level: bool,
    /// Quiet period after the last edge before a level is trusted.
    /// Zero settles in the same pump that sees the edge.
    pub debounce_ms: u32,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            mode: PinMode::Input,
            active_level: false,
            debounce_ms: 50,
        }
    }
}

// ---------------------------------------------------------------------------
// Button timing
// ---------------------------------------------------------------------------

/// Lower bound on the hold poll period.
pub const MIN_HOLD_POLL_MS: u32 = 50;

/// Gesture timing for a button.
///
/// Setters keep `idle_ms > click_wait_ms` and `hold_ms >= 2 * click_wait_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonTiming {
    /// Window after a release in which another press counts as the next click.
    pub click_wait_ms: u32,
    /// Time after a release before the button reports idle.
    pub idle_ms: u32,
    /// Press duration that counts as a long click.
    pub hold_ms: u32,
}

impl Default for ButtonTiming {
    fn default() -> Self {
        Self {
            click_wait_ms: 300,
            idle_ms: 500,
            hold_ms: 3000,
        }
    }
}

impl ButtonTiming {
    pub fn set_click_wait_ms(&mut self, ms: u32) {
        self.click_wait_ms = ms;
        self.fix_idle();
        self.fix_hold();
    }

    pub fn set_idle_ms(&mut self, ms: u32) {
        self.idle_ms = ms;
        self.fix_idle();
    }

    pub fn set_hold_ms(&mut self, ms: u32) {
        self.hold_ms = ms;
        self.fix_hold();
    }

    /// Copy with both invariants applied (for values loaded from storage).
    pub fn normalized(mut self) -> Self {
        self.fix_idle();
        self.fix_hold();
        self
    }

    fn fix_idle(&mut self) {
        if self.idle_ms <= self.click_wait_ms {
            self.idle_ms = self.idle_ms.saturating_add(self.click_wait_ms);
            log::debug!("timing: idle raised to {}ms", self.idle_ms);
        }
    }

    fn fix_hold(&mut self) {
        let floor = self.click_wait_ms.saturating_mul(2);
        if self.hold_ms <= floor {
            self.hold_ms = floor;
            log::debug!("timing: hold raised to {}ms", self.hold_ms);
        }
    }

    /// Hold poll period: `max(50, gcd(hold_ms, thresholds...))`.
    pub fn hold_poll_ms(&self, thresholds: impl IntoIterator<Item = u32>) -> u32 {
        let g = thresholds.into_iter().fold(self.hold_ms, gcd);
        g.max(MIN_HOLD_POLL_MS)
    }
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 { a } else { gcd(b, a % b) }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Timed output settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub startup: StartupState,
    /// Delay between `on()` and actuation. Zero switches immediately.
    pub on_delay_ms: u32,
    /// Auto-off duration. Zero disables auto-off.
    pub auto_off_ms: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            startup: StartupState::None,
            on_delay_ms: 0,
            auto_off_ms: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Resource limits for the service registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Timers available to debounce, gesture, and output state machines.
    pub timer_capacity: usize,
    /// Maximum number of outputs.
    pub max_outputs: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            timer_capacity: 48,
            max_outputs: 16,
        }
    }
}
