//! Unified error type for the input/output engine.
//!
//! Every fallible registration or attach call returns this type. All
//! variants are `Copy` so they can be returned from timer and interrupt
//! bookkeeping paths without allocation. Nothing in this crate returns an
//! error across the interrupt boundary: ISR paths degrade to a dropped
//! edge and a bumped counter instead.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A fixed-capacity resource (timer, queue, arena slot) is used up.
    /// The feature that asked for it stays disabled.
    ResourceExhausted(Resource),
    /// The platform cannot route an interrupt for this pin.
    InterruptUnavailable(u8),
    /// A handle does not refer to a registered line or output.
    UnknownHandle,
    /// A platform GPIO call failed.
    Io(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResourceExhausted(r) => write!(f, "resource exhausted: {r}"),
            Self::InterruptUnavailable(pin) => write!(f, "no interrupt for pin {pin}"),
            Self::UnknownHandle => write!(f, "unknown handle"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Software/hardware timer pool.
    Timer,
    /// Line arena (inputs + buttons).
    LineSlots,
    /// Output arena.
    OutputSlots,
    /// Deferred-callback queue.
    SchedulerQueue,
    /// Distinct expander groups.
    ExpanderGroups,
    /// Members of a single expander group.
    GroupMembers,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timer => write!(f, "timer pool"),
            Self::LineSlots => write!(f, "line slots"),
            Self::OutputSlots => write!(f, "output slots"),
            Self::SchedulerQueue => write!(f, "scheduler queue"),
            Self::ExpanderGroups => write!(f, "expander groups"),
            Self::GroupMembers => write!(f, "expander group members"),
        }
    }
}

impl From<Resource> for Error {
    fn from(r: Resource) -> Self {
        Self::ResourceExhausted(r)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
