//! Port traits: the boundary between the engine and the platform.
//!
//! ```text
//!   Platform adapter ──▶ Port trait ──▶ GpioService (engine)
//! ```
//!
//! The engine never touches registers. Pin access, interrupt routing,
//! persistence, and remote state sync are all reached through these traits
//! so every state machine runs unchanged against the mocks in `tests/`.

use serde::{Deserialize, Serialize};

use crate::config::PinMode;
use crate::error::Result;
use crate::irq::IrqSource;

// ───────────────────────────────────────────────────────────────
// Line identity
// ───────────────────────────────────────────────────────────────

/// Handle of an I/O expander sharing one interrupt line (its bus address).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExpanderId(pub u8);

/// Logical address of one digital line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineId {
    /// A pin on the MCU itself.
    Native(u8),
    /// A pin behind an I/O expander.
    Expander { expander: ExpanderId, pin: u8 },
}

impl LineId {
    pub fn expander(&self) -> Option<ExpanderId> {
        match self {
            Self::Native(_) => None,
            Self::Expander { expander, .. } => Some(*expander),
        }
    }

    /// Key under which this line's last output level is persisted.
    pub fn state_key(&self) -> String {
        match self {
            Self::Native(pin) => format!("p{pin}"),
            Self::Expander { expander, pin } => format!("p{}_{}", expander.0, pin),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Pin port (raw digital read/write)
// ───────────────────────────────────────────────────────────────

/// Raw digital I/O addressed by [`LineId`].
///
/// Implementations are cheap handles (`Clone`) onto the real hardware so
/// each input and output can own one.
pub trait PinPort {
    fn set_mode(&mut self, line: LineId, mode: PinMode);

    /// Read the electrical level (`true` = HIGH). `fresh` asks expander
    /// backends to bypass any cached port snapshot.
    fn read(&mut self, line: LineId, fresh: bool) -> bool;

    fn write(&mut self, line: LineId, level: bool);
}

// ───────────────────────────────────────────────────────────────
// Interrupt port
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Change,
    Falling,
    Rising,
}

/// Edge-triggered interrupt registration on native pins.
///
/// The platform ISR for a binding must call
/// [`IrqShared::dispatch`](crate::irq::IrqShared::dispatch) with the
/// `source` given here and the current monotonic time, and nothing else.
pub trait IrqPort {
    fn attach(&mut self, pin: u8, trigger: Trigger, source: IrqSource) -> Result<()>;

    /// Remove a binding. Unknown pins are ignored.
    fn detach(&mut self, pin: u8);
}

// ───────────────────────────────────────────────────────────────
// Storage port (last output state)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage (NVS on the device).
///
/// Write operations MUST be atomic, with no partial writes on power loss.
pub trait StoragePort {
    /// Read a value. Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> core::result::Result<usize, StorageError>;

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> core::result::Result<(), StorageError>;

    /// Delete a key. Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> core::result::Result<(), StorageError>;

    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Remote sync port
// ───────────────────────────────────────────────────────────────

/// Push side of a remote key-value database mirroring output state.
/// Inbound changes arrive through
/// [`Output::apply_remote_update`](crate::drivers::output::Output::apply_remote_update).
pub trait RemoteSync {
    fn publish(&mut self, path: &str, on: bool) -> core::result::Result<(), SyncError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    NotFound,
    Full,
    IoError,
}

/// Errors from [`RemoteSync`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncError {
    /// No connection or credentials configured.
    NotConfigured,
    /// The remote rejected or timed out the write.
    Rejected,
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for SyncError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "remote not configured"),
            Self::Rejected => write!(f, "remote rejected update"),
        }
    }
}
