//! Debounced digital inputs, button gesture recognition, and timed outputs.
//!
//! Exposes the pure-logic engine for integration testing. All
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`.
//!
//! ```text
//!  ISR ──▶ IrqShared ──▶ GpioService::pump() ──▶ Input / Button / Output
//!                                │
//!                                └──▶ Scheduler (deferred callbacks)
//! ```

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod callback;
pub mod config;
pub mod drivers;
pub mod error;
pub mod irq;
pub mod scheduler;

pub use app::ports::{ExpanderId, LineId};
pub use app::service::{ButtonId, GpioService, InputId, OutputId};
pub use error::{Error, Resource, Result};
