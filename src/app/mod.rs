//! Application core: the service registry and the port traits it talks
//! to the platform through.
//!
//! All interaction with hardware happens through **port traits** defined
//! in [`ports`], keeping the engine fully testable without real pins.

pub mod ports;
pub mod service;
