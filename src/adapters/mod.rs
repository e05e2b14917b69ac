//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter        | Implements         | Connects to              |
//! |----------------|--------------------|--------------------------|
//! | `esp_gpio`     | PinPort, IrqPort   | ESP-IDF GPIO + ISR service |
//! | `memory_store` | StoragePort        | In-memory map (simulation) |
//! | `time`         | Clock              | ESP32 system timer / `Instant` |

#[cfg(target_os = "espidf")]
pub mod esp_gpio;
pub mod memory_store;
pub mod time;
