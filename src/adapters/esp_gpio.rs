//! ESP-IDF GPIO adapter: [`PinPort`] and [`IrqPort`] on native pins.
//!
//! Uses raw `esp_idf_svc::sys` calls. Each interrupt binding registers the
//! same trampoline with the packed [`IrqSource`] as its argument; the
//! trampoline timestamps the edge and forwards it to the [`IrqShared`]
//! installed by [`EspGpio::new`]. Nothing else runs in interrupt context.
//!
//! Expander lines need a bus driver and are not handled here; wrap this
//! adapter in a `PinPort` that forwards them to the expander.

use std::sync::{Arc, OnceLock};

use esp_idf_svc::sys::*;
use log::{info, warn};

use crate::app::ports::{IrqPort, LineId, PinPort, Trigger};
use crate::config::PinMode;
use crate::error::{Error, Result};
use crate::irq::{IrqShared, IrqSource};

static ISR_TARGET: OnceLock<Arc<IrqShared>> = OnceLock::new();

unsafe extern "C" fn gpio_isr(arg: *mut core::ffi::c_void) {
    if let Some(irq) = ISR_TARGET.get() {
        // SAFETY: esp_timer_get_time is ISR-safe.
        let now_ms = (unsafe { esp_timer_get_time() } / 1_000) as u32;
        irq.dispatch(IrqSource::from_raw(arg as usize), now_ms);
    }
}

#[derive(Debug, Clone)]
pub struct EspGpio {
    _private: (),
}

impl EspGpio {
    /// Install the per-pin ISR service and route every binding to `irq`.
    /// Only the first `IrqShared` ever installed receives interrupts.
    pub fn new(irq: Arc<IrqShared>) -> Result<Self> {
        // SAFETY: ESP_ERR_INVALID_STATE means the service is already
        // installed, which is fine.
        let ret = unsafe { gpio_install_isr_service(0) };
        if ret != ESP_OK && ret != ESP_ERR_INVALID_STATE {
            return Err(Error::Io("gpio_install_isr_service"));
        }
        if ISR_TARGET.set(irq).is_err() {
            warn!("EspGpio: ISR target already installed, keeping the first");
        }
        info!("EspGpio: ISR service ready");
        Ok(Self { _private: () })
    }

    fn native(line: LineId) -> Option<i32> {
        match line {
            LineId::Native(pin) => Some(i32::from(pin)),
            LineId::Expander { .. } => {
                warn!("EspGpio: {:?} is behind an expander", line);
                None
            }
        }
    }
}

impl PinPort for EspGpio {
    fn set_mode(&mut self, line: LineId, mode: PinMode) {
        let Some(pin) = Self::native(line) else {
            return;
        };
        let (direction, pull) = match mode {
            PinMode::Input => (gpio_mode_t_GPIO_MODE_INPUT, gpio_pull_mode_t_GPIO_FLOATING),
            PinMode::InputPullUp => (gpio_mode_t_GPIO_MODE_INPUT, gpio_pull_mode_t_GPIO_PULLUP_ONLY),
            PinMode::InputPullDown => (gpio_mode_t_GPIO_MODE_INPUT, gpio_pull_mode_t_GPIO_PULLDOWN_ONLY),
            PinMode::Output => (gpio_mode_t_GPIO_MODE_INPUT_OUTPUT, gpio_pull_mode_t_GPIO_FLOATING),
        };
        // SAFETY: plain register configuration of a valid pin number.
        unsafe {
            gpio_reset_pin(pin);
            if gpio_set_direction(pin, direction) != ESP_OK {
                warn!("EspGpio: direction on pin {} failed", pin);
            }
            gpio_set_pull_mode(pin, pull);
        }
    }

    fn read(&mut self, line: LineId, _fresh: bool) -> bool {
        let Some(pin) = Self::native(line) else {
            return false;
        };
        // SAFETY: gpio_get_level is a read-only register access.
        (unsafe { gpio_get_level(pin) }) != 0
    }

    fn write(&mut self, line: LineId, level: bool) {
        let Some(pin) = Self::native(line) else {
            return;
        };
        // SAFETY: the pin was put in output mode by set_mode.
        unsafe {
            gpio_set_level(pin, u32::from(level));
        }
    }
}

impl IrqPort for EspGpio {
    fn attach(&mut self, pin: u8, trigger: Trigger, source: IrqSource) -> Result<()> {
        let gpio = i32::from(pin);
        let intr = match trigger {
            Trigger::Change => gpio_int_type_t_GPIO_INTR_ANYEDGE,
            Trigger::Falling => gpio_int_type_t_GPIO_INTR_NEGEDGE,
            Trigger::Rising => gpio_int_type_t_GPIO_INTR_POSEDGE,
        };
        // SAFETY: the handler only forwards to IrqShared; the argument is a
        // packed IrqSource, not a pointer.
        unsafe {
            if gpio_set_intr_type(gpio, intr) != ESP_OK {
                return Err(Error::InterruptUnavailable(pin));
            }
            if gpio_isr_handler_add(gpio, Some(gpio_isr), source.to_raw() as *mut core::ffi::c_void) != ESP_OK {
                return Err(Error::InterruptUnavailable(pin));
            }
            gpio_intr_enable(gpio);
        }
        Ok(())
    }

    fn detach(&mut self, pin: u8) {
        let gpio = i32::from(pin);
        // SAFETY: removing an unregistered handler is a no-op error.
        unsafe {
            gpio_intr_disable(gpio);
            gpio_isr_handler_remove(gpio);
        }
    }
}
