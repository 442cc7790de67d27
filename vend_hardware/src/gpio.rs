//! Raspberry Pi GPIO backend (rppal).

use std::collections::HashMap;

use rppal::gpio::{Gpio, InputPin, OutputPin};
use tracing::{debug, trace};
use vend_traits::{BoxError, GpioBackend};

use crate::error::{HwError, Result};

pub struct RppalGpio {
    gpio: Gpio,
    inputs: HashMap<u8, InputPin>,
    outputs: HashMap<u8, OutputPin>,
}

impl RppalGpio {
    pub fn new() -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Unavailable(e.to_string()))?;
        debug!("rppal gpio opened");
        Ok(Self {
            gpio,
            inputs: HashMap::new(),
            outputs: HashMap::new(),
        })
    }

    fn output(&mut self, pin: u8) -> Result<&mut OutputPin> {
        if self.inputs.contains_key(&pin) {
            return Err(HwError::NotOutput(pin));
        }
        self.outputs.get_mut(&pin).ok_or(HwError::NotConfigured(pin))
    }
}

impl GpioBackend for RppalGpio {
    fn configure_input_pullup(&mut self, pin: u8) -> std::result::Result<(), BoxError> {
        let p = self
            .gpio
            .get(pin)
            .map_err(|e| HwError::Gpio(format!("open pin {pin}: {e}")))?
            .into_input_pullup();
        self.outputs.remove(&pin);
        self.inputs.insert(pin, p);
        Ok(())
    }

    fn configure_output(&mut self, pin: u8) -> std::result::Result<(), BoxError> {
        let p = self
            .gpio
            .get(pin)
            .map_err(|e| HwError::Gpio(format!("open pin {pin}: {e}")))?
            .into_output_low();
        self.inputs.remove(&pin);
        self.outputs.insert(pin, p);
        Ok(())
    }

    fn set_high(&mut self, pin: u8) -> std::result::Result<(), BoxError> {
        self.output(pin)?.set_high();
        trace!(pin, "gpio high");
        Ok(())
    }

    fn set_low(&mut self, pin: u8) -> std::result::Result<(), BoxError> {
        self.output(pin)?.set_low();
        trace!(pin, "gpio low");
        Ok(())
    }

    fn read(&mut self, pin: u8) -> std::result::Result<bool, BoxError> {
        if let Some(p) = self.inputs.get(&pin) {
            return Ok(p.is_high());
        }
        if let Some(p) = self.outputs.get(&pin) {
            return Ok(p.is_set_high());
        }
        Err(HwError::NotConfigured(pin).into())
    }

    fn release(&mut self, pin: u8) {
        // rppal resets pins to their prior state when the handle drops.
        if self.outputs.remove(&pin).is_some() || self.inputs.remove(&pin).is_some() {
            debug!(pin, "gpio pin released");
        }
    }
}
