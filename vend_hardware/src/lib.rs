pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;
pub mod util;

use crate::error::HwError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use vend_traits::{BoxError, GpioBackend, SensorLink, WaterQuality};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SimMode {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy)]
struct SimPin {
    mode: SimMode,
    level: bool,
}

/// Simulated GPIO backed by an in-memory pin table.
///
/// Each instance owns its own table; clones share it, which lets a test or a
/// bench harness drive input levels while a controller holds the backend.
#[derive(Debug, Clone, Default)]
pub struct SimulatedGpio {
    pins: Arc<Mutex<HashMap<u8, SimPin>>>,
}

impl SimulatedGpio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force the level seen on an input pin (e.g. to emulate a flow pulse).
    pub fn drive(&self, pin: u8, high: bool) -> error::Result<()> {
        let mut pins = self.lock()?;
        match pins.get_mut(&pin) {
            Some(p) => {
                p.level = high;
                Ok(())
            }
            None => Err(HwError::NotConfigured(pin)),
        }
    }

    /// Current level of any configured pin.
    pub fn level(&self, pin: u8) -> Option<bool> {
        self.pins.lock().ok()?.get(&pin).map(|p| p.level)
    }

    fn lock(&self) -> error::Result<std::sync::MutexGuard<'_, HashMap<u8, SimPin>>> {
        self.pins
            .lock()
            .map_err(|_| HwError::Gpio("simulated pin table poisoned".into()))
    }

    fn write(&mut self, pin: u8, high: bool) -> error::Result<()> {
        let mut pins = self.lock()?;
        match pins.get_mut(&pin) {
            Some(p) if p.mode == SimMode::Output => {
                p.level = high;
                tracing::trace!(pin, high, "simulated pin write");
                Ok(())
            }
            Some(_) => Err(HwError::NotOutput(pin)),
            None => Err(HwError::NotConfigured(pin)),
        }
    }
}

impl GpioBackend for SimulatedGpio {
    fn configure_input_pullup(&mut self, pin: u8) -> Result<(), BoxError> {
        // Pull-up: an idle input rests high.
        self.lock()?.insert(
            pin,
            SimPin {
                mode: SimMode::Input,
                level: true,
            },
        );
        Ok(())
    }

    fn configure_output(&mut self, pin: u8) -> Result<(), BoxError> {
        self.lock()?.insert(
            pin,
            SimPin {
                mode: SimMode::Output,
                level: false,
            },
        );
        Ok(())
    }

    fn set_high(&mut self, pin: u8) -> Result<(), BoxError> {
        Ok(self.write(pin, true)?)
    }

    fn set_low(&mut self, pin: u8) -> Result<(), BoxError> {
        Ok(self.write(pin, false)?)
    }

    fn read(&mut self, pin: u8) -> Result<bool, BoxError> {
        let pins = self.lock()?;
        pins.get(&pin)
            .map(|p| p.level)
            .ok_or_else(|| HwError::NotConfigured(pin).into())
    }
}

/// Try to open the physical GPIO controller.
///
/// Without the `hardware` feature (or off Linux) this always fails, which
/// callers treat as "run simulated".
pub fn open_gpio() -> error::Result<Box<dyn GpioBackend>> {
    #[cfg(all(feature = "hardware", target_os = "linux"))]
    {
        let gpio = gpio::RppalGpio::new()?;
        Ok(Box::new(gpio))
    }
    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    {
        Err(HwError::Unavailable(
            "built without the `hardware` feature".into(),
        ))
    }
}

/// Sensor board link that has not been wired up yet: reports fixed values.
#[derive(Debug, Clone)]
pub struct PlaceholderSensorLink {
    addr: Option<(String, u16)>,
}

impl PlaceholderSensorLink {
    pub const SAMPLE: WaterQuality = WaterQuality {
        ph: 7.0,
        tds: 150.0,
        water_level: 80.0,
    };

    pub fn new(addr: Option<(String, u16)>) -> Self {
        Self { addr }
    }

    pub fn addr(&self) -> Option<&(String, u16)> {
        self.addr.as_ref()
    }
}

impl SensorLink for PlaceholderSensorLink {
    fn read(&mut self) -> Result<WaterQuality, BoxError> {
        tracing::trace!(addr = ?self.addr, "placeholder sensor read");
        Ok(Self::SAMPLE)
    }
}
