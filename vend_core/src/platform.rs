//! One-shot hardware probe shared by every controller built from it.
//!
//! The composition root creates a single `HardwarePlatform`. The first call to
//! `initialize` (or `controller`) tries to open the real backend; whatever it
//! decides is cached for the platform's lifetime, so the simulated/real
//! status cannot change mid-run and a failed probe is never retried.

use crate::controller::{HardwareController, HardwareMode, PinAssignment, SharedGpio};
use crate::error::Result;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use vend_hardware::SimulatedGpio;
use vend_hardware::error::HwError;
use vend_traits::GpioBackend;

type Opener = Box<dyn Fn() -> std::result::Result<Box<dyn GpioBackend>, HwError> + Send + Sync>;

struct Probe {
    mode: HardwareMode,
    // Real backend shared by all controllers; None when simulated.
    real: Option<SharedGpio>,
}

pub struct HardwarePlatform {
    opener: Opener,
    probe: OnceLock<Probe>,
}

impl std::fmt::Debug for HardwarePlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwarePlatform")
            .field("mode", &self.probe.get().map(|p| p.mode))
            .finish()
    }
}

impl HardwarePlatform {
    /// Probe with a custom opener (tests, alternative boards).
    pub fn new(
        opener: impl Fn() -> std::result::Result<Box<dyn GpioBackend>, HwError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            opener: Box::new(opener),
            probe: OnceLock::new(),
        }
    }

    /// Probe the physical GPIO (rppal when built with `hardware`).
    pub fn detect() -> Self {
        Self::new(vend_hardware::open_gpio)
    }

    /// Never touch real hardware.
    pub fn simulated() -> Self {
        Self::new(|| Err(HwError::Unavailable("simulation requested".into())))
    }

    /// Decide the mode; only the first call probes.
    pub fn initialize(&self) -> HardwareMode {
        self.probe
            .get_or_init(|| match (self.opener)() {
                Ok(backend) => {
                    tracing::info!("gpio available - running on real hardware");
                    Probe {
                        mode: HardwareMode::Real,
                        real: Some(Arc::new(Mutex::new(backend))),
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "gpio not available - running in simulation mode");
                    Probe {
                        mode: HardwareMode::Simulated,
                        real: None,
                    }
                }
            })
            .mode
    }

    pub fn mode(&self) -> Option<HardwareMode> {
        self.probe.get().map(|p| p.mode)
    }

    /// Build a controller in the platform's mode and configure its pins.
    ///
    /// Simulated controllers each get their own in-memory pin table.
    pub fn controller(
        &self,
        pins: PinAssignment,
        poll_interval: Duration,
    ) -> Result<HardwareController> {
        let mode = self.initialize();
        let gpio: SharedGpio = match self.probe.get().and_then(|p| p.real.clone()) {
            Some(real) => real,
            None => {
                let sim: Box<dyn GpioBackend> = Box::new(SimulatedGpio::new());
                Arc::new(Mutex::new(sim))
            }
        };
        let controller = HardwareController::new(gpio, mode, pins, poll_interval);
        controller.configure_pins()?;
        Ok(controller)
    }
}
