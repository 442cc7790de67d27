//! Motor and flow-sensor control over a `GpioBackend`.
//!
//! The controller hides whether the backend is real or simulated behind one
//! contract; callers that need to know ask `is_simulated()`.
//!
//! Locking:
//! - `gpio` guards pin state and is held only for a single pin operation.
//! - `motor` serializes motor commands; the flow poller never takes it.
//! - the pulse callback runs with no controller lock held.

use crate::error::{KioskError, Result};
use crate::flow::{CallbackSlot, FlowPoller, PulseCallback};
use crate::hw_error::map_hw_error;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};
use vend_traits::GpioBackend;
use vend_traits::clock::MonotonicClock;

/// Pin table shared with the flow poller.
pub type SharedGpio = Arc<Mutex<Box<dyn GpioBackend>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareMode {
    Real,
    Simulated,
}

/// Which pins the controller drives, plus the sensor board address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinAssignment {
    pub flow_sensor_pin: u8,
    pub motor_pin: u8,
    pub remote_sensor: Option<(String, u16)>,
}

impl PinAssignment {
    pub fn new(flow_sensor_pin: u8, motor_pin: u8) -> Self {
        Self {
            flow_sensor_pin,
            motor_pin,
            remote_sensor: None,
        }
    }

    pub fn with_remote_sensor(mut self, ip: impl Into<String>, port: u16) -> Self {
        self.remote_sensor = Some((ip.into(), port));
        self
    }
}

pub struct HardwareController {
    pins: PinAssignment,
    mode: HardwareMode,
    gpio: SharedGpio,
    // Motor-control lock; the flag is the last commanded state.
    motor: Mutex<bool>,
    poller: Mutex<Option<FlowPoller>>,
    slot: CallbackSlot,
    next_sub_id: AtomicU64,
    poll_interval: Duration,
    released: AtomicBool,
}

impl std::fmt::Debug for HardwareController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareController")
            .field("pins", &self.pins)
            .field("mode", &self.mode)
            .field("released", &self.released.load(Ordering::Relaxed))
            .finish()
    }
}

impl HardwareController {
    /// Wrap an already-selected backend. Pins are not touched until `configure_pins`.
    pub fn new(
        gpio: SharedGpio,
        mode: HardwareMode,
        pins: PinAssignment,
        poll_interval: Duration,
    ) -> Self {
        Self {
            pins,
            mode,
            gpio,
            motor: Mutex::new(false),
            poller: Mutex::new(None),
            slot: Arc::new(Mutex::new(None)),
            next_sub_id: AtomicU64::new(1),
            poll_interval: poll_interval.max(Duration::from_micros(100)),
            released: AtomicBool::new(false),
        }
    }

    /// Convenience: controller over a boxed backend it does not share.
    pub fn with_backend(
        backend: Box<dyn GpioBackend>,
        mode: HardwareMode,
        pins: PinAssignment,
        poll_interval: Duration,
    ) -> Self {
        Self::new(Arc::new(Mutex::new(backend)), mode, pins, poll_interval)
    }

    pub fn pins(&self) -> &PinAssignment {
        &self.pins
    }

    pub fn mode(&self) -> HardwareMode {
        self.mode
    }

    pub fn is_simulated(&self) -> bool {
        self.mode == HardwareMode::Simulated
    }

    /// Flow input with pull-up, motor output driven low.
    pub fn configure_pins(&self) -> Result<()> {
        let res = {
            let mut gpio = self.gpio()?;
            gpio.configure_input_pullup(self.pins.flow_sensor_pin)
                .and_then(|()| gpio.configure_output(self.pins.motor_pin))
        };
        match res {
            Ok(()) => {
                debug!(
                    flow_pin = self.pins.flow_sensor_pin,
                    motor_pin = self.pins.motor_pin,
                    mode = ?self.mode,
                    "pins configured"
                );
                Ok(())
            }
            Err(e) => Err(eyre::Report::new(map_hw_error(e.as_ref()))),
        }
    }

    pub fn start_motor(&self) -> Result<()> {
        self.drive_motor(true)
    }

    /// Safe to call repeatedly or before any start.
    pub fn stop_motor(&self) -> Result<()> {
        self.drive_motor(false)
    }

    fn drive_motor(&self, on: bool) -> Result<()> {
        let mut motor = self.motor.lock().map_err(|_| {
            eyre::Report::new(KioskError::HardwareFault("motor lock poisoned".into()))
        })?;

        if self.released.load(Ordering::Acquire) {
            if on {
                return Err(eyre::Report::new(KioskError::HardwareFault(
                    "controller released".into(),
                )));
            }
            return Ok(());
        }

        let pin = self.pins.motor_pin;
        let res = {
            let mut gpio = self.gpio()?;
            if on { gpio.set_high(pin) } else { gpio.set_low(pin) }
        };

        match (res, self.mode) {
            (Ok(()), HardwareMode::Simulated) => {
                info!(pin, "simulated motor {}", if on { "start" } else { "stop" });
            }
            (Ok(()), HardwareMode::Real) => {
                info!(pin, "motor {}", if on { "started" } else { "stopped" });
            }
            (Err(e), HardwareMode::Simulated) => {
                // Simulated actuation never fails the caller.
                warn!(pin, error = %e, "simulated motor write failed");
            }
            (Err(e), HardwareMode::Real) => {
                let err = map_hw_error(e.as_ref());
                warn!(pin, on, error = %err, "motor actuation failed");
                return Err(eyre::Report::new(KioskError::HardwareFault(format!(
                    "failed to {} motor: {e}",
                    if on { "start" } else { "stop" }
                ))));
            }
        }
        *motor = on;
        Ok(())
    }

    /// Last commanded motor state.
    pub fn motor_running(&self) -> bool {
        self.motor.lock().map(|m| *m).unwrap_or(false)
    }

    /// Install `on_pulse` as the receiver of flow pulses until the returned guard drops.
    ///
    /// Real mode: a single background poller samples the flow pin and calls the
    /// current subscriber on every high→low transition. A new subscription
    /// replaces the previous one. Simulated mode: nothing is polled and the
    /// guard is inert.
    pub fn subscribe_flow_events(
        &self,
        on_pulse: impl Fn() + Send + Sync + 'static,
    ) -> Result<FlowSubscription> {
        if self.is_simulated() {
            return Ok(FlowSubscription::inert());
        }
        if self.released.load(Ordering::Acquire) {
            return Err(eyre::Report::new(KioskError::FlowCallbackRegistrationFailed(
                "controller released".into(),
            )));
        }

        let mut poller = self.poller.lock().map_err(|_| {
            eyre::Report::new(KioskError::FlowCallbackRegistrationFailed(
                "poller lock poisoned".into(),
            ))
        })?;

        // Probe the pin once so a dead input fails registration, not the loop.
        let probe = if poller.is_none() {
            let level = {
                let mut gpio = self.gpio()?;
                gpio.read(self.pins.flow_sensor_pin)
            };
            Some(level.map_err(|e| {
                eyre::Report::new(KioskError::FlowCallbackRegistrationFailed(e.to_string()))
            })?)
        } else {
            None
        };

        // Install before the poller starts so no early edge goes undelivered.
        let id = self.next_sub_id.fetch_add(1, Ordering::Relaxed);
        let cb: PulseCallback = Arc::new(on_pulse);
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some((id, cb));
        }

        if let Some(initial) = probe {
            *poller = Some(FlowPoller::spawn(
                self.gpio.clone(),
                self.pins.flow_sensor_pin,
                initial,
                self.poll_interval,
                self.slot.clone(),
                MonotonicClock::new(),
            ));
            debug!(pin = self.pins.flow_sensor_pin, interval = ?self.poll_interval, "flow poller started");
        }

        Ok(FlowSubscription {
            slot: Some(self.slot.clone()),
            id,
        })
    }

    /// Falling edges counted by the poller so far (0 when never subscribed).
    pub fn total_flow_pulses(&self) -> u64 {
        self.poller
            .lock()
            .ok()
            .and_then(|p| p.as_ref().map(FlowPoller::total_pulses))
            .unwrap_or(0)
    }

    /// Stop polling and hand the pins back. Only the first call has effect.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        // Join the poller before touching the pin table it reads.
        let poller = self.poller.lock().ok().and_then(|mut p| p.take());
        drop(poller);
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }

        if self.mode == HardwareMode::Real {
            match self.gpio.lock() {
                Ok(mut gpio) => {
                    if let Err(e) = gpio.set_low(self.pins.motor_pin) {
                        warn!(error = %e, "motor pin low on release failed");
                    }
                    gpio.release(self.pins.flow_sensor_pin);
                    gpio.release(self.pins.motor_pin);
                }
                Err(_) => warn!("gpio lock poisoned during release"),
            }
            info!("gpio cleanup completed");
        } else {
            debug!("simulated controller released");
        }
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    fn gpio(&self) -> Result<MutexGuard<'_, Box<dyn GpioBackend>>> {
        self.gpio
            .lock()
            .map_err(|_| eyre::Report::new(KioskError::HardwareFault("gpio lock poisoned".into())))
    }
}

impl Drop for HardwareController {
    fn drop(&mut self) {
        self.release();
    }
}

/// Keeps a pulse callback installed; dropping it uninstalls the callback.
#[must_use = "dropping the subscription stops pulse delivery"]
pub struct FlowSubscription {
    slot: Option<CallbackSlot>,
    id: u64,
}

impl FlowSubscription {
    fn inert() -> Self {
        Self { slot: None, id: 0 }
    }

    /// True when pulses are actually being delivered to this subscriber.
    pub fn is_active(&self) -> bool {
        self.slot
            .as_ref()
            .and_then(|s| s.lock().ok().map(|g| matches!(&*g, Some((id, _)) if *id == self.id)))
            .unwrap_or(false)
    }
}

impl Drop for FlowSubscription {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take()
            && let Ok(mut g) = slot.lock()
            && matches!(&*g, Some((id, _)) if *id == self.id)
        {
            *g = None;
        }
    }
}
