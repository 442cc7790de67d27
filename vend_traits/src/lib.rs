pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

/// Error type used at every trait boundary in the workspace.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Digital pin capability set shared by the real and simulated GPIO backends.
///
/// Levels are reported as `true` = high, `false` = low. Output pins start low.
pub trait GpioBackend: Send {
    fn configure_input_pullup(&mut self, pin: u8) -> Result<(), BoxError>;
    fn configure_output(&mut self, pin: u8) -> Result<(), BoxError>;
    fn set_high(&mut self, pin: u8) -> Result<(), BoxError>;
    fn set_low(&mut self, pin: u8) -> Result<(), BoxError>;
    fn read(&mut self, pin: u8) -> Result<bool, BoxError>;

    /// Give the pin back to the platform. Default: nothing to release.
    fn release(&mut self, _pin: u8) {}
}

/// One water-quality sample as delivered by the sensor board.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WaterQuality {
    pub ph: f64,
    pub tds: f64,
    pub water_level: f64,
}

pub trait SensorLink: Send {
    fn read(&mut self) -> Result<WaterQuality, BoxError>;
}

impl<T: GpioBackend + ?Sized> GpioBackend for Box<T> {
    fn configure_input_pullup(&mut self, pin: u8) -> Result<(), BoxError> {
        (**self).configure_input_pullup(pin)
    }
    fn configure_output(&mut self, pin: u8) -> Result<(), BoxError> {
        (**self).configure_output(pin)
    }
    fn set_high(&mut self, pin: u8) -> Result<(), BoxError> {
        (**self).set_high(pin)
    }
    fn set_low(&mut self, pin: u8) -> Result<(), BoxError> {
        (**self).set_low(pin)
    }
    fn read(&mut self, pin: u8) -> Result<bool, BoxError> {
        (**self).read(pin)
    }
    fn release(&mut self, pin: u8) {
        (**self).release(pin)
    }
}

impl<T: SensorLink + ?Sized> SensorLink for Box<T> {
    fn read(&mut self) -> Result<WaterQuality, BoxError> {
        (**self).read()
    }
}
