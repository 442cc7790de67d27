//! Maps `Box<dyn Error>` from trait boundaries to typed `KioskError`.
//!
//! The traits in `vend_traits` use `Box<dyn Error + Send + Sync>` so any backend
//! can plug in; this module converts those to our typed error enum, downcasting
//! `vend_hardware::HwError` where possible.

use crate::error::KioskError;
use vend_hardware::error::HwError;

/// Map a pin-level failure to a typed `KioskError`.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> KioskError {
    if let Some(hw) = e.downcast_ref::<HwError>() {
        return match hw {
            HwError::Unavailable(msg) => KioskError::HardwareInitFailure(msg.clone()),
            HwError::Sensor(msg) => KioskError::SensorReadFailure(msg.clone()),
            other => KioskError::HardwareFault(other.to_string()),
        };
    }
    KioskError::HardwareFault(e.to_string())
}

/// Map a sensor-link failure; anything that is not a typed hardware error is a read failure.
pub fn map_sensor_error(e: &(dyn std::error::Error + 'static)) -> KioskError {
    match map_hw_error(e) {
        KioskError::HardwareFault(msg) => KioskError::SensorReadFailure(msg),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_hw_errors_are_mapped() {
        let e: Box<dyn std::error::Error + Send + Sync> = Box::new(HwError::NotOutput(21));
        assert!(matches!(map_hw_error(e.as_ref()), KioskError::HardwareFault(m) if m.contains("21")));

        let e: Box<dyn std::error::Error + Send + Sync> =
            Box::new(HwError::Unavailable("no /dev/gpiomem".into()));
        assert!(matches!(
            map_hw_error(e.as_ref()),
            KioskError::HardwareInitFailure(_)
        ));
    }

    #[test]
    fn untyped_sensor_errors_become_read_failures() {
        let e: Box<dyn std::error::Error + Send + Sync> = "link down".into();
        assert_eq!(
            map_sensor_error(e.as_ref()),
            KioskError::SensorReadFailure("link down".into())
        );
    }
}
