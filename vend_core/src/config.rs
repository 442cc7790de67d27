//! Runtime configuration types for the kiosk core.
//!
//! These are separate from the TOML-deserialized config in `vend_config`;
//! see `conversions` for the mapping.

use std::time::Duration;

/// Fill-session timing.
#[derive(Debug, Clone)]
pub struct FillCfg {
    /// Absolute limit measured from motor start.
    pub timeout: Duration,
    /// Loop boundary: simulated increment period and max cancellation latency.
    pub tick: Duration,
    /// Pulses credited per tick when the controller is simulated.
    pub sim_step_pulses: u32,
}

impl Default for FillCfg {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            tick: Duration::from_millis(100),
            sim_step_pulses: 5,
        }
    }
}

/// HTTP retry behaviour; fixed for the client's lifetime.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Per-attempt timeout.
    pub timeout: Duration,
    pub max_attempts: u32,
    /// Constant delay between attempts (no backoff).
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Backend endpoint identity.
#[derive(Debug, Clone)]
pub struct ApiEndpoint {
    pub base_url: String,
    pub machine_id: String,
}

impl Default for ApiEndpoint {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            machine_id: "VM001".into(),
        }
    }
}

/// Sensor monitoring cadence.
#[derive(Debug, Clone)]
pub struct MonitorCfg {
    pub interval: Duration,
}

impl Default for MonitorCfg {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
        }
    }
}
