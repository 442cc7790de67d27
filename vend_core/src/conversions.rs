//! `From` implementations bridging `vend_config` sections to runtime types.

use crate::config::{ApiEndpoint, FillCfg, MonitorCfg, RetryPolicy};
use crate::controller::PinAssignment;
use std::time::Duration;

// ── FillCfg ──────────────────────────────────────────────────────────────────

impl From<&vend_config::FillCfg> for FillCfg {
    fn from(c: &vend_config::FillCfg) -> Self {
        Self {
            timeout: Duration::from_millis(c.timeout_ms),
            tick: Duration::from_millis(c.tick_ms),
            sim_step_pulses: c.sim_step_pulses,
        }
    }
}

// ── RetryPolicy / ApiEndpoint ────────────────────────────────────────────────

impl From<&vend_config::ApiCfg> for RetryPolicy {
    fn from(c: &vend_config::ApiCfg) -> Self {
        Self {
            timeout: Duration::from_secs(c.timeout_s),
            max_attempts: c.retry_attempts,
            delay: Duration::from_secs(c.retry_delay_s),
        }
    }
}

impl From<&vend_config::ApiCfg> for ApiEndpoint {
    fn from(c: &vend_config::ApiCfg) -> Self {
        Self {
            base_url: c.base_url.clone(),
            machine_id: c.machine_id.clone(),
        }
    }
}

// ── MonitorCfg ───────────────────────────────────────────────────────────────

impl From<&vend_config::AppCfg> for MonitorCfg {
    fn from(c: &vend_config::AppCfg) -> Self {
        Self {
            interval: Duration::from_secs(c.update_interval_s),
        }
    }
}

// ── PinAssignment ────────────────────────────────────────────────────────────

impl From<&vend_config::HardwareCfg> for PinAssignment {
    fn from(c: &vend_config::HardwareCfg) -> Self {
        let pins = Self::new(c.flow_sensor_pin, c.motor_pin);
        if c.esp32_ip.is_empty() {
            pins
        } else {
            pins.with_remote_sensor(c.esp32_ip.clone(), c.esp32_port)
        }
    }
}

/// Flow pin sampling period.
pub fn flow_poll_interval(c: &vend_config::HardwareCfg) -> Duration {
    Duration::from_millis(c.flow_poll_ms)
}
