//! Fill-session states and the final report.

use crate::volume::VolumeProfile;
use std::time::Duration;

/// Terminal result of one fill session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    /// Target pulse count reached.
    Completed,
    /// Fill timeout elapsed first.
    TimedOut,
    /// Caller asked to stop.
    Cancelled,
    /// Motor actuation failed.
    MotorError,
    /// Flow subscription could not be set up or was lost.
    FlowSensorError,
}

impl FillOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            FillOutcome::Completed => "completed",
            FillOutcome::TimedOut => "timed_out",
            FillOutcome::Cancelled => "cancelled",
            FillOutcome::MotorError => "motor_error",
            FillOutcome::FlowSensorError => "flow_sensor_error",
        }
    }
}

impl std::fmt::Display for FillOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable state of a dispenser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Finished(FillOutcome),
}

#[derive(Debug, Clone)]
pub struct FillReport {
    pub volume: &'static VolumeProfile,
    pub outcome: FillOutcome,
    pub pulses: u32,
    pub progress: u8,
    pub elapsed: Duration,
    /// Failure detail for `MotorError` / `FlowSensorError`.
    pub error: Option<String>,
}

/// Messages a running session hands to its observer, in order.
#[derive(Debug, Clone)]
pub enum FillEvent {
    Progress(u8),
    /// Always the last event of a session; the motor is already stopped.
    Finished(FillReport),
}
