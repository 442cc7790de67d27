use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KioskError {
    #[error("hardware init failure: {0}")]
    HardwareInitFailure(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("no volume selected")]
    NoTargetSelected,
    #[error("a fill session is already running")]
    SessionAlreadyRunning,
    #[error("unknown volume: {0:?}")]
    UnknownVolume(String),
    #[error("flow callback registration failed: {0}")]
    FlowCallbackRegistrationFailed(String),
    #[error("request failed after {attempts} attempts")]
    RequestExhausted { attempts: u32 },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("serialize error: {0}")]
    Serialize(String),
    #[error("sensor read failure: {0}")]
    SensorReadFailure(String),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
