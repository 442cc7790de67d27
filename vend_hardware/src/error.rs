use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("gpio backend unavailable: {0}")]
    Unavailable(String),
    #[error("pin {0} is not configured")]
    NotConfigured(u8),
    #[error("pin {0} is not an output")]
    NotOutput(u8),
    #[error("sensor link error: {0}")]
    Sensor(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
