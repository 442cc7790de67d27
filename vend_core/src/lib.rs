#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Kiosk control core (hardware-agnostic).
//!
//! All pin access goes through `vend_traits::GpioBackend` and all sensor access
//! through `vend_traits::SensorLink`, so every piece here runs the same against
//! a Raspberry Pi, the in-memory simulator, or a test spy.
//!
//! ## Architecture
//!
//! - **Platform**: one-shot real/simulated probe shared by all controllers (`platform`)
//! - **Controller**: motor output, flow-pulse subscription, release (`controller`, `flow`)
//! - **Fill session**: pulse/tick accounting, timeout, cancellation, guaranteed motor stop (`session`)
//! - **Dispenser**: volume selection and queued progress notifications (`dispenser`)
//! - **Telemetry**: retrying JSON client (`api`) and periodic sensor monitor (`monitor`)
//!
//! The composition root (the CLI) builds one platform, one controller, one API
//! client and passes them down; nothing here is looked up globally.

pub mod api;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod dispenser;
pub mod error;
pub mod flow;
pub mod hw_error;
pub mod mocks;
pub mod monitor;
pub mod platform;
pub mod session;
pub mod status;
pub mod util;
pub mod volume;

pub use api::{ApiClient, HttpRequest, HttpResponse, QualityRecord, Transport, UreqTransport};
pub use config::{ApiEndpoint, FillCfg, MonitorCfg, RetryPolicy};
pub use controller::{FlowSubscription, HardwareController, HardwareMode, PinAssignment};
pub use dispenser::{Dispenser, FillObserver};
pub use error::{KioskError, Result};
pub use monitor::{MonitorHandle, SensorMonitor, SensorReading, TelemetrySink};
pub use platform::HardwarePlatform;
pub use session::{CancelToken, FillSession};
pub use status::{FillEvent, FillOutcome, FillReport, SessionState};
pub use volume::VolumeProfile;
