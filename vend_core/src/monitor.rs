//! Periodic water-quality polling with stale-data fallback.
//!
//! Each cycle reads the sensor link once. A good reading is cached, handed to
//! the display callback and then posted as telemetry; a failed read replays the
//! cached reading marked `stale`, or an `error` marker when nothing has been
//! read yet. Telemetry failures are logged and never stop the loop.

use crate::api::{ApiClient, QualityRecord};
use crate::config::MonitorCfg;
use crate::error::Result;
use crate::hw_error::map_sensor_error;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use tracing::{debug, warn};
use vend_traits::clock::Clock;
use vend_traits::{SensorLink, WaterQuality};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SensorReading {
    pub ph: f64,
    pub tds: f64,
    pub water_level: f64,
    /// Replay of the last good reading; the current read failed.
    pub stale: bool,
    /// No reading has succeeded yet; the values are meaningless.
    pub error: bool,
}

impl SensorReading {
    pub fn error_marker() -> Self {
        Self {
            error: true,
            ..Self::default()
        }
    }
}

impl From<WaterQuality> for SensorReading {
    fn from(q: WaterQuality) -> Self {
        Self {
            ph: q.ph,
            tds: q.tds,
            water_level: q.water_level,
            stale: false,
            error: false,
        }
    }
}

impl From<&SensorReading> for QualityRecord {
    fn from(r: &SensorReading) -> Self {
        Self {
            tds_level: r.tds,
            ph_level: r.ph,
            water_level: r.water_level,
        }
    }
}

/// Where good readings are forwarded.
pub trait TelemetrySink: Send + Sync {
    fn publish(&self, record: &QualityRecord) -> Result<()>;
}

impl TelemetrySink for ApiClient {
    fn publish(&self, record: &QualityRecord) -> Result<()> {
        self.record_quality(record).map(|_| ())
    }
}

pub struct SensorMonitor {
    link: Box<dyn SensorLink>,
    sink: Option<Arc<dyn TelemetrySink>>,
    last_good: Option<SensorReading>,
}

impl std::fmt::Debug for SensorMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorMonitor")
            .field("last_good", &self.last_good)
            .field("telemetry", &self.sink.is_some())
            .finish()
    }
}

impl SensorMonitor {
    pub fn new(link: Box<dyn SensorLink>) -> Self {
        Self {
            link,
            sink: None,
            last_good: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn last_good(&self) -> Option<SensorReading> {
        self.last_good
    }

    /// One read/emit/forward cycle. `emit` runs before the telemetry post.
    pub fn poll_once(&mut self, emit: &mut dyn FnMut(SensorReading)) {
        match self.link.read() {
            Ok(q) => {
                let reading = SensorReading::from(q);
                self.last_good = Some(reading);
                emit(reading);
                if let Some(sink) = &self.sink
                    && let Err(e) = sink.publish(&QualityRecord::from(&reading))
                {
                    warn!(error = %e, "telemetry post failed");
                }
            }
            Err(e) => {
                let err = map_sensor_error(e.as_ref());
                match self.last_good {
                    Some(last) => {
                        debug!(error = %err, "sensor read failed, replaying last good reading");
                        emit(SensorReading { stale: true, ..last });
                    }
                    None => {
                        warn!(error = %err, "sensor read failed, no reading yet");
                        emit(SensorReading::error_marker());
                    }
                }
            }
        }
    }

    /// Run `poll_once` every `cfg.interval` on a background thread.
    pub fn spawn<C, F>(mut self, cfg: &MonitorCfg, clock: C, mut on_reading: F) -> MonitorHandle
    where
        C: Clock + Send + Sync + 'static,
        F: FnMut(SensorReading) + Send + 'static,
    {
        let active = Arc::new(AtomicBool::new(true));
        let active_clone = active.clone();
        let cycles = Arc::new(AtomicU64::new(0));
        let cycles_clone = cycles.clone();
        let interval = cfg.interval;

        let join_handle = std::thread::spawn(move || {
            while active_clone.load(Ordering::Relaxed) {
                self.poll_once(&mut on_reading);
                cycles_clone.fetch_add(1, Ordering::Relaxed);
                clock.sleep(interval);
            }
            tracing::trace!("sensor monitor exiting cleanly");
        });

        MonitorHandle {
            active,
            cycles,
            join_handle: Some(join_handle),
        }
    }
}

/// Owns the monitoring thread; dropping it stops and joins the loop.
pub struct MonitorHandle {
    active: Arc<AtomicBool>,
    cycles: Arc<AtomicU64>,
    join_handle: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    /// Completed read cycles so far.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Clear the active flag; the loop exits after its current sleep.
    pub fn stop(&self) {
        self.active.store(false, Ordering::Relaxed);
    }

    /// Stop and wait for the loop to exit.
    pub fn cleanup(&mut self) {
        self.stop();
        if let Some(handle) = self.join_handle.take()
            && let Err(e) = handle.join()
        {
            warn!(?e, "sensor monitor panicked during shutdown");
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.cleanup();
    }
}
