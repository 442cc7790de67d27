//! Test doubles for the kiosk core.
//!
//! All doubles are cheap to clone; clones share state, so a test keeps one
//! handle for assertions and gives the other to the code under test.

use crate::api::{HttpRequest, HttpResponse, QualityRecord, Transport};
use crate::dispenser::FillObserver;
use crate::error::{KioskError, Result};
use crate::monitor::TelemetrySink;
use crate::status::{FillOutcome, FillReport};
use crossbeam_channel as xch;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vend_traits::{BoxError, GpioBackend, SensorLink, WaterQuality};

#[derive(Debug, Default)]
struct SpyState {
    levels: HashMap<u8, bool>,
    high_calls: HashMap<u8, usize>,
    low_calls: HashMap<u8, usize>,
    scripts: HashMap<u8, VecDeque<bool>>,
    fail_set_high: bool,
    fail_set_low: bool,
    fail_reads: bool,
}

/// GPIO spy: counts every set-high/set-low per pin, replays scripted input
/// levels, and can be told to fail writes or reads.
#[derive(Debug, Clone, Default)]
pub struct SpyGpio {
    state: Arc<Mutex<SpyState>>,
}

impl SpyGpio {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut SpyState) -> R) -> R {
        let mut g = match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut g)
    }

    pub fn fail_set_high(&self, fail: bool) {
        self.with(|s| s.fail_set_high = fail);
    }

    pub fn fail_set_low(&self, fail: bool) {
        self.with(|s| s.fail_set_low = fail);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.with(|s| s.fail_reads = fail);
    }

    /// Queue input levels for `pin`; once drained, reads return the last level.
    pub fn script_input(&self, pin: u8, levels: impl IntoIterator<Item = bool>) {
        self.with(|s| s.scripts.entry(pin).or_default().extend(levels));
    }

    /// Queue `n` full pulses (high, low) followed by a resting high.
    pub fn script_pulses(&self, pin: u8, n: usize) {
        let levels = std::iter::repeat_n([true, false], n).flatten().chain([true]);
        self.script_input(pin, levels);
    }

    pub fn script_drained(&self, pin: u8) -> bool {
        self.with(|s| s.scripts.get(&pin).is_none_or(VecDeque::is_empty))
    }

    pub fn high_count(&self, pin: u8) -> usize {
        self.with(|s| s.high_calls.get(&pin).copied().unwrap_or(0))
    }

    pub fn low_count(&self, pin: u8) -> usize {
        self.with(|s| s.low_calls.get(&pin).copied().unwrap_or(0))
    }

    pub fn level(&self, pin: u8) -> Option<bool> {
        self.with(|s| s.levels.get(&pin).copied())
    }
}

impl GpioBackend for SpyGpio {
    fn configure_input_pullup(&mut self, pin: u8) -> std::result::Result<(), BoxError> {
        self.with(|s| s.levels.insert(pin, true));
        Ok(())
    }

    fn configure_output(&mut self, pin: u8) -> std::result::Result<(), BoxError> {
        self.with(|s| s.levels.insert(pin, false));
        Ok(())
    }

    fn set_high(&mut self, pin: u8) -> std::result::Result<(), BoxError> {
        self.with(|s| -> std::result::Result<(), BoxError> {
            *s.high_calls.entry(pin).or_default() += 1;
            if s.fail_set_high {
                return Err("spy: set_high failure".into());
            }
            s.levels.insert(pin, true);
            Ok(())
        })
    }

    fn set_low(&mut self, pin: u8) -> std::result::Result<(), BoxError> {
        self.with(|s| -> std::result::Result<(), BoxError> {
            *s.low_calls.entry(pin).or_default() += 1;
            if s.fail_set_low {
                return Err("spy: set_low failure".into());
            }
            s.levels.insert(pin, false);
            Ok(())
        })
    }

    fn read(&mut self, pin: u8) -> std::result::Result<bool, BoxError> {
        self.with(|s| -> std::result::Result<bool, BoxError> {
            if s.fail_reads {
                return Err("spy: read failure".into());
            }
            if let Some(level) = s.scripts.get_mut(&pin).and_then(VecDeque::pop_front) {
                s.levels.insert(pin, level);
            }
            Ok(s.levels.get(&pin).copied().unwrap_or(true))
        })
    }
}

/// Sensor link that replays a fixed script, then keeps failing.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSensor {
    script: Arc<Mutex<VecDeque<std::result::Result<WaterQuality, String>>>>,
    reads: Arc<AtomicUsize>,
}

impl ScriptedSensor {
    pub fn new(
        script: impl IntoIterator<Item = std::result::Result<WaterQuality, String>>,
    ) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

impl SensorLink for ScriptedSensor {
    fn read(&mut self) -> std::result::Result<WaterQuality, BoxError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(Ok(q)) => Ok(q),
            Some(Err(msg)) => Err(msg.into()),
            None => Err("sensor script exhausted".into()),
        }
    }
}

/// Scripted HTTP transport; `Ok(status)` answers, `Err` is a connection failure.
#[derive(Debug, Clone, Default)]
pub struct FakeTransport {
    script: Arc<Mutex<VecDeque<std::result::Result<u16, String>>>>,
    fallback: Option<std::result::Result<u16, String>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
    body: Vec<u8>,
}

impl FakeTransport {
    pub fn new(script: impl IntoIterator<Item = std::result::Result<u16, String>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            ..Self::default()
        }
    }

    /// Answer every call the same way.
    pub fn always(result: std::result::Result<u16, String>) -> Self {
        Self {
            fallback: Some(result),
            ..Self::default()
        }
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl Transport for FakeTransport {
    fn execute(&self, req: &HttpRequest) -> std::result::Result<HttpResponse, BoxError> {
        if let Ok(mut r) = self.requests.lock() {
            r.push(req.clone());
        }
        let next = self
            .script
            .lock()
            .ok()
            .and_then(|mut s| s.pop_front())
            .or_else(|| self.fallback.clone())
            .unwrap_or_else(|| Err("transport script exhausted".into()));
        match next {
            Ok(status) => Ok(HttpResponse {
                status,
                body: self.body.clone(),
            }),
            Err(msg) => Err(msg.into()),
        }
    }
}

/// Telemetry sink that keeps everything it is given.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    records: Arc<Mutex<Vec<QualityRecord>>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record, then report every publish as exhausted.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<QualityRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl TelemetrySink for RecordingSink {
    fn publish(&self, record: &QualityRecord) -> Result<()> {
        if let Ok(mut r) = self.records.lock() {
            r.push(*record);
        }
        if self.fail {
            return Err(eyre::Report::new(KioskError::RequestExhausted { attempts: 3 }));
        }
        Ok(())
    }
}

/// What a `RecordingObserver` saw, in delivery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observed {
    Progress(u8),
    Finished(FillOutcome),
}

/// Fill observer that records notifications and lets a test wait for the end.
#[derive(Debug)]
pub struct RecordingObserver {
    events: Mutex<Vec<Observed>>,
    // Stalls `on_finished` like a slow UI thread would.
    finish_delay: Duration,
    finished_tx: xch::Sender<FillReport>,
    finished_rx: xch::Receiver<FillReport>,
}

impl Default for RecordingObserver {
    fn default() -> Self {
        let (finished_tx, finished_rx) = xch::unbounded();
        Self {
            events: Mutex::new(Vec::new()),
            finish_delay: Duration::ZERO,
            finished_tx,
            finished_rx,
        }
    }
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Sleep for `delay` before recording each `on_finished`.
    pub fn with_finish_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            finish_delay: delay,
            ..Self::default()
        })
    }

    pub fn events(&self) -> Vec<Observed> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Block until the next `on_finished`, or give up after `timeout`.
    pub fn wait_finished(&self, timeout: Duration) -> Option<FillReport> {
        self.finished_rx.recv_timeout(timeout).ok()
    }
}

impl FillObserver for RecordingObserver {
    fn on_progress(&self, percent: u8) {
        if let Ok(mut e) = self.events.lock() {
            e.push(Observed::Progress(percent));
        }
    }

    fn on_finished(&self, report: &FillReport) {
        if !self.finish_delay.is_zero() {
            std::thread::sleep(self.finish_delay);
        }
        if let Ok(mut e) = self.events.lock() {
            e.push(Observed::Finished(report.outcome));
        }
        let _ = self.finished_tx.send(report.clone());
    }
}
