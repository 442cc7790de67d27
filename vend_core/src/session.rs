//! One dispense, from motor start to motor stop.
//!
//! A session subscribes to flow pulses (real mode) or credits a fixed number of
//! pulses per tick (simulated mode), reports progress after every increment and
//! ends in exactly one terminal outcome. The motor is stopped exactly once on
//! every exit path, including panics, through `MotorGuard`.

use crate::config::FillCfg;
use crate::controller::HardwareController;
use crate::error::Result;
use crate::status::{FillEvent, FillOutcome, FillReport};
use crate::util::progress_percent;
use crate::volume::VolumeProfile;
use crossbeam_channel as xch;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{error, info, warn};
use vend_traits::clock::{Clock, MonotonicClock};

/// Cooperative stop signal shared between the caller and a running session.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Stops the motor once: explicitly through `stop`, otherwise on drop.
struct MotorGuard<'a> {
    controller: &'a HardwareController,
    armed: bool,
}

impl<'a> MotorGuard<'a> {
    fn new(controller: &'a HardwareController) -> Self {
        Self {
            controller,
            armed: true,
        }
    }

    fn stop(mut self) -> Result<()> {
        self.armed = false;
        self.controller.stop_motor()
    }
}

impl Drop for MotorGuard<'_> {
    fn drop(&mut self) {
        if self.armed
            && let Err(e) = self.controller.stop_motor()
        {
            error!(error = %e, "motor stop during unwind failed");
        }
    }
}

pub struct FillSession {
    controller: Arc<HardwareController>,
    target: &'static VolumeProfile,
    cfg: FillCfg,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl std::fmt::Debug for FillSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FillSession")
            .field("target", &self.target.name)
            .field("cfg", &self.cfg)
            .finish()
    }
}

enum Step {
    Continue,
    Done(FillOutcome, Option<String>),
}

impl FillSession {
    pub fn new(
        controller: Arc<HardwareController>,
        target: &'static VolumeProfile,
        cfg: FillCfg,
    ) -> Self {
        Self {
            controller,
            target,
            cfg,
            clock: Arc::new(MonotonicClock::new()),
        }
    }

    /// Build for a catalog entry by name; an unknown name is rejected here.
    pub fn for_volume(
        controller: Arc<HardwareController>,
        name: &str,
        cfg: FillCfg,
    ) -> Result<Self> {
        let target = VolumeProfile::require(name)?;
        Ok(Self::new(controller, target, cfg))
    }

    /// Replace the time source (deterministic ticking in tests).
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    pub fn target(&self) -> &'static VolumeProfile {
        self.target
    }

    /// Run to a terminal outcome on the calling thread.
    ///
    /// `on_event` receives every progress update in non-decreasing order,
    /// then exactly one `Finished` after the motor has been stopped.
    pub fn run(self, cancel: &CancelToken, mut on_event: impl FnMut(FillEvent)) -> FillReport {
        let started = self.clock.now();
        let mut pulses: u32 = 0;
        let mut progress: u8 = 0;

        let guard = MotorGuard::new(&self.controller);
        let (outcome, mut detail) =
            self.drive(started, cancel, &mut pulses, &mut progress, &mut on_event);

        if let Err(e) = guard.stop() {
            error!(error = %e, "motor stop failed at end of session");
            detail.get_or_insert_with(|| e.to_string());
        }

        let report = FillReport {
            volume: self.target,
            outcome,
            pulses,
            progress,
            elapsed: self.clock.now().saturating_duration_since(started),
            error: detail,
        };
        match outcome {
            FillOutcome::Completed => {
                info!(volume = self.target.name, pulses, elapsed = ?report.elapsed, "filling completed");
            }
            FillOutcome::Cancelled => info!(volume = self.target.name, pulses, "filling cancelled"),
            FillOutcome::TimedOut => {
                warn!(volume = self.target.name, pulses, "filling timeout reached")
            }
            FillOutcome::MotorError | FillOutcome::FlowSensorError => {
                error!(volume = self.target.name, outcome = %outcome, error = ?report.error, "filling aborted");
            }
        }
        on_event(FillEvent::Finished(report.clone()));
        report
    }

    fn drive(
        &self,
        started: Instant,
        cancel: &CancelToken,
        pulses: &mut u32,
        progress: &mut u8,
        on_event: &mut impl FnMut(FillEvent),
    ) -> (FillOutcome, Option<String>) {
        let simulated = self.controller.is_simulated();

        // Subscribe before the motor runs so a dead flow input never pumps blind.
        let (tx, rx) = xch::unbounded::<()>();
        let _subscription = if simulated {
            drop(tx);
            None
        } else {
            match self.controller.subscribe_flow_events(move || {
                let _ = tx.send(());
            }) {
                Ok(sub) => Some(sub),
                Err(e) => return (FillOutcome::FlowSensorError, Some(e.to_string())),
            }
        };

        if let Err(e) = self.controller.start_motor() {
            return (FillOutcome::MotorError, Some(e.to_string()));
        }
        info!(
            volume = self.target.name,
            target_pulses = self.target.pulses,
            simulated,
            "filling started"
        );

        loop {
            // Wait for one boundary: a tick, or the first pulse of a batch.
            let gained = if simulated {
                self.clock.sleep(self.cfg.tick);
                Ok(1)
            } else {
                match rx.recv_timeout(self.cfg.tick) {
                    Ok(()) => Ok(1 + rx.try_iter().count() as u32),
                    Err(xch::RecvTimeoutError::Timeout) => Ok(0),
                    Err(xch::RecvTimeoutError::Disconnected) => Err("flow subscription lost"),
                }
            };

            if let Some(outcome) = self.interrupted(started, cancel) {
                return (outcome, None);
            }

            let gained = match gained {
                Ok(n) => n,
                Err(msg) => return (FillOutcome::FlowSensorError, Some(msg.into())),
            };
            let step = if simulated { self.cfg.sim_step_pulses } else { 1 };
            for i in 0..gained {
                // Every queued pulse is its own boundary.
                if i > 0
                    && let Some(outcome) = self.interrupted(started, cancel)
                {
                    return (outcome, None);
                }
                if let Step::Done(outcome, detail) = self.credit(step, pulses, progress, on_event) {
                    return (outcome, detail);
                }
            }
        }
    }

    fn interrupted(&self, started: Instant, cancel: &CancelToken) -> Option<FillOutcome> {
        if cancel.is_cancelled() {
            Some(FillOutcome::Cancelled)
        } else if self.clock.now().saturating_duration_since(started) >= self.cfg.timeout {
            Some(FillOutcome::TimedOut)
        } else {
            None
        }
    }

    fn credit(
        &self,
        step: u32,
        pulses: &mut u32,
        progress: &mut u8,
        on_event: &mut impl FnMut(FillEvent),
    ) -> Step {
        *pulses = pulses.saturating_add(step);
        *progress = progress_percent(*pulses, self.target.pulses);
        on_event(FillEvent::Progress(*progress));
        if *pulses >= self.target.pulses {
            Step::Done(FillOutcome::Completed, None)
        } else {
            Step::Continue
        }
    }
}
