//! Front-end boundary: volume selection, start/cancel, and queued notifications.
//!
//! A `Dispenser` owns one controller and runs at most one `FillSession` on it.
//! Sessions run on a worker thread; their events go through one long-lived
//! dispatcher thread that calls the `FillObserver`, so a slow observer never
//! stalls pulse accounting and notifications from consecutive sessions never
//! interleave. The running state is cleared before `on_finished` is delivered,
//! so an observer may start the next fill from inside the callback.

use crate::config::FillCfg;
use crate::controller::HardwareController;
use crate::error::{KioskError, Result};
use crate::session::{CancelToken, FillSession};
use crate::status::{FillEvent, FillReport, SessionState};
use crate::volume::VolumeProfile;
use crossbeam_channel as xch;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tracing::{debug, info, warn};
use vend_traits::clock::{Clock, MonotonicClock};

/// Receives session notifications on the dispatcher thread.
pub trait FillObserver: Send + Sync {
    fn on_progress(&self, percent: u8);
    fn on_finished(&self, report: &FillReport);
}

enum Dispatch {
    Event(FillEvent),
    // Acknowledged once everything queued before it has been delivered.
    Flush(xch::Sender<()>),
}

fn dispatch_loop(rx: xch::Receiver<Dispatch>, observer: Arc<dyn FillObserver>) {
    for msg in rx.iter() {
        match msg {
            Dispatch::Event(ev) => {
                let delivered = catch_unwind(AssertUnwindSafe(|| match &ev {
                    FillEvent::Progress(p) => observer.on_progress(*p),
                    FillEvent::Finished(report) => observer.on_finished(report),
                }));
                if delivered.is_err() {
                    warn!("fill observer panicked");
                }
            }
            Dispatch::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    debug!("fill dispatcher exiting");
}

struct Active {
    cancel: CancelToken,
    worker: Option<JoinHandle<FillReport>>,
}

#[derive(Default)]
struct Inner {
    selected: Option<&'static VolumeProfile>,
    active: Option<Active>,
}

pub struct Dispenser {
    controller: Arc<HardwareController>,
    cfg: FillCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    // Separate from `inner` so observers can query it from the dispatcher.
    state: Arc<Mutex<SessionState>>,
    inner: Mutex<Inner>,
    events: Option<xch::Sender<Dispatch>>,
    dispatcher: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Dispenser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispenser")
            .field("controller", &self.controller)
            .field("state", &self.state())
            .finish()
    }
}

impl Dispenser {
    pub fn new(
        controller: Arc<HardwareController>,
        cfg: FillCfg,
        observer: Arc<dyn FillObserver>,
    ) -> Self {
        let (tx, rx) = xch::unbounded();
        let dispatcher = std::thread::spawn(move || dispatch_loop(rx, observer));
        Self {
            controller,
            cfg,
            clock: Arc::new(MonotonicClock::new()),
            state: Arc::new(Mutex::new(SessionState::Idle)),
            inner: Mutex::new(Inner::default()),
            events: Some(tx),
            dispatcher: Some(dispatcher),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    pub fn controller(&self) -> &Arc<HardwareController> {
        &self.controller
    }

    /// Pick a catalog entry by name. An empty name clears the selection.
    pub fn select_volume(&self, name: &str) -> Result<()> {
        let selected = if name.is_empty() {
            None
        } else {
            Some(VolumeProfile::require(name)?)
        };
        self.lock_inner()?.selected = selected;
        debug!(volume = name, "volume selected");
        Ok(())
    }

    pub fn selected(&self) -> Option<&'static VolumeProfile> {
        self.inner.lock().ok().and_then(|i| i.selected)
    }

    pub fn state(&self) -> SessionState {
        self.state.lock().map(|s| *s).unwrap_or(SessionState::Idle)
    }

    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Running
    }

    /// Begin a fill for the selected volume.
    ///
    /// Rejected with `SessionAlreadyRunning` while a session is active and with
    /// `NoTargetSelected` when nothing is selected; no session is created then.
    pub fn start_fill(&self) -> Result<()> {
        let events = self.events.clone().ok_or_else(|| {
            eyre::Report::new(KioskError::HardwareFault("dispenser closed".into()))
        })?;
        let mut inner = self.lock_inner()?;
        let target = {
            let mut state = self.state.lock().map_err(|_| {
                eyre::Report::new(KioskError::HardwareFault("state lock poisoned".into()))
            })?;
            if *state == SessionState::Running {
                return Err(eyre::Report::new(KioskError::SessionAlreadyRunning));
            }
            let Some(target) = inner.selected else {
                return Err(eyre::Report::new(KioskError::NoTargetSelected));
            };
            *state = SessionState::Running;
            target
        };
        info!(volume = target.name, price = target.price, "fill accepted");

        let cancel = CancelToken::new();
        let session = FillSession::new(self.controller.clone(), target, self.cfg.clone())
            .with_clock(self.clock.clone());
        let token = cancel.clone();
        let state = self.state.clone();
        let worker = std::thread::spawn(move || {
            session.run(&token, |ev| {
                // Finish and enqueue under the state lock: a new session can only
                // start after this, so its events queue behind ours.
                let _order = match &ev {
                    FillEvent::Finished(report) => state.lock().ok().map(|mut s| {
                        *s = SessionState::Finished(report.outcome);
                        s
                    }),
                    FillEvent::Progress(_) => None,
                };
                let _ = events.send(Dispatch::Event(ev));
            })
        });

        // The previous session has already finished; its worker is left to exit.
        inner.active = Some(Active {
            cancel,
            worker: Some(worker),
        });
        Ok(())
    }

    /// Ask the running session to stop at its next tick or pulse.
    pub fn cancel_fill(&self) {
        if let Ok(inner) = self.inner.lock()
            && let Some(active) = inner.active.as_ref()
        {
            active.cancel.cancel();
        }
    }

    /// A token that cancels the current session (for signal handlers).
    pub fn cancel_token(&self) -> Option<CancelToken> {
        self.inner
            .lock()
            .ok()
            .and_then(|i| i.active.as_ref().map(|a| a.cancel.clone()))
    }

    /// Block until the current session and all its notifications are done.
    ///
    /// Must not be called from inside an observer callback.
    pub fn wait(&self) -> Option<FillReport> {
        let mut active = self.inner.lock().ok().and_then(|mut i| i.active.take())?;
        let report = active.worker.take().and_then(|h| match h.join() {
            Ok(r) => Some(r),
            Err(e) => {
                warn!(?e, "fill worker panicked");
                None
            }
        });
        self.flush();
        report
    }

    /// Cancel any running session, wait for it, and release the controller.
    pub fn cleanup(&self) {
        self.cancel_fill();
        if let Some(report) = self.wait() {
            debug!(outcome = %report.outcome, "session drained during cleanup");
        }
        self.controller.release();
    }

    // Returns once the dispatcher has delivered everything queued so far.
    fn flush(&self) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        let (ack_tx, ack_rx) = xch::bounded(1);
        if events.send(Dispatch::Flush(ack_tx)).is_err() || ack_rx.recv().is_err() {
            warn!("fill dispatcher is gone; notifications may be lost");
        }
    }

    fn lock_inner(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| {
            eyre::Report::new(KioskError::HardwareFault("dispenser lock poisoned".into()))
        })
    }
}

impl Drop for Dispenser {
    fn drop(&mut self) {
        self.cleanup();
        // Closing the queue ends the dispatcher once it has drained.
        self.events = None;
        if let Some(h) = self.dispatcher.take()
            && h.join().is_err()
        {
            warn!("fill dispatcher panicked");
        }
    }
}
