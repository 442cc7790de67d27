//! Background flow-pulse polling.
//!
//! Spawns a thread that samples the flow input at a fixed interval and invokes
//! the currently installed pulse callback on every falling edge. The callback
//! is cloned out of its slot before the call, so no lock is held while user
//! code runs.
//!
//! Each `FlowPoller` owns exactly one thread, which is shut down and joined
//! when the poller is dropped.
use crate::controller::SharedGpio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vend_hardware::util::FallingEdge;
use vend_traits::GpioBackend;
use vend_traits::clock::Clock;

pub type PulseCallback = Arc<dyn Fn() + Send + Sync>;

/// Slot holding the active subscriber; the id lets a stale guard tell it no longer owns the slot.
pub(crate) type CallbackSlot = Arc<Mutex<Option<(u64, PulseCallback)>>>;

pub struct FlowPoller {
    pulses: Arc<AtomicU64>,
    /// Shutdown flag for immediate response (atomic for lock-free check)
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl FlowPoller {
    pub(crate) fn spawn<C: Clock + Send + Sync + 'static>(
        gpio: SharedGpio,
        pin: u8,
        initial: bool,
        interval: Duration,
        slot: CallbackSlot,
        clock: C,
    ) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let pulses = Arc::new(AtomicU64::new(0));
        let pulses_clone = pulses.clone();

        let join_handle = std::thread::spawn(move || {
            let mut edge = FallingEdge::new();
            // Prime with the registration probe so the next sample can complete a pulse.
            edge.update(initial);
            let mut read_failing = false;
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!(pin, "flow poller received shutdown signal");
                    break;
                }

                // Hold the pin lock only for the read itself.
                let sample = match gpio.lock() {
                    Ok(mut g) => g.read(pin).map_err(|e| e.to_string()),
                    Err(_) => Err("gpio lock poisoned".to_string()),
                };

                match sample {
                    Ok(high) => {
                        read_failing = false;
                        if edge.update(high) {
                            pulses_clone.fetch_add(1, Ordering::Relaxed);
                            let cb = slot
                                .lock()
                                .ok()
                                .and_then(|s| s.as_ref().map(|(_, cb)| cb.clone()));
                            if let Some(cb) = cb {
                                cb();
                            }
                        }
                    }
                    Err(e) => {
                        if !read_failing {
                            tracing::warn!(pin, error = %e, "flow pin read failed");
                        }
                        read_failing = true;
                        edge.reset();
                    }
                }

                clock.sleep(interval);
            }
            tracing::trace!(pin, "flow poller exiting cleanly");
        });

        Self {
            pulses,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Falling edges seen since the poller started, subscribed or not.
    pub fn total_pulses(&self) -> u64 {
        self.pulses.load(Ordering::Relaxed)
    }
}

impl Drop for FlowPoller {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        // The thread exits within one poll interval.
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => {
                    tracing::trace!("flow poller joined successfully");
                }
                Err(e) => {
                    tracing::warn!(?e, "flow poller panicked during shutdown");
                }
            }
        }
    }
}
