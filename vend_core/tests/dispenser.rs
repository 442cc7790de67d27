use std::sync::Arc;
use std::time::Duration;

use vend_core::mocks::{Observed, RecordingObserver, SpyGpio};
use vend_core::{
    Dispenser, FillCfg, FillObserver, FillOutcome, FillReport, HardwareController, HardwareMode,
    KioskError, PinAssignment, SessionState,
};
use vend_traits::ManualClock;

const MOTOR: u8 = 21;
const WAIT: Duration = Duration::from_secs(10);

fn dispenser(spy: &SpyGpio, cfg: FillCfg, observer: Arc<RecordingObserver>) -> Dispenser {
    let c = HardwareController::with_backend(
        Box::new(spy.clone()),
        HardwareMode::Simulated,
        PinAssignment::new(20, MOTOR),
        Duration::from_millis(1),
    );
    c.configure_pins().expect("configure pins");
    Dispenser::new(Arc::new(c), cfg, observer)
}

fn kiosk_error(err: &eyre::Report) -> Option<&KioskError> {
    err.downcast_ref::<KioskError>()
}

/// Ticks in real time so a session stays running while the test pokes at it.
fn slow_cfg() -> FillCfg {
    FillCfg {
        timeout: Duration::from_secs(60),
        tick: Duration::from_millis(20),
        sim_step_pulses: 1,
    }
}

#[test]
fn start_without_selection_is_rejected() {
    let spy = SpyGpio::new();
    let d = dispenser(&spy, FillCfg::default(), RecordingObserver::new());
    let err = d.start_fill().unwrap_err();
    assert_eq!(kiosk_error(&err), Some(&KioskError::NoTargetSelected));
    assert_eq!(d.state(), SessionState::Idle);
    assert_eq!(spy.high_count(MOTOR), 0);
}

#[test]
fn selection_is_validated_and_can_be_cleared() {
    let spy = SpyGpio::new();
    let d = dispenser(&spy, FillCfg::default(), RecordingObserver::new());

    let err = d.select_volume("5 Liter").unwrap_err();
    assert!(matches!(kiosk_error(&err), Some(KioskError::UnknownVolume(_))));
    assert!(d.selected().is_none());

    d.select_volume("350 ml").expect("known volume");
    assert_eq!(d.selected().map(|v| v.pulses), Some(378));

    d.select_volume("").expect("clear");
    assert!(d.selected().is_none());
    assert!(d.start_fill().is_err());
}

#[test]
fn completed_fill_notifies_progress_then_finish() {
    let spy = SpyGpio::new();
    let observer = RecordingObserver::new();
    let d = dispenser(&spy, FillCfg::default(), observer.clone())
        .with_clock(Arc::new(ManualClock::new()));

    d.select_volume("100 ml").expect("select");
    d.start_fill().expect("start");
    let report = d.wait().expect("report");

    assert_eq!(report.outcome, FillOutcome::Completed);
    assert_eq!(d.state(), SessionState::Finished(FillOutcome::Completed));

    let events = observer.events();
    assert_eq!(events.len(), 23);
    assert_eq!(events.last(), Some(&Observed::Finished(FillOutcome::Completed)));
    let progress: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            Observed::Progress(p) => Some(*p),
            Observed::Finished(_) => None,
        })
        .collect();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(progress.last(), Some(&100));
    assert_eq!(spy.high_count(MOTOR), 1);
    assert_eq!(spy.low_count(MOTOR), 1);
}

#[test]
fn second_start_while_running_is_rejected() {
    let spy = SpyGpio::new();
    let observer = RecordingObserver::new();
    let d = dispenser(&spy, slow_cfg(), observer.clone());

    d.select_volume("1 Liter").expect("select");
    d.start_fill().expect("first start");
    assert!(d.is_running());

    let err = d.start_fill().unwrap_err();
    assert_eq!(kiosk_error(&err), Some(&KioskError::SessionAlreadyRunning));

    d.cancel_fill();
    let report = observer.wait_finished(WAIT).expect("finished");
    assert_eq!(report.outcome, FillOutcome::Cancelled);
    assert_eq!(spy.high_count(MOTOR), 1);
    assert_eq!(spy.low_count(MOTOR), 1);
}

#[test]
fn a_new_fill_is_accepted_once_the_previous_one_finished() {
    let spy = SpyGpio::new();
    let observer = RecordingObserver::new();
    let d = dispenser(&spy, FillCfg::default(), observer.clone())
        .with_clock(Arc::new(ManualClock::new()));

    d.select_volume("100 ml").expect("select");
    d.start_fill().expect("first");
    observer.wait_finished(WAIT).expect("first finished");
    d.start_fill().expect("second");
    observer.wait_finished(WAIT).expect("second finished");

    assert_eq!(spy.high_count(MOTOR), 2);
    assert_eq!(spy.low_count(MOTOR), 2);
}

#[test]
fn cancel_token_stops_the_running_session() {
    let spy = SpyGpio::new();
    let observer = RecordingObserver::new();
    let d = dispenser(&spy, slow_cfg(), observer.clone());

    assert!(d.cancel_token().is_none());
    d.select_volume("600 ml").expect("select");
    d.start_fill().expect("start");
    d.cancel_token().expect("token").cancel();

    let report = d.wait().expect("report");
    assert_eq!(report.outcome, FillOutcome::Cancelled);
    assert_eq!(d.state(), SessionState::Finished(FillOutcome::Cancelled));
    assert_eq!(
        observer.events().last(),
        Some(&Observed::Finished(FillOutcome::Cancelled))
    );
}

#[test]
fn cleanup_cancels_waits_and_releases() {
    let spy = SpyGpio::new();
    let observer = RecordingObserver::new();
    let d = dispenser(&spy, slow_cfg(), observer.clone());

    d.select_volume("1 Liter").expect("select");
    d.start_fill().expect("start");
    d.cleanup();

    assert!(d.controller().is_released());
    assert!(!d.controller().motor_running());
    assert_eq!(d.state(), SessionState::Finished(FillOutcome::Cancelled));
    assert_eq!(spy.low_count(MOTOR), 1);
    // Cleanup is safe to repeat (Drop runs it again).
    d.cleanup();
}

#[test]
fn back_to_back_fills_never_interleave_notifications() {
    let spy = SpyGpio::new();
    let observer = RecordingObserver::with_finish_delay(Duration::from_millis(50));
    let d = dispenser(&spy, FillCfg::default(), observer.clone())
        .with_clock(Arc::new(ManualClock::new()));

    d.select_volume("100 ml").expect("select");
    d.start_fill().expect("first");
    // Restart the moment the state flips, while `on_finished` is still pending.
    let deadline = std::time::Instant::now() + WAIT;
    while d.is_running() {
        assert!(std::time::Instant::now() < deadline, "first fill never finished");
        std::thread::yield_now();
    }
    d.start_fill().expect("second");
    d.wait().expect("second report");

    let events = observer.events();
    assert_eq!(events.len(), 46);
    assert_eq!(events[22], Observed::Finished(FillOutcome::Completed));
    assert_eq!(events[45], Observed::Finished(FillOutcome::Completed));
    assert!(
        events[..22]
            .iter()
            .chain(&events[23..45])
            .all(|e| matches!(e, Observed::Progress(_)))
    );
}

/// Panics on every progress update; forwards completions.
struct PanickyObserver(Arc<RecordingObserver>);

impl FillObserver for PanickyObserver {
    fn on_progress(&self, _percent: u8) {
        panic!("observer bug");
    }

    fn on_finished(&self, report: &FillReport) {
        self.0.on_finished(report);
    }
}

#[test]
fn panicking_observer_does_not_stop_later_notifications() {
    let spy = SpyGpio::new();
    let recorder = RecordingObserver::new();
    let c = HardwareController::with_backend(
        Box::new(spy.clone()),
        HardwareMode::Simulated,
        PinAssignment::new(20, MOTOR),
        Duration::from_millis(1),
    );
    c.configure_pins().expect("configure pins");
    let d = Dispenser::new(
        Arc::new(c),
        FillCfg::default(),
        Arc::new(PanickyObserver(recorder.clone())),
    )
    .with_clock(Arc::new(ManualClock::new()));

    d.select_volume("100 ml").expect("select");
    d.start_fill().expect("first");
    d.wait().expect("first report");
    d.start_fill().expect("second");
    d.wait().expect("second report");

    assert_eq!(
        recorder.events(),
        vec![
            Observed::Finished(FillOutcome::Completed),
            Observed::Finished(FillOutcome::Completed),
        ]
    );
}
