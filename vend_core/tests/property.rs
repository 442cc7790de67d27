use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use vend_core::mocks::SpyGpio;
use vend_core::util::ticks_to_target;
use vend_core::volume::CATALOG;
use vend_core::{
    CancelToken, FillCfg, FillEvent, FillOutcome, FillSession, HardwareController, HardwareMode,
    PinAssignment,
};
use vend_traits::ManualClock;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // Every catalog entry completes at 100% in ceil(target/step) ticks, with
    // non-decreasing progress and exactly one start and one stop.
    #[test]
    fn simulated_fill_always_completes(idx in 0usize..CATALOG.len(), step in 1u32..=50) {
        let target = &CATALOG[idx];
        let spy = SpyGpio::new();
        let ctl = HardwareController::with_backend(
            Box::new(spy.clone()),
            HardwareMode::Simulated,
            PinAssignment::new(20, 21),
            Duration::from_millis(1),
        );
        ctl.configure_pins().expect("configure pins");
        let cfg = FillCfg {
            timeout: Duration::from_secs(3600),
            tick: Duration::from_millis(100),
            sim_step_pulses: step,
        };
        let clock = ManualClock::new();
        let mut progress = Vec::new();
        let mut finished = 0;

        let report = FillSession::new(Arc::new(ctl), target, cfg)
            .with_clock(Arc::new(clock.clone()))
            .run(&CancelToken::new(), |ev| match ev {
                FillEvent::Progress(p) => progress.push(p),
                FillEvent::Finished(_) => finished += 1,
            });

        prop_assert_eq!(report.outcome, FillOutcome::Completed);
        prop_assert_eq!(report.progress, 100);
        prop_assert!(report.pulses >= target.pulses);
        prop_assert!(report.pulses - target.pulses < step);
        prop_assert_eq!(clock.sleep_count(), u64::from(ticks_to_target(target.pulses, step)));
        prop_assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        prop_assert_eq!(finished, 1);
        prop_assert_eq!(spy.high_count(21), 1);
        prop_assert_eq!(spy.low_count(21), 1);
    }

    // Whatever the deadline, a session that cannot finish in time times out
    // with the motor stopped.
    #[test]
    fn short_deadline_always_times_out(ticks in 1u64..40) {
        let spy = SpyGpio::new();
        let ctl = HardwareController::with_backend(
            Box::new(spy.clone()),
            HardwareMode::Simulated,
            PinAssignment::new(20, 21),
            Duration::from_millis(1),
        );
        let cfg = FillCfg {
            timeout: Duration::from_millis(100 * ticks),
            tick: Duration::from_millis(100),
            sim_step_pulses: 1,
        };
        let target = &CATALOG[CATALOG.len() - 1];

        let report = FillSession::new(Arc::new(ctl), target, cfg)
            .with_clock(Arc::new(ManualClock::new()))
            .run(&CancelToken::new(), |_| {});

        prop_assert_eq!(report.outcome, FillOutcome::TimedOut);
        prop_assert_eq!(u64::from(report.pulses), ticks - 1);
        prop_assert_eq!(spy.low_count(21), 1);
        prop_assert_eq!(spy.level(21), Some(false));
    }
}
