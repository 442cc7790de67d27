use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel as xch;
use vend_core::mocks::{FakeTransport, RecordingSink, ScriptedSensor};
use vend_core::{ApiClient, ApiEndpoint, MonitorCfg, RetryPolicy, SensorMonitor, SensorReading};
use vend_traits::{ManualClock, WaterQuality};

fn q(ph: f64, tds: f64, level: f64) -> WaterQuality {
    WaterQuality {
        ph,
        tds,
        water_level: level,
    }
}

fn collect(monitor: &mut SensorMonitor, cycles: usize) -> Vec<SensorReading> {
    let mut out = Vec::new();
    for _ in 0..cycles {
        monitor.poll_once(&mut |r| out.push(r));
    }
    out
}

#[test]
fn failure_before_any_success_emits_error_marker() {
    let sensor = ScriptedSensor::new([Err("i2c nack".to_string())]);
    let mut m = SensorMonitor::new(Box::new(sensor));
    let out = collect(&mut m, 1);
    assert_eq!(out, vec![SensorReading::error_marker()]);
    assert!(out[0].error && !out[0].stale);
    assert_eq!((out[0].ph, out[0].tds, out[0].water_level), (0.0, 0.0, 0.0));
    assert!(m.last_good().is_none());
}

#[test]
fn failure_after_success_replays_last_good_as_stale() {
    let sensor = ScriptedSensor::new([
        Ok(q(7.1, 140.0, 75.0)),
        Err("timeout".to_string()),
        Err("timeout".to_string()),
        Ok(q(6.9, 150.0, 70.0)),
    ]);
    let sink = RecordingSink::new();
    let mut m = SensorMonitor::new(Box::new(sensor)).with_sink(Arc::new(sink.clone()));
    let out = collect(&mut m, 4);

    let good = SensorReading::from(q(7.1, 140.0, 75.0));
    assert_eq!(out[0], good);
    assert_eq!(
        out[1],
        SensorReading {
            stale: true,
            ..good
        }
    );
    assert_eq!(out[2], out[1]);
    assert!(!out[3].stale && !out[3].error);
    assert_eq!(m.last_good(), Some(out[3]));

    // Only fresh readings are forwarded.
    let records = sink.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].tds_level, 140.0);
    assert_eq!(records[1].ph_level, 6.9);
}

#[test]
fn telemetry_failure_does_not_affect_readings() {
    let sensor = ScriptedSensor::new([Ok(q(7.0, 150.0, 80.0)), Ok(q(7.0, 151.0, 80.0))]);
    let sink = RecordingSink::failing();
    let mut m = SensorMonitor::new(Box::new(sensor)).with_sink(Arc::new(sink.clone()));
    let out = collect(&mut m, 2);
    assert!(out.iter().all(|r| !r.stale && !r.error));
    assert_eq!(sink.records().len(), 2);
}

#[test]
fn exhausted_api_client_is_a_warning_only() {
    let transport = FakeTransport::always(Ok(500));
    let api = ApiClient::with_transport(
        ApiEndpoint::default(),
        RetryPolicy {
            delay: Duration::ZERO,
            ..RetryPolicy::default()
        },
        Box::new(transport.clone()),
    );
    let sensor = ScriptedSensor::new([Ok(q(7.0, 150.0, 80.0))]);
    let mut m = SensorMonitor::new(Box::new(sensor)).with_sink(Arc::new(api));
    let out = collect(&mut m, 1);
    assert_eq!(out.len(), 1);
    assert!(!out[0].error);
    assert_eq!(transport.calls(), 3);
}

#[test]
fn background_loop_emits_in_order_and_stops_on_cleanup() {
    let script = (0..5).map(|i| Ok(q(7.0, 100.0 + f64::from(i), 80.0)));
    let sensor = ScriptedSensor::new(script);
    let probe = sensor.clone();
    let clock = ManualClock::new();
    let (tx, rx) = xch::unbounded();

    let mut handle = SensorMonitor::new(Box::new(sensor)).spawn(
        &MonitorCfg {
            interval: Duration::from_secs(2),
        },
        clock.clone(),
        move |r| {
            let _ = tx.send(r);
        },
    );
    assert!(handle.is_active());

    let first: Vec<SensorReading> = (0..5)
        .map(|_| rx.recv_timeout(Duration::from_secs(5)).expect("reading"))
        .collect();
    let tds: Vec<f64> = first.iter().map(|r| r.tds).collect();
    assert_eq!(tds, vec![100.0, 101.0, 102.0, 103.0, 104.0]);

    // Script exhausted: the loop keeps going with stale replays.
    let next = rx.recv_timeout(Duration::from_secs(5)).expect("stale reading");
    assert!(next.stale);
    assert_eq!(next.tds, 104.0);

    handle.cleanup();
    assert!(!handle.is_active());
    let reads = probe.reads();
    assert!(handle.cycles() >= 6);
    assert!(clock.elapsed() >= Duration::from_secs(12));
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(probe.reads(), reads);
}
