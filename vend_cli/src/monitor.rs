//! Monitor command: periodic sensor readings, optional telemetry.

use crossbeam_channel as xch;
use std::sync::Arc;
use vend_core::{ApiClient, MonitorCfg, PinAssignment, SensorMonitor, SensorReading};
use vend_hardware::PlaceholderSensorLink;
use vend_traits::MonotonicClock;

fn describe(r: &SensorReading) -> String {
    if r.error {
        return "sensor error: no reading yet".to_string();
    }
    let stale = if r.stale { " (stale)" } else { "" };
    format!(
        "pH {:.2} | TDS {:.0} ppm | level {:.0}%{stale}",
        r.ph, r.tds, r.water_level
    )
}

pub fn run_monitor(
    cfg: &vend_config::Config,
    cycles: Option<u64>,
    telemetry: bool,
    json: bool,
) -> eyre::Result<u64> {
    let pins = PinAssignment::from(&cfg.hardware);
    let link = PlaceholderSensorLink::new(pins.remote_sensor.clone());
    let mut monitor = SensorMonitor::new(Box::new(link));
    if telemetry {
        let api = ApiClient::new((&cfg.api).into(), (&cfg.api).into());
        monitor = monitor.with_sink(Arc::new(api));
    }

    let (tx, rx) = xch::unbounded::<SensorReading>();
    let (stop_tx, stop_rx) = xch::bounded::<()>(1);
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    }) {
        tracing::warn!(error = %e, "failed to install Ctrl-C handler");
    }

    let mcfg = MonitorCfg::from(&cfg.app);
    tracing::info!(interval = ?mcfg.interval, telemetry, "sensor monitoring started");
    let mut handle = monitor.spawn(&mcfg, MonotonicClock::new(), move |r| {
        let _ = tx.send(r);
    });

    let mut seen = 0u64;
    loop {
        if cycles.is_some_and(|n| seen >= n) {
            break;
        }
        xch::select! {
            recv(rx) -> msg => {
                let Ok(reading) = msg else { break };
                seen += 1;
                if json {
                    println!("{}", serde_json::to_string(&reading)?);
                } else {
                    println!("{}", describe(&reading));
                }
            }
            recv(stop_rx) -> _ => break,
        }
    }

    handle.cleanup();
    tracing::info!(readings = seen, "sensor monitoring stopped");
    Ok(seen)
}
