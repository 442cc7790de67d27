//! Fill command: hardware assembly, progress display, and the result line.

use eyre::WrapErr;
use std::io::Write;
use std::sync::Arc;
use vend_core::conversions::flow_poll_interval;
use vend_core::util::{PROGRESS_SEGMENTS, render_progress_bar};
use vend_core::{Dispenser, FillObserver, FillReport, HardwareMode, HardwarePlatform, PinAssignment};

/// Prints the segment bar on one console line; silent in JSON mode.
struct ProgressPrinter {
    label: &'static str,
    json: bool,
}

impl FillObserver for ProgressPrinter {
    fn on_progress(&self, percent: u8) {
        if self.json {
            return;
        }
        let bar = render_progress_bar(percent, PROGRESS_SEGMENTS);
        let mut out = std::io::stdout().lock();
        let _ = write!(out, "\rFilling {}: {bar} {percent:>3}%", self.label);
        let _ = out.flush();
    }

    fn on_finished(&self, _report: &FillReport) {
        if !self.json {
            println!();
        }
    }
}

pub fn platform_for(simulate: bool) -> HardwarePlatform {
    if simulate {
        HardwarePlatform::simulated()
    } else {
        HardwarePlatform::detect()
    }
}

/// Run one fill to a terminal outcome. Ctrl-C cancels the session cooperatively.
pub fn run_fill(
    cfg: &vend_config::Config,
    volume: &str,
    simulate: bool,
    json: bool,
) -> eyre::Result<(FillReport, HardwareMode)> {
    let platform = platform_for(simulate);
    let pins = PinAssignment::from(&cfg.hardware);
    let controller = platform
        .controller(pins, flow_poll_interval(&cfg.hardware))
        .wrap_err("set up fill hardware")?;
    let mode = controller.mode();

    let target = vend_core::VolumeProfile::require(volume)?;
    let observer = Arc::new(ProgressPrinter {
        label: target.display_name,
        json,
    });
    let dispenser = Dispenser::new(Arc::new(controller), (&cfg.fill).into(), observer);
    dispenser.select_volume(volume)?;
    dispenser.start_fill()?;

    if let Some(token) = dispenser.cancel_token()
        && let Err(e) = ctrlc::set_handler(move || token.cancel())
    {
        tracing::warn!(error = %e, "failed to install Ctrl-C handler; fill cannot be interrupted");
    }

    let report = dispenser
        .wait()
        .ok_or_else(|| eyre::eyre!("fill worker ended without a report"))?;
    dispenser.cleanup();
    Ok((report, mode))
}

/// One JSON line describing the finished session.
pub fn result_line(report: &FillReport, mode: HardwareMode) -> String {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    serde_json::json!({
        "timestamp": timestamp,
        "volume": report.volume.name,
        "price": report.volume.price,
        "target_pulses": report.volume.pulses,
        "pulses": report.pulses,
        "progress": report.progress,
        "duration_ms": u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
        "outcome": report.outcome.as_str(),
        "error": report.error,
        "simulated": mode == HardwareMode::Simulated,
    })
    .to_string()
}

/// Human summary for a completed fill.
pub fn summary(report: &FillReport) -> String {
    format!(
        "Filling completed: {} ({} pulses, {})",
        report.volume.display_name, report.pulses, report.volume.price
    )
}
