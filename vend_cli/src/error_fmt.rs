//! Human-readable error descriptions, structured JSON errors, and exit codes.

use vend_core::error::KioskError;
use vend_core::{FillOutcome, FillReport};

/// Stable variant name for JSON output.
pub fn kiosk_error_name(e: &KioskError) -> &'static str {
    match e {
        KioskError::HardwareInitFailure(_) => "HardwareInitFailure",
        KioskError::HardwareFault(_) => "HardwareFault",
        KioskError::NoTargetSelected => "NoTargetSelected",
        KioskError::SessionAlreadyRunning => "SessionAlreadyRunning",
        KioskError::UnknownVolume(_) => "UnknownVolume",
        KioskError::FlowCallbackRegistrationFailed(_) => "FlowCallbackRegistrationFailed",
        KioskError::RequestExhausted { .. } => "RequestExhausted",
        KioskError::Transport(_) => "Transport",
        KioskError::Serialize(_) => "Serialize",
        KioskError::SensorReadFailure(_) => "SensorReadFailure",
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(ke) = err.downcast_ref::<KioskError>() {
        return match ke {
            KioskError::UnknownVolume(name) => format!(
                "What happened: Unknown volume {name:?}.\nLikely causes: The name does not match a catalog entry exactly.\nHow to fix: Run `vend_cli volumes` and pass one of the listed names, e.g. --volume \"350 ml\"."
            ),
            KioskError::NoTargetSelected => {
                "What happened: No volume was selected.\nLikely causes: The fill was started before a size was chosen.\nHow to fix: Pass --volume with a catalog name.".to_string()
            }
            KioskError::SessionAlreadyRunning => {
                "What happened: A fill is already running.\nLikely causes: A second start was issued before the first fill finished.\nHow to fix: Wait for the running fill to finish or cancel it first.".to_string()
            }
            KioskError::HardwareInitFailure(msg) | KioskError::HardwareFault(msg) => format!(
                "What happened: GPIO operation failed ({msg}).\nLikely causes: Wrong pin numbers, missing GPIO permissions, or a wiring fault.\nHow to fix: Check [hardware] pins in the config and that the process may access /dev/gpiomem."
            ),
            KioskError::FlowCallbackRegistrationFailed(msg) => format!(
                "What happened: The flow sensor could not be read ({msg}).\nLikely causes: Flow sensor unplugged or wrong flow_sensor_pin.\nHow to fix: Check the sensor wiring and [hardware].flow_sensor_pin."
            ),
            KioskError::RequestExhausted { attempts } => format!(
                "What happened: The backend did not accept the request after {attempts} attempts.\nLikely causes: Backend down, wrong base_url, or network unavailable.\nHow to fix: Check [api].base_url and connectivity; raise retry_attempts if the link is flaky."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from config loading
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("invalid configuration") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: Out-of-range or missing values in the TOML.\nHow to fix: Edit the config file, then rerun. Delete it to regenerate defaults."
        );
    }

    if lower.contains("parse config") || lower.contains("read config") {
        return format!(
            "What happened: The config file could not be loaded ({msg}).\nLikely causes: TOML syntax error or unreadable file.\nHow to fix: Fix the file or delete it so defaults are written again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Explanation for a fill that ended without completing.
pub fn humanize_outcome(report: &FillReport) -> String {
    let detail = report.error.as_deref().unwrap_or("none");
    match report.outcome {
        FillOutcome::Completed => format!("Filling completed: {}", report.volume.display_name),
        FillOutcome::Cancelled => format!(
            "What happened: Filling was cancelled at {}%.\nLikely causes: Ctrl-C or a cancel request.\nHow to fix: Start a new fill when ready.",
            report.progress
        ),
        FillOutcome::TimedOut => format!(
            "What happened: Filling timeout reached at {}% ({} of {} pulses).\nLikely causes: Empty tank, blocked line, or pump not running.\nHow to fix: Check the water supply and pump, or raise [fill].timeout_ms.",
            report.progress, report.pulses, report.volume.pulses
        ),
        FillOutcome::MotorError => format!(
            "What happened: The pump motor could not be driven ({detail}).\nLikely causes: Wrong motor_pin or a relay/driver fault.\nHow to fix: Check [hardware].motor_pin and the relay wiring."
        ),
        FillOutcome::FlowSensorError => format!(
            "What happened: Flow pulses could not be received ({detail}).\nLikely causes: Flow sensor unplugged or wrong flow_sensor_pin.\nHow to fix: Check the sensor wiring and [hardware].flow_sensor_pin."
        ),
    }
}

/// Stable exit codes per fill outcome.
pub fn exit_code_for_outcome(outcome: FillOutcome) -> i32 {
    match outcome {
        FillOutcome::Completed => 0,
        FillOutcome::Cancelled => 2,
        FillOutcome::TimedOut => 3,
        FillOutcome::MotorError => 4,
        FillOutcome::FlowSensorError => 5,
    }
}

/// Errors that never reached a fill outcome exit with 1.
pub fn exit_code_for_error(_err: &eyre::Report) -> i32 {
    1
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let reason = err
        .downcast_ref::<KioskError>()
        .map_or("Error", kiosk_error_name);
    json!({ "reason": reason, "message": humanize(err) }).to_string()
}

/// Structured JSON for a fill that did not complete.
pub fn format_outcome_json(report: &FillReport) -> String {
    serde_json::json!({
        "reason": report.outcome.as_str(),
        "message": humanize_outcome(report),
    })
    .to_string()
}
