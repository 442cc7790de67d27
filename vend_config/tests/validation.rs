use rstest::rstest;
use vend_config::{Config, load_or_create, load_toml};

const FULL: &str = r#"
[api]
base_url = "http://backend.local:8000"
machine_id = "VM042"
timeout_s = 3
retry_attempts = 4
retry_delay_s = 2

[hardware]
flow_sensor_pin = 17
motor_pin = 27
esp32_ip = "10.0.0.5"
esp32_port = 8080
flow_poll_ms = 2

[app]
log_level = "debug"
update_interval_s = 5

[fill]
timeout_ms = 20000
tick_ms = 50
sim_step_pulses = 10
"#;

#[test]
fn parses_full_config() {
    let cfg = load_toml(FULL).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.api.machine_id, "VM042");
    assert_eq!(cfg.api.retry_attempts, 4);
    assert_eq!(cfg.hardware.motor_pin, 27);
    assert_eq!(cfg.hardware.esp32_port, 8080);
    assert_eq!(cfg.fill.sim_step_pulses, 10);
}

#[test]
fn empty_document_uses_defaults() {
    let cfg = load_toml("").expect("parse empty");
    cfg.validate().expect("defaults are valid");
    assert_eq!(cfg.api.base_url, "http://localhost:8000");
    assert_eq!(cfg.hardware.flow_sensor_pin, 20);
    assert_eq!(cfg.hardware.motor_pin, 21);
    assert_eq!(cfg.fill.timeout_ms, 30_000);
    assert_eq!(cfg.fill.tick_ms, 100);
    assert_eq!(cfg.fill.sim_step_pulses, 5);
    assert_eq!(cfg.app.update_interval_s, 2);
}

#[rstest]
#[case("[api]\nretry_attempts = 0", "api.retry_attempts")]
#[case("[api]\nbase_url = \"\"", "api.base_url")]
#[case("[api]\ntimeout_s = 0", "api.timeout_s")]
#[case("[hardware]\nflow_sensor_pin = 21", "must differ")]
#[case("[hardware]\nmotor_pin = 40", "hardware.motor_pin")]
#[case("[hardware]\nflow_poll_ms = 0", "hardware.flow_poll_ms")]
#[case("[app]\nupdate_interval_s = 0", "app.update_interval_s")]
#[case("[fill]\ntick_ms = 0", "fill.tick_ms")]
#[case("[fill]\ntimeout_ms = 10\ntick_ms = 100", "fill.timeout_ms")]
#[case("[fill]\nsim_step_pulses = 0", "fill.sim_step_pulses")]
fn rejects_invalid_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(
        format!("{err}").contains(needle),
        "error `{err}` should mention `{needle}`"
    );
}

#[test]
fn missing_file_is_created_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vend_config.toml");
    let cfg = load_or_create(&path).expect("create default");
    assert!(path.exists());
    assert_eq!(cfg.api.machine_id, "VM001");

    // Round-trip through the written file
    let again = load_or_create(&path).expect("reload");
    assert_eq!(again.hardware.esp32_ip, "192.168.137.82");
    assert_eq!(again.app.log_file.as_deref(), Some("vending_machine.log"));
}

#[test]
fn malformed_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[api\nbase_url = 1").unwrap();
    let err = load_or_create(&path).expect_err("should fail");
    assert!(format!("{err}").contains("parse config"));
}

#[test]
fn default_config_is_valid() {
    Config::default().validate().unwrap();
}
