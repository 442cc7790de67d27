#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the vending kiosk.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - A missing config file is replaced by the defaults, written atomically.
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Highest BCM pin number on the 40-pin header.
pub const MAX_BCM_PIN: u8 = 27;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiCfg {
    /// Backend root, without the trailing `/api`.
    pub base_url: String,
    pub machine_id: String,
    /// Per-attempt request timeout (seconds).
    pub timeout_s: u64,
    pub retry_attempts: u32,
    /// Fixed delay between attempts (seconds).
    pub retry_delay_s: u64,
}

impl Default for ApiCfg {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            machine_id: "VM001".into(),
            timeout_s: 5,
            retry_attempts: 3,
            retry_delay_s: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HardwareCfg {
    pub flow_sensor_pin: u8,
    pub motor_pin: u8,
    /// Address of the networked sensor board.
    pub esp32_ip: String,
    pub esp32_port: u16,
    /// Sampling interval of the flow input (ms).
    pub flow_poll_ms: u64,
}

impl Default for HardwareCfg {
    fn default() -> Self {
        Self {
            flow_sensor_pin: 20,
            motor_pin: 21,
            esp32_ip: "192.168.137.82".into(),
            esp32_port: 80,
            flow_poll_ms: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppCfg {
    /// Optional JSON-lines log file.
    pub log_file: Option<String>,
    /// "error" | "warn" | "info" | "debug" | "trace"
    pub log_level: String,
    /// Sensor polling interval (seconds).
    pub update_interval_s: u64,
}

impl Default for AppCfg {
    fn default() -> Self {
        Self {
            log_file: Some("vending_machine.log".into()),
            log_level: "info".into(),
            update_interval_s: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FillCfg {
    /// Absolute limit for one dispense (ms).
    pub timeout_ms: u64,
    /// Loop tick; also the simulated flow increment period (ms).
    pub tick_ms: u64,
    /// Pulses credited per tick when running without hardware.
    pub sim_step_pulses: u32,
}

impl Default for FillCfg {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            tick_ms: 100,
            sim_step_pulses: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiCfg,
    pub hardware: HardwareCfg,
    pub app: AppCfg,
    pub fill: FillCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Load the config at `path`, writing the defaults there first if the file is missing.
pub fn load_or_create(path: &Path) -> eyre::Result<Config> {
    if !path.exists() {
        let cfg = Config::default();
        let text = toml::to_string_pretty(&cfg)
            .map_err(|e| eyre::eyre!("serialize default config: {e}"))?;
        write_atomic(path, text.as_bytes())
            .map_err(|e| eyre::eyre!("write default config {:?}: {}", path, e))?;
        tracing::info!(path = %path.display(), "wrote default config");
        return Ok(cfg);
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {:?}: {}", path, e))?;
    Ok(cfg)
}

/// Write via a sibling temp file and rename so readers never see a partial file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    let tmp = path.with_extension("new");
    {
        let mut f = std::fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    std::fs::rename(tmp, path)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Api
        if self.api.base_url.trim().is_empty() {
            eyre::bail!("api.base_url must not be empty");
        }
        if self.api.machine_id.trim().is_empty() {
            eyre::bail!("api.machine_id must not be empty");
        }
        if self.api.timeout_s == 0 {
            eyre::bail!("api.timeout_s must be >= 1");
        }
        if self.api.retry_attempts == 0 {
            eyre::bail!("api.retry_attempts must be >= 1");
        }

        // Hardware
        if self.hardware.flow_sensor_pin > MAX_BCM_PIN {
            eyre::bail!("hardware.flow_sensor_pin must be <= {MAX_BCM_PIN}");
        }
        if self.hardware.motor_pin > MAX_BCM_PIN {
            eyre::bail!("hardware.motor_pin must be <= {MAX_BCM_PIN}");
        }
        if self.hardware.flow_sensor_pin == self.hardware.motor_pin {
            eyre::bail!("hardware.flow_sensor_pin and hardware.motor_pin must differ");
        }
        if self.hardware.flow_poll_ms == 0 {
            eyre::bail!("hardware.flow_poll_ms must be >= 1");
        }

        // App
        if self.app.update_interval_s == 0 {
            eyre::bail!("app.update_interval_s must be >= 1");
        }

        // Fill
        if self.fill.tick_ms == 0 {
            eyre::bail!("fill.tick_ms must be >= 1");
        }
        if self.fill.timeout_ms < self.fill.tick_ms {
            eyre::bail!("fill.timeout_ms must be >= fill.tick_ms");
        }
        if self.fill.sim_step_pulses == 0 {
            eyre::bail!("fill.sim_step_pulses must be >= 1");
        }

        Ok(())
    }
}
