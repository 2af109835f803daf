use std::path::PathBuf;

use serde::Serialize;

use super::error::{ReadError, ReadResult};
use super::procfs::ProcFs;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum FanMode {
    Auto,
    Manual,
    #[default]
    Unknown,
}

impl FanMode {
    /// `pwm*_enable`: 1 is automatic control, any other integer manual.
    pub fn from_pwm_enable(value: i64) -> Self {
        if value == 1 { FanMode::Auto } else { FanMode::Manual }
    }

    pub fn label(self) -> &'static str {
        match self {
            FanMode::Auto => "auto",
            FanMode::Manual => "manual",
            FanMode::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct SensorReading {
    pub fan_rpm: u64,
    pub fan_mode: FanMode,
    pub temperature_celsius: f32,
}

impl SensorReading {
    pub fn fan_enabled(&self) -> bool {
        self.fan_rpm > 0
    }

    pub fn fan_status(&self) -> &'static str {
        if self.fan_enabled() { "enabled" } else { "disabled" }
    }
}

/// Sensor files relative to the sys root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SensorPaths {
    pub fan_input: PathBuf,
    pub fan_pwm_enable: PathBuf,
    pub thermal: PathBuf,
}

impl Default for SensorPaths {
    fn default() -> Self {
        SensorPaths {
            fan_input: PathBuf::from("class/hwmon/hwmon7/fan1_input"),
            fan_pwm_enable: PathBuf::from("class/hwmon/hwmon7/pwm1_enable"),
            thermal: PathBuf::from("class/thermal/thermal_zone0/temp"),
        }
    }
}

pub fn parse_fan_rpm(text: &str) -> ReadResult<u64> {
    parse_integer("fan1_input", text).map(|v| v.max(0) as u64)
}

pub fn parse_fan_mode(text: &str) -> ReadResult<FanMode> {
    parse_integer("pwm1_enable", text).map(FanMode::from_pwm_enable)
}

/// Millidegrees Celsius to degrees.
pub fn parse_temperature(text: &str) -> ReadResult<f32> {
    parse_integer("thermal", text).map(|milli| milli as f32 / 1000.0)
}

fn parse_integer(source_name: &'static str, text: &str) -> ReadResult<i64> {
    let token = text.trim();
    token
        .parse()
        .map_err(|_| ReadError::parse(source_name, format!("invalid integer {token:?}")))
}

/// Best-effort sensor read. Each value degrades to its zero reading on
/// failure; nothing is propagated.
pub fn read_sensors(procfs: &ProcFs, paths: &SensorPaths) -> SensorReading {
    let fan_rpm = best_effort(
        "fan speed",
        procfs
            .read_sys_value(&paths.fan_input)
            .and_then(|t| parse_fan_rpm(&t)),
    );
    let fan_mode = best_effort(
        "fan mode",
        procfs
            .read_sys_value(&paths.fan_pwm_enable)
            .and_then(|t| parse_fan_mode(&t)),
    );
    let temperature_celsius = best_effort(
        "temperature",
        procfs.read_sys_value(&paths.thermal).and_then(|t| parse_temperature(&t)),
    );

    SensorReading {
        fan_rpm,
        fan_mode,
        temperature_celsius,
    }
}

fn best_effort<T: Default>(what: &str, result: ReadResult<T>) -> T {
    result.unwrap_or_else(|err| {
        tracing::debug!(sensor = what, error = %err, "sensor unavailable");
        T::default()
    })
}
