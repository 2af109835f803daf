use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::system::history::DEFAULT_CAPACITY;
use crate::system::procfs::ProcFs;
use crate::system::sensors::SensorPaths;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub intervals: IntervalsConfig,
    pub history: HistoryConfig,
    pub paths: PathsConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub tick_ms: u64,
    pub output: String,
    pub log_level: String,
    pub log_format: String,
    pub cpu_formula: String,
    pub top_processes: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            tick_ms: 250,
            output: "text".to_string(),
            log_level: "warn".to_string(),
            log_format: "text".to_string(),
            cpu_formula: "legacy".to_string(),
            top_processes: 10,
        }
    }
}

/// Minimum time between reads of each counter family. Zero means every tick.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IntervalsConfig {
    pub memory_ms: u64,
    pub cpu_ms: u64,
    pub process_ms: u64,
    pub network_ms: u64,
    pub sensors_ms: u64,
}

impl Default for IntervalsConfig {
    fn default() -> Self {
        IntervalsConfig {
            memory_ms: 0,
            cpu_ms: 1000,
            process_ms: 1000,
            network_ms: 1000,
            sensors_ms: 1000,
        }
    }
}

impl IntervalsConfig {
    pub fn memory(&self) -> Duration {
        Duration::from_millis(self.memory_ms)
    }

    pub fn cpu(&self) -> Duration {
        Duration::from_millis(self.cpu_ms)
    }

    pub fn process(&self) -> Duration {
        Duration::from_millis(self.process_ms)
    }

    pub fn network(&self) -> Duration {
        Duration::from_millis(self.network_ms)
    }

    pub fn sensors(&self) -> Duration {
        Duration::from_millis(self.sensors_ms)
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        HistoryConfig {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub proc_root: PathBuf,
    pub sys_root: PathBuf,
    /// Sensor files, relative to `sys_root`.
    pub fan_input: PathBuf,
    pub fan_pwm_enable: PathBuf,
    pub thermal: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let sensors = SensorPaths::default();
        PathsConfig {
            proc_root: PathBuf::from("/proc"),
            sys_root: PathBuf::from("/sys"),
            fan_input: sensors.fan_input,
            fan_pwm_enable: sensors.fan_pwm_enable,
            thermal: sensors.thermal,
        }
    }
}

impl PathsConfig {
    pub fn procfs(&self) -> ProcFs {
        ProcFs::new(&self.proc_root, &self.sys_root)
    }

    pub fn sensors(&self) -> SensorPaths {
        SensorPaths {
            fan_input: self.fan_input.clone(),
            fan_pwm_enable: self.fan_pwm_enable.clone(),
            thermal: self.thermal.clone(),
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("sysglance").join("config.toml"))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML in {}: {source}", path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// A loaded config plus the reason it fell back to defaults, if it did.
/// Loading happens before logging is installed, so the fallback is
/// reported separately through [`LoadedConfig::log_fallback`].
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Config,
    pub fallback: Option<ConfigError>,
}

impl LoadedConfig {
    fn from_result(result: Result<Config, ConfigError>) -> Self {
        match result {
            Ok(config) => LoadedConfig {
                config,
                fallback: None,
            },
            Err(err) => LoadedConfig {
                config: Config::default(),
                fallback: Some(err),
            },
        }
    }

    pub fn log_fallback(&self) {
        if let Some(err) = &self.fallback {
            tracing::warn!(error = %err, "invalid config, using defaults");
        }
    }
}

pub fn load_config() -> LoadedConfig {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => LoadedConfig::from_result(Ok(Config::default())),
    }
}

pub fn load_config_from_path(path: &Path) -> LoadedConfig {
    LoadedConfig::from_result(try_load_config_from_path(path))
}

/// A missing file is not an error; it yields the defaults.
pub fn try_load_config_from_path(path: &Path) -> Result<Config, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(source) => {
            return Err(ConfigError::Unreadable {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    toml::from_str(&contents).map_err(|source| ConfigError::Invalid {
        path: path.to_path_buf(),
        source,
    })
}
