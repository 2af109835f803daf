use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::Config;

use super::delta::{CpuFormula, InterfaceRate, MemoryUsage, network_rate};
use super::error::ReadResult;
use super::history::{DEFAULT_CAPACITY, RollingHistory};
use super::platform::{self, PlatformConstants};
use super::process::{ProcessTable, TableChange, scan_processes};
use super::procfs::ProcFs;
use super::scheduler::Throttle;
use super::sensors::{SensorPaths, SensorReading, read_sensors};
use super::snapshot::{CpuSnapshot, NetworkSnapshot};

#[derive(Clone, Debug)]
pub struct CollectorSettings {
    pub memory_interval: Duration,
    pub cpu_interval: Duration,
    pub process_interval: Duration,
    pub network_interval: Duration,
    pub sensors_interval: Duration,
    pub history_capacity: usize,
    pub cpu_formula: CpuFormula,
    pub sensor_paths: SensorPaths,
    pub constants: PlatformConstants,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        CollectorSettings {
            memory_interval: Duration::ZERO,
            cpu_interval: Duration::from_secs(1),
            process_interval: Duration::from_secs(1),
            network_interval: Duration::from_secs(1),
            sensors_interval: Duration::from_secs(1),
            history_capacity: DEFAULT_CAPACITY,
            cpu_formula: CpuFormula::default(),
            sensor_paths: SensorPaths::default(),
            constants: PlatformConstants::default(),
        }
    }
}

impl CollectorSettings {
    pub fn from_config(config: &Config) -> Self {
        CollectorSettings {
            memory_interval: config.intervals.memory(),
            cpu_interval: config.intervals.cpu(),
            process_interval: config.intervals.process(),
            network_interval: config.intervals.network(),
            sensors_interval: config.intervals.sensors(),
            history_capacity: config.history.capacity,
            cpu_formula: CpuFormula::from_str_config(&config.general.cpu_formula),
            sensor_paths: config.paths.sensors(),
            constants: platform::host_constants(),
        }
    }
}

/// What happened to one counter family during a refresh.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum Refreshed {
    #[default]
    NotDue,
    Updated,
    /// The read failed; the previous value is still displayed.
    Failed,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct RefreshReport {
    pub memory: Refreshed,
    pub cpu: Refreshed,
    pub processes: Refreshed,
    pub network: Refreshed,
    pub sensors: Refreshed,
    pub process_change: Option<TableChange>,
}

/// Sampling engine. Owns the previous-snapshot slots, the current process
/// table and the rolling histories; each instance is independent.
pub struct Collector {
    procfs: ProcFs,
    settings: CollectorSettings,

    memory_throttle: Throttle,
    cpu_throttle: Throttle,
    process_throttle: Throttle,
    network_throttle: Throttle,
    sensors_throttle: Throttle,

    prev_cpu: Option<CpuSnapshot>,
    prev_network_at: Option<Instant>,
    process_scan_failed: bool,
    network_read_failed: bool,

    memory: Option<MemoryUsage>,
    cpu_usage_percent: Option<f32>,
    processes: ProcessTable,
    network: NetworkSnapshot,
    network_rates: BTreeMap<String, InterfaceRate>,
    sensors: SensorReading,

    cpu_history: RollingHistory,
    fan_history: RollingHistory,
    thermal_history: RollingHistory,
}

impl Collector {
    pub fn new(procfs: ProcFs, settings: CollectorSettings) -> Self {
        let capacity = settings.history_capacity;
        Collector {
            memory_throttle: Throttle::new(settings.memory_interval),
            cpu_throttle: Throttle::new(settings.cpu_interval),
            process_throttle: Throttle::new(settings.process_interval),
            network_throttle: Throttle::new(settings.network_interval),
            sensors_throttle: Throttle::new(settings.sensors_interval),
            procfs,
            settings,
            prev_cpu: None,
            prev_network_at: None,
            process_scan_failed: false,
            network_read_failed: false,
            memory: None,
            cpu_usage_percent: None,
            processes: ProcessTable::default(),
            network: NetworkSnapshot::new(),
            network_rates: BTreeMap::new(),
            sensors: SensorReading::default(),
            cpu_history: RollingHistory::new(capacity),
            fan_history: RollingHistory::new(capacity),
            thermal_history: RollingHistory::new(capacity),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.paths.procfs(), CollectorSettings::from_config(config))
    }

    pub fn settings(&self) -> &CollectorSettings {
        &self.settings
    }

    /// Run every family whose throttle is due, in order memory, cpu,
    /// processes, network, sensors.
    pub fn refresh(&mut self, now: Instant) -> RefreshReport {
        let _refresh_span = tracing::debug_span!("collector.refresh").entered();

        let mut report = RefreshReport::default();

        if self.memory_throttle.try_claim(now) {
            report.memory = self.refresh_memory();
        }
        if self.cpu_throttle.try_claim(now) {
            report.cpu = self.refresh_cpu();
        }
        // An empty table is always due, as on the very first call, unless
        // the last attempt failed: a broken source waits out its interval.
        if self.processes.is_empty() && !self.process_scan_failed {
            self.process_throttle.reset();
        }
        if self.process_throttle.try_claim(now) {
            let (outcome, change) = self.refresh_processes();
            self.process_scan_failed = outcome == Refreshed::Failed;
            report.processes = outcome;
            report.process_change = change;
        }
        if self.network.is_empty() && !self.network_read_failed {
            self.network_throttle.reset();
        }
        if self.network_throttle.try_claim(now) {
            report.network = self.refresh_network(now);
            self.network_read_failed = report.network == Refreshed::Failed;
        }
        if self.sensors_throttle.try_claim(now) {
            report.sensors = self.refresh_sensors();
        }

        tracing::trace!(?report, "refresh complete");
        report
    }

    fn refresh_memory(&mut self) -> Refreshed {
        record("memory", self.procfs.read_meminfo(), |snapshot| {
            self.memory = Some(MemoryUsage::from_snapshot(snapshot));
        })
    }

    fn refresh_cpu(&mut self) -> Refreshed {
        let formula = self.settings.cpu_formula;
        record("cpu", self.procfs.read_cpu_stat(), |curr| {
            // The first sample only primes the previous slot.
            if let Some(prev) = &self.prev_cpu {
                let usage = formula.apply(prev, &curr);
                self.cpu_usage_percent = Some(usage);
                self.cpu_history.push(usage);
            }
            self.prev_cpu = Some(curr);
        })
    }

    fn refresh_processes(&mut self) -> (Refreshed, Option<TableChange>) {
        let total_physical_bytes = self
            .memory
            .map(|m| m.total_physical_bytes())
            .unwrap_or_default();
        let scan = scan_processes(&self.procfs, &self.settings.constants, total_physical_bytes);

        let mut change = None;
        let outcome = record("processes", scan, |scan| {
            if scan.vanished_mid_scan > 0 || scan.unreadable > 0 {
                tracing::debug!(
                    vanished = scan.vanished_mid_scan,
                    unreadable = scan.unreadable,
                    "process entries skipped"
                );
            }
            change = Some(self.processes.replace(scan.table));
        });
        (outcome, change)
    }

    fn refresh_network(&mut self, now: Instant) -> Refreshed {
        record("network", self.procfs.read_net_dev(), |curr| {
            if let Some(prev_at) = self.prev_network_at {
                let elapsed = now.saturating_duration_since(prev_at);
                self.network_rates = network_rate(&self.network, &curr, elapsed);
            }
            self.network = curr;
            self.prev_network_at = Some(now);
        })
    }

    fn refresh_sensors(&mut self) -> Refreshed {
        let reading = read_sensors(&self.procfs, &self.settings.sensor_paths);
        self.fan_history.push(reading.fan_rpm as f32);
        self.thermal_history.push(reading.temperature_celsius);
        self.sensors = reading;
        Refreshed::Updated
    }

    pub fn memory(&self) -> Option<&MemoryUsage> {
        self.memory.as_ref()
    }

    /// Aggregate CPU usage; `None` until two samples have been taken.
    pub fn cpu_usage_percent(&self) -> Option<f32> {
        self.cpu_usage_percent
    }

    pub fn last_cpu_snapshot(&self) -> Option<&CpuSnapshot> {
        self.prev_cpu.as_ref()
    }

    pub fn processes(&self) -> &ProcessTable {
        &self.processes
    }

    pub fn network(&self) -> &NetworkSnapshot {
        &self.network
    }

    pub fn network_rates(&self) -> &BTreeMap<String, InterfaceRate> {
        &self.network_rates
    }

    pub fn sensors(&self) -> &SensorReading {
        &self.sensors
    }

    pub fn cpu_history(&self) -> &RollingHistory {
        &self.cpu_history
    }

    pub fn fan_history(&self) -> &RollingHistory {
        &self.fan_history
    }

    pub fn thermal_history(&self) -> &RollingHistory {
        &self.thermal_history
    }

    pub fn constants(&self) -> &PlatformConstants {
        &self.settings.constants
    }

    pub fn procfs(&self) -> &ProcFs {
        &self.procfs
    }
}

// Apply a successful read, or log the failure and leave state untouched.
fn record<T>(family: &'static str, result: ReadResult<T>, apply: impl FnOnce(T)) -> Refreshed {
    match result {
        Ok(value) => {
            apply(value);
            Refreshed::Updated
        }
        Err(err) => {
            tracing::warn!(family, error = %err, "refresh failed, keeping previous value");
            Refreshed::Failed
        }
    }
}
