//! Turns raw counter snapshots into the percentages and rates a dashboard
//! displays. Every division here has a defined zero-denominator result.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::platform::PlatformConstants;
use super::snapshot::{CpuSnapshot, MemorySnapshot, NetworkSnapshot, ProcessStat};

/// Which aggregate CPU formula the engine reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuFormula {
    /// `100 × Δ(user+nice+system) / Δtotal`.
    #[default]
    Legacy,
    /// `100 × (1 − Δ(idle+iowait) / Δtotal)`.
    Busy,
}

impl CpuFormula {
    pub fn from_str_config(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "busy" => CpuFormula::Busy,
            _ => CpuFormula::Legacy,
        }
    }

    pub fn apply(self, prev: &CpuSnapshot, curr: &CpuSnapshot) -> f32 {
        match self {
            CpuFormula::Legacy => usage_percent(prev, curr),
            CpuFormula::Busy => busy_percent(prev, curr),
        }
    }
}

fn diff(curr: u64, prev: u64) -> i128 {
    curr as i128 - prev as i128
}

/// Share of elapsed jiffies spent in user, nice and system time.
///
/// The numerator deliberately ignores the `idle` column; two identical
/// snapshots (or a counter reset) give 0.
pub fn usage_percent(prev: &CpuSnapshot, curr: &CpuSnapshot) -> f32 {
    let total_diff = diff(curr.total(), prev.total());
    if total_diff <= 0 {
        return 0.0;
    }
    let active_diff = diff(curr.active(), prev.active());
    (100.0 * active_diff as f64 / total_diff as f64) as f32
}

/// Non-idle share of elapsed jiffies, counting iowait as idle.
pub fn busy_percent(prev: &CpuSnapshot, curr: &CpuSnapshot) -> f32 {
    let total_diff = diff(curr.total(), prev.total());
    if total_diff <= 0 {
        return 0.0;
    }
    let idle_diff = diff(curr.idle_all(), prev.idle_all());
    let busy = 100.0 * (1.0 - idle_diff as f64 / total_diff as f64);
    busy.clamp(0.0, 100.0) as f32
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ProcessCpu {
    pub percent: f64,
    /// False when the process age could not be established (started after
    /// the uptime read, or clock skew); `percent` is then 0.
    pub reliable: bool,
}

/// Lifetime-average CPU share of a process.
pub fn process_cpu(stat: &ProcessStat, uptime_secs: f64, constants: &PlatformConstants) -> ProcessCpu {
    let hertz = constants.clock_ticks_per_second.max(1) as f64;
    let seconds = uptime_secs - stat.starttime as f64 / hertz;
    if seconds <= 0.0 || !seconds.is_finite() {
        return ProcessCpu {
            percent: 0.0,
            reliable: false,
        };
    }
    let busy_seconds = stat.total_time() as f64 / hertz;
    ProcessCpu {
        percent: 100.0 * busy_seconds / seconds,
        reliable: true,
    }
}

/// Resident memory as a share of physical RAM, never above 100.
pub fn process_memory_percent(rss_pages: u64, page_size: u64, total_physical_bytes: u64) -> f64 {
    if total_physical_bytes == 0 {
        return 0.0;
    }
    let memory_bytes = rss_pages as f64 * page_size as f64;
    (100.0 * memory_bytes / total_physical_bytes as f64).min(100.0)
}

/// RAM and swap occupancy derived from one `meminfo` read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct MemoryUsage {
    pub snapshot: MemorySnapshot,
    pub ram_fraction: f32,
    pub swap_fraction: f32,
}

impl MemoryUsage {
    pub fn from_snapshot(snapshot: MemorySnapshot) -> Self {
        MemoryUsage {
            snapshot,
            ram_fraction: fraction(snapshot.used_ram(), snapshot.total_ram),
            swap_fraction: fraction(snapshot.used_swap(), snapshot.total_swap),
        }
    }

    pub fn memory_usage_percent(&self) -> f32 {
        self.ram_fraction * 100.0
    }

    pub fn total_physical_bytes(&self) -> u64 {
        self.snapshot.total_ram.saturating_mul(1024)
    }

    /// "used GiB / total GiB", one decimal.
    pub fn ram_label(&self) -> String {
        let gib = |kib: u64| kib as f64 / 1024.0 / 1024.0;
        format!(
            "{:.1} GiB / {:.1} GiB",
            gib(self.snapshot.used_ram()),
            gib(self.snapshot.total_ram)
        )
    }

    /// "used MiB / total MiB", whole numbers.
    pub fn swap_label(&self) -> String {
        format!(
            "{} MiB / {} MiB",
            self.snapshot.used_swap() / 1024,
            self.snapshot.total_swap / 1024
        )
    }
}

fn fraction(used: u64, total: u64) -> f32 {
    if total == 0 {
        0.0
    } else {
        (used as f64 / total as f64) as f32
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct InterfaceRate {
    pub rx_bytes_per_sec: f64,
    pub tx_bytes_per_sec: f64,
}

/// Per-interface byte rates between two `net/dev` reads. An interface whose
/// counter went backwards (wrap or reset), or that has no previous sample,
/// reports 0 for that direction.
pub fn network_rate(
    prev: &NetworkSnapshot,
    curr: &NetworkSnapshot,
    elapsed: Duration,
) -> BTreeMap<String, InterfaceRate> {
    let secs = elapsed.as_secs_f64();
    let per_sec = |now: u64, before: u64| {
        if secs <= 0.0 || now < before {
            0.0
        } else {
            (now - before) as f64 / secs
        }
    };

    curr.iter()
        .map(|(name, now)| {
            let rate = match prev.get(name) {
                Some(before) => InterfaceRate {
                    rx_bytes_per_sec: per_sec(now.rx.bytes, before.rx.bytes),
                    tx_bytes_per_sec: per_sec(now.tx.bytes, before.tx.bytes),
                },
                None => InterfaceRate::default(),
            };
            (name.clone(), rate)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::snapshot::{InterfaceCounters, RxCounters, TxCounters};

    fn cpu(user: u64, idle: u64) -> CpuSnapshot {
        CpuSnapshot {
            user,
            idle,
            ..CpuSnapshot::default()
        }
    }

    fn stat(total: u64, starttime: u64, rss: u64) -> ProcessStat {
        ProcessStat {
            pid: 1,
            name: "p".into(),
            state: 'S',
            utime: total,
            stime: 0,
            cutime: 0,
            cstime: 0,
            starttime,
            vsize: 0,
            rss,
        }
    }

    #[test]
    fn usage_reference_vector() {
        let prev = cpu(100, 900);
        let curr = cpu(150, 950);
        assert_eq!(usage_percent(&prev, &curr), 50.0);
    }

    #[test]
    fn usage_of_identical_snapshots_is_zero() {
        let snap = cpu(123, 456);
        assert_eq!(usage_percent(&snap, &snap), 0.0);
        assert_eq!(busy_percent(&snap, &snap), 0.0);
    }

    #[test]
    fn saturated_counters_do_not_panic() {
        let snap = CpuSnapshot {
            user: u64::MAX,
            nice: 1,
            idle: u64::MAX,
            iowait: 1,
            ..CpuSnapshot::default()
        };
        assert_eq!(usage_percent(&snap, &snap), 0.0);
        assert_eq!(busy_percent(&snap, &snap), 0.0);

        let huge = MemoryUsage::from_snapshot(MemorySnapshot {
            total_ram: u64::MAX,
            ..MemorySnapshot::default()
        });
        assert_eq!(huge.total_physical_bytes(), u64::MAX);
    }

    #[test]
    fn usage_ignores_idle_column_in_numerator() {
        let prev = CpuSnapshot {
            user: 10,
            iowait: 0,
            idle: 10,
            ..CpuSnapshot::default()
        };
        let curr = CpuSnapshot {
            user: 10,
            iowait: 50,
            idle: 60,
            ..CpuSnapshot::default()
        };
        assert_eq!(usage_percent(&prev, &curr), 0.0);
        assert_eq!(busy_percent(&prev, &curr), 0.0);
    }

    #[test]
    fn busy_counts_irq_time() {
        let prev = CpuSnapshot::default();
        let curr = CpuSnapshot {
            irq: 25,
            idle: 75,
            ..CpuSnapshot::default()
        };
        assert_eq!(usage_percent(&prev, &curr), 0.0);
        assert_eq!(busy_percent(&prev, &curr), 25.0);
    }

    #[test]
    fn counter_reset_is_zero() {
        assert_eq!(usage_percent(&cpu(500, 500), &cpu(1, 1)), 0.0);
    }

    #[test]
    fn process_cpu_lifetime_average() {
        let constants = PlatformConstants {
            clock_ticks_per_second: 100,
            page_size: 4096,
        };
        // Started at 10 s, uptime 20 s, 5 s of CPU → 50 %.
        let result = process_cpu(&stat(500, 1000, 0), 20.0, &constants);
        assert!(result.reliable);
        assert!((result.percent - 50.0).abs() < 1e-9);
    }

    #[test]
    fn process_started_after_uptime_read_is_unreliable() {
        let constants = PlatformConstants::default();
        let result = process_cpu(&stat(10, 5000, 0), 20.0, &constants);
        assert!(!result.reliable);
        assert_eq!(result.percent, 0.0);
    }

    #[test]
    fn memory_percent_uses_pages_and_clamps() {
        // 256 pages × 4096 = 1 MiB of 4 MiB.
        assert_eq!(process_memory_percent(256, 4096, 4 * 1024 * 1024), 25.0);
        assert_eq!(process_memory_percent(u64::MAX / 8192, 4096, 1024), 100.0);
        assert_eq!(process_memory_percent(10, 4096, 0), 0.0);
    }

    #[test]
    fn memory_usage_labels() {
        let usage = MemoryUsage::from_snapshot(MemorySnapshot {
            total_ram: 8 * 1024 * 1024,
            available_ram: 6 * 1024 * 1024,
            total_swap: 2048,
            free_swap: 1024,
        });
        assert_eq!(usage.ram_fraction, 0.25);
        assert_eq!(usage.memory_usage_percent(), 25.0);
        assert_eq!(usage.swap_fraction, 0.5);
        assert_eq!(usage.ram_label(), "2.0 GiB / 8.0 GiB");
        assert_eq!(usage.swap_label(), "1 MiB / 2 MiB");
        assert_eq!(MemoryUsage::from_snapshot(MemorySnapshot::default()).ram_fraction, 0.0);
    }

    #[test]
    fn network_rate_handles_reset_and_new_interfaces() {
        let iface = |rx: u64, tx: u64| InterfaceCounters {
            rx: RxCounters {
                bytes: rx,
                ..RxCounters::default()
            },
            tx: TxCounters {
                bytes: tx,
                ..TxCounters::default()
            },
        };
        let prev = NetworkSnapshot::from([("eth0".to_string(), iface(1000, 5000))]);
        let curr = NetworkSnapshot::from([
            ("eth0".to_string(), iface(3000, 10)),
            ("wlan0".to_string(), iface(99, 99)),
        ]);
        let rates = network_rate(&prev, &curr, Duration::from_secs(2));
        assert_eq!(rates["eth0"].rx_bytes_per_sec, 1000.0);
        assert_eq!(rates["eth0"].tx_bytes_per_sec, 0.0);
        assert_eq!(rates["wlan0"], InterfaceRate::default());

        let stalled = network_rate(&prev, &curr, Duration::ZERO);
        assert_eq!(stalled["eth0"].rx_bytes_per_sec, 0.0);
    }
}
