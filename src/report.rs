use std::collections::BTreeMap;
use std::fmt::Write;

use serde::Serialize;

use crate::format::{format_rate, format_scaled, network_bar_fraction, truncate_unicode};
use crate::system::collector::{Collector, RefreshReport};
use crate::system::delta::{InterfaceRate, MemoryUsage};
use crate::system::host::HostInfo;
use crate::system::process::Proc;
use crate::system::sensors::SensorReading;
use crate::system::snapshot::NetworkSnapshot;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_str_config(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

/// Read-only view of everything the engine currently displays.
#[derive(Serialize)]
pub struct DashboardView<'a> {
    pub tick: u64,
    pub host: &'a HostInfo,
    pub refresh: &'a RefreshReport,
    pub memory: Option<&'a MemoryUsage>,
    pub cpu_usage_percent: Option<f32>,
    pub process_count: usize,
    pub top_processes: Vec<&'a Proc>,
    pub network: &'a NetworkSnapshot,
    pub network_rates: &'a BTreeMap<String, InterfaceRate>,
    pub sensors: &'a SensorReading,
    pub cpu_history: Vec<f32>,
}

impl<'a> DashboardView<'a> {
    pub fn new(
        tick: u64,
        host: &'a HostInfo,
        refresh: &'a RefreshReport,
        collector: &'a Collector,
        top: usize,
    ) -> Self {
        DashboardView {
            tick,
            host,
            refresh,
            memory: collector.memory(),
            cpu_usage_percent: collector.cpu_usage_percent(),
            process_count: collector.processes().len(),
            top_processes: top_by_cpu(collector, top),
            network: collector.network(),
            network_rates: collector.network_rates(),
            sensors: collector.sensors(),
            cpu_history: collector.cpu_history().chronological().collect(),
        }
    }

    pub fn render(&self, format: OutputFormat) -> serde_json::Result<String> {
        match format {
            OutputFormat::Json => serde_json::to_string(self),
            OutputFormat::Text => Ok(self.render_text()),
        }
    }

    fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "== tick {} | {} | {} ==",
            self.tick,
            self.host.hostname.as_deref().unwrap_or("unknown host"),
            self.host.os_name
        );

        match self.cpu_usage_percent {
            Some(usage) => {
                let _ = writeln!(out, "CPU     {usage:6.2}%");
            }
            None => {
                let _ = writeln!(out, "CPU     (sampling)");
            }
        }
        if let Some(memory) = self.memory {
            let _ = writeln!(
                out,
                "RAM     {:6.2}%  {}",
                memory.ram_fraction * 100.0,
                memory.ram_label()
            );
            let _ = writeln!(
                out,
                "Swap    {:6.2}%  {}",
                memory.swap_fraction * 100.0,
                memory.swap_label()
            );
        }
        if let Some(disk) = &self.host.disk {
            let _ = writeln!(out, "Disk    {:6.2}%  {}", disk.fraction * 100.0, disk.label());
        }
        let _ = writeln!(
            out,
            "Fan     {} ({}) {} RPM | Temp {:.1} °C",
            self.sensors.fan_status(),
            self.sensors.fan_mode.label(),
            self.sensors.fan_rpm,
            self.sensors.temperature_celsius
        );

        for (name, counters) in self.network {
            let rate = self.network_rates.get(name).copied().unwrap_or_default();
            let _ = writeln!(
                out,
                "{:<8}RX {:>12} ({:>3.0}%) {:>14} | TX {:>12} ({:>3.0}%) {:>14}",
                truncate_unicode(name, 7),
                format_scaled(counters.rx.bytes),
                network_bar_fraction(counters.rx.bytes) * 100.0,
                format_rate(rate.rx_bytes_per_sec),
                format_scaled(counters.tx.bytes),
                network_bar_fraction(counters.tx.bytes) * 100.0,
                format_rate(rate.tx_bytes_per_sec),
            );
        }

        let _ = writeln!(out, "Processes: {}", self.process_count);
        for proc in &self.top_processes {
            let _ = writeln!(
                out,
                "  {:>7} {:<16} {} {:6.2}% cpu {:6.2}% mem",
                proc.pid,
                truncate_unicode(&proc.name, 16),
                proc.state.code(),
                proc.cpu_usage,
                proc.memory_usage
            );
        }
        out
    }
}

fn top_by_cpu(collector: &Collector, top: usize) -> Vec<&Proc> {
    let mut rows: Vec<&Proc> = collector.processes().iter().collect();
    rows.sort_by(|a, b| {
        b.cpu_usage
            .partial_cmp(&a.cpu_usage)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.pid.cmp(&b.pid))
    });
    rows.truncate(top);
    rows
}
