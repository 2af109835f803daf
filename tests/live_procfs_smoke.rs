#![cfg(target_os = "linux")]

use std::time::{Duration, Instant};

use sysglance::system::collector::{Collector, CollectorSettings, Refreshed};
use sysglance::system::platform;
use sysglance::system::procfs::ProcFs;

#[test]
fn live_readers_parse_this_host() {
    let procfs = ProcFs::default();
    let mem = procfs.read_meminfo().expect("meminfo readable");
    assert!(mem.total_ram > 0);
    assert!(mem.used_ram() <= mem.total_ram);

    let cpu = procfs.read_cpu_stat().expect("stat readable");
    assert!(cpu.total() > 0);

    assert!(procfs.read_uptime().expect("uptime readable") > 0.0);
    procfs.read_net_dev().expect("net/dev readable");
}

#[test]
fn live_scan_finds_current_process() {
    let settings = CollectorSettings {
        cpu_interval: Duration::ZERO,
        constants: platform::host_constants(),
        ..CollectorSettings::default()
    };
    let mut collector = Collector::new(ProcFs::default(), settings);
    let report = collector.refresh(Instant::now());
    assert_eq!(report.processes, Refreshed::Updated);

    let me = collector
        .processes()
        .get(std::process::id())
        .expect("own pid present in scan");
    assert!(me.memory_usage > 0.0 && me.memory_usage <= 100.0);
    assert!(me.cpu_usage >= 0.0);
}
