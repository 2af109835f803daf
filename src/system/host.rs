use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

use serde::Serialize;
use sysinfo::{Disks, Networks, System};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Usage of the filesystem mounted at `/`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct DiskUsage {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub fraction: f32,
}

impl DiskUsage {
    pub fn from_totals(total_bytes: u64, available_bytes: u64) -> Self {
        let used_bytes = total_bytes.saturating_sub(available_bytes);
        let fraction = if total_bytes == 0 {
            0.0
        } else {
            (used_bytes as f64 / total_bytes as f64) as f32
        };
        DiskUsage {
            total_bytes,
            used_bytes,
            fraction,
        }
    }

    /// Whole GiB, rounded up: "used GiB / total GiB".
    pub fn label(&self) -> String {
        format!(
            "{:.0} GiB / {:.0} GiB",
            (self.used_bytes as f64 / GIB).ceil(),
            (self.total_bytes as f64 / GIB).ceil()
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Ipv4Entry {
    pub interface: String,
    pub address: Ipv4Addr,
}

/// Static-ish facts about the machine, gathered once at start-up.
#[derive(Clone, Debug, Default, Serialize)]
pub struct HostInfo {
    pub hostname: Option<String>,
    pub user: Option<String>,
    pub os_name: String,
    pub os_version: Option<String>,
    pub cpu_brand: Option<String>,
    pub disk: Option<DiskUsage>,
    pub ipv4: Vec<Ipv4Entry>,
}

impl HostInfo {
    pub fn collect() -> Self {
        let _span = tracing::debug_span!("host.collect").entered();

        let mut sys = System::new();
        sys.refresh_cpu_all();
        let cpu_brand = sys
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .filter(|brand| !brand.is_empty());

        HostInfo {
            hostname: System::host_name(),
            user: logged_in_user(),
            os_name: System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
            os_version: System::long_os_version(),
            cpu_brand,
            disk: root_disk_usage(),
            ipv4: ipv4_addresses(),
        }
    }
}

fn logged_in_user() -> Option<String> {
    ["USER", "LOGNAME"]
        .iter()
        .find_map(|key| std::env::var(key).ok())
        .filter(|user| !user.is_empty())
}

/// Used space is `total - available`, so blocks reserved for root count as
/// used; sysinfo exposes no separate free-block figure.
fn root_disk_usage() -> Option<DiskUsage> {
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .find(|disk| disk.mount_point() == Path::new("/"))
        .map(|disk| DiskUsage::from_totals(disk.total_space(), disk.available_space()))
}

fn ipv4_addresses() -> Vec<Ipv4Entry> {
    let networks = Networks::new_with_refreshed_list();
    let mut entries: Vec<Ipv4Entry> = networks
        .list()
        .iter()
        .flat_map(|(name, data)| {
            data.ip_networks().iter().filter_map(move |net| match net.addr {
                IpAddr::V4(address) => Some(Ipv4Entry {
                    interface: name.clone(),
                    address,
                }),
                IpAddr::V6(_) => None,
            })
        })
        .collect();
    entries.sort_by(|a, b| a.interface.cmp(&b.interface).then(a.address.cmp(&b.address)));
    entries
}
