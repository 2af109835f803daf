use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::delta::{process_cpu, process_memory_percent};
use super::error::{ReadError, ReadResult};
use super::platform::PlatformConstants;
use super::procfs::ProcFs;
use super::snapshot::ProcessStat;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ProcessState {
    Running,
    Sleeping,
    DiskSleep,
    Zombie,
    Stopped,
    Tracing,
    Dead,
    Idle,
    Unknown(char),
}

impl ProcessState {
    pub fn from_code(code: char) -> Self {
        match code {
            'R' => ProcessState::Running,
            'S' => ProcessState::Sleeping,
            'D' => ProcessState::DiskSleep,
            'Z' => ProcessState::Zombie,
            'T' => ProcessState::Stopped,
            't' => ProcessState::Tracing,
            'X' | 'x' => ProcessState::Dead,
            'I' => ProcessState::Idle,
            other => ProcessState::Unknown(other),
        }
    }

    pub fn code(self) -> char {
        match self {
            ProcessState::Running => 'R',
            ProcessState::Sleeping => 'S',
            ProcessState::DiskSleep => 'D',
            ProcessState::Zombie => 'Z',
            ProcessState::Stopped => 'T',
            ProcessState::Tracing => 't',
            ProcessState::Dead => 'X',
            ProcessState::Idle => 'I',
            ProcessState::Unknown(c) => c,
        }
    }
}

/// One process-table row: raw counters plus the derived percentages.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Proc {
    pub pid: u32,
    pub name: String,
    pub state: ProcessState,
    pub vsize: u64,
    pub rss: u64,
    pub utime: u64,
    pub stime: u64,
    pub cutime: u64,
    pub cstime: u64,
    pub starttime: u64,
    pub cpu_usage: f64,
    /// False when the process age could not be established.
    pub cpu_reliable: bool,
    pub memory_usage: f64,
}

impl Proc {
    pub fn from_stat(
        stat: ProcessStat,
        uptime_secs: f64,
        constants: &PlatformConstants,
        total_physical_bytes: u64,
    ) -> Self {
        let cpu = process_cpu(&stat, uptime_secs, constants);
        let memory_usage = process_memory_percent(stat.rss, constants.page_size, total_physical_bytes);
        Proc {
            pid: stat.pid,
            name: stat.name,
            state: ProcessState::from_code(stat.state),
            vsize: stat.vsize,
            rss: stat.rss,
            utime: stat.utime,
            stime: stat.stime,
            cutime: stat.cutime,
            cstime: stat.cstime,
            starttime: stat.starttime,
            cpu_usage: cpu.percent,
            cpu_reliable: cpu.reliable,
            memory_usage,
        }
    }

    pub fn resident_bytes(&self, page_size: u64) -> u64 {
        self.rss.saturating_mul(page_size)
    }
}

/// Pids that entered and left the table across one replacement.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TableChange {
    pub appeared: Vec<u32>,
    pub vanished: Vec<u32>,
}

impl TableChange {
    pub fn is_empty(&self) -> bool {
        self.appeared.is_empty() && self.vanished.is_empty()
    }
}

/// The current pid → row mapping. Replaced wholesale on every scan; a pid
/// missing from the new scan is simply gone.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ProcessTable {
    processes: BTreeMap<u32, Proc>,
}

impl ProcessTable {
    pub fn from_rows(rows: impl IntoIterator<Item = Proc>) -> Self {
        ProcessTable {
            processes: rows.into_iter().map(|p| (p.pid, p)).collect(),
        }
    }

    pub fn get(&self, pid: u32) -> Option<&Proc> {
        self.processes.get(&pid)
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.processes.contains_key(&pid)
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Rows in ascending pid order.
    pub fn iter(&self) -> impl Iterator<Item = &Proc> {
        self.processes.values()
    }

    pub fn pids(&self) -> impl Iterator<Item = u32> + '_ {
        self.processes.keys().copied()
    }

    /// Swap in `next` and report the set difference against the old table.
    pub fn replace(&mut self, next: ProcessTable) -> TableChange {
        let appeared = next
            .processes
            .keys()
            .filter(|pid| !self.processes.contains_key(*pid))
            .copied()
            .collect();
        let vanished = self
            .processes
            .keys()
            .filter(|pid| !next.processes.contains_key(*pid))
            .copied()
            .collect();
        self.processes = next.processes;
        TableChange { appeared, vanished }
    }

    pub fn filtered<'a>(&'a self, filter: &'a NameFilter) -> impl Iterator<Item = &'a Proc> + 'a {
        self.iter().filter(move |p| filter.passes(&p.name))
    }
}

/// Rows a caller has marked, keyed by pid so the marks survive rebuilds.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pids: BTreeSet<u32>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the mark on `pid`; returns whether it is now selected.
    pub fn toggle(&mut self, pid: u32) -> bool {
        if self.pids.remove(&pid) {
            false
        } else {
            self.pids.insert(pid);
            true
        }
    }

    pub fn is_selected(&self, pid: u32) -> bool {
        self.pids.contains(&pid)
    }

    pub fn clear(&mut self) {
        self.pids.clear();
    }

    pub fn len(&self) -> usize {
        self.pids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }

    /// Selected pids still present in `table`, ascending.
    pub fn present_in<'a>(&'a self, table: &'a ProcessTable) -> impl Iterator<Item = &'a Proc> + 'a {
        self.pids.iter().filter_map(move |pid| table.get(*pid))
    }
}

/// Name filter: comma-separated terms, case-insensitive substring match.
/// A term prefixed with `-` excludes matches. With no include terms every
/// name passes unless excluded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NameFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl NameFilter {
    pub fn new(pattern: &str) -> Self {
        let mut filter = NameFilter::default();
        for term in pattern.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            match term.strip_prefix('-') {
                Some(excluded) if !excluded.is_empty() => filter.exclude.push(excluded.to_lowercase()),
                Some(_) => {}
                None => filter.include.push(term.to_lowercase()),
            }
        }
        filter
    }

    pub fn is_active(&self) -> bool {
        !self.include.is_empty() || !self.exclude.is_empty()
    }

    pub fn passes(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        if self.exclude.iter().any(|term| name.contains(term.as_str())) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|term| name.contains(term.as_str()))
    }
}

/// Result of one pass over the process namespace.
#[derive(Debug, Default)]
pub struct ProcessScan {
    pub table: ProcessTable,
    /// Entries that vanished between listing and read.
    pub vanished_mid_scan: usize,
    /// Entries whose stat line could not be read or parsed.
    pub unreadable: usize,
}

/// Scan every pid once and build a fresh table. Per-entry failures are
/// skipped; only an unreadable namespace or uptime fails the scan.
pub fn scan_processes(
    procfs: &ProcFs,
    constants: &PlatformConstants,
    total_physical_bytes: u64,
) -> ReadResult<ProcessScan> {
    let uptime = procfs.read_uptime()?;
    let pids = procfs.list_pids()?;

    let mut scan = ProcessScan::default();
    let mut rows = Vec::with_capacity(pids.len());
    for pid in pids {
        match procfs.read_process_stat(pid) {
            Ok(stat) => rows.push(Proc::from_stat(stat, uptime, constants, total_physical_bytes)),
            Err(ReadError::TransientRace { pid }) => {
                tracing::trace!(pid, "process exited during scan");
                scan.vanished_mid_scan += 1;
            }
            Err(err) => {
                tracing::debug!(pid, error = %err, "skipping unreadable process");
                scan.unreadable += 1;
            }
        }
    }
    scan.table = ProcessTable::from_rows(rows);
    Ok(scan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pid: u32, name: &str) -> Proc {
        Proc {
            pid,
            name: name.to_string(),
            state: ProcessState::Sleeping,
            vsize: 0,
            rss: 0,
            utime: 0,
            stime: 0,
            cutime: 0,
            cstime: 0,
            starttime: 0,
            cpu_usage: 0.0,
            cpu_reliable: true,
            memory_usage: 0.0,
        }
    }

    #[test]
    fn replace_reports_set_difference() {
        let mut table = ProcessTable::from_rows([row(1, "init"), row(2, "a"), row(3, "b")]);
        let change = table.replace(ProcessTable::from_rows([row(1, "init"), row(3, "b"), row(9, "c")]));
        assert_eq!(change.appeared, vec![9]);
        assert_eq!(change.vanished, vec![2]);
        assert!(!table.contains(2));
        assert_eq!(table.pids().collect::<Vec<_>>(), vec![1, 3, 9]);
    }

    #[test]
    fn selection_survives_rebuild_by_pid() {
        let mut table = ProcessTable::from_rows([row(10, "x"), row(20, "y")]);
        let mut selection = Selection::new();
        assert!(selection.toggle(10));
        assert!(selection.toggle(20));

        table.replace(ProcessTable::from_rows([row(20, "y"), row(30, "z")]));

        assert_eq!(selection.len(), 2);
        let present: Vec<u32> = selection.present_in(&table).map(|p| p.pid).collect();
        assert_eq!(present, vec![20]);

        assert!(!selection.toggle(20));
        assert!(!selection.is_selected(20));
    }

    #[test]
    fn name_filter_terms() {
        let all = NameFilter::new("");
        assert!(!all.is_active());
        assert!(all.passes("anything"));

        let filter = NameFilter::new("Fire, bash ,-kworker");
        assert!(filter.passes("firefox"));
        assert!(filter.passes("bash"));
        assert!(!filter.passes("sshd"));

        let exclude_only = NameFilter::new("-kworker");
        assert!(exclude_only.passes("sshd"));
        assert!(!exclude_only.passes("kworker/0:1"));
    }

    #[test]
    fn filtered_rows_keep_pid_order() {
        let table = ProcessTable::from_rows([row(5, "bash"), row(2, "zsh"), row(1, "bash")]);
        let filter = NameFilter::new("bash");
        let pids: Vec<u32> = table.filtered(&filter).map(|p| p.pid).collect();
        assert_eq!(pids, vec![1, 5]);
    }

    #[test]
    fn state_codes_round_trip_known_letters() {
        for code in ['R', 'S', 'D', 'Z', 'T', 't', 'X', 'I', 'W'] {
            assert_eq!(ProcessState::from_code(code).code(), code);
        }
    }
}
