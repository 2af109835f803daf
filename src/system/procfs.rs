use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::error::{ReadError, ReadResult};
use super::snapshot::{
    CpuSnapshot, MemorySnapshot, NetworkSnapshot, ProcessStat, parse_cpu_stat, parse_meminfo,
    parse_net_dev, parse_process_stat, parse_uptime,
};

/// Pseudo-filesystem roots. Every counter file is addressed relative to one
/// of these so a fixture tree can stand in for the live kernel.
#[derive(Clone, Debug)]
pub struct ProcFs {
    proc_root: PathBuf,
    sys_root: PathBuf,
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new("/proc", "/sys")
    }
}

impl ProcFs {
    pub fn new(proc_root: impl Into<PathBuf>, sys_root: impl Into<PathBuf>) -> Self {
        ProcFs {
            proc_root: proc_root.into(),
            sys_root: sys_root.into(),
        }
    }

    pub fn proc_root(&self) -> &Path {
        &self.proc_root
    }

    pub fn sys_root(&self) -> &Path {
        &self.sys_root
    }

    pub fn read_meminfo(&self) -> ReadResult<MemorySnapshot> {
        parse_meminfo(&self.read_proc("meminfo")?)
    }

    pub fn read_cpu_stat(&self) -> ReadResult<CpuSnapshot> {
        parse_cpu_stat(&self.read_proc("stat")?)
    }

    /// Seconds since boot.
    pub fn read_uptime(&self) -> ReadResult<f64> {
        parse_uptime(&self.read_proc("uptime")?)
    }

    pub fn read_net_dev(&self) -> ReadResult<NetworkSnapshot> {
        parse_net_dev(&self.read_proc("net/dev")?)
    }

    /// Read `<pid>/stat`. A missing file means the process exited after it
    /// was listed, reported as `TransientRace`.
    pub fn read_process_stat(&self, pid: u32) -> ReadResult<ProcessStat> {
        let path = self.proc_root.join(pid.to_string()).join("stat");
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if is_vanished(&err) => return Err(ReadError::TransientRace { pid }),
            Err(source) => return Err(ReadError::SourceUnavailable { path, source }),
        };
        let line = contents.lines().next().unwrap_or_default();
        parse_process_stat(line)
    }

    /// Pids of every numeric directory under the proc root, ascending.
    pub fn list_pids(&self) -> ReadResult<Vec<u32>> {
        let entries = fs::read_dir(&self.proc_root).map_err(|source| {
            ReadError::SourceUnavailable {
                path: self.proc_root.clone(),
                source,
            }
        })?;

        let mut pids: Vec<u32> = entries
            .flatten()
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().to_str()?.parse().ok())
            .collect();
        pids.sort_unstable();
        Ok(pids)
    }

    pub fn count_processes(&self) -> ReadResult<usize> {
        self.list_pids().map(|pids| pids.len())
    }

    /// Read a single-line sysfs value, trimmed.
    pub fn read_sys_value(&self, relative: &Path) -> ReadResult<String> {
        let path = self.sys_root.join(relative);
        let contents = fs::read_to_string(&path)
            .map_err(|source| ReadError::SourceUnavailable { path, source })?;
        Ok(contents.lines().next().unwrap_or_default().trim().to_string())
    }

    fn read_proc(&self, relative: &str) -> ReadResult<String> {
        let path = self.proc_root.join(relative);
        fs::read_to_string(&path).map_err(|source| ReadError::SourceUnavailable { path, source })
    }
}

// ESRCH shows up when the directory still exists but the task is gone.
fn is_vanished(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound || err.raw_os_error() == Some(3)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let proc_root = dir.path().join("proc");
        fs::create_dir_all(proc_root.join("12")).unwrap();
        fs::create_dir_all(proc_root.join("3")).unwrap();
        fs::create_dir_all(proc_root.join("self")).unwrap();
        fs::write(proc_root.join("uptime"), "100.50 200.00\n").unwrap();
        fs::write(
            proc_root.join("12/stat"),
            "12 (worker) S 1 12 12 0 -1 0 0 0 0 0 10 5 0 0 20 0 1 0 500 1000 25\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn lists_only_numeric_directories() {
        let dir = fixture();
        let fs = ProcFs::new(dir.path().join("proc"), dir.path().join("sys"));
        assert_eq!(fs.list_pids().unwrap(), vec![3, 12]);
        assert_eq!(fs.count_processes().unwrap(), 2);
    }

    #[test]
    fn missing_stat_is_transient() {
        let dir = fixture();
        let fs = ProcFs::new(dir.path().join("proc"), dir.path().join("sys"));
        let err = fs.read_process_stat(3).unwrap_err();
        assert!(err.is_transient());
        assert_eq!(fs.read_process_stat(12).unwrap().name, "worker");
    }

    #[test]
    fn missing_global_file_is_source_unavailable() {
        let dir = fixture();
        let fs = ProcFs::new(dir.path().join("proc"), dir.path().join("sys"));
        assert!(matches!(
            fs.read_meminfo(),
            Err(ReadError::SourceUnavailable { .. })
        ));
        assert_eq!(fs.read_uptime().unwrap(), 100.5);
    }
}
