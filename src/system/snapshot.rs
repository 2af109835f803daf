//! Typed point-in-time reads of the kernel counter families and the pure
//! parsers that build them from pseudo-file text.

use std::collections::BTreeMap;

use serde::Serialize;

use super::error::{ReadError, ReadResult};

/// System memory counters in kibibytes, as reported by `meminfo`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MemorySnapshot {
    pub total_ram: u64,
    pub available_ram: u64,
    pub total_swap: u64,
    pub free_swap: u64,
}

impl MemorySnapshot {
    pub fn used_ram(&self) -> u64 {
        self.total_ram.saturating_sub(self.available_ram)
    }

    pub fn used_swap(&self) -> u64 {
        self.total_swap.saturating_sub(self.free_swap)
    }
}

/// Aggregate CPU jiffies since boot, from the first line of `stat`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CpuSnapshot {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
    pub guest: u64,
    pub guest_nice: u64,
}

impl CpuSnapshot {
    pub const FIELD_COUNT: usize = 10;

    /// Sum of all ten counters. Parsed snapshots never overflow here;
    /// hand-built ones saturate.
    pub fn total(&self) -> u64 {
        self.fields().iter().fold(0u64, |acc, &v| acc.saturating_add(v))
    }

    /// user + nice + system: the share the legacy usage formula tracks.
    pub fn active(&self) -> u64 {
        self.user.saturating_add(self.nice).saturating_add(self.system)
    }

    /// idle + iowait: the share the busy formula treats as idle.
    pub fn idle_all(&self) -> u64 {
        self.idle.saturating_add(self.iowait)
    }

    fn fields(&self) -> [u64; Self::FIELD_COUNT] {
        [
            self.user,
            self.nice,
            self.system,
            self.idle,
            self.iowait,
            self.irq,
            self.softirq,
            self.steal,
            self.guest,
            self.guest_nice,
        ]
    }

    fn from_fields(f: [u64; Self::FIELD_COUNT]) -> Self {
        CpuSnapshot {
            user: f[0],
            nice: f[1],
            system: f[2],
            idle: f[3],
            iowait: f[4],
            irq: f[5],
            softirq: f[6],
            steal: f[7],
            guest: f[8],
            guest_nice: f[9],
        }
    }
}

/// Positions of the consumed fields in a per-process `stat` line (0-based,
/// counting `pid` as 0 and the parenthesised command name as 1).
pub mod stat_field {
    pub const PID: usize = 0;
    pub const NAME: usize = 1;
    pub const STATE: usize = 2;
    pub const UTIME: usize = 13;
    pub const STIME: usize = 14;
    pub const CUTIME: usize = 15;
    pub const CSTIME: usize = 16;
    pub const STARTTIME: usize = 21;
    pub const VSIZE: usize = 22;
    /// Resident set size, in pages.
    pub const RSS: usize = 23;
}

/// One process's raw counters from `<pid>/stat`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProcessStat {
    pub pid: u32,
    pub name: String,
    pub state: char,
    pub utime: u64,
    pub stime: u64,
    pub cutime: u64,
    pub cstime: u64,
    pub starttime: u64,
    pub vsize: u64,
    pub rss: u64,
}

impl ProcessStat {
    /// utime + stime + cutime + cstime, in jiffies.
    pub fn total_time(&self) -> u64 {
        self.utime + self.stime + self.cutime + self.cstime
    }
}

/// Receive counters in `net/dev` column order. Columns 6-8 carry the
/// colls/carrier/compressed names; the transmit side differs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RxCounters {
    pub bytes: u64,
    pub packets: u64,
    pub errs: u64,
    pub drop: u64,
    pub fifo: u64,
    pub colls: u64,
    pub carrier: u64,
    pub compressed: u64,
}

/// Transmit counters in `net/dev` column order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TxCounters {
    pub bytes: u64,
    pub packets: u64,
    pub errs: u64,
    pub drop: u64,
    pub fifo: u64,
    pub frame: u64,
    pub compressed: u64,
    pub multicast: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct InterfaceCounters {
    pub rx: RxCounters,
    pub tx: TxCounters,
}

pub type NetworkSnapshot = BTreeMap<String, InterfaceCounters>;

pub fn parse_meminfo(text: &str) -> ReadResult<MemorySnapshot> {
    let mut total_ram = None;
    let mut available_ram = None;
    let mut total_swap = None;
    let mut free_swap = None;

    for line in text.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let slot = match key.trim() {
            "MemTotal" => &mut total_ram,
            "MemAvailable" => &mut available_ram,
            "SwapTotal" => &mut total_swap,
            "SwapFree" => &mut free_swap,
            _ => continue,
        };
        let value = rest
            .split_whitespace()
            .next()
            .ok_or_else(|| ReadError::parse("meminfo", format!("{key} has no value")))?;
        *slot = Some(parse_u64("meminfo", value)?);

        if total_ram.is_some() && available_ram.is_some() && total_swap.is_some() && free_swap.is_some()
        {
            break;
        }
    }

    let missing = |name: &str| ReadError::parse("meminfo", format!("missing {name}"));
    let snapshot = MemorySnapshot {
        total_ram: total_ram.ok_or_else(|| missing("MemTotal"))?,
        available_ram: available_ram.ok_or_else(|| missing("MemAvailable"))?,
        total_swap: total_swap.ok_or_else(|| missing("SwapTotal"))?,
        free_swap: free_swap.ok_or_else(|| missing("SwapFree"))?,
    };
    // Totals are converted to bytes downstream.
    if snapshot.total_ram.checked_mul(1024).is_none()
        || snapshot.total_swap.checked_mul(1024).is_none()
    {
        return Err(ReadError::parse("meminfo", "total does not fit in bytes"));
    }
    Ok(snapshot)
}

pub fn parse_cpu_stat(text: &str) -> ReadResult<CpuSnapshot> {
    let line = text
        .lines()
        .next()
        .ok_or_else(|| ReadError::parse("stat", "empty file"))?;
    let mut tokens = line.split_whitespace();
    // Aggregate label, normally "cpu".
    tokens
        .next()
        .ok_or_else(|| ReadError::parse("stat", "missing cpu label"))?;

    let mut fields = [0u64; CpuSnapshot::FIELD_COUNT];
    for (i, slot) in fields.iter_mut().enumerate() {
        let token = tokens.next().ok_or_else(|| {
            ReadError::parse(
                "stat",
                format!("expected {} counters, found {i}", CpuSnapshot::FIELD_COUNT),
            )
        })?;
        *slot = parse_u64("stat", token)?;
    }
    if fields.iter().try_fold(0u64, |acc, &v| acc.checked_add(v)).is_none() {
        return Err(ReadError::parse("stat", "cpu counters overflow their sum"));
    }
    Ok(CpuSnapshot::from_fields(fields))
}

pub fn parse_uptime(text: &str) -> ReadResult<f64> {
    let token = text
        .split_whitespace()
        .next()
        .ok_or_else(|| ReadError::parse("uptime", "empty file"))?;
    token
        .parse()
        .map_err(|_| ReadError::parse("uptime", format!("invalid seconds {token:?}")))
}

/// Parse one `<pid>/stat` line. The command name sits in parentheses and may
/// itself contain spaces or parentheses, so it is delimited by the first `(`
/// and the last `)`; every other field is whitespace separated.
pub fn parse_process_stat(line: &str) -> ReadResult<ProcessStat> {
    use stat_field::*;

    let open = line
        .find('(')
        .ok_or_else(|| ReadError::parse("pid/stat", "missing '(' before name"))?;
    let close = line
        .rfind(')')
        .filter(|&c| c > open)
        .ok_or_else(|| ReadError::parse("pid/stat", "missing ')' after name"))?;

    let pid_token = line[..open].trim();
    let name = &line[open + 1..close];
    // Fields after the name start at STATE.
    let rest: Vec<&str> = line[close + 1..].split_whitespace().collect();
    let field = |index: usize| {
        rest.get(index - STATE).copied().ok_or_else(|| {
            ReadError::parse(
                "pid/stat",
                format!("expected at least {} fields, found {}", RSS + 1, rest.len() + STATE),
            )
        })
    };

    let pid = pid_token
        .parse()
        .map_err(|_| ReadError::parse("pid/stat", format!("invalid pid {pid_token:?}")))?;

    let state = field(STATE)?
        .chars()
        .next()
        .ok_or_else(|| ReadError::parse("pid/stat", "empty state"))?;

    Ok(ProcessStat {
        pid,
        name: name.to_string(),
        state,
        utime: parse_u64("pid/stat", field(UTIME)?)?,
        stime: parse_u64("pid/stat", field(STIME)?)?,
        cutime: parse_u64("pid/stat", field(CUTIME)?)?,
        cstime: parse_u64("pid/stat", field(CSTIME)?)?,
        starttime: parse_u64("pid/stat", field(STARTTIME)?)?,
        vsize: parse_u64("pid/stat", field(VSIZE)?)?,
        rss: parse_u64("pid/stat", field(RSS)?)?,
    })
}

/// Parse `net/dev`: two header lines, then `IFACE: rx[8] tx[8]` per line.
pub fn parse_net_dev(text: &str) -> ReadResult<NetworkSnapshot> {
    let mut interfaces = NetworkSnapshot::new();

    for line in text.lines().skip(2) {
        if line.trim().is_empty() {
            continue;
        }
        let (name, counters) = line
            .split_once(':')
            .ok_or_else(|| ReadError::parse("net/dev", format!("no interface label in {line:?}")))?;

        let mut values = [0u64; 16];
        let mut tokens = counters.split_whitespace();
        for (i, slot) in values.iter_mut().enumerate() {
            let token = tokens.next().ok_or_else(|| {
                ReadError::parse(
                    "net/dev",
                    format!("interface {} has {i} counters, expected 16", name.trim()),
                )
            })?;
            *slot = parse_u64("net/dev", token)?;
        }

        let v = values;
        let rx = RxCounters {
            bytes: v[0],
            packets: v[1],
            errs: v[2],
            drop: v[3],
            fifo: v[4],
            colls: v[5],
            carrier: v[6],
            compressed: v[7],
        };
        let tx = TxCounters {
            bytes: v[8],
            packets: v[9],
            errs: v[10],
            drop: v[11],
            fifo: v[12],
            frame: v[13],
            compressed: v[14],
            multicast: v[15],
        };
        interfaces.insert(name.trim().to_string(), InterfaceCounters { rx, tx });
    }

    Ok(interfaces)
}

fn parse_u64(source_name: &'static str, token: &str) -> ReadResult<u64> {
    token
        .parse()
        .map_err(|_| ReadError::parse(source_name, format!("invalid counter {token:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMINFO: &str = "\
MemTotal:       16318412 kB
MemFree:         1234567 kB
MemAvailable:    8159206 kB
Buffers:          345678 kB
SwapTotal:       2097148 kB
SwapFree:        2000000 kB
";

    #[test]
    fn meminfo_derives_used_values() {
        let mem = parse_meminfo(MEMINFO).unwrap();
        assert_eq!(mem.total_ram, 16_318_412);
        assert_eq!(mem.available_ram, 8_159_206);
        assert_eq!(mem.used_ram(), 16_318_412 - 8_159_206);
        assert_eq!(mem.used_swap(), 97_148);
    }

    #[test]
    fn meminfo_missing_key_is_parse_error() {
        let text = "MemTotal: 100 kB\nMemAvailable: 50 kB\nSwapTotal: 0 kB\n";
        let err = parse_meminfo(text).unwrap_err();
        assert!(matches!(err, ReadError::Parse { .. }));
        assert!(err.to_string().contains("SwapFree"));
    }

    #[test]
    fn meminfo_total_too_large_for_bytes_is_parse_error() {
        let text = format!(
            "MemTotal: {} kB\nMemAvailable: 1 kB\nSwapTotal: 0 kB\nSwapFree: 0 kB\n",
            u64::MAX / 2
        );
        assert!(matches!(parse_meminfo(&text), Err(ReadError::Parse { .. })));
    }

    #[test]
    fn cpu_stat_with_overflowing_sum_is_parse_error() {
        let text = format!("cpu {} 1 0 0 0 0 0 0 0 0\n", u64::MAX);
        let err = parse_cpu_stat(&text).unwrap_err();
        assert!(matches!(err, ReadError::Parse { .. }));

        let single_max = format!("cpu {} 0 0 0 0 0 0 0 0 0\n", u64::MAX);
        let cpu = parse_cpu_stat(&single_max).unwrap();
        assert_eq!(cpu.total(), u64::MAX);
    }

    #[test]
    fn hand_built_snapshot_totals_saturate() {
        let cpu = CpuSnapshot {
            user: u64::MAX,
            nice: 1,
            idle: u64::MAX,
            iowait: 5,
            ..CpuSnapshot::default()
        };
        assert_eq!(cpu.total(), u64::MAX);
        assert_eq!(cpu.active(), u64::MAX);
        assert_eq!(cpu.idle_all(), u64::MAX);
    }

    #[test]
    fn cpu_stat_reads_first_line_only() {
        let text = "cpu  100 2 30 900 4 5 6 7 8 9 11 12\ncpu0 1 1 1 1 1 1 1 1 1 1\n";
        let cpu = parse_cpu_stat(text).unwrap();
        assert_eq!(cpu.user, 100);
        assert_eq!(cpu.guest_nice, 9);
        assert_eq!(cpu.total(), 100 + 2 + 30 + 900 + 4 + 5 + 6 + 7 + 8 + 9);
        assert_eq!(cpu.active(), 132);
    }

    #[test]
    fn cpu_stat_short_line_fails() {
        let err = parse_cpu_stat("cpu 1 2 3 4 5").unwrap_err();
        assert!(err.to_string().contains("found 5"));
    }

    #[test]
    fn process_stat_offsets() {
        let line = "4242 (my proc) S 1 4242 4242 0 -1 4194560 500 0 0 0 \
                    120 30 5 2 20 0 1 0 9000 123456789 2048 18446744073709551615";
        let stat = parse_process_stat(line).unwrap();
        assert_eq!(stat.pid, 4242);
        assert_eq!(stat.name, "my proc");
        assert_eq!(stat.state, 'S');
        assert_eq!(stat.utime, 120);
        assert_eq!(stat.stime, 30);
        assert_eq!(stat.cutime, 5);
        assert_eq!(stat.cstime, 2);
        assert_eq!(stat.starttime, 9000);
        assert_eq!(stat.vsize, 123_456_789);
        assert_eq!(stat.rss, 2048);
        assert_eq!(stat.total_time(), 157);
    }

    #[test]
    fn process_stat_name_with_parens() {
        let line = "7 (a) b) R 0 0 0 0 0 0 0 0 0 0 1 2 3 4 0 0 0 0 50 4096 10";
        let stat = parse_process_stat(line).unwrap();
        assert_eq!(stat.name, "a) b");
        assert_eq!(stat.rss, 10);
    }

    #[test]
    fn process_stat_truncated_line_fails() {
        let err = parse_process_stat("7 (short) R 0 0 0").unwrap_err();
        assert!(matches!(err, ReadError::Parse { .. }));
    }

    #[test]
    fn uptime_takes_first_float() {
        assert_eq!(parse_uptime("12345.67 54321.00\n").unwrap(), 12345.67);
        assert!(parse_uptime("").is_err());
    }

    #[test]
    fn net_dev_tolerates_glued_label() {
        let text = "h1\nh2\n  eth0:4294967296 1 0 0 0 0 0 0 7 1 0 0 0 0 0 0\n";
        let net = parse_net_dev(text).unwrap();
        assert_eq!(net["eth0"].rx.bytes, 4_294_967_296);
        assert_eq!(net["eth0"].tx.bytes, 7);
    }

    #[test]
    fn net_dev_short_line_fails() {
        let text = "h1\nh2\n lo: 1 2 3\n";
        assert!(parse_net_dev(text).is_err());
    }
}
