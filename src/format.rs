use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Reference scale for the network progress bars: 2 GB of cumulative
/// traffic fills the bar.
pub const NETWORK_BAR_SCALE_BYTES: f64 = 2_000_000_000.0;

const KB: u64 = 1024;
const MB: u64 = 1024 * 1024;
const GB: u64 = 1024 * 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteUnit {
    Bytes,
    Kb,
    Mb,
    Gb,
}

impl ByteUnit {
    pub fn label(self) -> &'static str {
        match self {
            ByteUnit::Bytes => "bytes",
            ByteUnit::Kb => "KB",
            ByteUnit::Mb => "MB",
            ByteUnit::Gb => "GB",
        }
    }
}

pub fn truncate_unicode(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    let mut result = String::new();
    let mut width = 0;
    for ch in s.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if width + ch_width > max_width.saturating_sub(1) {
            result.push('\u{2026}');
            break;
        }
        result.push(ch);
        width += ch_width;
    }
    result
}

/// Divide by 1024 until the value fits the largest unit it reaches.
pub fn scale_bytes(bytes: u64) -> (f64, ByteUnit) {
    if bytes >= GB {
        (bytes as f64 / GB as f64, ByteUnit::Gb)
    } else if bytes >= MB {
        (bytes as f64 / MB as f64, ByteUnit::Mb)
    } else if bytes >= KB {
        (bytes as f64 / KB as f64, ByteUnit::Kb)
    } else {
        (bytes as f64, ByteUnit::Bytes)
    }
}

/// Two decimals and the unit label, e.g. "1.50 MB".
pub fn format_scaled(bytes: u64) -> String {
    let (value, unit) = scale_bytes(bytes);
    format!("{value:.2} {}", unit.label())
}

/// Progress-bar fill for a cumulative byte counter, capped at 1.0.
pub fn network_bar_fraction(bytes: u64) -> f32 {
    (bytes as f64 / NETWORK_BAR_SCALE_BYTES).min(1.0) as f32
}

pub fn format_rate(bytes_per_sec: f64) -> String {
    format!("{}/s", format_scaled(bytes_per_sec.max(0.0) as u64))
}
