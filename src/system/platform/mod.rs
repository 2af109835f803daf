//! Host constants the delta engine needs to turn jiffies and pages into
//! seconds and bytes.

use serde::Serialize;

/// Fallbacks used when the host cannot report its own values.
pub const DEFAULT_CLOCK_TICKS: u64 = 100;
pub const DEFAULT_PAGE_SIZE: u64 = 4096;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PlatformConstants {
    /// Jiffies per second (`_SC_CLK_TCK`).
    pub clock_ticks_per_second: u64,
    /// Bytes per memory page.
    pub page_size: u64,
}

impl Default for PlatformConstants {
    fn default() -> Self {
        PlatformConstants {
            clock_ticks_per_second: DEFAULT_CLOCK_TICKS,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

pub trait PlatformExtensions {
    fn clock_ticks_per_second() -> Option<u64>;
    fn page_size() -> Option<u64>;
}

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "linux")]
use linux as platform_impl;
#[cfg(target_os = "macos")]
use macos as platform_impl;
#[cfg(target_os = "windows")]
use windows as platform_impl;

pub fn clock_ticks_per_second() -> u64 {
    platform_impl::Platform::clock_ticks_per_second().unwrap_or(DEFAULT_CLOCK_TICKS)
}

pub fn page_size() -> u64 {
    platform_impl::Platform::page_size().unwrap_or(DEFAULT_PAGE_SIZE)
}

pub fn host_constants() -> PlatformConstants {
    PlatformConstants {
        clock_ticks_per_second: clock_ticks_per_second(),
        page_size: page_size(),
    }
}
