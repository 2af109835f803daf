use super::PlatformExtensions;

pub struct Platform;

fn sysconf(name: libc::c_int) -> Option<u64> {
    // SAFETY: sysconf only reads a configuration value and has no side effects.
    let value = unsafe { libc::sysconf(name) };
    if value > 0 { Some(value as u64) } else { None }
}

impl PlatformExtensions for Platform {
    fn clock_ticks_per_second() -> Option<u64> {
        sysconf(libc::_SC_CLK_TCK)
    }

    fn page_size() -> Option<u64> {
        sysconf(libc::_SC_PAGESIZE)
    }
}
