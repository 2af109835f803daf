use super::PlatformExtensions;

pub struct Platform;

impl PlatformExtensions for Platform {
    // No procfs here; the engine falls back to the Linux defaults.
    fn clock_ticks_per_second() -> Option<u64> {
        None
    }

    fn page_size() -> Option<u64> {
        None
    }
}
