use std::time::{Duration, Instant};

/// True on the first call (`last` unset) or once `interval` has elapsed.
pub fn is_due(now: Instant, last: Option<Instant>, interval: Duration) -> bool {
    match last {
        None => true,
        Some(last) => now.saturating_duration_since(last) >= interval,
    }
}

/// Per-family refresh gate. A zero interval makes every tick due.
#[derive(Clone, Debug)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_sample(&self) -> Option<Instant> {
        self.last
    }

    pub fn is_due(&self, now: Instant) -> bool {
        is_due(now, self.last, self.interval)
    }

    /// Claim the slot if due. The attempt counts even if the read then
    /// fails, so a broken source is retried on the next cycle, not every tick.
    pub fn try_claim(&mut self, now: Instant) -> bool {
        if self.is_due(now) {
            self.last = Some(now);
            true
        } else {
            false
        }
    }

    /// Forget the last sample so the next call is due.
    pub fn reset(&mut self) {
        self.last = None;
    }
}
