use serde::Serialize;

pub const DEFAULT_CAPACITY: usize = 100;

/// Write `value` into `buffer[index]` and return the next write index.
pub fn push(buffer: &mut [f32], index: usize, value: f32) -> usize {
    buffer[index] = value;
    (index + 1) % buffer.len()
}

/// Fixed-capacity circular series feeding a line plot. The oldest slot is
/// overwritten once full.
///
/// Only a write cursor is kept, no timestamps: a skipped refresh is
/// indistinguishable from an evenly spaced sample.
#[derive(Clone, Debug, Serialize)]
pub struct RollingHistory {
    values: Vec<f32>,
    cursor: usize,
    filled: usize,
}

impl RollingHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: vec![0.0; capacity],
            cursor: 0,
            filled: 0,
        }
    }

    pub fn push(&mut self, value: f32) -> usize {
        self.cursor = push(&mut self.values, self.cursor, value);
        self.filled = (self.filled + 1).min(self.values.len());
        self.cursor
    }

    pub fn capacity(&self) -> usize {
        self.values.len()
    }

    /// Next slot to be written.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Raw slots in storage order; unwritten slots read 0.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Samples oldest to newest, only those actually written.
    pub fn chronological(&self) -> impl Iterator<Item = f32> + '_ {
        let capacity = self.values.len();
        let start = (self.cursor + capacity - self.filled) % capacity;
        (0..self.filled).map(move |i| self.values[(start + i) % capacity])
    }

    pub fn latest(&self) -> Option<f32> {
        if self.filled == 0 {
            return None;
        }
        let capacity = self.values.len();
        Some(self.values[(self.cursor + capacity - 1) % capacity])
    }

    pub fn reset(&mut self) {
        self.values.iter_mut().for_each(|v| *v = 0.0);
        self.cursor = 0;
        self.filled = 0;
    }
}

impl Default for RollingHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
