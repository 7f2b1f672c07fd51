use std::collections::VecDeque;

/// Fixed-length history of one channel, oldest value first.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    values: VecDeque<f64>,
}

impl RollingWindow {
    /// A window of `capacity` entries, all set to `fill`.
    pub fn filled(capacity: usize, fill: f64) -> Self {
        RollingWindow {
            values: std::iter::repeat(fill).take(capacity).collect(),
        }
    }

    /// Drop the oldest value and append `value`; the length never changes.
    pub fn push(&mut self, value: f64) {
        if self.values.pop_front().is_some() {
            self.values.push_back(value);
        }
    }

    pub fn current(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }

    pub fn latest(&self) -> Option<f64> {
        self.values.back().copied()
    }

    /// Scale every value to `(v - min + 1) / (max - min + 1)`.
    ///
    /// The `+ 1` on both sides keeps flat windows finite (they map to 1.0).
    pub fn normalize(&self) -> Vec<f64> {
        let min = self.values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        self.values
            .iter()
            .map(|v| (v - min + 1.0) / (max - min + 1.0))
            .collect()
    }
}
