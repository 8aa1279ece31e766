/// Ring of the last `W` raw encoder counts, one per control interval.
///
/// Zero-filled at construction, so the first `W - 1` deltas are measured
/// against a zero history and read low until the window is warm.
#[derive(Debug, Clone)]
pub struct VelocityEstimator {
    history: Vec<i64>,
    cursor: usize,
}

impl VelocityEstimator {
    pub const DEFAULT_WINDOW: usize = 10;

    /// `window` must be at least 1; config validation guarantees it.
    pub fn new(window: usize) -> Self {
        Self {
            history: vec![0; window.max(1)],
            cursor: 0,
        }
    }

    pub fn window(&self) -> usize {
        self.history.len()
    }

    /// Store `count` and return its change over the whole window.
    ///
    /// The caller divides by `window() * interval` to obtain a rate.
    pub fn sample(&mut self, count: i64) -> i64 {
        let oldest = std::mem::replace(&mut self.history[self.cursor], count);
        self.cursor = (self.cursor + 1) % self.history.len();
        count.wrapping_sub(oldest)
    }
}

impl Default for VelocityEstimator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warm_up_reads_low_then_converges() {
        let mut est = VelocityEstimator::new(4);
        let rate = 7;
        let deltas: Vec<i64> = (1..=8).map(|k| est.sample(k * rate)).collect();
        assert_eq!(deltas, vec![7, 14, 21, 28, 28, 28, 28, 28]);
    }

    #[test]
    fn delta_spans_exactly_one_window() {
        let mut est = VelocityEstimator::new(3);
        for count in [10, 20, 30] {
            est.sample(count);
        }
        assert_eq!(est.sample(31), 21);
        assert_eq!(est.sample(31), 11);
        assert_eq!(est.sample(31), 1);
        assert_eq!(est.sample(31), 0);
    }

    #[test]
    fn handles_reverse_motion() {
        let mut est = VelocityEstimator::new(2);
        est.sample(-5);
        assert_eq!(est.sample(-10), -10);
        assert_eq!(est.sample(-15), -10);
    }

    #[test]
    fn zero_window_is_promoted_to_one() {
        let mut est = VelocityEstimator::new(0);
        assert_eq!(est.window(), 1);
        assert_eq!(est.sample(4), 4);
        assert_eq!(est.sample(9), 5);
    }
}
