use std::thread;
use std::time::{Duration, Instant};

/// One wake-up of the [`Ticker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub scheduled: Instant,
    pub lateness: Duration,
    /// Tick boundaries passed over while this one was late.
    pub missed: u32,
}

/// Fixed-period sleeper that keeps its phase.
///
/// Deadlines advance by whole periods from the start instant. A wake-up
/// that overruns one or more boundaries jumps to the next boundary after
/// now; the missed ticks are dropped, not replayed.
#[derive(Debug, Clone)]
pub struct Ticker {
    period: Duration,
    next: Instant,
}

impl Ticker {
    pub fn new(start: Instant, period: Duration) -> Self {
        Self {
            period,
            next: start + period,
        }
    }

    pub fn wait(&mut self) -> Tick {
        let expected = self.next;
        let now = Instant::now();
        if now < expected {
            thread::sleep(expected - now);
        }
        self.advance(expected, Instant::now())
    }

    fn advance(&mut self, expected: Instant, woke: Instant) -> Tick {
        let (next, missed) = next_tick(expected, woke, self.period);
        self.next = next;
        Tick {
            scheduled: expected,
            lateness: woke.saturating_duration_since(expected),
            missed,
        }
    }
}

/// First tick boundary strictly after `now`, with the count of boundaries
/// skipped to reach it.
pub fn next_tick(expected: Instant, now: Instant, period: Duration) -> (Instant, u32) {
    let lateness = now.saturating_duration_since(expected);
    let missed = (lateness.as_nanos() / period.as_nanos().max(1)) as u32;
    (expected + period * (missed + 1), missed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: Duration = Duration::from_millis(20);

    #[test]
    fn on_time_advances_one_period() {
        let t0 = Instant::now();
        let (next, missed) = next_tick(t0, t0 + Duration::from_millis(3), PERIOD);
        assert_eq!(next, t0 + PERIOD);
        assert_eq!(missed, 0);
    }

    #[test]
    fn overrun_resyncs_to_boundary() {
        let t0 = Instant::now();
        let (next, missed) = next_tick(t0, t0 + Duration::from_millis(47), PERIOD);
        assert_eq!(next, t0 + Duration::from_millis(60));
        assert_eq!(missed, 2);
    }

    #[test]
    fn exact_boundary_counts_as_missed() {
        let t0 = Instant::now();
        let (next, missed) = next_tick(t0, t0 + PERIOD, PERIOD);
        assert_eq!(next, t0 + 2 * PERIOD);
        assert_eq!(missed, 1);
    }

    #[test]
    fn ticker_keeps_phase_after_delay() {
        let t0 = Instant::now();
        let mut ticker = Ticker::new(t0, PERIOD);
        let tick = ticker.advance(t0 + PERIOD, t0 + PERIOD + Duration::from_millis(45));
        assert_eq!(tick.missed, 2);
        assert_eq!(tick.lateness, Duration::from_millis(45));
        assert_eq!(ticker.next, t0 + 4 * PERIOD);
    }

    #[test]
    fn wait_sleeps_until_deadline() {
        let start = Instant::now();
        let mut ticker = Ticker::new(start, Duration::from_millis(5));
        for _ in 0..3 {
            ticker.wait();
        }
        assert!(start.elapsed() >= Duration::from_millis(15));
    }
}
