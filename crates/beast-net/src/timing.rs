use std::time::{Duration, Instant};

/// Fires at most once per `interval`, tracking the last time it fired.
///
/// Used for the writer flush/heartbeat age checks and the dial reconnection
/// backoff — every timer in the engine is one of these, driven by `Instant`
/// sampled once per tick rather than a wall-clock read per comparison.
#[derive(Clone, Copy, Debug)]
pub struct Repeater {
    interval: Duration,
    last_acted: Instant,
}

impl Repeater {
    #[inline]
    pub fn every(interval: Duration) -> Self {
        Self { interval, last_acted: Instant::now() }
    }

    /// Returns whether `interval` has elapsed since the last time this fired,
    /// resetting the clock if so.
    #[inline]
    pub fn fired_at(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_acted) >= self.interval {
            self.last_acted = now;
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn reset_at(&mut self, now: Instant) {
        self.last_acted = now;
    }

    /// Forces the next `fired_at` call to return true regardless of interval.
    #[inline]
    pub fn force_fire(&mut self) {
        self.last_acted = Instant::now() - self.interval - Duration::from_secs(1);
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_per_interval() {
        let mut r = Repeater::every(Duration::from_millis(10));
        let t0 = Instant::now();
        assert!(!r.fired_at(t0));
        assert!(r.fired_at(t0 + Duration::from_millis(10)));
        assert!(!r.fired_at(t0 + Duration::from_millis(15)));
        assert!(r.fired_at(t0 + Duration::from_millis(21)));
    }

    #[test]
    fn force_fire_fires_immediately() {
        let mut r = Repeater::every(Duration::from_secs(60));
        r.force_fire();
        assert!(r.fired_at(Instant::now()));
    }
}
