use std::time::Instant;

/// Running average of samples per second since the first sample.
///
/// Diagnostics only: the value goes into log lines and the status board.
#[derive(Clone, Debug, Default)]
pub struct RateTracker {
    first: Option<Instant>,
    count: u64,
}

impl RateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self) -> f64 {
        self.tick_at(Instant::now())
    }

    /// `(n - 1) / elapsed` where `n` counts this tick. The first tick returns 0.
    pub fn tick_at(&mut self, now: Instant) -> f64 {
        let first = match self.first {
            Some(t) => t,
            None => {
                self.first = Some(now);
                self.count = 1;
                return 0.0;
            }
        };

        self.count += 1;
        let dt = now.saturating_duration_since(first).as_secs_f64();
        if dt > 0.0 {
            (self.count - 1) as f64 / dt
        } else {
            0.0
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::time::Duration;

    #[test]
    fn test_first_tick_is_zero() {
        let mut rate = RateTracker::new();
        assert_eq!(rate.tick(), 0.0);
        assert_eq!(rate.count(), 1);
    }

    #[test]
    fn test_average_rate() {
        let mut rate = RateTracker::new();
        let t0 = Instant::now();
        rate.tick_at(t0);

        // 11 ticks spanning 2.5 s
        let mut last = 0.0;
        for i in 1..=10u64 {
            last = rate.tick_at(t0 + Duration::from_millis(250 * i));
        }
        assert_relative_eq!(last, 10.0 / 2.5, epsilon = 1e-9);
    }

    #[test]
    fn test_same_instant_does_not_divide_by_zero() {
        let mut rate = RateTracker::new();
        let t0 = Instant::now();
        rate.tick_at(t0);
        assert_eq!(rate.tick_at(t0), 0.0);
    }
}
