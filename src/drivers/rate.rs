use std::time::{Duration, Instant};
/// Counts ticks and reports the achieved rate once per interval.
#[derive(Debug)]
pub struct RateCounter {
    interval: Duration,
    count: u32,
    window_start: Option<Instant>,
    last_rate_hz: Option<f64>,
}
impl Default for RateCounter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
impl RateCounter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            count: 0,
            window_start: None,
            last_rate_hz: None,
        }
    }
    /// Registers one tick at `now`. Returns a fresh rate when an interval closes.
    pub fn record(&mut self, now: Instant) -> Option<f64> {
        self.count += 1;
        let start = *self.window_start.get_or_insert(now);
        let elapsed = now.saturating_duration_since(start);
        if elapsed < self.interval {
            return None;
        }
        let rate = self.count as f64 / elapsed.as_secs_f64();
        self.window_start = Some(now);
        self.count = 0;
        self.last_rate_hz = Some(rate);
        Some(rate)
    }
    pub fn rate_hz(&self) -> Option<f64> {
        self.last_rate_hz
    }
}
