use std::time::Duration;

use super::timer::OneShotTimer;

/// Default delay before the first reconnect attempt.
pub const DEFAULT_BASE_INTERVAL: Duration = Duration::from_millis(1000);
/// Default upper bound for the doubled interval.
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(60);

/// Exponential-backoff reconnect scheduler.
///
/// Idle until a terminal playback event arrives, then Pending with a single
/// armed timer. Further terminal events while Pending are ignored. When the
/// timer fires the caller replays the last selection and the interval doubles.
#[derive(Debug, Clone)]
pub struct RetryController {
    base: Duration,
    max: Duration,
    interval: Duration,
    timer: OneShotTimer,
}

impl RetryController {
    pub fn new(base: Duration, max: Duration) -> Self {
        let max = max.max(base);
        Self {
            base,
            max,
            interval: base,
            timer: OneShotTimer::new(),
        }
    }

    /// Arm a reconnect for the current interval. Returns false if one is already pending.
    pub fn schedule(&mut self, now: Duration) -> bool {
        if self.timer.is_armed() {
            return false;
        }
        self.timer.arm(now, self.interval);
        true
    }

    /// Returns true when the armed reconnect is due. The interval for the next
    /// arming is doubled, up to the cap.
    pub fn poll(&mut self, now: Duration) -> bool {
        if !self.timer.fire_if_due(now) {
            return false;
        }
        self.interval = self.interval.saturating_mul(2).min(self.max);
        true
    }

    /// Restore the base interval. An already armed reconnect keeps its deadline.
    pub fn reset(&mut self) {
        self.interval = self.base;
    }

    pub fn cancel(&mut self) {
        self.timer.cancel();
    }

    pub fn is_pending(&self) -> bool {
        self.timer.is_armed()
    }

    /// Interval the next `schedule` will arm with.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.timer.deadline()
    }

    pub fn remaining(&self, now: Duration) -> Option<Duration> {
        self.timer.remaining(now)
    }
}
