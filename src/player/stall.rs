use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A read blocked this long shows the buffering indicator
pub const STALL_AFTER: Duration = Duration::from_secs(2);
/// A read blocked this long fails the stream
pub const READ_TIMEOUT: Duration = Duration::from_secs(10);

const NOT_WAITING: u64 = u64::MAX;

/// What the interrupt callback should do about the current read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StallCheck {
    Waiting,
    /// First check past [`STALL_AFTER`] for this read
    Stalled,
    TimedOut,
}

/// How a read that was being watched ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    Prompt,
    /// Data arrived after a stall was reported
    Recovered,
    TimedOut,
}

/// Watches how long the decoder has been blocked on network input.
///
/// The decoder marks the start and end of every read; FFmpeg's interrupt
/// callback polls [`StallWatch::check`] while the read blocks. Times are offsets
/// from the watch's creation so tests can pass them explicitly.
pub struct StallWatch {
    epoch: Instant,
    waiting_since_us: AtomicU64,
    stalled: AtomicBool,
    stall_after: Duration,
    timeout: Duration,
}

impl StallWatch {
    pub fn new(stall_after: Duration, timeout: Duration) -> Self {
        Self {
            epoch: Instant::now(),
            waiting_since_us: AtomicU64::new(NOT_WAITING),
            stalled: AtomicBool::new(false),
            stall_after,
            timeout: timeout.max(stall_after),
        }
    }

    pub fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn begin_wait(&self, now: Duration) {
        self.stalled.store(false, Ordering::Relaxed);
        self.waiting_since_us
            .store(now.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn check(&self, now: Duration) -> StallCheck {
        let Some(waited) = self.waited(now) else {
            return StallCheck::Waiting;
        };
        if waited >= self.timeout {
            StallCheck::TimedOut
        } else if waited >= self.stall_after && !self.stalled.swap(true, Ordering::Relaxed) {
            StallCheck::Stalled
        } else {
            StallCheck::Waiting
        }
    }

    pub fn end_wait(&self, now: Duration) -> WaitOutcome {
        let waited = self.waited(now);
        self.waiting_since_us.store(NOT_WAITING, Ordering::Relaxed);
        let stalled = self.stalled.swap(false, Ordering::Relaxed);

        if waited.is_some_and(|w| w >= self.timeout) {
            WaitOutcome::TimedOut
        } else if stalled {
            WaitOutcome::Recovered
        } else {
            WaitOutcome::Prompt
        }
    }

    fn waited(&self, now: Duration) -> Option<Duration> {
        match self.waiting_since_us.load(Ordering::Relaxed) {
            NOT_WAITING => None,
            since => Some(now.saturating_sub(Duration::from_micros(since))),
        }
    }
}
