use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Master clock for A/V sync, advanced by audio samples actually played.
///
/// Live streams start at an arbitrary timestamp, so the decoder re-anchors the
/// clock to the first frame it decodes and again after jumping to the live edge.
/// Without an audio track or audio device the clock follows wall time instead.
#[derive(Clone)]
pub struct MediaClock {
    position_us: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    /// Set on re-anchor so the audio source drops stale samples
    flush_audio: Arc<AtomicBool>,
    wall_driven: Arc<AtomicBool>,
    /// Wall time (since `epoch`) matching `position_us` in wall-driven mode
    wall_mark_us: Arc<AtomicU64>,
    epoch: Instant,
    sample_rate: u32,
    channels: u16,
}

impl MediaClock {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            position_us: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            flush_audio: Arc::new(AtomicBool::new(false)),
            wall_driven: Arc::new(AtomicBool::new(false)),
            wall_mark_us: Arc::new(AtomicU64::new(0)),
            epoch: Instant::now(),
            sample_rate,
            channels,
        }
    }

    /// Stream position in seconds
    pub fn position(&self) -> f64 {
        self.position_at(self.epoch.elapsed())
    }

    fn position_at(&self, wall: Duration) -> f64 {
        let mut us = self.position_us.load(Ordering::Relaxed);
        if self.wall_driven.load(Ordering::Relaxed) && self.running.load(Ordering::Relaxed) {
            let mark = self.wall_mark_us.load(Ordering::Relaxed);
            us += (wall.as_micros() as u64).saturating_sub(mark);
        }
        us as f64 / 1_000_000.0
    }

    pub fn anchor(&self, seconds: f64) {
        self.anchor_at(seconds, self.epoch.elapsed());
    }

    fn anchor_at(&self, seconds: f64, wall: Duration) {
        let us = (seconds.max(0.0) * 1_000_000.0) as u64;
        self.position_us.store(us, Ordering::Relaxed);
        self.wall_mark_us
            .store(wall.as_micros() as u64, Ordering::Relaxed);
        self.flush_audio.store(true, Ordering::Relaxed);
    }

    pub fn take_flush_request(&self) -> bool {
        self.flush_audio.swap(false, Ordering::Relaxed)
    }

    pub fn advance_samples(&self, samples: u64) {
        if !self.running.load(Ordering::Relaxed) || self.wall_driven.load(Ordering::Relaxed) {
            return;
        }
        let us_per_sample = 1_000_000.0 / (self.sample_rate as f64 * self.channels as f64);
        let delta_us = (samples as f64 * us_per_sample) as u64;
        self.position_us.fetch_add(delta_us, Ordering::Relaxed);
    }

    /// Follow wall time from now on. Played samples no longer move the clock.
    pub fn drive_by_wall_clock(&self) {
        self.drive_by_wall_clock_at(self.epoch.elapsed());
    }

    fn drive_by_wall_clock_at(&self, wall: Duration) {
        if !self.wall_driven.swap(true, Ordering::Relaxed) {
            self.wall_mark_us
                .store(wall.as_micros() as u64, Ordering::Relaxed);
        }
    }

    pub fn is_wall_driven(&self) -> bool {
        self.wall_driven.load(Ordering::Relaxed)
    }

    pub fn start(&self) {
        self.start_at(self.epoch.elapsed());
    }

    fn start_at(&self, wall: Duration) {
        if !self.running.swap(true, Ordering::Relaxed) {
            self.wall_mark_us
                .store(wall.as_micros() as u64, Ordering::Relaxed);
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}
