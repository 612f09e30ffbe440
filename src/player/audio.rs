use anyhow::{Context, Result};
use parking_lot::Mutex;
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use super::clock::MediaClock;

/// Samples are resampled to this rate before they reach the ring.
pub const OUTPUT_SAMPLE_RATE: u32 = 48_000;
pub const OUTPUT_CHANNELS: u16 = 2;

/// Engine volume 100 is unity gain.
const UNITY_VOLUME: f32 = 100.0;

/// Sample ring shared between the decoder and the audio callback. Writes never
/// block: when full, the oldest samples are dropped.
pub struct SampleRing {
    samples: Mutex<VecDeque<f32>>,
    capacity: usize,
}

impl SampleRing {
    pub fn with_seconds(seconds: usize) -> Arc<Self> {
        let capacity = OUTPUT_SAMPLE_RATE as usize * OUTPUT_CHANNELS as usize * seconds;
        Arc::new(Self {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        })
    }

    pub fn extend(&self, items: &[f32]) {
        let mut samples = self.samples.lock();
        let overflow = (samples.len() + items.len()).saturating_sub(self.capacity);
        samples.drain(..overflow.min(samples.len()));
        let skip = items.len().saturating_sub(self.capacity);
        samples.extend(&items[skip..]);
    }

    fn pop(&self) -> Option<f32> {
        self.samples.lock().pop_front()
    }

    pub fn clear(&self) {
        self.samples.lock().clear();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.samples.lock().len()
    }
}

/// rodio source pulling from the ring and driving the media clock.
struct RingSource {
    ring: Arc<SampleRing>,
    clock: MediaClock,
    pending: u64,
}

/// Clock updates are batched to keep the audio callback cheap.
const CLOCK_BATCH: u64 = 256;

impl Iterator for RingSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.clock.take_flush_request() {
            self.ring.clear();
            self.pending = 0;
            return Some(0.0);
        }

        // Underrun plays silence; the stream never ends on its own.
        let Some(sample) = self.ring.pop() else {
            return Some(0.0);
        };
        self.pending += 1;
        if self.pending == CLOCK_BATCH {
            self.clock.advance_samples(CLOCK_BATCH);
            self.pending = 0;
        }
        Some(sample)
    }
}

impl Source for RingSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.clock.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.clock.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

/// Audio device output for one pipeline. Starts paused.
pub struct AudioOutput {
    _stream: OutputStream, // must outlive the sink
    _handle: OutputStreamHandle,
    sink: Sink,
}

impl AudioOutput {
    pub fn open(ring: Arc<SampleRing>, clock: MediaClock) -> Result<Self> {
        let (stream, handle) =
            OutputStream::try_default().context("no audio output device")?;
        let sink = Sink::try_new(&handle).context("failed to create audio sink")?;
        sink.append(RingSource {
            ring,
            clock,
            pending: 0,
        });
        sink.pause();

        Ok(Self {
            _stream: stream,
            _handle: handle,
            sink,
        })
    }

    pub fn resume(&self) {
        self.sink.play();
    }

    pub fn set_volume(&self, level: u32) {
        self.sink.set_volume(gain(level));
    }
}

fn gain(level: u32) -> f32 {
    level as f32 / UNITY_VOLUME
}
