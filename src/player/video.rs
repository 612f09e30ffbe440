use crossbeam_channel::Receiver;
use std::collections::VecDeque;

/// Frames later than this behind the clock are dropped (seconds)
const DROP_THRESHOLD: f64 = 0.02;
/// Frames up to this far ahead of the clock are shown (seconds)
const HOLD_THRESHOLD: f64 = 0.02;
/// After a seek, frames this far before the target are still accepted
const SEEK_TOLERANCE: f64 = 0.5;

/// A decoded RGBA frame
pub struct DecodedVideoFrame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub pts: f64,
}

/// Buffers frames from the decoder and releases them in step with the clock.
pub struct FrameQueue {
    receiver: Receiver<DecodedVideoFrame>,
    buffer: VecDeque<DecodedVideoFrame>,
    capacity: usize,
}

impl FrameQueue {
    pub fn new(receiver: Receiver<DecodedVideoFrame>, capacity: usize) -> Self {
        Self {
            receiver,
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn fill(&mut self) {
        while self.buffer.len() < self.capacity {
            match self.receiver.try_recv() {
                Ok(frame) => self.buffer.push_back(frame),
                Err(_) => break,
            }
        }
    }

    /// Next frame due at `clock`, if the displayed frame should change.
    pub fn next_due(&mut self, clock: f64) -> Option<DecodedVideoFrame> {
        self.fill();

        while self
            .buffer
            .front()
            .is_some_and(|frame| frame.pts < clock - DROP_THRESHOLD && self.buffer.len() > 1)
        {
            self.buffer.pop_front();
        }

        if self
            .buffer
            .front()
            .is_some_and(|frame| frame.pts <= clock + HOLD_THRESHOLD)
        {
            return self.buffer.pop_front();
        }
        None
    }

    /// First frame at or near `target`, ignoring the clock.
    pub fn first_after_seek(&mut self, target: f64) -> Option<DecodedVideoFrame> {
        self.fill();

        while self
            .buffer
            .front()
            .is_some_and(|frame| frame.pts < target - SEEK_TOLERANCE)
        {
            self.buffer.pop_front();
        }
        self.buffer.pop_front()
    }

    /// Drop everything buffered, including frames still in the channel.
    pub fn clear(&mut self) {
        self.buffer.clear();
        while self.receiver.try_recv().is_ok() {}
    }
}
