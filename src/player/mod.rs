mod audio;
mod clock;
mod decoder;
mod stall;
mod video;

use anyhow::Result;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use egui::{ColorImage, Context, TextureHandle, TextureOptions};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

use audio::{AudioOutput, SampleRing, OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE};
use clock::MediaClock;
use decoder::{start_decoder_thread, DecoderCommand, DecoderParams, Report, ReportKind, Reporter};
use video::{DecodedVideoFrame, FrameQueue};

/// Highest volume the engine accepts; 100 is unity gain.
pub const MAX_VOLUME: u32 = 200;

/// Playback state notification from a media engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PlaybackEvent {
    Opening,
    Buffering { percent: f32 },
    Playing,
    EndReached,
    /// Playback stopped without a request from the session. [`FfmpegEngine`]
    /// only stops on request, so it never reports this.
    Stopped,
    Error,
}

/// Media playback backend driven by the playback session.
///
/// Calls never fail: problems surface later as [`PlaybackEvent::Error`].
pub trait MediaEngine {
    /// Replace the current media with `location`. Playback starts with [`MediaEngine::play`].
    fn open(&mut self, location: &str);

    fn play(&mut self);

    /// Volume in `0..=MAX_VOLUME`.
    fn set_volume(&mut self, level: u32);

    /// Jump to `fraction` of the stream, where values close to 1.0 mean the live edge.
    fn set_position(&mut self, fraction: f32);

    fn try_next_event(&mut self) -> Option<PlaybackEvent>;

    /// Release the media and everything attached to it.
    fn close(&mut self);
}

/// Frames buffered between decoder and display
const FRAME_QUEUE_LEN: usize = 30;
/// Audio buffered between decoder and output device (seconds)
const AUDIO_BUFFER_SECONDS: usize = 2;

/// One opened media: decoder thread, audio output and display state.
struct Pipeline {
    decoder_handle: Option<JoinHandle<()>>,
    command_sender: Sender<DecoderCommand>,
    stop_flag: Arc<AtomicBool>,
    /// `None` when no output device could be opened
    audio: Option<AudioOutput>,
    clock: MediaClock,
    frame_queue: FrameQueue,
    texture: Option<TextureHandle>,
    video_size: (u32, u32),
    duration: f64,
    seek_target: Option<f64>,
}

impl Pipeline {
    fn start(location: &str, volume: u32, reporter: Reporter) -> Result<Self> {
        let clock = MediaClock::new(OUTPUT_SAMPLE_RATE, OUTPUT_CHANNELS);
        let audio_ring = SampleRing::with_seconds(AUDIO_BUFFER_SECONDS);
        let audio = match AudioOutput::open(audio_ring.clone(), clock.clone()) {
            Ok(audio) => {
                audio.set_volume(volume);
                Some(audio)
            }
            Err(e) => {
                warn!("playing without sound: {:#}", e);
                clock.drive_by_wall_clock();
                None
            }
        };

        let (video_sender, video_receiver) = bounded(FRAME_QUEUE_LEN);
        let (command_sender, commands) = bounded(16);
        let stop_flag = Arc::new(AtomicBool::new(false));

        let decoder_handle = start_decoder_thread(DecoderParams {
            location: location.to_owned(),
            video_sender,
            audio_ring,
            commands,
            clock: clock.clone(),
            stop_flag: stop_flag.clone(),
            reporter,
        })?;

        Ok(Self {
            decoder_handle: Some(decoder_handle),
            command_sender,
            stop_flag,
            audio,
            clock,
            frame_queue: FrameQueue::new(video_receiver, FRAME_QUEUE_LEN),
            texture: None,
            video_size: (0, 0),
            duration: 0.0,
            seek_target: None,
        })
    }

    fn set_position(&mut self, fraction: f32) {
        let fraction = f64::from(fraction.clamp(0.0, 1.0));
        self.frame_queue.clear();

        if self.duration > 0.0 {
            let target = fraction * self.duration;
            self.seek_target = Some(target);
            self.clock.anchor(target);
            let _ = self.command_sender.send(DecoderCommand::Seek(target));
        } else {
            // Live input: skip what is buffered and follow the newest frames
            let _ = self.command_sender.send(DecoderCommand::Resync);
        }
    }

    fn show(&mut self, ctx: &Context, frame: DecodedVideoFrame) {
        let size = [frame.width as usize, frame.height as usize];
        let image = ColorImage::from_rgba_unmultiplied(size, &frame.rgba);
        self.video_size = (frame.width, frame.height);

        match self.texture {
            Some(ref mut texture) => texture.set(image, TextureOptions::LINEAR),
            None => self.texture = Some(ctx.load_texture("video_frame", image, TextureOptions::LINEAR)),
        }
    }

    fn update(&mut self, ctx: &Context) {
        let frame = match self.seek_target {
            Some(target) => {
                let frame = self.frame_queue.first_after_seek(target);
                if let Some(ref frame) = frame {
                    self.clock.anchor(frame.pts);
                    self.seek_target = None;
                }
                frame
            }
            None => self.frame_queue.next_due(self.clock.position()),
        };

        if let Some(frame) = frame {
            self.show(ctx, frame);
        }
    }

    /// Stop the decoder and wait for it. Blocking input is interrupted through the stop flag.
    fn shutdown(mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        let _ = self.command_sender.send(DecoderCommand::Stop);

        if let Some(handle) = self.decoder_handle.take() {
            if handle.join().is_err() {
                error!("decoder thread panicked");
            }
        }
    }
}

/// FFmpeg-backed media engine: decodes on a worker thread, plays audio with
/// rodio and syncs video frames to the media clock.
pub struct FfmpegEngine {
    ctx: Context,
    location: Option<String>,
    volume: u32,
    generation: u64,
    report_sender: Sender<Report>,
    report_receiver: Receiver<Report>,
    pipeline: Option<Pipeline>,
}

impl FfmpegEngine {
    pub fn new(ctx: Context) -> Self {
        let (report_sender, report_receiver) = unbounded();
        Self {
            ctx,
            location: None,
            volume: 100,
            generation: 0,
            report_sender,
            report_receiver,
            pipeline: None,
        }
    }

    /// Advance the displayed frame (call each UI frame)
    pub fn update(&mut self, ctx: &Context) {
        if let Some(ref mut pipeline) = self.pipeline {
            pipeline.update(ctx);
        }
    }

    pub fn texture(&self) -> Option<&TextureHandle> {
        self.pipeline.as_ref().and_then(|p| p.texture.as_ref())
    }

    pub fn video_size(&self) -> (u32, u32) {
        self.pipeline.as_ref().map_or((0, 0), |p| p.video_size)
    }

    fn reporter(&self) -> Reporter {
        Reporter::new(self.generation, self.report_sender.clone(), self.ctx.clone())
    }

    fn teardown(&mut self) {
        // Reports still in flight from the old pipeline no longer match
        self.generation += 1;
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.shutdown();
        }
    }
}

impl MediaEngine for FfmpegEngine {
    fn open(&mut self, location: &str) {
        self.teardown();
        self.location = Some(location.to_owned());
    }

    fn play(&mut self) {
        if self.pipeline.is_some() {
            return;
        }
        let Some(location) = self.location.clone() else {
            return;
        };

        info!(%location, "starting playback");
        match Pipeline::start(&location, self.volume, self.reporter()) {
            Ok(pipeline) => self.pipeline = Some(pipeline),
            Err(e) => {
                error!("failed to start playback: {:#}", e);
                self.reporter().playback(PlaybackEvent::Error);
            }
        }
    }

    fn set_volume(&mut self, level: u32) {
        self.volume = level.min(MAX_VOLUME);
        if let Some(audio) = self.pipeline.as_ref().and_then(|p| p.audio.as_ref()) {
            audio.set_volume(self.volume);
        }
    }

    fn set_position(&mut self, fraction: f32) {
        if let Some(ref mut pipeline) = self.pipeline {
            pipeline.set_position(fraction);
        }
    }

    fn try_next_event(&mut self) -> Option<PlaybackEvent> {
        loop {
            let report = self.report_receiver.try_recv().ok()?;
            if report.generation != self.generation {
                continue;
            }

            match report.kind {
                ReportKind::Duration(seconds) => {
                    debug!("media duration {:.1}s", seconds);
                    if let Some(ref mut pipeline) = self.pipeline {
                        pipeline.duration = seconds;
                    }
                }
                ReportKind::Playback(event) => {
                    if event == PlaybackEvent::Playing {
                        let audio = self.pipeline.as_ref().and_then(|p| p.audio.as_ref());
                        if let Some(audio) = audio {
                            audio.resume();
                        }
                    }
                    return Some(event);
                }
            }
        }
    }

    fn close(&mut self) {
        self.teardown();
        self.location = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_from_old_pipelines_are_discarded() {
        let mut engine = FfmpegEngine::new(Context::default());
        let stale = engine.reporter();
        engine.close();

        stale.playback(PlaybackEvent::Error);
        engine.reporter().playback(PlaybackEvent::Opening);

        assert_eq!(engine.try_next_event(), Some(PlaybackEvent::Opening));
        assert_eq!(engine.try_next_event(), None);
    }
}
