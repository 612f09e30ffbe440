use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};
use ffmpeg_next::format::Pixel;
use ffmpeg_next::frame::{Audio as AudioFrame, Video as VideoFrame};
use ffmpeg_next::media::Type;
use ffmpeg_next::software::resampling::Context as ResamplerContext;
use ffmpeg_next::software::scaling::{Context as ScalerContext, Flags};
use ffmpeg_next::util::channel_layout::ChannelLayout;
use ffmpeg_next::util::format::sample::Sample;
use ffmpeg_next::{codec, Packet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, warn};

use super::audio::SampleRing;
use super::clock::MediaClock;
use super::stall::{StallCheck, StallWatch, WaitOutcome, READ_TIMEOUT, STALL_AFTER};
use super::video::DecodedVideoFrame;
use super::PlaybackEvent;

/// Frames decoded before playback is reported as started
const PREBUFFER_FRAMES: usize = 15;
/// Consecutive packet read failures tolerated before giving up on the stream
const MAX_READ_ERRORS: usize = 64;

/// Commands sent to the decoder thread
pub enum DecoderCommand {
    /// Seek to a position in seconds (inputs with a known duration)
    Seek(f64),
    /// Re-anchor the clock on the next decoded frame (live edge)
    Resync,
    Stop,
}

pub enum ReportKind {
    Playback(PlaybackEvent),
    Duration(f64),
}

/// Message from a decoder thread, tagged with the pipeline generation.
pub struct Report {
    pub generation: u64,
    pub kind: ReportKind,
}

/// Posts reports for one pipeline and wakes the UI.
#[derive(Clone)]
pub struct Reporter {
    generation: u64,
    sender: Sender<Report>,
    wake: egui::Context,
}

impl Reporter {
    pub fn new(generation: u64, sender: Sender<Report>, wake: egui::Context) -> Self {
        Self {
            generation,
            sender,
            wake,
        }
    }

    pub fn playback(&self, event: PlaybackEvent) {
        self.send(ReportKind::Playback(event));
    }

    fn send(&self, kind: ReportKind) {
        let report = Report {
            generation: self.generation,
            kind,
        };
        if self.sender.send(report).is_ok() {
            self.wake.request_repaint();
        }
    }
}

/// Why the decode loop returned without an error.
enum Exit {
    EndOfStream,
    Requested,
    ControllerGone,
}

/// Everything the decoder thread needs
pub struct DecoderParams {
    pub location: String,
    pub video_sender: Sender<DecodedVideoFrame>,
    pub audio_ring: Arc<SampleRing>,
    pub commands: Receiver<DecoderCommand>,
    pub clock: MediaClock,
    pub stop_flag: Arc<AtomicBool>,
    pub reporter: Reporter,
}

pub fn start_decoder_thread(params: DecoderParams) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("decoder".into())
        .spawn(move || run(params))
        .context("failed to spawn decoder thread")
}

fn run(params: DecoderParams) {
    let reporter = params.reporter.clone();
    reporter.playback(PlaybackEvent::Opening);

    let exit = decode_loop(params);
    match exit {
        Ok(Exit::Requested) => debug!("decoder stopped"),
        // Only happens during teardown, after the engine moved to a new generation
        Ok(Exit::ControllerGone) => debug!("decoder lost its engine"),
        Ok(Exit::EndOfStream) => debug!("end of stream"),
        Err(ref e) => error!("decoder error: {:#}", e),
    }
    if let Some(event) = exit_event(&exit) {
        reporter.playback(event);
    }
}

/// Terminal event reported for the way the decode loop ended, if any.
fn exit_event(exit: &Result<Exit>) -> Option<PlaybackEvent> {
    match exit {
        Ok(Exit::EndOfStream) => Some(PlaybackEvent::EndReached),
        Ok(Exit::Requested | Exit::ControllerGone) => None,
        Err(_) => Some(PlaybackEvent::Error),
    }
}

/// Tracks startup buffering and reports progress once per percent change.
struct Prebuffer {
    frames: usize,
    reported: Option<u32>,
}

impl Prebuffer {
    fn new() -> Self {
        Self {
            frames: 0,
            reported: None,
        }
    }

    /// Count a frame; returns events to report.
    fn on_frame(&mut self) -> Vec<PlaybackEvent> {
        if self.frames >= PREBUFFER_FRAMES {
            return Vec::new();
        }
        self.frames += 1;

        let percent = (self.frames * 100 / PREBUFFER_FRAMES) as u32;
        if self.reported == Some(percent) {
            return Vec::new();
        }
        self.reported = Some(percent);

        let mut events = vec![PlaybackEvent::Buffering {
            percent: percent as f32,
        }];
        if self.frames == PREBUFFER_FRAMES {
            events.push(PlaybackEvent::Playing);
        }
        events
    }
}

/// Pending control state collected from the command channel
#[derive(Default)]
struct Control {
    seek: Option<f64>,
    resync: bool,
}

/// Drain the command channel. `Some(exit)` means the loop must return.
fn poll_commands(commands: &Receiver<DecoderCommand>, control: &mut Control) -> Option<Exit> {
    loop {
        match commands.try_recv() {
            Ok(DecoderCommand::Seek(target)) => control.seek = Some(target),
            Ok(DecoderCommand::Resync) => control.resync = true,
            Ok(DecoderCommand::Stop) => return Some(Exit::Requested),
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => return Some(Exit::ControllerGone),
        }
    }
}

fn decode_loop(params: DecoderParams) -> Result<Exit> {
    let DecoderParams {
        location,
        video_sender,
        audio_ring,
        commands,
        clock,
        stop_flag,
        reporter,
    } = params;

    let stall = Arc::new(StallWatch::new(STALL_AFTER, READ_TIMEOUT));
    let interrupt = {
        let stop_flag = stop_flag.clone();
        let stall = stall.clone();
        let reporter = reporter.clone();
        move || {
            if stop_flag.load(Ordering::Relaxed) {
                return true;
            }
            match stall.check(stall.now()) {
                StallCheck::Waiting => false,
                StallCheck::Stalled => {
                    reporter.playback(PlaybackEvent::Buffering { percent: 0.0 });
                    false
                }
                StallCheck::TimedOut => true,
            }
        }
    };

    stall.begin_wait(stall.now());
    let opened = ffmpeg_next::format::input_with_interrupt(&location, interrupt);
    let open_outcome = stall.end_wait(stall.now());
    if stop_flag.load(Ordering::Relaxed) {
        return Ok(Exit::Requested);
    }
    if open_outcome == WaitOutcome::TimedOut {
        bail!("no response from {} within {:?}", location, stall.timeout());
    }
    let mut input = opened.with_context(|| format!("failed to open {}", location))?;

    let video_stream = input
        .streams()
        .best(Type::Video)
        .ok_or_else(|| anyhow!("no video stream"))?;
    let video_stream_index = video_stream.index();
    let video_time_base = video_stream.time_base();
    let mut video_decoder = codec::Context::from_parameters(video_stream.parameters())?
        .decoder()
        .video()?;

    let (audio_stream_index, mut audio_decoder) = match input.streams().best(Type::Audio) {
        Some(stream) => (
            Some(stream.index()),
            Some(
                codec::Context::from_parameters(stream.parameters())?
                    .decoder()
                    .audio()?,
            ),
        ),
        None => {
            warn!("stream has no audio, timing video by wall clock");
            clock.drive_by_wall_clock();
            (None, None)
        }
    };

    if input.duration() > 0 {
        let seconds = input.duration() as f64 / ffmpeg_next::ffi::AV_TIME_BASE as f64;
        reporter.send(ReportKind::Duration(seconds));
    }

    let mut scaler: Option<ScalerContext> = None;
    let mut resampler = match audio_decoder {
        Some(ref decoder) => Some(ResamplerContext::get(
            decoder.format(),
            decoder.channel_layout(),
            decoder.rate(),
            Sample::F32(ffmpeg_next::util::format::sample::Type::Packed),
            ChannelLayout::STEREO,
            clock.sample_rate(),
        )?),
        None => None,
    };

    let mut video_frame = VideoFrame::empty();
    let mut audio_frame = AudioFrame::empty();
    let mut rgba_frame = VideoFrame::empty();

    let mut control = Control {
        seek: None,
        resync: true,
    };
    let mut prebuffer = Prebuffer::new();
    let mut read_errors = 0;

    loop {
        if stop_flag.load(Ordering::Relaxed) {
            return Ok(Exit::Requested);
        }
        if let Some(exit) = poll_commands(&commands, &mut control) {
            return Ok(exit);
        }

        if let Some(target) = control.seek.take() {
            let target_ts = (target * ffmpeg_next::ffi::AV_TIME_BASE as f64) as i64;
            match input.seek(target_ts, ..target_ts) {
                Ok(()) => {
                    video_decoder.flush();
                    if let Some(ref mut decoder) = audio_decoder {
                        decoder.flush();
                    }
                    clock.anchor(target);
                }
                Err(e) => warn!("seek to {:.1}s failed: {}", target, e),
            }
        }

        let mut packet = Packet::empty();
        stall.begin_wait(stall.now());
        let read = packet.read(&mut input);
        let outcome = stall.end_wait(stall.now());

        match read {
            Ok(()) => {
                read_errors = 0;
                if outcome != WaitOutcome::Prompt {
                    debug!("input resumed");
                    reporter.playback(PlaybackEvent::Buffering { percent: 100.0 });
                }
            }
            Err(ffmpeg_next::Error::Eof) => return Ok(Exit::EndOfStream),
            Err(e) => {
                if stop_flag.load(Ordering::Relaxed) {
                    return Ok(Exit::Requested);
                }
                if outcome == WaitOutcome::TimedOut {
                    bail!("no data from stream within {:?}", stall.timeout());
                }
                read_errors += 1;
                if read_errors > MAX_READ_ERRORS {
                    bail!("stream keeps failing: {}", e);
                }
                continue;
            }
        }

        let stream_index = packet.stream();

        if stream_index == video_stream_index {
            video_decoder.send_packet(&packet)?;

            'frames: while video_decoder.receive_frame(&mut video_frame).is_ok() {
                let needs_scaler = scaler.as_ref().map_or(true, |s| {
                    let input = s.input();
                    input.width != video_frame.width()
                        || input.height != video_frame.height()
                        || input.format != video_frame.format()
                });
                if needs_scaler {
                    scaler = Some(ScalerContext::get(
                        video_frame.format(),
                        video_frame.width(),
                        video_frame.height(),
                        Pixel::RGBA,
                        video_frame.width(),
                        video_frame.height(),
                        Flags::BILINEAR,
                    )?);
                }
                if let Some(ref mut scaler) = scaler {
                    scaler.run(&video_frame, &mut rgba_frame)?;
                }

                let pts = video_frame.pts().unwrap_or(0) as f64 * f64::from(video_time_base);
                if control.resync {
                    clock.anchor(pts);
                    control.resync = false;
                }

                let mut frame = DecodedVideoFrame {
                    rgba: packed_rgba(&rgba_frame),
                    width: rgba_frame.width(),
                    height: rgba_frame.height(),
                    pts,
                };

                // Keep honoring commands while the consumer is slow
                loop {
                    if let Some(exit) = poll_commands(&commands, &mut control) {
                        return Ok(exit);
                    }
                    if control.seek.is_some() || control.resync {
                        break 'frames;
                    }

                    match video_sender.try_send(frame) {
                        Ok(()) => break,
                        Err(TrySendError::Full(f)) => {
                            frame = f;
                            thread::sleep(Duration::from_millis(1));
                        }
                        Err(TrySendError::Disconnected(_)) => return Ok(Exit::ControllerGone),
                    }
                }

                for event in prebuffer.on_frame() {
                    if event == PlaybackEvent::Playing {
                        clock.start();
                    }
                    reporter.playback(event);
                }
            }
        } else if Some(stream_index) == audio_stream_index {
            if let (Some(decoder), Some(resampler)) = (audio_decoder.as_mut(), resampler.as_mut()) {
                decoder.send_packet(&packet)?;

                while decoder.receive_frame(&mut audio_frame).is_ok() {
                    let mut resampled = AudioFrame::empty();
                    if resampler.run(&audio_frame, &mut resampled).is_err() {
                        continue;
                    }
                    let data = resampled.data(0);
                    let used = resampled.samples() * resampled.channels() as usize;
                    // SAFETY: packed f32 output, so plane 0 holds `used` aligned f32 samples
                    let samples: &[f32] = unsafe {
                        std::slice::from_raw_parts(data.as_ptr() as *const f32, used.min(data.len() / 4))
                    };
                    audio_ring.extend(samples);
                }
            }
        }
    }
}

/// Copy plane 0 without the row padding ffmpeg may add.
fn packed_rgba(frame: &VideoFrame) -> Vec<u8> {
    let width = frame.width() as usize * 4;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == width {
        return data[..width * frame.height() as usize].to_vec();
    }
    data.chunks(stride)
        .take(frame.height() as usize)
        .flat_map(|row| &row[..width])
        .copied()
        .collect()
}
