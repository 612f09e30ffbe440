pub mod retry;
pub mod timer;

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::catalog::{quality_names, CatalogResponse, StreamCatalog};
use crate::overlay::OverlayState;
use crate::player::{MediaEngine, PlaybackEvent, MAX_VOLUME};
use crate::settings::SettingsStore;

pub use retry::RetryController;
pub use timer::{Clock, ManualClock, MonotonicClock, OneShotTimer};

/// Volume steps for wheel and keyboard input
pub const VOLUME_STEP: u32 = 5;
pub const FINE_VOLUME_STEP: u32 = 1;

/// Channel and quality currently requested. An empty quality means auto.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlaybackSelection {
    pub channel: String,
    pub quality: String,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub initial_volume: u32,
    pub retry_base: Duration,
    pub retry_max: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            initial_volume: 100,
            retry_base: retry::DEFAULT_BASE_INTERVAL,
            retry_max: retry::DEFAULT_MAX_INTERVAL,
        }
    }
}

/// Position just short of the live edge: the largest `f32` below 1.0.
pub fn live_edge_position() -> f32 {
    f32::from_bits(1.0f32.to_bits() - 1)
}

/// Mediates user intents, media engine events and catalog responses for one
/// playback surface. Everything runs on the UI thread; asynchronous results
/// are picked up in [`PlaybackSession::tick`].
pub struct PlaybackSession<E, C, S, K = MonotonicClock> {
    engine: E,
    catalog: C,
    settings: S,
    clock: K,
    selection: Option<PlaybackSelection>,
    retry: RetryController,
    overlay: OverlayState,
    volume: u32,
    muted: bool,
}

impl<E, C, S, K> PlaybackSession<E, C, S, K>
where
    E: MediaEngine,
    C: StreamCatalog,
    S: SettingsStore,
    K: Clock,
{
    pub fn new(mut engine: E, catalog: C, settings: S, clock: K, config: SessionConfig) -> Self {
        let volume = config.initial_volume.min(MAX_VOLUME);
        engine.set_volume(volume);

        Self {
            engine,
            catalog,
            settings,
            clock,
            selection: None,
            retry: RetryController::new(config.retry_base, config.retry_max),
            overlay: OverlayState::new(volume),
            volume,
            muted: false,
        }
    }

    /// Play `channel` at `quality` on behalf of the user. Starts the backoff
    /// over and drops any reconnect still pending for the previous stream.
    pub fn play(&mut self, channel: &str, quality: &str) {
        self.retry.reset();
        self.retry.cancel();
        self.settings.remember_channel(channel);
        self.start(channel, quality);
    }

    /// Play `channel` at its remembered quality, or auto.
    pub fn play_channel(&mut self, channel: &str) {
        let quality = self.settings.last_quality(channel).unwrap_or_default();
        self.play(channel, &quality);
    }

    /// Switch quality on the current channel.
    pub fn change_quality(&mut self, quality: &str) {
        if let Some(channel) = self.selection.as_ref().map(|s| s.channel.clone()) {
            self.play(&channel, quality);
        }
    }

    fn start(&mut self, channel: &str, quality: &str) {
        let location = self.catalog.playback_url(channel, quality);
        info!(channel, quality, "opening stream");

        self.engine.open(&location);
        self.engine.play();

        self.selection = Some(PlaybackSelection {
            channel: channel.to_owned(),
            quality: quality.to_owned(),
        });

        self.overlay.set_channel(channel);
        self.overlay.clear_qualities();
        self.catalog.request_qualities(channel);
        self.overlay.show();

        if !quality.is_empty() {
            self.settings.set_last_quality(channel, quality);
        }
    }

    fn replay(&mut self) {
        match self.selection.clone() {
            Some(selection) => {
                info!(
                    channel = %selection.channel,
                    next_interval_ms = self.retry.interval().as_millis() as u64,
                    "reconnecting"
                );
                self.start(&selection.channel, &selection.quality);
            }
            None => debug!("reconnect fired without a selection"),
        }
    }

    /// Tear down playback and forget the selection.
    pub fn stop(&mut self) {
        self.retry.cancel();
        self.engine.close();
        self.selection = None;
        self.overlay.clear_channel();
    }

    /// Set volume in `0..=MAX_VOLUME`; out of range values are clamped.
    pub fn set_volume(&mut self, level: i32) {
        self.volume = level.clamp(0, MAX_VOLUME as i32) as u32;
        self.engine
            .set_volume(if self.muted { 0 } else { self.volume });

        let now = self.clock.now();
        self.overlay.set_volume(self.volume);
        self.overlay
            .show_transient_message(format!("{} %", self.volume), now);
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.set_volume(self.volume as i32);

        let now = self.clock.now();
        self.overlay.set_muted(muted);
        self.overlay
            .show_transient_message(if muted { "Muted" } else { "Unmuted" }, now);
    }

    pub fn toggle_muted(&mut self) {
        self.set_muted(!self.muted);
    }

    /// Step the volume up or down by [`VOLUME_STEP`], or [`FINE_VOLUME_STEP`] when `fine`.
    pub fn nudge_volume(&mut self, up: bool, fine: bool) {
        let step = if fine { FINE_VOLUME_STEP } else { VOLUME_STEP } as i32;
        let delta = if up { step } else { -step };
        self.set_volume(self.volume as i32 + delta);
    }

    pub fn fast_forward(&mut self) {
        self.engine.set_position(live_edge_position());
        let now = self.clock.now();
        self.overlay.show_transient_message("Fast forward...", now);
    }

    /// Show controls and stream details in response to pointer activity.
    pub fn reveal(&mut self) {
        let now = self.clock.now();
        self.overlay.reveal(now);
    }

    pub fn on_playback_event(&mut self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::Opening => self.overlay.set_buffering(true),
            PlaybackEvent::Buffering { percent } => self.overlay.set_buffering(percent < 100.0),
            PlaybackEvent::EndReached | PlaybackEvent::Stopped | PlaybackEvent::Error => {
                self.schedule_reconnect(event)
            }
            PlaybackEvent::Playing => {}
        }
    }

    fn schedule_reconnect(&mut self, cause: PlaybackEvent) {
        let now = self.clock.now();
        if self.retry.schedule(now) {
            warn!(
                ?cause,
                delay_ms = self.retry.interval().as_millis() as u64,
                "playback ended, reconnect scheduled"
            );
        } else {
            debug!(?cause, "reconnect already pending");
        }
    }

    pub fn on_catalog_response(&mut self, response: CatalogResponse) {
        let Some(selection) = self.selection.as_ref() else {
            return;
        };
        if selection.channel != response.channel {
            debug!(channel = %response.channel, "ignoring stale stream index");
            return;
        }

        match response.result {
            Ok(index) => {
                self.overlay
                    .set_quality_list(&selection.quality, quality_names(&index));
                self.retry.reset();
            }
            Err(e) => warn!(channel = %response.channel, "no quality list: {}", e),
        }
    }

    /// Process everything that became ready since the last call.
    pub fn tick(&mut self) {
        while let Some(event) = self.engine.try_next_event() {
            self.on_playback_event(event);
        }
        while let Some(response) = self.catalog.try_next_response() {
            self.on_catalog_response(response);
        }

        let now = self.clock.now();
        if self.retry.poll(now) {
            self.replay();
        }
        self.overlay.expire(now);
    }

    /// Time until the session next needs a tick, if anything is scheduled.
    pub fn next_wakeup(&self) -> Option<Duration> {
        let now = self.clock.now();
        [self.retry.remaining(now), self.overlay.next_wakeup(now)]
            .into_iter()
            .flatten()
            .min()
    }

    pub fn selection(&self) -> Option<&PlaybackSelection> {
        self.selection.as_ref()
    }

    pub fn overlay(&self) -> &OverlayState {
        &self.overlay
    }

    pub fn retry(&self) -> &RetryController {
        &self.retry
    }

    pub fn volume(&self) -> u32 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut C {
        &mut self.catalog
    }

    pub fn settings(&self) -> &S {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_edge_is_just_below_one() {
        let p = live_edge_position();
        assert!(p < 1.0);
        assert!(1.0 - p < 1e-6);
        assert_eq!(p, 1.0 - f32::EPSILON / 2.0);
    }
}
