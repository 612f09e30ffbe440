pub mod geometry;

use std::time::Duration;

pub use geometry::{HostEvent, HostGeometry, OverlayGeometry, OverlaySync};

/// How long a transient message stays on screen.
const MESSAGE_DURATION: Duration = Duration::from_millis(1500);
/// How long controls and stream details stay up after pointer activity.
const REVEAL_DURATION: Duration = Duration::from_secs(3);

#[derive(Clone, Debug, PartialEq)]
struct TransientMessage {
    text: String,
    until: Duration,
}

/// What the status and controls overlays display.
///
/// The session writes it, the UI reads it. Time-dependent parts take `now`
/// from the session clock so they can be tested without a frame loop.
#[derive(Clone, Debug, Default)]
pub struct OverlayState {
    channel: Option<String>,
    details_visible: bool,
    buffering: bool,
    message: Option<TransientMessage>,
    current_quality: String,
    qualities: Vec<String>,
    volume: u32,
    muted: bool,
    revealed_until: Option<Duration>,
}

impl OverlayState {
    pub fn new(volume: u32) -> Self {
        Self {
            volume,
            ..Self::default()
        }
    }

    pub fn set_channel(&mut self, channel: &str) {
        self.channel = Some(channel.to_owned());
    }

    pub fn clear_channel(&mut self) {
        self.channel = None;
        self.details_visible = false;
        self.buffering = false;
        self.clear_qualities();
    }

    pub fn show(&mut self) {
        self.details_visible = true;
    }

    pub fn set_buffering(&mut self, on: bool) {
        self.buffering = on;
    }

    pub fn show_transient_message(&mut self, text: impl Into<String>, now: Duration) {
        self.message = Some(TransientMessage {
            text: text.into(),
            until: now + MESSAGE_DURATION,
        });
    }

    pub fn clear_qualities(&mut self) {
        self.current_quality.clear();
        self.qualities.clear();
    }

    pub fn set_quality_list(&mut self, current: &str, qualities: Vec<String>) {
        self.current_quality = current.to_owned();
        self.qualities = qualities;
    }

    pub fn set_volume(&mut self, level: u32) {
        self.volume = level;
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// Bring up controls and stream details for a few seconds.
    pub fn reveal(&mut self, now: Duration) {
        self.revealed_until = Some(now + REVEAL_DURATION);
    }

    /// Drop the transient message and reveal window once they have elapsed.
    pub fn expire(&mut self, now: Duration) {
        if self.message.as_ref().is_some_and(|m| now >= m.until) {
            self.message = None;
        }
        if self.revealed_until.is_some_and(|until| now >= until) {
            self.revealed_until = None;
        }
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn details_visible(&self) -> bool {
        self.details_visible
    }

    pub fn is_buffering(&self) -> bool {
        self.buffering
    }

    pub fn message(&self, now: Duration) -> Option<&str> {
        self.message
            .as_ref()
            .filter(|m| now < m.until)
            .map(|m| m.text.as_str())
    }

    pub fn current_quality(&self) -> &str {
        &self.current_quality
    }

    pub fn qualities(&self) -> &[String] {
        &self.qualities
    }

    pub fn volume(&self) -> u32 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_revealed(&self, now: Duration) -> bool {
        self.revealed_until.is_some_and(|until| now < until)
    }

    /// Earliest time-based change the UI should repaint for.
    pub fn next_wakeup(&self, now: Duration) -> Option<Duration> {
        let message = self.message.as_ref().map(|m| m.until);
        [message, self.revealed_until]
            .into_iter()
            .flatten()
            .min()
            .map(|at| at.saturating_sub(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_message_expires() {
        let mut overlay = OverlayState::new(100);
        overlay.show_transient_message("Muted", Duration::ZERO);

        assert_eq!(overlay.message(Duration::from_millis(1499)), Some("Muted"));
        assert_eq!(overlay.message(MESSAGE_DURATION), None);

        overlay.expire(MESSAGE_DURATION);
        assert_eq!(overlay.next_wakeup(MESSAGE_DURATION), None);
    }

    #[test]
    fn newer_message_replaces_older() {
        let mut overlay = OverlayState::new(100);
        overlay.show_transient_message("Muted", Duration::ZERO);
        overlay.show_transient_message("Unmuted", Duration::from_millis(1000));

        assert_eq!(overlay.message(Duration::from_millis(2000)), Some("Unmuted"));
    }

    #[test]
    fn reveal_lasts_a_few_seconds() {
        let mut overlay = OverlayState::new(100);
        overlay.reveal(Duration::from_secs(10));

        assert!(overlay.is_revealed(Duration::from_secs(12)));
        assert!(!overlay.is_revealed(Duration::from_secs(13)));
        assert_eq!(
            overlay.next_wakeup(Duration::from_secs(11)),
            Some(Duration::from_secs(2))
        );
    }

    #[test]
    fn clearing_channel_resets_stream_details() {
        let mut overlay = OverlayState::new(100);
        overlay.set_channel("lirik");
        overlay.show();
        overlay.set_buffering(true);
        overlay.set_quality_list("720p", vec!["720p".into(), "480p".into()]);

        overlay.clear_channel();
        assert_eq!(overlay.channel(), None);
        assert!(!overlay.details_visible());
        assert!(!overlay.is_buffering());
        assert!(overlay.qualities().is_empty());
    }
}
