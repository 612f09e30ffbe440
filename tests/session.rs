use std::collections::VecDeque;
use std::time::Duration;

use twitch_player::catalog::{
    CatalogError, CatalogResponse, MediaInfo, PlaylistInfo, StreamCatalog, StreamIndex,
};
use twitch_player::player::{MediaEngine, PlaybackEvent};
use twitch_player::session::{
    live_edge_position, Clock, ManualClock, PlaybackSession, SessionConfig,
};
use twitch_player::settings::{QualityMemory, SettingsStore};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Open(String),
    Play,
    Volume(u32),
    Position(f32),
    Close,
}

#[derive(Default)]
struct FakeEngine {
    calls: Vec<Call>,
    events: VecDeque<PlaybackEvent>,
}

impl FakeEngine {
    fn opened(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Open(location) => Some(location.as_str()),
                _ => None,
            })
            .collect()
    }

    fn last_volume(&self) -> Option<u32> {
        self.calls.iter().rev().find_map(|c| match c {
            Call::Volume(level) => Some(*level),
            _ => None,
        })
    }
}

impl MediaEngine for FakeEngine {
    fn open(&mut self, location: &str) {
        self.calls.push(Call::Open(location.to_owned()));
    }

    fn play(&mut self) {
        self.calls.push(Call::Play);
    }

    fn set_volume(&mut self, level: u32) {
        self.calls.push(Call::Volume(level));
    }

    fn set_position(&mut self, fraction: f32) {
        self.calls.push(Call::Position(fraction));
    }

    fn try_next_event(&mut self) -> Option<PlaybackEvent> {
        self.events.pop_front()
    }

    fn close(&mut self) {
        self.calls.push(Call::Close);
    }
}

#[derive(Default)]
struct FakeCatalog {
    requested: Vec<String>,
    responses: VecDeque<CatalogResponse>,
}

impl FakeCatalog {
    fn respond(&mut self, channel: &str, qualities: &[&str]) {
        let index = StreamIndex {
            playlist_infos: qualities
                .iter()
                .map(|name| PlaylistInfo {
                    media_info: MediaInfo {
                        name: name.to_string(),
                        group_id: None,
                    },
                    ..Default::default()
                })
                .collect(),
        };
        self.responses.push_back(CatalogResponse {
            channel: channel.to_owned(),
            result: Ok(index),
        });
    }

    fn fail(&mut self, channel: &str) {
        self.responses.push_back(CatalogResponse {
            channel: channel.to_owned(),
            result: Err(CatalogError::NotFound(channel.to_owned())),
        });
    }
}

impl StreamCatalog for FakeCatalog {
    fn request_qualities(&mut self, channel: &str) {
        self.requested.push(channel.to_owned());
    }

    fn try_next_response(&mut self) -> Option<CatalogResponse> {
        self.responses.pop_front()
    }

    fn playback_url(&self, channel: &str, quality: &str) -> String {
        format!("fake://{}/{}", channel, quality)
    }
}

type Session = PlaybackSession<FakeEngine, FakeCatalog, QualityMemory, ManualClock>;

const BASE: Duration = Duration::from_millis(1000);

fn session() -> (Session, ManualClock) {
    let clock = ManualClock::new();
    let config = SessionConfig {
        initial_volume: 100,
        retry_base: BASE,
        retry_max: Duration::from_secs(3600),
    };
    let session = PlaybackSession::new(
        FakeEngine::default(),
        FakeCatalog::default(),
        QualityMemory::default(),
        clock.clone(),
        config,
    );
    (session, clock)
}

fn emit(session: &mut Session, event: PlaybackEvent) {
    session.engine_mut().events.push_back(event);
    session.tick();
}

#[test]
fn play_opens_resolved_location_and_requests_qualities() {
    let (mut session, _) = session();
    session.play("lirik", "720p");

    let engine = session.engine();
    assert_eq!(engine.opened(), ["fake://lirik/720p"]);
    assert_eq!(engine.calls.last(), Some(&Call::Play));
    assert_eq!(session.catalog().requested, ["lirik"]);
    assert_eq!(session.overlay().channel(), Some("lirik"));
    assert!(session.overlay().details_visible());
    assert_eq!(session.selection().unwrap().quality, "720p");
}

#[test]
fn only_explicit_quality_is_remembered() {
    let (mut session, _) = session();
    session.play("lirik", "");
    assert_eq!(session.settings().last_quality("lirik"), None);

    session.play("lirik", "480p");
    assert_eq!(session.settings().last_quality("lirik").as_deref(), Some("480p"));
}

#[test]
fn play_channel_uses_remembered_quality() {
    let (mut session, _) = session();
    session.play("lirik", "480p");
    session.play_channel("shroud");
    session.play_channel("lirik");

    assert_eq!(
        session.engine().opened(),
        ["fake://lirik/480p", "fake://shroud/", "fake://lirik/480p"]
    );
}

#[test]
fn quality_list_arrives_asynchronously() {
    let (mut session, _) = session();
    session.play("lirik", "720p");
    assert!(session.overlay().qualities().is_empty());

    session
        .catalog_mut()
        .respond("lirik", &["1080p60", "720p", "480p"]);
    session.tick();

    assert_eq!(session.overlay().qualities(), ["1080p60", "720p", "480p"]);
    assert_eq!(session.overlay().current_quality(), "720p");
}

#[test]
fn audio_only_variant_is_not_offered() {
    let (mut session, _) = session();
    session.play("lirik", "");
    session
        .catalog_mut()
        .respond("lirik", &["1080p60", "720p", "audio_only"]);
    session.tick();

    assert_eq!(session.overlay().qualities(), ["1080p60", "720p"]);
}

#[test]
fn every_played_channel_becomes_recent() {
    let (mut session, _) = session();
    session.play_channel("lirik");
    session.play("shroud", "720p");

    assert_eq!(
        session.settings().channels().collect::<Vec<_>>(),
        ["shroud", "lirik"]
    );
}

#[test]
fn change_quality_replays_current_channel() {
    let (mut session, _) = session();
    session.play("lirik", "720p");
    session.change_quality("480p");

    assert_eq!(
        session.engine().opened(),
        ["fake://lirik/720p", "fake://lirik/480p"]
    );
}

#[test]
fn volume_is_clamped() {
    let (mut session, _) = session();
    for (input, applied) in [(-5, 0), (0, 0), (150, 150), (200, 200), (999, 200)] {
        session.set_volume(input);
        assert_eq!(session.engine().last_volume(), Some(applied));
        assert_eq!(session.volume(), applied);
    }
    assert_eq!(session.overlay().message(session.now()), Some("200 %"));
}

#[test]
fn mute_wins_over_stored_level() {
    let (mut session, _) = session();
    session.set_volume(80);
    session.set_muted(true);
    assert_eq!(session.engine().last_volume(), Some(0));

    session.set_volume(150);
    assert_eq!(session.engine().last_volume(), Some(0));
    assert_eq!(session.volume(), 150);
    assert_eq!(session.overlay().volume(), 150);

    session.toggle_muted();
    assert_eq!(session.engine().last_volume(), Some(150));
    assert!(!session.overlay().is_muted());
    assert_eq!(session.overlay().message(session.now()), Some("Unmuted"));
}

#[test]
fn nudge_steps_and_clamps() {
    let (mut session, _) = session();
    session.set_volume(198);
    session.nudge_volume(true, false);
    assert_eq!(session.volume(), 200);

    session.nudge_volume(false, true);
    assert_eq!(session.volume(), 199);

    session.set_volume(3);
    session.nudge_volume(false, false);
    assert_eq!(session.volume(), 0);
}

#[test]
fn fast_forward_targets_just_before_live_edge() {
    let (mut session, _) = session();
    session.fast_forward();

    let Some(Call::Position(p)) = session.engine().calls.last().cloned() else {
        panic!("no position set");
    };
    assert_eq!(p, live_edge_position());
    assert!(p < 1.0 && 1.0 - p < 1e-6);
    assert_eq!(session.overlay().message(session.now()), Some("Fast forward..."));
}

#[test]
fn buffering_flag_follows_events() {
    let (mut session, _) = session();
    session.play("lirik", "");

    emit(&mut session, PlaybackEvent::Opening);
    assert!(session.overlay().is_buffering());

    emit(&mut session, PlaybackEvent::Buffering { percent: 99.0 });
    assert!(session.overlay().is_buffering());

    emit(&mut session, PlaybackEvent::Buffering { percent: 100.0 });
    assert!(!session.overlay().is_buffering());

    emit(&mut session, PlaybackEvent::Playing);
    assert!(!session.overlay().is_buffering());
    assert!(!session.retry().is_pending());
}

#[test]
fn stalled_input_shows_buffering_until_it_resumes_or_fails() {
    let (mut session, clock) = session();
    session.play("lirik", "");
    emit(&mut session, PlaybackEvent::Playing);

    emit(&mut session, PlaybackEvent::Buffering { percent: 0.0 });
    assert!(session.overlay().is_buffering());
    emit(&mut session, PlaybackEvent::Buffering { percent: 100.0 });
    assert!(!session.overlay().is_buffering());

    emit(&mut session, PlaybackEvent::Buffering { percent: 0.0 });
    emit(&mut session, PlaybackEvent::Error);
    assert_eq!(session.retry().deadline(), Some(clock.now() + BASE));

    clock.advance(BASE);
    session.tick();
    assert_eq!(session.engine().opened().len(), 2);
}

#[test]
fn burst_of_stopped_events_arms_one_reconnect() {
    let (mut session, clock) = session();
    session.play("lirik", "720p");

    emit(&mut session, PlaybackEvent::Stopped);
    clock.set(Duration::from_millis(10));
    emit(&mut session, PlaybackEvent::Stopped);
    clock.set(Duration::from_millis(20));
    emit(&mut session, PlaybackEvent::Stopped);

    assert_eq!(session.retry().deadline(), Some(BASE));

    clock.set(Duration::from_millis(999));
    session.tick();
    assert_eq!(session.engine().opened().len(), 1);

    clock.set(BASE);
    session.tick();
    assert_eq!(
        session.engine().opened(),
        ["fake://lirik/720p", "fake://lirik/720p"]
    );

    clock.advance(Duration::from_secs(60));
    session.tick();
    assert_eq!(session.engine().opened().len(), 2);
}

#[test]
fn consecutive_failures_double_the_interval() {
    let (mut session, clock) = session();
    session.play("lirik", "");

    for n in 1..=5u32 {
        let start = clock.now();
        emit(&mut session, PlaybackEvent::Error);
        let armed = session.retry().deadline().unwrap() - start;
        assert_eq!(armed, BASE * 2u32.pow(n - 1));

        clock.advance(armed);
        session.tick();
    }
    assert_eq!(session.engine().opened().len(), 6);
}

#[test]
fn successful_catalog_fetch_resets_backoff() {
    let (mut session, clock) = session();
    session.play("lirik", "");

    for event in [PlaybackEvent::EndReached, PlaybackEvent::Error, PlaybackEvent::Stopped] {
        emit(&mut session, event);
        clock.advance(session.retry().remaining(clock.now()).unwrap());
        session.tick();
    }
    assert_eq!(session.retry().interval(), BASE * 8);

    session.catalog_mut().respond("lirik", &["720p"]);
    session.tick();
    assert_eq!(session.retry().interval(), BASE);

    let start = clock.now();
    emit(&mut session, PlaybackEvent::Error);
    assert_eq!(session.retry().deadline(), Some(start + BASE));
}

#[test]
fn catalog_reset_keeps_armed_reconnect() {
    let (mut session, clock) = session();
    session.play("lirik", "");
    emit(&mut session, PlaybackEvent::Error);
    clock.advance(BASE);
    session.tick();

    emit(&mut session, PlaybackEvent::Error);
    let deadline = session.retry().deadline();
    assert_eq!(deadline, Some(BASE + BASE * 2));

    session.catalog_mut().respond("lirik", &["720p"]);
    session.tick();
    assert_eq!(session.retry().deadline(), deadline);
}

#[test]
fn catalog_failure_leaves_backoff_alone() {
    let (mut session, clock) = session();
    session.play("lirik", "");
    emit(&mut session, PlaybackEvent::Error);
    clock.advance(BASE);
    session.tick();
    assert_eq!(session.retry().interval(), BASE * 2);

    session.catalog_mut().fail("lirik");
    session.tick();
    assert_eq!(session.retry().interval(), BASE * 2);
    assert!(session.overlay().qualities().is_empty());
}

#[test]
fn stale_catalog_response_is_ignored() {
    let (mut session, clock) = session();
    session.play("lirik", "");
    emit(&mut session, PlaybackEvent::Error);
    clock.advance(BASE);
    session.tick();

    session.play("shroud", "");
    emit(&mut session, PlaybackEvent::Error);
    clock.advance(BASE);
    session.tick();
    assert_eq!(session.retry().interval(), BASE * 2);

    session.catalog_mut().respond("lirik", &["1080p60", "720p"]);
    session.tick();

    assert!(session.overlay().qualities().is_empty());
    assert_eq!(session.retry().interval(), BASE * 2);
    assert_eq!(session.selection().unwrap().channel, "shroud");
}

#[test]
fn manual_play_cancels_pending_reconnect() {
    let (mut session, clock) = session();
    session.play("lirik", "");
    emit(&mut session, PlaybackEvent::Error);
    assert!(session.retry().is_pending());

    session.play("shroud", "");
    assert!(!session.retry().is_pending());

    clock.advance(BASE * 10);
    session.tick();
    assert_eq!(
        session.engine().opened(),
        ["fake://lirik/", "fake://shroud/"]
    );
}

#[test]
fn stop_closes_engine_and_disarms() {
    let (mut session, clock) = session();
    session.play("lirik", "");
    emit(&mut session, PlaybackEvent::EndReached);

    session.stop();
    assert_eq!(session.engine().calls.last(), Some(&Call::Close));
    assert!(session.selection().is_none());
    assert_eq!(session.overlay().channel(), None);

    clock.advance(BASE);
    session.tick();
    assert_eq!(session.engine().opened().len(), 1);
}

#[test]
fn next_wakeup_tracks_reconnect_deadline() {
    let (mut session, clock) = session();
    assert_eq!(session.next_wakeup(), None);

    session.play("lirik", "");
    emit(&mut session, PlaybackEvent::Stopped);
    clock.advance(Duration::from_millis(400));
    assert_eq!(session.next_wakeup(), Some(Duration::from_millis(600)));
}
