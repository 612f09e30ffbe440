use anyhow::Result;
use egui::{pos2, CentralPanel, Color32, Context, Frame, Key, Rect, Sense, Ui, Vec2, ViewportCommand};
use tracing::info;

use twitch_player::overlay::{HostEvent, HostGeometry, OverlaySync};
use twitch_player::session::MonotonicClock;
use twitch_player::{
    ControlAction, ControlsOverlay, DetailsOverlay, FfmpegEngine, PlaybackSession, PlayerConfig,
    QualityMemory, StreamPicker, TwitchdClient,
};

type Session = PlaybackSession<FfmpegEngine, TwitchdClient, QualityMemory, MonotonicClock>;

/// Controls height assumed until the overlay has been measured
const INITIAL_CONTROLS_HEIGHT: f32 = 40.0;

enum Surface {
    Picker,
    Stream,
}

pub struct PlayerApp {
    session: Session,
    picker: StreamPicker,
    surface: Surface,
    overlay_sync: OverlaySync,
}

impl PlayerApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: PlayerConfig) -> Result<Self> {
        let settings = QualityMemory::load(cc.storage);
        let catalog = TwitchdClient::new(config.endpoint)?.with_wake(cc.egui_ctx.clone());
        let engine = FfmpegEngine::new(cc.egui_ctx.clone());
        let session = PlaybackSession::new(
            engine,
            catalog,
            settings,
            MonotonicClock::new(),
            config.session,
        );

        let host = HostGeometry {
            origin: pos2(0.0, 0.0),
            surface_size: Vec2::ZERO,
        };
        let mut app = Self {
            session,
            picker: StreamPicker::default(),
            surface: Surface::Picker,
            overlay_sync: OverlaySync::new(host, INITIAL_CONTROLS_HEIGHT),
        };

        if let Some(channel) = config.initial_channel {
            app.play(&channel);
        }
        Ok(app)
    }

    /// Swap the picker for the playback surface and start `channel`.
    fn play(&mut self, channel: &str) {
        self.surface = Surface::Stream;
        self.session.play_channel(channel);
        self.overlay_sync
            .handle(HostEvent::Shown, self.session.now());
    }

    fn back_to_picker(&mut self) {
        info!("returning to channel picker");
        self.session.stop();
        self.surface = Surface::Picker;
    }

    /// Draw the video and handle pointer input. Returns the surface rect.
    fn stream_surface(&mut self, ui: &mut Ui) -> Rect {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let engine = self.session.engine();

        if let Some(texture) = engine.texture() {
            let (width, height) = engine.video_size();
            let aspect = width as f32 / height.max(1) as f32;
            let display_size = if aspect > rect.aspect_ratio() {
                Vec2::new(rect.width(), rect.width() / aspect)
            } else {
                Vec2::new(rect.height() * aspect, rect.height())
            };
            ui.painter().image(
                texture.id(),
                Rect::from_center_size(rect.center(), display_size),
                Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0)),
                Color32::WHITE,
            );
        }

        let pointer_moved = ui.input(|i| i.pointer.is_moving());
        if response.clicked() || (response.hovered() && pointer_moved) {
            self.session.reveal();
        }
        if response.drag_started() {
            ui.ctx().send_viewport_cmd(ViewportCommand::StartDrag);
        }
        if response.double_clicked() {
            let fullscreen = ui.input(|i| i.viewport().fullscreen.unwrap_or(false));
            ui.ctx()
                .send_viewport_cmd(ViewportCommand::Fullscreen(!fullscreen));
        }
        if response.hovered() {
            let (scroll, fine) = ui.input(|i| (i.raw_scroll_delta.y, i.modifiers.shift));
            if scroll != 0.0 {
                self.session.nudge_volume(scroll > 0.0, fine);
            }
        }

        rect
    }

    fn handle_keys(&mut self, ctx: &Context) {
        let (released, pressed) = ctx.input(|i| {
            let released = i.events.iter().any(|e| {
                matches!(e, egui::Event::Key { pressed: false, .. })
            });
            let pressed: Vec<Key> = [Key::M, Key::ArrowRight, Key::ArrowUp, Key::ArrowDown, Key::Escape]
                .into_iter()
                .filter(|key| i.key_pressed(*key))
                .collect();
            (released, pressed)
        });

        if released {
            self.overlay_sync
                .handle(HostEvent::KeyReleased, self.session.now());
        }
        for key in pressed {
            match key {
                Key::M => self.session.toggle_muted(),
                Key::ArrowRight => self.session.fast_forward(),
                Key::ArrowUp => self.session.nudge_volume(true, false),
                Key::ArrowDown => self.session.nudge_volume(false, false),
                Key::Escape => self.back_to_picker(),
                _ => {}
            }
        }
    }

    fn overlays(&mut self, ctx: &Context) {
        let now = self.session.now();
        let geometry = self.overlay_sync.geometry();

        DetailsOverlay::show(ctx, geometry.status, self.session.overlay(), now);
        let (actions, height) =
            ControlsOverlay::show(ctx, geometry.controls, self.session.overlay(), now);

        if let Some(height) = height {
            if (height - geometry.controls.height()).abs() > 0.5 {
                self.overlay_sync.set_controls_height(height);
                self.overlay_sync.handle(HostEvent::Resized, now);
            }
        }

        for action in actions {
            match action {
                ControlAction::Quality(quality) => self.session.change_quality(&quality),
                ControlAction::Volume(level) => self.session.set_volume(level),
                ControlAction::Muted(muted) => self.session.set_muted(muted),
                ControlAction::FastForward => self.session.fast_forward(),
            }
        }
    }
}

impl eframe::App for PlayerApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        self.session.tick();
        self.session.engine_mut().update(ctx);
        self.overlay_sync.tick(self.session.now());

        let mut picked = None;
        let mut surface_rect = None;

        CentralPanel::default()
            .frame(Frame::none().fill(Color32::BLACK))
            .show(ctx, |ui| match self.surface {
                Surface::Picker => {
                    picked = self
                        .picker
                        .show(ui, self.session.settings().channels());
                }
                Surface::Stream => surface_rect = Some(self.stream_surface(ui)),
            });

        if let Some(channel) = picked {
            self.play(&channel);
        }

        if let Some(rect) = surface_rect {
            let window_pos = ctx.input(|i| i.viewport().outer_rect.map(|r| r.min));
            let host = HostGeometry {
                origin: rect.min,
                surface_size: rect.size(),
            };
            self.overlay_sync
                .observe(window_pos, host, self.session.now());

            self.handle_keys(ctx);
            self.overlays(ctx);

            // Keep frames flowing while a stream is up
            ctx.request_repaint();
        }

        let now = self.session.now();
        let wakeup = [self.session.next_wakeup(), self.overlay_sync.next_wakeup(now)]
            .into_iter()
            .flatten()
            .min();
        if let Some(after) = wakeup {
            ctx.request_repaint_after(after);
        }
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        self.session.settings().save(storage);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.session.stop();
    }
}
