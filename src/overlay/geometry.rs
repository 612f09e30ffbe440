use egui::{Pos2, Rect, Vec2};
use std::time::Duration;

use crate::session::timer::OneShotTimer;

/// Delay before recomputing after the surface is first shown. The first
/// layout pass after showing reports stale sizes.
pub const SHOW_SETTLE_DELAY: Duration = Duration::from_millis(250);

/// Where the playback surface sits, in the coordinate space overlays are placed in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HostGeometry {
    pub origin: Pos2,
    pub surface_size: Vec2,
}

/// Placement of both overlays for one host geometry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayGeometry {
    pub status: Rect,
    pub controls: Rect,
}

/// Status overlay covers the surface from its top-left corner; the controls
/// overlay spans the surface width and sits flush with the bottom edge.
pub fn compute(host: HostGeometry, controls_height: f32) -> OverlayGeometry {
    let top_left = host.origin;
    let bottom_left = top_left + Vec2::new(0.0, host.surface_size.y);

    OverlayGeometry {
        status: Rect::from_min_size(top_left, host.surface_size),
        controls: Rect::from_min_size(
            bottom_left - Vec2::new(0.0, controls_height),
            Vec2::new(host.surface_size.x, controls_height),
        ),
    }
}

/// Events that invalidate overlay placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostEvent {
    Moved,
    Resized,
    KeyReleased,
    Shown,
}

/// Keeps overlay geometry aligned with the host window.
///
/// Geometry is recomputed from scratch on every trigger, never adjusted
/// incrementally. `Shown` defers the recompute by [`SHOW_SETTLE_DELAY`].
pub struct OverlaySync {
    window_pos: Option<Pos2>,
    host: HostGeometry,
    controls_height: f32,
    geometry: OverlayGeometry,
    settle: OneShotTimer,
}

impl OverlaySync {
    pub fn new(host: HostGeometry, controls_height: f32) -> Self {
        Self {
            window_pos: None,
            host,
            controls_height,
            geometry: compute(host, controls_height),
            settle: OneShotTimer::new(),
        }
    }

    /// Feed the current window position and surface geometry. Emits
    /// `Moved`/`Resized` when they differ from the last observation and
    /// returns the events that were handled.
    pub fn observe(
        &mut self,
        window_pos: Option<Pos2>,
        host: HostGeometry,
        now: Duration,
    ) -> Vec<HostEvent> {
        let mut events = Vec::new();

        if window_pos != self.window_pos {
            self.window_pos = window_pos;
            events.push(HostEvent::Moved);
        }
        if host.origin != self.host.origin {
            events.push(HostEvent::Moved);
        }
        if host.surface_size != self.host.surface_size {
            events.push(HostEvent::Resized);
        }
        self.host = host;
        events.dedup();

        for event in &events {
            self.handle(*event, now);
        }
        events
    }

    pub fn handle(&mut self, event: HostEvent, now: Duration) {
        match event {
            HostEvent::Moved | HostEvent::Resized | HostEvent::KeyReleased => self.recompute(),
            HostEvent::Shown => self.settle.arm(now, SHOW_SETTLE_DELAY),
        }
    }

    /// Run the deferred recompute once its delay has passed.
    pub fn tick(&mut self, now: Duration) -> bool {
        if self.settle.fire_if_due(now) {
            self.recompute();
            return true;
        }
        false
    }

    /// Record the measured controls height. Applied on the next recompute.
    pub fn set_controls_height(&mut self, height: f32) {
        self.controls_height = height;
    }

    pub fn geometry(&self) -> OverlayGeometry {
        self.geometry
    }

    pub fn next_wakeup(&self, now: Duration) -> Option<Duration> {
        self.settle.remaining(now)
    }

    fn recompute(&mut self) {
        self.geometry = compute(self.host, self.controls_height);
    }
}
