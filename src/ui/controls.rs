use egui::{Area, Color32, ComboBox, Context, Frame, Id, Order, Rect, Slider};
use std::time::Duration;

use crate::overlay::OverlayState;
use crate::player::MAX_VOLUME;

/// User input collected from the controls overlay in one frame
#[derive(Clone, Debug, PartialEq)]
pub enum ControlAction {
    Quality(String),
    Volume(i32),
    Muted(bool),
    FastForward,
}

/// Bottom overlay: quality picker, mute, volume and fast forward.
pub struct ControlsOverlay;

impl ControlsOverlay {
    /// Draw at `rect` if revealed. Returns the actions taken and the height the
    /// overlay actually needed, for the next placement.
    pub fn show(
        ctx: &Context,
        rect: Rect,
        overlay: &OverlayState,
        now: Duration,
    ) -> (Vec<ControlAction>, Option<f32>) {
        let mut actions = Vec::new();
        if !overlay.is_revealed(now) {
            return (actions, None);
        }

        let response = Area::new(Id::new("controls_overlay"))
            .fixed_pos(rect.min)
            .order(Order::Foreground)
            .show(ctx, |ui| {
                Frame::none()
                    .fill(Color32::from_black_alpha(180))
                    .inner_margin(6.0)
                    .show(ui, |ui| {
                        ui.set_width((rect.width() - 12.0).max(0.0));
                        ui.horizontal(|ui| Self::contents(ui, overlay, &mut actions));
                    });
            })
            .response;

        (actions, Some(response.rect.height()))
    }

    fn contents(ui: &mut egui::Ui, overlay: &OverlayState, actions: &mut Vec<ControlAction>) {
        let current = overlay.current_quality();
        let selected_text = if current.is_empty() { "auto" } else { current };

        ComboBox::new("quality", "")
            .selected_text(selected_text)
            .show_ui(ui, |ui| {
                for quality in overlay.qualities() {
                    if ui
                        .selectable_label(quality == current, quality.as_str())
                        .clicked()
                        && quality != current
                    {
                        actions.push(ControlAction::Quality(quality.clone()));
                    }
                }
            });

        ui.separator();

        let mute_icon = if overlay.is_muted() { "🔇" } else { "🔊" };
        if ui.button(mute_icon).clicked() {
            actions.push(ControlAction::Muted(!overlay.is_muted()));
        }

        let mut volume = overlay.volume();
        if ui
            .add(Slider::new(&mut volume, 0..=MAX_VOLUME).show_value(false))
            .changed()
        {
            actions.push(ControlAction::Volume(volume as i32));
        }

        ui.separator();

        if ui
            .button("⏭")
            .on_hover_text("Jump to live")
            .clicked()
        {
            actions.push(ControlAction::FastForward);
        }
    }
}
