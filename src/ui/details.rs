use egui::{Align2, Area, Color32, Context, FontId, Frame, Id, Order, Rect, RichText, Spinner};
use std::time::Duration;

use crate::overlay::OverlayState;

/// Top overlay covering the surface: channel name, buffering spinner and the
/// transient state message.
pub struct DetailsOverlay;

impl DetailsOverlay {
    pub fn show(ctx: &Context, rect: Rect, overlay: &OverlayState, now: Duration) {
        if !overlay.details_visible() {
            return;
        }

        Area::new(Id::new("details_overlay"))
            .fixed_pos(rect.min)
            .order(Order::Foreground)
            .interactable(false)
            .show(ctx, |ui| {
                ui.set_min_size(rect.size());
                ui.set_max_size(rect.size());

                if overlay.is_revealed(now) {
                    if let Some(channel) = overlay.channel() {
                        Frame::none()
                            .fill(Color32::from_black_alpha(160))
                            .inner_margin(8.0)
                            .show(ui, |ui| {
                                ui.label(RichText::new(channel).strong().color(Color32::WHITE));
                            });
                    }
                }

                if overlay.is_buffering() {
                    let spinner = Rect::from_center_size(rect.center(), egui::vec2(48.0, 48.0));
                    ui.put(spinner, Spinner::new().size(48.0));
                }

                if let Some(message) = overlay.message(now) {
                    ui.painter().text(
                        rect.right_top() + egui::vec2(-16.0, 16.0),
                        Align2::RIGHT_TOP,
                        message,
                        FontId::proportional(24.0),
                        Color32::WHITE,
                    );
                }
            });
    }
}
