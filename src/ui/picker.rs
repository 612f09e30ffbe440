use egui::{Key, TextEdit, Ui};

/// Channel selection surface shown before a stream is picked.
#[derive(Default)]
pub struct StreamPicker {
    entry: String,
}

impl StreamPicker {
    /// Returns the channel the user picked this frame, if any.
    pub fn show<'a>(
        &mut self,
        ui: &mut Ui,
        remembered: impl Iterator<Item = &'a str>,
    ) -> Option<String> {
        let mut picked = None;

        ui.vertical_centered(|ui| {
            ui.add_space(ui.available_height() / 4.0);
            ui.heading("Watch a channel");
            ui.add_space(10.0);

            let response = ui.add(
                TextEdit::singleline(&mut self.entry)
                    .hint_text("channel name")
                    .desired_width(240.0),
            );
            let submitted = response.lost_focus() && ui.input(|i| i.key_pressed(Key::Enter));

            if (ui.button("Play").clicked() || submitted) && !self.entry.trim().is_empty() {
                picked = Some(normalize_channel(&self.entry));
            }

            let mut remembered = remembered.peekable();
            if remembered.peek().is_some() {
                ui.add_space(20.0);
                ui.label("Recent channels");
                for channel in remembered {
                    if ui.link(channel).clicked() {
                        picked = Some(channel.to_owned());
                    }
                }
            }
        });

        if picked.is_some() {
            self.entry.clear();
        }
        picked
    }
}

/// Twitch channel names are case-insensitive and never contain whitespace.
pub fn normalize_channel(raw: &str) -> String {
    raw.trim().to_lowercase()
}
