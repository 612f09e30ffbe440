use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Storage key under which the app persists its settings.
pub const STORAGE_KEY: &str = "twitch_player/settings";
/// Channels kept in the recent list
pub const RECENT_LIMIT: usize = 8;

/// Per-channel preferences the session reads and writes.
pub trait SettingsStore {
    fn last_quality(&self, channel: &str) -> Option<String>;

    /// Fire-and-forget; persistence happens whenever the host flushes.
    fn set_last_quality(&mut self, channel: &str, quality: &str);

    /// Move `channel` to the front of the recently played list.
    fn remember_channel(&mut self, channel: &str);
}

/// Last quality picked per channel and recently played channels, persisted
/// through eframe storage.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QualityMemory {
    last_quality: BTreeMap<String, String>,
    recent: Vec<String>,
}

impl QualityMemory {
    pub fn load(storage: Option<&dyn eframe::Storage>) -> Self {
        storage
            .and_then(|s| eframe::get_value(s, STORAGE_KEY))
            .unwrap_or_default()
    }

    pub fn save(&self, storage: &mut dyn eframe::Storage) {
        eframe::set_value(storage, STORAGE_KEY, self);
    }

    /// Recently played channels, most recent first.
    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.recent.iter().map(String::as_str)
    }
}

impl SettingsStore for QualityMemory {
    fn last_quality(&self, channel: &str) -> Option<String> {
        self.last_quality.get(channel).cloned()
    }

    fn set_last_quality(&mut self, channel: &str, quality: &str) {
        self.last_quality
            .insert(channel.to_owned(), quality.to_owned());
    }

    fn remember_channel(&mut self, channel: &str) {
        self.recent.retain(|c| c != channel);
        self.recent.insert(0, channel.to_owned());
        self.recent.truncate(RECENT_LIMIT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remembers_latest_quality_per_channel() {
        let mut memory = QualityMemory::default();
        memory.set_last_quality("lirik", "720p");
        memory.set_last_quality("lirik", "480p");
        memory.set_last_quality("shroud", "1080p60");

        assert_eq!(memory.last_quality("lirik").as_deref(), Some("480p"));
        assert_eq!(memory.last_quality("unknown"), None);
    }

    #[test]
    fn recent_channels_are_most_recent_first_and_bounded() {
        let mut memory = QualityMemory::default();
        memory.remember_channel("lirik");
        memory.remember_channel("shroud");
        memory.remember_channel("lirik");
        assert_eq!(memory.channels().collect::<Vec<_>>(), ["lirik", "shroud"]);

        for n in 0..RECENT_LIMIT {
            memory.remember_channel(&format!("channel{}", n));
        }
        let recent: Vec<_> = memory.channels().collect();
        assert_eq!(recent.len(), RECENT_LIMIT);
        assert_eq!(recent[0], format!("channel{}", RECENT_LIMIT - 1));
        assert!(!recent.contains(&"lirik"));
    }
}
