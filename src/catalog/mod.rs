mod twitchd;

use serde::Deserialize;

pub use twitchd::TwitchdClient;

/// Playlist variants twitchd knows for a channel.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct StreamIndex {
    #[serde(default)]
    pub playlist_infos: Vec<PlaylistInfo>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct PlaylistInfo {
    pub media_info: MediaInfo,
    #[serde(default)]
    pub stream_info: StreamInfo,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct MediaInfo {
    pub name: String,
    #[serde(default)]
    pub group_id: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct StreamInfo {
    #[serde(default)]
    pub bandwidth: u64,
    #[serde(default)]
    pub resolution: Option<String>,
}

/// Variant twitchd lists for sound without picture
pub const AUDIO_ONLY_QUALITY: &str = "audio_only";

/// Playable quality names in the order the daemon lists them. The player
/// needs a video track, so the audio-only variant is left out.
pub fn quality_names(index: &StreamIndex) -> Vec<String> {
    index
        .playlist_infos
        .iter()
        .map(|info| info.media_info.name.as_str())
        .filter(|name| *name != AUDIO_ONLY_QUALITY)
        .map(str::to_owned)
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("no stream index for channel {0}")]
    NotFound(String),
}

/// Result of a quality-list request, tagged with the channel it was made for.
#[derive(Debug)]
pub struct CatalogResponse {
    pub channel: String,
    pub result: Result<StreamIndex, CatalogError>,
}

/// Source of stream metadata and playback locations.
///
/// Requests are asynchronous: `request_qualities` returns immediately and the
/// answer shows up later through `try_next_response`.
pub trait StreamCatalog {
    fn request_qualities(&mut self, channel: &str);

    fn try_next_response(&mut self) -> Option<CatalogResponse>;

    /// Location the media engine should open for `(channel, quality)`.
    fn playback_url(&self, channel: &str, quality: &str) -> String;
}
