pub mod catalog;
pub mod config;
pub mod overlay;
pub mod player;
pub mod session;
pub mod settings;
pub mod ui;

pub use catalog::{StreamCatalog, TwitchdClient};
pub use config::{Args, PlayerConfig};
pub use player::{FfmpegEngine, MediaEngine, PlaybackEvent};
pub use session::{PlaybackSelection, PlaybackSession, SessionConfig};
pub use settings::{QualityMemory, SettingsStore};
pub use ui::controls::{ControlAction, ControlsOverlay};
pub use ui::details::DetailsOverlay;
pub use ui::picker::StreamPicker;
