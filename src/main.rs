mod app;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use eframe::NativeOptions;
use tracing_subscriber::EnvFilter;

use app::PlayerApp;
use twitch_player::{Args, PlayerConfig};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("twitch_player=info")),
        )
        .init();

    let config = PlayerConfig::from_args(Args::parse())?;
    ffmpeg_next::init().context("failed to initialize FFmpeg")?;

    let options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 720.0])
            .with_min_inner_size([160.0, 90.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Twitch Player",
        options,
        Box::new(move |cc| {
            let app: Box<dyn eframe::App> = Box::new(PlayerApp::new(cc, config)?);
            Ok(app)
        }),
    )
    .map_err(|e| anyhow!("window error: {}", e))
}
