use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Url;
use std::time::Duration;

use crate::session::SessionConfig;

/// Live stream player for a local twitchd daemon
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Channel to start playing right away
    pub channel: Option<String>,

    /// Host the twitchd daemon listens on
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port the twitchd daemon listens on
    #[arg(short, long, default_value_t = 6767)]
    pub port: u16,

    /// Initial volume, 0 to 200
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(0..=200))]
    pub volume: u32,

    /// Delay before the first reconnect attempt, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub retry_base_ms: u64,

    /// Upper bound for the reconnect delay, in milliseconds
    #[arg(long, default_value_t = 60_000)]
    pub retry_max_ms: u64,
}

/// Resolved application configuration
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    pub endpoint: Url,
    pub initial_channel: Option<String>,
    pub session: SessionConfig,
}

impl PlayerConfig {
    pub fn from_args(args: Args) -> Result<Self> {
        let endpoint = Url::parse(&format!("http://{}:{}/", args.host, args.port))
            .with_context(|| format!("invalid daemon address {}:{}", args.host, args.port))?;

        Ok(Self {
            endpoint,
            initial_channel: args.channel.filter(|c| !c.trim().is_empty()),
            session: SessionConfig {
                initial_volume: args.volume,
                retry_base: Duration::from_millis(args.retry_base_ms.max(1)),
                retry_max: Duration::from_millis(args.retry_max_ms),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_daemon() {
        let args = Args::parse_from(["twitch-player"]);
        let config = PlayerConfig::from_args(args).unwrap();

        assert_eq!(config.endpoint.as_str(), "http://127.0.0.1:6767/");
        assert_eq!(config.initial_channel, None);
        assert_eq!(config.session.initial_volume, 100);
        assert_eq!(config.session.retry_base, Duration::from_secs(1));
        assert_eq!(config.session.retry_max, Duration::from_secs(60));
    }

    #[test]
    fn channel_and_overrides() {
        let args = Args::parse_from([
            "twitch-player",
            "lirik",
            "--host",
            "10.0.0.2",
            "-p",
            "9000",
            "--volume",
            "150",
            "--retry-base-ms",
            "500",
        ]);
        let config = PlayerConfig::from_args(args).unwrap();

        assert_eq!(config.endpoint.as_str(), "http://10.0.0.2:9000/");
        assert_eq!(config.initial_channel.as_deref(), Some("lirik"));
        assert_eq!(config.session.initial_volume, 150);
        assert_eq!(config.session.retry_base, Duration::from_millis(500));
    }

    #[test]
    fn rejects_out_of_range_volume() {
        assert!(Args::try_parse_from(["twitch-player", "--volume", "201"]).is_err());
    }
}
