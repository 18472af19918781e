use anyhow::{Context, Result};
use std::{path::PathBuf, str::FromStr, time::Duration};

use crate::audio::PlayerSettings;

const DEFAULT_INVIDIOUS_INSTANCES: &str =
    "https://yewtu.be,https://inv.nadeko.net,https://invidious.nerdvpn.de";

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Registers commands in a single guild (development)
    pub command_prefix: String,

    // Audio
    pub default_volume: f32,
    pub max_queue_size: usize,
    pub max_playlist_size: usize,

    // Timeouts
    pub idle_timeout: Duration,
    pub resolve_timeout: Duration,
    pub playlist_timeout: Duration,

    // Sources
    pub ytdlp_path: PathBuf,
    pub ytdlp_cookies: Option<PathBuf>,
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub invidious_instances: Vec<String>,
    pub enable_soundcloud_fallback: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        fn parse<T>(key: &str, raw: Option<String>, default: &str) -> Result<T>
        where
            T: FromStr,
            T::Err: std::error::Error + Send + Sync + 'static,
        {
            let raw = raw.unwrap_or_else(|| default.to_string());
            raw.trim()
                .parse()
                .with_context(|| format!("Invalid value for {}: `{}`", key, raw))
        }

        let secs = |key: &str, default: &str| -> Result<Duration> {
            parse::<u64>(key, get(key), default).map(Duration::from_secs)
        };

        Ok(Self {
            // Discord
            discord_token: get("DISCORD_TOKEN").context("DISCORD_TOKEN is not set")?,
            application_id: parse(
                "APPLICATION_ID",
                Some(get("APPLICATION_ID").context("APPLICATION_ID is not set")?),
                "",
            )?,
            guild_id: get("GUILD_ID")
                .and_then(|s| s.trim().parse::<u64>().ok())
                .filter(|id| *id != 0),
            command_prefix: get("COMMAND_PREFIX").unwrap_or_else(|| "!".to_string()),

            // Audio
            default_volume: parse("DEFAULT_VOLUME", get("DEFAULT_VOLUME"), "0.5")?,
            max_queue_size: parse("MAX_QUEUE_SIZE", get("MAX_QUEUE_SIZE"), "1000")?,
            max_playlist_size: parse("MAX_PLAYLIST_SIZE", get("MAX_PLAYLIST_SIZE"), "100")?,

            // Timeouts
            idle_timeout: secs("IDLE_TIMEOUT_SECS", "120")?,
            resolve_timeout: secs("RESOLVE_TIMEOUT_SECS", "120")?,
            playlist_timeout: secs("PLAYLIST_TIMEOUT_SECS", "150")?,

            // Sources
            ytdlp_path: get("YTDLP_PATH").unwrap_or_else(|| "yt-dlp".to_string()).into(),
            ytdlp_cookies: get("YTDLP_COOKIES").map(PathBuf::from),
            spotify_client_id: get("SPOTIFY_CLIENT_ID"),
            spotify_client_secret: get("SPOTIFY_CLIENT_SECRET"),
            invidious_instances: get("INVIDIOUS_INSTANCES")
                .unwrap_or_else(|| DEFAULT_INVIDIOUS_INSTANCES.to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            enable_soundcloud_fallback: parse(
                "ENABLE_SOUNDCLOUD_FALLBACK",
                get("ENABLE_SOUNDCLOUD_FALLBACK"),
                "true",
            )?,
        })
    }

    /// Validates configuration values for correctness.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.default_volume) {
            anyhow::bail!("Default volume must be between 0.0 and 1.0, got: {}", self.default_volume);
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("Max playlist size must be greater than 0");
        }

        for (name, value) in [
            ("Idle timeout", self.idle_timeout),
            ("Resolve timeout", self.resolve_timeout),
            ("Playlist timeout", self.playlist_timeout),
        ] {
            if value.is_zero() {
                anyhow::bail!("{} must be greater than 0", name);
            }
        }

        if self.command_prefix.chars().any(char::is_whitespace) {
            anyhow::bail!("Command prefix cannot contain whitespace: `{}`", self.command_prefix);
        }

        if let Some(cookies) = &self.ytdlp_cookies {
            if !cookies.exists() {
                anyhow::bail!("YTDLP_COOKIES points to a missing file: {}", cookies.display());
            }
        }

        if self.spotify_client_id.is_some() != self.spotify_client_secret.is_some() {
            anyhow::bail!("SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET must be set together");
        }

        Ok(())
    }

    pub fn spotify_credentials(&self) -> Option<(String, String)> {
        self.spotify_client_id
            .clone()
            .zip(self.spotify_client_secret.clone())
    }

    pub fn player_settings(&self) -> PlayerSettings {
        PlayerSettings {
            default_volume: (self.default_volume * 100.0).round() as u8,
            max_queue_size: self.max_queue_size,
            idle_timeout: self.idle_timeout,
            resolve_timeout: self.resolve_timeout,
            playlist_timeout: self.playlist_timeout,
        }
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Tokens and secrets are left out.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {}), prefix `{}`\n  \
            Audio: {}% vol, {} max queue, {} max playlist\n  \
            Timeouts: idle {}, resolve {}, playlist {}\n  \
            Sources: {} (cookies: {}), Invidious x{}, SoundCloud={}, Spotify API={}",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            self.command_prefix,
            (self.default_volume * 100.0).round() as u32,
            self.max_queue_size,
            self.max_playlist_size,
            humantime::format_duration(self.idle_timeout),
            humantime::format_duration(self.resolve_timeout),
            humantime::format_duration(self.playlist_timeout),
            self.ytdlp_path.display(),
            self.ytdlp_cookies.is_some(),
            self.invidious_instances.len(),
            self.enable_soundcloud_fallback,
            self.spotify_client_id.is_some(),
        )
    }
}
