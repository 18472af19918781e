use anyhow::{Context, Result};
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info, warn};

mod audio;
mod bot;
mod config;
mod sources;
mod ui;

use crate::audio::{AudioPlayer, SongbirdGateway};
use crate::bot::MelodyBot;
use crate::config::Config;
use crate::sources::{InvidiousClient, MediaResolver, SpotifyClient, YtDlpClient};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("melody_bot=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Starting Melody Bot v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&config).await;
    }

    info!("{}", config.summary());

    let resolver = build_resolver(&config)?;
    info!("🔎 Search chain: {}", resolver.chain().join(" → "));

    let songbird = Songbird::serenity();
    let voice = SongbirdGateway::new(songbird.clone(), reqwest::Client::new());
    let player = AudioPlayer::new(Arc::new(voice), Arc::new(resolver), config.player_settings());

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let token = config.discord_token.clone();
    let handler = MelodyBot::new(config, player);

    let mut client = Client::builder(&token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await
        .context("Failed to build Discord client")?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("❌ Failed to listen for Ctrl+C: {}", e);
            return;
        }
        info!("⚠️ Shutdown signal received, closing...");
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot started");
    if let Err(why) = client.start().await {
        error!("❌ Client error: {:?}", why);
    }

    Ok(())
}

fn build_resolver(config: &Config) -> Result<MediaResolver> {
    let youtube = YtDlpClient::youtube(&config.ytdlp_path).with_cookies(config.ytdlp_cookies.clone());
    let mut resolver = MediaResolver::new(Arc::new(youtube), config.max_playlist_size);

    if !config.invidious_instances.is_empty() {
        let invidious = InvidiousClient::new(config.invidious_instances.clone())
            .context("Failed to build Invidious client")?;
        resolver = resolver.with_fallback(Arc::new(invidious));
    }

    if config.enable_soundcloud_fallback {
        resolver = resolver.with_fallback(Arc::new(YtDlpClient::soundcloud(&config.ytdlp_path)));
    }

    let spotify = SpotifyClient::new(config.spotify_credentials())
        .context("Failed to build Spotify client")?;
    if config.spotify_credentials().is_none() {
        warn!("⚠️ Spotify credentials not set, links will be resolved from page titles");
    }

    Ok(resolver.with_spotify(spotify))
}

async fn health_check(config: &Config) -> Result<()> {
    let yt_dlp = async_process::Command::new(&config.ytdlp_path)
        .arg("--version")
        .output()
        .await
        .with_context(|| format!("Couldn't run {}", config.ytdlp_path.display()))?;

    if yt_dlp.status.success() {
        println!("OK yt-dlp {}", String::from_utf8_lossy(&yt_dlp.stdout).trim());
        Ok(())
    } else {
        anyhow::bail!("yt-dlp is installed but not working");
    }
}
