use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{HttpRequest, Input},
    tracks::TrackHandle,
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use super::{
    error::{PlaybackError, PlaybackResult},
    guild::GuildCommand,
    track::Track,
};

/// Opens voice connections.
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> PlaybackResult<Arc<dyn VoiceConnection>>;
}

/// A live voice connection in one guild.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    /// Starts streaming `track`. `on_end` must fire once the stream finishes,
    /// fails, or is stopped.
    async fn play(
        &self,
        track: &Track,
        volume: f32,
        on_end: StreamEndNotifier,
    ) -> PlaybackResult<Box<dyn ActiveStream>>;

    async fn disconnect(&self) -> PlaybackResult<()>;

    fn channel_id(&self) -> ChannelId;
}

/// Control handle over one running stream. Never reused across tracks.
pub trait ActiveStream: Send + Sync {
    fn pause(&self) -> PlaybackResult<()>;
    fn resume(&self) -> PlaybackResult<()>;
    fn stop(&self);
    fn set_volume(&self, volume: f32) -> PlaybackResult<()>;
}

/// Posts the end of a stream back into its guild's inbox.
#[derive(Clone)]
pub struct StreamEndNotifier {
    stream_id: u64,
    inbox: mpsc::UnboundedSender<GuildCommand>,
}

impl StreamEndNotifier {
    pub(super) fn new(stream_id: u64, inbox: mpsc::UnboundedSender<GuildCommand>) -> Self {
        Self { stream_id, inbox }
    }

    pub fn stream_id(&self) -> u64 {
        self.stream_id
    }

    pub fn notify(&self, failed: bool) {
        // The guild may already be gone; then there is nobody left to advance.
        let _ = self.inbox.send(GuildCommand::StreamEnded {
            stream_id: self.stream_id,
            failed,
        });
    }
}

/// [`VoiceGateway`] backed by songbird.
pub struct SongbirdGateway {
    songbird: Arc<Songbird>,
    http: reqwest::Client,
}

impl SongbirdGateway {
    pub fn new(songbird: Arc<Songbird>, http: reqwest::Client) -> Self {
        Self { songbird, http }
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> PlaybackResult<Arc<dyn VoiceConnection>> {
        let call = self
            .songbird
            .join(guild_id, channel_id)
            .await
            .map_err(|e| PlaybackError::Voice(e.to_string()))?;

        {
            let mut handler = call.lock().await;
            if let Err(e) = handler.deafen(true).await {
                warn!("⚠️ Could not self-deafen in guild {}: {}", guild_id, e);
            }
        }

        info!("🔊 Connected to voice channel {} in guild {}", channel_id, guild_id);
        Ok(Arc::new(SongbirdConnection {
            songbird: self.songbird.clone(),
            http: self.http.clone(),
            call,
            guild_id,
            channel_id,
        }))
    }
}

struct SongbirdConnection {
    songbird: Arc<Songbird>,
    http: reqwest::Client,
    call: Arc<Mutex<Call>>,
    guild_id: GuildId,
    channel_id: ChannelId,
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    async fn play(
        &self,
        track: &Track,
        volume: f32,
        on_end: StreamEndNotifier,
    ) -> PlaybackResult<Box<dyn ActiveStream>> {
        let input: Input = HttpRequest::new(self.http.clone(), track.stream_url().to_string()).into();
        let handle = self.call.lock().await.play_input(input);

        let voice_err = |e: songbird::error::ControlError| PlaybackError::Voice(e.to_string());
        handle.set_volume(volume).map_err(voice_err)?;
        handle
            .add_event(
                Event::Track(TrackEvent::End),
                TrackEndHandler { notifier: on_end.clone(), failed: false },
            )
            .map_err(voice_err)?;
        handle
            .add_event(
                Event::Track(TrackEvent::Error),
                TrackEndHandler { notifier: on_end, failed: true },
            )
            .map_err(voice_err)?;

        debug!("▶️ Stream started in guild {}: {}", self.guild_id, track.title());
        Ok(Box::new(SongbirdStream { handle }))
    }

    async fn disconnect(&self) -> PlaybackResult<()> {
        self.songbird
            .remove(self.guild_id)
            .await
            .map_err(|e| PlaybackError::Voice(e.to_string()))?;
        info!("👋 Left voice in guild {}", self.guild_id);
        Ok(())
    }

    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }
}

struct SongbirdStream {
    handle: TrackHandle,
}

impl ActiveStream for SongbirdStream {
    fn pause(&self) -> PlaybackResult<()> {
        self.handle
            .pause()
            .map_err(|e| PlaybackError::Voice(e.to_string()))
    }

    fn resume(&self) -> PlaybackResult<()> {
        self.handle
            .play()
            .map_err(|e| PlaybackError::Voice(e.to_string()))
    }

    fn stop(&self) {
        if let Err(e) = self.handle.stop() {
            debug!("Stream already finished: {}", e);
        }
    }

    fn set_volume(&self, volume: f32) -> PlaybackResult<()> {
        self.handle
            .set_volume(volume)
            .map_err(|e| PlaybackError::Voice(e.to_string()))
    }
}

struct TrackEndHandler {
    notifier: StreamEndNotifier,
    failed: bool,
}

#[async_trait]
impl VoiceEventHandler for TrackEndHandler {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        debug!(
            "🏁 Stream {} ended (failed: {})",
            self.notifier.stream_id(),
            self.failed
        );
        self.notifier.notify(self.failed);
        None
    }
}
