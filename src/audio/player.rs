use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{broadcast, oneshot},
    time::timeout,
};
use tracing::{debug, info, warn};

use super::{
    error::{PlaybackError, PlaybackResult},
    events::PlaybackEvent,
    guild::{self, AppendOutcome, GuildCommand, GuildHandle, Reply, Shared},
    queue::PlaybackStatus,
    track::{LoopMode, Track},
    voice::VoiceGateway,
};
use crate::sources::{Lookup, Resolve, ResolveError};

const EVENT_BUFFER: usize = 256;

/// Tunables of the playback core.
#[derive(Debug, Clone)]
pub struct PlayerSettings {
    /// Volume new guilds start at, in percent.
    pub default_volume: u8,
    pub max_queue_size: usize,
    pub idle_timeout: Duration,
    pub resolve_timeout: Duration,
    pub playlist_timeout: Duration,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            default_volume: 50,
            max_queue_size: 1000,
            idle_timeout: Duration::from_secs(120),
            resolve_timeout: Duration::from_secs(120),
            playlist_timeout: Duration::from_secs(150),
        }
    }
}

/// A play request coming from a front-end.
#[derive(Debug, Clone)]
pub struct EnqueueRequest {
    pub guild_id: GuildId,
    /// Voice channel the requester is in, if any.
    pub voice_channel: Option<ChannelId>,
    pub query: String,
    pub requested_by: UserId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnqueueOutcome {
    /// A single track was added. `position` is its one-based queue position,
    /// `None` when it started playing right away.
    Queued { track: Track, position: Option<usize> },
    /// A multi-track request; failures were skipped and counted.
    Batch { added: usize, failed: usize, dropped: usize },
}

/// Keeps a guild from idling out while a play request resolves. Released
/// when the request finishes or its future is dropped.
struct IdleHold(Option<GuildHandle>);

impl Drop for IdleHold {
    fn drop(&mut self) {
        if let Some(handle) = &self.0 {
            let _ = handle.send(GuildCommand::EnqueueDone);
        }
    }
}

/// Entry point of the playback core.
///
/// Holds one task per active guild. Every operation is forwarded to the
/// guild's task and answered over a oneshot channel; media resolution runs
/// in the caller's task before anything reaches the guild.
#[derive(Clone)]
pub struct AudioPlayer {
    shared: Arc<Shared>,
    resolver: Arc<dyn Resolve>,
}

impl AudioPlayer {
    pub fn new(voice: Arc<dyn VoiceGateway>, resolver: Arc<dyn Resolve>, settings: PlayerSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            shared: Arc::new(Shared {
                voice,
                events,
                settings,
                guilds: Arc::new(DashMap::new()),
            }),
            resolver,
        }
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.shared.settings
    }

    /// Number of guilds with live playback state.
    pub fn active_guilds(&self) -> usize {
        self.shared.guilds.len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.shared.events.subscribe()
    }

    /// Resolves a query and queues the result.
    pub async fn enqueue(&self, request: EnqueueRequest) -> PlaybackResult<EnqueueOutcome> {
        let EnqueueRequest { guild_id, voice_channel, query, requested_by } = request;
        let channel_id = voice_channel.ok_or(PlaybackError::NoVoiceChannel)?;

        self.call(guild_id, |reply| GuildCommand::Connect { channel_id, reply })
            .await?;

        let _hold = IdleHold(self.existing(guild_id));
        self.resolve_and_append(guild_id, channel_id, query, requested_by)
            .await
    }

    async fn resolve_and_append(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        query: String,
        requested_by: UserId,
    ) -> PlaybackResult<EnqueueOutcome> {
        let playlist_timeout = self.shared.settings.playlist_timeout;
        let lookups = timeout(playlist_timeout, self.resolver.plan(&query))
            .await
            .map_err(|_| ResolveError::Timeout(playlist_timeout))??;

        match lookups.as_slice() {
            [] => Err(ResolveError::NoResults(query).into()),
            [lookup] => {
                let track = self.resolve_one(lookup).await?.with_requested_by(requested_by);
                let outcome = self.append(guild_id, channel_id, vec![track.clone()]).await?;
                let position = (!outcome.started).then_some(outcome.summary.first_position);
                Ok(EnqueueOutcome::Queued { track, position })
            }
            lookups => self.enqueue_batch(guild_id, channel_id, lookups, requested_by).await,
        }
    }

    /// Resolves lookups one after another, appending each success right away
    /// so playback can start before the whole batch is done.
    async fn enqueue_batch(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        lookups: &[Lookup],
        requested_by: UserId,
    ) -> PlaybackResult<EnqueueOutcome> {
        info!("📋 Resolving {} tracks for guild {}", lookups.len(), guild_id);
        let (mut added, mut failed, mut dropped) = (0, 0, 0);

        for (i, lookup) in lookups.iter().enumerate() {
            let track = match self.resolve_one(lookup).await {
                Ok(track) => track.with_requested_by(requested_by),
                Err(e) => {
                    warn!("⚠️ Skipping `{}`: {}", lookup, e);
                    failed += 1;
                    continue;
                }
            };

            match self.append(guild_id, channel_id, vec![track]).await {
                Ok(outcome) => {
                    added += outcome.summary.accepted;
                    dropped += outcome.summary.dropped;
                }
                Err(PlaybackError::QueueFull { .. }) => {
                    dropped += lookups.len() - i;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            "📋 Batch done for guild {}: {} added, {} failed, {} dropped",
            guild_id, added, failed, dropped
        );
        match added {
            0 if dropped > 0 => Err(PlaybackError::QueueFull {
                max: self.shared.settings.max_queue_size,
            }),
            0 => Err(PlaybackError::BatchFailed { attempted: lookups.len() }),
            _ => Ok(EnqueueOutcome::Batch { added, failed, dropped }),
        }
    }

    async fn resolve_one(&self, lookup: &Lookup) -> Result<Track, ResolveError> {
        let limit = self.shared.settings.resolve_timeout;
        timeout(limit, self.resolver.resolve(lookup))
            .await
            .map_err(|_| ResolveError::Timeout(limit))?
    }

    async fn append(&self, guild_id: GuildId, channel_id: ChannelId, tracks: Vec<Track>) -> PlaybackResult<AppendOutcome> {
        self.call(guild_id, |reply| GuildCommand::Append {
            tracks: tracks.clone(),
            channel_id,
            reply,
        })
        .await
    }

    /// Stops the current track; the next one starts once it has ended.
    pub async fn skip(&self, guild_id: GuildId) -> PlaybackResult<Track> {
        self.call(guild_id, |reply| GuildCommand::Skip { reply }).await
    }

    pub async fn pause(&self, guild_id: GuildId) -> PlaybackResult<()> {
        self.call(guild_id, |reply| GuildCommand::Pause { reply }).await
    }

    pub async fn resume(&self, guild_id: GuildId) -> PlaybackResult<()> {
        self.call(guild_id, |reply| GuildCommand::Resume { reply }).await
    }

    /// Clears the queue and halts playback. Returns how many tracks were removed.
    pub async fn stop(&self, guild_id: GuildId) -> PlaybackResult<usize> {
        self.call(guild_id, |reply| GuildCommand::Stop { reply }).await
    }

    pub async fn leave(&self, guild_id: GuildId) -> PlaybackResult<()> {
        match self.existing(guild_id) {
            Some(_) => self.call(guild_id, |reply| GuildCommand::Leave { reply }).await,
            None => Err(PlaybackError::NoVoiceConnection),
        }
    }

    /// The bot was disconnected from voice by someone else.
    pub fn voice_lost(&self, guild_id: GuildId) {
        if let Some(handle) = self.existing(guild_id) {
            debug!("🔌 Forwarding voice loss to guild {}", guild_id);
            let _ = handle.send(GuildCommand::VoiceLost);
        }
    }

    /// Sets a loop mode, or cycles to the next one when `mode` is `None`.
    pub async fn set_loop_mode(&self, guild_id: GuildId, mode: Option<LoopMode>) -> PlaybackResult<LoopMode> {
        self.call(guild_id, |reply| GuildCommand::SetLoop { mode, reply })
            .await
    }

    pub async fn shuffle(&self, guild_id: GuildId) -> PlaybackResult<usize> {
        self.call(guild_id, |reply| GuildCommand::Shuffle { reply }).await
    }

    /// Removes the upcoming track at a one-based index.
    pub async fn remove_at(&self, guild_id: GuildId, index: usize) -> PlaybackResult<Track> {
        self.call(guild_id, |reply| GuildCommand::Remove { index, reply })
            .await
    }

    pub async fn set_volume(&self, guild_id: GuildId, percent: i64) -> PlaybackResult<u8> {
        let percent = u8::try_from(percent)
            .ok()
            .filter(|p| *p <= 100)
            .ok_or(PlaybackError::VolumeOutOfRange(percent))?;
        self.call(guild_id, |reply| GuildCommand::SetVolume { percent, reply })
            .await
    }

    /// Snapshot of a guild's playback. Never creates state.
    pub async fn status(&self, guild_id: GuildId) -> PlaybackStatus {
        let idle = || PlaybackStatus {
            volume: self.shared.settings.default_volume,
            ..Default::default()
        };

        let Some(handle) = self.existing(guild_id) else {
            return idle();
        };
        let (tx, rx) = oneshot::channel();
        if handle.send(GuildCommand::Status { reply: tx }).is_err() {
            return idle();
        }
        rx.await.unwrap_or_else(|_| idle())
    }

    fn existing(&self, guild_id: GuildId) -> Option<GuildHandle> {
        self.shared
            .guilds
            .get(&guild_id)
            .map(|h| h.value().clone())
            .filter(|h| !h.is_closed())
    }

    fn handle(&self, guild_id: GuildId) -> GuildHandle {
        let mut entry = self
            .shared
            .guilds
            .entry(guild_id)
            .or_insert_with(|| guild::spawn(guild_id, self.shared.clone()));
        if entry.is_closed() {
            *entry = guild::spawn(guild_id, self.shared.clone());
        }
        entry.value().clone()
    }

    /// Sends a command to the guild task and waits for the answer.
    ///
    /// A task that exits between lookup and reply is replaced and the
    /// command is sent once more.
    async fn call<T>(&self, guild_id: GuildId, make: impl Fn(Reply<T>) -> GuildCommand) -> PlaybackResult<T> {
        for attempt in 0..2 {
            let (tx, rx) = oneshot::channel();
            if self.handle(guild_id).send(make(tx)).is_ok() {
                if let Ok(result) = rx.await {
                    return result;
                }
            }
            debug!("🔄 Guild {} task went away (attempt {})", guild_id, attempt + 1);
        }
        Err(PlaybackError::GuildUnavailable)
    }
}
