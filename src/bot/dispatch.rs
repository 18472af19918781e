use serenity::model::id::{ChannelId, GuildId, UserId};
use std::time::Duration;
use tracing::{debug, warn};

use crate::audio::{
    AudioPlayer, EnqueueOutcome, EnqueueRequest, LoopMode, PlaybackError, PlaybackStatus, Track,
};

/// A command understood by every front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Play { query: String },
    Pause,
    Resume,
    Skip,
    Stop,
    Leave,
    Queue { page: usize },
    NowPlaying,
    /// `None` cycles to the next mode.
    Loop { mode: Option<LoopMode> },
    Shuffle,
    Remove { index: usize },
    /// `None` only reports the current level.
    Volume { level: Option<i64> },
    Help,
    Ping,
}

impl BotCommand {
    pub fn name(&self) -> &'static str {
        match self {
            BotCommand::Play { .. } => "play",
            BotCommand::Pause => "pause",
            BotCommand::Resume => "resume",
            BotCommand::Skip => "skip",
            BotCommand::Stop => "stop",
            BotCommand::Leave => "leave",
            BotCommand::Queue { .. } => "queue",
            BotCommand::NowPlaying => "nowplaying",
            BotCommand::Loop { .. } => "loop",
            BotCommand::Shuffle => "shuffle",
            BotCommand::Remove { .. } => "remove",
            BotCommand::Volume { .. } => "volume",
            BotCommand::Help => "help",
            BotCommand::Ping => "ping",
        }
    }

    /// Commands that may take long enough to need a deferred response.
    pub fn is_slow(&self) -> bool {
        matches!(self, BotCommand::Play { .. })
    }
}

/// Who issued a command, and from where.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub voice_channel: Option<ChannelId>,
    pub command: BotCommand,
}

/// Result of running a command, ready to be rendered by a front-end.
#[derive(Debug, Clone)]
pub enum Reply {
    Enqueued(EnqueueOutcome),
    Skipped(Track),
    Paused,
    Resumed,
    Stopped { cleared: usize },
    Left,
    Queue { status: PlaybackStatus, page: usize },
    NowPlaying(PlaybackStatus),
    LoopMode(LoopMode),
    Shuffled(usize),
    Removed(Track),
    Volume { level: u8, changed: bool },
    Help,
    /// Round-trip time to Discord, filled in by the front-end that measured it.
    Pong { latency: Option<Duration> },
    Failed(PlaybackError),
}

impl Reply {
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Failed(_))
    }
}

/// Runs a command against the player.
///
/// Never fails: playback errors come back as [`Reply::Failed`] so both
/// front-ends show the same message.
pub async fn execute(player: &AudioPlayer, invocation: Invocation) -> Reply {
    let Invocation { guild_id, user_id, voice_channel, command } = invocation;
    debug!("⚙️ Executing {} for guild {}", command.name(), guild_id);

    let result = match command {
        BotCommand::Play { query } => player
            .enqueue(EnqueueRequest {
                guild_id,
                voice_channel,
                query,
                requested_by: user_id,
            })
            .await
            .map(Reply::Enqueued),
        BotCommand::Pause => player.pause(guild_id).await.map(|_| Reply::Paused),
        BotCommand::Resume => player.resume(guild_id).await.map(|_| Reply::Resumed),
        BotCommand::Skip => player.skip(guild_id).await.map(Reply::Skipped),
        BotCommand::Stop => player
            .stop(guild_id)
            .await
            .map(|cleared| Reply::Stopped { cleared }),
        BotCommand::Leave => player.leave(guild_id).await.map(|_| Reply::Left),
        BotCommand::Queue { page } => Ok(Reply::Queue {
            status: player.status(guild_id).await,
            page,
        }),
        BotCommand::NowPlaying => {
            let status = player.status(guild_id).await;
            match status.now_playing {
                Some(_) => Ok(Reply::NowPlaying(status)),
                None => Err(PlaybackError::NothingPlaying),
            }
        }
        BotCommand::Loop { mode } => player.set_loop_mode(guild_id, mode).await.map(Reply::LoopMode),
        BotCommand::Shuffle => player.shuffle(guild_id).await.map(Reply::Shuffled),
        BotCommand::Remove { index } => player.remove_at(guild_id, index).await.map(Reply::Removed),
        BotCommand::Volume { level: Some(level) } => player
            .set_volume(guild_id, level)
            .await
            .map(|level| Reply::Volume { level, changed: true }),
        BotCommand::Volume { level: None } => Ok(Reply::Volume {
            level: player.status(guild_id).await.volume,
            changed: false,
        }),
        BotCommand::Help => Ok(Reply::Help),
        BotCommand::Ping => Ok(Reply::Pong { latency: None }),
    };

    result.unwrap_or_else(|e| {
        warn!("⚠️ Command failed in guild {}: {}", guild_id, e);
        Reply::Failed(e)
    })
}
