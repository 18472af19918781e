use serenity::model::id::GuildId;

use super::track::{LoopMode, Track};

/// Notifications emitted by guild playback tasks.
///
/// Delivered over a broadcast channel; the announcer turns them into chat
/// messages. Losing one (a lagging receiver) never affects playback.
#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    NowPlaying {
        guild_id: GuildId,
        track: Track,
        loop_mode: LoopMode,
    },
    TrackFailed {
        guild_id: GuildId,
        title: String,
        reason: String,
    },
    /// Nothing left to play; the idle timer is running.
    QueueFinished { guild_id: GuildId },
    IdleDisconnected { guild_id: GuildId },
}

impl PlaybackEvent {
    pub fn guild_id(&self) -> GuildId {
        match self {
            PlaybackEvent::NowPlaying { guild_id, .. }
            | PlaybackEvent::TrackFailed { guild_id, .. }
            | PlaybackEvent::QueueFinished { guild_id }
            | PlaybackEvent::IdleDisconnected { guild_id } => *guild_id,
        }
    }
}
