use thiserror::Error;

use crate::sources::ResolveError;

/// Errors reported by the playback core.
///
/// The `Display` text is shown to users as-is by the front-ends.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlaybackError {
    /// The requester is not in a voice channel.
    #[error("Join a voice channel first")]
    NoVoiceChannel,

    /// The bot has no voice connection in the guild.
    #[error("I'm not connected to a voice channel")]
    NoVoiceConnection,

    /// A single-item lookup failed.
    #[error(transparent)]
    Resolution(#[from] ResolveError),

    /// Every item of a multi-item request failed to resolve.
    #[error("Couldn't resolve any of the {attempted} tracks")]
    BatchFailed { attempted: usize },

    #[error("The queue is full (max {max} tracks)")]
    QueueFull { max: usize },

    #[error("Nothing is playing right now")]
    NothingPlaying,

    #[error("Playback is already paused")]
    AlreadyPaused,

    #[error("Nothing is paused right now")]
    NotPaused,

    #[error("Not enough tracks in the queue to shuffle ({len} queued)")]
    InsufficientTracks { len: usize },

    /// One-based index outside `[1, len]`.
    #[error("Invalid index {index}, the queue has {len} tracks")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Volume must be between 0 and 100, got {0}")]
    VolumeOutOfRange(i64),

    /// The voice transport rejected an operation.
    #[error("Voice error: {0}")]
    Voice(String),

    /// The guild's playback task went away while handling the request.
    #[error("Playback for this server is restarting, try again")]
    GuildUnavailable,
}

pub type PlaybackResult<T> = Result<T, PlaybackError>;
