//! # Audio Module
//!
//! The playback core: per-guild queues, the resolve-then-play pipeline and
//! the voice backend.
//!
//! ## Architecture
//!
//! ### [`player`] - Audio Player
//! - Registry of guild tasks plus the public API used by every front-end
//! - Resolves queries outside the guild task, with per-lookup timeouts
//! - Multi-track requests are resolved one by one and appended as they land
//!
//! ### `guild` - Guild Playback
//! - One task per guild owns its queue, voice connection and active stream
//! - Commands arrive over an inbox and are handled strictly in order
//! - Stream completion is just another inbox message, tagged with a stream id
//!   so a stale completion can never advance the queue twice
//! - An idle timer disconnects a guild with nothing to play
//!
//! ### [`queue`] - Queue Management
//! - FIFO of upcoming tracks plus the "now playing" slot
//! - Loop modes: off, repeat track, rotate queue
//! - Shuffle, removal by position and paging for display
//!
//! ### [`voice`] - Voice Backend
//! - Traits over the voice transport so the core can be driven by fakes
//! - Production implementation on songbird, streaming over HTTP
//!
//! ## Lifecycle
//!
//! Guild state is created by the first operation that needs it and disposed
//! after `leave`, an external disconnect, or an idle timeout with an empty
//! queue. The next operation transparently creates it again.

pub mod error;
pub mod events;
mod guild;
mod idle;
pub mod player;
pub mod queue;
pub mod track;
pub mod voice;

#[cfg(test)]
mod tests;

pub use error::{PlaybackError, PlaybackResult};
pub use events::PlaybackEvent;
pub use player::{AudioPlayer, EnqueueOutcome, EnqueueRequest, PlayerSettings};
pub use queue::{PlaybackStatus, QueuePage};
pub use track::{LoopMode, PlayState, Track};
pub use voice::{SongbirdGateway, VoiceGateway};
