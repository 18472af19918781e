use rand::seq::SliceRandom;
use serenity::model::id::ChannelId;
use std::{collections::VecDeque, time::Duration};
use tracing::{debug, info};

use super::{
    error::{PlaybackError, PlaybackResult},
    track::{LoopMode, PlayState, Track},
};

/// Upcoming tracks plus the "now playing" slot of one guild.
///
/// Pure data structure: no I/O, no locking. The guild task owns it and is the
/// only writer, which is what keeps selection and mutation serialized.
#[derive(Debug)]
pub struct MusicQueue {
    items: VecDeque<Track>,
    current: Option<Track>,
    loop_mode: LoopMode,
    max_size: usize,
}

/// Result of appending a batch of tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendSummary {
    pub accepted: usize,
    pub dropped: usize,
    /// One-based queue position of the first accepted track.
    pub first_position: usize,
}

impl MusicQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            current: None,
            loop_mode: LoopMode::Off,
            max_size,
        }
    }

    /// Appends tracks in order, keeping as many as fit.
    ///
    /// Fails with `QueueFull` only when not a single track fits.
    pub fn add_tracks(&mut self, tracks: Vec<Track>) -> PlaybackResult<AppendSummary> {
        let available = self.max_size.saturating_sub(self.items.len());
        if available == 0 && !tracks.is_empty() {
            return Err(PlaybackError::QueueFull { max: self.max_size });
        }

        let first_position = self.items.len() + 1;
        let total = tracks.len();
        let accepted = total.min(available);

        for track in tracks.into_iter().take(accepted) {
            info!("➕ Queued: {}", track.title());
            self.items.push_back(track);
        }

        Ok(AppendSummary {
            accepted,
            dropped: total - accepted,
            first_position,
        })
    }

    /// Selects the next track to play and makes it current.
    ///
    /// Track loop replays the current track without touching the queue; Queue
    /// loop pushes the dequeued track back onto the tail so the rotation is kept.
    /// Returns `None` and clears the current slot when nothing is left.
    pub fn next_track(&mut self) -> Option<Track> {
        if self.loop_mode == LoopMode::Track {
            if let Some(current) = &self.current {
                info!("🔂 Replaying: {}", current.title());
                return Some(current.clone());
            }
        }

        match self.items.pop_front() {
            Some(next) => {
                if self.loop_mode == LoopMode::Queue {
                    self.items.push_back(next.clone());
                    debug!("🔁 Rotated to the tail: {}", next.title());
                }
                info!("➡️ Next in queue: {}", next.title());
                self.current = Some(next.clone());
                Some(next)
            }
            None => {
                info!("📭 Queue is empty");
                self.current = None;
                None
            }
        }
    }

    /// Drops the current track so Track loop can't pick it again.
    pub fn forget_current(&mut self) -> Option<Track> {
        self.current.take()
    }

    /// Removes every upcoming track; the current one is untouched.
    pub fn clear(&mut self) -> usize {
        let cleared = self.items.len();
        self.items.clear();
        info!("🗑️ Queue cleared: {} tracks removed", cleared);
        cleared
    }

    /// Uniformly shuffles the upcoming tracks.
    pub fn shuffle(&mut self) -> PlaybackResult<usize> {
        if self.items.len() < 2 {
            return Err(PlaybackError::InsufficientTracks { len: self.items.len() });
        }

        let mut rng = rand::thread_rng();
        self.items.make_contiguous().shuffle(&mut rng);
        info!("🔀 Queue shuffled ({} tracks)", self.items.len());
        Ok(self.items.len())
    }

    /// Removes the track at a one-based position.
    pub fn remove(&mut self, index: usize) -> PlaybackResult<Track> {
        let len = self.items.len();
        if index == 0 || index > len {
            return Err(PlaybackError::IndexOutOfRange { index, len });
        }

        let removed = self
            .items
            .remove(index - 1)
            .ok_or(PlaybackError::IndexOutOfRange { index, len })?;
        debug!("❌ Removed position {}: {}", index, removed.title());
        Ok(removed)
    }

    pub fn set_loop_mode(&mut self, mode: LoopMode) {
        self.loop_mode = mode;
        match mode {
            LoopMode::Off => info!("➡️ Loop disabled"),
            LoopMode::Track => info!("🔂 Looping current track"),
            LoopMode::Queue => info!("🔁 Looping whole queue"),
        }
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> impl Iterator<Item = &Track> {
        self.items.iter()
    }
}

/// Point-in-time view of a guild's playback.
#[derive(Debug, Clone, Default)]
pub struct PlaybackStatus {
    pub state: PlayState,
    pub now_playing: Option<Track>,
    pub upcoming: Vec<Track>,
    pub loop_mode: LoopMode,
    pub volume: u8,
    pub connected: bool,
    pub voice_channel: Option<ChannelId>,
}

impl PlaybackStatus {
    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.state == PlayState::Paused
    }

    pub fn queue_len(&self) -> usize {
        self.upcoming.len()
    }

    pub fn total_duration(&self) -> Duration {
        let upcoming: Duration = self.upcoming.iter().filter_map(Track::duration).sum();
        let current = self
            .now_playing
            .as_ref()
            .and_then(Track::duration)
            .unwrap_or_default();
        upcoming + current
    }

    /// Returns a one-based page of upcoming tracks.
    pub fn page(&self, page: usize, items_per_page: usize) -> QueuePage {
        let items_per_page = items_per_page.max(1);
        let total_items = self.upcoming.len();
        let total_pages = if total_items == 0 {
            1
        } else {
            total_items.div_ceil(items_per_page)
        };
        let current_page = page.clamp(1, total_pages);
        let start = (current_page - 1) * items_per_page;
        let end = (start + items_per_page).min(total_items);

        QueuePage {
            items: self.upcoming[start..end].to_vec(),
            first_position: start + 1,
            current_page,
            total_pages,
            total_items,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueuePage {
    pub items: Vec<Track>,
    pub first_position: usize,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}
