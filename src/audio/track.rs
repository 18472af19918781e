use chrono::{DateTime, Utc};
use serenity::model::id::UserId;
use std::{fmt, str::FromStr, time::Duration};

/// A resolved, playable track.
///
/// Tracks are immutable once built: the queue, the "now playing" slot and the
/// playback events all hold clones of the same value. Replaying a track builds a
/// new voice stream from this metadata; stream handles are never reused.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    title: String,
    stream_url: String,
    page_url: Option<String>,
    artist: Option<String>,
    duration: Option<Duration>,
    thumbnail: Option<String>,
    bitrate_kbps: Option<u32>,
    source_query: String,
    requested_by: Option<UserId>,
    added_at: DateTime<Utc>,
}

impl Track {
    pub fn new(title: impl Into<String>, stream_url: impl Into<String>, source_query: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            stream_url: stream_url.into(),
            page_url: None,
            artist: None,
            duration: None,
            thumbnail: None,
            bitrate_kbps: None,
            source_query: source_query.into(),
            requested_by: None,
            added_at: Utc::now(),
        }
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }
    pub fn page_url(&self) -> Option<&str> {
        self.page_url.as_deref()
    }
    pub fn artist(&self) -> Option<&str> {
        self.artist.as_deref()
    }
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }
    pub fn bitrate_kbps(&self) -> Option<u32> {
        self.bitrate_kbps
    }
    pub fn source_query(&self) -> &str {
        &self.source_query
    }
    pub fn requested_by(&self) -> Option<UserId> {
        self.requested_by
    }
    pub fn added_at(&self) -> DateTime<Utc> {
        self.added_at
    }

    /// URL shown to users: the web page when known, the raw stream otherwise.
    pub fn display_url(&self) -> &str {
        self.page_url.as_deref().unwrap_or(&self.stream_url)
    }

    // Builders
    pub fn with_page_url(mut self, page_url: impl Into<String>) -> Self {
        self.page_url = Some(page_url.into());
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    pub fn with_bitrate_kbps(mut self, bitrate: u32) -> Self {
        self.bitrate_kbps = Some(bitrate);
        self
    }

    pub fn with_requested_by(mut self, user_id: UserId) -> Self {
        self.requested_by = Some(user_id);
        self
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.artist {
            Some(artist) => write!(f, "{} - {}", self.title, artist),
            None => f.write_str(&self.title),
        }
    }
}

/// Queue re-insertion policy applied when a track completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    #[default]
    Off,
    Track,
    Queue,
}

impl LoopMode {
    /// Off → Track → Queue → Off.
    pub fn cycle(self) -> Self {
        match self {
            LoopMode::Off => LoopMode::Track,
            LoopMode::Track => LoopMode::Queue,
            LoopMode::Queue => LoopMode::Off,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoopMode::Off => "off",
            LoopMode::Track => "track",
            LoopMode::Queue => "queue",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            LoopMode::Off => "➡️",
            LoopMode::Track => "🔂",
            LoopMode::Queue => "🔁",
        }
    }
}

impl FromStr for LoopMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "track" | "t" | "song" | "single" => Ok(LoopMode::Track),
            "queue" | "q" | "all" => Ok(LoopMode::Queue),
            "off" | "stop" | "disable" => Ok(LoopMode::Off),
            other => Err(format!("unknown loop mode `{}`", other)),
        }
    }
}

/// Playback state machine of a single guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayState {
    #[default]
    Idle,
    Playing,
    Paused,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_mode_cycles_through_all_modes() {
        assert_eq!(LoopMode::Off.cycle(), LoopMode::Track);
        assert_eq!(LoopMode::Track.cycle(), LoopMode::Queue);
        assert_eq!(LoopMode::Queue.cycle(), LoopMode::Off);
    }

    #[test]
    fn test_loop_mode_aliases() {
        assert_eq!("single".parse::<LoopMode>(), Ok(LoopMode::Track));
        assert_eq!("T".parse::<LoopMode>(), Ok(LoopMode::Track));
        assert_eq!("all".parse::<LoopMode>(), Ok(LoopMode::Queue));
        assert_eq!("disable".parse::<LoopMode>(), Ok(LoopMode::Off));
        assert!("sometimes".parse::<LoopMode>().is_err());
    }

    #[test]
    fn test_display_url_prefers_page() {
        let track = Track::new("Song", "https://cdn.example/a.m4a", "song");
        assert_eq!(track.display_url(), "https://cdn.example/a.m4a");

        let track = track.with_page_url("https://www.youtube.com/watch?v=abcdefghijk");
        assert_eq!(track.display_url(), "https://www.youtube.com/watch?v=abcdefghijk");
    }
}
