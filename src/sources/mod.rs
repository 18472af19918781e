//! # Media resolution
//!
//! Turns what a user typed into playable [`Track`]s.
//!
//! Resolution happens in two steps so the queue manager can stream results
//! into the queue as they arrive:
//!
//! 1. [`Resolve::plan`] classifies the query and expands it into an ordered
//!    list of [`Lookup`]s. A plain search or URL yields one lookup; a Spotify
//!    album or a YouTube playlist yields one per entry.
//! 2. [`Resolve::resolve`] turns a single lookup into a `Track`, walking the
//!    search fallback chain when needed.
//!
//! Concrete backends implement [`MusicSource`]:
//! - [`YtDlpClient`]: yt-dlp subprocess, YouTube search or SoundCloud search
//! - [`InvidiousClient`]: Invidious REST API over a list of public instances
//! - [`SpotifyClient`]: expands Spotify links into search queries
//!
//! Timeouts are not applied here; the caller bounds every call.

pub mod invidious;
pub mod resolver;
pub mod spotify;
pub mod ytdlp;

use async_trait::async_trait;
use std::{fmt, time::Duration};
use thiserror::Error;
use url::Url;

use crate::audio::Track;

pub use invidious::InvidiousClient;
pub use resolver::MediaResolver;
pub use spotify::{SpotifyClient, SpotifyLink};
pub use ytdlp::YtDlpClient;

/// Why a lookup produced no track.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResolveError {
    #[error("No results found for `{0}`")]
    NoResults(String),

    #[error("Timed out after {}s while resolving", .0.as_secs())]
    Timeout(Duration),

    #[error("Source error: {0}")]
    Upstream(String),
}

impl From<reqwest::Error> for ResolveError {
    fn from(err: reqwest::Error) -> Self {
        ResolveError::Upstream(err.to_string())
    }
}

/// One unit of work for [`Resolve::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Url(String),
    Search(String),
}

impl Lookup {
    pub fn as_str(&self) -> &str {
        match self {
            Lookup::Url(s) | Lookup::Search(s) => s,
        }
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common interface of every music backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MusicSource: Send + Sync {
    /// Searches the backend, best match first.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>, ResolveError>;

    /// Resolves a page URL into a playable track.
    async fn get_track(&self, url: &str) -> Result<Track, ResolveError>;

    /// Lists the entries of a playlist, in page order.
    async fn get_playlist(&self, url: &str) -> Result<Vec<Lookup>, ResolveError>;

    fn is_valid_url(&self, url: &str) -> bool;

    fn source_name(&self) -> &'static str;
}

/// Two-step resolution used by the queue manager.
#[async_trait]
pub trait Resolve: Send + Sync {
    /// Expands a query into the ordered lookups it stands for.
    async fn plan(&self, query: &str) -> Result<Vec<Lookup>, ResolveError>;

    async fn resolve(&self, lookup: &Lookup) -> Result<Track, ResolveError>;
}

/// What a raw query looks like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKind {
    Spotify(SpotifyLink),
    YouTubePlaylist(String),
    Url(String),
    Search(String),
}

impl QueryKind {
    pub fn classify(query: &str) -> Self {
        let query = query.trim();

        if let Some(link) = SpotifyLink::parse(query) {
            return QueryKind::Spotify(link);
        }

        match Url::parse(query) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                if is_youtube_host(url.host_str().unwrap_or_default()) && is_playlist_url(&url) {
                    QueryKind::YouTubePlaylist(query.to_string())
                } else {
                    QueryKind::Url(query.to_string())
                }
            }
            _ => {
                let terms = query.strip_prefix("ytsearch:").unwrap_or(query).trim();
                QueryKind::Search(terms.to_string())
            }
        }
    }
}

pub fn is_youtube_host(host: &str) -> bool {
    matches!(
        host,
        "youtube.com" | "www.youtube.com" | "m.youtube.com" | "music.youtube.com" | "youtu.be"
    )
}

fn is_playlist_url(url: &Url) -> bool {
    url.path().starts_with("/playlist") || url.query_pairs().any(|(key, _)| key == "list")
}
