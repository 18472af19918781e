use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{Lookup, MusicSource, QueryKind, Resolve, ResolveError, SpotifyClient};
use crate::audio::Track;

const MAX_SEARCH_FALLBACKS: usize = 2;

/// Production [`Resolve`] implementation.
///
/// URLs go to the primary source. Searches walk the chain primary → first
/// fallback → second fallback, each only after the previous one failed or
/// found nothing.
pub struct MediaResolver {
    primary: Arc<dyn MusicSource>,
    fallbacks: Vec<Arc<dyn MusicSource>>,
    spotify: Option<SpotifyClient>,
    max_playlist_size: usize,
}

impl MediaResolver {
    pub fn new(primary: Arc<dyn MusicSource>, max_playlist_size: usize) -> Self {
        Self {
            primary,
            fallbacks: Vec::new(),
            spotify: None,
            max_playlist_size,
        }
    }

    pub fn with_fallback(mut self, source: Arc<dyn MusicSource>) -> Self {
        if self.fallbacks.len() < MAX_SEARCH_FALLBACKS {
            self.fallbacks.push(source);
        } else {
            warn!("⚠️ Ignoring extra fallback source: {}", source.source_name());
        }
        self
    }

    pub fn with_spotify(mut self, spotify: SpotifyClient) -> Self {
        self.spotify = Some(spotify);
        self
    }

    /// Names of the search chain, in the order they are tried.
    pub fn chain(&self) -> Vec<&'static str> {
        std::iter::once(&self.primary)
            .chain(self.fallbacks.iter())
            .map(|s| s.source_name())
            .collect()
    }

    async fn search_chain(&self, query: &str) -> Result<Track, ResolveError> {
        let mut last_error = ResolveError::NoResults(query.to_string());

        for source in std::iter::once(&self.primary).chain(self.fallbacks.iter()) {
            match source.search(query, 1).await {
                Ok(tracks) => match tracks.into_iter().next() {
                    Some(track) => {
                        debug!("✅ {} resolved `{}`", source.source_name(), query);
                        return Ok(track);
                    }
                    None => {
                        warn!("⚠️ {} found nothing for `{}`", source.source_name(), query);
                        last_error = ResolveError::NoResults(query.to_string());
                    }
                },
                Err(e) => {
                    warn!("❌ {} failed for `{}`: {}", source.source_name(), query, e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    async fn resolve_url(&self, url: &str) -> Result<Track, ResolveError> {
        let primary_error = match self.primary.get_track(url).await {
            Ok(track) => return Ok(track),
            Err(e) => e,
        };
        warn!("❌ {} failed for {}: {}", self.primary.source_name(), url, primary_error);

        for source in self.fallbacks.iter().filter(|s| s.is_valid_url(url)) {
            match source.get_track(url).await {
                Ok(track) => {
                    info!("✅ {} recovered {}", source.source_name(), url);
                    return Ok(track);
                }
                Err(e) => warn!("❌ {} failed for {}: {}", source.source_name(), url, e),
            }
        }

        Err(primary_error)
    }
}

#[async_trait]
impl Resolve for MediaResolver {
    async fn plan(&self, query: &str) -> Result<Vec<Lookup>, ResolveError> {
        let mut lookups = match QueryKind::classify(query) {
            QueryKind::Spotify(link) => match &self.spotify {
                Some(spotify) => spotify.expand(&link, self.max_playlist_size).await?,
                None => {
                    return Err(ResolveError::Upstream(
                        "Spotify links are not supported".into(),
                    ))
                }
            },
            QueryKind::YouTubePlaylist(url) => {
                let entries = self.primary.get_playlist(&url).await?;
                if entries.is_empty() {
                    return Err(ResolveError::NoResults(url));
                }
                entries
            }
            QueryKind::Url(url) => vec![Lookup::Url(url)],
            QueryKind::Search(terms) if terms.is_empty() => {
                return Err(ResolveError::NoResults(query.to_string()))
            }
            QueryKind::Search(terms) => vec![Lookup::Search(terms)],
        };

        if lookups.len() > self.max_playlist_size {
            info!(
                "✂️ Truncating {} entries to {}",
                lookups.len(),
                self.max_playlist_size
            );
            lookups.truncate(self.max_playlist_size);
        }
        Ok(lookups)
    }

    async fn resolve(&self, lookup: &Lookup) -> Result<Track, ResolveError> {
        match lookup {
            Lookup::Url(url) => self.resolve_url(url).await,
            Lookup::Search(query) => self.search_chain(query).await,
        }
    }
}
