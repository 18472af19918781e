use base64::{engine::general_purpose::STANDARD, Engine as _};
use parking_lot::Mutex;
use regex::Regex;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

use super::{Lookup, ResolveError};

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE: &str = "https://api.spotify.com/v1";

/// Spotify never serves audio here: links are expanded into
/// `"{name} {artist}"` searches that the rest of the chain resolves.
///
/// With client credentials configured the Web API is used (token cached until
/// it expires). Without them, or when the API fails, the public page title is
/// scraped and used as a single search.
pub struct SpotifyClient {
    http: reqwest::Client,
    credentials: Option<(String, String)>,
    token: Mutex<Option<CachedToken>>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpotifyKind {
    Track,
    Album,
    Playlist,
}

/// A parsed `open.spotify.com` link or `spotify:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotifyLink {
    pub kind: SpotifyKind,
    pub id: String,
}

impl SpotifyLink {
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();

        if let Some(rest) = input.strip_prefix("spotify:") {
            let mut parts = rest.split(':');
            let kind = Self::kind_from(parts.next()?)?;
            let id = parts.next().filter(|id| !id.is_empty())?;
            return Some(Self { kind, id: id.to_string() });
        }

        let url = Url::parse(input).ok()?;
        if url.host_str()? != "open.spotify.com" {
            return None;
        }

        // Localized links look like /intl-es/track/{id}
        let mut segments = url
            .path_segments()?
            .filter(|s| !s.is_empty() && !s.starts_with("intl-"));
        let kind = Self::kind_from(segments.next()?)?;
        let id = segments.next()?;
        Some(Self { kind, id: id.to_string() })
    }

    fn kind_from(segment: &str) -> Option<SpotifyKind> {
        match segment {
            "track" => Some(SpotifyKind::Track),
            "album" => Some(SpotifyKind::Album),
            "playlist" => Some(SpotifyKind::Playlist),
            _ => None,
        }
    }

    pub fn web_url(&self) -> String {
        let kind = match self.kind {
            SpotifyKind::Track => "track",
            SpotifyKind::Album => "album",
            SpotifyKind::Playlist => "playlist",
        };
        format!("https://open.spotify.com/{}/{}", kind, self.id)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    name: String,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Paging<T> {
    items: Vec<T>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    track: Option<SpotifyTrack>,
}

impl SpotifyTrack {
    fn search_query(&self) -> String {
        match self.artists.first() {
            Some(artist) => format!("{} {}", self.name, artist.name),
            None => self.name.clone(),
        }
    }
}

impl SpotifyClient {
    pub fn new(credentials: Option<(String, String)>) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()?;

        Ok(Self {
            http,
            credentials,
            token: Mutex::new(None),
        })
    }

    /// Expands a link into at most `limit` search lookups, in Spotify order.
    pub async fn expand(&self, link: &SpotifyLink, limit: usize) -> Result<Vec<Lookup>, ResolveError> {
        if self.credentials.is_some() {
            match self.expand_with_api(link, limit).await {
                Ok(lookups) if !lookups.is_empty() => {
                    info!("🟢 Spotify link expanded into {} searches", lookups.len());
                    return Ok(lookups);
                }
                Ok(_) => warn!("⚠️ Spotify returned no tracks for {}", link.id),
                Err(e) => warn!("❌ Spotify API failed, scraping the page instead: {}", e),
            }
        }

        let title = self.scrape_title(link).await?;
        info!("🟢 Spotify page title: {}", title);
        Ok(vec![Lookup::Search(title)])
    }

    async fn expand_with_api(&self, link: &SpotifyLink, limit: usize) -> Result<Vec<Lookup>, ResolveError> {
        let token = self.access_token().await?;

        let queries = match link.kind {
            SpotifyKind::Track => {
                let track: SpotifyTrack = self
                    .get_json(&format!("{}/tracks/{}", API_BASE, link.id), &token)
                    .await?;
                vec![track.search_query()]
            }
            SpotifyKind::Album => {
                let first = format!("{}/albums/{}/tracks?limit=50", API_BASE, link.id);
                self.collect_pages::<SpotifyTrack>(first, &token, limit)
                    .await?
                    .iter()
                    .map(SpotifyTrack::search_query)
                    .collect()
            }
            SpotifyKind::Playlist => {
                let first = format!("{}/playlists/{}/tracks?limit=100", API_BASE, link.id);
                self.collect_pages::<PlaylistItem>(first, &token, limit)
                    .await?
                    .into_iter()
                    .filter_map(|item| item.track)
                    .map(|track| track.search_query())
                    .collect()
            }
        };

        Ok(queries.into_iter().take(limit).map(Lookup::Search).collect())
    }

    /// Follows `next` links until `limit` items are collected.
    async fn collect_pages<T>(&self, first: String, token: &str, limit: usize) -> Result<Vec<T>, ResolveError>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut next = Some(first);

        while let Some(url) = next.take() {
            let page: Paging<T> = self.get_json(&url, token).await?;
            debug!("📄 Spotify page with {} items", page.items.len());
            items.extend(page.items);
            if items.len() >= limit {
                break;
            }
            next = page.next;
        }

        Ok(items)
    }

    async fn get_json<T>(&self, url: &str, token: &str) -> Result<T, ResolveError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn access_token(&self) -> Result<String, ResolveError> {
        let cached = self
            .token
            .lock()
            .as_ref()
            .filter(|t| t.expires_at > Instant::now())
            .map(|t| t.value.clone());
        if let Some(token) = cached {
            return Ok(token);
        }

        let (client_id, client_secret) = self
            .credentials
            .as_ref()
            .ok_or_else(|| ResolveError::Upstream("Spotify credentials are not configured".into()))?;
        let basic = STANDARD.encode(format!("{}:{}", client_id, client_secret));

        let response: TokenResponse = self
            .http
            .post(TOKEN_URL)
            .header(reqwest::header::AUTHORIZATION, format!("Basic {}", basic))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!("🔑 New Spotify token, valid for {}s", response.expires_in);
        // Refresh a minute early so a request never races the expiry.
        let lifetime = Duration::from_secs(response.expires_in.saturating_sub(60));
        *self.token.lock() = Some(CachedToken {
            value: response.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        Ok(response.access_token)
    }

    async fn scrape_title(&self, link: &SpotifyLink) -> Result<String, ResolveError> {
        let url = link.web_url();
        let html = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        extract_page_title(&html).ok_or(ResolveError::NoResults(url))
    }
}

/// Pulls a usable song title out of a Spotify page.
pub fn extract_page_title(html: &str) -> Option<String> {
    let patterns = [
        r#"(?i)<meta property="og:title" content="([^"]*)""#,
        r#"(?i)<meta name="twitter:title" content="([^"]*)""#,
        r"(?is)<title>(.*?)</title>",
    ];

    patterns.iter().find_map(|pattern| {
        let regex = Regex::new(pattern).ok()?;
        let raw = regex.captures(html)?.get(1)?.as_str();
        let title = decode_entities(raw)
            .replace("| Spotify", "")
            .replace("Spotify", "")
            .trim()
            .trim_end_matches(['-', '|'])
            .trim()
            .to_string();
        (!title.is_empty()).then_some(title)
    })
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}
