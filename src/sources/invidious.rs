use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{Lookup, MusicSource, ResolveError};
use crate::audio::Track;

/// Client for the Invidious REST API.
///
/// Instances are tried in configuration order; the first one that answers
/// wins. Search results are turned into playable tracks by reading the audio
/// stream URL from `/api/v1/videos/{id}`.
pub struct InvidiousClient {
    client: reqwest::Client,
    instances: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct InvidiousVideo {
    title: String,
    #[serde(rename = "lengthSeconds")]
    length_seconds: Option<u64>,
    author: Option<String>,
    #[serde(rename = "videoThumbnails", default)]
    video_thumbnails: Vec<Thumbnail>,
    #[serde(rename = "adaptiveFormats", default)]
    adaptive_formats: Vec<AdaptiveFormat>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
    width: u32,
}

#[derive(Debug, Deserialize)]
struct AdaptiveFormat {
    url: String,
    #[serde(rename = "type")]
    format_type: String,
    bitrate: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct InvidiousSearchResult {
    #[serde(rename = "videoId")]
    video_id: String,
}

impl InvidiousClient {
    pub fn new(instances: Vec<String>) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()?;

        let instances = instances
            .into_iter()
            .map(|i| i.trim_end_matches('/').to_string())
            .collect();

        Ok(Self { client, instances })
    }

    async fn try_search(&self, instance: &str, query: &str) -> Result<Vec<String>, ResolveError> {
        let response = self
            .client
            .get(format!("{}/api/v1/search", instance))
            .query(&[("q", query), ("type", "video"), ("sort_by", "relevance")])
            .timeout(Duration::from_secs(10))
            .send()
            .await?
            .error_for_status()?;

        let results: Vec<InvidiousSearchResult> = response.json().await?;
        Ok(results.into_iter().map(|r| r.video_id).collect())
    }

    async fn get_video_info(&self, video_id: &str) -> Result<InvidiousVideo, ResolveError> {
        let mut last_error = ResolveError::Upstream("no Invidious instances configured".into());

        for instance in &self.instances {
            let url = format!("{}/api/v1/videos/{}", instance, video_id);
            let attempt = async {
                let response = self
                    .client
                    .get(&url)
                    .timeout(Duration::from_secs(10))
                    .send()
                    .await?
                    .error_for_status()?;
                response.json::<InvidiousVideo>().await
            };

            match attempt.await {
                Ok(video) => {
                    debug!("✅ Video info from {}", instance);
                    return Ok(video);
                }
                Err(e) => {
                    warn!("❌ {} failed for {}: {}", instance, video_id, e);
                    last_error = e.into();
                }
            }
        }

        Err(last_error)
    }

    async fn track_for(&self, video_id: &str, source_query: &str) -> Result<Track, ResolveError> {
        let video = self.get_video_info(video_id).await?;
        let (stream_url, bitrate) = pick_audio_stream(&video)
            .ok_or_else(|| ResolveError::NoResults(source_query.to_string()))?;
        let stream_url = stream_url.to_string();

        let mut track = Track::new(video.title, stream_url, source_query)
            .with_page_url(format!("https://www.youtube.com/watch?v={}", video_id));
        if let Some(author) = video.author {
            track = track.with_artist(author);
        }
        if let Some(secs) = video.length_seconds.filter(|s| *s > 0) {
            track = track.with_duration(Duration::from_secs(secs));
        }
        if let Some(thumb) = video.video_thumbnails.into_iter().find(|t| t.width >= 320) {
            track = track.with_thumbnail(thumb.url);
        }
        if let Some(kbps) = bitrate {
            track = track.with_bitrate_kbps(kbps);
        }
        Ok(track)
    }

    /// Extracts the 11-character video id from a YouTube URL.
    pub fn extract_video_id(url: &str) -> Option<String> {
        let regex = Regex::new(
            r"(?:youtube\.com/watch\?(?:.*&)?v=|youtu\.be/|youtube\.com/embed/|youtube\.com/shorts/)([a-zA-Z0-9_-]{11})",
        )
        .ok()?;
        regex
            .captures(url)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }
}

/// Picks the best audio-only stream, preferring mp4 audio.
fn pick_audio_stream(video: &InvidiousVideo) -> Option<(&str, Option<u32>)> {
    let audio = || {
        video
            .adaptive_formats
            .iter()
            .filter(|f| f.format_type.starts_with("audio/"))
    };

    let chosen = audio()
        .find(|f| f.format_type.contains("mp4"))
        .or_else(|| audio().next())?;

    // Invidious reports the bitrate either as a number or as a string, in bps.
    let bitrate = chosen.bitrate.as_ref().and_then(|b| match b {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    });

    Some((chosen.url.as_str(), bitrate.map(|bps| (bps / 1000) as u32)))
}

#[async_trait]
impl MusicSource for InvidiousClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>, ResolveError> {
        info!("🔍 Invidious search: {}", query);

        for instance in &self.instances {
            let ids = match self.try_search(instance, query).await {
                Ok(ids) if !ids.is_empty() => ids,
                Ok(_) => {
                    warn!("⚠️ {} returned no results", instance);
                    continue;
                }
                Err(e) => {
                    warn!("❌ Search failed on {}: {}", instance, e);
                    continue;
                }
            };

            let mut tracks = Vec::new();
            for id in ids.iter().take(limit.max(1)) {
                match self.track_for(id, query).await {
                    Ok(track) => tracks.push(track),
                    Err(e) => debug!("Skipping {}: {}", id, e),
                }
            }

            if !tracks.is_empty() {
                info!("✅ Invidious found {} results on {}", tracks.len(), instance);
                return Ok(tracks);
            }
        }

        Err(ResolveError::NoResults(query.to_string()))
    }

    async fn get_track(&self, url: &str) -> Result<Track, ResolveError> {
        let video_id = Self::extract_video_id(url)
            .ok_or_else(|| ResolveError::Upstream(format!("not a YouTube video URL: {}", url)))?;
        self.track_for(&video_id, url).await
    }

    async fn get_playlist(&self, url: &str) -> Result<Vec<Lookup>, ResolveError> {
        Err(ResolveError::Upstream(format!(
            "playlists are not supported through Invidious: {}",
            url
        )))
    }

    fn is_valid_url(&self, url: &str) -> bool {
        Self::extract_video_id(url).is_some()
    }

    fn source_name(&self) -> &'static str {
        "invidious"
    }
}
