use async_trait::async_trait;
use serde::Deserialize;
use std::{path::PathBuf, process::Stdio, time::Duration};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{Lookup, MusicSource, ResolveError};
use crate::audio::Track;

const AUDIO_FORMAT: &str = "bestaudio[ext=m4a]/bestaudio[ext=webm]/bestaudio/best";

/// yt-dlp subprocess client.
///
/// The same binary serves YouTube (`ytsearch`) and SoundCloud (`scsearch`)
/// searches; only the search prefix differs. Child processes are killed when
/// the future running them is dropped, so an outer timeout never leaks a
/// process.
#[derive(Debug, Clone)]
pub struct YtDlpClient {
    binary: PathBuf,
    search_prefix: &'static str,
    cookies: Option<PathBuf>,
    name: &'static str,
}

#[derive(Debug, Deserialize)]
struct YtDlpEntry {
    id: Option<String>,
    title: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    uploader: Option<String>,
    artist: Option<String>,
    abr: Option<f64>,
}

impl YtDlpClient {
    pub fn youtube(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            search_prefix: "ytsearch",
            cookies: None,
            name: "yt-dlp",
        }
    }

    pub fn soundcloud(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            search_prefix: "scsearch",
            cookies: None,
            name: "soundcloud",
        }
    }

    pub fn with_cookies(mut self, cookies: Option<PathBuf>) -> Self {
        self.cookies = cookies;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args([
            "--quiet",
            "--no-warnings",
            "--ignore-errors",
            "--no-check-certificate",
            "--socket-timeout",
            "60",
            "--retries",
            "5",
            "--fragment-retries",
            "5",
        ]);
        if let Some(cookies) = &self.cookies {
            cmd.arg("--cookies").arg(cookies);
        }
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }

    async fn run(&self, mut cmd: Command) -> Result<String, ResolveError> {
        let output = cmd
            .output()
            .await
            .map_err(|e| ResolveError::Upstream(format!("failed to run yt-dlp: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        // --ignore-errors exits non-zero on partial failures; keep whatever was printed.
        if !output.status.success() && stdout.trim().is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("❌ yt-dlp failed: {}", stderr.trim());
            return Err(ResolveError::Upstream(
                stderr.lines().last().unwrap_or("yt-dlp failed").to_string(),
            ));
        }
        Ok(stdout)
    }
}

#[async_trait]
impl MusicSource for YtDlpClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>, ResolveError> {
        info!("🔍 {} search: {}", self.name, query);

        let mut cmd = self.command();
        cmd.args(["--dump-json", "--format", AUDIO_FORMAT, "--no-playlist"])
            .arg(format!("{}{}:{}", self.search_prefix, limit.max(1), query));

        let stdout = self.run(cmd).await?;
        let tracks: Vec<Track> = parse_entries(&stdout)
            .into_iter()
            .filter_map(|entry| entry.into_track(query))
            .collect();

        if tracks.is_empty() {
            return Err(ResolveError::NoResults(query.to_string()));
        }
        debug!("✅ {} returned {} results", self.name, tracks.len());
        Ok(tracks)
    }

    async fn get_track(&self, url: &str) -> Result<Track, ResolveError> {
        info!("🎵 Extracting with {}: {}", self.name, url);

        let mut cmd = self.command();
        cmd.args(["--dump-json", "--format", AUDIO_FORMAT, "--no-playlist"])
            .arg(url);

        let stdout = self.run(cmd).await?;
        parse_entries(&stdout)
            .into_iter()
            .find_map(|entry| entry.into_track(url))
            .ok_or_else(|| ResolveError::NoResults(url.to_string()))
    }

    async fn get_playlist(&self, url: &str) -> Result<Vec<Lookup>, ResolveError> {
        info!("📋 Listing playlist: {}", url);

        let mut cmd = self.command();
        cmd.args(["--flat-playlist", "--dump-json"]).arg(url);

        let stdout = self.run(cmd).await?;
        let lookups: Vec<Lookup> = parse_entries(&stdout)
            .into_iter()
            .filter_map(YtDlpEntry::into_playlist_lookup)
            .collect();

        info!("📋 Playlist has {} entries", lookups.len());
        Ok(lookups)
    }

    fn is_valid_url(&self, url: &str) -> bool {
        let Ok(url) = url::Url::parse(url) else {
            return false;
        };
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }
        match self.search_prefix {
            "scsearch" => url
                .host_str()
                .is_some_and(|h| h == "soundcloud.com" || h.ends_with(".soundcloud.com")),
            _ => true,
        }
    }

    fn source_name(&self) -> &'static str {
        self.name
    }
}

impl YtDlpEntry {
    fn into_track(self, source_query: &str) -> Option<Track> {
        let stream_url = self.url?;
        let title = self.title.unwrap_or_else(|| "Unknown title".to_string());

        let mut track = Track::new(title, stream_url, source_query);
        if let Some(page) = self.webpage_url {
            track = track.with_page_url(page);
        }
        if let Some(artist) = self.artist.or(self.uploader) {
            track = track.with_artist(artist);
        }
        if let Some(secs) = self.duration.filter(|d| d.is_finite() && *d > 0.0) {
            track = track.with_duration(Duration::from_secs_f64(secs));
        }
        if let Some(thumbnail) = self.thumbnail {
            track = track.with_thumbnail(thumbnail);
        }
        if let Some(abr) = self.abr.filter(|a| a.is_finite() && *a > 0.0) {
            track = track.with_bitrate_kbps(abr.round() as u32);
        }
        Some(track)
    }

    /// Flat playlist entries carry either a full URL or a bare video id.
    fn into_playlist_lookup(self) -> Option<Lookup> {
        match (self.url, self.id) {
            (Some(url), _) if url.starts_with("http") => Some(Lookup::Url(url)),
            (_, Some(id)) => Some(Lookup::Url(format!("https://www.youtube.com/watch?v={}", id))),
            _ => None,
        }
    }
}

/// Parses `--dump-json` output: one JSON document per line.
fn parse_entries(stdout: &str) -> Vec<YtDlpEntry> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<YtDlpEntry>(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Skipping unparsable yt-dlp line: {}", e);
                None
            }
        })
        .collect()
}
