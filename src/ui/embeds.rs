use serenity::{
    all::Timestamp,
    builder::{CreateActionRow, CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use super::buttons;
use crate::{
    audio::{EnqueueOutcome, LoopMode, PlaybackEvent, PlaybackStatus, Track},
    bot::dispatch::Reply,
};

/// Standard color palette
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

const STANDARD_FOOTER: &str = "🎵 Melody Bot";
const ITEMS_PER_PAGE: usize = 10;

/// A reply ready to be sent by either front-end.
pub struct Rendered {
    pub embed: CreateEmbed,
    pub components: Vec<CreateActionRow>,
    /// Slash commands show these only to the caller.
    pub ephemeral: bool,
}

impl Rendered {
    fn plain(embed: CreateEmbed) -> Self {
        Self {
            embed,
            components: Vec::new(),
            ephemeral: false,
        }
    }
}

/// Renders a command reply. `prefix` is how commands are invoked in help
/// texts, `/` for slash commands or the configured text prefix.
pub fn render(reply: &Reply, prefix: &str) -> Rendered {
    match reply {
        Reply::Enqueued(EnqueueOutcome::Queued { track, position }) => {
            Rendered::plain(track_added_embed(track, *position))
        }
        Reply::Enqueued(EnqueueOutcome::Batch { added, failed, dropped }) => {
            Rendered::plain(batch_added_embed(*added, *failed, *dropped, prefix))
        }
        Reply::Skipped(track) => Rendered::plain(success_embed(
            "⏭️ Skipped",
            &format!("**{}**", track.title()),
        )),
        Reply::Paused => Rendered::plain(success_embed("⏸️ Paused", "Playback paused")),
        Reply::Resumed => Rendered::plain(success_embed("▶️ Resumed", "Playback resumed")),
        Reply::Stopped { cleared } => Rendered::plain(success_embed(
            "⏹️ Stopped",
            &format!("Playback stopped, {} removed from the queue", plural(*cleared, "track")),
        )),
        Reply::Left => Rendered::plain(success_embed("👋 Disconnected", "Left the voice channel")),
        Reply::Queue { status, page } => Rendered::plain(queue_embed(status, *page, prefix)),
        Reply::NowPlaying(status) => Rendered {
            embed: status_embed(status),
            components: buttons::player_controls(status),
            ephemeral: false,
        },
        Reply::LoopMode(mode) => Rendered::plain(success_embed(
            &format!("{} Loop", mode.emoji()),
            loop_description(*mode),
        )),
        Reply::Shuffled(count) => Rendered::plain(success_embed(
            "🔀 Shuffled",
            &format!("Shuffled {}", plural(*count, "upcoming track")),
        )),
        Reply::Removed(track) => Rendered::plain(success_embed(
            "🗑️ Removed",
            &format!("**{}** was removed from the queue", track.title()),
        )),
        Reply::Volume { level, changed } => Rendered::plain(volume_embed(*level, *changed, prefix)),
        Reply::Help => Rendered {
            ephemeral: true,
            ..Rendered::plain(help_embed(prefix))
        },
        Reply::Pong { latency } => Rendered::plain(pong_embed(*latency)),
        Reply::Failed(error) => Rendered {
            ephemeral: true,
            ..Rendered::plain(error_embed(&error.to_string()))
        },
    }
}

/// Renders a playback notification posted by the announcer.
pub fn event_embed(event: &PlaybackEvent) -> CreateEmbed {
    match event {
        PlaybackEvent::NowPlaying { track, loop_mode, .. } => now_playing_embed(track, *loop_mode),
        PlaybackEvent::TrackFailed { title, reason, .. } => CreateEmbed::default()
            .title("⚠️ Couldn't play track")
            .description(format!("**{}**\n{}", title, reason))
            .color(colors::WARNING_ORANGE)
            .footer(CreateEmbedFooter::new("Skipping to the next track"))
            .timestamp(Timestamp::now()),
        PlaybackEvent::QueueFinished { .. } => CreateEmbed::default()
            .title("✅ Queue finished")
            .description("Add more music to keep the party going")
            .color(colors::NEUTRAL_GRAY)
            .timestamp(Timestamp::now()),
        PlaybackEvent::IdleDisconnected { .. } => CreateEmbed::default()
            .title("💤 Disconnected")
            .description("Left the voice channel after being idle")
            .color(colors::NEUTRAL_GRAY)
            .timestamp(Timestamp::now()),
    }
}

pub fn now_playing_embed(track: &Track, loop_mode: LoopMode) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Now Playing")
        .description(format!("**{}**", track.title()))
        .color(colors::SUCCESS_GREEN)
        .field("🎤 Artist", track.artist().unwrap_or("Unknown"), true)
        .field("⏱️ Duration", duration_label(track.duration()), true);

    if let Some(user) = track.requested_by() {
        embed = embed.field("👤 Requested by", format!("<@{}>", user), true);
    }
    if loop_mode != LoopMode::Off {
        embed = embed.field(format!("{} Loop", loop_mode.emoji()), loop_mode.as_str(), true);
    }
    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }
    if let Some(bitrate) = track.bitrate_kbps() {
        embed = embed.field("🎚️ Bitrate", format!("{} kbps", bitrate), true);
    }

    embed
        .url(track.display_url())
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

fn status_embed(status: &PlaybackStatus) -> CreateEmbed {
    let Some(track) = &status.now_playing else {
        return error_embed("Nothing is playing right now");
    };

    let state = if status.is_paused() { "⏸️ Paused" } else { "▶️ Playing" };
    let mut embed = now_playing_embed(track, status.loop_mode)
        .field("📡 State", state, true)
        .field("🔊 Volume", format!("{}%", status.volume), true)
        .field("📋 Up next", plural(status.queue_len(), "track"), true)
        .field("🕒 Queued", format!("<t:{}:R>", track.added_at().timestamp()), true);

    if let Some(channel) = status.voice_channel {
        embed = embed.field("🔈 Channel", format!("<#{}>", channel), true);
    }
    embed
}

fn track_added_embed(track: &Track, position: Option<usize>) -> CreateEmbed {
    let (title, footer) = match position {
        Some(position) => (
            "✅ Added to Queue".to_string(),
            format!("Position #{} in the queue", position),
        ),
        None => ("🎵 Now Playing".to_string(), STANDARD_FOOTER.to_string()),
    };

    let mut embed = CreateEmbed::default()
        .title(title)
        .description(format!("**{}**", track.title()))
        .color(colors::SUCCESS_GREEN)
        .field("🎤 Artist", track.artist().unwrap_or("Unknown"), true)
        .field("⏱️ Duration", duration_label(track.duration()), true);

    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .url(track.display_url())
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(footer))
}

fn batch_added_embed(added: usize, failed: usize, dropped: usize, prefix: &str) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Playlist Added")
        .description(format!("Added **{}** to the queue", plural(added, "track")))
        .color(colors::MUSIC_PURPLE)
        .field("📊 Added", added.to_string(), true);

    if failed > 0 {
        embed = embed.field("⚠️ Unavailable", failed.to_string(), true);
    }
    if dropped > 0 {
        embed = embed.field("🚫 Queue full, dropped", dropped.to_string(), true);
    }

    embed
        .footer(CreateEmbedFooter::new(format!(
            "🎵 Use {}queue to see every track",
            prefix
        )))
        .timestamp(Timestamp::now())
}

/// Queue listing with the current track on top.
pub fn queue_embed(status: &PlaybackStatus, page: usize, prefix: &str) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Queue")
        .color(colors::INFO_BLUE);

    if status.now_playing.is_none() && status.upcoming.is_empty() {
        return embed
            .description(format!(
                "😴 **The queue is empty**\n\n💡 Use `{}play <song>` to add music",
                prefix
            ))
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    }

    if let Some(current) = &status.now_playing {
        embed = embed.field(
            format!("{} Now Playing", status.loop_mode.emoji()),
            format!("**{}**", current),
            false,
        );
    }

    let queue_page = status.page(page, ITEMS_PER_PAGE);
    if !queue_page.items.is_empty() {
        let lines: Vec<String> = queue_page
            .items
            .iter()
            .enumerate()
            .map(|(i, track)| {
                let duration = track
                    .duration()
                    .map(|d| format!(" `[{}]`", format_duration(d)))
                    .unwrap_or_default();
                format!("**{}**. {}{}", queue_page.first_position + i, track, duration)
            })
            .collect();
        embed = embed.field("Up Next", lines.join("\n"), false);
    }

    let mut info = format!("**Total:** {}", plural(queue_page.total_items, "track"));
    let total = status.total_duration();
    if total > Duration::ZERO {
        info.push_str(&format!(" • **Duration:** {}", format_duration(total)));
    }
    if status.loop_mode != LoopMode::Off {
        info.push_str(&format!(" • {} **{}**", status.loop_mode.emoji(), status.loop_mode.as_str()));
    }
    embed = embed.field("Info", info, false);

    let footer = if queue_page.total_pages > 1 {
        format!(
            "Page {} of {} • Melody Bot",
            queue_page.current_page, queue_page.total_pages
        )
    } else {
        STANDARD_FOOTER.to_string()
    };

    embed
        .footer(CreateEmbedFooter::new(footer))
        .timestamp(Timestamp::now())
}

fn volume_embed(level: u8, changed: bool, prefix: &str) -> CreateEmbed {
    let emoji = match level {
        0 => "🔇",
        1..=50 => "🔉",
        _ => "🔊",
    };
    let title = if changed { "Volume Set" } else { "Volume" };

    CreateEmbed::default()
        .title(format!("{} {}", emoji, title))
        .description(volume_bar(level))
        .field("📈 Level", format!("{}%", level), true)
        .color(colors::INFO_BLUE)
        .footer(CreateEmbedFooter::new(format!(
            "💡 Use {}volume <0-100> to adjust",
            prefix
        )))
        .timestamp(Timestamp::now())
}

fn help_embed(prefix: &str) -> CreateEmbed {
    let p = prefix;
    CreateEmbed::default()
        .title("🎵 Melody Bot - Commands")
        .color(colors::INFO_BLUE)
        .description("Music from YouTube, SoundCloud and Spotify links")
        .field(
            "🎵 Playback",
            format!(
                "• `{p}play <song or URL>` - Play or queue a track or playlist\n\
                • `{p}pause` / `{p}resume` - Pause or resume\n\
                • `{p}skip` - Skip the current track\n\
                • `{p}stop` - Stop and clear the queue\n\
                • `{p}leave` - Leave the voice channel"
            ),
            false,
        )
        .field(
            "📜 Queue",
            format!(
                "• `{p}queue [page]` - Show the queue\n\
                • `{p}nowplaying` - Show the current track\n\
                • `{p}loop [off|track|queue]` - Set or cycle the repeat mode\n\
                • `{p}shuffle` - Shuffle upcoming tracks\n\
                • `{p}remove <position>` - Remove a track"
            ),
            false,
        )
        .field(
            "🎛️ Audio",
            format!("• `{p}volume [0-100]` - Show or set the volume"),
            false,
        )
        .field("🏓 Other", format!("• `{p}ping` - Check the bot's latency"), false)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

fn pong_embed(latency: Option<Duration>) -> CreateEmbed {
    let description = match latency {
        Some(latency) => format!("Latency: **{}ms**", latency.as_millis()),
        None => "Latency unavailable".to_string(),
    };
    CreateEmbed::default()
        .title("🏓 Pong!")
        .description(description)
        .color(colors::INFO_BLUE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn error_embed(description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title("❌ Error")
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

fn success_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(title)
        .description(description)
        .color(colors::SUCCESS_GREEN)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

fn loop_description(mode: LoopMode) -> &'static str {
    match mode {
        LoopMode::Off => "Repeat disabled",
        LoopMode::Track => "Repeating the current track",
        LoopMode::Queue => "Repeating the whole queue",
    }
}

fn volume_bar(level: u8) -> String {
    let segments = 20;
    let filled = usize::from(level.min(100)) * segments / 100;
    format!("`[{}{}]`", "█".repeat(filled), "▒".repeat(segments - filled))
}

fn duration_label(duration: Option<Duration>) -> String {
    duration.map_or_else(|| "🔴 Live".to_string(), format_duration)
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {}", noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

/// Formats a duration as `m:ss` or `h:mm:ss`.
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::PlaybackError;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    fn json(embed: &CreateEmbed) -> Value {
        serde_json::to_value(embed).unwrap()
    }

    fn track(title: &str, secs: u64) -> Track {
        Track::new(title, format!("https://cdn.example/{}.m4a", title), title)
            .with_duration(Duration::from_secs(secs))
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0:00");
        assert_eq!(format_duration(Duration::from_secs(65)), "1:05");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1:02:05");
        assert_eq!(duration_label(None), "🔴 Live");
    }

    #[test]
    fn test_plural_and_volume_bar() {
        assert_eq!(plural(1, "track"), "1 track");
        assert_eq!(plural(3, "track"), "3 tracks");
        assert_eq!(volume_bar(50), format!("`[{}{}]`", "█".repeat(10), "▒".repeat(10)));
        assert_eq!(volume_bar(0), format!("`[{}]`", "▒".repeat(20)));
    }

    #[test]
    fn test_queue_embed_pages() {
        let status = PlaybackStatus {
            now_playing: Some(track("Current", 60)),
            upcoming: (1..=12).map(|i| track(&format!("T{}", i), 30)).collect(),
            loop_mode: LoopMode::Queue,
            ..Default::default()
        };

        let page = json(&queue_embed(&status, 2, "/"));
        let fields = page["fields"].as_array().unwrap();
        let up_next = fields[1]["value"].as_str().unwrap();
        assert!(up_next.starts_with("**11**. T11"));
        assert!(up_next.contains("**12**. T12"));
        assert_eq!(page["footer"]["text"], "Page 2 of 2 • Melody Bot");
        assert!(fields[2]["value"].as_str().unwrap().contains("7:00"));
    }

    #[test]
    fn test_empty_queue_mentions_prefix() {
        let embed = json(&queue_embed(&PlaybackStatus::default(), 1, "!"));
        assert!(embed["description"].as_str().unwrap().contains("`!play <song>`"));
    }

    #[test]
    fn test_render_errors_are_ephemeral() {
        let rendered = render(&Reply::Failed(PlaybackError::NoVoiceChannel), "/");
        assert!(rendered.ephemeral);
        assert_eq!(json(&rendered.embed)["description"], "Join a voice channel first");

        let rendered = render(&Reply::Paused, "/");
        assert!(!rendered.ephemeral);
    }

    #[test]
    fn test_render_pong() {
        let reply = Reply::Pong { latency: Some(Duration::from_millis(42)) };
        assert_eq!(json(&render(&reply, "!").embed)["description"], "Latency: **42ms**");

        let reply = Reply::Pong { latency: None };
        assert_eq!(json(&render(&reply, "!").embed)["description"], "Latency unavailable");
    }

    #[test]
    fn test_render_batch_counts() {
        let reply = Reply::Enqueued(EnqueueOutcome::Batch { added: 8, failed: 2, dropped: 0 });
        let embed = json(&render(&reply, "!").embed);
        let names: Vec<&str> = embed["fields"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|f| f["name"].as_str())
            .collect();
        assert_eq!(names, vec!["📊 Added", "⚠️ Unavailable"]);
    }

    fn field_value<'a>(embed: &'a Value, name: &str) -> Option<&'a str> {
        embed["fields"]
            .as_array()?
            .iter()
            .find(|f| f["name"] == name)
            .and_then(|f| f["value"].as_str())
    }

    #[test]
    fn test_now_playing_reply_has_controls() {
        let status = PlaybackStatus {
            state: crate::audio::PlayState::Playing,
            now_playing: Some(track("Song", 200)),
            volume: 40,
            connected: true,
            voice_channel: Some(serenity::all::ChannelId::new(10)),
            ..Default::default()
        };
        let rendered = render(&Reply::NowPlaying(status), "/");
        assert_eq!(rendered.components.len(), 1);

        let embed = json(&rendered.embed);
        assert_eq!(embed["title"], "🎵 Now Playing");
        assert_eq!(field_value(&embed, "🔈 Channel"), Some("<#10>"));
        assert!(field_value(&embed, "🕒 Queued").unwrap().starts_with("<t:"));
    }

    #[test]
    fn test_now_playing_shows_bitrate_when_known() {
        let embed = json(&now_playing_embed(&track("Song", 200).with_bitrate_kbps(160), LoopMode::Off));
        assert_eq!(field_value(&embed, "🎚️ Bitrate"), Some("160 kbps"));

        let embed = json(&now_playing_embed(&track("Song", 200), LoopMode::Off));
        assert_eq!(field_value(&embed, "🎚️ Bitrate"), None);
    }
}
