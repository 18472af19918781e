use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{
        application::{CommandDataOptionValue, CommandOptionType},
        id::GuildId,
    },
    prelude::Context,
};

use super::dispatch::BotCommand;
use crate::audio::LoopMode;

/// Registers global commands
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registers commands for a single guild (development)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

fn all_commands() -> Vec<CreateCommand> {
    vec![
        play_command(),
        pause_command(),
        resume_command(),
        skip_command(),
        stop_command(),
        leave_command(),
        queue_command(),
        nowplaying_command(),
        loop_command(),
        shuffle_command(),
        remove_command(),
        volume_command(),
        help_command(),
        ping_command(),
    ]
}

/// Turns a slash command and its `(name, value)` options into a [`BotCommand`].
///
/// Discord enforces required options and ranges, so missing values fall back
/// to defaults instead of failing.
pub fn parse(name: &str, options: &[(&str, &CommandDataOptionValue)]) -> Option<BotCommand> {
    let value = |key: &str| {
        options
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| *value)
    };
    let string = |key: &str| value(key).and_then(CommandDataOptionValue::as_str);
    let integer = |key: &str| value(key).and_then(CommandDataOptionValue::as_i64);

    let command = match name {
        "play" => BotCommand::Play {
            query: string("query")?.trim().to_string(),
        },
        "pause" => BotCommand::Pause,
        "resume" => BotCommand::Resume,
        "skip" => BotCommand::Skip,
        "stop" => BotCommand::Stop,
        "leave" => BotCommand::Leave,
        "queue" => BotCommand::Queue {
            page: integer("page").and_then(|p| usize::try_from(p).ok()).unwrap_or(1),
        },
        "nowplaying" => BotCommand::NowPlaying,
        "loop" => BotCommand::Loop {
            mode: string("mode").and_then(|m| m.parse::<LoopMode>().ok()),
        },
        "shuffle" => BotCommand::Shuffle,
        "remove" => BotCommand::Remove {
            index: usize::try_from(integer("index")?).ok()?,
        },
        "volume" => BotCommand::Volume { level: integer("level") },
        "help" => BotCommand::Help,
        "ping" => BotCommand::Ping,
        _ => return None,
    };

    Some(command)
}

// Playback

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Play a song or playlist")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "query",
                "URL or search terms",
            )
            .required(true),
        )
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pause the current track")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Resume paused playback")
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Skip to the next track")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Stop playback and clear the queue")
}

fn leave_command() -> CreateCommand {
    CreateCommand::new("leave").description("Leave the voice channel")
}

// Queue

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue")
        .description("Show the queue")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "page", "Page number")
                .min_int_value(1),
        )
}

fn nowplaying_command() -> CreateCommand {
    CreateCommand::new("nowplaying").description("Show the current track")
}

fn loop_command() -> CreateCommand {
    CreateCommand::new("loop")
        .description("Set the repeat mode, or cycle through modes")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "mode", "Repeat mode")
                .add_string_choice("Off", "off")
                .add_string_choice("Track", "track")
                .add_string_choice("Queue", "queue"),
        )
}

fn shuffle_command() -> CreateCommand {
    CreateCommand::new("shuffle").description("Shuffle the upcoming tracks")
}

fn remove_command() -> CreateCommand {
    CreateCommand::new("remove")
        .description("Remove a track from the queue")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "index",
                "Position in the queue",
            )
            .min_int_value(1)
            .required(true),
        )
}

// Audio

fn volume_command() -> CreateCommand {
    CreateCommand::new("volume")
        .description("Show or set the playback volume")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "level", "Volume (0-100)")
                .min_int_value(0)
                .max_int_value(100),
        )
}

fn help_command() -> CreateCommand {
    CreateCommand::new("help").description("Show available commands")
}

fn ping_command() -> CreateCommand {
    CreateCommand::new("ping").description("Check the bot's latency")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_options() {
        let query = CommandDataOptionValue::String(" lofi ".into());
        assert_eq!(
            parse("play", &[("query", &query)]),
            Some(BotCommand::Play { query: "lofi".into() })
        );

        let page = CommandDataOptionValue::Integer(2);
        assert_eq!(parse("queue", &[("page", &page)]), Some(BotCommand::Queue { page: 2 }));
        assert_eq!(parse("queue", &[]), Some(BotCommand::Queue { page: 1 }));

        let mode = CommandDataOptionValue::String("track".into());
        assert_eq!(
            parse("loop", &[("mode", &mode)]),
            Some(BotCommand::Loop { mode: Some(LoopMode::Track) })
        );
        assert_eq!(parse("loop", &[]), Some(BotCommand::Loop { mode: None }));

        let level = CommandDataOptionValue::Integer(30);
        assert_eq!(
            parse("volume", &[("level", &level)]),
            Some(BotCommand::Volume { level: Some(30) })
        );
    }

    #[test]
    fn test_parse_rejects_unknown_or_incomplete() {
        assert_eq!(parse("play", &[]), None);
        assert_eq!(parse("remove", &[]), None);
        assert_eq!(parse("equalizer", &[]), None);
    }

    #[test]
    fn test_every_registered_command_parses() {
        assert_eq!(all_commands().len(), 14);
        for name in [
            "pause", "resume", "skip", "stop", "leave", "nowplaying", "shuffle", "help", "ping",
        ] {
            assert!(parse(name, &[]).is_some(), "{} should parse without options", name);
        }
    }
}
