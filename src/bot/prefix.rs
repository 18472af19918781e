//! Text commands such as `!play <query>` or `!q 2`.

use thiserror::Error;

use super::dispatch::BotCommand;
use crate::audio::LoopMode;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PrefixError {
    #[error("Usage: `{prefix}{usage}`")]
    Usage { prefix: String, usage: &'static str },

    #[error("Unknown loop mode `{0}`, use off, track or queue")]
    LoopMode(String),
}

/// Parses a chat message into a command.
///
/// Returns `None` for messages that don't start with `prefix` or name an
/// unknown command, so ordinary chat is ignored.
pub fn parse(prefix: &str, content: &str) -> Option<Result<BotCommand, PrefixError>> {
    let body = content.trim_start().strip_prefix(prefix)?;
    let (name, args) = match body.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (body, ""),
    };

    let usage = |usage| PrefixError::Usage { prefix: prefix.to_string(), usage };

    let command = match name.to_lowercase().as_str() {
        "play" | "p" => {
            if args.is_empty() {
                Err(usage("play <song name or URL>"))
            } else {
                Ok(BotCommand::Play { query: args.to_string() })
            }
        }
        "skip" | "s" | "next" => Ok(BotCommand::Skip),
        "pause" => Ok(BotCommand::Pause),
        "resume" | "r" | "unpause" => Ok(BotCommand::Resume),
        "stop" => Ok(BotCommand::Stop),
        "leave" | "disconnect" | "dc" => Ok(BotCommand::Leave),
        "queue" | "q" => match args {
            "" => Ok(BotCommand::Queue { page: 1 }),
            page => page
                .parse::<usize>()
                .ok()
                .filter(|p| *p > 0)
                .map(|page| BotCommand::Queue { page })
                .ok_or_else(|| usage("queue [page]")),
        },
        "nowplaying" | "np" => Ok(BotCommand::NowPlaying),
        "loop" | "l" | "repeat" => match args {
            "" => Ok(BotCommand::Loop { mode: None }),
            mode => mode
                .parse::<LoopMode>()
                .map(|mode| BotCommand::Loop { mode: Some(mode) })
                .map_err(|_| PrefixError::LoopMode(mode.to_string())),
        },
        "shuffle" => Ok(BotCommand::Shuffle),
        "remove" | "rm" => args
            .parse::<usize>()
            .map(|index| BotCommand::Remove { index })
            .map_err(|_| usage("remove <position>")),
        "volume" | "vol" | "v" => match args {
            "" => Ok(BotCommand::Volume { level: None }),
            level => level
                .trim_end_matches('%')
                .parse::<i64>()
                .map(|level| BotCommand::Volume { level: Some(level) })
                .map_err(|_| usage("volume <0-100>")),
        },
        "help" | "commands" | "h" => Ok(BotCommand::Help),
        "ping" => Ok(BotCommand::Ping),
        _ => return None,
    };

    Some(command)
}
