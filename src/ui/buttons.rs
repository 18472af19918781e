use serenity::{
    all::ButtonStyle,
    builder::{CreateActionRow, CreateButton},
};

use crate::{
    audio::{LoopMode, PlaybackStatus},
    bot::dispatch::BotCommand,
};

/// Custom IDs of the player buttons
pub mod button_ids {
    pub const PAUSE: &str = "player_pause";
    pub const RESUME: &str = "player_resume";
    pub const SKIP: &str = "player_skip";
    pub const STOP: &str = "player_stop";
    pub const SHUFFLE: &str = "player_shuffle";
    pub const LOOP: &str = "player_loop";
}

/// Player controls shown under "now playing".
pub fn player_controls(status: &PlaybackStatus) -> Vec<CreateActionRow> {
    let play_pause = if status.is_paused() {
        CreateButton::new(play_pause_id(status))
            .emoji('▶')
            .style(ButtonStyle::Success)
    } else {
        CreateButton::new(play_pause_id(status))
            .emoji('⏸')
            .style(ButtonStyle::Primary)
    };

    let skip = CreateButton::new(button_ids::SKIP)
        .emoji('⏭')
        .style(ButtonStyle::Secondary);

    let stop = CreateButton::new(button_ids::STOP)
        .emoji('⏹')
        .style(ButtonStyle::Danger);

    let shuffle = CreateButton::new(button_ids::SHUFFLE)
        .emoji('🔀')
        .style(ButtonStyle::Secondary)
        .disabled(status.queue_len() < 2);

    let loop_style = if status.loop_mode == LoopMode::Off {
        ButtonStyle::Secondary
    } else {
        ButtonStyle::Success
    };
    let loop_btn = CreateButton::new(button_ids::LOOP)
        .emoji(if status.loop_mode == LoopMode::Track { '🔂' } else { '🔁' })
        .style(loop_style);

    vec![CreateActionRow::Buttons(vec![
        play_pause, skip, stop, shuffle, loop_btn,
    ])]
}

fn play_pause_id(status: &PlaybackStatus) -> &'static str {
    if status.is_paused() {
        button_ids::RESUME
    } else {
        button_ids::PAUSE
    }
}

/// Maps a button press to the command it stands for.
pub fn command_for(custom_id: &str) -> Option<BotCommand> {
    match custom_id {
        button_ids::PAUSE => Some(BotCommand::Pause),
        button_ids::RESUME => Some(BotCommand::Resume),
        button_ids::SKIP => Some(BotCommand::Skip),
        button_ids::STOP => Some(BotCommand::Stop),
        button_ids::SHUFFLE => Some(BotCommand::Shuffle),
        button_ids::LOOP => Some(BotCommand::Loop { mode: None }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::PlayState;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_command_for() {
        assert_eq!(command_for("player_pause"), Some(BotCommand::Pause));
        assert_eq!(command_for("player_loop"), Some(BotCommand::Loop { mode: None }));
        assert_eq!(command_for("music_effects"), None);
    }

    #[test]
    fn test_play_pause_toggle() {
        let paused = PlaybackStatus {
            state: PlayState::Paused,
            ..Default::default()
        };
        assert_eq!(play_pause_id(&paused), button_ids::RESUME);

        let playing = PlaybackStatus {
            state: PlayState::Playing,
            ..Default::default()
        };
        assert_eq!(play_pause_id(&playing), button_ids::PAUSE);

        let rows = player_controls(&playing);
        assert!(matches!(&rows[..], [CreateActionRow::Buttons(buttons)] if buttons.len() == 5));
    }
}
