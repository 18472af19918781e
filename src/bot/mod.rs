//! # Bot Module
//!
//! Discord front-ends for the playback core.
//!
//! ## Architecture
//!
//! The bot is built around the [`MelodyBot`] struct which implements
//! Serenity's [`EventHandler`] trait. Slash commands, prefix text commands
//! and player buttons are all parsed into a [`dispatch::BotCommand`] and run
//! through [`dispatch::execute`]; each front-end only renders the reply.
//!
//! - [`commands`] - slash command definitions and option parsing
//! - [`prefix`] - text command parsing (`!play`, `!q 2`, ...)
//! - [`handlers`] - glue between Discord events and the dispatcher
//! - [`announcer`] - posts playback events to the last used text channel

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Message, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info};

pub mod announcer;
pub mod commands;
pub mod dispatch;
pub mod handlers;
pub mod prefix;

use crate::{audio::AudioPlayer, config::Config};
use announcer::Announcer;

/// Discord event handler for Melody Bot.
pub struct MelodyBot {
    pub config: Arc<Config>,
    pub player: AudioPlayer,
    pub announcer: Arc<Announcer>,
}

impl MelodyBot {
    pub fn new(config: Config, player: AudioPlayer) -> Self {
        Self {
            config: Arc::new(config),
            player,
            announcer: Announcer::new(),
        }
    }

    /// Registers slash commands in the development guild, or globally when
    /// no `GUILD_ID` is configured.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        if let Some(guild_id) = self.config.guild_id {
            commands::register_guild_commands(ctx, GuildId::new(guild_id)).await?;
            info!("✅ Commands registered in guild {}", guild_id);
        } else {
            commands::register_global_commands(ctx).await?;
            info!("✅ Global commands registered");
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for MelodyBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 Connected to {} servers", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("❌ Failed to register commands: {:?}", e);
        }

        self.announcer.start(ctx.http.clone(), self.player.subscribe());
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) => {
                if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                    error!("❌ Error handling command: {:?}", e);
                }
            }
            Interaction::Component(component) => {
                if let Err(e) = handlers::handle_component(&ctx, component, self).await {
                    error!("❌ Error handling button: {:?}", e);
                }
            }
            _ => {}
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if let Err(e) = handlers::handle_message(&ctx, &msg, self).await {
            error!("❌ Error handling message command: {:?}", e);
        }
    }

    /// Notices when the bot itself is kicked or disconnected from voice.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        if let Some(guild_id) = new.guild_id {
            info!("🔌 Bot disconnected from voice in guild {}", guild_id);
            self.player.voice_lost(guild_id);
        }
    }
}
