use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage, CreateMessage,
        EditInteractionResponse,
    },
    model::{
        application::{CommandInteraction, ComponentInteraction},
        channel::Message,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use std::time::Instant;
use tracing::{info, warn};

use super::{
    commands,
    dispatch::{self, Invocation, Reply},
    prefix, MelodyBot,
};
use crate::ui::{
    buttons,
    embeds::{self, Rendered},
};

/// Handles slash commands
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &MelodyBot) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Command used outside a server"))?;

    info!(
        "📝 Command /{} used by {} in guild {}",
        command.data.name, command.user.name, guild_id
    );

    let options: Vec<_> = command
        .data
        .options
        .iter()
        .map(|opt| (opt.name.as_str(), &opt.value))
        .collect();
    let Some(parsed) = commands::parse(&command.data.name, &options) else {
        let response = message(embeds::error_embed("Unknown command")).ephemeral(true);
        command
            .create_response(&ctx.http, CreateInteractionResponse::Message(response))
            .await?;
        return Ok(());
    };

    bot.announcer.remember(guild_id, command.channel_id);
    let invocation = Invocation {
        guild_id,
        user_id: command.user.id,
        voice_channel: user_voice_channel(ctx, guild_id, command.user.id),
        command: parsed,
    };

    if invocation.command.is_slow() {
        // Resolution can take longer than the interaction deadline
        command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
            )
            .await?;

        let rendered = embeds::render(&dispatch::execute(&bot.player, invocation).await, "/");
        command
            .edit_response(
                &ctx.http,
                EditInteractionResponse::new()
                    .embed(rendered.embed)
                    .components(rendered.components),
            )
            .await?;
    } else {
        let reply = with_latency(ctx, dispatch::execute(&bot.player, invocation).await).await;
        let rendered = embeds::render(&reply, "/");
        let ephemeral = rendered.ephemeral;
        command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Message(respond(rendered).ephemeral(ephemeral)),
            )
            .await?;
    }

    Ok(())
}

/// Handles player button presses
pub async fn handle_component(
    ctx: &Context,
    component: ComponentInteraction,
    bot: &MelodyBot,
) -> Result<()> {
    let guild_id = component
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Button used outside a server"))?;

    info!(
        "🔘 Button {} pressed by {} in guild {}",
        component.data.custom_id, component.user.name, guild_id
    );

    let Some(command) = buttons::command_for(&component.data.custom_id) else {
        let response = message(embeds::error_embed("Unknown action")).ephemeral(true);
        component
            .create_response(&ctx.http, CreateInteractionResponse::Message(response))
            .await?;
        return Ok(());
    };

    bot.announcer.remember(guild_id, component.channel_id);
    let reply = dispatch::execute(
        &bot.player,
        Invocation {
            guild_id,
            user_id: component.user.id,
            voice_channel: user_voice_channel(ctx, guild_id, component.user.id),
            command,
        },
    )
    .await;

    let response = if reply.is_error() {
        CreateInteractionResponse::Message(respond(embeds::render(&reply, "/")).ephemeral(true))
    } else {
        // Refresh the player message in place
        let status = bot.player.status(guild_id).await;
        let rendered = match status.now_playing {
            Some(_) => embeds::render(&Reply::NowPlaying(status), "/"),
            None => embeds::render(&reply, "/"),
        };
        CreateInteractionResponse::UpdateMessage(respond(rendered))
    };
    component.create_response(&ctx.http, response).await?;

    Ok(())
}

/// Handles prefix text commands
pub async fn handle_message(ctx: &Context, msg: &Message, bot: &MelodyBot) -> Result<()> {
    if msg.author.bot {
        return Ok(());
    }
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };
    let prefix = bot.config.command_prefix.as_str();
    let Some(parsed) = prefix::parse(prefix, &msg.content) else {
        return Ok(());
    };

    let command = match parsed {
        Ok(command) => command,
        Err(e) => {
            let reply = CreateMessage::new()
                .embed(embeds::error_embed(&e.to_string()))
                .reference_message(msg);
            msg.channel_id.send_message(&ctx.http, reply).await?;
            return Ok(());
        }
    };

    info!(
        "📝 Command {}{} used by {} in guild {}",
        prefix,
        command.name(),
        msg.author.name,
        guild_id
    );

    bot.announcer.remember(guild_id, msg.channel_id);
    if command.is_slow() {
        msg.channel_id.broadcast_typing(&ctx.http).await?;
    }

    let reply = dispatch::execute(
        &bot.player,
        Invocation {
            guild_id,
            user_id: msg.author.id,
            voice_channel: user_voice_channel(ctx, guild_id, msg.author.id),
            command,
        },
    )
    .await;
    let reply = with_latency(ctx, reply).await;

    let rendered = embeds::render(&reply, prefix);
    let reply = CreateMessage::new()
        .embed(rendered.embed)
        .components(rendered.components)
        .reference_message(msg);
    msg.channel_id.send_message(&ctx.http, reply).await?;

    Ok(())
}

/// Fills in a pong with the round-trip time of a REST call.
async fn with_latency(ctx: &Context, reply: Reply) -> Reply {
    if !matches!(reply, Reply::Pong { latency: None }) {
        return reply;
    }
    let started = Instant::now();
    match ctx.http.get_current_user().await {
        Ok(_) => Reply::Pong { latency: Some(started.elapsed()) },
        Err(e) => {
            warn!("⚠️ Latency check failed: {}", e);
            reply
        }
    }
}

fn message(embed: CreateEmbed) -> CreateInteractionResponseMessage {
    CreateInteractionResponseMessage::new().embed(embed)
}

fn respond(rendered: Rendered) -> CreateInteractionResponseMessage {
    message(rendered.embed).components(rendered.components)
}

/// Voice channel the user is in, from the gateway cache.
fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}
