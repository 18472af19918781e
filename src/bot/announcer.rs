use dashmap::DashMap;
use serenity::{
    builder::CreateMessage,
    http::Http,
    model::id::{ChannelId, GuildId},
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::{audio::PlaybackEvent, ui::embeds};

/// Posts playback events to the text channel each guild last used.
#[derive(Default)]
pub struct Announcer {
    channels: DashMap<GuildId, ChannelId>,
    started: AtomicBool,
}

impl Announcer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Remembers where a guild issued its last command.
    pub fn remember(&self, guild_id: GuildId, channel_id: ChannelId) {
        self.channels.insert(guild_id, channel_id);
    }

    pub fn channel_for(&self, guild_id: GuildId) -> Option<ChannelId> {
        self.channels.get(&guild_id).map(|c| *c.value())
    }

    /// Starts the posting task. Later calls (gateway reconnects) are no-ops.
    pub fn start(self: &Arc<Self>, http: Arc<Http>, events: broadcast::Receiver<PlaybackEvent>) {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("📣 Announcer already running");
            return;
        }

        let announcer = self.clone();
        tokio::spawn(async move { announcer.run(http, events).await });
        info!("📣 Announcer started");
    }

    async fn run(&self, http: Arc<Http>, mut events: broadcast::Receiver<PlaybackEvent>) {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(missed)) => {
                    warn!("📣 Announcer fell behind, {} events dropped", missed);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let guild_id = event.guild_id();
            let Some(channel_id) = self.channel_for(guild_id) else {
                debug!("📣 No text channel known for guild {}", guild_id);
                continue;
            };

            let message = CreateMessage::new().embed(embeds::event_embed(&event));
            if let Err(e) = channel_id.send_message(&http, message).await {
                warn!("📣 Couldn't announce in channel {}: {}", channel_id, e);
            }
        }

        info!("📣 Announcer stopped");
    }
}
