use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::guild::GuildCommand;

/// Delayed disconnect of an idle guild.
///
/// Each arm bumps a generation number and spawns a sleeper that posts
/// `IdleElapsed { generation }` into the guild inbox. Cancelling or re-arming
/// stops the previous sleeper; a message that still slips through carries an
/// old generation and is ignored by [`IdleTimer::is_current`].
#[derive(Debug, Default)]
pub(crate) struct IdleTimer {
    generation: u64,
    cancel: Option<CancellationToken>,
}

impl IdleTimer {
    pub fn arm(&mut self, timeout: Duration, inbox: mpsc::UnboundedSender<GuildCommand>) {
        self.cancel();
        self.generation += 1;

        let token = CancellationToken::new();
        let generation = self.generation;
        let child = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = child.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    let _ = inbox.send(GuildCommand::IdleElapsed { generation });
                }
            }
        });

        debug!("⏲️ Idle timer armed for {}s (generation {})", timeout.as_secs(), generation);
        self.cancel = Some(token);
    }

    pub fn cancel(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.cancel.is_some()
    }

    /// Whether a fired timer is the most recent arm and nobody cancelled it.
    pub fn is_current(&self, generation: u64) -> bool {
        self.is_armed() && generation == self.generation
    }
}

impl Drop for IdleTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
