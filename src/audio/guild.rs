use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use std::{ops::ControlFlow, sync::Arc};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::{
    error::{PlaybackError, PlaybackResult},
    events::PlaybackEvent,
    idle::IdleTimer,
    player::PlayerSettings,
    queue::{AppendSummary, MusicQueue, PlaybackStatus},
    track::{LoopMode, PlayState, Track},
    voice::{ActiveStream, StreamEndNotifier, VoiceConnection, VoiceGateway},
};

/// Consecutive stream start failures tolerated before the guild goes idle.
const MAX_CONSECUTIVE_FAILURES: u32 = 3;

pub(crate) type Reply<T> = oneshot::Sender<PlaybackResult<T>>;

/// Messages processed by a guild task, one at a time.
pub(crate) enum GuildCommand {
    /// Joins voice for a play request. Until the matching `EnqueueDone`
    /// arrives the guild is not reclaimed for being idle.
    Connect {
        channel_id: ChannelId,
        reply: Reply<()>,
    },
    EnqueueDone,
    /// Appends resolved tracks. `channel_id` is used to reconnect when the
    /// connection was lost while resolving.
    Append {
        tracks: Vec<Track>,
        channel_id: ChannelId,
        reply: Reply<AppendOutcome>,
    },
    StreamEnded {
        stream_id: u64,
        failed: bool,
    },
    Skip {
        reply: Reply<Track>,
    },
    Pause {
        reply: Reply<()>,
    },
    Resume {
        reply: Reply<()>,
    },
    Stop {
        reply: Reply<usize>,
    },
    Leave {
        reply: Reply<()>,
    },
    VoiceLost,
    SetLoop {
        mode: Option<LoopMode>,
        reply: Reply<LoopMode>,
    },
    Shuffle {
        reply: Reply<usize>,
    },
    Remove {
        index: usize,
        reply: Reply<Track>,
    },
    SetVolume {
        percent: u8,
        reply: Reply<u8>,
    },
    Status {
        reply: oneshot::Sender<PlaybackStatus>,
    },
    IdleElapsed {
        generation: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AppendOutcome {
    pub summary: AppendSummary,
    /// The guild was idle and playback started with this append.
    pub started: bool,
}

/// State shared by every guild task.
pub(crate) struct Shared {
    pub voice: Arc<dyn VoiceGateway>,
    pub events: broadcast::Sender<PlaybackEvent>,
    pub settings: PlayerSettings,
    pub guilds: Arc<DashMap<GuildId, GuildHandle>>,
}

/// Sending side of a guild task's inbox.
#[derive(Clone)]
pub(crate) struct GuildHandle {
    inbox: mpsc::UnboundedSender<GuildCommand>,
}

impl GuildHandle {
    pub fn send(&self, command: GuildCommand) -> Result<(), GuildCommand> {
        self.inbox.send(command).map_err(|e| e.0)
    }

    pub fn is_closed(&self) -> bool {
        self.inbox.is_closed()
    }
}

/// Starts the task owning `guild_id`'s playback state.
pub(crate) fn spawn(guild_id: GuildId, shared: Arc<Shared>) -> GuildHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let volume = shared.settings.default_volume;
    let queue = MusicQueue::new(shared.settings.max_queue_size);

    let guild = GuildPlayback {
        guild_id,
        shared,
        inbox: tx.clone(),
        queue,
        connection: None,
        stream: None,
        next_stream_id: 0,
        state: PlayState::Idle,
        volume,
        idle: IdleTimer::default(),
        consecutive_failures: 0,
        pending_enqueues: 0,
    };
    tokio::spawn(guild.run(rx));

    debug!("🆕 Playback state created for guild {}", guild_id);
    GuildHandle { inbox: tx }
}

struct StreamSlot {
    id: u64,
    stream: Box<dyn ActiveStream>,
}

/// Playback state of one guild, owned by its task.
///
/// `queue.current()` is set exactly while `stream` is; at most one stream
/// exists at a time and every advance runs to completion before the next
/// message is read.
struct GuildPlayback {
    guild_id: GuildId,
    shared: Arc<Shared>,
    inbox: mpsc::UnboundedSender<GuildCommand>,
    queue: MusicQueue,
    connection: Option<Arc<dyn VoiceConnection>>,
    stream: Option<StreamSlot>,
    next_stream_id: u64,
    state: PlayState,
    volume: u8,
    idle: IdleTimer,
    consecutive_failures: u32,
    /// Play requests that joined voice and are still resolving.
    pending_enqueues: usize,
}

impl GuildPlayback {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<GuildCommand>) {
        // A guild nobody plays anything in must not live forever.
        self.arm_idle();

        while let Some(command) = rx.recv().await {
            if self.handle(command).await.is_break() {
                break;
            }
        }

        let inbox = &self.inbox;
        self.shared
            .guilds
            .remove_if(&self.guild_id, |_, handle| handle.inbox.same_channel(inbox));
        info!("🧹 Playback state disposed for guild {}", self.guild_id);
    }

    async fn handle(&mut self, command: GuildCommand) -> ControlFlow<()> {
        match command {
            GuildCommand::Connect { channel_id, reply } => {
                let result = self.ensure_connected(channel_id).await;
                if result.is_ok() {
                    self.pending_enqueues += 1;
                    self.idle.cancel();
                }
                let _ = reply.send(result);
            }
            GuildCommand::EnqueueDone => {
                self.pending_enqueues = self.pending_enqueues.saturating_sub(1);
                if self.pending_enqueues == 0 && self.stream.is_none() {
                    self.arm_idle();
                }
            }
            GuildCommand::Append { tracks, channel_id, reply } => {
                let result = self.append(tracks, channel_id).await;
                let _ = reply.send(result);
            }
            GuildCommand::StreamEnded { stream_id, failed } => {
                self.on_stream_ended(stream_id, failed).await;
            }
            GuildCommand::Skip { reply } => {
                let _ = reply.send(self.skip());
            }
            GuildCommand::Pause { reply } => {
                let _ = reply.send(self.pause());
            }
            GuildCommand::Resume { reply } => {
                let _ = reply.send(self.resume());
            }
            GuildCommand::Stop { reply } => {
                let _ = reply.send(Ok(self.stop()));
            }
            GuildCommand::Leave { reply } => {
                let Some(connection) = self.connection.take() else {
                    let _ = reply.send(Err(PlaybackError::NoVoiceConnection));
                    return ControlFlow::Continue(());
                };
                self.reset();
                let result = connection.disconnect().await;
                if let Err(e) = &result {
                    warn!("⚠️ Disconnect failed in guild {}: {}", self.guild_id, e);
                }
                let _ = reply.send(result);
                return ControlFlow::Break(());
            }
            GuildCommand::VoiceLost => {
                if self.connection.take().is_some() {
                    info!("🔌 Voice connection lost in guild {}", self.guild_id);
                    self.reset();
                    return ControlFlow::Break(());
                }
            }
            GuildCommand::SetLoop { mode, reply } => {
                let mode = mode.unwrap_or_else(|| self.queue.loop_mode().cycle());
                self.queue.set_loop_mode(mode);
                let _ = reply.send(Ok(mode));
            }
            GuildCommand::Shuffle { reply } => {
                let _ = reply.send(self.queue.shuffle());
            }
            GuildCommand::Remove { index, reply } => {
                let _ = reply.send(self.queue.remove(index));
            }
            GuildCommand::SetVolume { percent, reply } => {
                let _ = reply.send(self.set_volume(percent));
            }
            GuildCommand::Status { reply } => {
                let _ = reply.send(self.status());
            }
            GuildCommand::IdleElapsed { generation } => {
                return self.on_idle_elapsed(generation).await;
            }
        }
        ControlFlow::Continue(())
    }

    async fn ensure_connected(&mut self, channel_id: ChannelId) -> PlaybackResult<()> {
        if self.connection.is_some() {
            return Ok(());
        }
        let connection = self.shared.voice.connect(self.guild_id, channel_id).await?;
        self.connection = Some(connection);
        Ok(())
    }

    async fn append(&mut self, tracks: Vec<Track>, channel_id: ChannelId) -> PlaybackResult<AppendOutcome> {
        self.ensure_connected(channel_id).await?;

        let summary = self.queue.add_tracks(tracks)?;
        let started = self.state == PlayState::Idle && summary.accepted > 0;
        if started {
            self.advance().await;
        }
        Ok(AppendOutcome { summary, started })
    }

    /// Picks the next track and starts it, trying further candidates when a
    /// stream refuses to start.
    async fn advance(&mut self) {
        self.stream = None;

        let Some(connection) = self.connection.clone() else {
            self.queue.forget_current();
            self.enter_idle();
            return;
        };

        loop {
            let Some(track) = self.queue.next_track() else {
                self.enter_idle();
                self.emit(PlaybackEvent::QueueFinished { guild_id: self.guild_id });
                return;
            };

            let stream_id = self.next_stream_id;
            self.next_stream_id += 1;
            let notifier = StreamEndNotifier::new(stream_id, self.inbox.clone());

            match connection.play(&track, self.volume_gain(), notifier).await {
                Ok(stream) => {
                    self.stream = Some(StreamSlot { id: stream_id, stream });
                    self.state = PlayState::Playing;
                    self.idle.cancel();
                    info!("🎵 Now playing in guild {}: {}", self.guild_id, track);
                    self.emit(PlaybackEvent::NowPlaying {
                        guild_id: self.guild_id,
                        track,
                        loop_mode: self.queue.loop_mode(),
                    });
                    return;
                }
                Err(e) => {
                    if self.record_failure(track.title(), e.to_string()) {
                        return;
                    }
                }
            }
        }
    }

    /// Returns true when the failure streak made the guild give up.
    fn record_failure(&mut self, title: &str, reason: String) -> bool {
        error!("❌ Stream failed in guild {}: {} ({})", self.guild_id, title, reason);
        self.queue.forget_current();
        self.consecutive_failures += 1;
        self.emit(PlaybackEvent::TrackFailed {
            guild_id: self.guild_id,
            title: title.to_string(),
            reason,
        });

        if self.consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
            warn!(
                "⚠️ {} streams failed in a row in guild {}, giving up",
                self.consecutive_failures, self.guild_id
            );
            self.consecutive_failures = 0;
            self.stream = None;
            self.enter_idle();
            return true;
        }
        false
    }

    async fn on_stream_ended(&mut self, stream_id: u64, failed: bool) {
        match &self.stream {
            Some(slot) if slot.id == stream_id => {}
            _ => {
                debug!("Ignoring stale end of stream {} in guild {}", stream_id, self.guild_id);
                return;
            }
        }
        self.stream = None;

        if failed {
            let title = self
                .queue
                .current()
                .map(|t| t.title().to_string())
                .unwrap_or_default();
            if self.record_failure(&title, "the audio stream errored".to_string()) {
                return;
            }
        } else {
            self.consecutive_failures = 0;
        }

        self.advance().await;
    }

    fn skip(&self) -> PlaybackResult<Track> {
        let (Some(slot), Some(current)) = (&self.stream, self.queue.current()) else {
            return Err(PlaybackError::NothingPlaying);
        };
        info!("⏭️ Skipping in guild {}: {}", self.guild_id, current.title());
        // The stop comes back as StreamEnded, which advances.
        slot.stream.stop();
        Ok(current.clone())
    }

    fn pause(&mut self) -> PlaybackResult<()> {
        match (self.state, &self.stream) {
            (PlayState::Playing, Some(slot)) => {
                slot.stream.pause()?;
                self.state = PlayState::Paused;
                info!("⏸️ Paused in guild {}", self.guild_id);
                Ok(())
            }
            (PlayState::Paused, _) => Err(PlaybackError::AlreadyPaused),
            _ => Err(PlaybackError::NothingPlaying),
        }
    }

    fn resume(&mut self) -> PlaybackResult<()> {
        match (self.state, &self.stream) {
            (PlayState::Paused, Some(slot)) => {
                slot.stream.resume()?;
                self.state = PlayState::Playing;
                info!("▶️ Resumed in guild {}", self.guild_id);
                Ok(())
            }
            (PlayState::Playing, _) => Err(PlaybackError::NotPaused),
            _ => Err(PlaybackError::NothingPlaying),
        }
    }

    fn stop(&mut self) -> usize {
        let cleared = self.queue.clear();
        self.queue.set_loop_mode(LoopMode::Off);

        match &self.stream {
            Some(slot) => slot.stream.stop(),
            None => self.arm_idle(),
        }
        info!("⏹️ Stopped in guild {} ({} tracks cleared)", self.guild_id, cleared);
        cleared
    }

    fn set_volume(&mut self, percent: u8) -> PlaybackResult<u8> {
        if self.connection.is_none() {
            return Err(PlaybackError::NoVoiceConnection);
        }
        self.volume = percent;
        if let Some(slot) = &self.stream {
            slot.stream.set_volume(self.volume_gain())?;
        }
        info!("🔊 Volume in guild {} set to {}%", self.guild_id, percent);
        Ok(percent)
    }

    /// Clears everything without the completion path; the old stream's end
    /// notification becomes stale.
    fn reset(&mut self) {
        self.queue.clear();
        self.queue.set_loop_mode(LoopMode::Off);
        self.queue.forget_current();
        self.idle.cancel();
        if let Some(slot) = self.stream.take() {
            slot.stream.stop();
        }
        self.state = PlayState::Idle;
        self.consecutive_failures = 0;
    }

    async fn on_idle_elapsed(&mut self, generation: u64) -> ControlFlow<()> {
        if !self.idle.is_current(generation)
            || self.stream.is_some()
            || self.pending_enqueues > 0
        {
            debug!("Ignoring outdated idle timer in guild {}", self.guild_id);
            return ControlFlow::Continue(());
        }
        self.idle.cancel();

        // Already disconnected during the previous grace period.
        let Some(connection) = self.connection.take() else {
            return ControlFlow::Break(());
        };

        info!("💤 Idle timeout reached in guild {}, disconnecting", self.guild_id);
        if let Err(e) = connection.disconnect().await {
            warn!("⚠️ Idle disconnect failed in guild {}: {}", self.guild_id, e);
        }
        self.emit(PlaybackEvent::IdleDisconnected { guild_id: self.guild_id });

        if self.queue.is_empty() {
            return ControlFlow::Break(());
        }
        // Parked tracks get one more grace period for a `play` to resume them.
        info!(
            "💤 Keeping {} parked tracks in guild {} for another {}s",
            self.queue.len(),
            self.guild_id,
            self.shared.settings.idle_timeout.as_secs()
        );
        self.arm_idle();
        ControlFlow::Continue(())
    }

    fn enter_idle(&mut self) {
        self.state = PlayState::Idle;
        self.arm_idle();
    }

    fn arm_idle(&mut self) {
        self.idle.arm(self.shared.settings.idle_timeout, self.inbox.clone());
    }

    fn volume_gain(&self) -> f32 {
        f32::from(self.volume) / 100.0
    }

    fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            state: self.state,
            now_playing: self.stream.as_ref().and(self.queue.current().cloned()),
            upcoming: self.queue.items().cloned().collect(),
            loop_mode: self.queue.loop_mode(),
            volume: self.volume,
            connected: self.connection.is_some(),
            voice_channel: self.connection.as_ref().map(|c| c.channel_id()),
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        // No subscribers is fine.
        let _ = self.shared.events.send(event);
    }
}
