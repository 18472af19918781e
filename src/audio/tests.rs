//! End-to-end tests of the playback core against fake voice and resolver
//! backends.

use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::broadcast;

use super::{
    voice::{ActiveStream, StreamEndNotifier, VoiceConnection},
    *,
};
use crate::sources::{Lookup, Resolve, ResolveError};

const GUILD: GuildId = GuildId::new(1);
const OTHER_GUILD: GuildId = GuildId::new(2);
const VOICE: ChannelId = ChannelId::new(10);
const USER: UserId = UserId::new(5);

struct FakeStream {
    guild_id: GuildId,
    notifier: StreamEndNotifier,
    ended: Arc<AtomicBool>,
}

impl FakeStream {
    fn end(&self, failed: bool) {
        if !self.ended.swap(true, Ordering::SeqCst) {
            self.notifier.notify(failed);
        }
    }
}

#[derive(Default)]
struct VoiceLog {
    connects: usize,
    disconnects: usize,
    /// (guild, title, volume) of every started stream.
    plays: Vec<(GuildId, String, f32)>,
    streams: Vec<Arc<FakeStream>>,
    overlapping_streams: bool,
    failing: HashSet<String>,
}

/// Voice backend that records everything and lets tests end streams.
#[derive(Default, Clone)]
struct FakeVoice {
    log: Arc<Mutex<VoiceLog>>,
}

impl FakeVoice {
    fn played(&self) -> Vec<String> {
        self.log.lock().plays.iter().map(|(_, t, _)| t.clone()).collect()
    }

    fn played_in(&self, guild_id: GuildId) -> Vec<String> {
        self.log
            .lock()
            .plays
            .iter()
            .filter(|(g, _, _)| *g == guild_id)
            .map(|(_, t, _)| t.clone())
            .collect()
    }

    fn volumes(&self) -> Vec<f32> {
        self.log.lock().plays.iter().map(|(_, _, v)| *v).collect()
    }

    fn connects(&self) -> usize {
        self.log.lock().connects
    }

    fn disconnects(&self) -> usize {
        self.log.lock().disconnects
    }

    fn fail_on(&self, title: &str) {
        self.log.lock().failing.insert(title.to_string());
    }

    fn live_stream(&self, guild_id: GuildId) -> Option<Arc<FakeStream>> {
        self.log
            .lock()
            .streams
            .iter()
            .find(|s| s.guild_id == guild_id && !s.ended.load(Ordering::SeqCst))
            .cloned()
    }

    /// Ends the guild's live stream as if the track played to the end.
    fn finish_current(&self, guild_id: GuildId) {
        if let Some(stream) = self.live_stream(guild_id) {
            stream.end(false);
        }
    }

    fn error_current(&self) {
        if let Some(stream) = self.live_stream(GUILD) {
            stream.end(true);
        }
    }

    fn notifier(&self, index: usize) -> StreamEndNotifier {
        self.log.lock().streams[index].notifier.clone()
    }
}

#[async_trait]
impl VoiceGateway for FakeVoice {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> PlaybackResult<Arc<dyn VoiceConnection>> {
        self.log.lock().connects += 1;
        Ok(Arc::new(FakeConnection {
            voice: self.clone(),
            guild_id,
            channel_id,
        }))
    }
}

struct FakeConnection {
    voice: FakeVoice,
    guild_id: GuildId,
    channel_id: ChannelId,
}

#[async_trait]
impl VoiceConnection for FakeConnection {
    async fn play(&self, track: &Track, volume: f32, on_end: StreamEndNotifier) -> PlaybackResult<Box<dyn ActiveStream>> {
        let mut log = self.voice.log.lock();
        if log.failing.contains(track.title()) {
            return Err(PlaybackError::Voice("unplayable".into()));
        }
        let guild_id = self.guild_id;
        if log
            .streams
            .iter()
            .any(|s| s.guild_id == guild_id && !s.ended.load(Ordering::SeqCst))
        {
            log.overlapping_streams = true;
        }

        let stream = Arc::new(FakeStream {
            guild_id,
            notifier: on_end,
            ended: Arc::new(AtomicBool::new(false)),
        });
        log.plays.push((guild_id, track.title().to_string(), volume));
        log.streams.push(stream.clone());
        Ok(Box::new(StreamControl(stream)))
    }

    async fn disconnect(&self) -> PlaybackResult<()> {
        self.voice.log.lock().disconnects += 1;
        Ok(())
    }

    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }
}

struct StreamControl(Arc<FakeStream>);

impl ActiveStream for StreamControl {
    fn pause(&self) -> PlaybackResult<()> {
        Ok(())
    }

    fn resume(&self) -> PlaybackResult<()> {
        Ok(())
    }

    // songbird reports a stopped track as ended
    fn stop(&self) {
        self.0.end(false);
    }

    fn set_volume(&self, _volume: f32) -> PlaybackResult<()> {
        Ok(())
    }
}

/// `list:a,b,c` plans three searches, `bad*` never resolves, `late*` takes
/// ten seconds and `slow*` hangs forever. Everything else resolves to a
/// track named after itself.
struct FakeResolver;

#[async_trait]
impl Resolve for FakeResolver {
    async fn plan(&self, query: &str) -> Result<Vec<Lookup>, ResolveError> {
        match query.strip_prefix("list:") {
            Some(items) => Ok(items.split(',').map(|s| Lookup::Search(s.to_string())).collect()),
            None => Ok(vec![Lookup::Search(query.to_string())]),
        }
    }

    async fn resolve(&self, lookup: &Lookup) -> Result<Track, ResolveError> {
        let name = lookup.as_str();
        if name.starts_with("bad") {
            return Err(ResolveError::NoResults(name.to_string()));
        }
        if name.starts_with("late") {
            tokio::time::sleep(Duration::from_secs(10)).await;
        }
        if name.starts_with("slow") {
            tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
        }
        Ok(Track::new(name, format!("https://cdn.example/{}.m4a", name), name))
    }
}

struct Harness {
    player: AudioPlayer,
    voice: FakeVoice,
    events: broadcast::Receiver<PlaybackEvent>,
}

impl Harness {
    fn new() -> Self {
        Self::with_settings(PlayerSettings::default())
    }

    fn with_settings(settings: PlayerSettings) -> Self {
        let voice = FakeVoice::default();
        let player = AudioPlayer::new(Arc::new(voice.clone()), Arc::new(FakeResolver), settings);
        let events = player.subscribe();
        Self { player, voice, events }
    }

    async fn play(&self, query: &str) -> PlaybackResult<EnqueueOutcome> {
        self.play_in(GUILD, query).await
    }

    async fn play_in(&self, guild_id: GuildId, query: &str) -> PlaybackResult<EnqueueOutcome> {
        self.player
            .enqueue(EnqueueRequest {
                guild_id,
                voice_channel: Some(VOICE),
                query: query.to_string(),
                requested_by: USER,
            })
            .await
    }

    /// Round-trips the guild inbox so every earlier message is handled.
    async fn status(&self) -> PlaybackStatus {
        self.player.status(GUILD).await
    }

    async fn finish(&self) {
        self.finish_in(GUILD).await;
    }

    async fn finish_in(&self, guild_id: GuildId) {
        self.voice.finish_current(guild_id);
        self.player.status(guild_id).await;
    }

    fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    async fn wait_disposed(&self) {
        for _ in 0..100 {
            if self.player.active_guilds() == 0 {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("guild state was not disposed");
    }
}

fn upcoming(status: &PlaybackStatus) -> Vec<String> {
    status.upcoming.iter().map(|t| t.title().to_string()).collect()
}

fn queue_finished(events: &[PlaybackEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, PlaybackEvent::QueueFinished { .. }))
        .count()
}

#[tokio::test]
async fn test_plays_in_order_then_reports_empty_queue() {
    let mut h = Harness::new();

    match h.play("A").await.unwrap() {
        EnqueueOutcome::Queued { track, position } => {
            assert_eq!(track.title(), "A");
            assert_eq!(track.requested_by(), Some(USER));
            assert_eq!(position, None);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(matches!(
        h.play("B").await.unwrap(),
        EnqueueOutcome::Queued { position: Some(1), .. }
    ));
    assert!(matches!(
        h.play("C").await.unwrap(),
        EnqueueOutcome::Queued { position: Some(2), .. }
    ));

    h.finish().await;
    h.finish().await;
    h.finish().await;

    assert_eq!(h.voice.played(), vec!["A", "B", "C"]);
    let status = h.status().await;
    assert_eq!(status.state, PlayState::Idle);
    assert!(status.now_playing.is_none());
    assert_eq!(queue_finished(&h.drain_events()), 1);
    assert!(!h.voice.log.lock().overlapping_streams);
}

#[tokio::test]
async fn test_queue_loop_rotates() {
    let h = Harness::new();
    h.play("A").await.unwrap();
    h.play("B").await.unwrap();
    assert_eq!(
        h.player.set_loop_mode(GUILD, Some(LoopMode::Queue)).await,
        Ok(LoopMode::Queue)
    );

    for _ in 0..4 {
        h.finish().await;
    }

    assert_eq!(h.voice.played(), vec!["A", "B", "A", "B", "A"]);
}

#[tokio::test]
async fn test_track_loop_repeats_without_consuming_queue() {
    let h = Harness::new();
    h.play("A").await.unwrap();
    h.play("B").await.unwrap();
    h.player.set_loop_mode(GUILD, Some(LoopMode::Track)).await.unwrap();

    h.finish().await;
    h.finish().await;

    assert_eq!(h.voice.played(), vec!["A", "A", "A"]);
    assert_eq!(upcoming(&h.status().await), vec!["B"]);
}

#[tokio::test]
async fn test_loop_cycles_when_no_mode_given() {
    let h = Harness::new();
    assert_eq!(h.player.set_loop_mode(GUILD, None).await, Ok(LoopMode::Track));
    assert_eq!(h.player.set_loop_mode(GUILD, None).await, Ok(LoopMode::Queue));
    assert_eq!(h.player.set_loop_mode(GUILD, None).await, Ok(LoopMode::Off));
}

#[tokio::test]
async fn test_skip_advances_and_replays_in_track_loop() {
    let h = Harness::new();
    assert_eq!(
        h.player.skip(GUILD).await,
        Err(PlaybackError::NothingPlaying)
    );

    h.play("A").await.unwrap();
    h.play("B").await.unwrap();

    let skipped = h.player.skip(GUILD).await.unwrap();
    assert_eq!(skipped.title(), "A");
    let status = h.status().await;
    assert_eq!(status.now_playing.map(|t| t.title().to_string()), Some("B".into()));

    h.player.set_loop_mode(GUILD, Some(LoopMode::Track)).await.unwrap();
    h.player.skip(GUILD).await.unwrap();
    h.status().await;
    assert_eq!(h.voice.played(), vec!["A", "B", "B"]);
}

#[tokio::test]
async fn test_pause_and_resume_state_checks() {
    let h = Harness::new();
    assert_eq!(h.player.pause(GUILD).await, Err(PlaybackError::NothingPlaying));

    h.play("A").await.unwrap();
    assert_eq!(h.player.resume(GUILD).await, Err(PlaybackError::NotPaused));
    assert_eq!(h.player.pause(GUILD).await, Ok(()));
    assert_eq!(h.player.pause(GUILD).await, Err(PlaybackError::AlreadyPaused));
    assert!(h.status().await.is_paused());
    assert_eq!(h.player.resume(GUILD).await, Ok(()));
    assert!(h.status().await.is_playing());
}

#[tokio::test]
async fn test_stop_clears_queue_and_goes_idle() {
    let mut h = Harness::new();
    h.play("A").await.unwrap();
    h.play("B").await.unwrap();
    h.play("C").await.unwrap();
    h.player.set_loop_mode(GUILD, Some(LoopMode::Track)).await.unwrap();

    assert_eq!(h.player.stop(GUILD).await, Ok(2));

    let status = h.status().await;
    assert_eq!(status.state, PlayState::Idle);
    assert_eq!(status.loop_mode, LoopMode::Off);
    assert!(status.upcoming.is_empty());
    assert!(status.connected);
    assert_eq!(h.voice.played(), vec!["A"]);
    assert_eq!(queue_finished(&h.drain_events()), 1);
}

#[tokio::test]
async fn test_remove_and_shuffle_through_player() {
    let h = Harness::new();
    for q in ["A", "B", "C", "D"] {
        h.play(q).await.unwrap();
    }

    let removed = h.player.remove_at(GUILD, 2).await.unwrap();
    assert_eq!(removed.title(), "C");
    assert_eq!(upcoming(&h.status().await), vec!["B", "D"]);

    assert_eq!(
        h.player.remove_at(GUILD, 3).await,
        Err(PlaybackError::IndexOutOfRange { index: 3, len: 2 })
    );
    assert_eq!(h.player.shuffle(GUILD).await, Ok(2));

    h.player.remove_at(GUILD, 1).await.unwrap();
    assert_eq!(
        h.player.shuffle(GUILD).await,
        Err(PlaybackError::InsufficientTracks { len: 1 })
    );
}

#[tokio::test(start_paused = true)]
async fn test_idle_guild_is_reclaimed_once() {
    let mut h = Harness::new();
    h.play("A").await.unwrap();
    h.finish().await;

    tokio::time::sleep(Duration::from_secs(119)).await;
    assert_eq!(h.voice.disconnects(), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    h.wait_disposed().await;
    assert_eq!(h.voice.disconnects(), 1);

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(h.voice.disconnects(), 1);

    let idle_events = h
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, PlaybackEvent::IdleDisconnected { .. }))
        .count();
    assert_eq!(idle_events, 1);
    assert!(!h.status().await.connected);
}

#[tokio::test(start_paused = true)]
async fn test_playing_before_expiry_keeps_connection() {
    let h = Harness::new();
    h.play("A").await.unwrap();
    h.finish().await;

    tokio::time::sleep(Duration::from_secs(60)).await;
    h.play("B").await.unwrap();

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(h.voice.disconnects(), 0);
    assert!(h.status().await.is_playing());
}

#[tokio::test(start_paused = true)]
async fn test_lookup_in_progress_holds_off_idle_disconnect() {
    let h = Harness::new();
    h.play("A").await.unwrap();
    h.finish().await;

    tokio::time::sleep(Duration::from_secs(115)).await;
    // Resolves at t=125, past the idle deadline armed when A finished.
    h.play("late B").await.unwrap();

    assert_eq!(h.voice.disconnects(), 0);
    assert_eq!(h.voice.connects(), 1);
    assert_eq!(h.voice.played(), vec!["A", "late B"]);
    assert!(h.status().await.is_playing());
}

#[tokio::test(start_paused = true)]
async fn test_failed_lookup_rearms_idle_timer() {
    let h = Harness::new();
    assert!(h.play("bad song").await.is_err());
    assert!(h.status().await.connected);

    tokio::time::sleep(Duration::from_secs(119)).await;
    assert_eq!(h.voice.disconnects(), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    h.wait_disposed().await;
    assert_eq!(h.voice.disconnects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_parked_queue_gets_one_more_grace_period() {
    let h = Harness::new();
    for title in ["x1", "x2", "x3"] {
        h.voice.fail_on(title);
    }
    for query in ["A", "x1", "x2", "x3", "B"] {
        h.play(query).await.unwrap();
    }

    // x1..x3 refuse to start, which parks the guild with B still queued.
    h.finish().await;
    let status = h.status().await;
    assert_eq!(status.state, PlayState::Idle);
    assert_eq!(upcoming(&status), vec!["B"]);

    tokio::time::sleep(Duration::from_secs(121)).await;
    let status = h.status().await;
    assert_eq!(h.voice.disconnects(), 1);
    assert_eq!(h.player.active_guilds(), 1);
    assert!(!status.connected);
    assert_eq!(upcoming(&status), vec!["B"]);

    tokio::time::sleep(Duration::from_secs(121)).await;
    h.wait_disposed().await;
    assert_eq!(h.voice.disconnects(), 1);
}

#[tokio::test]
async fn test_guilds_play_independently() {
    let h = Harness::new();
    h.play_in(GUILD, "a1").await.unwrap();
    h.play_in(OTHER_GUILD, "b1").await.unwrap();
    h.play_in(GUILD, "a2").await.unwrap();
    h.play_in(OTHER_GUILD, "b2").await.unwrap();
    h.play_in(GUILD, "a3").await.unwrap();

    h.finish_in(OTHER_GUILD).await;
    h.finish_in(GUILD).await;
    h.player
        .set_loop_mode(OTHER_GUILD, Some(LoopMode::Track))
        .await
        .unwrap();
    h.finish_in(GUILD).await;
    h.finish_in(OTHER_GUILD).await;

    assert_eq!(h.voice.played_in(GUILD), vec!["a1", "a2", "a3"]);
    assert_eq!(h.voice.played_in(OTHER_GUILD), vec!["b1", "b2", "b2"]);
    assert_eq!(h.player.active_guilds(), 2);

    assert_eq!(h.player.stop(GUILD).await, Ok(0));
    let status = h.status().await;
    assert!(status.now_playing.is_none());
    assert_eq!(status.loop_mode, LoopMode::Off);

    let other = h.player.status(OTHER_GUILD).await;
    assert!(other.is_playing());
    assert_eq!(other.loop_mode, LoopMode::Track);
    assert_eq!(other.now_playing.map(|t| t.title().to_string()), Some("b2".into()));
    assert!(!h.voice.log.lock().overlapping_streams);
}

#[tokio::test]
async fn test_concurrent_commands_keep_one_stream() {
    let h = Harness::new();
    h.play("A").await.unwrap();

    let (b, c, skipped, _shuffled, d) = tokio::join!(
        h.play("B"),
        h.play("C"),
        h.player.skip(GUILD),
        h.player.shuffle(GUILD),
        h.play("D"),
    );
    assert!(b.is_ok() && c.is_ok() && d.is_ok());
    assert_eq!(skipped.map(|t| t.title().to_string()), Ok("A".to_string()));

    for _ in 0..5 {
        h.finish().await;
    }

    let mut played = h.voice.played();
    played.sort();
    assert_eq!(played, vec!["A", "B", "C", "D"]);
    assert!(!h.voice.log.lock().overlapping_streams);
    assert!(h.status().await.upcoming.is_empty());
}

#[tokio::test]
async fn test_batch_counts_failures() {
    let h = Harness::new();
    assert_eq!(
        h.play("list:a,bad-one,c").await,
        Ok(EnqueueOutcome::Batch { added: 2, failed: 1, dropped: 0 })
    );
    assert_eq!(h.voice.played(), vec!["a"]);
    assert_eq!(upcoming(&h.status().await), vec!["c"]);
}

#[tokio::test]
async fn test_batch_without_successes_fails() {
    let h = Harness::new();
    assert_eq!(
        h.play("list:bad1,bad2").await,
        Err(PlaybackError::BatchFailed { attempted: 2 })
    );
    assert!(h.status().await.upcoming.is_empty());
}

#[tokio::test]
async fn test_batch_stops_at_capacity() {
    let h = Harness::with_settings(PlayerSettings {
        max_queue_size: 2,
        ..Default::default()
    });

    // The first track starts right away and leaves the queue.
    assert_eq!(
        h.play("list:a,b,c,d,e").await,
        Ok(EnqueueOutcome::Batch { added: 3, failed: 0, dropped: 2 })
    );
    assert_eq!(
        h.play("f").await,
        Err(PlaybackError::QueueFull { max: 2 })
    );
}

#[tokio::test(start_paused = true)]
async fn test_hanging_resolution_times_out() {
    let h = Harness::new();
    assert_eq!(
        h.play("slow song").await,
        Err(PlaybackError::Resolution(ResolveError::Timeout(Duration::from_secs(120))))
    );
    let status = h.status().await;
    assert!(status.upcoming.is_empty());
    assert!(status.now_playing.is_none());
}

#[tokio::test]
async fn test_duplicate_completion_is_ignored() {
    let h = Harness::new();
    h.play("A").await.unwrap();
    h.play("B").await.unwrap();
    h.play("C").await.unwrap();

    h.finish().await;
    // A's stream reports its end a second time.
    h.voice.notifier(0).notify(false);
    let status = h.status().await;

    assert_eq!(status.now_playing.map(|t| t.title().to_string()), Some("B".into()));
    assert_eq!(h.voice.played(), vec!["A", "B"]);
}

#[tokio::test]
async fn test_leave_disposes_and_ignores_late_events() {
    let h = Harness::new();
    h.play("A").await.unwrap();
    h.play("B").await.unwrap();

    assert_eq!(h.player.leave(GUILD).await, Ok(()));
    h.wait_disposed().await;
    assert_eq!(h.voice.disconnects(), 1);

    h.voice.notifier(0).notify(false);
    let status = h.status().await;
    assert!(!status.connected);
    assert!(status.upcoming.is_empty());
    assert_eq!(h.voice.played(), vec!["A"]);

    assert_eq!(h.player.leave(GUILD).await, Err(PlaybackError::NoVoiceConnection));

    // A fresh state is created on the next request.
    h.play("C").await.unwrap();
    assert_eq!(h.voice.played(), vec!["A", "C"]);
}

#[tokio::test]
async fn test_voice_lost_resets_without_disconnecting() {
    let h = Harness::new();
    h.play("A").await.unwrap();
    h.play("B").await.unwrap();

    h.player.voice_lost(GUILD);
    h.wait_disposed().await;

    assert_eq!(h.voice.disconnects(), 0);
    assert!(h.status().await.upcoming.is_empty());

    // Unknown guilds are a no-op.
    h.player.voice_lost(GuildId::new(99));
    assert_eq!(h.player.active_guilds(), 0);
}

#[tokio::test]
async fn test_volume_sticks_for_later_tracks() {
    let h = Harness::new();
    assert_eq!(
        h.player.set_volume(GUILD, 80).await,
        Err(PlaybackError::NoVoiceConnection)
    );

    h.play("A").await.unwrap();
    h.play("B").await.unwrap();
    assert_eq!(h.player.set_volume(GUILD, 80).await, Ok(80));
    assert_eq!(
        h.player.set_volume(GUILD, 101).await,
        Err(PlaybackError::VolumeOutOfRange(101))
    );
    assert_eq!(
        h.player.set_volume(GUILD, -1).await,
        Err(PlaybackError::VolumeOutOfRange(-1))
    );

    h.player.set_loop_mode(GUILD, Some(LoopMode::Track)).await.unwrap();
    h.finish().await;
    h.player.set_loop_mode(GUILD, Some(LoopMode::Off)).await.unwrap();
    h.finish().await;

    assert_eq!(h.voice.played(), vec!["A", "A", "B"]);
    assert_eq!(h.voice.volumes(), vec![0.5, 0.8, 0.8]);
    assert_eq!(h.status().await.volume, 80);
}

#[tokio::test]
async fn test_requester_must_be_in_voice() {
    let h = Harness::new();
    let result = h
        .player
        .enqueue(EnqueueRequest {
            guild_id: GUILD,
            voice_channel: None,
            query: "A".into(),
            requested_by: USER,
        })
        .await;

    assert_eq!(result, Err(PlaybackError::NoVoiceChannel));
    assert_eq!(h.player.active_guilds(), 0);
}

#[tokio::test]
async fn test_unplayable_track_is_skipped() {
    let mut h = Harness::new();
    h.voice.fail_on("A");

    h.play("A").await.unwrap();
    h.play("B").await.unwrap();

    assert_eq!(h.voice.played(), vec!["B"]);
    let events = h.drain_events();
    assert!(matches!(
        &events[0],
        PlaybackEvent::TrackFailed { title, .. } if title == "A"
    ));
}

#[tokio::test]
async fn test_errored_stream_is_not_replayed_by_track_loop() {
    let mut h = Harness::new();
    h.play("A").await.unwrap();
    h.play("B").await.unwrap();
    h.player.set_loop_mode(GUILD, Some(LoopMode::Track)).await.unwrap();

    h.voice.error_current();
    h.status().await;

    assert_eq!(h.voice.played(), vec!["A", "B"]);
    assert!(h
        .drain_events()
        .iter()
        .any(|e| matches!(e, PlaybackEvent::TrackFailed { title, .. } if title == "A")));
}

#[tokio::test]
async fn test_gives_up_after_repeated_failures() {
    let h = Harness::new();
    for title in ["x1", "x2", "x3"] {
        h.voice.fail_on(title);
    }

    assert!(matches!(
        h.play("list:x1,x2,x3,ok").await,
        Ok(EnqueueOutcome::Batch { added: 4, .. })
    ));

    // Three refusals in a row park the guild; the next append restarts it.
    let status = h.status().await;
    assert_eq!(status.state, PlayState::Playing);
    assert_eq!(h.voice.played(), vec!["ok"]);
}
