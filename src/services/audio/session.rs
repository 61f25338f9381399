//! Per-guild voice sessions and the registry that owns them.

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;
use serenity::all::{ChannelId, Context, GuildId, UserId};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::bot::error::Error;
use crate::constants::timeouts::VOICE_CONNECT_TIMEOUT;
use crate::services::audio::node::NodeClient;
use crate::services::audio::protocol::{EndReason, UpdatePlayer, VoiceState};
use crate::services::audio::queue::TrackQueue;
use crate::services::audio::track::Track;
use crate::utils::permissions::voice_channel_of;

/// Identifiers remembered so autoplay does not repeat itself
pub const HISTORY_LIMIT: usize = 50;

pub const DEFAULT_VOLUME: u16 = 100;
pub const MAX_VOLUME: u16 = 150;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, poise::ChoiceParameter)]
pub enum LoopMode {
    #[default]
    #[name = "off"]
    Off,
    /// Replay the current track
    #[name = "track"]
    Track,
    /// Rotate finished tracks to the back of the queue
    #[name = "queue"]
    Queue,
}

impl LoopMode {
    pub fn cycle(&self) -> Self {
        match self {
            LoopMode::Off => LoopMode::Track,
            LoopMode::Track => LoopMode::Queue,
            LoopMode::Queue => LoopMode::Off,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LoopMode::Off => "Off",
            LoopMode::Track => "Loop track",
            LoopMode::Queue => "Loop queue",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Disconnected,
    Idle,
    Playing,
    Paused,
    Stopped,
}

/// What the controller should do once a track ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextAction {
    /// The end does not concern the queue (replaced or cleaned up)
    Ignore,
    Play(Track),
    /// Autoplay ran dry, fetch recommendations seeded by this track
    Recommend(Track),
    Idle,
}

#[derive(Debug)]
pub struct VoiceSession {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    /// Fallback channel for notifications
    pub text_channel: ChannelId,
    pub queue: TrackQueue,
    /// Recommendations, kept apart from the user queue
    pub auto_queue: VecDeque<Track>,
    history: VecDeque<String>,
    pub current: Option<Track>,
    pub autoplay: bool,
    pub loop_mode: LoopMode,
    pub state: PlayerState,
    pub position_ms: u64,
    pub volume: u16,
    pub voice: Option<VoiceState>,
}

impl VoiceSession {
    pub fn new(guild_id: GuildId, channel_id: ChannelId, text_channel: ChannelId) -> Self {
        Self {
            guild_id,
            channel_id,
            text_channel,
            queue: TrackQueue::new(),
            auto_queue: VecDeque::new(),
            history: VecDeque::new(),
            current: None,
            autoplay: false,
            loop_mode: LoopMode::Off,
            state: PlayerState::Idle,
            position_ms: 0,
            volume: DEFAULT_VOLUME,
            voice: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, PlayerState::Playing | PlayerState::Paused)
    }

    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }

    /// Called on track start
    pub fn record_started(&mut self, track: &Track) {
        self.position_ms = 0;
        if self.state != PlayerState::Paused {
            self.state = PlayerState::Playing;
        }
        let id = track.identifier().to_string();
        self.history.retain(|h| *h != id);
        self.history.push_back(id);
        while self.history.len() > HISTORY_LIMIT {
            self.history.pop_front();
        }
    }

    /// Mark `track` as the one being sent to the node
    pub fn begin(&mut self, track: Track) -> Track {
        self.current = Some(track.clone());
        self.position_ms = 0;
        self.state = PlayerState::Playing;
        track
    }

    pub fn set_autoplay(&mut self, enabled: bool) {
        self.autoplay = enabled;
        if !enabled {
            self.auto_queue.clear();
        }
    }

    /// Store recommendations, dropping ones that played recently
    pub fn fill_auto_queue(&mut self, tracks: Vec<Track>) -> usize {
        let before = self.auto_queue.len();
        for track in tracks {
            let id = track.identifier();
            let seen = self.history.iter().any(|h| h == id)
                || self.auto_queue.iter().any(|t| t.identifier() == id);
            if !seen && track.admission().is_ok() {
                self.auto_queue.push_back(track);
            }
        }
        self.auto_queue.len() - before
    }

    /// Seek to the end of the current track so the node ends it. A paused
    /// player never reaches the end, so the update also unpauses it.
    pub fn skip_update(&self) -> Option<UpdatePlayer> {
        let target = self.current.as_ref()?.length_ms();
        let mut update = UpdatePlayer::seek(target);
        if self.state == PlayerState::Paused {
            update.paused = Some(false);
        }
        Some(update)
    }

    /// Clear everything queued and turn autoplay off. Returns the number of dropped tracks.
    pub fn stop(&mut self) -> usize {
        let dropped = self.queue.clear();
        self.set_autoplay(false);
        self.state = PlayerState::Stopped;
        dropped
    }

    /// Decide what follows a finished track. Mutates the session for every action
    /// except `Recommend`, which is completed by `after_recommendations`.
    pub fn on_track_end(&mut self, reason: EndReason) -> NextAction {
        match reason {
            EndReason::Replaced | EndReason::Cleanup => return NextAction::Ignore,
            // Anything queued now arrived after the stop
            EndReason::Stopped => return self.play_queued(),
            EndReason::Finished | EndReason::LoadFailed => {}
        }

        if self.state == PlayerState::Stopped {
            return self.play_queued();
        }

        let finished = self.current.take();

        if self.autoplay {
            if let Some(next) = self.queue.pop_front().or_else(|| self.auto_queue.pop_front()) {
                return NextAction::Play(self.begin(next));
            }
            return match finished {
                Some(seed) => {
                    self.current = None;
                    NextAction::Recommend(seed)
                }
                None => self.idle(),
            };
        }

        match (self.loop_mode, finished) {
            // A track that failed to load would fail again
            (LoopMode::Track, Some(track)) if reason != EndReason::LoadFailed => {
                NextAction::Play(self.begin(track))
            }
            (LoopMode::Queue, Some(track)) => {
                self.queue.requeue(track);
                match self.queue.pop_front() {
                    Some(next) => NextAction::Play(self.begin(next)),
                    None => self.idle(),
                }
            }
            _ => self.play_queued(),
        }
    }

    fn play_queued(&mut self) -> NextAction {
        match self.queue.pop_front() {
            Some(next) => NextAction::Play(self.begin(next)),
            None => self.idle(),
        }
    }

    /// Second half of a `Recommend` action
    pub fn after_recommendations(&mut self, tracks: Vec<Track>) -> NextAction {
        self.fill_auto_queue(tracks);
        match self.auto_queue.pop_front() {
            Some(next) if self.autoplay => NextAction::Play(self.begin(next)),
            _ => self.idle(),
        }
    }

    fn idle(&mut self) -> NextAction {
        self.current = None;
        self.position_ms = 0;
        self.state = PlayerState::Idle;
        NextAction::Idle
    }
}

pub type SharedSession = Arc<Mutex<VoiceSession>>;

/// At most one session per guild; creation is serialized per guild
#[derive(Default)]
pub struct VoiceRegistry {
    sessions: DashMap<GuildId, SharedSession>,
    creation: DashMap<GuildId, Arc<Mutex<()>>>,
}

impl VoiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<SharedSession> {
        self.sessions.get(&guild_id).map(|s| s.value().clone())
    }

    pub fn guilds(&self) -> Vec<GuildId> {
        self.sessions.iter().map(|e| *e.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub(crate) fn insert(&self, session: VoiceSession) -> SharedSession {
        let guild_id = session.guild_id;
        let shared = Arc::new(Mutex::new(session));
        self.sessions.insert(guild_id, shared.clone());
        shared
    }

    pub(crate) fn remove(&self, guild_id: GuildId) -> Option<SharedSession> {
        self.sessions.remove(&guild_id).map(|(_, s)| s)
    }

    fn creation_lock(&self, guild_id: GuildId) -> Arc<Mutex<()>> {
        self.creation.entry(guild_id).or_default().value().clone()
    }

    /// Drop the session and its creation lock
    fn forget(&self, guild_id: GuildId) -> Option<SharedSession> {
        self.creation.remove(&guild_id);
        self.remove(guild_id)
    }

    /// Existing session, or a new one joined self-deafened to the user's voice channel
    pub async fn ensure(
        &self,
        ctx: &Context,
        node: &NodeClient,
        guild_id: GuildId,
        user_id: UserId,
        text_channel: ChannelId,
    ) -> Result<SharedSession, Error> {
        if let Some(existing) = self.get(guild_id) {
            return Ok(existing);
        }

        let lock = self.creation_lock(guild_id);
        let _guard = lock.lock().await;

        // Another invocation may have connected while we waited
        if let Some(existing) = self.get(guild_id) {
            return Ok(existing);
        }

        let channel_id = voice_channel_of(ctx, guild_id, user_id).ok_or(Error::UserNotInVoice)?;
        let voice = join_voice(ctx, guild_id, channel_id).await?;

        if let Err(e) = node
            .update_player(guild_id, &UpdatePlayer::voice(voice.clone()))
            .await
        {
            leave_voice(ctx, guild_id).await;
            return Err(e);
        }

        let mut session = VoiceSession::new(guild_id, channel_id, text_channel);
        session.voice = Some(voice);

        info!("Voice session created in guild {} (channel {})", guild_id, channel_id);
        Ok(self.insert(session))
    }

    /// Disconnect, flush the queue and drop the session
    pub async fn dispose(&self, ctx: &Context, node: &NodeClient, guild_id: GuildId) -> bool {
        let Some(session) = self.forget(guild_id) else {
            return false;
        };

        {
            let mut session = session.lock().await;
            session.queue.clear();
            session.set_autoplay(false);
            session.current = None;
            session.state = PlayerState::Disconnected;
        }

        if let Err(e) = node.destroy_player(guild_id).await {
            debug!("Could not destroy player for guild {}: {}", guild_id, e);
        }
        leave_voice(ctx, guild_id).await;

        info!("Voice session disposed in guild {}", guild_id);
        true
    }
}

async fn join_voice(ctx: &Context, guild_id: GuildId, channel_id: ChannelId) -> Result<VoiceState, Error> {
    let manager = songbird::get(ctx)
        .await
        .ok_or_else(|| Error::custom("Voice client was not registered"))?;

    let joined = tokio::time::timeout(VOICE_CONNECT_TIMEOUT, manager.join_gateway(guild_id, channel_id)).await;
    let (info, call) = match joined {
        Ok(Ok(joined)) => joined,
        Ok(Err(e)) => {
            let _ = manager.remove(guild_id).await;
            return Err(Error::custom(format!("Failed to join voice channel: {}", e)));
        }
        Err(_) => {
            let _ = manager.remove(guild_id).await;
            return Err(Error::ChannelTimeout);
        }
    };

    if let Err(e) = call.lock().await.deafen(true).await {
        warn!("Failed to self-deafen in guild {}: {}", guild_id, e);
    }

    Ok(VoiceState {
        token: info.token,
        endpoint: info.endpoint,
        session_id: info.session_id,
    })
}

async fn leave_voice(ctx: &Context, guild_id: GuildId) {
    if let Some(manager) = songbird::get(ctx).await {
        if let Err(e) = manager.remove(guild_id).await {
            debug!("Voice leave for guild {}: {}", guild_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::audio::track::test_track;

    fn session() -> VoiceSession {
        VoiceSession::new(GuildId::new(1), ChannelId::new(2), ChannelId::new(3))
    }

    fn playing(id: &str, queued: &[&str]) -> VoiceSession {
        let mut s = session();
        s.begin(test_track(id, 200_000, false));
        for q in queued {
            s.queue.enqueue(test_track(q, 200_000, false)).unwrap();
        }
        s
    }

    fn played(action: &NextAction) -> &str {
        match action {
            NextAction::Play(track) => track.identifier(),
            other => panic!("expected Play, got {:?}", other),
        }
    }

    #[test]
    fn test_loop_mode_cycles() {
        assert_eq!(LoopMode::Off.cycle(), LoopMode::Track);
        assert_eq!(LoopMode::Track.cycle(), LoopMode::Queue);
        assert_eq!(LoopMode::Queue.cycle(), LoopMode::Off);
    }

    #[test]
    fn test_queue_advances_then_idles() {
        let mut s = playing("a", &["b"]);
        assert_eq!(played(&s.on_track_end(EndReason::Finished)), "b");
        assert_eq!(s.current.as_ref().unwrap().identifier(), "b");
        assert_eq!(s.on_track_end(EndReason::Finished), NextAction::Idle);
        assert_eq!(s.state, PlayerState::Idle);
        assert!(s.current.is_none());
    }

    #[test]
    fn test_loop_track_replays_current() {
        let mut s = playing("a", &["b"]);
        s.loop_mode = LoopMode::Track;
        assert_eq!(played(&s.on_track_end(EndReason::Finished)), "a");
        assert_eq!(s.queue.len(), 1);

        // A load failure skips instead of looping forever
        assert_eq!(played(&s.on_track_end(EndReason::LoadFailed)), "b");
    }

    #[test]
    fn test_loop_queue_rotates_without_loss() {
        let mut s = playing("a", &["b", "c"]);
        s.loop_mode = LoopMode::Queue;

        let mut order = Vec::new();
        for _ in 0..6 {
            order.push(played(&s.on_track_end(EndReason::Finished)).to_string());
            assert_eq!(s.queue.len(), 2);
        }
        assert_eq!(order, vec!["b", "c", "a", "b", "c", "a"]);
    }

    #[test]
    fn test_loop_queue_single_track_repeats() {
        let mut s = playing("a", &[]);
        s.loop_mode = LoopMode::Queue;
        assert_eq!(played(&s.on_track_end(EndReason::Finished)), "a");
        assert!(s.queue.is_empty());
    }

    #[test]
    fn test_autoplay_takes_precedence() {
        let mut s = playing("a", &["b"]);
        s.loop_mode = LoopMode::Track;
        s.set_autoplay(true);

        assert_eq!(played(&s.on_track_end(EndReason::Finished)), "b");
        match s.on_track_end(EndReason::Finished) {
            NextAction::Recommend(seed) => assert_eq!(seed.identifier(), "b"),
            other => panic!("expected Recommend, got {:?}", other),
        }

        s.record_started(&test_track("b", 200_000, false));
        let next = s.after_recommendations(vec![
            test_track("b", 200_000, false),
            test_track("long", 4_000_000, false),
            test_track("c", 200_000, false),
            test_track("d", 200_000, false),
        ]);
        assert_eq!(played(&next), "c");
        assert_eq!(s.auto_queue.len(), 1);
        assert!(s.queue.is_empty());
    }

    #[test]
    fn test_autoplay_toggle_twice_is_noop() {
        let mut s = session();
        let before = s.autoplay;
        s.set_autoplay(!s.autoplay);
        s.set_autoplay(!s.autoplay);
        assert_eq!(s.autoplay, before);
    }

    #[test]
    fn test_replaced_end_is_ignored() {
        let mut s = playing("a", &["b"]);
        assert_eq!(s.on_track_end(EndReason::Replaced), NextAction::Ignore);
        assert_eq!(s.current.as_ref().unwrap().identifier(), "a");
        assert_eq!(s.queue.len(), 1);
    }

    #[test]
    fn test_stop_then_end_idles() {
        let mut s = playing("a", &["b", "c"]);
        s.set_autoplay(true);
        assert_eq!(s.stop(), 2);
        assert!(!s.autoplay);
        assert_eq!(s.on_track_end(EndReason::Stopped), NextAction::Idle);
        assert_eq!(s.state, PlayerState::Idle);
    }

    #[test]
    fn test_skip_seeks_to_length_and_advances() {
        let mut s = playing("a", &["b"]);
        s.position_ms = 10_000;
        let update = s.skip_update().unwrap();
        assert_eq!(update.position, Some(200_000));
        assert_eq!(update.paused, None);
        assert_eq!(played(&s.on_track_end(EndReason::Finished)), "b");
    }

    #[test]
    fn test_skip_while_paused_unpauses() {
        let mut s = playing("a", &["b"]);
        s.state = PlayerState::Paused;
        let update = s.skip_update().unwrap();
        assert_eq!(update.position, Some(200_000));
        assert_eq!(update.paused, Some(false));

        assert!(session().skip_update().is_none());
    }

    #[test]
    fn test_track_queued_during_stop_still_plays() {
        let mut s = playing("a", &[]);
        s.stop();
        // The node has not confirmed the stop yet, so `current` is still set
        assert!(s.current.is_some());
        s.queue.enqueue(test_track("b", 200_000, false)).unwrap();

        assert_eq!(played(&s.on_track_end(EndReason::Stopped)), "b");
        assert_eq!(s.state, PlayerState::Playing);
        assert!(s.queue.is_empty());
    }

    #[test]
    fn test_finished_after_stop_plays_late_arrivals() {
        let mut s = playing("a", &["b"]);
        s.stop();
        s.queue.enqueue(test_track("c", 200_000, false)).unwrap();
        assert_eq!(played(&s.on_track_end(EndReason::Finished)), "c");
    }

    #[test]
    fn test_dispose_releases_creation_lock() {
        let registry = VoiceRegistry::new();
        let guild = GuildId::new(1);
        registry.creation_lock(guild);
        registry.insert(session());
        assert_eq!(registry.creation.len(), 1);

        registry.forget(guild);
        assert!(registry.get(guild).is_none());
        assert!(registry.creation.is_empty());
    }

    #[test]
    fn test_history_is_bounded() {
        let mut s = session();
        for i in 0..(HISTORY_LIMIT + 10) {
            s.record_started(&test_track(&i.to_string(), 1_000, false));
        }
        assert_eq!(s.history().count(), HISTORY_LIMIT);
        assert_eq!(s.history().next(), Some("10"));
    }

    #[test]
    fn test_registry_single_session_per_guild() {
        let registry = VoiceRegistry::new();
        let guild = GuildId::new(1);
        assert!(registry.get(guild).is_none());

        registry.insert(session());
        registry.insert(session());
        assert_eq!(registry.len(), 1);
        assert!(registry.get(guild).is_some());

        assert!(registry.remove(guild).is_some());
        assert!(registry.is_empty());
    }
}
