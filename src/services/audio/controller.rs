//! Playback controller: reacts to audio node events and carries out music commands.
//!
//! Every operation locks the guild's session for its whole duration, so node events
//! and user requests on one guild never run concurrently.

use std::sync::Arc;

use serenity::all::{
    ActivityData, ChannelId, Context, CreateEmbed, CreateMessage, CreateWebhook, ExecuteWebhook,
    GuildId, OnlineStatus, UserId, Webhook,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::bot::data::Data;
use crate::bot::error::Error;
use crate::constants::embeds;
use crate::constants::timeouts::format_millis;
use crate::db::queries::guild_settings;
use crate::services::audio::node::NodeMessage;
use crate::services::audio::protocol::{
    EndReason, NodeEvent, TrackData, UpdatePlayer, UpdateTrack,
};
use crate::services::audio::queue::AdmissionReport;
use crate::services::audio::session::{
    LoopMode, NextAction, PlayerState, SharedSession, VoiceSession, MAX_VOLUME,
};
use crate::services::audio::track::{Resolved, Source, Track};
use crate::utils::formatting::{mention_user, progress_bar, truncate};
use crate::utils::permissions::voice_channel_of;

const WEBHOOK_NAME: &str = "Cadence Music";
const PLAYLIST_REPORT_LINES: usize = 20;

/// Consume node messages until the node client shuts down
pub fn spawn_event_loop(ctx: Context, data: Arc<Data>, mut events: mpsc::UnboundedReceiver<NodeMessage>) {
    tokio::spawn(async move {
        info!("Started playback event loop");
        while let Some(message) = events.recv().await {
            if let Err(e) = handle_message(&ctx, &data, message).await {
                error!("Playback event error: {}", e);
            }
        }
        warn!("Playback event loop stopped");
    });
}

async fn handle_message(ctx: &Context, data: &Arc<Data>, message: NodeMessage) -> Result<(), Error> {
    match message {
        NodeMessage::Ready { resumed } => {
            if !resumed {
                resync(data).await;
            }
        }
        NodeMessage::PlayerUpdate { guild_id, state } => {
            if let Some(session) = data.voice.get(guild_id) {
                session.lock().await.position_ms = state.position;
            }
        }
        NodeMessage::Event { guild_id, event } => match event {
            NodeEvent::TrackStartEvent { track, .. } => on_track_start(ctx, data, guild_id, track).await?,
            NodeEvent::TrackEndEvent { reason, .. } => on_track_end(ctx, data, guild_id, reason).await?,
            NodeEvent::TrackStuckEvent { track, threshold_ms, .. } => {
                warn!(
                    "Track {} stuck for {}ms in guild {}",
                    track.info.identifier, threshold_ms, guild_id
                );
                on_track_end(ctx, data, guild_id, EndReason::LoadFailed).await?;
            }
            NodeEvent::TrackExceptionEvent { track, exception, .. } => {
                warn!(
                    "Track {} failed in guild {}: {:?}",
                    track.info.identifier, guild_id, exception
                );
                let embed = embeds::domain_error(format!(
                    "Could not play **{}**: {}",
                    track.info.title,
                    exception.describe()
                ));
                notify(ctx, data, guild_id, embed).await;
            }
            NodeEvent::WebSocketClosedEvent { code, reason, by_remote, .. } => {
                warn!(
                    "Voice websocket closed in guild {} (code {}, remote: {}): {}",
                    guild_id, code, by_remote, reason
                );
            }
        },
    }
    Ok(())
}

/// After a fresh node session, re-create every player we still hold
async fn resync(data: &Arc<Data>) {
    for guild_id in data.voice.guilds() {
        let Some(session) = data.voice.get(guild_id) else {
            continue;
        };
        let session = session.lock().await;
        let Some(voice) = session.voice.clone() else {
            continue;
        };

        let update = UpdatePlayer {
            track: session.current.as_ref().map(|t| UpdateTrack {
                encoded: Some(Some(t.encoded.clone())),
            }),
            position: session.current.as_ref().map(|_| session.position_ms),
            paused: Some(session.state == PlayerState::Paused),
            volume: Some(session.volume),
            voice: Some(voice),
        };

        match data.node.update_player(guild_id, &update).await {
            Ok(()) => info!("Restored player for guild {}", guild_id),
            Err(e) => warn!("Could not restore player for guild {}: {}", guild_id, e),
        }
    }
}

async fn on_track_start(ctx: &Context, data: &Arc<Data>, guild_id: GuildId, started: TrackData) -> Result<(), Error> {
    let Some(session) = data.voice.get(guild_id) else {
        return Ok(());
    };

    let track = {
        let mut session = session.lock().await;
        let track = match &session.current {
            Some(current) if current.encoded == started.encoded => current.clone(),
            _ => Track::new(started, None),
        };
        session.record_started(&track);
        track
    };

    ctx.set_presence(Some(ActivityData::listening(track.title())), OnlineStatus::Online);
    notify(ctx, data, guild_id, now_playing_embed(&track, None)).await;
    Ok(())
}

async fn on_track_end(ctx: &Context, data: &Arc<Data>, guild_id: GuildId, reason: EndReason) -> Result<(), Error> {
    let Some(session) = data.voice.get(guild_id) else {
        return Ok(());
    };
    let mut session = session.lock().await;

    let mut action = session.on_track_end(reason);
    if let NextAction::Recommend(seed) = action {
        let recommendations = match data.resolver.recommendations(&seed).await {
            Ok(tracks) => tracks,
            Err(e) => {
                warn!("Autoplay lookup failed in guild {}: {}", guild_id, e);
                Vec::new()
            }
        };
        action = session.after_recommendations(recommendations);
    }

    match action {
        NextAction::Play(track) => {
            debug!("Advancing to {} in guild {}", track.identifier(), guild_id);
            if let Err(e) = send_play(data, &mut session, &track).await {
                drop(session);
                notify(ctx, data, guild_id, embeds::domain_error(format!("Could not start **{}**: {}", track.title(), e))).await;
            }
        }
        NextAction::Idle => {
            drop(session);
            set_idle_presence(ctx);
        }
        NextAction::Ignore | NextAction::Recommend(_) => {}
    }
    Ok(())
}

async fn send_play(data: &Data, session: &mut VoiceSession, track: &Track) -> Result<(), Error> {
    let result = data
        .node
        .update_player(session.guild_id, &UpdatePlayer::play(&track.encoded))
        .await;
    if result.is_err() {
        session.current = None;
        session.state = PlayerState::Idle;
    }
    result
}

pub fn set_idle_presence(ctx: &Context) {
    ctx.set_presence(None, OnlineStatus::Idle);
}

/// Post to the guild's music webhook, the configured fallback webhook, or the session's text channel
pub async fn notify(ctx: &Context, data: &Arc<Data>, guild_id: GuildId, embed: CreateEmbed) {
    let configured = match guild_settings::get(&data.pool, guild_id.get() as i64).await {
        Ok(settings) => settings.and_then(|s| s.music_webhook_url),
        Err(e) => {
            warn!("Could not read music channel for guild {}: {}", guild_id, e);
            None
        }
    };
    let fallback = data
        .settings
        .music_webhook_url
        .clone()
        .filter(|_| data.settings.guild_id == Some(guild_id.get()));

    if let Some(url) = configured.or(fallback) {
        match post_webhook(ctx, &url, embed.clone()).await {
            Ok(()) => return,
            Err(e) => warn!("Music webhook failed for guild {}: {}", guild_id, e),
        }
    }

    let channel = match data.voice.get(guild_id) {
        Some(session) => session.lock().await.text_channel,
        None => return,
    };
    if let Err(e) = channel.send_message(&ctx.http, CreateMessage::new().embed(embed)).await {
        warn!("Could not post music notification in {}: {}", channel, e);
    }
}

async fn post_webhook(ctx: &Context, url: &str, embed: CreateEmbed) -> Result<(), Error> {
    let webhook = Webhook::from_url(&ctx.http, url).await?;
    webhook
        .execute(&ctx.http, false, ExecuteWebhook::new().embed(embed).username(WEBHOOK_NAME))
        .await?;
    Ok(())
}

/// Create a webhook in `channel` for music notifications, returning its URL
pub async fn create_music_webhook(ctx: &Context, channel: ChannelId) -> Result<String, Error> {
    let webhook = channel
        .create_webhook(&ctx.http, CreateWebhook::new(WEBHOOK_NAME))
        .await?;
    Ok(webhook.url()?)
}

/// What `play` did with the resolved query
#[derive(Debug)]
pub enum PlayOutcome {
    /// Started immediately
    Started(Track),
    /// Queued at this 1-based position
    Queued(Track, usize),
    Playlist { name: String, report: AdmissionReport },
}

/// Resolve `query`, queue the result and start playback when idle
pub async fn play(
    ctx: &Context,
    data: &Arc<Data>,
    guild_id: GuildId,
    user_id: UserId,
    text_channel: ChannelId,
    query: &str,
    source: Source,
) -> Result<PlayOutcome, Error> {
    let session = connect(ctx, data, guild_id, user_id, text_channel).await?;
    let resolved = data.resolver.resolve(query, source, user_id).await?;

    match resolved {
        Resolved::Tracks(tracks) => {
            let Some(track) = tracks.into_iter().next() else {
                return Err(Error::NoResults(query.to_string()));
            };
            enqueue(data, &session, track).await
        }
        Resolved::Playlist(playlist) => {
            let mut session = session.lock().await;
            let report = session.queue.enqueue_many(playlist.tracks);
            for (track, rejection) in &report.skipped {
                debug!("Skipped {} from playlist: {}", track.identifier(), rejection);
            }
            start_if_idle(data, &mut session).await?;
            Ok(PlayOutcome::Playlist {
                name: playlist.name,
                report,
            })
        }
    }
}

/// Queue one track (admission checked), starting it when nothing plays
pub async fn enqueue(data: &Arc<Data>, session: &SharedSession, track: Track) -> Result<PlayOutcome, Error> {
    let mut session = session.lock().await;
    let position = session
        .queue
        .enqueue(track.clone())
        .map_err(|(track, rejection)| Error::domain(format!("Cannot queue **{}**: {}", track.title(), rejection)))?;

    if start_if_idle(data, &mut session).await? {
        Ok(PlayOutcome::Started(track))
    } else {
        Ok(PlayOutcome::Queued(track, position))
    }
}

async fn start_if_idle(data: &Data, session: &mut VoiceSession) -> Result<bool, Error> {
    if session.current.is_some() || session.is_playing() {
        return Ok(false);
    }
    let Some(next) = session.queue.pop_front() else {
        return Ok(false);
    };
    let track = session.begin(next);
    send_play(data, session, &track).await?;
    Ok(true)
}

/// Join the caller's voice channel (or reuse the session), requiring the caller to be with the bot
pub async fn connect(
    ctx: &Context,
    data: &Arc<Data>,
    guild_id: GuildId,
    user_id: UserId,
    text_channel: ChannelId,
) -> Result<SharedSession, Error> {
    let session = data
        .voice
        .ensure(ctx, &data.node, guild_id, user_id, text_channel)
        .await?;
    let bound = session.lock().await.channel_id;
    if voice_channel_of(ctx, guild_id, user_id) != Some(bound) {
        return Err(Error::permission(format!("You need to be in <#{}> for that", bound)));
    }
    Ok(session)
}

/// The existing session, provided the caller listens in its channel
pub async fn listener_session(
    ctx: &Context,
    data: &Data,
    guild_id: GuildId,
    user_id: UserId,
) -> Result<SharedSession, Error> {
    let session = data
        .voice
        .get(guild_id)
        .ok_or_else(|| Error::domain("I'm not connected to a voice channel"))?;
    let user_channel = voice_channel_of(ctx, guild_id, user_id).ok_or(Error::UserNotInVoice)?;
    let bound = session.lock().await.channel_id;
    if user_channel != bound {
        return Err(Error::permission(format!("You need to be in <#{}> for that", bound)));
    }
    Ok(session)
}

fn playing(session: &VoiceSession) -> Result<&Track, Error> {
    session
        .current
        .as_ref()
        .ok_or_else(|| Error::domain("Nothing is playing right now"))
}

/// Seek to the end of the current track so the node reports it finished
pub async fn skip(data: &Data, session: &SharedSession) -> Result<Track, Error> {
    let mut session = session.lock().await;
    let track = playing(&session)?.clone();
    let update = session
        .skip_update()
        .unwrap_or_else(|| UpdatePlayer::seek(track.length_ms()));
    data.node.update_player(session.guild_id, &update).await?;
    if session.state == PlayerState::Paused {
        session.state = PlayerState::Playing;
    }
    Ok(track)
}

pub async fn pause(data: &Data, session: &SharedSession) -> Result<Track, Error> {
    let mut session = session.lock().await;
    let track = playing(&session)?.clone();
    if session.state == PlayerState::Paused {
        return Err(Error::domain("Playback is already paused"));
    }
    data.node
        .update_player(session.guild_id, &UpdatePlayer::pause(true))
        .await?;
    session.state = PlayerState::Paused;
    Ok(track)
}

pub async fn resume(data: &Data, session: &SharedSession) -> Result<Track, Error> {
    let mut session = session.lock().await;
    let track = playing(&session)?.clone();
    if session.state != PlayerState::Paused {
        return Err(Error::domain("Playback is not paused"));
    }
    data.node
        .update_player(session.guild_id, &UpdatePlayer::pause(false))
        .await?;
    session.state = PlayerState::Playing;
    Ok(track)
}

/// Clear the queue, turn autoplay off and stop the current track. Returns the dropped count.
pub async fn stop(data: &Data, session: &SharedSession) -> Result<usize, Error> {
    let mut session = session.lock().await;
    let dropped = session.stop();
    if session.current.is_some() {
        data.node
            .update_player(session.guild_id, &UpdatePlayer::stop())
            .await?;
    } else {
        session.state = PlayerState::Idle;
    }
    Ok(dropped)
}

pub async fn set_volume(data: &Data, session: &SharedSession, volume: u16) -> Result<u16, Error> {
    if volume > MAX_VOLUME {
        return Err(Error::invocation(format!("Volume must be between 0 and {}", MAX_VOLUME)));
    }
    let mut session = session.lock().await;
    data.node
        .update_player(session.guild_id, &UpdatePlayer::volume(volume))
        .await?;
    session.volume = volume;
    Ok(volume)
}

/// Explicit mode, or the next one in the cycle
pub async fn set_loop(session: &SharedSession, mode: Option<LoopMode>) -> LoopMode {
    let mut session = session.lock().await;
    session.loop_mode = mode.unwrap_or_else(|| session.loop_mode.cycle());
    session.loop_mode
}

/// Explicit state, or a toggle
pub async fn set_autoplay(session: &SharedSession, enabled: Option<bool>) -> bool {
    let mut session = session.lock().await;
    let enabled = enabled.unwrap_or(!session.autoplay);
    session.set_autoplay(enabled);
    enabled
}

/// Remove by 1-based queue position
pub async fn remove(session: &SharedSession, position: usize) -> Result<Track, Error> {
    let mut session = session.lock().await;
    let len = session.queue.len();
    if position == 0 || position > len {
        return Err(Error::invocation(format!(
            "Position must be between 1 and {}",
            len.max(1)
        )));
    }
    session
        .queue
        .remove(position - 1)
        .ok_or_else(|| Error::domain("That position is empty"))
}

pub async fn shuffle(session: &SharedSession) -> Result<usize, Error> {
    let mut session = session.lock().await;
    if session.queue.len() < 2 {
        return Err(Error::domain("Not enough tracks in the queue to shuffle"));
    }
    session.queue.shuffle();
    Ok(session.queue.len())
}

pub async fn disconnect(ctx: &Context, data: &Arc<Data>, guild_id: GuildId) -> Result<(), Error> {
    if !data.voice.dispose(ctx, &data.node, guild_id).await {
        return Err(Error::domain("I'm not connected to a voice channel"));
    }
    set_idle_presence(ctx);
    Ok(())
}

/// Dispose after the last listener left, posting a notice
pub async fn leave_empty_channel(ctx: &Context, data: &Arc<Data>, guild_id: GuildId) {
    let embed = embeds::warning_embed()
        .title("Disconnected")
        .description("Everyone left the voice channel, so I left too.");
    notify(ctx, data, guild_id, embed).await;

    if data.voice.dispose(ctx, &data.node, guild_id).await {
        set_idle_presence(ctx);
    }
}

pub fn now_playing_embed(track: &Track, position_ms: Option<u64>) -> CreateEmbed {
    let mut description = format!("**{}**\nby {}", track.display(), track.author());
    if let Some(position) = position_ms {
        description.push_str(&format!(
            "\n\n{} `{} / {}`",
            progress_bar(position, track.length_ms()),
            format_millis(position),
            format_millis(track.length_ms())
        ));
    } else {
        description.push_str(&format!("\nLength: `{}`", format_millis(track.length_ms())));
    }
    if let Some(requester) = track.requester {
        description.push_str(&format!("\nRequested by {}", mention_user(requester)));
    }

    let mut embed = embeds::music_embed().title("Now Playing").description(description);
    if let Some(artwork) = track.artwork_url() {
        embed = embed.thumbnail(artwork);
    }
    embed
}

pub fn queued_embed(outcome: &PlayOutcome) -> CreateEmbed {
    match outcome {
        PlayOutcome::Started(track) => embeds::music_embed()
            .title("Playing")
            .description(format!("**{}** `{}`", track.display(), format_millis(track.length_ms()))),
        PlayOutcome::Queued(track, position) => embeds::music_embed()
            .title("Added to queue")
            .description(format!(
                "**{}** `{}`\nPosition in queue: **{}**",
                track.display(),
                format_millis(track.length_ms()),
                position
            )),
        PlayOutcome::Playlist { name, report } => {
            let mut lines = vec![format!("**{}**", name)];
            lines.extend(playlist_report_lines(report));
            embeds::music_embed().title("Playlist queued").description(lines.join("\n"))
        }
    }
}

/// Per-track outcome lines followed by the summary, capped to fit an embed
pub fn playlist_report_lines(report: &AdmissionReport) -> Vec<String> {
    let mut lines: Vec<String> = report
        .added
        .iter()
        .map(|track| format!("{} Added {}", embeds::BULLET, truncate(track.title(), 60)))
        .chain(report.skipped.iter().map(|(track, rejection)| {
            format!("{} Skipped {}: {}", embeds::BULLET, truncate(track.title(), 60), rejection)
        }))
        .collect();

    if lines.len() > PLAYLIST_REPORT_LINES {
        let hidden = lines.len() - PLAYLIST_REPORT_LINES;
        lines.truncate(PLAYLIST_REPORT_LINES);
        lines.push(format!("...and {} more", hidden));
    }
    lines.push(report.summary());
    lines
}

/// One line per upcoming track, for the paginated queue view
pub fn queue_lines(session: &VoiceSession) -> Vec<String> {
    session
        .queue
        .iter()
        .enumerate()
        .map(|(i, track)| {
            format!(
                "`{}.` {} `{}`",
                i + 1,
                truncate(track.title(), 60),
                format_millis(track.length_ms())
            )
        })
        .collect()
}

/// Header shown on every queue page
pub fn queue_header(session: &VoiceSession) -> String {
    let current = session
        .current
        .as_ref()
        .map(|t| format!("Now: **{}**", truncate(t.title(), 80)))
        .unwrap_or_else(|| "Nothing playing".to_string());
    let total: u64 = session.queue.iter().map(|t| t.length_ms()).sum();
    format!(
        "{}\nLoop: {} {} Autoplay: {} {} {} tracks, {}",
        current,
        session.loop_mode.label(),
        embeds::BULLET,
        if session.autoplay { "on" } else { "off" },
        embeds::BULLET,
        session.queue.len(),
        format_millis(total)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::audio::track::{test_track, Rejection};

    fn session_with_queue() -> VoiceSession {
        let mut session = VoiceSession::new(GuildId::new(1), ChannelId::new(2), ChannelId::new(3));
        session.begin(test_track("now", 200_000, false));
        for id in ["a", "b"] {
            session.queue.enqueue(test_track(id, 61_000, false)).unwrap();
        }
        session
    }

    #[test]
    fn test_queue_lines_are_numbered() {
        let lines = queue_lines(&session_with_queue());
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "`1.` Track a `1:01`");
        assert!(lines[1].starts_with("`2.` Track b"));
    }

    #[test]
    fn test_queue_header_summarizes() {
        let header = queue_header(&session_with_queue());
        assert!(header.contains("Now: **Track now**"));
        assert!(header.contains("2 tracks, 2:02"));
        assert!(header.contains("Autoplay: off"));
    }

    #[test]
    fn test_playlist_report_lists_each_track_before_summary() {
        let report = AdmissionReport {
            added: vec![test_track("a", 1_000, false), test_track("b", 1_000, false)],
            skipped: vec![(test_track("live", 0, true), Rejection::Stream)],
        };
        let lines = playlist_report_lines(&report);
        assert_eq!(lines.len(), 4);
        assert!(lines[0].ends_with("Added Track a"));
        assert!(lines[1].ends_with("Added Track b"));
        assert!(lines[2].contains("Skipped Track live"));
        assert_eq!(lines[3], "Added 2, skipped 1 out of 3");
    }

    #[test]
    fn test_playlist_report_is_capped() {
        let report = AdmissionReport {
            added: (0..40).map(|i| test_track(&i.to_string(), 1_000, false)).collect(),
            skipped: Vec::new(),
        };
        let lines = playlist_report_lines(&report);
        assert_eq!(lines.len(), PLAYLIST_REPORT_LINES + 2);
        assert_eq!(lines[PLAYLIST_REPORT_LINES], format!("...and {} more", 40 - PLAYLIST_REPORT_LINES));
        assert_eq!(lines.last().unwrap(), "Added 40, skipped 0 out of 40");
    }

    #[test]
    fn test_playing_requires_current() {
        let mut session = session_with_queue();
        assert!(playing(&session).is_ok());
        session.current = None;
        assert_eq!(playing(&session).unwrap_err().kind(), crate::bot::error::ErrorKind::Domain);
    }
}
