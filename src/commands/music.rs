use poise::serenity_prelude::Channel;
use tracing::info;

use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::commands::{guild_id, reply};
use crate::components::paginator::{paginate, pages_from_lines};
use crate::components::search_select::SearchSelectView;
use crate::constants::embeds;
use crate::constants::timeouts::SEARCH_MENU_TIMEOUT;
use crate::db::queries::guild_settings;
use crate::services::audio::controller::{self, queued_embed};
use crate::services::audio::session::MAX_VOLUME;
use crate::services::audio::{LoopMode, SharedSession, Source};
use crate::utils::formatting::mention_channel;
use crate::utils::permissions::voice_channel_of;

const QUEUE_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum Toggle {
    #[name = "on"]
    On,
    #[name = "off"]
    Off,
}

/// Split a leading catalog keyword off the query: `youtube never gonna` → (YouTube, "never gonna")
pub fn split_source(query: &str) -> (Source, &str) {
    let query = query.trim();
    if let Some((first, rest)) = query.split_once(char::is_whitespace) {
        if let Some(source) = Source::from_keyword(first) {
            return (source, rest.trim());
        }
    }
    (Source::Default, query)
}

async fn listener(ctx: Context<'_>) -> Result<SharedSession, Error> {
    let guild = guild_id(ctx)?;
    controller::listener_session(ctx.serenity_context(), ctx.data(), guild, ctx.author().id).await
}

/// Play a song or playlist. Start the query with youtube, youtubemusic or soundcloud to pick a catalog.
#[poise::command(slash_command, prefix_command, guild_only, aliases("p"), category = "Music")]
pub async fn play(
    ctx: Context<'_>,
    #[description = "Song name or URL, optionally prefixed with youtube / youtubemusic / soundcloud"]
    #[rest]
    query: String,
) -> Result<(), Error> {
    let guild = guild_id(ctx)?;
    let (source, query) = split_source(&query);
    ctx.defer().await?;

    let outcome = controller::play(
        ctx.serenity_context(),
        ctx.data(),
        guild,
        ctx.author().id,
        ctx.channel_id(),
        query,
        source,
    )
    .await?;

    let embed = queued_embed(&outcome).footer(embeds::requested_by(&ctx.author().name));
    reply(ctx, embed).await
}

/// Search YouTube and SoundCloud and pick a result from a menu
#[poise::command(slash_command, prefix_command, guild_only, category = "Music")]
pub async fn search(
    ctx: Context<'_>,
    #[description = "What to search for"]
    #[rest]
    query: String,
) -> Result<(), Error> {
    let guild = guild_id(ctx)?;
    if voice_channel_of(ctx.serenity_context(), guild, ctx.author().id).is_none() {
        return Err(Error::UserNotInVoice);
    }
    ctx.defer().await?;

    let choices = ctx
        .data()
        .resolver
        .search_choices(&query, ctx.author().id)
        .await?;
    let view = SearchSelectView::new(query, choices, guild, ctx.channel_id());
    ctx.data()
        .ui
        .start(ctx, Box::new(view), SEARCH_MENU_TIMEOUT)
        .await?;
    Ok(())
}

#[poise::command(slash_command, prefix_command, guild_only, category = "Music")]
pub async fn pause(ctx: Context<'_>) -> Result<(), Error> {
    let session = listener(ctx).await?;
    let track = controller::pause(ctx.data(), &session).await?;
    reply(ctx, embeds::music_embed().description(format!("Paused **{}**", track.display()))).await
}

#[poise::command(slash_command, prefix_command, guild_only, category = "Music")]
pub async fn resume(ctx: Context<'_>) -> Result<(), Error> {
    let session = listener(ctx).await?;
    let track = controller::resume(ctx.data(), &session).await?;
    reply(ctx, embeds::music_embed().description(format!("Resumed **{}**", track.display()))).await
}

/// Skip the current track
#[poise::command(slash_command, prefix_command, guild_only, aliases("s"), category = "Music")]
pub async fn skip(ctx: Context<'_>) -> Result<(), Error> {
    let session = listener(ctx).await?;
    let track = controller::skip(ctx.data(), &session).await?;
    let emoji = ctx.data().emojis.skipped;
    reply(
        ctx,
        embeds::music_embed().description(format!("{} Skipped **{}**", emoji, track.display())),
    )
    .await
}

/// Stop playback, clear the queue and turn autoplay off
#[poise::command(slash_command, prefix_command, guild_only, category = "Music")]
pub async fn stop(ctx: Context<'_>) -> Result<(), Error> {
    let session = listener(ctx).await?;
    let dropped = controller::stop(ctx.data(), &session).await?;
    reply(
        ctx,
        embeds::music_embed().description(format!("Stopped. Cleared {} queued tracks.", dropped)),
    )
    .await
}

/// Show the queue
#[poise::command(slash_command, prefix_command, guild_only, aliases("q"), category = "Music")]
pub async fn queue(ctx: Context<'_>) -> Result<(), Error> {
    let guild = guild_id(ctx)?;
    let session = ctx
        .data()
        .voice
        .get(guild)
        .ok_or_else(|| Error::domain("I'm not connected to a voice channel"))?;

    let (header, lines) = {
        let session = session.lock().await;
        (controller::queue_header(&session), controller::queue_lines(&session))
    };

    if lines.is_empty() {
        let embed = embeds::music_embed()
            .title("Queue")
            .description(format!("{}\n\nThe queue is empty.", header));
        return reply(ctx, embed).await;
    }

    let pages = pages_from_lines("Queue", &lines, QUEUE_PAGE_SIZE, || {
        embeds::music_embed().field("Status", header.clone(), false)
    });
    paginate(ctx, pages).await
}

/// Show the current track with its progress
#[poise::command(slash_command, prefix_command, guild_only, aliases("np"), category = "Music")]
pub async fn nowplaying(ctx: Context<'_>) -> Result<(), Error> {
    let guild = guild_id(ctx)?;
    let session = ctx
        .data()
        .voice
        .get(guild)
        .ok_or_else(|| Error::domain("Nothing is playing right now"))?;

    let embed = {
        let session = session.lock().await;
        let track = session
            .current
            .as_ref()
            .ok_or_else(|| Error::domain("Nothing is playing right now"))?;
        controller::now_playing_embed(track, Some(session.position_ms))
    };
    reply(ctx, embed).await
}

/// Remove a track from the queue by its position
#[poise::command(slash_command, prefix_command, guild_only, category = "Music")]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "Position in the queue"]
    #[min = 1]
    position: usize,
) -> Result<(), Error> {
    let session = listener(ctx).await?;
    let track = controller::remove(&session, position).await?;
    reply(
        ctx,
        embeds::music_embed().description(format!("Removed **{}** from the queue", track.display())),
    )
    .await
}

/// Set the loop mode, or cycle off → track → queue
#[poise::command(slash_command, prefix_command, guild_only, rename = "loop", category = "Music")]
pub async fn loop_mode(
    ctx: Context<'_>,
    #[description = "Loop mode"] mode: Option<LoopMode>,
) -> Result<(), Error> {
    let session = listener(ctx).await?;
    let mode = controller::set_loop(&session, mode).await;
    reply(ctx, embeds::music_embed().description(format!("Loop: **{}**", mode.label()))).await
}

/// Join your voice channel
#[poise::command(slash_command, prefix_command, guild_only, aliases("join"), category = "Music")]
pub async fn connect(ctx: Context<'_>) -> Result<(), Error> {
    let guild = guild_id(ctx)?;
    let session = controller::connect(
        ctx.serenity_context(),
        ctx.data(),
        guild,
        ctx.author().id,
        ctx.channel_id(),
    )
    .await?;
    let channel = session.lock().await.channel_id;
    reply(
        ctx,
        embeds::success_embed().description(format!("Connected to {}", mention_channel(channel.get()))),
    )
    .await
}

/// Leave the voice channel and clear the queue
#[poise::command(slash_command, prefix_command, guild_only, aliases("leave"), category = "Music")]
pub async fn disconnect(ctx: Context<'_>) -> Result<(), Error> {
    let guild = guild_id(ctx)?;
    listener(ctx).await?;
    controller::disconnect(ctx.serenity_context(), ctx.data(), guild).await?;
    reply(ctx, embeds::info_embed().description("Disconnected")).await
}

/// Keep playing related tracks once the queue runs out
#[poise::command(slash_command, prefix_command, guild_only, category = "Music")]
pub async fn autoplay(
    ctx: Context<'_>,
    #[description = "Turn autoplay on or off; toggles when omitted"] state: Option<Toggle>,
) -> Result<(), Error> {
    let session = listener(ctx).await?;
    let enabled = controller::set_autoplay(&session, state.map(|s| s == Toggle::On)).await;
    reply(
        ctx,
        embeds::music_embed().description(format!(
            "Autoplay is now **{}**",
            if enabled { "on" } else { "off" }
        )),
    )
    .await
}

#[poise::command(slash_command, prefix_command, guild_only, aliases("vol"), category = "Music")]
pub async fn volume(
    ctx: Context<'_>,
    #[description = "Volume from 0 to 150"]
    #[max = 150]
    level: u16,
) -> Result<(), Error> {
    if level > MAX_VOLUME {
        return Err(Error::invocation(format!("Volume must be between 0 and {}", MAX_VOLUME)));
    }
    let session = listener(ctx).await?;
    let level = controller::set_volume(ctx.data(), &session, level).await?;
    reply(ctx, embeds::music_embed().description(format!("Volume set to **{}%**", level))).await
}

#[poise::command(slash_command, prefix_command, guild_only, category = "Music")]
pub async fn shuffle(ctx: Context<'_>) -> Result<(), Error> {
    let session = listener(ctx).await?;
    let count = controller::shuffle(&session).await?;
    reply(ctx, embeds::music_embed().description(format!("Shuffled {} tracks", count))).await
}

/// Choose where now-playing notifications are posted
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    rename = "musicchannel",
    subcommands("musicchannel_set", "musicchannel_clear"),
    subcommand_required,
    required_permissions = "MANAGE_GUILD",
    category = "Music"
)]
pub async fn musicchannel(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Post music notifications in this channel
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    rename = "set",
    required_permissions = "MANAGE_GUILD"
)]
pub async fn musicchannel_set(
    ctx: Context<'_>,
    #[description = "Text channel for now-playing messages"]
    #[channel_types("Text")]
    channel: Channel,
) -> Result<(), Error> {
    let guild = guild_id(ctx)?;
    let url = controller::create_music_webhook(ctx.serenity_context(), channel.id()).await?;
    guild_settings::set_music_channel(
        &ctx.data().pool,
        guild.get() as i64,
        channel.id().get() as i64,
        &url,
    )
    .await?;
    info!("Music channel for guild {} set to {}", guild, channel.id());

    reply(
        ctx,
        embeds::success_embed()
            .title("Music Channel Set")
            .description(format!(
                "Now-playing messages will be posted in {}",
                mention_channel(channel.id().get())
            )),
    )
    .await
}

/// Go back to posting where playback was started
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    rename = "clear",
    required_permissions = "MANAGE_GUILD"
)]
pub async fn musicchannel_clear(ctx: Context<'_>) -> Result<(), Error> {
    let guild = guild_id(ctx)?;
    guild_settings::clear_music_channel(&ctx.data().pool, guild.get() as i64).await?;
    reply(
        ctx,
        embeds::success_embed().description("Music channel cleared"),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_source() {
        assert_eq!(split_source("youtube never gonna"), (Source::YouTube, "never gonna"));
        assert_eq!(split_source("sc  lofi beats "), (Source::SoundCloud, "lofi beats"));
        assert_eq!(split_source("never gonna"), (Source::Default, "never gonna"));
        assert_eq!(split_source("soundcloud"), (Source::Default, "soundcloud"));
        assert_eq!(
            split_source("https://youtu.be/dQw4w9WgXcQ"),
            (Source::Default, "https://youtu.be/dQw4w9WgXcQ")
        );
    }
}
