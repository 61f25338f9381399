use std::sync::Arc;

use serenity::all::{ChannelId, Context, GuildId, VoiceState};
use tracing::{debug, info};

use crate::bot::data::Data;
use crate::bot::error::Error;
use crate::services::audio::controller;
use crate::utils::permissions::human_listeners;

pub async fn handle_voice_state_update(
    ctx: &Context,
    data: &Arc<Data>,
    old: Option<&VoiceState>,
    new: &VoiceState,
) -> Result<(), Error> {
    let guild_id = match new.guild_id {
        Some(id) => id,
        None => return Ok(()), // DM voice states are not supported
    };

    let Some(session) = data.voice.get(guild_id) else {
        return Ok(());
    };

    let old_channel = old.and_then(|o| o.channel_id);
    let new_channel = new.channel_id;
    if old_channel == new_channel {
        // Mute, deafen or stream toggles
        return Ok(());
    }

    if new.user_id == ctx.cache.current_user().id {
        match new_channel {
            None => {
                // Kicked or disconnected by someone else
                info!("Bot was disconnected from voice in guild {}", guild_id);
                data.voice.dispose(ctx, &data.node, guild_id).await;
                controller::set_idle_presence(ctx);
            }
            Some(channel_id) => {
                info!("Bot was moved to channel {} in guild {}", channel_id, guild_id);
                session.lock().await.channel_id = channel_id;
                check_empty(ctx, data, guild_id, channel_id).await;
            }
        }
        return Ok(());
    }

    let bound = session.lock().await.channel_id;
    if old_channel == Some(bound) {
        debug!("User {} left the bound channel {}", new.user_id, bound);
        check_empty(ctx, data, guild_id, bound).await;
    }

    Ok(())
}

async fn check_empty(ctx: &Context, data: &Arc<Data>, guild_id: GuildId, channel_id: ChannelId) {
    if human_listeners(ctx, guild_id, channel_id) == 0 {
        info!("Voice channel {} in guild {} is empty, leaving", channel_id, guild_id);
        controller::leave_empty_channel(ctx, data, guild_id).await;
    }
}
