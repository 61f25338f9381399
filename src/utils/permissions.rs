use serenity::all::{ChannelId, Context, GuildId, Permissions, UserId};

/// Check if a member has a specific permission
pub async fn has_permission(
    ctx: &Context,
    guild_id: GuildId,
    user_id: UserId,
    permission: Permissions,
) -> bool {
    let Ok(member) = guild_id.member(ctx, user_id).await else {
        return false;
    };
    let Some(guild) = ctx.cache.guild(guild_id) else {
        return false;
    };

    let permissions = guild.member_permissions(&member);
    permissions.administrator() || permissions.contains(permission)
}

/// Manage-guild permission, which unlocks deleting other users' tags and guild settings
pub async fn can_manage_guild(ctx: &Context, guild_id: GuildId, user_id: UserId) -> bool {
    has_permission(ctx, guild_id, user_id, Permissions::MANAGE_GUILD).await
}

/// Voice channel the user currently sits in, from the gateway cache
pub fn voice_channel_of(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = ctx.cache.guild(guild_id)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|state| state.channel_id)
}

/// Non-bot members currently connected to a voice channel
pub fn human_listeners(ctx: &Context, guild_id: GuildId, channel_id: ChannelId) -> usize {
    let Some(guild) = ctx.cache.guild(guild_id) else {
        return 0;
    };

    guild
        .voice_states
        .values()
        .filter(|state| state.channel_id == Some(channel_id))
        .filter(|state| {
            let is_bot = state
                .member
                .as_ref()
                .map(|m| m.user.bot)
                .or_else(|| ctx.cache.user(state.user_id).map(|u| u.bot))
                .unwrap_or(false);
            !is_bot
        })
        .count()
}
