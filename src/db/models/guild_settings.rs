#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GuildSettings {
    pub guild_id: i64,
    pub music_channel_id: Option<i64>,
    pub music_webhook_url: Option<String>,
}

impl GuildSettings {
    /// Webhook of the designated music channel, if one is configured
    pub fn music_webhook(&self) -> Option<&str> {
        self.music_channel_id
            .and(self.music_webhook_url.as_deref())
    }
}
