use sqlx::SqlitePool;

use crate::db::models::GuildSettings;

pub async fn get(pool: &SqlitePool, guild_id: i64) -> Result<Option<GuildSettings>, sqlx::Error> {
    sqlx::query_as::<_, GuildSettings>(
        "SELECT guild_id, music_channel_id, music_webhook_url FROM guild_settings WHERE guild_id = ?",
    )
    .bind(guild_id)
    .fetch_optional(pool)
    .await
}

pub async fn set_music_channel(
    pool: &SqlitePool,
    guild_id: i64,
    channel_id: i64,
    webhook_url: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO guilds (id) VALUES (?)")
        .bind(guild_id)
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO guild_settings (guild_id, music_channel_id, music_webhook_url, updated_at)
        VALUES (?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT (guild_id) DO UPDATE SET
            music_channel_id = excluded.music_channel_id,
            music_webhook_url = excluded.music_webhook_url,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(guild_id)
    .bind(channel_id)
    .bind(webhook_url)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn clear_music_channel(pool: &SqlitePool, guild_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE guild_settings
        SET music_channel_id = NULL, music_webhook_url = NULL, updated_at = CURRENT_TIMESTAMP
        WHERE guild_id = ?
        "#,
    )
    .bind(guild_id)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool::test_pool;

    #[tokio::test]
    async fn test_music_channel_set_and_clear() {
        let pool = test_pool().await;
        assert!(get(&pool, 1).await.unwrap().is_none());

        set_music_channel(&pool, 1, 42, "https://example.invalid/hook").await.unwrap();
        let settings = get(&pool, 1).await.unwrap().unwrap();
        assert_eq!(settings.music_channel_id, Some(42));
        assert_eq!(settings.music_webhook(), Some("https://example.invalid/hook"));

        clear_music_channel(&pool, 1).await.unwrap();
        let settings = get(&pool, 1).await.unwrap().unwrap();
        assert!(settings.music_webhook().is_none());
    }
}
