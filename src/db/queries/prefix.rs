use sqlx::SqlitePool;

/// All custom prefixes, used to warm the in-memory registry
pub async fn get_all(pool: &SqlitePool) -> Result<Vec<(i64, String)>, sqlx::Error> {
    sqlx::query_as("SELECT guild_id, prefix FROM custom_prefixes")
        .fetch_all(pool)
        .await
}

pub async fn get(pool: &SqlitePool, guild_id: i64) -> Result<Option<String>, sqlx::Error> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT prefix FROM custom_prefixes WHERE guild_id = ?")
            .bind(guild_id)
            .fetch_optional(pool)
            .await?;

    Ok(row.map(|r| r.0))
}

pub async fn set(pool: &SqlitePool, guild_id: i64, prefix: &str) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO guilds (id) VALUES (?)")
        .bind(guild_id)
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO custom_prefixes (guild_id, prefix)
        VALUES (?, ?)
        ON CONFLICT (guild_id) DO UPDATE SET prefix = excluded.prefix
        "#,
    )
    .bind(guild_id)
    .bind(prefix)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn clear(pool: &SqlitePool, guild_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM custom_prefixes WHERE guild_id = ?")
        .bind(guild_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
