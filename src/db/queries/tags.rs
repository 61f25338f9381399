use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::db::models::{Tag, TagAlias};

const TAG_COLUMNS: &str = "guild_id, owner, name, content, created_at, uses";

pub async fn get_tag(pool: &SqlitePool, guild_id: i64, name: &str) -> Result<Option<Tag>, sqlx::Error> {
    sqlx::query_as::<_, Tag>(&format!(
        "SELECT {} FROM tags WHERE guild_id = ? AND name = ?",
        TAG_COLUMNS
    ))
    .bind(guild_id)
    .bind(name)
    .fetch_optional(pool)
    .await
}

pub async fn get_alias(
    pool: &SqlitePool,
    guild_id: i64,
    alias: &str,
) -> Result<Option<TagAlias>, sqlx::Error> {
    sqlx::query_as::<_, TagAlias>(
        "SELECT guild_id, owner, name, alias, created_by, created_at FROM tag_aliases WHERE guild_id = ? AND alias = ?",
    )
    .bind(guild_id)
    .bind(alias)
    .fetch_optional(pool)
    .await
}

/// Resolve a name as a tag, falling back to an alias
pub async fn resolve(pool: &SqlitePool, guild_id: i64, name: &str) -> Result<Option<Tag>, sqlx::Error> {
    sqlx::query_as::<_, Tag>(
        r#"
        SELECT t.guild_id, t.owner, t.name, t.content, t.created_at, t.uses
        FROM tags t
        WHERE t.guild_id = ?1 AND t.name = ?2
        UNION ALL
        SELECT t.guild_id, t.owner, t.name, t.content, t.created_at, t.uses
        FROM tag_aliases a
        JOIN tags t ON t.guild_id = a.guild_id AND t.owner = a.owner AND t.name = a.name
        WHERE a.guild_id = ?1 AND a.alias = ?2
        LIMIT 1
        "#,
    )
    .bind(guild_id)
    .bind(name)
    .fetch_optional(pool)
    .await
}

/// Whether `name` is already used by a tag or an alias in the guild
/// Whether `name` is used by a tag or an alias. Run it on the connection that inserts.
pub async fn is_taken(conn: &mut SqliteConnection, guild_id: i64, name: &str) -> Result<bool, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT (SELECT COUNT(*) FROM tags WHERE guild_id = ?1 AND name = ?2)
             + (SELECT COUNT(*) FROM tag_aliases WHERE guild_id = ?1 AND alias = ?2)
        "#,
    )
    .bind(guild_id)
    .bind(name)
    .fetch_one(conn)
    .await?;

    Ok(count > 0)
}

pub async fn insert_tag(
    conn: &mut SqliteConnection,
    guild_id: i64,
    owner: i64,
    name: &str,
    content: &str,
) -> Result<Tag, sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO guilds (id) VALUES (?)")
        .bind(guild_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query_as::<_, Tag>(&format!(
        "INSERT INTO tags (guild_id, owner, name, content, created_at, uses) VALUES (?, ?, ?, ?, ?, 0) RETURNING {}",
        TAG_COLUMNS
    ))
    .bind(guild_id)
    .bind(owner)
    .bind(name)
    .bind(content)
    .bind(Utc::now())
    .fetch_one(conn)
    .await
}

pub async fn insert_alias(
    conn: &mut SqliteConnection,
    tag: &Tag,
    alias: &str,
    created_by: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO tag_aliases (guild_id, owner, name, alias, created_by, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(tag.guild_id)
    .bind(tag.owner)
    .bind(&tag.name)
    .bind(alias)
    .bind(created_by)
    .bind(Utc::now())
    .execute(conn)
    .await?;

    Ok(())
}

/// Delete a tag; its aliases go with it through the foreign key
pub async fn delete_tag(pool: &SqlitePool, guild_id: i64, name: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM tags WHERE guild_id = ? AND name = ?")
        .bind(guild_id)
        .bind(name)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

pub async fn delete_alias(pool: &SqlitePool, guild_id: i64, alias: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM tag_aliases WHERE guild_id = ? AND alias = ?")
        .bind(guild_id)
        .bind(alias)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

pub async fn count_aliases(pool: &SqlitePool, guild_id: i64, name: &str) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM tag_aliases WHERE guild_id = ? AND name = ?")
            .bind(guild_id)
            .bind(name)
            .fetch_one(pool)
            .await?;

    Ok(count)
}

pub async fn increment_uses(pool: &SqlitePool, guild_id: i64, name: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE tags SET uses = uses + 1 WHERE guild_id = ? AND name = ?")
        .bind(guild_id)
        .bind(name)
        .execute(pool)
        .await?;

    Ok(())
}

/// Tags of a guild, optionally restricted to one owner, most used first
pub async fn list(
    pool: &SqlitePool,
    guild_id: i64,
    owner: Option<i64>,
) -> Result<Vec<Tag>, sqlx::Error> {
    sqlx::query_as::<_, Tag>(&format!(
        "SELECT {} FROM tags WHERE guild_id = ?1 AND (?2 IS NULL OR owner = ?2) ORDER BY uses DESC, name ASC",
        TAG_COLUMNS
    ))
    .bind(guild_id)
    .bind(owner)
    .fetch_all(pool)
    .await
}
