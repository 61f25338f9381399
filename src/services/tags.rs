//! Guild tags: named snippets of text, reachable by name or alias.

use sqlx::SqlitePool;
use tracing::info;

use crate::bot::error::Error;
use crate::db::models::Tag;
use crate::db::queries::tags;
use crate::utils::formatting::{sanitize_mentions, truncate};

pub const MAX_NAME_LENGTH: usize = 50;
pub const MAX_CONTENT_LENGTH: usize = 2000;
pub const PREVIEW_LENGTH: usize = 100;

/// Subcommand names a tag may not shadow
const RESERVED_NAMES: &[&str] = &["get", "create", "delete", "alias", "info", "list"];

/// Takes the write lock up front so the free-name check and the insert cannot interleave
const CLAIM_NAME: &str = "BEGIN IMMEDIATE";

/// Lowercase, strip quotes and surrounding whitespace, then check what is left
pub fn normalize_name(raw: &str) -> Result<String, Error> {
    let name: String = raw
        .chars()
        .filter(|c| !matches!(c, '"' | '\'' | '`'))
        .collect::<String>()
        .trim()
        .to_lowercase();

    if name.is_empty() {
        return Err(Error::invocation("Tag names cannot be empty"));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(Error::invocation(format!(
            "Tag names can be at most {} characters",
            MAX_NAME_LENGTH
        )));
    }
    if RESERVED_NAMES.contains(&name.as_str()) {
        return Err(Error::domain(format!("`{}` is a reserved name", name)));
    }
    Ok(name)
}

fn check_free_name(name: &str, prefix: &str) -> Result<(), Error> {
    if name == prefix.to_lowercase() {
        return Err(Error::TagCollision(name.to_string()));
    }
    Ok(())
}

fn collision(name: &str) -> impl FnOnce(sqlx::Error) -> Error + '_ {
    move |e| {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return Error::TagCollision(name.to_string());
            }
        }
        Error::Database(e)
    }
}

/// Content of a tag or aliased tag; counts as a use
pub async fn get(pool: &SqlitePool, guild_id: i64, name: &str) -> Result<Tag, Error> {
    let name = normalize_name(name)?;
    let mut tag = tags::resolve(pool, guild_id, &name)
        .await?
        .ok_or_else(|| Error::TagNotFound(name.clone()))?;

    tags::increment_uses(pool, guild_id, &tag.name).await?;
    tag.uses += 1;
    Ok(tag)
}

pub async fn create(
    pool: &SqlitePool,
    guild_id: i64,
    owner: i64,
    name: &str,
    content: &str,
    prefix: &str,
) -> Result<Tag, Error> {
    let name = normalize_name(name)?;
    check_free_name(&name, prefix)?;

    let content = sanitize_mentions(content.trim());
    if content.is_empty() {
        return Err(Error::invocation("Tag content cannot be empty"));
    }
    if content.chars().count() > MAX_CONTENT_LENGTH {
        return Err(Error::invocation(format!(
            "Tag content can be at most {} characters",
            MAX_CONTENT_LENGTH
        )));
    }

    let mut tx = pool.begin_with(CLAIM_NAME).await?;
    if tags::is_taken(&mut *tx, guild_id, &name).await? {
        return Err(Error::TagCollision(name));
    }
    let tag = tags::insert_tag(&mut *tx, guild_id, owner, &name, &content)
        .await
        .map_err(collision(&name))?;
    tx.commit().await?;
    info!("Tag {:?} created in guild {} by {}", tag.name, guild_id, owner);
    Ok(tag)
}

/// Point `alias` at the tag `target` resolves to
pub async fn alias(
    pool: &SqlitePool,
    guild_id: i64,
    caller: i64,
    alias: &str,
    target: &str,
    prefix: &str,
) -> Result<Tag, Error> {
    let alias = normalize_name(alias)?;
    let target = normalize_name(target)?;
    check_free_name(&alias, prefix)?;

    let tag = tags::resolve(pool, guild_id, &target)
        .await?
        .ok_or(Error::TagNotFound(target))?;

    let mut tx = pool.begin_with(CLAIM_NAME).await?;
    if tags::is_taken(&mut *tx, guild_id, &alias).await? {
        return Err(Error::TagCollision(alias));
    }
    tags::insert_alias(&mut *tx, &tag, &alias, caller)
        .await
        .map_err(collision(&alias))?;
    tx.commit().await?;
    Ok(tag)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deleted {
    Tag { name: String, aliases: i64 },
    Alias { alias: String, target: String },
}

/// Owners delete their own tags; `privileged` callers delete anything
pub async fn delete(
    pool: &SqlitePool,
    guild_id: i64,
    caller: i64,
    privileged: bool,
    name: &str,
) -> Result<Deleted, Error> {
    let name = normalize_name(name)?;

    if let Some(tag) = tags::get_tag(pool, guild_id, &name).await? {
        if tag.owner != caller && !privileged {
            return Err(Error::permission("You can only delete tags you own"));
        }
        let aliases = tags::count_aliases(pool, guild_id, &name).await?;
        tags::delete_tag(pool, guild_id, &name).await?;
        info!("Tag {:?} deleted in guild {} with {} aliases", name, guild_id, aliases);
        return Ok(Deleted::Tag { name, aliases });
    }

    if let Some(alias) = tags::get_alias(pool, guild_id, &name).await? {
        if alias.owner != caller && alias.created_by != caller && !privileged {
            return Err(Error::permission("You can only delete aliases you own"));
        }
        tags::delete_alias(pool, guild_id, &name).await?;
        return Ok(Deleted::Alias {
            alias: name,
            target: alias.name,
        });
    }

    Err(Error::TagNotFound(name))
}

#[derive(Debug, Clone)]
pub struct TagInfo {
    pub name: String,
    pub owner: i64,
    pub preview: String,
    pub uses: i64,
    pub aliases: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Set when the lookup went through an alias
    pub via_alias: Option<String>,
}

pub async fn info(pool: &SqlitePool, guild_id: i64, name: &str) -> Result<TagInfo, Error> {
    let name = normalize_name(name)?;
    let tag = tags::resolve(pool, guild_id, &name)
        .await?
        .ok_or_else(|| Error::TagNotFound(name.clone()))?;
    let aliases = tags::count_aliases(pool, guild_id, &tag.name).await?;

    Ok(TagInfo {
        via_alias: (tag.name != name).then_some(name),
        owner: tag.owner,
        preview: truncate(&tag.content, PREVIEW_LENGTH),
        uses: tag.uses,
        aliases,
        created_at: tag.created_at,
        name: tag.name,
    })
}

pub async fn list(pool: &SqlitePool, guild_id: i64, owner: Option<i64>) -> Result<Vec<Tag>, Error> {
    Ok(tags::list(pool, guild_id, owner).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::error::ErrorKind;
    use crate::db::pool::test_pool;

    const GUILD: i64 = 1;
    const ALICE: i64 = 100;
    const BOB: i64 = 200;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  \"Hello\" ").unwrap(), "hello");
        assert_eq!(normalize_name("it's").unwrap(), "its");
        assert!(normalize_name("''").is_err());
        assert!(normalize_name("create").is_err());
        assert!(normalize_name(&"x".repeat(51)).is_err());
    }

    #[tokio::test]
    async fn test_alias_resolution_and_cascade() {
        let pool = test_pool().await;
        create(&pool, GUILD, ALICE, "hello", "world", "!").await.unwrap();
        alias(&pool, GUILD, ALICE, "hi", "hello", "!").await.unwrap();

        assert_eq!(get(&pool, GUILD, "hi").await.unwrap().content, "world");
        assert_eq!(get(&pool, GUILD, "HELLO").await.unwrap().uses, 2);

        let deleted = delete(&pool, GUILD, ALICE, false, "hello").await.unwrap();
        assert_eq!(
            deleted,
            Deleted::Tag {
                name: "hello".into(),
                aliases: 1
            }
        );
        assert!(matches!(get(&pool, GUILD, "hi").await, Err(Error::TagNotFound(_))));
        let mut conn = pool.acquire().await.unwrap();
        assert!(!tags::is_taken(&mut *conn, GUILD, "hi").await.unwrap());
    }

    #[tokio::test]
    async fn test_names_are_unique_across_tags_and_aliases() {
        let pool = test_pool().await;
        create(&pool, GUILD, ALICE, "rules", "be nice", "!").await.unwrap();

        let dup = create(&pool, GUILD, BOB, "Rules", "other", "!").await;
        assert!(matches!(dup, Err(Error::TagCollision(_))));

        alias(&pool, GUILD, BOB, "r", "rules", "!").await.unwrap();
        assert!(matches!(
            create(&pool, GUILD, BOB, "r", "x", "!").await,
            Err(Error::TagCollision(_))
        ));
        assert!(matches!(
            alias(&pool, GUILD, BOB, "rules", "r", "!").await,
            Err(Error::TagCollision(_))
        ));

        // Other guilds are independent
        create(&pool, 2, BOB, "rules", "elsewhere", "!").await.unwrap();
    }

    #[tokio::test]
    async fn test_prefix_collision_and_sanitizing() {
        let pool = test_pool().await;
        assert!(matches!(
            create(&pool, GUILD, ALICE, "!", "x", "!").await,
            Err(Error::TagCollision(_))
        ));

        let tag = create(&pool, GUILD, ALICE, "ping", "hey @everyone", "!").await.unwrap();
        assert_ne!(tag.content, "hey @everyone");
        assert!(tag.content.starts_with("hey @"));
    }

    #[tokio::test]
    async fn test_delete_permissions() {
        let pool = test_pool().await;
        create(&pool, GUILD, ALICE, "mine", "content", "!").await.unwrap();

        let denied = delete(&pool, GUILD, BOB, false, "mine").await.unwrap_err();
        assert_eq!(denied.kind(), ErrorKind::Permission);

        alias(&pool, GUILD, BOB, "yours", "mine", "!").await.unwrap();
        assert_eq!(
            delete(&pool, GUILD, BOB, false, "yours").await.unwrap(),
            Deleted::Alias {
                alias: "yours".into(),
                target: "mine".into()
            }
        );

        assert!(delete(&pool, GUILD, BOB, true, "mine").await.is_ok());
        assert!(matches!(
            delete(&pool, GUILD, BOB, true, "mine").await,
            Err(Error::TagNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_info_and_list() {
        let pool = test_pool().await;
        create(&pool, GUILD, ALICE, "long", &"a".repeat(300), "!").await.unwrap();
        create(&pool, GUILD, BOB, "short", "b", "!").await.unwrap();
        alias(&pool, GUILD, BOB, "l", "long", "!").await.unwrap();

        let info = info(&pool, GUILD, "l").await.unwrap();
        assert_eq!(info.name, "long");
        assert_eq!(info.via_alias.as_deref(), Some("l"));
        assert_eq!(info.owner, ALICE);
        assert_eq!(info.aliases, 1);
        assert!(info.preview.chars().count() <= PREVIEW_LENGTH);

        assert_eq!(list(&pool, GUILD, None).await.unwrap().len(), 2);
        assert_eq!(list(&pool, GUILD, Some(BOB)).await.unwrap()[0].name, "short");
    }

    #[tokio::test]
    async fn test_concurrent_tag_and_alias_claim_one_name() {
        let scratch = tempfile::tempdir().unwrap();
        let pool = crate::db::pool::create_pool(&scratch.path().join("tags.db"))
            .await
            .unwrap();
        crate::db::pool::run_migrations(&pool).await.unwrap();
        create(&pool, GUILD, ALICE, "rules", "be nice", "!").await.unwrap();

        for round in 0..10 {
            let name = format!("n{}", round);
            let (tag, alias) = tokio::join!(
                create(&pool, GUILD, BOB, &name, "text", "!"),
                alias(&pool, GUILD, BOB, &name, "rules", "!"),
            );
            assert!(
                tag.is_ok() != alias.is_ok(),
                "exactly one claim of {} must win",
                name
            );
            let loser = if tag.is_ok() { alias.err() } else { tag.err() };
            assert!(matches!(loser, Some(Error::TagCollision(_))));
        }
    }
}
