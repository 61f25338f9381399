use dashmap::DashMap;
use serenity::all::GuildId;
use sqlx::SqlitePool;
use tracing::info;

use crate::bot::error::Error;
use crate::db::queries::prefix;

pub const MAX_PREFIX_LENGTH: usize = 5;

/// Per-guild command prefixes, kept in memory and written through to the store
pub struct PrefixRegistry {
    default: String,
    prefixes: DashMap<GuildId, String>,
}

impl PrefixRegistry {
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            default: default.into(),
            prefixes: DashMap::new(),
        }
    }

    /// Replace the in-memory map with what the store holds
    pub async fn load(&self, pool: &SqlitePool) -> Result<usize, Error> {
        let rows = prefix::get_all(pool).await?;
        self.prefixes.clear();
        for (guild_id, value) in rows {
            if guild_id > 0 {
                self.prefixes.insert(GuildId::new(guild_id as u64), value);
            }
        }
        info!("Loaded {} custom prefixes", self.prefixes.len());
        Ok(self.prefixes.len())
    }

    pub fn default_prefix(&self) -> &str {
        &self.default
    }

    pub fn get(&self, guild_id: Option<GuildId>) -> String {
        guild_id
            .and_then(|id| self.prefixes.get(&id).map(|p| p.value().clone()))
            .unwrap_or_else(|| self.default.clone())
    }

    pub async fn set(&self, pool: &SqlitePool, guild_id: GuildId, value: &str) -> Result<(), Error> {
        validate(value)?;
        if value == self.default {
            self.reset(pool, guild_id).await?;
            return Ok(());
        }
        prefix::set(pool, guild_id.get() as i64, value).await?;
        self.prefixes.insert(guild_id, value.to_string());
        Ok(())
    }

    /// Back to the default; false when the guild had no custom prefix
    pub async fn reset(&self, pool: &SqlitePool, guild_id: GuildId) -> Result<bool, Error> {
        let removed = prefix::clear(pool, guild_id.get() as i64).await?;
        self.prefixes.remove(&guild_id);
        Ok(removed)
    }
}

pub fn validate(value: &str) -> Result<(), Error> {
    if value.is_empty() || value.chars().any(char::is_whitespace) {
        return Err(Error::invocation("A prefix cannot be empty or contain spaces"));
    }
    if value.chars().count() > MAX_PREFIX_LENGTH {
        return Err(Error::invocation(format!(
            "A prefix can be at most {} characters long",
            MAX_PREFIX_LENGTH
        )));
    }
    if value.contains('`') {
        return Err(Error::invocation("A prefix cannot contain backticks"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool::test_pool;

    #[tokio::test]
    async fn test_set_then_reset_restores_default() {
        let pool = test_pool().await;
        let registry = PrefixRegistry::new("!");
        let guild = GuildId::new(10);

        registry.set(&pool, guild, "?").await.unwrap();
        assert_eq!(registry.get(Some(guild)), "?");
        assert_eq!(registry.get(Some(GuildId::new(11))), "!");
        assert_eq!(registry.get(None), "!");

        assert!(registry.reset(&pool, guild).await.unwrap());
        assert_eq!(registry.get(Some(guild)), "!");
        assert!(!registry.reset(&pool, guild).await.unwrap());
    }

    #[tokio::test]
    async fn test_load_from_store() {
        let pool = test_pool().await;
        PrefixRegistry::new("!")
            .set(&pool, GuildId::new(5), "$$")
            .await
            .unwrap();

        let fresh = PrefixRegistry::new("!");
        assert_eq!(fresh.load(&pool).await.unwrap(), 1);
        assert_eq!(fresh.get(Some(GuildId::new(5))), "$$");
    }

    #[test]
    fn test_validate() {
        assert!(validate("?").is_ok());
        assert!(validate("").is_err());
        assert!(validate("a b").is_err());
        assert!(validate("toolong").is_err());
        assert!(validate("`").is_err());
    }
}
