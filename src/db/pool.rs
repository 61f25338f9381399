use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

/// Writers queue behind SQLite's lock for up to this long
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn create_pool(path: &Path) -> Result<SqlitePool, sqlx::Error> {
    info!("Opening database at {}", path.display());

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?;

    info!("Database connection established");

    Ok(pool)
}

/// A private in-memory database. One connection, otherwise each one sees its own empty store.
pub async fn create_memory_pool() -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    info!("Running database migrations...");

    let migrations = [
        include_str!("../../migrations/001_initial_schema.sql"),
        include_str!("../../migrations/002_minigames.sql"),
        include_str!("../../migrations/003_tags.sql"),
        include_str!("../../migrations/004_user_uids.sql"),
    ];

    for (i, migration) in migrations.iter().enumerate() {
        info!("Running migration {}", i + 1);
        for statement in migration.split(';') {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            if let Err(e) = sqlx::query(statement).execute(pool).await {
                let err_str = e.to_string();
                if !err_str.contains("already exists") && !err_str.contains("duplicate column") {
                    return Err(e);
                }
            }
        }
    }

    info!("Migrations completed successfully");
    Ok(())
}

/// Fresh in-memory database with the full schema, for tests
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let pool = create_memory_pool().await.expect("in-memory pool");
    run_migrations(&pool).await.expect("migrations");
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = test_pool().await;
        run_migrations(&pool).await.unwrap();

        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN \
             ('guilds', 'users', 'custom_prefixes', 'singleplayer_games', 'twoplayers_games', 'tags', 'tag_aliases', 'user_uids')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 8);
    }
}
