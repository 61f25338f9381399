use sqlx::SqlitePool;

use crate::db::models::{GameTally, LeaderboardEntry, SinglePlayerGame, TwoPlayerTotals};

/// Record a freshly started single-player game (`win` stays NULL until it ends)
pub async fn insert_singleplayer(
    pool: &SqlitePool,
    game_id: i64,
    game_name: &str,
    user_id: i64,
    attempts: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO users (id) VALUES (?)")
        .bind(user_id)
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO singleplayer_games (game_id, game_name, user_id, attempts, win, created_at)
        VALUES (?, ?, ?, ?, NULL, CURRENT_TIMESTAMP)
        ON CONFLICT (game_id) DO NOTHING
        "#,
    )
    .bind(game_id)
    .bind(game_name)
    .bind(user_id)
    .bind(attempts)
    .execute(pool)
    .await?;

    Ok(())
}

/// Persist the state after a guess or when the game ends
pub async fn update_singleplayer(
    pool: &SqlitePool,
    game_id: i64,
    attempts: i64,
    win: Option<bool>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE singleplayer_games SET attempts = ?, win = ? WHERE game_id = ?")
        .bind(attempts)
        .bind(win)
        .bind(game_id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn get_singleplayer(
    pool: &SqlitePool,
    game_id: i64,
) -> Result<Option<SinglePlayerGame>, sqlx::Error> {
    sqlx::query_as::<_, SinglePlayerGame>(
        "SELECT game_id, game_name, user_id, attempts, win, created_at FROM singleplayer_games WHERE game_id = ?",
    )
    .bind(game_id)
    .fetch_optional(pool)
    .await
}

pub async fn insert_twoplayer(
    pool: &SqlitePool,
    game_id: i64,
    game_name: &str,
    player1_id: i64,
    player2_id: i64,
    winner_id: Option<i64>,
) -> Result<(), sqlx::Error> {
    for user_id in [player1_id, player2_id] {
        sqlx::query("INSERT OR IGNORE INTO users (id) VALUES (?)")
            .bind(user_id)
            .execute(pool)
            .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO twoplayers_games (game_id, game_name, player1_id, player2_id, winner_id, created_at)
        VALUES (?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT (game_id) DO NOTHING
        "#,
    )
    .bind(game_id)
    .bind(game_name)
    .bind(player1_id)
    .bind(player2_id)
    .bind(winner_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Plays, wins and losses per single-player game across everyone
pub async fn singleplayer_totals(pool: &SqlitePool) -> Result<Vec<GameTally>, sqlx::Error> {
    sqlx::query_as::<_, GameTally>(
        r#"
        SELECT game_name,
               COUNT(*) AS played,
               SUM(CASE WHEN win = 1 THEN 1 ELSE 0 END) AS wins,
               SUM(CASE WHEN win = 0 THEN 1 ELSE 0 END) AS losses
        FROM singleplayer_games
        GROUP BY game_name
        ORDER BY game_name
        "#,
    )
    .fetch_all(pool)
    .await
}

pub async fn twoplayer_totals(pool: &SqlitePool) -> Result<Vec<TwoPlayerTotals>, sqlx::Error> {
    sqlx::query_as::<_, TwoPlayerTotals>(
        r#"
        SELECT game_name,
               COUNT(*) AS played,
               SUM(CASE WHEN winner_id IS NULL THEN 1 ELSE 0 END) AS draws
        FROM twoplayers_games
        GROUP BY game_name
        ORDER BY game_name
        "#,
    )
    .fetch_all(pool)
    .await
}

/// One user's record in every game they played
pub async fn user_tallies(pool: &SqlitePool, user_id: i64) -> Result<Vec<GameTally>, sqlx::Error> {
    sqlx::query_as::<_, GameTally>(
        r#"
        SELECT game_name,
               COUNT(*) AS played,
               SUM(CASE WHEN win = 1 THEN 1 ELSE 0 END) AS wins,
               SUM(CASE WHEN win = 0 THEN 1 ELSE 0 END) AS losses
        FROM singleplayer_games
        WHERE user_id = ?1
        GROUP BY game_name
        UNION ALL
        SELECT game_name,
               COUNT(*) AS played,
               SUM(CASE WHEN winner_id = ?1 THEN 1 ELSE 0 END) AS wins,
               SUM(CASE WHEN winner_id IS NOT NULL AND winner_id != ?1 THEN 1 ELSE 0 END) AS losses
        FROM twoplayers_games
        WHERE player1_id = ?1 OR player2_id = ?1
        GROUP BY game_name
        ORDER BY game_name
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Top players of a single-player game by wins
pub async fn leaderboard(
    pool: &SqlitePool,
    game_name: &str,
    limit: i64,
) -> Result<Vec<LeaderboardEntry>, sqlx::Error> {
    sqlx::query_as::<_, LeaderboardEntry>(
        r#"
        SELECT user_id,
               SUM(CASE WHEN win = 1 THEN 1 ELSE 0 END) AS wins,
               COUNT(*) AS played
        FROM singleplayer_games
        WHERE game_name = ?
        GROUP BY user_id
        ORDER BY wins DESC, played ASC, user_id ASC
        LIMIT ?
        "#,
    )
    .bind(game_name)
    .bind(limit)
    .fetch_all(pool)
    .await
}
