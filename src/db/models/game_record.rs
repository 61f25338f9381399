use chrono::{DateTime, Utc};

/// Outcome row for Wordle and Letterle, keyed by the hosting message id
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SinglePlayerGame {
    pub game_id: i64,
    pub game_name: String,
    pub user_id: i64,
    pub attempts: i64,
    /// `None` while the game is still running or was abandoned
    pub win: Option<bool>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TwoPlayerGame {
    pub game_id: i64,
    pub game_name: String,
    pub player1_id: i64,
    pub player2_id: i64,
    /// `None` for a draw
    pub winner_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Aggregated record of one user in one game
#[derive(Debug, Clone, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct GameTally {
    pub game_name: String,
    pub played: i64,
    pub wins: i64,
    pub losses: i64,
}

/// Leaderboard line
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LeaderboardEntry {
    pub user_id: i64,
    pub wins: i64,
    pub played: i64,
}

/// Server-wide totals of a two-player game
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct TwoPlayerTotals {
    pub game_name: String,
    pub played: i64,
    pub draws: i64,
}
