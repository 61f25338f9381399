use chrono::{DateTime, Utc};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Tag {
    pub guild_id: i64,
    pub owner: i64,
    pub name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub uses: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TagAlias {
    pub guild_id: i64,
    pub owner: i64,
    pub name: String,
    pub alias: String,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}
