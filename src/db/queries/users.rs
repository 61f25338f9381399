use sqlx::SqlitePool;

use crate::db::models::UserUid;

pub async fn ensure_user(pool: &SqlitePool, user_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO users (id) VALUES (?)")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_uid(
    pool: &SqlitePool,
    user_id: i64,
    service: &str,
    uid: &str,
) -> Result<(), sqlx::Error> {
    ensure_user(pool, user_id).await?;

    sqlx::query(
        r#"
        INSERT INTO user_uids (user_id, service, uid, updated_at)
        VALUES (?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT (user_id, service) DO UPDATE SET uid = excluded.uid, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(user_id)
    .bind(service)
    .bind(uid)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn remove_uid(pool: &SqlitePool, user_id: i64, service: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM user_uids WHERE user_id = ? AND service = ?")
        .bind(user_id)
        .bind(service)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_uids(pool: &SqlitePool, user_id: i64) -> Result<Vec<UserUid>, sqlx::Error> {
    sqlx::query_as::<_, UserUid>(
        "SELECT user_id, service, uid FROM user_uids WHERE user_id = ? ORDER BY service",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool::test_pool;

    #[tokio::test]
    async fn test_uid_upsert_and_remove() {
        let pool = test_pool().await;

        set_uid(&pool, 7, "genshin", "800000001").await.unwrap();
        set_uid(&pool, 7, "genshin", "800000002").await.unwrap();
        set_uid(&pool, 7, "hsr", "600000001").await.unwrap();

        let uids = get_uids(&pool, 7).await.unwrap();
        assert_eq!(uids.len(), 2);
        assert_eq!(uids[0].uid, "800000002");

        assert!(remove_uid(&pool, 7, "hsr").await.unwrap());
        assert!(!remove_uid(&pool, 7, "hsr").await.unwrap());
        assert_eq!(get_uids(&pool, 7).await.unwrap().len(), 1);
    }
}
