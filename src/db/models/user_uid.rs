#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct UserUid {
    pub user_id: i64,
    pub service: String,
    pub uid: String,
}
