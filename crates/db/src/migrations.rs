use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::connect;
    use crate::connection::in_memory_config;

    #[tokio::test]
    async fn migrations_create_sessions_table() {
        let pool = connect(&in_memory_config()).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let count = sqlx::query(
            "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = 'sessions'",
        )
        .fetch_one(&pool)
        .await
        .expect("check sessions table")
        .get::<i64, _>("count");

        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = connect(&in_memory_config()).await.expect("connect");
        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run");
    }
}
