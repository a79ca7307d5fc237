use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

use terraloom_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

/// Opens the SQLite pool described by `config`. The configured acquire
/// timeout also bounds how long a connection waits on a locked database
/// before giving up.
pub async fn connect(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    let timeout_secs = config.timeout_secs.max(1);
    let busy_timeout_ms = timeout_secs * 1000;

    SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs))
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query(&format!("PRAGMA busy_timeout = {busy_timeout_ms}"))
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(&config.url)
        .await
}

#[cfg(test)]
pub(crate) fn in_memory_config() -> DatabaseConfig {
    DatabaseConfig { url: "sqlite::memory:".to_string(), max_connections: 1, timeout_secs: 30 }
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use terraloom_core::config::DatabaseConfig;

    use super::connect;

    #[tokio::test]
    async fn busy_timeout_follows_the_configured_timeout() {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            timeout_secs: 7,
        };
        let pool = connect(&config).await.expect("connect");

        let timeout_ms = sqlx::query("PRAGMA busy_timeout")
            .fetch_one(&pool)
            .await
            .expect("pragma")
            .get::<i64, _>(0);
        assert_eq!(timeout_ms, 7000);
    }

    #[tokio::test]
    async fn zero_settings_are_clamped_to_usable_minimums() {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 0,
            timeout_secs: 0,
        };
        let pool = connect(&config).await.expect("connect");
        sqlx::query("SELECT 1").execute(&pool).await.expect("query");
    }
}
