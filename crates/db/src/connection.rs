use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

use deskline_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

/// Applied to every connection the pool opens. Foreign keys are off by
/// default in sqlite and the feedback table relies on them.
const CONNECTION_PRAGMAS: &[&str] = &["PRAGMA foreign_keys = ON", "PRAGMA journal_mode = WAL"];

/// Caps how long a writer sits on the sqlite busy handler.
const MAX_BUSY_TIMEOUT_MS: u128 = 30_000;

/// Opens a sqlite pool shaped by the database section of the configuration.
/// Writers under WAL wait on the busy handler for the same window the pool
/// is willing to wait for a connection.
pub async fn connect(settings: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    let acquire_timeout = Duration::from_secs(settings.timeout_secs.max(1));
    let busy_timeout_ms = acquire_timeout.as_millis().min(MAX_BUSY_TIMEOUT_MS);

    SqlitePoolOptions::new()
        .max_connections(settings.max_connections.max(1))
        .acquire_timeout(acquire_timeout)
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                for pragma in CONNECTION_PRAGMAS {
                    sqlx::query(pragma).execute(&mut *conn).await?;
                }
                sqlx::query(&format!("PRAGMA busy_timeout = {busy_timeout_ms}"))
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(&settings.url)
        .await
}

#[cfg(test)]
mod tests {
    use deskline_core::config::DatabaseConfig;

    use super::connect;

    #[tokio::test]
    async fn pool_applies_pragmas_from_settings() {
        let mut settings = DatabaseConfig::for_url("sqlite::memory:");
        settings.timeout_secs = 7;
        let pool = connect(&settings).await.expect("connect");

        let foreign_keys: i64 =
            sqlx::query_scalar("PRAGMA foreign_keys").fetch_one(&pool).await.expect("pragma");
        assert_eq!(foreign_keys, 1);

        let busy_timeout: i64 =
            sqlx::query_scalar("PRAGMA busy_timeout").fetch_one(&pool).await.expect("pragma");
        assert_eq!(busy_timeout, 7_000, "busy handler follows the acquire timeout");
    }

    #[tokio::test]
    async fn zero_settings_are_clamped_to_a_working_pool() {
        let mut settings = DatabaseConfig::for_url("sqlite::memory:");
        settings.max_connections = 0;
        settings.timeout_secs = 0;

        let pool = connect(&settings).await.expect("connect");
        let probe: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&pool).await.expect("probe");
        assert_eq!(probe, 1);
    }
}
