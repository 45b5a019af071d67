use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use deskline_core::config::DatabaseConfig;

    use super::run_pending;
    use crate::connect;

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "turns",
        "feedback",
        "idx_turns_created_at",
        "idx_turns_policy_variant",
        "idx_feedback_turn_id",
        "idx_feedback_created_at",
    ];

    #[tokio::test]
    async fn migrations_create_baseline_tables_and_indexes() {
        let pool =
            connect(&DatabaseConfig::for_url("sqlite::memory:")).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for name in MANAGED_SCHEMA_OBJECTS {
            let count = sqlx::query(
                "SELECT COUNT(*) AS count FROM sqlite_master \
                 WHERE type IN ('table', 'index') AND name = ?",
            )
            .bind(name)
            .fetch_one(&pool)
            .await
            .expect("schema lookup")
            .get::<i64, _>("count");

            assert_eq!(count, 1, "expected `{name}` to exist after migrations");
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool =
            connect(&DatabaseConfig::for_url("sqlite::memory:")).await.expect("connect");
        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run is a no-op");
    }
}
