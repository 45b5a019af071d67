use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use deskline_core::domain::{Feedback, FeedbackWithTurn, PolicyVariant, Rating};

use super::turn::parse_created_at;
use super::{FeedbackRepository, RepositoryError};
use crate::DbPool;

pub struct SqlFeedbackRepository {
    pool: DbPool,
}

impl SqlFeedbackRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_feedback_with_turn(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<FeedbackWithTurn, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let turn_id: i64 =
        row.try_get("turn_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_raw: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let rating: i64 = row.try_get("rating").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let comment: Option<String> =
        row.try_get("comment").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let query: String = row.try_get("query").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let response: Option<String> =
        row.try_get("response").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let policy_variant_raw: String =
        row.try_get("policy_variant").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(FeedbackWithTurn {
        feedback: Feedback {
            id,
            turn_id,
            created_at: parse_created_at(&created_at_raw)?,
            rating,
            comment,
        },
        query,
        response: response.unwrap_or_default(),
        policy_variant: policy_variant_raw
            .parse::<PolicyVariant>()
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
    })
}

#[async_trait]
impl FeedbackRepository for SqlFeedbackRepository {
    async fn insert_feedback(
        &self,
        turn_id: i64,
        rating: Rating,
        comment: Option<&str>,
    ) -> Result<i64, RepositoryError> {
        // Referential integrity is checked logically, not left to the engine,
        // so an unknown turn surfaces as a typed error instead of a raw
        // constraint violation.
        let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM turns WHERE id = ?")
            .bind(turn_id)
            .fetch_one(&self.pool)
            .await?;
        if exists == 0 {
            return Err(RepositoryError::TurnNotFound(turn_id));
        }

        let result = sqlx::query(
            "INSERT INTO feedback (turn_id, created_at, rating, comment) VALUES (?, ?, ?, ?)",
        )
        .bind(turn_id)
        .bind(Utc::now().to_rfc3339())
        .bind(rating.as_value())
        .bind(comment)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn list_feedback_with_turns(
        &self,
        limit: u32,
    ) -> Result<Vec<FeedbackWithTurn>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT f.id, f.turn_id, f.created_at, f.rating, f.comment,
                    t.query, t.response, t.policy_variant
             FROM feedback f
             JOIN turns t ON t.id = f.turn_id
             ORDER BY datetime(f.created_at) DESC, f.id DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_feedback_with_turn).collect::<Result<Vec<_>, _>>()
    }
}

#[cfg(test)]
mod tests {
    use deskline_core::config::DatabaseConfig;
    use deskline_core::domain::{NewTurn, PolicyVariant, Rating};
    use deskline_core::routing::{Category, Sentiment};

    use super::SqlFeedbackRepository;
    use crate::repositories::{
        FeedbackRepository, RepositoryError, SqlTurnRepository, TurnRepository,
    };
    use crate::{connect, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool =
            connect(&DatabaseConfig::for_url("sqlite::memory:")).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn sample_turn(query: &str) -> NewTurn {
        NewTurn {
            session_id: "sess-1".to_string(),
            query: query.to_string(),
            detected_language: None,
            policy_variant: PolicyVariant::B,
            category: Some(Category::Technical),
            sentiment: Some(Sentiment::Positive),
            response: "Try restarting the router first.".to_string(),
            latency_ms: 120,
            created_at: None,
        }
    }

    #[tokio::test]
    async fn feedback_round_trips_with_joined_turn_fields() {
        let pool = setup().await;
        let turns = SqlTurnRepository::new(pool.clone());
        let feedback = SqlFeedbackRepository::new(pool);

        let turn_id = turns.insert_turn(sample_turn("Wifi keeps dropping")).await.expect("turn");
        let feedback_id = feedback
            .insert_feedback(turn_id, Rating::Up, Some("solved it"))
            .await
            .expect("feedback");
        assert!(feedback_id > 0);

        let listed = feedback.list_feedback_with_turns(10).await.expect("list");
        assert_eq!(listed.len(), 1);

        let entry = &listed[0];
        assert_eq!(entry.feedback.id, feedback_id);
        assert_eq!(entry.feedback.turn_id, turn_id);
        assert_eq!(entry.feedback.rating, 1);
        assert_eq!(entry.feedback.comment.as_deref(), Some("solved it"));
        assert_eq!(entry.query, "Wifi keeps dropping");
        assert_eq!(entry.response, "Try restarting the router first.");
        assert_eq!(entry.policy_variant, PolicyVariant::B);
    }

    #[tokio::test]
    async fn unknown_turn_id_fails_and_writes_nothing() {
        let pool = setup().await;
        let feedback = SqlFeedbackRepository::new(pool);

        let result = feedback.insert_feedback(999, Rating::Down, None).await;
        assert!(matches!(result, Err(RepositoryError::TurnNotFound(999))));

        let listed = feedback.list_feedback_with_turns(10).await.expect("list");
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn multiple_feedback_rows_can_reference_one_turn() {
        let pool = setup().await;
        let turns = SqlTurnRepository::new(pool.clone());
        let feedback = SqlFeedbackRepository::new(pool);

        let turn_id = turns.insert_turn(sample_turn("q")).await.expect("turn");
        feedback.insert_feedback(turn_id, Rating::Up, None).await.expect("first");
        feedback.insert_feedback(turn_id, Rating::Down, Some("changed my mind")).await.expect("second");

        let listed = feedback.list_feedback_with_turns(10).await.expect("list");
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|entry| entry.feedback.turn_id == turn_id));
    }
}
