use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use deskline_core::domain::{NewTurn, PolicyVariant, Turn};
use deskline_core::routing::{Category, Sentiment};

use super::{RepositoryError, TurnRepository};
use crate::DbPool;

pub struct SqlTurnRepository {
    pool: DbPool,
}

impl SqlTurnRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn parse_created_at(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("created_at `{raw}`: {e}")))
}

fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> Result<Turn, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let session_id: String =
        row.try_get("session_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_raw: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let query: String = row.try_get("query").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let detected_language: Option<String> =
        row.try_get("detected_language").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let policy_variant_raw: String =
        row.try_get("policy_variant").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let category_raw: Option<String> =
        row.try_get("category").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let sentiment_raw: Option<String> =
        row.try_get("sentiment").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let response: Option<String> =
        row.try_get("response").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let latency_ms: i64 =
        row.try_get("latency_ms").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let policy_variant = policy_variant_raw
        .parse::<PolicyVariant>()
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let category = category_raw
        .filter(|value| !value.is_empty())
        .map(|value| value.parse::<Category>())
        .transpose()
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let sentiment = sentiment_raw
        .filter(|value| !value.is_empty())
        .map(|value| value.parse::<Sentiment>())
        .transpose()
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Turn {
        id,
        session_id,
        created_at: parse_created_at(&created_at_raw)?,
        query,
        detected_language,
        policy_variant,
        category,
        sentiment,
        response: response.unwrap_or_default(),
        latency_ms: u32::try_from(latency_ms.max(0)).unwrap_or(u32::MAX),
    })
}

#[async_trait]
impl TurnRepository for SqlTurnRepository {
    async fn insert_turn(&self, turn: NewTurn) -> Result<i64, RepositoryError> {
        if turn.session_id.trim().is_empty() {
            return Err(RepositoryError::Validation("session_id must not be empty".to_owned()));
        }
        if turn.query.trim().is_empty() {
            return Err(RepositoryError::Validation("query must not be empty".to_owned()));
        }

        let created_at = turn.created_at.unwrap_or_else(Utc::now);
        let result = sqlx::query(
            "INSERT INTO turns
                (session_id, created_at, query, detected_language, policy_variant,
                 category, sentiment, response, latency_ms)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&turn.session_id)
        .bind(created_at.to_rfc3339())
        .bind(&turn.query)
        .bind(&turn.detected_language)
        .bind(turn.policy_variant.as_str())
        .bind(turn.category.map(|category| category.as_str()))
        .bind(turn.sentiment.map(|sentiment| sentiment.as_str()))
        .bind(&turn.response)
        .bind(i64::from(turn.latency_ms))
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn list_turns(&self, limit: u32) -> Result<Vec<Turn>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, session_id, created_at, query, detected_language, policy_variant,
                    category, sentiment, response, latency_ms
             FROM turns
             ORDER BY datetime(created_at) DESC, id DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_turn).collect::<Result<Vec<_>, _>>()
    }
}
