mod feedback;
mod turn;

pub use feedback::SqlFeedbackRepository;
pub use turn::SqlTurnRepository;

use async_trait::async_trait;
use thiserror::Error;

use deskline_core::domain::{FeedbackWithTurn, NewTurn, Rating, Turn};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("turn {0} does not exist")]
    TurnNotFound(i64),
    #[error("row decode failed: {0}")]
    Decode(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Append-only record of completed turns. Rows are write-once: the store
/// assigns `id` and `created_at` and nothing updates a row afterwards.
#[async_trait]
pub trait TurnRepository: Send + Sync {
    async fn insert_turn(&self, turn: NewTurn) -> Result<i64, RepositoryError>;

    /// Most recent first, ordered by `created_at` descending with ties broken
    /// by `id` descending so pagination is deterministic.
    async fn list_turns(&self, limit: u32) -> Result<Vec<Turn>, RepositoryError>;
}

#[async_trait]
pub trait FeedbackRepository: Send + Sync {
    /// Fails with [`RepositoryError::TurnNotFound`] when `turn_id` does not
    /// reference an existing turn; nothing is written in that case.
    async fn insert_feedback(
        &self,
        turn_id: i64,
        rating: Rating,
        comment: Option<&str>,
    ) -> Result<i64, RepositoryError>;

    async fn list_feedback_with_turns(
        &self,
        limit: u32,
    ) -> Result<Vec<FeedbackWithTurn>, RepositoryError>;
}
