use crate::commands::{run_with_pool, CommandResult};
use deskline_core::domain::Rating;
use deskline_db::{FeedbackRepository, RepositoryError, SqlFeedbackRepository};

pub fn run(turn_id: i64, rating: i64, comment: Option<&str>) -> CommandResult {
    let rating = match Rating::from_value(rating) {
        Ok(rating) => rating,
        Err(error) => {
            return CommandResult::failure("feedback", "validation", error.to_string(), 2);
        }
    };

    let result = run_with_pool("feedback", |_config, pool| async move {
        let repository = SqlFeedbackRepository::new(pool);
        repository.insert_feedback(turn_id, rating, comment).await.map_err(|error| {
            let class = match &error {
                RepositoryError::TurnNotFound(_) => "not_found",
                RepositoryError::Validation(_) => "validation",
                _ => "storage",
            };
            (class, error.to_string(), 6u8)
        })
    });

    match result {
        Ok(feedback_id) => CommandResult::success(
            "feedback",
            format!("recorded feedback {feedback_id} for turn {turn_id}"),
        ),
        Err(failure) => failure,
    }
}
