use thiserror::Error;

/// Failure taxonomy for the request pipeline.
///
/// Clone matters here: the response cache fans a single computation's outcome
/// out to every concurrent waiter, errors included.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("rate limit exceeded for session `{session_id}`")]
    RateLimited { session_id: String },
    #[error("classification failed: {0}")]
    Classification(String),
    #[error("generation failed: {0}")]
    Generation(String),
    #[error("{stage} call exceeded the {deadline_ms}ms deadline")]
    Timeout { stage: &'static str, deadline_ms: u64 },
    #[error("turn {0} does not exist")]
    TurnNotFound(i64),
    #[error("storage failure: {0}")]
    Storage(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl PipelineError {
    /// Stable machine-readable label, used by the HTTP and CLI surfaces so
    /// callers can tell a rejection from a failure from bad input.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::RateLimited { .. } => "rate_limited",
            Self::Classification(_) => "classification",
            Self::Generation(_) => "generation",
            Self::Timeout { .. } => "timeout",
            Self::TurnNotFound(_) => "not_found",
            Self::Storage(_) => "storage",
            Self::InvalidConfiguration(_) => "invalid_configuration",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PipelineError;

    #[test]
    fn kinds_are_distinguishable() {
        let rejected = PipelineError::RateLimited { session_id: "s-1".to_owned() };
        let invalid = PipelineError::Validation("query must not be empty".to_owned());
        let failed = PipelineError::Generation("upstream 500".to_owned());

        assert_eq!(rejected.kind(), "rate_limited");
        assert_eq!(invalid.kind(), "validation");
        assert_eq!(failed.kind(), "generation");
    }

    #[test]
    fn timeout_message_names_the_stage() {
        let error = PipelineError::Timeout { stage: "classification", deadline_ms: 30_000 };
        assert_eq!(error.to_string(), "classification call exceeded the 30000ms deadline");
    }
}
