use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info};

use deskline_core::cache::{cache_key, ResponseCache};
use deskline_core::config::{AppConfig, CacheConfig, LimiterConfig};
use deskline_core::domain::{
    FeedbackWithTurn, NewTurn, PolicyVariant, Rating, Resolution, Turn,
};
use deskline_core::errors::PipelineError;
use deskline_core::ratelimit::SessionBuckets;
use deskline_core::routing::{Category, Sentiment};

use deskline_db::{FeedbackRepository, RepositoryError, TurnRepository};

use crate::llm::{Classifier, Generator};
use crate::workflow::run_turn;

/// Tunables the pipeline needs at construction. Everything else comes in per
/// request.
#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub cache: CacheConfig,
    pub limiter: LimiterConfig,
    pub request_deadline: Duration,
}

impl PipelineSettings {
    /// The collaborator timeout doubles as the per-stage deadline.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            cache: config.cache.clone(),
            limiter: config.limiter.clone(),
            request_deadline: Duration::from_secs(config.llm.timeout_secs),
        }
    }
}

/// One inbound support query.
#[derive(Clone, Debug)]
pub struct TurnRequest {
    pub session_id: String,
    pub query: String,
    pub policy_variant: PolicyVariant,
    pub detected_language: Option<String>,
    pub rate_limit_cost: f64,
}

impl TurnRequest {
    pub fn new(session_id: impl Into<String>, query: impl Into<String>, variant: PolicyVariant) -> Self {
        Self {
            session_id: session_id.into(),
            query: query.into(),
            policy_variant: variant,
            detected_language: None,
            rate_limit_cost: 1.0,
        }
    }
}

/// What the caller gets back from a handled turn.
///
/// `turn_id` is `None` when the answer was produced but the append to storage
/// failed; the response is still served in that case.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnOutcome {
    pub turn_id: Option<i64>,
    pub category: Category,
    pub sentiment: Sentiment,
    pub response: String,
    pub latency_ms: u32,
}

/// Front door for support turns: admission, memoization, workflow, and
/// persistence in that order. Shared across tasks behind an `Arc`; all
/// interior state is its own synchronization.
pub struct SupportPipeline {
    classifier: Arc<dyn Classifier>,
    generator: Arc<dyn Generator>,
    turns: Arc<dyn TurnRepository>,
    feedback: Arc<dyn FeedbackRepository>,
    cache: ResponseCache<Resolution>,
    sessions: SessionBuckets,
    deadline: Duration,
}

impl SupportPipeline {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        generator: Arc<dyn Generator>,
        turns: Arc<dyn TurnRepository>,
        feedback: Arc<dyn FeedbackRepository>,
        settings: PipelineSettings,
    ) -> Result<Self, PipelineError> {
        let cache = ResponseCache::new(settings.cache.ttl_seconds, settings.cache.maxsize)?;
        let sessions = SessionBuckets::new(settings.limiter.rpm, settings.limiter.burst)?;

        Ok(Self {
            classifier,
            generator,
            turns,
            feedback,
            cache,
            sessions,
            deadline: settings.request_deadline,
        })
    }

    /// Handles one turn end to end.
    ///
    /// Rejections (validation, rate limit) happen before any collaborator
    /// call. A cache hit still appends a turn row; the analytics record is
    /// per turn handled, not per computation.
    pub async fn handle(&self, request: TurnRequest) -> Result<TurnOutcome, PipelineError> {
        let session_id = request.session_id.trim().to_owned();
        let query = request.query.trim().to_owned();

        if session_id.is_empty() {
            return Err(PipelineError::Validation("session_id must not be empty".to_owned()));
        }
        if query.is_empty() {
            return Err(PipelineError::Validation("query must not be empty".to_owned()));
        }
        if !request.rate_limit_cost.is_finite() || request.rate_limit_cost <= 0.0 {
            return Err(PipelineError::Validation(
                "rate_limit_cost must be a finite positive number".to_owned(),
            ));
        }

        if !self.sessions.allow(&session_id, request.rate_limit_cost).await {
            info!(session_id = %session_id, "turn rejected by rate limiter");
            return Err(PipelineError::RateLimited { session_id });
        }

        let started = Instant::now();
        let variant = request.policy_variant;
        let key = cache_key(variant, &query);

        let resolution = self
            .cache
            .get_or_compute(&key, || {
                run_turn(
                    self.classifier.as_ref(),
                    self.generator.as_ref(),
                    &query,
                    variant,
                    self.deadline,
                )
            })
            .await?;

        let latency_ms = started.elapsed().as_millis().min(u128::from(u32::MAX)) as u32;

        let turn_id = match self
            .turns
            .insert_turn(NewTurn {
                session_id: session_id.clone(),
                query,
                detected_language: request.detected_language,
                policy_variant: variant,
                category: Some(resolution.category),
                sentiment: Some(resolution.sentiment),
                response: resolution.response.clone(),
                latency_ms,
                created_at: None,
            })
            .await
        {
            Ok(id) => Some(id),
            // The answer is already in hand; losing the analytics row must
            // not fail the turn.
            Err(cause) => {
                error!(session_id = %session_id, %cause, "failed to persist turn");
                None
            }
        };

        Ok(TurnOutcome {
            turn_id,
            category: resolution.category,
            sentiment: resolution.sentiment,
            response: resolution.response,
            latency_ms,
        })
    }

    /// Records a thumbs rating against a persisted turn.
    pub async fn record_feedback(
        &self,
        turn_id: i64,
        rating: i64,
        comment: Option<&str>,
    ) -> Result<i64, PipelineError> {
        let rating = Rating::from_value(rating)?;
        self.feedback
            .insert_feedback(turn_id, rating, comment)
            .await
            .map_err(map_repository_error)
    }

    pub async fn recent_turns(&self, limit: u32) -> Result<Vec<Turn>, PipelineError> {
        self.turns.list_turns(limit).await.map_err(map_repository_error)
    }

    pub async fn recent_feedback(
        &self,
        limit: u32,
    ) -> Result<Vec<FeedbackWithTurn>, PipelineError> {
        self.feedback.list_feedback_with_turns(limit).await.map_err(map_repository_error)
    }
}

fn map_repository_error(error: RepositoryError) -> PipelineError {
    match error {
        RepositoryError::Validation(message) => PipelineError::Validation(message),
        RepositoryError::TurnNotFound(turn_id) => PipelineError::TurnNotFound(turn_id),
        RepositoryError::Decode(message) => PipelineError::Storage(message),
        RepositoryError::Database(cause) => PipelineError::Storage(cause.to_string()),
    }
}
