//! JSON API for the support pipeline.
//!
//! - `POST /chat`     — handle one support turn
//! - `POST /feedback` — rate a persisted turn
//! - `GET  /turns`    — recent turns, newest first
//! - `GET  /feedback` — recent feedback joined with the rated turns

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use deskline_agent::{SupportPipeline, TurnRequest};
use deskline_core::domain::{FeedbackWithTurn, PolicyVariant, Turn};
use deskline_core::errors::PipelineError;

const DEFAULT_LIST_LIMIT: u32 = 50;
const MAX_LIST_LIMIT: u32 = 500;

#[derive(Clone)]
pub struct ApiState {
    pipeline: Arc<SupportPipeline>,
}

pub fn router(pipeline: Arc<SupportPipeline>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/feedback", post(submit_feedback).get(list_feedback))
        .route("/turns", get(list_turns))
        .with_state(ApiState { pipeline })
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub query: String,
    pub policy_variant: Option<String>,
    pub detected_language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub turn_id: Option<i64>,
    pub category: &'static str,
    pub sentiment: &'static str,
    pub response: String,
    pub latency_ms: u32,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackApiRequest {
    pub turn_id: i64,
    pub rating: i64,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FeedbackApiResponse {
    pub feedback_id: i64,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub kind: &'static str,
    pub error: String,
}

type ErrorResponse = (StatusCode, Json<ApiError>);

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn chat(
    State(state): State<ApiState>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ErrorResponse> {
    let variant = match body.policy_variant.as_deref() {
        Some(raw) => raw.parse::<PolicyVariant>().map_err(error_response)?,
        None => PolicyVariant::A,
    };

    let mut request = TurnRequest::new(body.session_id, body.query, variant);
    request.detected_language = body.detected_language;

    let outcome = state.pipeline.handle(request).await.map_err(error_response)?;

    info!(
        event_name = "api.chat.handled",
        turn_id = ?outcome.turn_id,
        category = outcome.category.as_str(),
        latency_ms = outcome.latency_ms,
        "support turn handled"
    );

    Ok(Json(ChatResponse {
        turn_id: outcome.turn_id,
        category: outcome.category.as_str(),
        sentiment: outcome.sentiment.as_str(),
        response: outcome.response,
        latency_ms: outcome.latency_ms,
    }))
}

pub async fn submit_feedback(
    State(state): State<ApiState>,
    Json(body): Json<FeedbackApiRequest>,
) -> Result<Json<FeedbackApiResponse>, ErrorResponse> {
    let feedback_id = state
        .pipeline
        .record_feedback(body.turn_id, body.rating, body.comment.as_deref())
        .await
        .map_err(error_response)?;

    info!(event_name = "api.feedback.recorded", turn_id = body.turn_id, "feedback recorded");

    Ok(Json(FeedbackApiResponse { feedback_id }))
}

pub async fn list_turns(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Turn>>, ErrorResponse> {
    let limit = effective_limit(query.limit);
    let turns = state.pipeline.recent_turns(limit).await.map_err(error_response)?;
    Ok(Json(turns))
}

pub async fn list_feedback(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<FeedbackWithTurn>>, ErrorResponse> {
    let limit = effective_limit(query.limit);
    let feedback = state.pipeline.recent_feedback(limit).await.map_err(error_response)?;
    Ok(Json(feedback))
}

fn effective_limit(requested: Option<u32>) -> u32 {
    requested.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

fn error_response(error: PipelineError) -> ErrorResponse {
    let status = match &error {
        PipelineError::Validation(_) => StatusCode::BAD_REQUEST,
        PipelineError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        PipelineError::Classification(_) | PipelineError::Generation(_) => StatusCode::BAD_GATEWAY,
        PipelineError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        PipelineError::TurnNotFound(_) => StatusCode::NOT_FOUND,
        PipelineError::Storage(_) | PipelineError::InvalidConfiguration(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    if status.is_server_error() {
        warn!(kind = error.kind(), %error, "request failed");
    }

    (status, Json(ApiError { kind: error.kind(), error: error.to_string() }))
}
