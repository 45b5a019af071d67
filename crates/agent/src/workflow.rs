use std::time::Duration;

use tokio::time::timeout;

use deskline_core::domain::{PolicyVariant, Resolution};
use deskline_core::errors::PipelineError;
use deskline_core::routing::{ResponseKind, Route, ESCALATION_RESPONSE};

use crate::llm::{Classifier, Generator};

/// Runs one turn through classify -> route -> respond.
///
/// Collaborator calls are bounded by `deadline`; hitting it aborts the turn
/// with a typed timeout and no partial result. The escalated route returns
/// the fixed handoff message without ever invoking the generator. No retries
/// happen here; that belongs to the collaborator client if anywhere.
pub async fn run_turn(
    classifier: &dyn Classifier,
    generator: &dyn Generator,
    query: &str,
    variant: PolicyVariant,
    deadline: Duration,
) -> Result<Resolution, PipelineError> {
    let deadline_ms = deadline.as_millis() as u64;

    let classification = timeout(deadline, classifier.classify(query))
        .await
        .map_err(|_| PipelineError::Timeout { stage: "classification", deadline_ms })??;

    let route = Route::for_classification(&classification);
    let response = match route {
        Route::Escalated => ESCALATION_RESPONSE.to_owned(),
        Route::Technical => generate(generator, query, variant, ResponseKind::Technical, deadline).await?,
        Route::Billing => generate(generator, query, variant, ResponseKind::Billing, deadline).await?,
        Route::General => generate(generator, query, variant, ResponseKind::General, deadline).await?,
    };

    Ok(Resolution {
        category: classification.category,
        sentiment: classification.sentiment,
        response: response.trim().to_owned(),
    })
}

async fn generate(
    generator: &dyn Generator,
    query: &str,
    variant: PolicyVariant,
    kind: ResponseKind,
    deadline: Duration,
) -> Result<String, PipelineError> {
    timeout(deadline, generator.generate(query, variant, kind))
        .await
        .map_err(|_| PipelineError::Timeout {
            stage: "generation",
            deadline_ms: deadline.as_millis() as u64,
        })?
}
