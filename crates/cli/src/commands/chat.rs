use std::sync::Arc;

use serde::Serialize;

use crate::commands::{run_with_pool, CommandResult};
use deskline_agent::{
    Classifier, Generator, OpenAiChatClient, PipelineSettings, SupportPipeline, TurnRequest,
};
use deskline_core::domain::PolicyVariant;
use deskline_db::{SqlFeedbackRepository, SqlTurnRepository};

pub struct ChatArgs {
    pub session_id: String,
    pub query: String,
    pub variant: String,
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatPayload {
    command: &'static str,
    status: &'static str,
    turn_id: Option<i64>,
    category: &'static str,
    sentiment: &'static str,
    latency_ms: u32,
    response: String,
}

/// One-shot support turn: the CLI equivalent of `POST /chat`.
pub fn run(args: ChatArgs) -> CommandResult {
    let variant = match args.variant.parse::<PolicyVariant>() {
        Ok(variant) => variant,
        Err(error) => {
            return CommandResult::failure("chat", "validation", error.to_string(), 2);
        }
    };

    let result = run_with_pool("chat", |config, pool| async move {
        let llm = Arc::new(OpenAiChatClient::new(&config.llm));
        let classifier: Arc<dyn Classifier> = llm.clone();
        let generator: Arc<dyn Generator> = llm;

        let pipeline = SupportPipeline::new(
            classifier,
            generator,
            Arc::new(SqlTurnRepository::new(pool.clone())),
            Arc::new(SqlFeedbackRepository::new(pool)),
            PipelineSettings::from_config(&config),
        )
        .map_err(|error| ("pipeline", error.to_string(), 6u8))?;

        let mut request = TurnRequest::new(args.session_id, args.query, variant);
        request.detected_language = args.language;

        pipeline.handle(request).await.map_err(|error| (error.kind(), error.to_string(), 6u8))
    });

    match result {
        Ok(outcome) => {
            let payload = ChatPayload {
                command: "chat",
                status: "ok",
                turn_id: outcome.turn_id,
                category: outcome.category.as_str(),
                sentiment: outcome.sentiment.as_str(),
                latency_ms: outcome.latency_ms,
                response: outcome.response,
            };
            match serde_json::to_string(&payload) {
                Ok(output) => CommandResult { exit_code: 0, output },
                Err(error) => {
                    CommandResult::failure("chat", "serialization", error.to_string(), 1)
                }
            }
        }
        Err(failure) => failure,
    }
}
