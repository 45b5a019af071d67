use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use deskline_core::config::LlmConfig;
use deskline_core::domain::PolicyVariant;
use deskline_core::errors::PipelineError;
use deskline_core::routing::{Classification, ResponseKind};

use crate::prompts;

/// Assigns a category and sentiment to a raw query. Must fail with a typed
/// error, never a default, when it cannot produce both fields from the fixed
/// enumerations.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, query: &str) -> Result<Classification, PipelineError>;
}

/// Drafts a reply for a query under one policy variant's handler instruction.
/// Output text is the collaborator's concern; determinism is not expected.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        query: &str,
        variant: PolicyVariant,
        kind: ResponseKind,
    ) -> Result<String, PipelineError>;
}

const CLASSIFY_SYSTEM: &str = "Classify the customer message into category and sentiment. \
     Category must be exactly one of: Technical, Billing, General. Sentiment must be exactly \
     one of: Positive, Neutral, Negative. Respond with JSON only, for example: \
     {\"category\":\"Billing\",\"sentiment\":\"Neutral\"}";

/// Chat client for any OpenAI-compatible completions endpoint. Serves as both
/// collaborator seams; the pipeline itself never touches HTTP.
pub struct OpenAiChatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
}

impl OpenAiChatClient {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    fn completions_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{base}/chat/completions")
    }

    /// One chat completion round-trip. Errors come back as plain messages so
    /// each call site can wrap them in its own taxonomy variant.
    async fn complete(&self, system: &str, user: &str) -> Result<String, String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| "llm.api_key is not configured".to_string())?;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            temperature: 0.0,
        };

        debug!(model = %self.model, "sending chat completion request");

        let response = self
            .http
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", api_key.expose_secret()))
            .json(&request)
            .send()
            .await
            .map_err(|error| format!("request failed: {error}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("upstream returned HTTP {status}: {body}"));
        }

        let payload: ChatResponse =
            response.json().await.map_err(|error| format!("unparseable response: {error}"))?;

        payload
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| "response contained no choices".to_string())
    }
}

#[async_trait]
impl Classifier for OpenAiChatClient {
    async fn classify(&self, query: &str) -> Result<Classification, PipelineError> {
        let raw = self
            .complete(CLASSIFY_SYSTEM, query)
            .await
            .map_err(PipelineError::Classification)?;
        parse_classification(&raw)
    }
}

#[async_trait]
impl Generator for OpenAiChatClient {
    async fn generate(
        &self,
        query: &str,
        variant: PolicyVariant,
        kind: ResponseKind,
    ) -> Result<String, PipelineError> {
        let system = prompts::prompts_for(variant).system;
        let user = format!("{}\n\nCustomer query: {query}", prompts::instruction(variant, kind));

        self.complete(system, &user).await.map_err(PipelineError::Generation)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ClassifyPayload {
    category: String,
    sentiment: String,
}

fn parse_classification(raw: &str) -> Result<Classification, PipelineError> {
    // Models occasionally wrap JSON in a markdown fence despite the
    // JSON-only instruction.
    let trimmed = raw.trim().trim_start_matches("```json").trim_matches('`').trim();

    let payload: ClassifyPayload = serde_json::from_str(trimmed).map_err(|error| {
        PipelineError::Classification(format!("expected JSON with category and sentiment: {error}"))
    })?;

    Ok(Classification {
        category: payload.category.parse()?,
        sentiment: payload.sentiment.parse()?,
    })
}

#[cfg(test)]
mod tests {
    use deskline_core::errors::PipelineError;
    use deskline_core::routing::{Category, Sentiment};

    use super::parse_classification;

    #[test]
    fn well_formed_payload_parses() {
        let classification =
            parse_classification(r#"{"category":"Billing","sentiment":"Neutral"}"#).expect("parse");
        assert_eq!(classification.category, Category::Billing);
        assert_eq!(classification.sentiment, Sentiment::Neutral);
    }

    #[test]
    fn fenced_payload_parses() {
        let raw = "```json\n{\"category\":\"Technical\",\"sentiment\":\"Positive\"}\n```";
        let classification = parse_classification(raw).expect("parse");
        assert_eq!(classification.category, Category::Technical);
        assert_eq!(classification.sentiment, Sentiment::Positive);
    }

    #[test]
    fn out_of_enumeration_category_is_a_typed_error() {
        let result = parse_classification(r#"{"category":"Sales","sentiment":"Neutral"}"#);
        assert!(matches!(result, Err(PipelineError::Classification(_))));
    }

    #[test]
    fn missing_field_is_a_typed_error() {
        let result = parse_classification(r#"{"category":"Billing"}"#);
        assert!(matches!(result, Err(PipelineError::Classification(_))));
    }

    #[test]
    fn prose_is_a_typed_error_not_a_default() {
        let result = parse_classification("This looks like a billing question.");
        assert!(matches!(result, Err(PipelineError::Classification(_))));
    }
}
