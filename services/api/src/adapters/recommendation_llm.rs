//! services/api/src/adapters/recommendation_llm.rs
//!
//! This module contains the adapter for the recommendation LLM.
//! It implements the `RecommendationClient` port from the `core` crate against any
//! OpenAI-compatible chat completion endpoint (Gemini's by default).

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use backoff::ExponentialBackoff;
use ecoplot_core::{error::RecommendationError, ports::RecommendationClient};
use std::time::Duration;
use tracing::info;

/// Value shipped in sample configuration files; never a real key.
const PLACEHOLDER_KEY: &str = "API_KEY_HERE";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `RecommendationClient` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiRecommendationAdapter {
    client: Option<Client<OpenAIConfig>>,
    model: String,
    timeout: Duration,
}

impl OpenAiRecommendationAdapter {
    /// Creates a new `OpenAiRecommendationAdapter`.
    ///
    /// A missing or placeholder key still yields an adapter; every call on it then
    /// fails with a configuration error.
    pub fn new(api_key: Option<&str>, api_base: &str, model: String, timeout: Duration) -> Self {
        let client = api_key
            .map(str::trim)
            .filter(|key| !key.is_empty() && *key != PLACEHOLDER_KEY)
            .map(|key| {
                let config = OpenAIConfig::new()
                    .with_api_key(key)
                    .with_api_base(api_base.trim_end_matches('/'));
                Client::with_config(config).with_backoff(no_retries())
            });
        Self {
            client,
            model,
            timeout,
        }
    }

    fn client(&self) -> Result<&Client<OpenAIConfig>, RecommendationError> {
        self.client.as_ref().ok_or_else(|| {
            RecommendationError::Configuration("GEMINI_API_KEY is not set".to_string())
        })
    }
}

/// A backoff policy that gives up after the first failure. Each request is
/// sent exactly once.
fn no_retries() -> ExponentialBackoff {
    ExponentialBackoff {
        max_elapsed_time: Some(Duration::ZERO),
        ..Default::default()
    }
}

/// Splits client errors into "never reached the service" and "service said no".
fn classify(error: OpenAIError) -> RecommendationError {
    match error {
        OpenAIError::Reqwest(e) => RecommendationError::Transport(e.to_string()),
        OpenAIError::InvalidArgument(msg) => RecommendationError::Configuration(msg),
        other => RecommendationError::Upstream(other.to_string()),
    }
}

//=========================================================================================
// `RecommendationClient` Trait Implementation
//=========================================================================================

#[async_trait]
impl RecommendationClient for OpenAiRecommendationAdapter {
    fn ensure_configured(&self) -> Result<(), RecommendationError> {
        self.client().map(|_| ())
    }

    async fn complete(&self, prompt: &str) -> Result<String, RecommendationError> {
        let client = self.client()?;

        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(classify)?;
        let messages: Vec<ChatCompletionRequestMessage> = vec![message.into()];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(classify)?;

        let response = tokio::time::timeout(self.timeout, client.chat().create(request))
            .await
            .map_err(|_| {
                RecommendationError::Transport(format!(
                    "request timed out after {}s",
                    self.timeout.as_secs_f32()
                ))
            })?
            .map_err(classify)?;

        if let Some(usage) = &response.usage {
            info!(
                "Recommendation completion used {} prompt / {} completion tokens",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        // Extract the text content from the first choice in the response.
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| {
                RecommendationError::Upstream(
                    "Recommendation LLM response contained no text content.".to_string(),
                )
            })
    }
}
