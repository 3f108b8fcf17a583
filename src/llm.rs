//! Model-provider boundary.
//!
//! Speaks to any OpenAI-compatible chat endpoint. Provider failures are
//! classified so the handler can give quota exhaustion a friendly
//! user-visible fallback while everything else propagates and gets logged.

use crate::config::Config;
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{ChatCompletionRequestMessage, CreateChatCompletionRequestArgs},
    Client,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("model quota exhausted")]
    QuotaExceeded,
    #[error("model not found: {0}")]
    ModelNotFound(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub struct LlmClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl LlmClient {
    pub fn new(config: &Config) -> Self {
        let mut provider_config = OpenAIConfig::new().with_api_base(&config.llm_url);

        if let Some(key) = &config.llm_api_key {
            provider_config = provider_config.with_api_key(key);
        } else {
            provider_config = provider_config.with_api_key("unused");
        }

        Self {
            client: Client::with_config(provider_config),
            model: config.llm_model.clone(),
        }
    }

    pub async fn chat(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
    ) -> Result<String, LlmError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .build()
            .map_err(|e| LlmError::Other(e.into()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| self.classify(e))?;

        Ok(response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default())
    }

    /// Single-prompt convenience wrapper used for summarization.
    pub async fn completion(&self, prompt: &str) -> Result<String, LlmError> {
        use async_openai::types::ChatCompletionRequestUserMessageArgs;

        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt.to_string())
            .build()
            .map_err(|e| LlmError::Other(e.into()))?;
        self.chat(vec![message.into()]).await
    }

    fn classify(&self, err: OpenAIError) -> LlmError {
        match err {
            OpenAIError::ApiError(api) => {
                let code = api.code.as_deref().unwrap_or("");
                let kind = api.r#type.as_deref().unwrap_or("");
                if code == "insufficient_quota" || kind == "insufficient_quota" {
                    LlmError::QuotaExceeded
                } else if code == "model_not_found" {
                    LlmError::ModelNotFound(self.model.clone())
                } else {
                    LlmError::Other(anyhow::anyhow!("Model provider error: {}", api.message))
                }
            }
            other => LlmError::Other(other.into()),
        }
    }
}
