use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::debug;

use super::{Completion, CompletionRequest, ProviderAdapter};
use crate::error::ProviderError;

/// Adapter for any OpenAI-compatible chat completions endpoint.
#[derive(Clone)]
pub struct OpenAiAdapter {
    name: String,
    client: Client<OpenAIConfig>,
}

impl OpenAiAdapter {
    pub fn new(name: String, api_key: String, base_url: String) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key).with_api_base(base_url);
        let client = Client::with_config(config);
        Self { name, client }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        debug!("🤖 [{}] Sending request (model: {}, prompt chars: {})", self.name, request.model, request.prompt.len());

        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(request.prompt.as_str())
            .build()
            .map_err(classify)?;

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&request.model)
            .messages([ChatCompletionRequestMessage::User(message)])
            .max_tokens(request.max_tokens)
            .temperature(request.temperature)
            .build()
            .map_err(classify)?;

        let response = self.client.chat().create(chat_request).await.map_err(classify)?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| ProviderError::Parse("response carried no message content".to_string()))?;
        let tokens_used = response.usage.map(|u| u.total_tokens).unwrap_or(0);

        Ok(Completion { content, tokens_used })
    }
}

fn classify(err: OpenAIError) -> ProviderError {
    match err {
        OpenAIError::Reqwest(e) => ProviderError::from(e),
        OpenAIError::ApiError(api) => {
            let kind = api.r#type.clone().unwrap_or_default();
            let transient = kind.contains("rate_limit")
                || kind.contains("server_error")
                || kind.contains("overloaded");
            if transient {
                ProviderError::Transient(api.message)
            } else {
                ProviderError::Permanent(api.message)
            }
        }
        OpenAIError::JSONDeserialize(e) => ProviderError::Parse(e.to_string()),
        OpenAIError::InvalidArgument(msg) => ProviderError::Permanent(msg),
        other => ProviderError::Permanent(other.to_string()),
    }
}
