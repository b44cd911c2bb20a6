use async_trait::async_trait;
use crate::config::OpenAIConfig;
use crate::providers::traits::{CompletionProvider, EmbeddingProvider, GenerationParams, ProviderError};
use async_openai::{
    types::{
        CreateEmbeddingRequestArgs,
        EmbeddingInput,
        CreateChatCompletionRequestArgs,
        ChatCompletionRequestMessage,
        ChatCompletionRequestUserMessageArgs,
    },
    Client,
    config::OpenAIConfig as ClientConfig,
};

/// OpenAI-compatible embeddings and chat completions.
#[derive(Clone)]
pub struct OpenAIProvider {
    client: Client<ClientConfig>,
    chat_model: String,
    embedding_model: String,
}

impl OpenAIProvider {
    pub fn new(config: &OpenAIConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ProviderError::Config("missing OPENAI_API_KEY".to_string()))?;

        let mut client_config = ClientConfig::new().with_api_key(api_key);
        if let Some(api_url) = &config.api_url {
            client_config = client_config.with_api_base(api_url.trim_end_matches('/'));
        }

        Ok(Self {
            client: Client::with_config(client_config),
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.embedding_model)
            .input(EmbeddingInput::String(text.to_string()))
            .build()?;

        let response = self.client.embeddings().create(request).await?;

        match response.data.into_iter().next() {
            Some(embedding) if !embedding.embedding.is_empty() => Ok(embedding.embedding),
            Some(_) => Err(ProviderError::MalformedResponse("empty embedding returned".to_string())),
            None => Err(ProviderError::MalformedResponse("no embedding returned".to_string())),
        }
    }

    fn embedding_model(&self) -> &str {
        &self.embedding_model
    }
}

#[async_trait]
impl CompletionProvider for OpenAIProvider {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, ProviderError> {
        let user_message = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.chat_model)
            .messages(vec![ChatCompletionRequestMessage::User(user_message)])
            .max_tokens(u16::try_from(params.max_output_tokens).unwrap_or(u16::MAX))
            .temperature(params.temperature)
            .build()?;

        let response = self.client.chat().create(request).await?;

        response.choices.into_iter().next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::MalformedResponse("no response content".to_string()))
    }

    fn chat_model(&self) -> &str {
        &self.chat_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_api_key() {
        let config = OpenAIConfig {
            api_key: Some("  ".to_string()),
            api_url: None,
            embedding_model: "text-embedding-3-small".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
        };
        assert!(matches!(OpenAIProvider::new(&config), Err(ProviderError::Config(_))));
    }

    #[test]
    fn keeps_configured_models() {
        let config = OpenAIConfig {
            api_key: Some("sk-test".to_string()),
            api_url: Some("http://localhost:8080/v1/".to_string()),
            embedding_model: "embed-small".to_string(),
            chat_model: "chat-small".to_string(),
        };
        let provider = OpenAIProvider::new(&config).unwrap();
        assert_eq!(provider.embedding_model(), "embed-small");
        assert_eq!(provider.chat_model(), "chat-small");
    }
}
