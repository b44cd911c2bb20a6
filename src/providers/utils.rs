use crate::config::{AppConfig, ProviderKind};
use crate::providers::bedrock::BedrockProvider;
use crate::providers::openai::OpenAIProvider;
use crate::providers::traits::{CompletionProvider, EmbeddingProvider, ProviderError};
use std::sync::Arc;

/// The pair of hosted services the pipeline talks to.
#[derive(Clone)]
pub struct Providers {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub completer: Arc<dyn CompletionProvider>,
}

impl Providers {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, completer: Arc<dyn CompletionProvider>) -> Self {
        Self { embedder, completer }
    }
}

/// Builds the configured provider. One client serves both embeddings and generation.
pub fn build_providers(config: &AppConfig) -> Result<Providers, ProviderError> {
    match config.provider {
        ProviderKind::Bedrock => {
            let provider = Arc::new(BedrockProvider::new(&config.bedrock, config.http_timeout)?);
            log::info!(
                "Using Bedrock in {} (embeddings: {}, chat: {})",
                config.bedrock.region,
                config.bedrock.embedding_model,
                config.bedrock.chat_model
            );
            Ok(Providers::new(provider.clone(), provider))
        }
        ProviderKind::OpenAI => {
            let provider = Arc::new(OpenAIProvider::new(&config.openai)?);
            log::info!(
                "Using OpenAI-compatible API (embeddings: {}, chat: {})",
                config.openai.embedding_model,
                config.openai.chat_model
            );
            Ok(Providers::new(provider.clone(), provider))
        }
    }
}
