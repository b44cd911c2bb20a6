//! Deterministic provider doubles for unit tests.

use async_trait::async_trait;
use crate::providers::traits::{CompletionProvider, EmbeddingProvider, GenerationParams, ProviderError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Returns a fixed vector per known text and fails on anything else.
pub struct LookupEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    fallback: Option<Vec<f32>>,
    pub calls: AtomicUsize,
}

impl LookupEmbedder {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<f32>)>,
        S: Into<String>,
    {
        Self {
            vectors: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            fallback: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_fallback(mut self, vector: Vec<f32>) -> Self {
        self.fallback = Some(vector);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for LookupEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.vectors
            .get(text)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| ProviderError::MalformedResponse(format!("missing `embedding` for {:?}", text)))
    }

    fn embedding_model(&self) -> &str {
        "lookup-embedder"
    }
}

/// Embeds text as `[len, first byte]`, enough to tell chunks apart.
pub struct LengthEmbedder;

#[async_trait]
impl EmbeddingProvider for LengthEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let first = text.bytes().next().unwrap_or(0);
        Ok(vec![text.chars().count() as f32, first as f32])
    }

    fn embedding_model(&self) -> &str {
        "length-embedder"
    }
}

/// Replies with a canned answer and records every prompt it was sent.
pub struct CannedCompleter {
    answer: Option<String>,
    pub prompts: Mutex<Vec<(String, GenerationParams)>>,
}

impl CannedCompleter {
    pub fn answering(answer: impl Into<String>) -> Self {
        Self {
            answer: Some(answer.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn malformed() -> Self {
        Self {
            answer: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().last().map(|(prompt, _)| prompt.clone())
    }
}

#[async_trait]
impl CompletionProvider for CannedCompleter {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, ProviderError> {
        self.prompts.lock().push((prompt.to_string(), *params));
        self.answer
            .clone()
            .ok_or_else(|| ProviderError::MalformedResponse("missing output.message.content[0].text".to_string()))
    }

    fn chat_model(&self) -> &str {
        "canned-completer"
    }
}
