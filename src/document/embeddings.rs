use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::document::chunker::Chunk;
use crate::providers::traits::{EmbeddingProvider, ProviderError};

/// A chunk paired with its embedding, ready to be indexed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub vector: Vec<f32>,
    pub chunk: Chunk,
}

#[derive(Clone)]
pub struct EmbeddingGenerator {
    provider: Arc<dyn EmbeddingProvider>,
    concurrency: usize,
}

impl EmbeddingGenerator {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, concurrency: usize) -> Self {
        Self {
            provider,
            concurrency: concurrency.max(1),
        }
    }

    /// Embeds every chunk with at most `concurrency` requests in flight.
    ///
    /// Output order matches input order. The first failure aborts the batch.
    pub async fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<EmbeddedChunk>, ProviderError> {
        let provider = &self.provider;
        stream::iter(chunks)
            .map(|chunk| async move {
                let vector = provider.embed(&chunk.text).await?;
                Ok::<_, ProviderError>(EmbeddedChunk { vector, chunk })
            })
            .buffered(self.concurrency)
            .try_collect()
            .await
    }
}
