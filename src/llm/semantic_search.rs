use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::database::vector_index::{SearchHit, VectorIndex, VectorIndexError};
use crate::error::RetrievalError;
use crate::providers::traits::EmbeddingProvider;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk_text: String,
    pub source_document: String,
    pub page_number: u32,
    /// Squared L2 distance to the query vector.
    pub distance: f32,
}

impl From<SearchHit> for RetrievedChunk {
    fn from(hit: SearchHit) -> Self {
        Self {
            chunk_text: hit.record.chunk_text,
            source_document: hit.record.meta.source_document,
            page_number: hit.record.meta.page_number,
            distance: hit.distance,
        }
    }
}

/// Nearest-first retrieval results.
pub type RetrievalResult = Vec<RetrievedChunk>;

/// Embeds queries and looks them up in a loaded index.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndex>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<VectorIndex>) -> Self {
        Self { embedder, index }
    }

    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult, RetrievalError> {
        let query_vector = self.embedder.embed(query).await.map_err(RetrievalError::Embedding)?;
        self.search(&query_vector, k)
    }

    pub fn search(&self, query_vector: &[f32], k: usize) -> Result<RetrievalResult, RetrievalError> {
        let hits = self.index.search(query_vector, k).map_err(|e| match e {
            VectorIndexError::DimensionMismatch { expected, actual } => {
                RetrievalError::DimensionMismatch { expected, actual }
            }
            // search only fails on dimension checks
            _ => RetrievalError::DimensionMismatch {
                expected: self.index.dimension(),
                actual: query_vector.len(),
            },
        })?;

        log::debug!("Retrieved {} of {} chunks", hits.len(), self.index.len());
        Ok(hits.into_iter().map(RetrievedChunk::from).collect())
    }
}

pub fn format_results(results: &[RetrievedChunk]) -> String {
    let mut formatted = String::new();

    for (i, result) in results.iter().enumerate() {
        formatted.push_str(&format!(
            "{}. [Distance: {:.4}] {} (page {})\n{}\n\n",
            i + 1,
            result.distance,
            result.source_document,
            result.page_number,
            result.chunk_text.trim()
        ));
    }

    formatted
}
