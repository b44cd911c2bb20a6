use thiserror::Error;

use crate::config::ConfigError;
use crate::database::vector_index::VectorIndexError;
use crate::providers::traits::ProviderError;

/// Why a document could not be ingested.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("could not read file: {0}")]
    Read(#[from] std::io::Error),
    #[error("could not extract text: {0}")]
    Extract(String),
    #[error("unsupported document: {0}")]
    Unsupported(String),
    #[error("embedding request failed: {0}")]
    Embedding(#[from] ProviderError),
}

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("query embedding failed: {0}")]
    Embedding(#[source] ProviderError),
    #[error("query vector has {actual} dimensions but the index was built with {expected}; rebuild the index with the current embedding model")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Failed to ingest {document}: {source}")]
    Ingestion {
        document: String,
        #[source]
        source: IngestionError,
    },
    #[error("No index available. Upload documents and build the index first.")]
    IndexUnavailable,
    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),
    #[error("Generation failed: {0}")]
    Generation(#[source] ProviderError),
    #[error("Index error: {0}")]
    Index(#[from] VectorIndexError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Background task failed: {0}")]
    Task(String),
}

impl RagError {
    pub fn ingestion(document: impl Into<String>, source: impl Into<IngestionError>) -> Self {
        RagError::Ingestion {
            document: document.into(),
            source: source.into(),
        }
    }
}

impl From<tokio::task::JoinError> for RagError {
    fn from(e: tokio::task::JoinError) -> Self {
        RagError::Task(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
