pub mod chunker;
pub mod embeddings;
pub mod processor;

pub use chunker::{document_name, Chunk, Chunker};
pub use embeddings::{EmbeddedChunk, EmbeddingGenerator};
pub use processor::{DocumentProcessor, PageExtractor, PageText, PdfPageExtractor};
