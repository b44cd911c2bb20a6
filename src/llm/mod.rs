pub mod citations;
pub mod semantic_search;

pub use citations::{build_prompt, CitationGenerator, CitationMap, CitedAnswer};
pub use semantic_search::{RetrievalResult, RetrievedChunk, Retriever};
