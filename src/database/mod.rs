pub mod index_store;
pub mod vector_index;

pub use index_store::IndexStore;
pub use vector_index::{ChunkMeta, ChunkRecord, FlatL2Index, SearchHit, VectorIndex, VectorIndexError};
