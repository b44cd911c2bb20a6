//! Exact flat vector index over squared L2 distance.
//!
//! Search is a linear scan. Results are ordered by ascending distance and
//! equal distances keep insertion order.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::document::embeddings::EmbeddedChunk;

const BLOB_MAGIC: &[u8; 4] = b"KFIX";
const BLOB_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("No embeddings provided")]
    Empty,
    #[error("Vector dimension must be greater than zero")]
    InvalidDimension,
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Corrupt index: {0}")]
    Corrupt(String),
    #[error("Index blob {index} exists but metadata {metadata} is missing")]
    IncompleteArtifacts { index: PathBuf, metadata: PathBuf },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VectorIndexError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMeta {
    #[serde(alias = "paper")]
    pub source_document: String,
    #[serde(alias = "page")]
    pub page_number: u32,
}

/// One entry of the persisted metadata document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    #[serde(alias = "chunk")]
    pub chunk_text: String,
    pub meta: ChunkMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub record: ChunkRecord,
    pub distance: f32,
}

pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Row-major vector storage.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatL2Index {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatL2Index {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(VectorIndexError::InvalidDimension);
        }
        Ok(Self {
            dimension,
            data: Vec::new(),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn add(&mut self, vector: &[f32]) -> Result<()> {
        self.check_dimension(vector)?;
        self.data.extend_from_slice(vector);
        Ok(())
    }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(VectorIndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Returns `(position, squared distance)` for the `k` nearest vectors.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        self.check_dimension(query)?;

        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dimension)
            .map(|row| squared_l2(row, query))
            .enumerate()
            .collect();

        // stable: ties stay in insertion order
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);
        Ok(scored)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);
        bytes.extend_from_slice(BLOB_MAGIC);
        bytes.extend_from_slice(&BLOB_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.len() as u64).to_le_bytes());
        for value in &self.data {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN || &bytes[0..4] != BLOB_MAGIC {
            return Err(VectorIndexError::Corrupt("not an index blob".to_string()));
        }

        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != BLOB_VERSION {
            return Err(VectorIndexError::Corrupt(format!("unsupported blob version {}", version)));
        }

        let dimension = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&bytes[12..20]);
        let count = u64::from_le_bytes(count_bytes) as usize;

        let mut index = Self::new(dimension).map_err(|_| VectorIndexError::Corrupt("zero dimension".to_string()))?;

        let expected_len = count
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| VectorIndexError::Corrupt("vector count overflows".to_string()))?;
        let payload = &bytes[HEADER_LEN..];
        if payload.len() != expected_len {
            return Err(VectorIndexError::Corrupt(format!(
                "expected {} bytes of vector data, found {}",
                expected_len,
                payload.len()
            )));
        }

        index.data = payload
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(index)
    }
}

/// Vectors plus the parallel metadata records. Position `i` in one is position `i` in the other.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    vectors: FlatL2Index,
    records: Vec<ChunkRecord>,
}

impl VectorIndex {
    /// Builds from scratch. The first vector fixes the dimension.
    pub fn build(entries: Vec<EmbeddedChunk>) -> Result<Self> {
        let dimension = entries.first().map(|e| e.vector.len()).ok_or(VectorIndexError::Empty)?;
        let mut vectors = FlatL2Index::new(dimension)?;
        let mut records = Vec::with_capacity(entries.len());

        for entry in entries {
            vectors.add(&entry.vector)?;
            records.push(ChunkRecord {
                chunk_text: entry.chunk.text,
                meta: ChunkMeta {
                    source_document: entry.chunk.source_document,
                    page_number: entry.chunk.page_number,
                },
            });
        }

        Ok(Self { vectors, records })
    }

    pub fn from_parts(vectors: FlatL2Index, records: Vec<ChunkRecord>) -> Result<Self> {
        if vectors.len() != records.len() {
            return Err(VectorIndexError::Corrupt(format!(
                "{} vectors but {} metadata records",
                vectors.len(),
                records.len()
            )));
        }
        Ok(Self { vectors, records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.vectors.dimension()
    }

    pub fn vectors(&self) -> &FlatL2Index {
        &self.vectors
    }

    pub fn records(&self) -> &[ChunkRecord] {
        &self.records
    }

    /// The `min(k, len)` nearest records, nearest first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        Ok(self
            .vectors
            .search(query, k)?
            .into_iter()
            .map(|(position, distance)| SearchHit {
                record: self.records[position].clone(),
                distance,
            })
            .collect())
    }
}
