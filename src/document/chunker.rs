//! Fixed-size page chunking.
//!
//! Text is cut into contiguous, non-overlapping windows of `chunk_size`
//! characters. Chunks never span pages, so every chunk maps back to
//! exactly one document page.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::{ConfigError, DEFAULT_CHUNK_SIZE};
use crate::document::processor::PageText;

/// A slice of one page's text, the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source_document: String,
    /// 1-based.
    pub page_number: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self { chunk_size: DEFAULT_CHUNK_SIZE }
    }
}

impl Chunker {
    pub fn new(chunk_size: usize) -> Result<Self, ConfigError> {
        if chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                name: "chunk_size".to_string(),
                value: chunk_size.to_string(),
            });
        }
        Ok(Self { chunk_size })
    }

    /// Splits `text` into windows of at most `chunk_size` characters.
    pub fn split_text<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut pieces = Vec::new();
        let mut start = 0;
        let mut count = 0;

        for (offset, _) in text.char_indices() {
            if count == self.chunk_size {
                pieces.push(&text[start..offset]);
                start = offset;
                count = 0;
            }
            count += 1;
        }
        if start < text.len() {
            pieces.push(&text[start..]);
        }
        pieces
    }

    /// Chunks a single page. Pages without extractable text produce nothing;
    /// any other text, whitespace included, is covered by the chunks.
    pub fn chunk_page(&self, source_document: &str, page_number: u32, text: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return Vec::new();
        }

        self.split_text(text)
            .into_iter()
            .map(|piece| Chunk {
                text: piece.to_string(),
                source_document: source_document.to_string(),
                page_number,
            })
            .collect()
    }

    pub fn chunk_pages(&self, source_document: &str, pages: &[PageText]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for page in pages {
            let page_chunks = self.chunk_page(source_document, page.page_number, &page.text);
            if page_chunks.is_empty() {
                log::debug!("Skipping {} page {}: no extractable text", source_document, page.page_number);
            }
            chunks.extend(page_chunks);
        }
        chunks
    }
}

/// Base filename used to tag chunks, e.g. `papers/paperA.pdf` -> `paperA.pdf`.
pub fn document_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
