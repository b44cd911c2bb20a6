use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::document::chunker::{document_name, Chunk, Chunker};
use crate::document::embeddings::{EmbeddedChunk, EmbeddingGenerator};
use crate::error::{IngestionError, RagError, Result};

/// Raw text of one PDF page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 1-based.
    pub page_number: u32,
    pub text: String,
}

/// Yields per-page text for a PDF byte stream. Pages without text come back empty.
pub trait PageExtractor: Send + Sync {
    fn extract_pages(&self, bytes: &[u8]) -> std::result::Result<Vec<PageText>, IngestionError>;
}

/// Page extraction backed by `pdf-extract`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfPageExtractor;

impl PageExtractor for PdfPageExtractor {
    fn extract_pages(&self, bytes: &[u8]) -> std::result::Result<Vec<PageText>, IngestionError> {
        let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
            .map_err(|e| IngestionError::Extract(format!("{:?}", e)))?;

        Ok(pages
            .into_iter()
            .enumerate()
            .map(|(i, text)| PageText {
                page_number: i as u32 + 1,
                text,
            })
            .collect())
    }
}

/// Turns PDF files into embedded, metadata-tagged chunks.
#[derive(Clone)]
pub struct DocumentProcessor {
    extractor: Arc<dyn PageExtractor>,
    chunker: Chunker,
    embeddings: EmbeddingGenerator,
}

impl DocumentProcessor {
    pub fn new(extractor: Arc<dyn PageExtractor>, chunker: Chunker, embeddings: EmbeddingGenerator) -> Self {
        Self {
            extractor,
            chunker,
            embeddings,
        }
    }

    /// Reads and extracts a PDF on the blocking pool.
    pub async fn read_pages(&self, path: &Path) -> Result<Vec<PageText>> {
        let name = document_name(path);
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| RagError::ingestion(&name, e))?;

        let extractor = self.extractor.clone();
        let pages = tokio::task::spawn_blocking(move || extractor.extract_pages(&bytes))
            .await
            .map_err(|e| RagError::ingestion(&name, IngestionError::Extract(e.to_string())))?
            .map_err(|e| RagError::ingestion(&name, e))?;

        Ok(pages)
    }

    pub async fn chunk_document(&self, path: &Path) -> Result<Vec<Chunk>> {
        let pages = self.read_pages(path).await?;
        Ok(self.chunker.chunk_pages(&document_name(path), &pages))
    }

    /// Embeds one document. Any failed embedding aborts the whole document.
    pub async fn embed_document(&self, path: &Path) -> Result<Vec<EmbeddedChunk>> {
        let name = document_name(path);
        let chunks = self.chunk_document(path).await?;
        log::info!("Embedding {} chunks from {}", chunks.len(), name);

        self.embeddings
            .embed_chunks(chunks)
            .await
            .map_err(|e| RagError::ingestion(&name, e))
    }

    /// Embeds documents one after another, concatenating their chunks in input order.
    pub async fn embed_documents(&self, paths: &[PathBuf]) -> Result<Vec<EmbeddedChunk>> {
        let mut all = Vec::new();
        for path in paths {
            all.extend(self.embed_document(path).await?);
        }
        Ok(all)
    }

    pub async fn page_count(&self, path: &Path) -> Result<usize> {
        Ok(self.read_pages(path).await?.len())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::providers::testing::{LengthEmbedder, LookupEmbedder};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    /// Treats file contents as UTF-8 with pages separated by form feeds.
    pub(crate) struct FormFeedExtractor;

    impl PageExtractor for FormFeedExtractor {
        fn extract_pages(&self, bytes: &[u8]) -> std::result::Result<Vec<PageText>, IngestionError> {
            let text = std::str::from_utf8(bytes).map_err(|e| IngestionError::Extract(e.to_string()))?;
            Ok(text
                .split('\u{c}')
                .enumerate()
                .map(|(i, page)| PageText {
                    page_number: i as u32 + 1,
                    text: page.to_string(),
                })
                .collect())
        }
    }

    fn processor(chunk_size: usize) -> DocumentProcessor {
        DocumentProcessor::new(
            Arc::new(FormFeedExtractor),
            Chunker::new(chunk_size).unwrap(),
            EmbeddingGenerator::new(Arc::new(LengthEmbedder), 2),
        )
    }

    #[tokio::test]
    async fn tags_chunks_with_base_name_and_page() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("paperA.pdf");
        std::fs::write(&path, "abcdef\u{c}\u{c}xy").unwrap();

        let chunks = processor(4).chunk_document(&path).await.unwrap();
        let tagged: Vec<(&str, u32, &str)> = chunks
            .iter()
            .map(|c| (c.source_document.as_str(), c.page_number, c.text.as_str()))
            .collect();

        assert_eq!(
            tagged,
            vec![("paperA.pdf", 1, "abcd"), ("paperA.pdf", 1, "ef"), ("paperA.pdf", 3, "xy")]
        );
    }

    #[tokio::test]
    async fn embeds_documents_in_order() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("a.pdf");
        let second = dir.path().join("b.pdf");
        std::fs::write(&first, "one").unwrap();
        std::fs::write(&second, "two\u{c}three").unwrap();

        let embedded = processor(10).embed_documents(&[first, second]).await.unwrap();
        let texts: Vec<&str> = embedded.iter().map(|e| e.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
        assert_eq!(embedded[2].chunk.page_number, 2);
    }

    #[tokio::test]
    async fn embedding_failure_names_the_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, "text").unwrap();

        let processor = DocumentProcessor::new(
            Arc::new(FormFeedExtractor),
            Chunker::default(),
            EmbeddingGenerator::new(Arc::new(LookupEmbedder::new(Vec::<(String, Vec<f32>)>::new())), 1),
        );

        match processor.embed_document(&path).await {
            Err(RagError::Ingestion { document, source: IngestionError::Embedding(_) }) => {
                assert_eq!(document, "broken.pdf");
            }
            other => panic!("unexpected result: {:?}", other.map(|v| v.len())),
        }
    }

    #[tokio::test]
    async fn missing_file_is_an_ingestion_error() {
        let dir = TempDir::new().unwrap();
        let result = processor(4).chunk_document(&dir.path().join("nope.pdf")).await;
        assert!(matches!(result, Err(RagError::Ingestion { source: IngestionError::Read(_), .. })));
    }

    #[test]
    fn rejects_non_pdf_bytes() {
        assert!(matches!(
            PdfPageExtractor.extract_pages(b"definitely not a pdf"),
            Err(IngestionError::Extract(_))
        ));
    }
}
