use parking_lot::RwLock;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::database::{IndexStore, VectorIndex, VectorIndexError};
use crate::document::{document_name, Chunker, DocumentProcessor, EmbeddedChunk, EmbeddingGenerator, PageExtractor};
use crate::error::{IngestionError, RagError, Result};
use crate::llm::{CitationGenerator, CitationMap, RetrievalResult, Retriever};
use crate::providers::Providers;

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub question: String,
    pub answer: String,
    pub citations: CitationMap,
    pub retrieved: RetrievalResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    pub name: String,
    /// `None` when the PDF could not be read.
    pub pages: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexStatus {
    pub loaded: bool,
    pub entries: usize,
    pub dimension: Option<usize>,
    pub documents: Vec<DocumentInfo>,
}

/// Owns the papers folder, the persisted index and the loaded index, and
/// runs the upload / ask / rebuild / clear operations against them.
pub struct KnowledgeBase {
    config: AppConfig,
    store: IndexStore,
    processor: DocumentProcessor,
    providers: Providers,
    index: RwLock<Option<Arc<VectorIndex>>>,
    // serializes build, rebuild and clear
    write_guard: Mutex<()>,
}

impl KnowledgeBase {
    /// Opens the knowledge base, loading a persisted index when one exists.
    pub async fn open(
        config: AppConfig,
        providers: Providers,
        extractor: Arc<dyn PageExtractor>,
    ) -> Result<Self> {
        config.validate()?;
        tokio::fs::create_dir_all(&config.storage.data_dir).await?;
        tokio::fs::create_dir_all(&config.storage.papers_dir).await?;

        let chunker = Chunker::new(config.chunk_size)?;
        let embeddings = EmbeddingGenerator::new(providers.embedder.clone(), config.embed_concurrency);
        let processor = DocumentProcessor::new(extractor, chunker, embeddings);
        let store = IndexStore::new(config.storage.clone());

        let loader = store.clone();
        let index = tokio::task::spawn_blocking(move || loader.load()).await??;
        match &index {
            Some(index) => log::info!("Loaded existing index with {} entries", index.len()),
            None => log::info!("No index available yet"),
        }

        Ok(Self {
            config,
            store,
            processor,
            providers,
            index: RwLock::new(index.map(Arc::new)),
            write_guard: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.index.read().is_some()
    }

    fn current(&self) -> Option<Arc<VectorIndex>> {
        self.index.read().clone()
    }

    fn replace(&self, index: Option<VectorIndex>) -> Option<Arc<VectorIndex>> {
        let index = index.map(Arc::new);
        *self.index.write() = index.clone();
        index
    }

    /// Stores an uploaded PDF in the papers folder under its base filename.
    /// A file that already exists under that name is kept as is.
    pub async fn add_document(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let name = document_name(Path::new(name));
        if name.is_empty() || !name.to_lowercase().ends_with(".pdf") {
            return Err(RagError::ingestion(&name, IngestionError::Unsupported("only .pdf files are accepted".to_string())));
        }

        let path = self.config.storage.papers_dir.join(&name);
        if tokio::fs::try_exists(&path).await? {
            log::info!("{} already uploaded, keeping existing copy", name);
        } else {
            tokio::fs::write(&path, bytes).await?;
            log::info!("Saved {} ({} bytes)", name, bytes.len());
        }
        Ok(path)
    }

    /// Copies a PDF from anywhere on disk into the papers folder.
    pub async fn import_file(&self, source: &Path) -> Result<PathBuf> {
        let bytes = tokio::fs::read(source)
            .await
            .map_err(|e| RagError::ingestion(document_name(source), e))?;
        self.add_document(&document_name(source), &bytes).await
    }

    /// PDFs in the papers folder, sorted by name.
    pub async fn documents(&self) -> Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.config.storage.papers_dir).await?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_pdf = path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("pdf"))
                .unwrap_or(false);
            if is_pdf && entry.file_type().await?.is_file() {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Extracts, chunks and embeds `paths` in order.
    pub async fn ingest(&self, paths: &[PathBuf]) -> Result<Vec<EmbeddedChunk>> {
        self.processor.embed_documents(paths).await
    }

    /// Loads the persisted index if present, otherwise embeds `paths` and
    /// builds and persists a new one.
    pub async fn build_or_load(&self, paths: &[PathBuf]) -> Result<Arc<VectorIndex>> {
        let _guard = self.write_guard.lock().await;

        let loader = self.store.clone();
        if let Some(index) = tokio::task::spawn_blocking(move || loader.load()).await?? {
            log::info!("Loaded existing index with {} entries", index.len());
            return self.replace(Some(index)).ok_or(RagError::IndexUnavailable);
        }

        let entries = self.ingest(paths).await?;
        let store = self.store.clone();
        let index = tokio::task::spawn_blocking(move || store.build_or_load(entries))
            .await?
            .map_err(unavailable_if_empty)?;

        self.replace(Some(index)).ok_or(RagError::IndexUnavailable)
    }

    /// Builds an index from the papers folder if none is loaded.
    /// Returns whether a build happened.
    pub async fn build_if_missing(&self) -> Result<bool> {
        if self.is_loaded() {
            return Ok(false);
        }
        let documents = self.documents().await?;
        if documents.is_empty() {
            return Ok(false);
        }
        self.build_or_load(&documents).await?;
        Ok(true)
    }

    /// Re-embeds every PDF in the papers folder and replaces the index wholesale.
    pub async fn rebuild(&self) -> Result<Arc<VectorIndex>> {
        let _guard = self.write_guard.lock().await;

        let documents = self.documents().await?;
        if documents.is_empty() {
            return Err(RagError::IndexUnavailable);
        }

        log::info!("Rebuilding index from {} documents", documents.len());
        let entries = self.ingest(&documents).await?;
        let store = self.store.clone();
        let index = tokio::task::spawn_blocking(move || store.rebuild(entries))
            .await?
            .map_err(unavailable_if_empty)?;

        self.replace(Some(index)).ok_or(RagError::IndexUnavailable)
    }

    /// Deletes both persisted artifacts and unloads the index.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.write_guard.lock().await;

        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.clear()).await??;
        self.replace(None);
        log::info!("Index cleared");
        Ok(())
    }

    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult> {
        let index = self.current().ok_or(RagError::IndexUnavailable)?;
        let retriever = Retriever::new(self.providers.embedder.clone(), index);
        Ok(retriever.retrieve(query, k).await?)
    }

    /// Answers `question` from the loaded index. `k` defaults to the configured top-k.
    pub async fn ask(&self, question: &str, k: Option<usize>) -> Result<Answer> {
        let k = k.unwrap_or(self.config.top_k);
        let retrieved = self.retrieve(question, k).await?;

        let generator = CitationGenerator::new(self.providers.completer.clone(), self.config.generation);
        let cited = generator.generate(question, &retrieved).await?;

        Ok(Answer {
            question: question.to_string(),
            answer: cited.answer,
            citations: cited.citations,
            retrieved,
        })
    }

    pub async fn status(&self) -> Result<IndexStatus> {
        let index = self.current();
        let mut documents = Vec::new();
        for path in self.documents().await? {
            let pages = match self.processor.page_count(&path).await {
                Ok(count) => Some(count),
                Err(e) => {
                    log::warn!("Could not read {}: {}", path.display(), e);
                    None
                }
            };
            documents.push(DocumentInfo {
                name: document_name(&path),
                pages,
            });
        }

        Ok(IndexStatus {
            loaded: index.is_some(),
            entries: index.as_ref().map(|i| i.len()).unwrap_or(0),
            dimension: index.as_ref().map(|i| i.dimension()),
            documents,
        })
    }
}

fn unavailable_if_empty(e: VectorIndexError) -> RagError {
    match e {
        VectorIndexError::Empty => RagError::IndexUnavailable,
        other => RagError::Index(other),
    }
}
