use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::StorageConfig;
use crate::database::vector_index::{ChunkRecord, FlatL2Index, Result, VectorIndex, VectorIndexError};
use crate::document::embeddings::EmbeddedChunk;

/// Advisory lock on `index.lock`, released on drop.
struct IndexLock {
    file: File,
}

impl IndexLock {
    fn open(path: &Path) -> Result<File> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?)
    }

    fn shared(path: &Path) -> Result<Self> {
        let file = Self::open(path)?;
        file.lock_shared()?;
        Ok(Self { file })
    }

    fn exclusive(path: &Path) -> Result<Self> {
        let file = Self::open(path)?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }
}

impl Drop for IndexLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Persists a [`VectorIndex`] as an opaque vector blob plus a JSON metadata
/// document. The two files are written and removed together.
#[derive(Debug, Clone)]
pub struct IndexStore {
    storage: StorageConfig,
}

impl IndexStore {
    pub fn new(storage: StorageConfig) -> Self {
        Self { storage }
    }

    pub fn index_path(&self) -> &Path {
        &self.storage.index_path
    }

    pub fn metadata_path(&self) -> &Path {
        &self.storage.metadata_path
    }

    /// True when an index blob is on disk. Metadata alone does not count.
    pub fn exists(&self) -> bool {
        self.storage.index_path.exists()
    }

    /// Loads the persisted pair. `Ok(None)` means there is nothing to load and
    /// a build is required.
    pub fn load(&self) -> Result<Option<VectorIndex>> {
        let _lock = IndexLock::shared(&self.storage.lock_path())?;
        self.load_unlocked()
    }

    pub fn persist(&self, index: &VectorIndex) -> Result<()> {
        let _lock = IndexLock::exclusive(&self.storage.lock_path())?;
        self.persist_unlocked(index)
    }

    /// Loads the persisted index if there is one, otherwise builds from
    /// `entries` and persists the result.
    pub fn build_or_load(&self, entries: Vec<EmbeddedChunk>) -> Result<VectorIndex> {
        let _lock = IndexLock::exclusive(&self.storage.lock_path())?;

        if let Some(index) = self.load_unlocked()? {
            log::info!("Loaded existing index with {} entries", index.len());
            return Ok(index);
        }

        let index = VectorIndex::build(entries)?;
        self.persist_unlocked(&index)?;
        log::info!("Built new index with {} entries", index.len());
        Ok(index)
    }

    /// Builds from `entries` and overwrites whatever is persisted.
    pub fn rebuild(&self, entries: Vec<EmbeddedChunk>) -> Result<VectorIndex> {
        let index = VectorIndex::build(entries)?;
        let _lock = IndexLock::exclusive(&self.storage.lock_path())?;
        self.persist_unlocked(&index)?;
        log::info!("Rebuilt index with {} entries", index.len());
        Ok(index)
    }

    /// Removes both artifacts. Missing files are fine.
    pub fn clear(&self) -> Result<()> {
        let _lock = IndexLock::exclusive(&self.storage.lock_path())?;
        for path in [&self.storage.index_path, &self.storage.metadata_path] {
            match fs::remove_file(path) {
                Ok(()) => log::info!("Removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn load_unlocked(&self) -> Result<Option<VectorIndex>> {
        let index_path = &self.storage.index_path;
        let metadata_path = &self.storage.metadata_path;

        if !index_path.exists() {
            if metadata_path.exists() {
                log::warn!(
                    "Ignoring {} without {}; the index must be rebuilt",
                    metadata_path.display(),
                    index_path.display()
                );
            }
            return Ok(None);
        }
        if !metadata_path.exists() {
            return Err(VectorIndexError::IncompleteArtifacts {
                index: index_path.clone(),
                metadata: metadata_path.clone(),
            });
        }

        let vectors = FlatL2Index::from_bytes(&fs::read(index_path)?)?;
        let records: Vec<ChunkRecord> = serde_json::from_reader(BufReader::new(File::open(metadata_path)?))?;
        VectorIndex::from_parts(vectors, records).map(Some)
    }

    fn persist_unlocked(&self, index: &VectorIndex) -> Result<()> {
        fs::create_dir_all(&self.storage.data_dir)?;

        let index_tmp = tmp_path(&self.storage.index_path);
        let metadata_tmp = tmp_path(&self.storage.metadata_path);

        fs::write(&index_tmp, index.vectors().to_bytes())?;
        let mut writer = BufWriter::new(File::create(&metadata_tmp)?);
        serde_json::to_writer(&mut writer, index.records())?;
        writer.flush()?;
        drop(writer);

        // The blob goes away before the metadata is replaced, so an interrupted
        // persist leaves metadata without a blob (load reports nothing, build
        // runs) and never a new metadata document beside an old blob.
        self.retire_blob()?;
        fs::rename(&metadata_tmp, &self.storage.metadata_path)?;
        fs::rename(&index_tmp, &self.storage.index_path)?;
        Ok(())
    }

    fn retire_blob(&self) -> Result<()> {
        match fs::remove_file(&self.storage.index_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
