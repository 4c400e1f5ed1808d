//! JSON file checkpoint store
//!
//! Layout under the data directory:
//!
//! ```text
//! urls.json
//! novels/{id}/novel_detail.json
//! novels/{id}/chapter_list.json
//! novels/{id}/chapters/chapter_{n}.json
//! ```

use crate::state::{CatalogIndex, DetailRecord, SubitemContent, SubitemList};
use crate::storage::traits::{CheckpointStore, StorageError, StorageResult};
use crate::url::is_plain_segment;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Checkpoint store backed by pretty-printed JSON files
#[derive(Debug, Clone)]
pub struct FsCheckpointStore {
    root: PathBuf,
}

impl FsCheckpointStore {
    /// Opens a store rooted at `root`, creating the directory if needed
    pub fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.root.join("urls.json")
    }

    /// Directory of one item; ids that are not a plain path segment are refused
    fn novel_dir(&self, id: &str) -> StorageResult<PathBuf> {
        if !is_plain_segment(id) {
            return Err(StorageError::InvalidId(id.to_string()));
        }
        Ok(self.root.join("novels").join(id))
    }

    pub fn detail_path(&self, id: &str) -> StorageResult<PathBuf> {
        Ok(self.novel_dir(id)?.join("novel_detail.json"))
    }

    pub fn subitem_list_path(&self, id: &str) -> StorageResult<PathBuf> {
        Ok(self.novel_dir(id)?.join("chapter_list.json"))
    }

    pub fn subitem_path(&self, id: &str, index: u32) -> StorageResult<PathBuf> {
        Ok(self
            .novel_dir(id)?
            .join("chapters")
            .join(format!("chapter_{}.json", index)))
    }
}

impl CheckpointStore for FsCheckpointStore {
    fn read_catalog(&self) -> StorageResult<CatalogIndex> {
        match read_json(&self.catalog_path()) {
            Err(StorageError::NotFound(_)) => {
                tracing::debug!("No catalog index yet, starting empty");
                Ok(CatalogIndex::new())
            }
            other => other,
        }
    }

    fn write_catalog(&self, catalog: &CatalogIndex) -> StorageResult<()> {
        write_json_atomic(&self.catalog_path(), catalog)
    }

    fn read_detail(&self, id: &str) -> StorageResult<DetailRecord> {
        read_json(&self.detail_path(id)?)
    }

    fn write_detail(&self, detail: &DetailRecord) -> StorageResult<()> {
        write_json_atomic(&self.detail_path(&detail.id)?, detail)
    }

    fn read_subitem_list(&self, id: &str) -> StorageResult<SubitemList> {
        read_json(&self.subitem_list_path(id)?)
    }

    fn write_subitem_list(&self, id: &str, list: &SubitemList) -> StorageResult<()> {
        write_json_atomic(&self.subitem_list_path(id)?, list)
    }

    fn has_subitem(&self, id: &str, index: u32) -> bool {
        self.subitem_path(id, index)
            .map_or(false, |path| path.is_file())
    }

    fn read_subitem(&self, id: &str, index: u32) -> StorageResult<SubitemContent> {
        read_json(&self.subitem_path(id, index)?)
    }

    fn write_subitem(&self, id: &str, content: &SubitemContent) -> StorageResult<()> {
        write_json_atomic(&self.subitem_path(id, content.index)?, content)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> StorageResult<T> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(StorageError::NotFound(path.display().to_string()))
        }
        Err(err) => return Err(err.into()),
    };
    serde_json::from_slice(&bytes).map_err(|source| StorageError::Corrupt {
        path: path.display().to_string(),
        source,
    })
}

/// Serializes into a temp file beside `path`, syncs it, then renames over `path`
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> StorageResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| StorageError::NotFound(format!("parent of {}", path.display())))?;
    std::fs::create_dir_all(parent)?;

    let tmp = NamedTempFile::new_in(parent)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| StorageError::Commit {
        path: path.display().to_string(),
        source: err.error,
    })?;
    Ok(())
}
