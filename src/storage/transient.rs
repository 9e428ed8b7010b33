//! Transient artifact storage
//!
//! Each accepted upload is written to a single file under the upload
//! directory. Files are named `<field>-<millis>-<uuid>.<ext>` so concurrent
//! requests never collide, and the file name doubles as the artifact id.
//! Writes go to a `.part` file first and are renamed into place, so the
//! worker never sees a half-written artifact.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

/// A stored upload awaiting or undergoing extraction.
#[derive(Debug, Clone, Serialize)]
pub struct UploadArtifact {
    /// File name inside the store; unique per upload
    pub id: String,

    /// Absolute path handed to the extraction worker
    pub path: PathBuf,

    pub created_at: DateTime<Utc>,

    /// MIME type declared by the client
    pub content_type: String,

    pub size: u64,
}

/// One file found in the store while listing, with its age.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub path: PathBuf,
    pub age: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Invalid artifact id: {0:?}")]
    InvalidId(String),

    #[error("Storage I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// On-disk store for uploaded artifacts, shared by every request and the reaper.
#[derive(Debug, Clone)]
pub struct TransientStore {
    root: PathBuf,
}

impl TransientStore {
    /// Open (creating if needed) the store rooted at `root`.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref();
        fs::create_dir_all(root)
            .await
            .map_err(|e| StorageError::io(root, e))?;
        let root = fs::canonicalize(root)
            .await
            .map_err(|e| StorageError::io(root, e))?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist `bytes` as a new artifact. `prefix` is the upload field name.
    pub async fn store(
        &self,
        prefix: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<UploadArtifact, StorageError> {
        let created_at = Utc::now();
        let id = format!(
            "{}-{}-{}.{}",
            sanitize_prefix(prefix),
            created_at.timestamp_millis(),
            Uuid::new_v4().simple(),
            extension_for(content_type),
        );
        let path = self.root.join(&id);
        let staging = self.root.join(format!("{}.part", id));

        if let Err(e) = fs::write(&staging, bytes).await {
            let _ = fs::remove_file(&staging).await;
            return Err(StorageError::io(&staging, e));
        }
        if let Err(e) = fs::rename(&staging, &path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(StorageError::io(&path, e));
        }

        debug!(artifact = %id, size = bytes.len(), "Stored upload artifact");

        Ok(UploadArtifact {
            id,
            path,
            created_at,
            content_type: content_type.to_string(),
            size: bytes.len() as u64,
        })
    }

    /// Delete an artifact by id. `NotFound` means it was already gone.
    pub async fn remove(&self, id: &str) -> Result<(), StorageError> {
        let path = self.path_for(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(artifact = %id, "Removed upload artifact");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(id.to_string())),
            Err(e) => Err(StorageError::io(&path, e)),
        }
    }

    pub async fn contains(&self, id: &str) -> bool {
        match self.path_for(id) {
            Ok(path) => fs::metadata(path).await.is_ok(),
            Err(_) => false,
        }
    }

    /// List every file in the store with its age (from modification time).
    ///
    /// Entries that vanish or cannot be stat'ed mid-listing are skipped with a
    /// warning; only failing to read the directory itself is an error.
    pub async fn list_all(&self) -> Result<Vec<StoredEntry>, StorageError> {
        let mut dir = fs::read_dir(&self.root)
            .await
            .map_err(|e| StorageError::io(&self.root, e))?;
        let now = SystemTime::now();
        let mut entries = Vec::new();

        loop {
            let entry = match dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to read entry in {:?}: {}", self.root, e);
                    break;
                }
            };
            let path = entry.path();
            let metadata = match entry.metadata().await {
                Ok(m) => m,
                Err(e) => {
                    warn!("Failed to stat {:?}: {}", path, e);
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }
            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            entries.push(StoredEntry { path, age });
        }

        Ok(entries)
    }

    /// Delete a listed entry by path. Used by the reaper, which works from
    /// listings rather than ids.
    pub async fn remove_path(&self, path: &Path) -> Result<(), StorageError> {
        if path.parent() != Some(self.root.as_path()) {
            return Err(StorageError::InvalidId(path.display().to_string()));
        }
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, StorageError> {
        let is_plain_name = !id.is_empty()
            && id != "."
            && id != ".."
            && !id.contains(|c: char| c == '/' || c == '\\');
        if !is_plain_name {
            return Err(StorageError::InvalidId(id.to_string()));
        }
        Ok(self.root.join(id))
    }
}

fn sanitize_prefix(prefix: &str) -> String {
    let cleaned: String = prefix
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

fn extension_for(content_type: &str) -> &'static str {
    mime_guess::get_mime_extensions_str(content_type)
        .and_then(|exts| exts.first().copied())
        .unwrap_or("bin")
}
