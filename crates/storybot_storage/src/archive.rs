//! Filesystem archive for generated illustrations.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use storybot_core::IllustrationRef;
use storybot_error::{StoreError, StoreErrorKind};
use tracing::{debug, instrument};

/// Writes image bytes under a directory, named by content hash.
///
/// Identical images map to the same file, so rewriting is harmless.
#[derive(Debug, Clone)]
pub struct IllustrationArchive {
    root: PathBuf,
}

impl IllustrationArchive {
    /// Creates an archive rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Archive directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File name an image would be stored under.
    pub fn file_name(bytes: &[u8], extension: &str) -> String {
        let digest = Sha256::digest(bytes);
        format!("{}.{}", hex::encode(digest), extension)
    }

    /// Stores image bytes and returns a path reference to them.
    #[instrument(skip(self, bytes), fields(bytes = bytes.len(), root = %self.root.display()))]
    pub async fn store(&self, bytes: &[u8], extension: &str) -> Result<IllustrationRef, StoreError> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            StoreError::new(StoreErrorKind::Io(format!(
                "Failed to create {}: {}",
                self.root.display(),
                e
            )))
        })?;

        let path = self.root.join(Self::file_name(bytes, extension));
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            StoreError::new(StoreErrorKind::Io(format!(
                "Failed to write {}: {}",
                path.display(),
                e
            )))
        })?;

        debug!(path = %path.display(), "Archived illustration");
        Ok(IllustrationRef::Path(path))
    }
}
