use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::StorageError;
use crate::store::BlobStore;

/// Blob store over a flat directory; each key is one file.
pub struct FileStorage {
    files_directory: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(files_directory: P) -> Self {
        Self {
            files_directory: files_directory.as_ref().to_path_buf(),
        }
    }

    pub fn files_directory(&self) -> &Path {
        &self.files_directory
    }

    /// Where the blob for `key` lives, whether or not it exists yet.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.files_directory.join(key)
    }

    async fn ensure_directory(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.files_directory)
            .await
            .map_err(|e| StorageError::CreateDirectory {
                path: self.files_directory.clone(),
                source: e,
            })
    }
}

fn is_plain_key(key: &str) -> bool {
    !key.is_empty()
        && key != "."
        && key != ".."
        && !key.contains(['/', '\\'])
}

#[async_trait]
impl BlobStore for FileStorage {
    async fn write_blob(&self, key: &str, data: &[u8]) -> Result<PathBuf, StorageError> {
        let path = self.path_for(key);
        if !is_plain_key(key) {
            return Err(StorageError::WriteFile {
                path,
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "blob key must be a plain file name",
                ),
            });
        }

        self.ensure_directory().await?;

        // create_new is O_CREAT | O_EXCL: an existing blob is never replaced.
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StorageError::FileExists(path));
            }
            Err(e) => return Err(StorageError::WriteFile { path, source: e }),
        };

        let write_failed = |e| StorageError::WriteFile {
            path: path.clone(),
            source: e,
        };
        file.write_all(data).await.map_err(write_failed)?;
        file.flush().await.map_err(write_failed)?;

        log::debug!("Wrote {} bytes to {}", data.len(), path.display());
        Ok(path)
    }
}
