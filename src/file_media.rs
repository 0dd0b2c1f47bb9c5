//! Backup files on local disk.

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Metadata handle for a backup on disk. Opening it reads only metadata.
#[derive(Debug, Clone)]
pub struct BackupFile {
    path: PathBuf,
    name: String,
    length: u64,
}

impl BackupFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        Ok(Self {
            path: path.to_path_buf(),
            name,
            length: metadata.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    /// Sync reader over the container.
    pub fn reader(&self) -> Result<File> {
        Ok(File::open(&self.path)?)
    }

    /// Load the whole container with tokio.
    #[cfg(feature = "async")]
    #[cfg_attr(docsrs, doc(cfg(feature = "async")))]
    pub async fn read_async(&self) -> Result<Vec<u8>> {
        use tokio::io::AsyncReadExt;

        let mut file = tokio::fs::File::open(&self.path).await?;
        let mut buffer = Vec::with_capacity(self.length as usize);
        file.read_to_end(&mut buffer).await?;
        Ok(buffer)
    }
}
