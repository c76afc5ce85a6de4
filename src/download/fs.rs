//! Filesystem capability: output sinks and best-effort removal.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncWrite, BufWriter};

/// Writable output for one download. Dropping it releases the handle.
pub type FileSink = Box<dyn AsyncWrite + Send + Unpin>;

/// Capability to create and remove download output files.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Creates (or truncates) the file at `path` and returns a sink for it.
    ///
    /// # Errors
    ///
    /// Returns the IO error from opening the file.
    async fn create_sink(&self, path: &Path) -> io::Result<FileSink>;

    /// Removes the file at `path`. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns any IO error other than `NotFound`.
    async fn remove(&self, path: &Path) -> io::Result<()>;
}

/// [`FileSystem`] backed by `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn create_sink(&self, path: &Path) -> io::Result<FileSink> {
        let file = File::create(path).await?;
        Ok(Box::new(BufWriter::new(file)))
    }

    async fn remove(&self, path: &Path) -> io::Result<()> {
        match tokio::fs::remove_file(path).await {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;
    use tokio::io::AsyncWriteExt;

    use super::*;

    #[tokio::test]
    async fn test_sink_writes_after_shutdown() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.bin");

        let mut sink = LocalFileSystem.create_sink(&path).await.unwrap();
        sink.write_all(b"hello").await.unwrap();
        sink.shutdown().await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_create_sink_truncates_existing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.bin");
        std::fs::write(&path, b"old contents that are longer").unwrap();

        let mut sink = LocalFileSystem.create_sink(&path).await.unwrap();
        sink.write_all(b"new").await.unwrap();
        sink.shutdown().await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_create_sink_in_missing_directory_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing").join("out.bin");
        assert!(LocalFileSystem.create_sink(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_remove_missing_file_is_ok() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("never-created.bin");
        assert!(LocalFileSystem.remove(&path).await.is_ok());
    }

    #[tokio::test]
    async fn test_remove_deletes_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("partial.bin");
        std::fs::write(&path, b"partial").unwrap();

        LocalFileSystem.remove(&path).await.unwrap();
        assert!(!path.exists());
    }
}
