//! File system abstraction for testability.
//!
//! The store snapshot and exported artifacts go through this trait so tests
//! can run against an in-memory file system.

use async_trait::async_trait;
use std::path::Path;
use tokio::fs;

/// Result type for file system operations.
pub type FsResult<T> = Result<T, std::io::Error>;

/// Abstraction over file system operations for testability.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Read the entire contents of a file as a string.
    async fn read_to_string(&self, path: &Path) -> FsResult<String>;

    /// Write string content to a file, creating it if it doesn't exist.
    async fn write(&self, path: &Path, content: &str) -> FsResult<()>;

    /// Write bytes to a file, creating it if it doesn't exist.
    async fn write_bytes(&self, path: &Path, content: &[u8]) -> FsResult<()>;

    /// Create a directory and all parent directories.
    async fn create_dir_all(&self, path: &Path) -> FsResult<()>;

    /// Check if a path exists.
    async fn exists(&self, path: &Path) -> bool;

    /// Rename/move a file.
    async fn rename(&self, from: &Path, to: &Path) -> FsResult<()>;
}

/// Real implementation using Tokio's async file system.
#[derive(Debug, Clone, Default)]
pub struct TokioFileSystem;

impl TokioFileSystem {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystem for TokioFileSystem {
    async fn read_to_string(&self, path: &Path) -> FsResult<String> {
        fs::read_to_string(path).await
    }

    async fn write(&self, path: &Path, content: &str) -> FsResult<()> {
        fs::write(path, content).await
    }

    async fn write_bytes(&self, path: &Path, content: &[u8]) -> FsResult<()> {
        fs::write(path, content).await
    }

    async fn create_dir_all(&self, path: &Path) -> FsResult<()> {
        fs::create_dir_all(path).await
    }

    async fn exists(&self, path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }

    async fn rename(&self, from: &Path, to: &Path) -> FsResult<()> {
        fs::rename(from, to).await
    }
}

/// Mock implementation for testing.
#[cfg(test)]
pub use mock::MockFileSystem;
