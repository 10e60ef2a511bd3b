//! Local filesystem collaborator.
//!
//! Connections forward local-side file queries to a [`Filesystem`]. The
//! operations are enumerated rather than dispatched by name, and errors are
//! plain `io::Error`s handed back to the caller untouched.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

#[async_trait]
pub trait Filesystem: Send + Sync {
    async fn exists(&self, path: &Path) -> io::Result<bool>;

    async fn is_dir(&self, path: &Path) -> io::Result<bool>;

    /// Entries directly under `path`, sorted by name.
    async fn list_contents(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    async fn read_contents(&self, path: &Path) -> io::Result<String>;

    async fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>>;

    async fn write_bytes(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Delete a file, or a directory and everything below it.
    async fn remove(&self, path: &Path) -> io::Result<()>;
}

/// Filesystem rooted at a local directory.
///
/// Relative paths resolve against the root; absolute paths are used as given.
#[derive(Debug, Clone)]
pub struct LocalFilesystem {
    root: PathBuf,
}

impl LocalFilesystem {
    /// Filesystem resolving relative paths against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

impl Default for LocalFilesystem {
    fn default() -> Self {
        Self::new("/")
    }
}

#[async_trait]
impl Filesystem for LocalFilesystem {
    async fn exists(&self, path: &Path) -> io::Result<bool> {
        tokio::fs::try_exists(self.resolve(path)).await
    }

    async fn is_dir(&self, path: &Path) -> io::Result<bool> {
        match tokio::fs::metadata(self.resolve(path)).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn list_contents(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(self.resolve(path)).await?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            paths.push(entry.path());
        }
        paths.sort();
        Ok(paths)
    }

    async fn read_contents(&self, path: &Path) -> io::Result<String> {
        tokio::fs::read_to_string(self.resolve(path)).await
    }

    async fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.resolve(path)).await
    }

    async fn write_bytes(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let target = self.resolve(path);
        debug!("Writing {} bytes to {:?}", contents.len(), target);
        tokio::fs::write(target, contents).await
    }

    async fn remove(&self, path: &Path) -> io::Result<()> {
        let target = self.resolve(path);
        if tokio::fs::metadata(&target).await?.is_dir() {
            tokio::fs::remove_dir_all(target).await
        } else {
            tokio::fs::remove_file(target).await
        }
    }
}
