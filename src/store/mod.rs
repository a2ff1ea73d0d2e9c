// SPDX-License-Identifier: MIT
//! The file store boundary.
//!
//! Hosts a vault, workspace, or plain directory of documents behind one
//! async trait. The pipeline uses it for template loading, batch artifact
//! sinks, and rename-mode insertion. Errors are `anyhow` at this seam —
//! host implementations do arbitrary I/O and the pipeline only needs the
//! message.

mod fs;
mod memory;

pub use fs::FsFileStore;
pub use memory::MemoryFileStore;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Handle to a stored artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
pub trait FileStore: Send + Sync {
    async fn read(&self, path: &Path) -> anyhow::Result<String>;

    /// Create (or overwrite) a file, creating parent directories as needed.
    async fn create(&self, path: &Path, content: &str) -> anyhow::Result<Artifact>;

    async fn rename(&self, artifact: &Artifact, new_path: &Path) -> anyhow::Result<()>;

    /// Every file the store knows about.
    async fn list_files(&self) -> anyhow::Result<Vec<PathBuf>>;

    async fn exists(&self, path: &Path) -> bool;
}
