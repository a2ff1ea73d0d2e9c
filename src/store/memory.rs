// SPDX-License-Identifier: MIT
//! In-memory file store for tests and headless batch sinks.

use super::{Artifact, FileStore};
use anyhow::anyhow;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryFileStore {
    files: RwLock<BTreeMap<PathBuf, String>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with `(path, content)` pairs.
    pub fn with_files<I, P, S>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, S)>,
        P: Into<PathBuf>,
        S: Into<String>,
    {
        let map = files
            .into_iter()
            .map(|(path, content)| (path.into(), content.into()))
            .collect();
        Self {
            files: RwLock::new(map),
        }
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn read(&self, path: &Path) -> anyhow::Result<String> {
        self.files
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("no such file: {}", path.display()))
    }

    async fn create(&self, path: &Path, content: &str) -> anyhow::Result<Artifact> {
        self.files
            .write()
            .await
            .insert(path.to_path_buf(), content.to_string());
        Ok(Artifact::new(path))
    }

    async fn rename(&self, artifact: &Artifact, new_path: &Path) -> anyhow::Result<()> {
        let mut files = self.files.write().await;
        let content = files
            .remove(&artifact.path)
            .ok_or_else(|| anyhow!("no such file: {}", artifact.path.display()))?;
        files.insert(new_path.to_path_buf(), content);
        Ok(())
    }

    async fn list_files(&self) -> anyhow::Result<Vec<PathBuf>> {
        Ok(self.files.read().await.keys().cloned().collect())
    }

    async fn exists(&self, path: &Path) -> bool {
        self.files.read().await.contains_key(path)
    }
}
