// SPDX-License-Identifier: MIT
//! Filesystem-backed store rooted at a directory.

use super::{Artifact, FileStore};
use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct FsFileStore {
    root: PathBuf,
}

impl FsFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

#[async_trait]
impl FileStore for FsFileStore {
    async fn read(&self, path: &Path) -> anyhow::Result<String> {
        let full = self.absolute(path);
        tokio::fs::read_to_string(&full)
            .await
            .with_context(|| format!("failed to read {}", full.display()))
    }

    async fn create(&self, path: &Path, content: &str) -> anyhow::Result<Artifact> {
        let full = self.absolute(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&full, content)
            .await
            .with_context(|| format!("failed to write {}", full.display()))?;
        Ok(Artifact::new(path))
    }

    async fn rename(&self, artifact: &Artifact, new_path: &Path) -> anyhow::Result<()> {
        let from = self.absolute(&artifact.path);
        let to = self.absolute(new_path);
        tokio::fs::rename(&from, &to)
            .await
            .with_context(|| format!("failed to rename {} to {}", from.display(), to.display()))
    }

    async fn list_files(&self) -> anyhow::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut dirs = vec![self.root.clone()];
        while let Some(dir) = dirs.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .with_context(|| format!("failed to list {}", dir.display()))?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    dirs.push(path);
                } else if let Ok(relative) = path.strip_prefix(&self.root) {
                    files.push(relative.to_path_buf());
                }
            }
        }
        files.sort();
        Ok(files)
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(self.absolute(path)).await.unwrap_or(false)
    }
}
