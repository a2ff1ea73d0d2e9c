// SPDX-License-Identifier: MIT
//! Template discovery over a [`FileStore`].
//!
//! Lists the templates under the prompts directory (skipping anything in a
//! `trash` folder), exposes their `PromptInfo` metadata and an id→path map
//! keyed `<parent-dir>/<promptId>`, and scaffolds new template files.

use super::frontmatter::{self, PromptInfo};
use super::Template;
use crate::error::{ContextBuildError, GenError};
use crate::store::{Artifact, FileStore};
use anyhow::anyhow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// One discovered template.
#[derive(Debug, Clone)]
pub struct TemplateEntry {
    /// Path relative to the prompts directory.
    pub title: String,
    pub path: PathBuf,
    pub info: Option<PromptInfo>,
}

pub struct TemplateLibrary {
    store: Arc<dyn FileStore>,
    prompts_path: PathBuf,
}

impl TemplateLibrary {
    pub fn new(store: Arc<dyn FileStore>, prompts_path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            prompts_path: prompts_path.into(),
        }
    }

    /// Every template under the prompts directory.
    pub async fn templates(&self) -> anyhow::Result<Vec<TemplateEntry>> {
        let mut entries = Vec::new();
        for path in self.store.list_files().await? {
            if !path.starts_with(&self.prompts_path) {
                continue;
            }
            if path.components().any(|c| c.as_os_str() == "trash") {
                continue;
            }
            let content = match self.store.read(&path).await {
                Ok(content) => content,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable template");
                    continue;
                }
            };
            let info = frontmatter::split(&content)
                .ok()
                .and_then(|(fm, _)| fm.prompt_info);
            let title = path
                .strip_prefix(&self.prompts_path)
                .unwrap_or(&path)
                .to_string_lossy()
                .into_owned();
            entries.push(TemplateEntry { title, path, info });
        }
        debug!(count = entries.len(), "discovered templates");
        Ok(entries)
    }

    /// Map from `<parent-dir>/<promptId>` to template path.
    pub async fn id_map(&self) -> anyhow::Result<BTreeMap<String, PathBuf>> {
        let mut map = BTreeMap::new();
        for entry in self.templates().await? {
            let Some(id) = entry.info.as_ref().and_then(|i| i.prompt_id.clone()) else {
                continue;
            };
            let parent = entry
                .path
                .parent()
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            map.insert(format!("{parent}/{id}"), entry.path);
        }
        Ok(map)
    }

    /// Load and parse a template by its id-map key.
    pub async fn template_by_id(&self, id: &str) -> Result<(PathBuf, Template), GenError> {
        let map = self
            .id_map()
            .await
            .map_err(|reason| ContextBuildError::TemplateRead {
                path: PathBuf::from(id),
                reason,
            })?;
        let path = map
            .get(id)
            .cloned()
            .ok_or_else(|| ContextBuildError::TemplateRead {
                path: PathBuf::from(id),
                reason: anyhow!("no template with id `{id}`"),
            })?;
        let content =
            self.store
                .read(&path)
                .await
                .map_err(|reason| ContextBuildError::TemplateRead {
                    path: path.clone(),
                    reason,
                })?;
        let template = Template::parse(&content).map_err(ContextBuildError::Parse)?;
        Ok((path, template))
    }

    /// Write a new template under `<prompts>/local/<title>.md`, injecting a
    /// `PromptInfo` scaffold unless the content already carries one.
    pub async fn create_template(
        &self,
        content: &str,
        title: &str,
    ) -> Result<Artifact, GenError> {
        let scaffold = prompt_info_block(title);
        let templated = if !content.starts_with("---") {
            format!("---\n{scaffold}\n---\n{content}")
        } else if !content.contains("PromptInfo") {
            content.replacen("---", &format!("---\n{scaffold}"), 1)
        } else {
            content.to_string()
        };
        let path = self
            .prompts_path
            .join("local")
            .join(format!("{title}.md"));
        self.store
            .create(&path, &templated)
            .await
            .map_err(|err| GenError::Sink(err.to_string()))
    }
}

fn prompt_info_block(title: &str) -> String {
    format!(
        "PromptInfo:\n  promptId: {title}\n  name: {title}\n  description: {title}\n  author: \"\"\n  tags: \"\"\n  version: 0.0.1"
    )
}
