// SPDX-License-Identifier: MIT
//! Context building — resolving everything a generation needs into one
//! immutable value.
//!
//! A [`Context`] is built once per generation request, never mutated
//! afterwards, and owned by the call that created it; batch generation
//! builds one per target up front so nothing shared is written during the
//! run. Variable precedence is documented in [`options`].

pub mod options;

pub use options::{GenerationOptions, Overrides};

use crate::config::Settings;
use crate::error::ContextBuildError;
use crate::store::FileStore;
use crate::surface::{Position, SelectionEdge, TextSurface};
use crate::template::{frontmatter, Template, TemplateFrontmatter, VarMap};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Ambient editor state captured at request time.
///
/// All fields are plain data — capturing them decouples context building
/// from surface locking.
#[derive(Debug, Clone, Default)]
pub struct EditorState {
    /// Whole document text.
    pub content: String,
    pub cursor: Position,
    /// Selected text, when a selection exists.
    pub selection: Option<String>,
    /// Display title of the active document.
    pub title: Option<String>,
    pub file_path: Option<PathBuf>,
    /// System clipboard contents, when the host exposes them.
    pub clipboard: Option<String>,
}

impl EditorState {
    /// Snapshot a live surface.
    pub fn capture(
        surface: &dyn TextSurface,
        title: Option<String>,
        file_path: Option<PathBuf>,
        clipboard: Option<String>,
    ) -> Self {
        let selection = surface
            .selection()
            .map(|(from, to)| surface.get_range(from, to))
            .filter(|s| !s.is_empty());
        Self {
            content: surface.content(),
            cursor: surface.cursor(SelectionEdge::To),
            selection,
            title,
            file_path,
            clipboard,
        }
    }
}

/// The resolved generation input. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct Context {
    /// Prompt text ready to send to the backend.
    pub prompt_text: String,
    pub template_path: Option<PathBuf>,
    pub options: GenerationOptions,
    /// Every resolved variable, by name.
    pub raw_variables: VarMap,
    /// The parsed template, kept for output-section rendering.
    pub template: Option<Arc<Template>>,
}

impl Context {
    /// A context around a raw prompt, bypassing templates entirely.
    pub fn from_prompt(prompt: impl Into<String>, options: GenerationOptions) -> Self {
        Self {
            prompt_text: prompt.into(),
            template_path: None,
            options,
            raw_variables: VarMap::new(),
            template: None,
        }
    }
}

/// One context-building request.
#[derive(Debug, Clone, Default)]
pub struct ContextRequest {
    pub template_path: Option<PathBuf>,
    /// Pre-parsed template; takes precedence over `template_path` loading.
    pub template: Option<Arc<Template>>,
    pub editor: Option<EditorState>,
    /// Batch target file, read through the store when no editor is given.
    pub file_path: Option<PathBuf>,
    pub overrides: Overrides,
    /// Whether the ambient document's own frontmatter contributes variables.
    pub insert_metadata: bool,
    /// Build a length-representative context without a live editor and
    /// without enforcing required variables. Never touches the network.
    pub estimating: bool,
}

pub struct ContextBuilder {
    settings: Settings,
    store: Arc<dyn FileStore>,
}

impl ContextBuilder {
    pub fn new(settings: Settings, store: Arc<dyn FileStore>) -> Self {
        Self { settings, store }
    }

    /// Load and parse a template file from the store.
    pub async fn load_template(&self, path: &Path) -> Result<Template, ContextBuildError> {
        let raw = self
            .store
            .read(path)
            .await
            .map_err(|reason| ContextBuildError::TemplateRead {
                path: path.to_path_buf(),
                reason,
            })?;
        Ok(Template::parse(&raw)?)
    }

    /// Resolve one generation context.
    pub async fn get_context(&self, req: ContextRequest) -> Result<Context, ContextBuildError> {
        let template = match (&req.template, &req.template_path) {
            (Some(template), _) => Some(template.clone()),
            (None, Some(path)) => Some(Arc::new(self.load_template(path).await?)),
            (None, None) => None,
        };
        let default_frontmatter = TemplateFrontmatter::default();
        let fm = template
            .as_ref()
            .map(|t| t.frontmatter())
            .unwrap_or(&default_frontmatter);

        // lowest layer first; later inserts overwrite earlier ones
        let mut vars = VarMap::new();
        for (name, value) in &self.settings.default_vars {
            vars.insert(name.clone(), json!(value));
        }
        vars.extend(self.ambient_vars(&req).await?);
        for (name, value) in &fm.extra {
            vars.insert(name.clone(), yaml_to_json(value));
        }
        for (name, value) in &req.overrides.vars {
            vars.insert(name.clone(), value.clone());
        }

        // pre-runner derivations sit below overrides
        if let Some(template) = &template {
            if let Some(rendered) = template.render_pre_runner(&vars)? {
                for (name, value) in parse_derived(&rendered) {
                    vars.insert(name, value);
                }
                for (name, value) in &req.overrides.vars {
                    vars.insert(name.clone(), value.clone());
                }
            }
        }

        if !req.estimating {
            for name in &fm.required_values {
                let resolved = vars.get(name).map(|v| !value_is_empty(v)).unwrap_or(false);
                if !resolved {
                    return Err(ContextBuildError::MissingRequired { name: name.clone() });
                }
            }
        }

        let prompt_text = match &template {
            Some(template) => template.render_input(&vars)?,
            None => {
                let fallback = vars
                    .get("context")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                if fallback.is_empty() && !req.estimating {
                    return Err(ContextBuildError::NoInput);
                }
                fallback
            }
        };

        let options = GenerationOptions::layered(&self.settings, fm, &req.overrides);
        debug!(
            prompt_bytes = prompt_text.len(),
            template = ?req.template_path,
            "context built"
        );

        Ok(Context {
            prompt_text,
            template_path: req.template_path,
            options,
            raw_variables: vars,
            template,
        })
    }

    /// Build one context per batch target.
    ///
    /// A failed build yields `None` in that slot and never affects the
    /// others; pairing and filtering happen afterwards in a single pass
    /// (see [`BatchItem::pair`](crate::batch::BatchItem::pair)).
    pub async fn get_context_from_files(
        &self,
        files: &[PathBuf],
        template: Arc<Template>,
        template_path: Option<&Path>,
        overrides: &Overrides,
        insert_metadata: bool,
    ) -> Vec<Option<Context>> {
        let mut contexts = Vec::with_capacity(files.len());
        for file in files {
            let req = ContextRequest {
                template_path: template_path.map(Path::to_path_buf),
                template: Some(template.clone()),
                editor: None,
                file_path: Some(file.clone()),
                overrides: overrides.clone(),
                insert_metadata,
                estimating: false,
            };
            match self.get_context(req).await {
                Ok(context) => contexts.push(Some(context)),
                Err(err) => {
                    warn!(file = %file.display(), error = %err, "context build failed, target excluded");
                    contexts.push(None);
                }
            }
        }
        contexts
    }

    async fn ambient_vars(&self, req: &ContextRequest) -> Result<VarMap, ContextBuildError> {
        let mut vars = VarMap::new();

        if req.estimating {
            // representative scaffold: ambient slots resolve to empty text
            for name in ["selection", "context", "content", "title", "clipboard"] {
                vars.insert(name.to_string(), json!(""));
            }
            return Ok(vars);
        }

        if let Some(editor) = &req.editor {
            let before = before_cursor(&editor.content, editor.cursor);
            let context_text = editor
                .selection
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or(before);
            vars.insert(
                "selection".into(),
                json!(editor.selection.clone().unwrap_or_default()),
            );
            vars.insert("context".into(), json!(context_text));
            vars.insert("content".into(), json!(editor.content));
            vars.insert(
                "title".into(),
                json!(editor.title.clone().unwrap_or_default()),
            );
            vars.insert(
                "clipboard".into(),
                json!(editor.clipboard.clone().unwrap_or_default()),
            );
            if req.insert_metadata {
                for (name, value) in frontmatter::note_vars(&editor.content) {
                    vars.insert(name, yaml_to_json(&value));
                }
            }
        } else if let Some(path) = &req.file_path {
            let content =
                self.store
                    .read(path)
                    .await
                    .map_err(|reason| ContextBuildError::TargetRead {
                        path: path.clone(),
                        reason,
                    })?;
            let title = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            vars.insert("selection".into(), json!(""));
            vars.insert("context".into(), json!(content));
            vars.insert("content".into(), json!(content));
            vars.insert("title".into(), json!(title));
            vars.insert("clipboard".into(), json!(""));
            if req.insert_metadata {
                for (name, value) in frontmatter::note_vars(&content) {
                    vars.insert(name, yaml_to_json(&value));
                }
            }
        }

        Ok(vars)
    }
}

/// Document text strictly before the cursor.
fn before_cursor(content: &str, cursor: Position) -> String {
    let lines: Vec<&str> = content.split('\n').collect();
    let line = cursor.line.min(lines.len().saturating_sub(1));
    let mut out: Vec<String> = lines[..line].iter().map(|s| s.to_string()).collect();
    if let Some(current) = lines.get(line) {
        let chars: Vec<char> = current.chars().collect();
        out.push(chars[..cursor.ch.min(chars.len())].iter().collect());
    }
    out.join("\n")
}

/// `name: value` lines of a rendered pre-runner become derived variables.
fn parse_derived(rendered: &str) -> VarMap {
    let mut vars = VarMap::new();
    for line in rendered.lines() {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            continue;
        }
        vars.insert(name.to_string(), json!(value.trim()));
    }
    vars
}

fn value_is_empty(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn yaml_to_json(value: &serde_yaml::Value) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}
