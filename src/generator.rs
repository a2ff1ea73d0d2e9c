// SPDX-License-Identifier: MIT
//! The generation facade — wires parser, builder, engine, and inserter into
//! the end-to-end flows.
//!
//! Every flow takes its collaborators explicitly (backend, surface, store,
//! reporter) — there is no ambient singleton. Streaming is chosen when the
//! global preference, the backend capability, and the template all agree;
//! a template's `stream: false` always vetoes.

use crate::backend::{Backend, BackendOptions};
use crate::batch::{BatchItem, BatchItemResult, BatchOrchestrator};
use crate::cancel::CancelToken;
use crate::config::Settings;
use crate::context::{Context, ContextBuilder, ContextRequest, EditorState, GenerationOptions, Overrides};
use crate::engine::{EngineConfig, GenerationEngine};
use crate::error::{ContextBuildError, GenError};
use crate::insert::{CursorInsertionEngine, InsertMode, InsertOptions};
use crate::status::{self, report_failure, report_progress, ProgressReporter};
use crate::store::{Artifact, FileStore};
use crate::surface::{SelectionEdge, SharedSurface, TextSurface};
use crate::template::TemplateFrontmatter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// One generation invocation. Discarded after completion.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub context: Context,
    /// `Some` forces streaming on or off; `None` resolves it from settings,
    /// backend capability, and template frontmatter.
    pub streaming_requested: Option<bool>,
    pub cancel: CancelToken,
    /// The artifact behind the surface, for rename-mode insertion.
    pub active_file: Option<Artifact>,
}

impl GenerationRequest {
    pub fn new(context: Context, cancel: CancelToken) -> Self {
        Self {
            context,
            streaming_requested: None,
            cancel,
            active_file: None,
        }
    }
}

pub struct Generator {
    settings: Settings,
    backend: Arc<dyn Backend>,
    engine: GenerationEngine,
    inserter: CursorInsertionEngine,
    builder: ContextBuilder,
    store: Arc<dyn FileStore>,
    reporter: Arc<dyn ProgressReporter>,
}

impl Generator {
    pub fn new(
        settings: Settings,
        backend: Arc<dyn Backend>,
        store: Arc<dyn FileStore>,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        let engine = GenerationEngine::new(
            backend.clone(),
            EngineConfig {
                request_timeout: settings.request_timeout(),
            },
        );
        let inserter = CursorInsertionEngine::new(Some(store.clone()));
        let builder = ContextBuilder::new(settings.clone(), store.clone());
        Self {
            settings,
            backend,
            engine,
            inserter,
            builder,
            store,
            reporter,
        }
    }

    pub fn context_builder(&self) -> &ContextBuilder {
        &self.builder
    }

    pub fn engine(&self) -> &GenerationEngine {
        &self.engine
    }

    fn should_stream(&self, context: &Context, requested: Option<bool>) -> bool {
        match requested {
            Some(explicit) => explicit && self.backend.streamable(),
            None => {
                self.settings.stream
                    && self.backend.streamable()
                    && context.options.stream != Some(false)
            }
        }
    }

    fn insert_options(&self, req: &GenerationRequest) -> InsertOptions {
        InsertOptions {
            prefix: req.context.options.prefix.clone(),
            output_to_blockquote: req.context.options.output_to_blockquote,
            free_cursor: self.settings.free_cursor_on_streaming,
            flush_interval: self.settings.flush_interval(),
            active_file: req.active_file.clone(),
        }
    }

    /// Generate into a live surface, streaming when everything agrees.
    ///
    /// Returns the final generated text (post output-section render).
    pub async fn generate_in_editor(
        &self,
        surface: SharedSurface,
        req: GenerationRequest,
    ) -> Result<String, GenError> {
        if self.should_stream(&req.context, req.streaming_requested) {
            return self.generate_stream_in_editor(surface, req).await;
        }

        status::set_in_progress(true);
        report_progress(&*self.reporter, "generating…", true);
        let backend_opts = BackendOptions::from_generation(&req.context.options, req.cancel.clone());

        let text = match self.engine.generate(&req.context, &backend_opts).await {
            Ok(text) => text,
            Err(err) => {
                status::set_in_progress(false);
                report_failure(&*self.reporter, Some(&surface), &err).await;
                return Err(err);
            }
        };

        let mode = req.context.options.mode;
        let completion = if req.context.options.prefix.is_empty() {
            text.clone()
        } else {
            format!("{}{}", req.context.options.prefix, text)
        };
        let at = {
            let s = surface.lock().await;
            let edge = if mode == InsertMode::Replace {
                SelectionEdge::From
            } else {
                SelectionEdge::To
            };
            Some(s.cursor(edge))
        };
        let inserted = self
            .inserter
            .insert(&completion, &surface, at, mode, &self.insert_options(&req))
            .await;
        status::set_in_progress(false);
        match inserted {
            Ok(_) => {
                report_progress(&*self.reporter, "generation finished", false);
                Ok(text)
            }
            Err(err) => {
                report_failure(&*self.reporter, Some(&surface), &err).await;
                Err(err)
            }
        }
    }

    /// Streaming generation into a live surface.
    ///
    /// On any error the flush timer stops, the cursor returns to the
    /// pre-generation position, and the failure goes through the one
    /// notification path; characters already flushed stay in the document.
    pub async fn generate_stream_in_editor(
        &self,
        surface: SharedSurface,
        req: GenerationRequest,
    ) -> Result<String, GenError> {
        let mode = req.context.options.mode;
        status::set_in_progress(true);
        report_progress(&*self.reporter, "generating…", true);

        let session = self
            .inserter
            .begin_stream(surface.clone(), None, mode, self.insert_options(&req))
            .await;
        let backend_opts = BackendOptions::from_generation(&req.context.options, req.cancel.clone());

        let outcome = self
            .engine
            .stream_generate(&req.context, &backend_opts, |chunk, _first| {
                session.feed(chunk)
            })
            .await;

        match outcome {
            Ok(final_text) => {
                let ended = session.end(&final_text).await;
                status::set_in_progress(false);
                match ended {
                    Ok(end) => {
                        debug!(%end, "stream generation committed");
                        report_progress(&*self.reporter, "generation finished", false);
                        Ok(final_text)
                    }
                    Err(err) => {
                        report_failure(&*self.reporter, Some(&surface), &err).await;
                        Err(err)
                    }
                }
            }
            Err(err) => {
                session.cancel().await;
                status::set_in_progress(false);
                report_failure(&*self.reporter, Some(&surface), &err).await;
                Err(err)
            }
        }
    }

    /// Resolve a template against live editor state and generate into the
    /// surface.
    pub async fn generate_from_template_in_editor(
        &self,
        surface: SharedSurface,
        editor: EditorState,
        template_path: &Path,
        overrides: Overrides,
        insert_metadata: bool,
        cancel: CancelToken,
    ) -> Result<String, GenError> {
        let active_file = editor.file_path.clone().map(Artifact::new);
        let context = self
            .builder
            .get_context(ContextRequest {
                template_path: Some(template_path.to_path_buf()),
                template: None,
                editor: Some(editor),
                file_path: None,
                overrides,
                insert_metadata,
                estimating: false,
            })
            .await?;
        self.generate_in_editor(
            surface,
            GenerationRequest {
                context,
                streaming_requested: None,
                cancel,
                active_file,
            },
        )
        .await
    }

    /// Resolve a template and write the generation to a fresh artifact
    /// under the generations directory.
    pub async fn generate_to_file(
        &self,
        template_path: &Path,
        editor: Option<EditorState>,
        overrides: Overrides,
        insert_metadata: bool,
        cancel: CancelToken,
    ) -> Result<Artifact, GenError> {
        let context = self
            .builder
            .get_context(ContextRequest {
                template_path: Some(template_path.to_path_buf()),
                editor,
                overrides,
                insert_metadata,
                ..Default::default()
            })
            .await?;
        self.create_to_file(context, cancel).await
    }

    /// Generate from an already-built context into a fresh artifact.
    pub async fn create_to_file(
        &self,
        context: Context,
        cancel: CancelToken,
    ) -> Result<Artifact, GenError> {
        let backend_opts = BackendOptions::from_generation(&context.options, cancel);
        let text = match self.engine.generate(&context, &backend_opts).await {
            Ok(text) => text,
            Err(err) => {
                report_failure(&*self.reporter, None, &err).await;
                return Err(err);
            }
        };
        let title = context
            .raw_variables
            .get("title")
            .and_then(|v| v.as_str())
            .filter(|t| !t.is_empty())
            .unwrap_or("generation")
            .to_string();
        let path = PathBuf::from(&self.settings.generations_path)
            .join(format!("{}-{}.md", title, short_id()));
        let content = format!("{}{}", context.prompt_text, text);
        self.store
            .create(&path, &content)
            .await
            .map_err(|err| GenError::Sink(err.to_string()))
    }

    /// Generate from a raw prompt (no template) into a live surface,
    /// whole-text.
    pub async fn generate_prompt(
        &self,
        prompt: &str,
        surface: SharedSurface,
        cancel: CancelToken,
    ) -> Result<String, GenError> {
        let options = GenerationOptions::layered(
            &self.settings,
            &TemplateFrontmatter::default(),
            &Overrides::default(),
        );
        let context = Context::from_prompt(prompt, options);
        self.generate_in_editor(
            surface,
            GenerationRequest {
                context,
                streaming_requested: Some(false),
                cancel,
                active_file: None,
            },
        )
        .await
    }

    /// Run a template across many target files, one artifact per target.
    ///
    /// Contexts are all built first; targets whose context failed are
    /// excluded in a single pairing pass and never reach the engine.
    pub async fn generate_batch_from_template(
        &self,
        files: &[PathBuf],
        template_path: &Path,
        overrides: Overrides,
        out_dir: &Path,
        insert_metadata: bool,
        cancel: CancelToken,
    ) -> Result<Vec<BatchItemResult>, GenError> {
        let template = Arc::new(self.builder.load_template(template_path).await?);
        let contexts = self
            .builder
            .get_context_from_files(files, template, Some(template_path), &overrides, insert_metadata)
            .await;
        let items = BatchItem::pair(files, contexts);
        if items.is_empty() {
            return Err(ContextBuildError::NoValidTargets.into());
        }

        status::set_in_progress(true);
        let orchestrator = BatchOrchestrator::new(self.reporter.clone());
        let engine = &self.engine;
        let store = &self.store;
        let results = orchestrator
            .run_batch(
                items,
                &cancel,
                |context| {
                    let backend_opts =
                        BackendOptions::from_generation(&context.options, cancel.clone());
                    async move { engine.generate(&context, &backend_opts).await }
                },
                |result, _index| {
                    let path = out_dir.join(result.artifact_name());
                    let text = result.artifact_text();
                    let store = Arc::clone(store);
                    async move {
                        store
                            .create(&path, &text)
                            .await
                            .map_err(|err| GenError::Sink(err.to_string()))?;
                        Ok(())
                    }
                },
            )
            .await;
        status::set_in_progress(false);
        Ok(results)
    }
}

fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..4].to_string()
}
