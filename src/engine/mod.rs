// SPDX-License-Identifier: MIT
//! The generation engine.
//!
//! Sits between a resolved [`Context`] and a [`Backend`]: validates input
//! size before any network dispatch, delivers stream chunks one at a time on
//! its own task, applies the template's output section to the final text,
//! and maps a fired cancel token to the distinct `Cancelled` outcome so a
//! user-initiated stop is never presented as a backend failure.
//!
//! Every call settles into exactly one outcome — one `Ok` or one `Err`,
//! never zero, never more than one. Retries are the backend adapter's
//! business; the engine never re-issues a request.

use crate::backend::{Backend, BackendOptions};
use crate::context::Context;
use crate::error::{BackendError, GenError};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Engine-level policy.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Upper bound on a whole non-streaming call, and on the gap between
    /// consecutive chunks while streaming.
    ///
    /// `None` (the default) defers entirely to cancellation: a hung backend
    /// call blocks its generation until the caller cancels it.
    pub request_timeout: Option<Duration>,
}

pub struct GenerationEngine {
    backend: Arc<dyn Backend>,
    config: EngineConfig,
}

impl GenerationEngine {
    pub fn new(backend: Arc<dyn Backend>, config: EngineConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Reject oversized prompts before spending a network round trip.
    fn guard_size(&self, prompt: &str) -> Result<(), GenError> {
        if let Some(limit) = self.backend.max_input_bytes() {
            let actual = prompt.len() as u64;
            if actual > limit {
                return Err(GenError::InputTooLarge { actual, limit });
            }
        }
        Ok(())
    }

    /// Single request/response generation.
    ///
    /// Returns the backend text after the template's output section (when
    /// the context carries one) has rendered over it.
    pub async fn generate(
        &self,
        context: &Context,
        opts: &BackendOptions,
    ) -> Result<String, GenError> {
        self.guard_size(&context.prompt_text)?;
        if opts.cancel.is_cancelled() {
            return Err(GenError::Cancelled);
        }
        debug!(backend = self.backend.name(), "generation start");

        let call = self.backend.generate(&context.prompt_text, opts);
        tokio::pin!(call);

        let result = if let Some(timeout) = self.config.request_timeout {
            tokio::select! {
                outcome = tokio::time::timeout(timeout, &mut call) => match outcome {
                    Ok(inner) => inner,
                    Err(_) => Err(BackendError::Timeout(timeout)),
                },
                _ = opts.cancel.cancelled() => return Err(GenError::Cancelled),
            }
        } else {
            tokio::select! {
                outcome = &mut call => outcome,
                _ = opts.cancel.cancelled() => return Err(GenError::Cancelled),
            }
        };

        let text = result.map_err(|err| self.settle(err, opts))?;
        self.render_output(context, text)
    }

    /// Streaming generation.
    ///
    /// `on_chunk(text, is_first)` runs synchronously for each chunk on this
    /// call's task — chunks are never delivered in parallel — and may
    /// transform the chunk (or suppress it by returning `None`). The
    /// transformed chunks, concatenated, become the final text; the
    /// template's output section renders over that. A broken stream
    /// surfaces as exactly one `Err`.
    pub async fn stream_generate<F>(
        &self,
        context: &Context,
        opts: &BackendOptions,
        mut on_chunk: F,
    ) -> Result<String, GenError>
    where
        F: FnMut(&str, bool) -> Option<String> + Send,
    {
        self.guard_size(&context.prompt_text)?;
        if !self.backend.streamable() {
            return Err(BackendError::NotStreamable.into());
        }
        if opts.cancel.is_cancelled() {
            return Err(GenError::Cancelled);
        }
        debug!(backend = self.backend.name(), "stream generation start");

        let mut stream = self
            .backend
            .stream_generate(&context.prompt_text, opts)
            .await
            .map_err(|err| self.settle(err, opts))?;

        let mut assembled = String::new();
        let mut first = true;
        loop {
            let item = if let Some(timeout) = self.config.request_timeout {
                tokio::select! {
                    outcome = tokio::time::timeout(timeout, stream.next()) => match outcome {
                        Ok(item) => item,
                        Err(_) => return Err(BackendError::Timeout(timeout).into()),
                    },
                    _ = opts.cancel.cancelled() => return Err(GenError::Cancelled),
                }
            } else {
                tokio::select! {
                    item = stream.next() => item,
                    _ = opts.cancel.cancelled() => return Err(GenError::Cancelled),
                }
            };

            match item {
                None => break,
                Some(Err(err)) => {
                    warn!(error = %err, "backend stream failed");
                    return Err(self.settle(err, opts));
                }
                Some(Ok(chunk)) => {
                    if let Some(transformed) = on_chunk(&chunk, first) {
                        assembled.push_str(&transformed);
                    }
                    first = false;
                }
            }
        }
        // dropping the stream released the connection

        self.render_output(context, assembled)
    }

    /// A fired token wins over whatever error the race produced.
    fn settle(&self, err: BackendError, opts: &BackendOptions) -> GenError {
        if opts.cancel.is_cancelled() {
            GenError::Cancelled
        } else {
            err.into()
        }
    }

    fn render_output(&self, context: &Context, text: String) -> Result<String, GenError> {
        match context.template.as_ref().filter(|t| t.has_output()) {
            Some(template) => Ok(template
                .render_output(&text, &context.raw_variables)
                .map_err(crate::error::ContextBuildError::from)?),
            None => Ok(text),
        }
    }
}
