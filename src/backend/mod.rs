// SPDX-License-Identifier: MIT
//! The language-model backend boundary.
//!
//! A [`Backend`] either answers a prompt in one response or streams it as
//! text chunks. Implementations own their transport, auth, and retry policy;
//! the engine only validates input size, delivers chunks, and maps
//! cancellation. The crate ships an OpenAI-compatible adapter
//! ([`OpenAiBackend`]); hosts plug in anything else behind the trait.

mod openai;

pub use openai::OpenAiBackend;

use crate::cancel::CancelToken;
use crate::context::GenerationOptions;
use crate::error::BackendError;
use async_trait::async_trait;
use futures_util::stream::BoxStream;

/// Input ceiling for binary-style endpoints (audio uploads and the like):
/// reject anything above 24 MiB before spending a network round trip.
pub const BINARY_INPUT_LIMIT: u64 = 24 * 1024 * 1024;

/// Incremental text chunks from a streaming backend.
pub type ChunkStream = BoxStream<'static, Result<String, BackendError>>;

/// Per-request backend parameters.
#[derive(Debug, Clone, Default)]
pub struct BackendOptions {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Checked by adapters between chunks and before retries.
    pub cancel: CancelToken,
}

impl BackendOptions {
    pub fn from_generation(options: &GenerationOptions, cancel: CancelToken) -> Self {
        Self {
            model: options.model.clone(),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            cancel,
        }
    }
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Single request/response generation.
    ///
    /// Errors must carry a human-readable message.
    async fn generate(&self, prompt: &str, opts: &BackendOptions)
        -> Result<String, BackendError>;

    /// Open a chunk stream for `prompt`.
    ///
    /// The default implementation reports the capability gap; backends that
    /// set [`streamable`](Backend::streamable) must override it.
    async fn stream_generate(
        &self,
        prompt: &str,
        opts: &BackendOptions,
    ) -> Result<ChunkStream, BackendError> {
        let _ = (prompt, opts);
        Err(BackendError::NotStreamable)
    }

    /// Whether [`stream_generate`](Backend::stream_generate) is available.
    fn streamable(&self) -> bool {
        false
    }

    /// Input size ceiling in bytes, when the backend has one.
    ///
    /// The engine rejects larger prompts with `InputTooLarge` before any
    /// network dispatch.
    fn max_input_bytes(&self) -> Option<u64> {
        None
    }

    /// Short identifier for logs and status lines.
    fn name(&self) -> &str;
}
