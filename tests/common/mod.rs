// SPDX-License-Identifier: MIT
//! Shared test doubles: a scriptable backend and a capturing reporter.
#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::StreamExt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use textloom::backend::ChunkStream;
use textloom::{Backend, BackendError, BackendOptions, GenerationStatus, ProgressReporter};

/// Route test logs through `RUST_LOG` when set. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One scripted event of a mock chunk stream.
#[derive(Debug, Clone)]
pub enum ScriptEvent {
    Chunk(&'static str),
    Error(&'static str),
    /// The stream never yields again (until cancelled externally).
    Hang,
}

/// Scriptable in-memory backend with a call counter.
pub struct MockBackend {
    calls: AtomicU32,
    response: String,
    script: Vec<ScriptEvent>,
    limit: Option<u64>,
    streamable: bool,
    hang: bool,
    /// Fail any generation whose prompt contains this marker.
    fail_on: Option<String>,
}

impl MockBackend {
    pub fn text(response: &str) -> Self {
        Self {
            calls: AtomicU32::new(0),
            response: response.to_string(),
            script: Vec::new(),
            limit: None,
            streamable: false,
            hang: false,
            fail_on: None,
        }
    }

    pub fn streaming(chunks: &[&'static str]) -> Self {
        let mut backend = Self::text(&chunks.concat());
        backend.script = chunks.iter().map(|&chunk| ScriptEvent::Chunk(chunk)).collect();
        backend.streamable = true;
        backend
    }

    pub fn scripted(script: Vec<ScriptEvent>) -> Self {
        let mut backend = Self::text("");
        backend.script = script;
        backend.streamable = true;
        backend
    }

    /// A backend whose non-streaming call never resolves.
    pub fn hanging() -> Self {
        let mut backend = Self::text("");
        backend.hang = true;
        backend
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_on = Some(marker.to_string());
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn generate(&self, prompt: &str, _opts: &BackendOptions) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        if let Some(marker) = &self.fail_on {
            if prompt.contains(marker) {
                return Err(BackendError::Api {
                    status: 500,
                    message: format!("prompt contained {marker}"),
                });
            }
        }
        Ok(self.response.clone())
    }

    async fn stream_generate(
        &self,
        _prompt: &str,
        _opts: &BackendOptions,
    ) -> Result<ChunkStream, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut hang = false;
        let mut items: Vec<Result<String, BackendError>> = Vec::new();
        for event in &self.script {
            match event {
                ScriptEvent::Chunk(text) => items.push(Ok(text.to_string())),
                ScriptEvent::Error(message) => {
                    items.push(Err(BackendError::Stream(message.to_string())))
                }
                ScriptEvent::Hang => {
                    hang = true;
                    break;
                }
            }
        }
        let base = futures_util::stream::iter(items);
        if hang {
            Ok(base.chain(futures_util::stream::pending()).boxed())
        } else {
            Ok(base.boxed())
        }
    }

    fn streamable(&self) -> bool {
        self.streamable
    }

    fn max_input_bytes(&self) -> Option<u64> {
        self.limit
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Reporter that records every status it sees.
#[derive(Default)]
pub struct CaptureReporter {
    statuses: Mutex<Vec<GenerationStatus>>,
}

impl CaptureReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.statuses
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.message.clone())
            .collect()
    }
}

impl ProgressReporter for CaptureReporter {
    fn report(&self, status: &GenerationStatus) {
        self.statuses.lock().unwrap().push(status.clone());
    }
}
