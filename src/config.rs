// SPDX-License-Identifier: MIT
//! Global default configuration.
//!
//! [`Settings`] is the lowest-precedence layer of option resolution: caller
//! overrides beat template frontmatter, frontmatter beats ambient editor
//! state, and ambient state beats these defaults. Loaded from a TOML file
//! when one exists; every field has a usable default so a missing or broken
//! file degrades to defaults instead of failing startup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_MAX_TOKENS: u32 = 500;
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_PROMPTS_PATH: &str = "templates/prompts";
const DEFAULT_GENERATIONS_PATH: &str = "generations";
const DEFAULT_FLUSH_INTERVAL_MS: u64 = 100;

fn default_stream() -> bool {
    true
}

/// Crate-wide defaults (`textloom.toml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Prefer streaming generation when the backend supports it and the
    /// template does not opt out. Default: true.
    pub stream: bool,
    /// Fixed text prepended to every generation (applied on the first
    /// streamed chunk, or once on whole-text insertion). Default: empty.
    pub prefix: String,
    /// Wrap whole-text output in an `[!ai]+` block quote. Default: false.
    pub output_to_blockquote: bool,
    /// Leave the cursor where the user put it while a stream flushes,
    /// instead of dragging it along with the insertion point. Default: false.
    pub free_cursor_on_streaming: bool,
    /// Directory templates are discovered under.
    pub prompts_path: String,
    /// Directory file-targeted generations are written under.
    pub generations_path: String,
    /// Default model name sent to the backend.
    pub model: String,
    /// Default completion budget.
    pub max_tokens: u32,
    /// Default sampling temperature.
    pub temperature: f32,
    /// Optional engine-level timeout, in seconds. `None` (the default)
    /// defers entirely to user cancellation: a hung backend call blocks its
    /// generation until cancelled.
    pub request_timeout_secs: Option<u64>,
    /// Milliseconds between stream flush ticks.
    pub flush_interval_ms: u64,
    /// Default variable values, the lowest layer of variable resolution.
    pub default_vars: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            stream: default_stream(),
            prefix: String::new(),
            output_to_blockquote: false,
            free_cursor_on_streaming: false,
            prompts_path: DEFAULT_PROMPTS_PATH.to_string(),
            generations_path: DEFAULT_GENERATIONS_PATH.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            request_timeout_secs: None,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            default_vars: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file, falling back to defaults when the
    /// file is missing or unparseable (logged, never fatal).
    pub async fn load(path: &Path) -> Self {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => match toml::from_str::<Settings>(&raw) {
                Ok(settings) => {
                    info!(path = %path.display(), "loaded settings");
                    settings
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "settings file invalid, using defaults");
                    Settings::default()
                }
            },
            Err(_) => Settings::default(),
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms.max(1))
    }
}
