// SPDX-License-Identifier: MIT
//! Layered generation options.
//!
//! Configuration reaches a generation from four places. Highest precedence
//! first:
//!
//! 1. explicit caller overrides ([`Overrides`])
//! 2. template frontmatter
//! 3. ambient document/editor state (variables only — see the builder)
//! 4. global [`Settings`](crate::config::Settings)
//!
//! [`GenerationOptions::layered`] is the one place that order is applied;
//! nothing else in the pipeline merges configuration.

use crate::config::Settings;
use crate::insert::InsertMode;
use crate::template::{TemplateFrontmatter, VarMap};
use serde::{Deserialize, Serialize};

/// Fully resolved options carried by a [`Context`](super::Context).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub mode: InsertMode,
    /// `None` inherits the global stream preference.
    pub stream: Option<bool>,
    pub prefix: String,
    pub output_to_blockquote: bool,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self::layered(
            &Settings::default(),
            &TemplateFrontmatter::default(),
            &Overrides::default(),
        )
    }
}

/// Per-call caller overrides — the highest-precedence layer.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub mode: Option<InsertMode>,
    pub stream: Option<bool>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Explicit variable values (e.g. collected from a template input form).
    pub vars: VarMap,
}

impl GenerationOptions {
    pub fn layered(
        settings: &Settings,
        frontmatter: &TemplateFrontmatter,
        overrides: &Overrides,
    ) -> Self {
        Self {
            mode: overrides.mode.or(frontmatter.mode).unwrap_or_default(),
            stream: overrides.stream.or(frontmatter.stream),
            prefix: settings.prefix.clone(),
            output_to_blockquote: settings.output_to_blockquote,
            model: overrides
                .model
                .clone()
                .or_else(|| frontmatter.model.clone())
                .unwrap_or_else(|| settings.model.clone()),
            max_tokens: overrides
                .max_tokens
                .or(frontmatter.max_tokens)
                .unwrap_or(settings.max_tokens),
            temperature: overrides
                .temperature
                .or(frontmatter.temperature)
                .unwrap_or(settings.temperature),
        }
    }
}
