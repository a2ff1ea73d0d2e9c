// SPDX-License-Identifier: MIT
//! Error taxonomy for the generation pipeline.
//!
//! Every failure a caller can observe falls into one of four typed families:
//! [`ParseError`] (malformed template markup), [`ContextBuildError`] (a
//! generation input could not be resolved), [`BackendError`] (the language
//! model backend failed), and the umbrella [`GenError`] which adds the
//! terminal outcomes that belong to the pipeline itself — cancellation,
//! oversized input, and sink failures.
//!
//! Cancellation is deliberately *not* a [`BackendError`]: a user-initiated
//! stop settles as [`GenError::Cancelled`] so UIs can avoid presenting it as
//! an error.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Malformed template structure. Generation is aborted, nothing is written.
#[derive(Debug, Error)]
pub enum ParseError {
    /// A template section failed handlebars compilation.
    #[error("template section markup is malformed: {0}")]
    Template(#[from] Box<handlebars::TemplateError>),
    /// The `---` frontmatter fence contained invalid YAML.
    #[error("template frontmatter is not valid YAML: {0}")]
    Frontmatter(#[from] serde_yaml::Error),
}

impl From<handlebars::TemplateError> for ParseError {
    fn from(err: handlebars::TemplateError) -> Self {
        ParseError::Template(Box::new(err))
    }
}

/// A single generation's input could not be resolved.
///
/// In a batch this aborts only the affected target; siblings are unaffected.
#[derive(Debug, Error)]
pub enum ContextBuildError {
    /// A variable listed in frontmatter `required_values` resolved to nothing.
    #[error("required variable `{name}` has no resolved value")]
    MissingRequired { name: String },
    /// The template file could not be loaded from the store.
    #[error("failed to read template `{}`: {reason}", path.display())]
    TemplateRead { path: PathBuf, reason: anyhow::Error },
    /// A batch target file could not be loaded from the store.
    #[error("failed to read target `{}`: {reason}", path.display())]
    TargetRead { path: PathBuf, reason: anyhow::Error },
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// A template section failed to render with the resolved variables.
    #[error("failed to render template section: {0}")]
    Render(#[from] Box<handlebars::RenderError>),
    /// No template, no selection, nothing before the cursor — there is no
    /// prompt to send.
    #[error("no editor state available and no template input to build a prompt from")]
    NoInput,
    /// Every target of a batch failed context building.
    #[error("no valid targets to generate for")]
    NoValidTargets,
}

impl From<handlebars::RenderError> for ContextBuildError {
    fn from(err: handlebars::RenderError) -> Self {
        ContextBuildError::Render(Box::new(err))
    }
}

/// Network or backend failure, including malformed responses.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Non-success HTTP status with whatever message the API returned.
    #[error("backend returned status {status}: {message}")]
    Api { status: u16, message: String },
    /// The response body did not match the expected shape.
    #[error("backend response was malformed: {0}")]
    MalformedResponse(String),
    /// The chunk stream broke before completion.
    #[error("backend stream failed: {0}")]
    Stream(String),
    /// The configured request timeout elapsed.
    #[error("backend call timed out after {0:?}")]
    Timeout(Duration),
    /// Streaming was requested but the backend cannot stream.
    #[error("backend does not support streaming")]
    NotStreamable,
}

impl BackendError {
    /// Whether a backend adapter may re-issue the request.
    ///
    /// Transport errors, 429s, and 5xx responses are retryable; malformed
    /// responses and capability errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Http(_) | BackendError::Timeout(_) => true,
            BackendError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// The one error type generation entry points return.
///
/// Every generation request settles into exactly one outcome: `Ok(text)` or
/// one of these.
#[derive(Debug, Error)]
pub enum GenError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    ContextBuild(#[from] ContextBuildError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// User-initiated stop. Not an error from the user's point of view.
    #[error("generation cancelled")]
    Cancelled,
    /// Rejected before any network dispatch.
    #[error("input of {actual} bytes exceeds the backend limit of {limit} bytes")]
    InputTooLarge { actual: u64, limit: u64 },
    /// Failed to write a result artifact. Logged during batches, never fatal.
    #[error("failed to write result artifact: {0}")]
    Sink(String),
}

impl GenError {
    /// `true` for user-initiated cancellation, so callers can branch without
    /// matching the whole enum.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GenError::Cancelled)
    }
}
