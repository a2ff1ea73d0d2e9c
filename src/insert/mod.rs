// SPDX-License-Identifier: MIT
//! Committing generated text into a live surface.
//!
//! Whole-text results go through [`CursorInsertionEngine::insert`] in one of
//! four modes; incremental results go through a [`StreamSession`] whose
//! fixed-interval flush smooths bursty token arrival into steady insertion.
//! Streaming always finishes by re-entering the whole-text path, so
//! block-quote wrapping and other whole-text post-processing apply uniformly
//! to both shapes of result.

mod stream;

pub use stream::StreamSession;

use crate::error::GenError;
use crate::store::{Artifact, FileStore};
use crate::surface::{Position, SelectionEdge, SharedSurface, TextSurface};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// How generated text is committed to the surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertMode {
    /// Place text at the insertion point, leaving surrounding content alone.
    #[default]
    Insert,
    /// Substitute the current selection.
    Replace,
    /// Sanitize the text into a filename and rename the backing artifact.
    Rename,
    /// Insert, called repeatedly as a stream buffer drains.
    Stream,
}

/// Insertion behavior knobs, resolved from settings and context options.
#[derive(Debug, Clone)]
pub struct InsertOptions {
    /// Fixed text ahead of the generation (first streamed chunk only).
    pub prefix: String,
    /// Wrap whole-text output in an `[!ai]+` block quote.
    pub output_to_blockquote: bool,
    /// Leave the cursor alone while a stream flushes.
    pub free_cursor: bool,
    /// Interval between stream flush ticks.
    pub flush_interval: Duration,
    /// The artifact behind the surface — rename mode's target.
    pub active_file: Option<Artifact>,
}

impl Default for InsertOptions {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            output_to_blockquote: false,
            free_cursor: false,
            flush_interval: Duration::from_millis(100),
            active_file: None,
        }
    }
}

/// Tracks the stream session currently mutating a surface, so starting a new
/// one can tear the old one down first.
pub(crate) struct ActiveHandle {
    pub(crate) state: std::sync::Weak<Mutex<stream::StreamState>>,
    pub(crate) stop: Arc<tokio::sync::Notify>,
}

#[derive(Clone)]
pub struct CursorInsertionEngine {
    pub(crate) inner: Arc<InsertInner>,
}

pub(crate) struct InsertInner {
    pub(crate) store: Option<Arc<dyn FileStore>>,
    pub(crate) active: Mutex<Option<ActiveHandle>>,
}

impl CursorInsertionEngine {
    /// `store` is only needed for rename-mode insertion.
    pub fn new(store: Option<Arc<dyn FileStore>>) -> Self {
        Self {
            inner: Arc::new(InsertInner {
                store,
                active: Mutex::new(None),
            }),
        }
    }

    /// Commit a whole-text result.
    ///
    /// Returns the position just past the inserted text (the insertion point
    /// itself for rename mode). The cursor is left where the surface put it;
    /// callers that want it moved use the returned position.
    pub async fn insert(
        &self,
        completion: &str,
        surface: &SharedSurface,
        at: Option<Position>,
        mode: InsertMode,
        opts: &InsertOptions,
    ) -> Result<Position, GenError> {
        if mode == InsertMode::Rename {
            self.rename(completion, opts).await?;
            return Ok(at.unwrap_or_default());
        }

        let text = if opts.output_to_blockquote && mode != InsertMode::Stream {
            output_to_blockquote(completion)
        } else {
            completion.to_string()
        };

        let mut s = surface.lock().await;
        match mode {
            InsertMode::Insert | InsertMode::Stream => {
                let cursor = at.unwrap_or_else(|| s.cursor(SelectionEdge::To));
                s.replace_range(&text, cursor, None);
                Ok(cursor.advance(&text))
            }
            InsertMode::Replace => {
                let anchor = s
                    .selection()
                    .map(|(from, _)| from)
                    .or(at)
                    .unwrap_or_else(|| s.cursor(SelectionEdge::From));
                s.replace_selection(&text);
                Ok(anchor.advance(&text))
            }
            InsertMode::Rename => unreachable!("handled above"),
        }
    }

    async fn rename(&self, text: &str, opts: &InsertOptions) -> Result<(), GenError> {
        let Some(active) = &opts.active_file else {
            debug!("rename requested with no active artifact, skipping");
            return Ok(());
        };
        let Some(store) = &self.inner.store else {
            debug!("rename requested with no file store, skipping");
            return Ok(());
        };
        let title = sanitize_title(text);
        let extension = active
            .path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "md".to_string());
        let new_path = active.path.with_file_name(format!("{title}.{extension}"));
        debug!(from = %active.path.display(), to = %new_path.display(), "renaming artifact");
        store
            .rename(active, &new_path)
            .await
            .map_err(|err| GenError::Sink(err.to_string()))
    }
}

static ILLEGAL_TITLE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[*\\"/<>:|?.]"#).expect("title pattern compiles"));

/// Strip characters illegal in artifact names and collapse leading newlines.
pub fn sanitize_title(text: &str) -> String {
    ILLEGAL_TITLE_CHARS
        .replace_all(text, "")
        .trim_start_matches('\n')
        .to_string()
}

/// Wrap output in an `[!ai]+ AI` block-quote callout.
pub fn output_to_blockquote(text: &str) -> String {
    let lines: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && *line != ">")
        .map(|line| {
            if line.contains("[!ai]+ AI") {
                ">".to_string()
            } else if line.starts_with('>') {
                line.to_string()
            } else {
                format!("> {line}")
            }
        })
        .filter(|line| !line.is_empty())
        .collect();
    format!("\n> [!ai]+ AI\n>\n{}\n\n", lines.join("\n").trim())
}
