// SPDX-License-Identifier: MIT
//! The live text surface the pipeline writes into.
//!
//! Positions are (line, column) pairs; column is a character offset within
//! the line. Host editors implement [`TextSurface`]; the crate ships
//! [`BufferSurface`] for tests and headless callers.
//!
//! Implementations are not required to move the cursor when an edit lands —
//! the insertion engine manages cursor state explicitly via
//! [`TextSurface::set_cursor`].

mod buffer;

pub use buffer::BufferSurface;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// A (line, column) position in a text surface.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Position {
    /// 0-based line number.
    pub line: usize,
    /// Character offset within the line.
    pub ch: usize,
}

impl Position {
    pub fn new(line: usize, ch: usize) -> Self {
        Self { line, ch }
    }

    /// The position reached by inserting `text` at `self`.
    ///
    /// Newline-aware: the cursor advances by exactly the characters of
    /// `text`, wrapping to column 0 on every `\n`.
    pub fn advance(self, text: &str) -> Position {
        let mut line = self.line;
        let mut ch = self.ch;
        for c in text.chars() {
            if c == '\n' {
                line += 1;
                ch = 0;
            } else {
                ch += 1;
            }
        }
        Position { line, ch }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.ch)
    }
}

/// Which end of the current selection a cursor query refers to.
///
/// Replace-mode generations anchor at the start of the selection; everything
/// else inserts at its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionEdge {
    From,
    To,
}

/// The editable document contract.
///
/// Selections returned by [`selection`](TextSurface::selection) are ordered
/// (`from <= to`).
pub trait TextSurface: Send {
    /// Current cursor position; for an active selection, the requested edge.
    fn cursor(&self, edge: SelectionEdge) -> Position;

    /// The active selection, ordered, or `None` when nothing is selected.
    fn selection(&self) -> Option<(Position, Position)>;

    /// Text between two positions (clamped to the document).
    fn get_range(&self, from: Position, to: Position) -> String;

    /// Replace `[from, to)` with `text`; `to = None` inserts at `from`.
    fn replace_range(&mut self, text: &str, from: Position, to: Option<Position>);

    /// Replace the current selection (or insert at the cursor when there is
    /// none) and clear it.
    fn replace_selection(&mut self, text: &str);

    fn set_cursor(&mut self, pos: Position);

    /// Whole document text.
    fn content(&self) -> String;

    /// The character immediately preceding `pos` on the same line, used by
    /// first-chunk boundary shaping. `None` at column 0.
    fn char_before(&self, pos: Position) -> Option<char> {
        if pos.ch == 0 {
            return None;
        }
        self.get_range(Position::new(pos.line, pos.ch - 1), pos)
            .chars()
            .next()
    }
}

/// A surface shared between the caller and the stream flush task.
pub type SharedSurface = Arc<Mutex<dyn TextSurface>>;

/// Wrap a surface for shared use.
pub fn shared<S: TextSurface + 'static>(surface: S) -> SharedSurface {
    Arc::new(Mutex::new(surface))
}
