// SPDX-License-Identifier: MIT
//! In-memory line-addressed text surface.
//!
//! Backs tests and headless generation runs. Columns are character offsets,
//! so multi-byte text behaves the same as in a real editor buffer.

use super::{Position, SelectionEdge, TextSurface};

#[derive(Debug, Clone)]
pub struct BufferSurface {
    lines: Vec<String>,
    cursor: Position,
    selection: Option<(Position, Position)>,
}

impl Default for BufferSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferSurface {
    pub fn new() -> Self {
        Self {
            lines: vec![String::new()],
            cursor: Position::default(),
            selection: None,
        }
    }

    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text.split('\n').map(str::to_string).collect(),
            cursor: Position::default(),
            selection: None,
        }
    }

    /// Select `[from, to)` (ordered automatically); the cursor moves to the
    /// selection head.
    pub fn set_selection(&mut self, from: Position, to: Position) {
        let from = self.clamp(from);
        let to = self.clamp(to);
        let (from, to) = if from <= to { (from, to) } else { (to, from) };
        self.selection = Some((from, to));
        self.cursor = to;
    }

    fn line_len(&self, line: usize) -> usize {
        self.lines.get(line).map(|l| l.chars().count()).unwrap_or(0)
    }

    fn clamp(&self, pos: Position) -> Position {
        let line = pos.line.min(self.lines.len().saturating_sub(1));
        Position::new(line, pos.ch.min(self.line_len(line)))
    }

    /// Character offset of `pos` into the whole document.
    fn abs_offset(&self, pos: Position) -> usize {
        let pos = self.clamp(pos);
        let mut offset = 0;
        for line in &self.lines[..pos.line] {
            offset += line.chars().count() + 1; // +1 for the newline
        }
        offset + pos.ch
    }

    fn splice(&mut self, text: &str, from: Position, to: Position) {
        let chars: Vec<char> = self.content().chars().collect();
        let mut start = self.abs_offset(from);
        let mut end = self.abs_offset(to);
        if start > end {
            std::mem::swap(&mut start, &mut end);
        }
        let mut next: String = chars[..start].iter().collect();
        next.push_str(text);
        next.extend(&chars[end..]);
        self.lines = next.split('\n').map(str::to_string).collect();
        self.cursor = self.clamp(self.cursor);
        if let Some((from, to)) = self.selection {
            self.selection = Some((self.clamp(from), self.clamp(to)));
        }
    }
}

impl TextSurface for BufferSurface {
    fn cursor(&self, edge: SelectionEdge) -> Position {
        match (self.selection, edge) {
            (Some((from, _)), SelectionEdge::From) => from,
            (Some((_, to)), SelectionEdge::To) => to,
            (None, _) => self.cursor,
        }
    }

    fn selection(&self) -> Option<(Position, Position)> {
        self.selection
    }

    fn get_range(&self, from: Position, to: Position) -> String {
        let chars: Vec<char> = self.content().chars().collect();
        let mut start = self.abs_offset(from);
        let mut end = self.abs_offset(to);
        if start > end {
            std::mem::swap(&mut start, &mut end);
        }
        chars[start..end].iter().collect()
    }

    fn replace_range(&mut self, text: &str, from: Position, to: Option<Position>) {
        self.splice(text, from, to.unwrap_or(from));
    }

    fn replace_selection(&mut self, text: &str) {
        match self.selection.take() {
            Some((from, to)) => {
                self.splice(text, from, to);
                self.cursor = from.advance(text);
            }
            None => {
                let at = self.cursor;
                self.splice(text, at, at);
                self.cursor = at.advance(text);
            }
        }
    }

    fn set_cursor(&mut self, pos: Position) {
        self.cursor = self.clamp(pos);
        self.selection = None;
    }

    fn content(&self) -> String {
        self.lines.join("\n")
    }
}
