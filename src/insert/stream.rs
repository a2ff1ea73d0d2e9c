// SPDX-License-Identifier: MIT
//! Incremental insertion of a streaming generation.
//!
//! A [`StreamSession`] owns the mutable state of one in-flight stream: the
//! pending (unflushed) buffer, the current insertion cursor, and the
//! first-chunk flag. A fixed-interval flush task drains the buffer into the
//! surface in one edit per tick — decoupled from network arrival cadence —
//! advancing the cursor by exactly the characters flushed.
//!
//! At most one session is active per surface; the insertion engine tears
//! down the previous session's timer before starting a new one, so two
//! timers never race to move the same cursor.
//!
//! Lifecycle: [`feed`](StreamSession::feed) buffers (shaping the first chunk
//! only), [`end`](StreamSession::end) clears the streamed region and
//! reinserts the final text through the whole-text path, and
//! [`cancel`](StreamSession::cancel) stops the timer and restores the cursor
//! to the pre-generation position — already-flushed characters stay where
//! they are, because edits the user may have interleaved with make rollback
//! unsafe.

use super::{ActiveHandle, CursorInsertionEngine, InsertMode, InsertOptions};
use crate::error::GenError;
use crate::surface::{Position, SelectionEdge, SharedSurface, TextSurface};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug)]
pub(crate) struct StreamState {
    pub(crate) pending: String,
    pub(crate) start: Position,
    pub(crate) cursor: Position,
    pub(crate) first: bool,
    pub(crate) active: bool,
    pub(crate) preceding: Option<char>,
}

/// Mutable state of one in-flight streaming insertion.
///
/// Owned exclusively by the generation that created it; destroyed when the
/// stream ends, errors, or is cancelled.
pub struct StreamSession {
    engine: CursorInsertionEngine,
    surface: SharedSurface,
    state: Arc<Mutex<StreamState>>,
    mode: InsertMode,
    opts: InsertOptions,
    stop: Arc<Notify>,
    stopped: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CursorInsertionEngine {
    /// Open a stream session at `at` (or the current cursor).
    ///
    /// Any session still active on this engine is terminated first.
    pub async fn begin_stream(
        &self,
        surface: SharedSurface,
        at: Option<Position>,
        mode: InsertMode,
        opts: InsertOptions,
    ) -> StreamSession {
        self.teardown_active();

        let (start, preceding) = {
            let s = surface.lock().await;
            let edge = if mode == InsertMode::Replace {
                SelectionEdge::From
            } else {
                SelectionEdge::To
            };
            let start = at.unwrap_or_else(|| s.cursor(edge));
            (start, s.char_before(start))
        };

        let state = Arc::new(Mutex::new(StreamState {
            pending: String::new(),
            start,
            cursor: start,
            first: true,
            active: true,
            preceding,
        }));
        let stop = Arc::new(Notify::new());
        let stopped = Arc::new(AtomicBool::new(false));

        // only insert-family modes commit incrementally; replace and rename
        // buffer until completion
        let task = if matches!(mode, InsertMode::Insert | InsertMode::Stream) {
            Some(tokio::spawn(flush_loop(
                surface.clone(),
                state.clone(),
                stop.clone(),
                stopped.clone(),
                opts.flush_interval,
                opts.free_cursor,
            )))
        } else {
            None
        };

        if let Ok(mut active) = self.inner.active.lock() {
            *active = Some(ActiveHandle {
                state: Arc::downgrade(&state),
                stop: stop.clone(),
            });
        }
        debug!(?start, ?mode, "stream session opened");

        StreamSession {
            engine: self.clone(),
            surface,
            state,
            mode,
            opts,
            stop,
            stopped,
            task: Mutex::new(task),
        }
    }

    /// Deactivate whatever session this engine last opened.
    fn teardown_active(&self) {
        let previous = match self.inner.active.lock() {
            Ok(mut active) => active.take(),
            Err(_) => return,
        };
        if let Some(handle) = previous {
            if let Some(state) = handle.state.upgrade() {
                if let Ok(mut st) = state.lock() {
                    if st.active {
                        warn!("terminating previous stream session on this surface");
                        st.active = false;
                    }
                }
            }
            handle.stop.notify_one();
        }
    }
}

impl StreamSession {
    /// Buffer one incoming chunk, returning the text actually accepted
    /// (shaped, for the first chunk of an insert-family stream).
    ///
    /// Returns `None` once the session is no longer active.
    pub fn feed(&self, chunk: &str) -> Option<String> {
        if chunk.is_empty() {
            return Some(String::new());
        }
        let mut st = self.state.lock().ok()?;
        if !st.active {
            return None;
        }
        match self.mode {
            InsertMode::Insert | InsertMode::Stream => {
                let shaped = if st.first {
                    st.first = false;
                    shape_first_chunk(chunk, st.preceding, &self.opts.prefix)
                } else {
                    chunk.to_string()
                };
                st.pending.push_str(&shaped);
                Some(shaped)
            }
            // nothing hits the surface until completion
            _ => Some(chunk.to_string()),
        }
    }

    /// Pre-generation starting position.
    pub fn start(&self) -> Position {
        self.state
            .lock()
            .map(|st| st.start)
            .unwrap_or_default()
    }

    /// Finish the stream: stop the flush timer, clear the streamed region,
    /// and reinsert `final_text` through the whole-text path so block-quote
    /// wrapping and other whole-text post-processing apply uniformly. The
    /// cursor ends just past the inserted text.
    pub async fn end(self, final_text: &str) -> Result<Position, GenError> {
        let snapshot = {
            let mut st = self.state.lock().map_err(|_| {
                GenError::Sink("stream state poisoned".into())
            })?;
            if !st.active {
                return Ok(st.cursor);
            }
            st.active = false;
            (st.start, st.cursor)
        };
        self.shutdown().await;
        let (start, cursor) = snapshot;

        match self.mode {
            InsertMode::Insert | InsertMode::Stream => {
                {
                    let mut s = self.surface.lock().await;
                    // no-op safeguard against overlapping edits
                    s.replace_range("", start, Some(start));
                    // clear the streamed region; reinserted below
                    s.replace_range("", start, Some(cursor));
                }
                let end = self
                    .engine
                    .insert(
                        final_text,
                        &self.surface,
                        Some(start),
                        InsertMode::Insert,
                        &self.opts,
                    )
                    .await?;
                self.surface.lock().await.set_cursor(end);
                debug!(?end, "stream session completed");
                Ok(end)
            }
            mode => {
                let end = self
                    .engine
                    .insert(final_text, &self.surface, Some(start), mode, &self.opts)
                    .await?;
                if mode == InsertMode::Replace {
                    self.surface.lock().await.set_cursor(end);
                }
                Ok(end)
            }
        }
    }

    /// Abort the stream: stop the flush timer and restore the cursor to the
    /// pre-generation position. Already-flushed characters are left in
    /// place. Idempotent — cancelling twice, or after completion, is a
    /// no-op.
    pub async fn cancel(&self) {
        let restore = match self.state.lock() {
            Ok(mut st) => {
                if !st.active {
                    None
                } else {
                    st.active = false;
                    Some(st.start)
                }
            }
            Err(_) => None,
        };
        self.shutdown().await;
        if let Some(start) = restore {
            self.surface.lock().await.set_cursor(start);
            debug!(?start, "stream session cancelled, cursor restored");
        }
    }

    async fn shutdown(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.stop.notify_one();
        let task = match self.task.lock() {
            Ok(mut task) => task.take(),
            Err(_) => None,
        };
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        // a dropped session must not leave a live timer behind
        if let Ok(mut st) = self.state.lock() {
            st.active = false;
        }
        self.stopped.store(true, Ordering::SeqCst);
        self.stop.notify_one();
    }
}

/// One edit per tick: drain the pending buffer into the surface and advance
/// the cursor by exactly the flushed characters.
async fn flush_loop(
    surface: SharedSurface,
    state: Arc<Mutex<StreamState>>,
    stop: Arc<Notify>,
    stopped: Arc<AtomicBool>,
    interval: Duration,
    free_cursor: bool,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = stop.notified() => break,
            _ = ticker.tick() => {
                if stopped.load(Ordering::SeqCst) {
                    break;
                }
                let mut s = surface.lock().await;
                let Ok(mut st) = state.lock() else { break };
                if !st.active {
                    break;
                }
                if st.pending.is_empty() {
                    continue;
                }
                let chunk = std::mem::take(&mut st.pending);
                s.replace_range(&chunk, st.cursor, None);
                st.cursor = st.cursor.advance(&chunk);
                if !free_cursor {
                    s.set_cursor(st.cursor);
                }
            }
        }
    }
}

/// Boundary heuristics for the first flushed chunk only.
///
/// A bare trailing `:` wants the generation on its own line (unless the
/// configured prefix already starts one); otherwise a non-space character
/// before the insertion point earns a separating space when the chunk does
/// not bring its own whitespace. The configured prefix goes in front last.
fn shape_first_chunk(chunk: &str, preceding: Option<char>, prefix: &str) -> String {
    let mut content = chunk.to_string();
    let prefix_has_newline = prefix.contains('\n');
    let newline_led = content.starts_with('\n');
    let whitespace_led = content
        .chars()
        .next()
        .map(char::is_whitespace)
        .unwrap_or(true);

    match preceding {
        Some(':') if !prefix_has_newline && !newline_led => content.insert(0, '\n'),
        Some(c) if !c.is_whitespace() && !whitespace_led => content.insert(0, ' '),
        _ => {}
    }
    if !prefix.is_empty() {
        content.insert_str(0, prefix);
    }
    content
}
