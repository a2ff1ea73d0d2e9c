// SPDX-License-Identifier: MIT
//! Progress reporting and the user-facing failure funnel.
//!
//! The pipeline never talks to a status bar directly — it is handed a
//! [`ProgressReporter`] and calls it with [`GenerationStatus`] values. The
//! process-wide in-progress flag exists only to drive UI affordances; it is
//! **not** a lock and must never be used to reason about whether a
//! generation may start.
//!
//! Every user-facing failure goes through [`report_failure`]: one
//! notification path, which optionally annotates the live surface with a
//! formatted failure block and never raises a second error while doing so.

use crate::error::GenError;
use crate::surface::{SelectionEdge, SharedSurface, TextSurface};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::error;

/// Observable state of the pipeline, for status bars and spinners.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationStatus {
    pub active: bool,
    pub message: String,
}

/// Callback the pipeline reports progress through.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, status: &GenerationStatus);
}

/// Reporter that drops everything — headless runs and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn report(&self, _status: &GenerationStatus) {}
}

static GENERATION_IN_PROGRESS: AtomicBool = AtomicBool::new(false);

/// Flip the UI-only in-progress flag.
pub fn set_in_progress(active: bool) {
    GENERATION_IN_PROGRESS.store(active, Ordering::SeqCst);
}

/// Whether any generation is currently running, for UI only. Consumers must
/// not assume this prevents concurrent generations.
pub fn in_progress() -> bool {
    GENERATION_IN_PROGRESS.load(Ordering::SeqCst)
}

pub fn report_progress(reporter: &dyn ProgressReporter, message: impl Into<String>, active: bool) {
    reporter.report(&GenerationStatus {
        active,
        message: message.into(),
    });
}

/// The single notification path for failures.
///
/// Cancellation is reported as inactive status, never as an error. For real
/// failures the status line is updated and, when a surface is supplied, a
/// `[!failure]+` block is appended at the cursor. Nothing in here can raise
/// a second error — surface annotation is fire-and-forget.
pub async fn report_failure(
    reporter: &dyn ProgressReporter,
    surface: Option<&SharedSurface>,
    err: &GenError,
) {
    if err.is_cancelled() {
        report_progress(reporter, "generation cancelled", false);
        return;
    }
    error!(error = %err, "generation failed");
    report_progress(reporter, format!("generation failed: {err}"), false);
    if let Some(surface) = surface {
        let mut s = surface.lock().await;
        let at = s.cursor(SelectionEdge::To);
        s.replace_range(&failure_block(err), at, None);
    }
}

fn failure_block(err: &GenError) -> String {
    let mut block = String::from("\n> [!failure]+ Generation failed\n");
    for line in err.to_string().lines() {
        block.push_str("> ");
        block.push_str(line);
        block.push('\n');
    }
    block
}
