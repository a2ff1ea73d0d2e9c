// SPDX-License-Identifier: MIT
//! Batch orchestration — one generation per target, failures isolated.
//!
//! Targets run sequentially, never concurrently: backend load stays bounded,
//! status reporting stays legible, and cursor/file writes never interleave.
//! A target's failure becomes a tagged [`GenerationOutcome::Failure`] rather
//! than a thrown error, so the loop always reaches every remaining target;
//! the per-target sink (`on_each`) runs after every result, and its own
//! failures are logged without stopping the loop. One aggregate summary is
//! reported at the end.

use crate::cancel::CancelToken;
use crate::context::Context;
use crate::error::GenError;
use crate::status::{report_progress, ProgressReporter};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Sentinel marking a failed generation inside its artifact text.
pub const FAILED_PREFIX: &str = "FAILED:";

/// Tagged outcome of one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Success { text: String },
    Failure { reason: String },
}

impl GenerationOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, GenerationOutcome::Failure { .. })
    }
}

/// One target's result, attributable back to the file it came from.
#[derive(Debug, Clone)]
pub struct BatchItemResult {
    pub target: PathBuf,
    pub outcome: GenerationOutcome,
    pub finished_at: DateTime<Utc>,
}

impl BatchItemResult {
    /// The text written for this target — failures carry the sentinel tag.
    pub fn artifact_text(&self) -> String {
        match &self.outcome {
            GenerationOutcome::Success { text } => text.clone(),
            GenerationOutcome::Failure { reason } => format!("{FAILED_PREFIX} {reason}"),
        }
    }

    /// Artifact filename for this target; failed targets are marked.
    pub fn artifact_name(&self) -> String {
        let name = self
            .target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output.md".to_string());
        if self.outcome.is_failure() {
            format!("FAILED-{name}")
        } else {
            name
        }
    }
}

/// A target paired with its pre-built context.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub target: PathBuf,
    pub context: Context,
}

impl BatchItem {
    /// Pair targets with their built contexts, dropping targets whose
    /// context failed to build — in one pass, after all contexts exist. A
    /// target with no valid context never reaches the engine.
    pub fn pair(files: &[PathBuf], contexts: Vec<Option<Context>>) -> Vec<BatchItem> {
        files
            .iter()
            .zip(contexts)
            .filter_map(|(file, context)| {
                context.map(|context| BatchItem {
                    target: file.clone(),
                    context,
                })
            })
            .collect()
    }
}

pub struct BatchOrchestrator {
    reporter: Arc<dyn ProgressReporter>,
}

impl BatchOrchestrator {
    pub fn new(reporter: Arc<dyn ProgressReporter>) -> Self {
        Self { reporter }
    }

    /// Drive `generate` across `items` sequentially.
    ///
    /// `on_each` materializes one artifact per result (success or failure);
    /// its errors are logged and never stop the loop. Cancellation is
    /// honored between targets: the target that observed it is recorded,
    /// the rest are not started. Returns every produced result.
    pub async fn run_batch<G, GFut, S, SFut>(
        &self,
        items: Vec<BatchItem>,
        cancel: &CancelToken,
        mut generate: G,
        mut on_each: S,
    ) -> Vec<BatchItemResult>
    where
        G: FnMut(Context) -> GFut,
        GFut: Future<Output = Result<String, GenError>>,
        S: FnMut(BatchItemResult, usize) -> SFut,
        SFut: Future<Output = Result<(), GenError>>,
    {
        let total = items.len();
        let mut results: Vec<BatchItemResult> = Vec::with_capacity(total);

        for (index, item) in items.into_iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(
                    completed = results.len(),
                    total, "batch cancelled, remaining targets not started"
                );
                break;
            }
            report_progress(
                &*self.reporter,
                format!("generating {}/{total}: {}", index + 1, item.target.display()),
                true,
            );

            let mut cancelled = false;
            let outcome = match generate(item.context).await {
                Ok(text) => GenerationOutcome::Success { text },
                Err(err) => {
                    cancelled = err.is_cancelled();
                    warn!(file = %item.target.display(), error = %err, "target generation failed");
                    GenerationOutcome::Failure {
                        reason: err.to_string(),
                    }
                }
            };

            let result = BatchItemResult {
                target: item.target,
                outcome,
                finished_at: Utc::now(),
            };
            if let Err(err) = on_each(result.clone(), index).await {
                // sink failure: logged, loop continues
                warn!(file = %result.target.display(), error = %err, "batch sink failed");
            }
            results.push(result);

            if cancelled {
                break;
            }
        }

        let failed = results.iter().filter(|r| r.outcome.is_failure()).count();
        if failed > 0 {
            warn!(failed, total, "batch finished with failures");
            report_progress(
                &*self.reporter,
                format!("{failed} of {total} generations failed"),
                false,
            );
        } else {
            debug!(total, "batch finished");
            report_progress(&*self.reporter, format!("{total} generations finished"), false);
        }
        results
    }
}
