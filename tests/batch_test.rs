// SPDX-License-Identifier: MIT
// Batch orchestration: per-target isolation, sink behavior, summary.

mod common;

use common::CaptureReporter;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use textloom::batch::{BatchItem, BatchOrchestrator, GenerationOutcome, FAILED_PREFIX};
use textloom::{BackendError, CancelToken, Context, GenError, GenerationOptions};

fn items(prompts: &[&str]) -> Vec<BatchItem> {
    prompts
        .iter()
        .enumerate()
        .map(|(i, prompt)| BatchItem {
            target: PathBuf::from(format!("notes/{i}.md")),
            context: Context::from_prompt(*prompt, GenerationOptions::default()),
        })
        .collect()
}

fn backend_failure() -> GenError {
    GenError::Backend(BackendError::Api {
        status: 500,
        message: "exploded".into(),
    })
}

// ─── Isolation ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn a_failing_target_does_not_abort_the_batch() {
    common::init_tracing();
    let reporter = Arc::new(CaptureReporter::new());
    let orchestrator = BatchOrchestrator::new(reporter.clone());
    let sink_calls = AtomicU32::new(0);

    let results = orchestrator
        .run_batch(
            items(&["one", "boom", "three"]),
            &CancelToken::new(),
            |context| async move {
                if context.prompt_text == "boom" {
                    Err(backend_failure())
                } else {
                    Ok(format!("ok:{}", context.prompt_text))
                }
            },
            |_result, _index| {
                sink_calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            },
        )
        .await;

    assert_eq!(results.len(), 3, "all targets produce a result");
    assert_eq!(sink_calls.load(Ordering::SeqCst), 3, "sink runs for every result");

    let failures: Vec<_> = results.iter().filter(|r| r.outcome.is_failure()).collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].target, PathBuf::from("notes/1.md"));
    assert!(failures[0].artifact_text().starts_with(FAILED_PREFIX));
    assert!(failures[0].artifact_name().starts_with("FAILED-"));

    assert_eq!(
        results[0].outcome,
        GenerationOutcome::Success { text: "ok:one".into() }
    );
    assert_eq!(
        results[2].outcome,
        GenerationOutcome::Success { text: "ok:three".into() }
    );

    // one aggregate summary, successes never suppressed
    let messages = reporter.messages();
    assert!(messages.iter().any(|m| m.contains("1 of 3 generations failed")));
}

#[tokio::test]
async fn a_failing_sink_is_logged_and_the_loop_continues() {
    let orchestrator = BatchOrchestrator::new(Arc::new(CaptureReporter::new()));
    let seen: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_in_sink = seen.clone();

    let results = orchestrator
        .run_batch(
            items(&["a", "b", "c"]),
            &CancelToken::new(),
            |context| async move { Ok(context.prompt_text) },
            move |_result, index| {
                seen_in_sink.lock().unwrap().push(index);
                async move {
                    if index == 0 {
                        Err(GenError::Sink("disk full".into()))
                    } else {
                        Ok(())
                    }
                }
            },
        )
        .await;

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| !r.outcome.is_failure()));
    assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
}

// ─── Ordering & attribution ───────────────────────────────────────────────────

#[tokio::test]
async fn targets_run_sequentially_in_order() {
    let orchestrator = BatchOrchestrator::new(Arc::new(CaptureReporter::new()));
    let order: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let order_in_gen = order.clone();

    let results = orchestrator
        .run_batch(
            items(&["first", "second", "third"]),
            &CancelToken::new(),
            move |context| {
                let order = order_in_gen.clone();
                async move {
                    order.lock().unwrap().push(context.prompt_text.clone());
                    Ok(context.prompt_text)
                }
            },
            |_r, _i| async { Ok(()) },
        )
        .await;

    assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    assert_eq!(results[1].target, PathBuf::from("notes/1.md"));
}

// ─── Cancellation between targets ─────────────────────────────────────────────

#[tokio::test]
async fn cancellation_stops_remaining_targets() {
    let orchestrator = BatchOrchestrator::new(Arc::new(CaptureReporter::new()));
    let cancel = CancelToken::new();
    let cancel_in_gen = cancel.clone();

    let results = orchestrator
        .run_batch(
            items(&["a", "b", "c"]),
            &cancel,
            move |context| {
                let cancel = cancel_in_gen.clone();
                async move {
                    if context.prompt_text == "b" {
                        cancel.cancel();
                        Err(GenError::Cancelled)
                    } else {
                        Ok(context.prompt_text)
                    }
                }
            },
            |_r, _i| async { Ok(()) },
        )
        .await;

    // target c never starts; a and b are recorded
    assert_eq!(results.len(), 2);
    assert!(results[1].outcome.is_failure());
}
