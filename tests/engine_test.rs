// SPDX-License-Identifier: MIT
// Generation engine: size guard, chunk delivery, cancellation, timeout.

mod common;

use common::{MockBackend, ScriptEvent};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use textloom::{
    BackendError, BackendOptions, CancelToken, Context, EngineConfig, GenError, GenerationEngine,
    GenerationOptions, Template,
};

fn engine(backend: MockBackend) -> (GenerationEngine, Arc<MockBackend>) {
    let backend = Arc::new(backend);
    (
        GenerationEngine::new(backend.clone(), EngineConfig::default()),
        backend,
    )
}

fn context(prompt: &str) -> Context {
    Context::from_prompt(prompt, GenerationOptions::default())
}

// ─── Size guard ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn oversized_input_never_reaches_the_backend() {
    let limit = 24 * 1024 * 1024;
    let (engine, backend) = engine(MockBackend::text("unused").with_limit(limit));
    let oversized = "x".repeat(25 * 1024 * 1024);

    let err = engine
        .generate(&context(&oversized), &BackendOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, GenError::InputTooLarge { actual, limit: l }
        if actual == 25 * 1024 * 1024 && l == limit));
    assert_eq!(backend.calls(), 0, "size guard must fire before dispatch");
}

#[tokio::test]
async fn input_at_the_limit_is_dispatched() {
    let (engine, backend) = engine(MockBackend::text("ok").with_limit(16));
    let text = engine
        .generate(&context("sixteen bytes!!!"), &BackendOptions::default())
        .await
        .unwrap();
    assert_eq!(text, "ok");
    assert_eq!(backend.calls(), 1);
}

// ─── Output-section rendering ─────────────────────────────────────────────────

#[tokio::test]
async fn output_section_renders_over_the_result() {
    let (engine, _) = engine(MockBackend::text("model words"));
    let template = Template::parse("prompt\n***\n=> {{output}}").unwrap();
    let ctx = Context {
        template: Some(Arc::new(template)),
        ..context("prompt")
    };
    let text = engine.generate(&ctx, &BackendOptions::default()).await.unwrap();
    assert_eq!(text, "=> model words");
}

// ─── Streaming delivery ───────────────────────────────────────────────────────

#[tokio::test]
async fn chunks_arrive_in_order_with_first_flag() {
    let (engine, _) = engine(MockBackend::streaming(&["Hel", "lo, ", "world"]));
    let seen: Arc<Mutex<Vec<(String, bool)>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_in_cb = seen.clone();

    let text = engine
        .stream_generate(&context("p"), &BackendOptions::default(), |chunk, first| {
            seen_in_cb.lock().unwrap().push((chunk.to_string(), first));
            Some(chunk.to_string())
        })
        .await
        .unwrap();

    assert_eq!(text, "Hello, world");
    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![
            ("Hel".to_string(), true),
            ("lo, ".to_string(), false),
            ("world".to_string(), false)
        ]
    );
}

#[tokio::test]
async fn transformed_chunks_become_the_final_text() {
    let (engine, _) = engine(MockBackend::streaming(&["hel", "lo"]));
    let text = engine
        .stream_generate(&context("p"), &BackendOptions::default(), |chunk, first| {
            if first {
                Some(chunk.to_uppercase())
            } else {
                Some(chunk.to_string())
            }
        })
        .await
        .unwrap();
    assert_eq!(text, "HELlo");
}

#[tokio::test]
async fn suppressed_chunks_are_omitted() {
    let (engine, _) = engine(MockBackend::streaming(&["keep", "drop", "keep"]));
    let text = engine
        .stream_generate(&context("p"), &BackendOptions::default(), |chunk, _| {
            (chunk != "drop").then(|| chunk.to_string())
        })
        .await
        .unwrap();
    assert_eq!(text, "keepkeep");
}

#[tokio::test]
async fn stream_failure_is_exactly_one_error() {
    let (engine, _) = engine(MockBackend::scripted(vec![
        ScriptEvent::Chunk("before "),
        ScriptEvent::Error("wire broke"),
    ]));
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_in_cb = seen.clone();

    let err = engine
        .stream_generate(&context("p"), &BackendOptions::default(), |chunk, _| {
            seen_in_cb.lock().unwrap().push(chunk.to_string());
            Some(chunk.to_string())
        })
        .await
        .unwrap_err();

    assert!(matches!(err, GenError::Backend(BackendError::Stream(_))));
    assert_eq!(*seen.lock().unwrap(), vec!["before ".to_string()]);
}

#[tokio::test]
async fn non_streamable_backend_is_reported_before_dispatch() {
    let (engine, backend) = engine(MockBackend::text("plain"));
    let err = engine
        .stream_generate(&context("p"), &BackendOptions::default(), |c, _| {
            Some(c.to_string())
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GenError::Backend(BackendError::NotStreamable)
    ));
    assert_eq!(backend.calls(), 0);
}

// ─── Cancellation ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn cancel_before_dispatch_settles_cancelled() {
    let (engine, backend) = engine(MockBackend::text("never"));
    let cancel = CancelToken::new();
    cancel.cancel();
    let opts = BackendOptions {
        cancel: cancel.clone(),
        ..Default::default()
    };
    let err = engine.generate(&context("p"), &opts).await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn cancel_mid_stream_settles_cancelled_not_failed() {
    let (engine, _) = engine(MockBackend::scripted(vec![
        ScriptEvent::Chunk("first"),
        ScriptEvent::Hang,
    ]));
    let cancel = CancelToken::new();
    let opts = BackendOptions {
        cancel: cancel.clone(),
        ..Default::default()
    };

    let err = engine
        .stream_generate(&context("p"), &opts, |chunk, _| {
            // user hits stop right after the first chunk lands
            cancel.cancel();
            Some(chunk.to_string())
        })
        .await
        .unwrap_err();

    assert!(err.is_cancelled(), "got {err:?}");
}

#[tokio::test(start_paused = true)]
async fn cancel_unblocks_a_hung_backend() {
    let (engine, _) = engine(MockBackend::hanging());
    let cancel = CancelToken::new();
    let opts = BackendOptions {
        cancel: cancel.clone(),
        ..Default::default()
    };
    let task = {
        let engine = Arc::new(engine);
        let engine_in_task = engine.clone();
        tokio::spawn(async move {
            engine_in_task
                .generate(&context("p"), &opts)
                .await
                .unwrap_err()
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    cancel.cancel();
    let err = task.await.unwrap();
    assert!(err.is_cancelled());
}

// ─── Timeout policy ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn configured_timeout_bounds_a_hung_call() {
    let backend = Arc::new(MockBackend::hanging());
    let engine = GenerationEngine::new(
        backend,
        EngineConfig {
            request_timeout: Some(Duration::from_millis(50)),
        },
    );
    let err = engine
        .generate(&context("p"), &BackendOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GenError::Backend(BackendError::Timeout(d)) if d == Duration::from_millis(50)
    ));
}

#[tokio::test(start_paused = true)]
async fn timeout_also_bounds_the_gap_between_chunks() {
    let backend = Arc::new(MockBackend::scripted(vec![
        ScriptEvent::Chunk("partial"),
        ScriptEvent::Hang,
    ]));
    let engine = GenerationEngine::new(
        backend,
        EngineConfig {
            request_timeout: Some(Duration::from_millis(50)),
        },
    );
    let err = engine
        .stream_generate(&context("p"), &BackendOptions::default(), |c, _| {
            Some(c.to_string())
        })
        .await
        .unwrap_err();
    assert!(matches!(err, GenError::Backend(BackendError::Timeout(_))));
}
