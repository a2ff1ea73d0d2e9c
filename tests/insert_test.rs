// SPDX-License-Identifier: MIT
// Cursor insertion: whole-text modes, stream reassembly, first-chunk shaping,
// cancellation idempotence.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use textloom::surface::shared;
use textloom::{
    Artifact, BufferSurface, CursorInsertionEngine, FileStore, InsertMode, InsertOptions,
    MemoryFileStore, Position, SelectionEdge, SharedSurface, TextSurface,
};

fn engine() -> CursorInsertionEngine {
    CursorInsertionEngine::new(None)
}

fn fast_opts() -> InsertOptions {
    InsertOptions {
        flush_interval: Duration::from_millis(10),
        ..Default::default()
    }
}

async fn content_of(surface: &SharedSurface) -> String {
    surface.lock().await.content()
}

// ─── Whole-text modes ─────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_leaves_surrounding_content_untouched() {
    let surface = shared(BufferSurface::from_text("before after"));
    engine()
        .insert(
            "MID ",
            &surface,
            Some(Position::new(0, 7)),
            InsertMode::Insert,
            &InsertOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(content_of(&surface).await, "before MID after");
}

#[tokio::test]
async fn replace_substitutes_the_selection() {
    let mut buffer = BufferSurface::from_text("keep REMOVE keep");
    buffer.set_selection(Position::new(0, 5), Position::new(0, 11));
    let surface = shared(buffer);
    engine()
        .insert(
            "NEW",
            &surface,
            None,
            InsertMode::Replace,
            &InsertOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(content_of(&surface).await, "keep NEW keep");
}

#[tokio::test]
async fn rename_sanitizes_and_renames_the_artifact() {
    let store = Arc::new(MemoryFileStore::with_files([("notes/old.md", "body")]));
    let engine = CursorInsertionEngine::new(Some(store.clone()));
    let surface = shared(BufferSurface::new());
    let opts = InsertOptions {
        active_file: Some(Artifact::new("notes/old.md")),
        ..Default::default()
    };
    engine
        .insert(
            "\n\nA/Better: Title?",
            &surface,
            None,
            InsertMode::Rename,
            &opts,
        )
        .await
        .unwrap();
    assert!(store.exists(Path::new("notes/ABetter Title.md")).await);
    assert!(!store.exists(Path::new("notes/old.md")).await);
}

#[tokio::test]
async fn rename_without_active_artifact_is_a_noop() {
    let surface = shared(BufferSurface::from_text("unchanged"));
    engine()
        .insert(
            "Title",
            &surface,
            None,
            InsertMode::Rename,
            &InsertOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(content_of(&surface).await, "unchanged");
}

#[tokio::test]
async fn blockquote_wraps_whole_text_output() {
    let surface = shared(BufferSurface::new());
    let opts = InsertOptions {
        output_to_blockquote: true,
        ..Default::default()
    };
    engine()
        .insert("line one\nline two", &surface, None, InsertMode::Insert, &opts)
        .await
        .unwrap();
    let content = content_of(&surface).await;
    assert!(content.contains("> [!ai]+ AI"));
    assert!(content.contains("> line one\n> line two"));
}

// ─── Stream reassembly ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn streamed_chunks_equal_single_shot_insert() {
    let streamed = shared(BufferSurface::new());
    let session = engine()
        .begin_stream(streamed.clone(), None, InsertMode::Stream, fast_opts())
        .await;

    let mut assembled = String::new();
    for chunk in ["Hel", "lo, ", "world"] {
        assembled.push_str(&session.feed(chunk).expect("session active"));
        tokio::time::sleep(Duration::from_millis(15)).await; // let a flush tick run
    }
    session.end(&assembled).await.unwrap();

    let single = shared(BufferSurface::new());
    engine()
        .insert(
            "Hello, world",
            &single,
            Some(Position::new(0, 0)),
            InsertMode::Insert,
            &fast_opts(),
        )
        .await
        .unwrap();

    assert_eq!(content_of(&streamed).await, content_of(&single).await);
}

#[tokio::test(start_paused = true)]
async fn completion_moves_cursor_past_the_insertion() {
    let surface = shared(BufferSurface::new());
    let session = engine()
        .begin_stream(surface.clone(), None, InsertMode::Stream, fast_opts())
        .await;
    session.feed("two\nlines").unwrap();
    let end = session.end("two\nlines").await.unwrap();
    assert_eq!(end, Position::new(1, 5));
    assert_eq!(
        surface.lock().await.cursor(SelectionEdge::To),
        Position::new(1, 5)
    );
}

// ─── First-chunk shaping ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn trailing_colon_forces_a_newline_without_space() {
    let mut buffer = BufferSurface::from_text("Note:");
    buffer.set_cursor(Position::new(0, 5));
    let surface = shared(buffer);

    let session = engine()
        .begin_stream(surface.clone(), None, InsertMode::Stream, fast_opts())
        .await;
    let shaped = session.feed("Hello").unwrap();
    assert_eq!(shaped, "\nHello");
    session.end(&shaped).await.unwrap();

    assert_eq!(content_of(&surface).await, "Note:\nHello");
}

#[tokio::test(start_paused = true)]
async fn word_boundary_earns_a_single_space() {
    let mut buffer = BufferSurface::from_text("stop");
    buffer.set_cursor(Position::new(0, 4));
    let surface = shared(buffer);

    let session = engine()
        .begin_stream(surface.clone(), None, InsertMode::Stream, fast_opts())
        .await;
    let first = session.feed("go").unwrap();
    assert_eq!(first, " go");
    // shaping applies to the first chunk only
    assert_eq!(session.feed("ing").unwrap(), "ing");
    session.end(" going").await.unwrap();
    assert_eq!(content_of(&surface).await, "stop going");
}

#[tokio::test(start_paused = true)]
async fn configured_prefix_lands_once_in_front() {
    let mut buffer = BufferSurface::from_text("x");
    buffer.set_cursor(Position::new(0, 1));
    let surface = shared(buffer);
    let opts = InsertOptions {
        prefix: ">> ".into(),
        flush_interval: Duration::from_millis(10),
        ..Default::default()
    };
    let session = engine()
        .begin_stream(surface.clone(), None, InsertMode::Stream, opts)
        .await;
    assert_eq!(session.feed("a").unwrap(), ">>  a");
    assert_eq!(session.feed("b").unwrap(), "b");
}

// ─── Cancellation ─────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn cancel_keeps_flushed_text_and_restores_cursor() {
    let surface = shared(BufferSurface::new());
    let session = engine()
        .begin_stream(surface.clone(), None, InsertMode::Stream, fast_opts())
        .await;

    session.feed("committed").unwrap();
    tokio::time::sleep(Duration::from_millis(25)).await; // flushed
    session.feed("pending").unwrap();
    session.cancel().await;

    let content = content_of(&surface).await;
    assert_eq!(content, "committed", "flushed text stays, pending is dropped");
    assert_eq!(
        surface.lock().await.cursor(SelectionEdge::To),
        Position::new(0, 0),
        "cursor returns to the pre-generation position"
    );
}

#[tokio::test(start_paused = true)]
async fn cancelling_twice_is_a_noop() {
    let surface = shared(BufferSurface::from_text("base"));
    let session = engine()
        .begin_stream(surface.clone(), Some(Position::new(0, 4)), InsertMode::Stream, fast_opts())
        .await;
    session.feed(" tail").unwrap();
    tokio::time::sleep(Duration::from_millis(25)).await;

    session.cancel().await;
    let after_first = content_of(&surface).await;
    session.cancel().await;
    let after_second = content_of(&surface).await;

    assert_eq!(after_first, after_second);
    assert!(session.feed("late").is_none(), "a cancelled session rejects chunks");
}

#[tokio::test(start_paused = true)]
async fn new_stream_terminates_the_previous_session() {
    let surface = shared(BufferSurface::new());
    let engine = engine();
    let first = engine
        .begin_stream(surface.clone(), None, InsertMode::Stream, fast_opts())
        .await;
    assert!(first.feed("one").is_some());

    let second = engine
        .begin_stream(surface.clone(), None, InsertMode::Stream, fast_opts())
        .await;
    assert!(first.feed("more").is_none(), "old session is terminated");
    assert!(second.feed("two").is_some());
    second.end("two").await.unwrap();
}

// ─── Replace-mode streaming ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn replace_mode_buffers_until_completion() {
    let mut buffer = BufferSurface::from_text("keep OLD keep");
    buffer.set_selection(Position::new(0, 5), Position::new(0, 8));
    let surface = shared(buffer);

    let session = engine()
        .begin_stream(surface.clone(), None, InsertMode::Replace, fast_opts())
        .await;
    session.feed("NE").unwrap();
    tokio::time::sleep(Duration::from_millis(25)).await;
    // nothing committed while the stream is live
    assert_eq!(content_of(&surface).await, "keep OLD keep");

    session.feed("W").unwrap();
    session.end("NEW").await.unwrap();
    assert_eq!(content_of(&surface).await, "keep NEW keep");
}
