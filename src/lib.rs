// SPDX-License-Identifier: MIT
//! textloom — template-driven text generation.
//!
//! Turns a template into a fully resolved prompt context, invokes a
//! language-model backend (streaming or not), and commits the result into a
//! live text surface or a file store — tracking cursor state, cancellation,
//! and per-target failure across single and batched generations.
//!
//! The pipeline, leaf first:
//!
//! - [`template`] — section splitting, variable extraction, frontmatter
//! - [`context`] — layered option/variable resolution into one [`Context`]
//! - [`engine`] — backend invocation, size guard, chunk delivery,
//!   cancellation
//! - [`insert`] — whole-text and streaming insertion into a surface
//! - [`batch`] — sequential multi-target orchestration with failure
//!   isolation
//!
//! Hosts plug in behind three boundary traits: [`Backend`],
//! [`TextSurface`](surface::TextSurface), and [`FileStore`]. The
//! [`Generator`] facade wires everything for the common flows.

pub mod backend;
pub mod batch;
pub mod cancel;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod generator;
pub mod insert;
pub mod retry;
pub mod status;
pub mod store;
pub mod surface;
pub mod template;

pub use backend::{Backend, BackendOptions, OpenAiBackend};
pub use batch::{BatchItem, BatchItemResult, BatchOrchestrator, GenerationOutcome};
pub use cancel::CancelToken;
pub use config::Settings;
pub use context::{Context, ContextBuilder, ContextRequest, EditorState, GenerationOptions, Overrides};
pub use engine::{EngineConfig, GenerationEngine};
pub use error::{BackendError, ContextBuildError, GenError, ParseError};
pub use generator::{GenerationRequest, Generator};
pub use insert::{CursorInsertionEngine, InsertMode, InsertOptions, StreamSession};
pub use status::{GenerationStatus, NullReporter, ProgressReporter};
pub use store::{Artifact, FileStore, FsFileStore, MemoryFileStore};
pub use surface::{BufferSurface, Position, SelectionEdge, SharedSurface, TextSurface};
pub use template::{Template, TemplateFrontmatter, TemplateLibrary, VarMap};
