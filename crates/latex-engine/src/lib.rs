//! LaTeX fragment rendering engine
//!
//! This crate turns short LaTeX fragments into PNG images using an external
//! TeX toolchain, including:
//! - Template resolution (explicit version or latest, with reported fallback)
//! - The compile pipeline (substitute, xelatex, convert, read back, clean up)
//! - `CompiledFragment`, which keeps a fragment and its image consistent
//! - A bounded compile worker with cancellation (async)
//!
//! # Feature Flags
//!
//! - `async` (default): Enables `compile` with kill-on-drop subprocesses and the
//!   `worker` module (requires tokio)

pub mod compiler;
pub mod fragment;
pub mod templates;
pub mod toolchain;

#[cfg(feature = "async")]
pub mod worker;

pub use compiler::{
    CompileOptions, CompiledImage, LatexCompiler, Pipeline, PipelineError, Rendered,
};
pub use fragment::{CompiledFragment, FragmentCompiler, FragmentError, FragmentState, FragmentUpdate};
pub use templates::{
    InMemoryTemplateStore, Resolution, Resolved, Template, TemplateError, TemplateId,
    TemplateResolver, TemplateStore, PLACEHOLDER,
};
pub use toolchain::{Tool, ToolchainConfig};

#[cfg(feature = "async")]
pub use worker::{CompileRequest, CompileTicket, CompileWorker};
