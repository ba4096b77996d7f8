//! Reference backend: a small tree-walking interpreter implementing the [`crate::napi`] traits.
//!
//! Source goes through [`token`] and [`parser`] into an AST that [`interp`] evaluates over
//! reference-counted objects. Cycles created by script are broken when the context is dropped.

pub(crate) mod ast;
pub(crate) mod builtins;
mod ctx;
pub(crate) mod interp;
pub(crate) mod json;
pub(crate) mod number;
pub(crate) mod object;
pub(crate) mod parser;
pub(crate) mod stack;
pub(crate) mod token;
mod try_catch;
mod vm;

pub use ctx::{LiteCtx, LiteCtxValue};
pub use try_catch::LiteTryCatch;
pub use vm::{LiteVm, TerminationHandle};
