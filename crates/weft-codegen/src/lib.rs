//! # Binding emitters (`weft-codegen`)
//!
//! Turns a resolved [`Session`](weft_ir::Session) into three kinds of text artifact:
//!
//! *   `GeneratedBindings.cpp`: host glue converting script values, calling native dispatch
//!     symbols and selecting overloads.
//! *   `bindgen_generated.zig`: the native side of every dispatch symbol, the shared `abi`
//!     structs and typed handles on the host functions.
//! *   `Generated<Ns>.h`: one header per declaration file.
//!
//! [`generate`] runs the whole pipeline from a source root and only rewrites artifacts whose
//! contents changed.

mod context;
mod cpp;
mod error;
mod generator;
mod header;
mod output;
mod writer;
mod zig;

pub use context::BANNER;
pub use error::{CodegenError, CodegenResult};
pub use generator::{emit_all, generate, GenerateOptions, GenerateReport};
pub use output::{write_if_changed, Artifact, WriteReport};
