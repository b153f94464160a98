//! Declaration front-end for weft.
//!
//! Declarations describe the types and functions of one native module. They come in two
//! forms that share one code path:
//! - the `DeclScope` combinators, called directly from Rust
//! - `*.bind.toml` declaration files, evaluated by driving those same combinators
//!
//! Each declaration file must sit next to its implementation file (`fs.bind.toml` pairs
//! with `fs.zig`) and gets a PascalCase namespace from its base name.

mod config;
mod decl;
mod discover;
mod error;
mod expr;
mod loader;

pub use config::{GeneratorConfig, InputConfig, OutputConfig};
pub use decl::{declare, paired_path, DeclScope, FnDecl};
pub use discover::discover;
pub use error::{DeclError, DeclResult};
pub use loader::load_file;
