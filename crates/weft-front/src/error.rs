use std::path::PathBuf;

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;
use weft_ir::{IrError, Origin};

pub type DeclResult<T> = Result<T, DeclError>;

/// Errors raised while discovering, pairing and evaluating declaration files.
#[derive(Debug, Error, Diagnostic)]
pub enum DeclError {
    #[error("declaration file {} has no implementation file {}", declaration.display(), expected.display())]
    #[diagnostic(
        code("DECL-001"),
        help("every declaration file needs an implementation file at the same path with the implementation suffix")
    )]
    MissingPair {
        declaration: PathBuf,
        expected: PathBuf,
    },

    #[error("namespace `{namespace}` of {} is already used by {}", second.display(), first.display())]
    #[diagnostic(
        code("DECL-002"),
        help("declaration file base names must be unique across the source tree")
    )]
    NamespaceCollision {
        namespace: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("function declared at {origin} in {} is never exported", file.display())]
    #[diagnostic(code("DECL-003"), help("call `export_fn` with a public name for every declared function"))]
    UnnamedFunction { file: PathBuf, origin: Origin },

    #[error("unknown type `{name}` (at {origin})")]
    #[diagnostic(
        code("DECL-004"),
        help("use a primitive type name or a type declared earlier in the same file")
    )]
    UnknownType { name: String, origin: Origin },

    #[error("invalid type expression at {origin}: {message}")]
    #[diagnostic(code("DECL-005"))]
    InvalidTypeExpr {
        message: String,
        origin: Origin,
        #[source_code]
        src: String,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("invalid declaration at {origin}: {reason}")]
    #[diagnostic(code("DECL-006"))]
    InvalidDeclaration { reason: String, origin: Origin },

    #[error("could not parse declaration file {}: {message}", path.display())]
    #[diagnostic(code("DECL-007"))]
    Toml { path: PathBuf, message: String },

    #[error("could not read {}", path.display())]
    #[diagnostic(code("DECL-008"))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration in {}: {message}", path.display())]
    #[diagnostic(
        code("DECL-009"),
        help("check weft.toml against the documented [input] and [output] keys")
    )]
    Config { path: PathBuf, message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Ir(#[from] IrError),
}
