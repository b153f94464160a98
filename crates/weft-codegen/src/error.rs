use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;
use weft_abi::AbiError;
use weft_front::DeclError;
use weft_ir::IrError;

pub type CodegenResult<T> = Result<T, CodegenError>;

/// Errors that stop a generation run.
#[derive(Debug, Error, Diagnostic)]
pub enum CodegenError {
    #[error("cannot access {}", path.display())]
    #[diagnostic(code("GEN-001"))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Decl(#[from] DeclError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Abi(#[from] AbiError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Ir(#[from] IrError),
}
