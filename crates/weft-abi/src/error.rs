use miette::Diagnostic;
use thiserror::Error;
use weft_ir::{IrError, Origin};

pub type AbiResult<T> = Result<T, AbiError>;

#[derive(Debug, Error, Diagnostic, Clone, PartialEq)]
pub enum AbiError {
    /// A shape the lowering pass has no crossing strategy for yet.
    #[error("TODO: {what} is not supported yet (in `{func}`, declared at {origin})")]
    #[diagnostic(code("ABI-001"))]
    Unsupported {
        what: String,
        func: String,
        origin: Origin,
    },

    #[error("overloads of `{func}` (declared at {origin}) cannot be told apart at runtime:\n{}", .candidates.join("\n"))]
    #[diagnostic(
        code("ABI-002"),
        help("make the overloads differ in argument count or in the runtime category (object, string, number, boolean, undefined) of some argument")
    )]
    Ambiguous {
        func: String,
        candidates: Vec<String>,
        origin: Origin,
    },

    #[error("`{func}` takes more than one context argument (declared at {origin})")]
    #[diagnostic(
        code("ABI-003"),
        help("a variant may take at most one `globalObject` or `zigVirtualMachine` argument")
    )]
    MultipleContextArgs { func: String, origin: Origin },

    #[error("argument buffer field `{field}` of `{func}` is produced twice (declared at {origin})")]
    #[diagnostic(
        code("ABI-004"),
        help("buffered arguments add `Set`, `Ptr`, `Len`, `Keys`, `Values`, `Tag` and `Option<n>` companions; rename the argument")
    )]
    FieldClash {
        func: String,
        field: String,
        origin: Origin,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Ir(#[from] IrError),
}
