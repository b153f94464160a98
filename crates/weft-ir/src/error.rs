use miette::Diagnostic;
use thiserror::Error;

use crate::origin::Origin;

/// Result type for IR operations
pub type IrResult<T> = Result<T, IrError>;

/// Shape errors raised while building or hashing types.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq)]
pub enum IrError {
    #[error("cannot mark `{kind}` as {requested}: it is already {existing} (declared at {origin})")]
    #[diagnostic(
        code("IR-001"),
        help("`optional`, `required` and `default(..)` exclude each other; only a default may follow `optional`")
    )]
    FlagConflict {
        kind: String,
        requested: &'static str,
        existing: &'static str,
        origin: Origin,
    },

    #[error("invalid default {value} for `{kind}` (declared at {origin}): {reason}")]
    #[diagnostic(code("IR-002"))]
    InvalidDefault {
        kind: String,
        value: String,
        reason: String,
        origin: Origin,
    },

    #[error("TODO: default values on `{kind}` types are not supported (declared at {origin})")]
    #[diagnostic(code("IR-003"))]
    UnsupportedDefault { kind: String, origin: Origin },

    #[error("TODO: `ref<{name}>` types are not supported yet (declared at {origin})")]
    #[diagnostic(
        code("IR-004"),
        help("declare the referenced type inline or as a typedef earlier in the same file")
    )]
    RefUnsupported { name: String, origin: Origin },

    #[error("`oneOf` member `{member}` {reason} (declared at {origin})")]
    #[diagnostic(
        code("IR-005"),
        help("put `nullable`/`default` on the `oneOf` itself, not on its members")
    )]
    OneOfMember {
        member: String,
        reason: &'static str,
        origin: Origin,
    },

    #[error("dictionary field `{key}` is a virtual-only `{kind}` marker (declared at {origin})")]
    #[diagnostic(code("IR-006"))]
    VirtualField {
        key: String,
        kind: String,
        origin: Origin,
    },

    #[error("dictionary declares field `{key}` twice (declared at {origin})")]
    #[diagnostic(code("IR-007"))]
    DuplicateField { key: String, origin: Origin },

    #[error("invalid string enum (declared at {origin}): {reason}")]
    #[diagnostic(code("IR-008"))]
    InvalidEnum { reason: String, origin: Origin },

    #[error("dictionary field `{field}` clashes with a generated or differently spelled field (declared at {origin})")]
    #[diagnostic(
        code("IR-009"),
        help("optional fields get a `<key>Set` companion and keys are spelled as C++ identifiers; rename the key")
    )]
    FieldClash { field: String, origin: Origin },
}
