//! Type IR for the weft binding generator.
//!
//! This crate owns the pieces every later stage reads:
//! - `TypeArena`: structurally hashed, immutable type descriptors addressed by `TypeId`
//! - `ExternStruct`/`ExternStructs`: packed C-ABI layouts, deduplicated by field-tag hash
//! - `Session`: the per-run registries (reachable types, names, owners, files, funcs)
//!
//! Nothing here is global. A `Session` is created for one generation run and dropped
//! at the end of it, so two runs can never observe each other's names or layouts.

mod abi;
mod arena;
mod default;
mod error;
mod file;
mod func;
mod layout;
pub mod naming;
mod origin;
mod session;
mod ty;

pub use abi::CAbiType;
pub use arena::{TypeArena, TypeNode};
pub use default::DefaultValue;
pub use error::{IrError, IrResult};
pub use file::{DeclFile, FileId};
pub use func::{Arg, Func, FuncId, Variant};
pub use layout::{ExternField, ExternStruct, ExternStructId, ExternStructs, StructLayout};
pub use origin::Origin;
pub use session::{DictSlot, DictionaryLayout, Session};
pub use ty::{Field, Flags, TypeId, TypeKind};
