//! # ABI resolution (`weft-abi`)
//!
//! Decides how every value of every declared function crosses the boundary between the
//! script host and native code, and how overloaded functions pick a variant at runtime.
//!
//! ## Overview
//!
//! *   **Reachability:** every argument and return type, and every exported typedef, is
//!     marked reachable in the [`Session`](weft_ir::Session). Reachable composite types get
//!     names derived from the function and argument they first appear in, unless their shape
//!     was already named.
//! *   **Argument lowering:** each argument becomes an [`ArgLowering`]. Values with a direct
//!     C-ABI mapping are passed by value or by pointer. Everything else (nullable and optional
//!     values, sequences, records, unions) is stored in a per-variant communication struct,
//!     which is reordered and deduplicated like every other extern struct.
//! *   **Return lowering:** a [`ReturnStrategy`] per variant.
//! *   **Dispatch:** functions with more than one variant get a [`DispatchPlan`], proven
//!     unambiguous at generation time.

mod dispatch;
mod error;
mod lowering;
mod resolve;

pub use dispatch::{categories, Arm, Bucket, Category, CategorySet, DispatchNode, DispatchPlan};
pub use error::{AbiError, AbiResult};
pub use lowering::{ArgLowering, CommSlot, Resolution, ResolvedFunc, ResolvedVariant, ReturnStrategy};
pub use resolve::resolve;
