use weft_ir::{CAbiType, ExternStructId, FuncId};

use crate::dispatch::DispatchPlan;

/// How one argument crosses into native code.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgLowering {
    /// `undefined`: nothing is stored or passed.
    Unit,
    /// Passed in a register as the given tag.
    ByValue(CAbiType),
    /// Materialized on the caller's stack and passed by pointer.
    ByPointer(CAbiType),
    /// A hidden argument injected by the glue rather than supplied by the caller.
    Context(CAbiType),
    /// Stored in the variant's communication struct.
    Comm(CommSlot),
}

impl ArgLowering {
    /// Arguments the script caller actually supplies.
    pub fn is_visible(&self) -> bool {
        !matches!(self, ArgLowering::Context(_))
    }
}

/// Fields of the communication struct that hold one argument.
///
/// Field names are those of the canonical registered struct.
#[derive(Debug, Clone, PartialEq)]
pub enum CommSlot {
    Value {
        is_set: Option<String>,
        /// `None` for zero-sized values.
        value: Option<String>,
        abi: CAbiType,
    },
    Sequence {
        is_set: Option<String>,
        ptr: String,
        len: String,
        element: CAbiType,
    },
    Record {
        is_set: Option<String>,
        keys: String,
        values: String,
        len: String,
        value: CAbiType,
    },
    OneOf {
        is_set: Option<String>,
        tag: String,
        tag_abi: CAbiType,
        /// One entry per member; `None` for zero-sized members.
        members: Vec<Option<(String, CAbiType)>>,
    },
}

impl CommSlot {
    pub fn is_set(&self) -> Option<&str> {
        match self {
            CommSlot::Value { is_set, .. }
            | CommSlot::Sequence { is_set, .. }
            | CommSlot::Record { is_set, .. }
            | CommSlot::OneOf { is_set, .. } => is_set.as_deref(),
        }
    }

    pub(crate) fn rename(&mut self, rename: &impl Fn(&str) -> String) {
        fn apply(name: &mut String, rename: &impl Fn(&str) -> String) {
            *name = rename(name);
        }
        let is_set = match self {
            CommSlot::Value { is_set, value, .. } => {
                if let Some(value) = value {
                    apply(value, rename);
                }
                is_set
            }
            CommSlot::Sequence { is_set, ptr, len, .. } => {
                apply(ptr, rename);
                apply(len, rename);
                is_set
            }
            CommSlot::Record {
                is_set,
                keys,
                values,
                len,
                ..
            } => {
                apply(keys, rename);
                apply(values, rename);
                apply(len, rename);
                is_set
            }
            CommSlot::OneOf {
                is_set, tag, members, ..
            } => {
                apply(tag, rename);
                for (name, _) in members.iter_mut().flatten() {
                    apply(name, rename);
                }
                is_set
            }
        };
        if let Some(is_set) = is_set {
            apply(is_set, rename);
        }
    }
}

/// How the native result travels back.
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnStrategy {
    /// Native returns a success flag; nothing else.
    Void,
    /// Native returns an encoded host value that represents failure by itself.
    JsValue,
    /// Native returns a success flag and writes the result through a trailing pointer.
    OutParam(CAbiType),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedVariant {
    /// One entry per declared argument, in declared order.
    pub args: Vec<ArgLowering>,
    pub ret: ReturnStrategy,
    pub comm: Option<ExternStructId>,
    /// No context argument was declared; the native side gets one anyway.
    pub implicit_context: bool,
    /// One past the last visible argument that must be supplied.
    pub min_args: usize,
    pub max_args: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFunc {
    pub variants: Vec<ResolvedVariant>,
    /// Present when the function has more than one variant.
    pub dispatch: Option<DispatchPlan>,
    pub min_args: usize,
    pub max_args: usize,
}

/// Lowering decisions for every function of a session, indexed by `FuncId`.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub(crate) funcs: Vec<ResolvedFunc>,
}

impl Resolution {
    pub fn func(&self, id: FuncId) -> &ResolvedFunc {
        &self.funcs[id.index()]
    }
}
