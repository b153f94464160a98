use crate::file::FileId;
use crate::origin::Origin;
use crate::ty::TypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub(crate) u32);

impl FuncId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub name: String,
    pub ty: TypeId,
}

impl Arg {
    pub fn new(name: impl Into<String>, ty: TypeId) -> Self {
        Arg { name: name.into(), ty }
    }
}

/// One overload of a function.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub args: Vec<Arg>,
    pub ret: TypeId,
}

impl Variant {
    pub fn new(args: Vec<Arg>, ret: TypeId) -> Self {
        Variant { args, ret }
    }
}

/// A bound function. The name is assigned when the declaration file exports it.
#[derive(Debug, Clone)]
pub struct Func {
    pub name: Option<String>,
    pub file: FileId,
    pub variants: Vec<Variant>,
    pub origin: Origin,
}

impl Func {
    /// The exported name, or a placeholder for diagnostics about unexported functions.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}
