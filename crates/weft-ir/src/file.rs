use std::path::PathBuf;

use crate::func::FuncId;
use crate::ty::TypeId;

/// Index of a declaration file in the session, in evaluation (sorted path) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub(crate) u32);

impl FileId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One declaration file and everything it registered.
#[derive(Debug, Clone)]
pub struct DeclFile {
    /// Path relative to the source root.
    pub path: PathBuf,
    /// Paired implementation file, relative to the source root.
    pub impl_path: PathBuf,
    /// PascalCase base name, unique across the run.
    pub namespace: String,
    pub funcs: Vec<FuncId>,
    /// Exported type aliases in declaration order.
    pub typedefs: Vec<(String, TypeId)>,
}

impl DeclFile {
    pub fn new(path: impl Into<PathBuf>, impl_path: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        DeclFile {
            path: path.into(),
            impl_path: impl_path.into(),
            namespace: namespace.into(),
            funcs: Vec::new(),
            typedefs: Vec::new(),
        }
    }
}
