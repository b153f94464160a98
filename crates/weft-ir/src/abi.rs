use std::fmt;

use crate::layout::ExternStructId;

/// A value shape that can cross the boundary by plain memory copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CAbiType {
    Bool,
    U8,
    U16,
    U32,
    Usize,
    F64,
    /// Boxed dynamic host value.
    JsValue,
    /// Reference-counted host string (tag byte + implementation pointer).
    BoxedString,
    GlobalObject,
    VirtualMachine,
    /// Zero-sized; never stored in a struct and never passed.
    Unit,
    Pointer(Box<CAbiType>),
    Struct(ExternStructId),
}

impl CAbiType {
    /// Smallest unsigned integer that can tag `count` distinct values.
    pub fn discriminant(count: usize) -> CAbiType {
        if count <= 256 {
            CAbiType::U8
        } else if count <= 65536 {
            CAbiType::U16
        } else {
            CAbiType::U32
        }
    }

    /// Size and alignment in bytes for everything but `Struct`, which lives in the registry.
    pub fn primitive_layout(&self) -> Option<(usize, usize)> {
        let layout = match self {
            CAbiType::Bool | CAbiType::U8 => (1, 1),
            CAbiType::U16 => (2, 2),
            CAbiType::U32 => (4, 4),
            CAbiType::Usize | CAbiType::F64 | CAbiType::JsValue => (8, 8),
            CAbiType::GlobalObject | CAbiType::VirtualMachine | CAbiType::Pointer(_) => (8, 8),
            CAbiType::BoxedString => (16, 8),
            CAbiType::Unit => (0, 1),
            CAbiType::Struct(_) => return None,
        };
        Some(layout)
    }

    /// Values small enough to pass in a register. Everything else goes by pointer.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, CAbiType::BoxedString | CAbiType::Struct(_))
    }

    pub fn is_zero_sized(&self) -> bool {
        matches!(self, CAbiType::Unit)
    }
}

impl fmt::Display for CAbiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CAbiType::Bool => f.write_str("bool"),
            CAbiType::U8 => f.write_str("u8"),
            CAbiType::U16 => f.write_str("u16"),
            CAbiType::U32 => f.write_str("u32"),
            CAbiType::Usize => f.write_str("usize"),
            CAbiType::F64 => f.write_str("f64"),
            CAbiType::JsValue => f.write_str("JSValue"),
            CAbiType::BoxedString => f.write_str("BoxedString"),
            CAbiType::GlobalObject => f.write_str("*GlobalObject"),
            CAbiType::VirtualMachine => f.write_str("*VirtualMachine"),
            CAbiType::Unit => f.write_str("unit"),
            CAbiType::Pointer(inner) => write!(f, "*{}", inner),
            CAbiType::Struct(id) => write!(f, "struct#{}", id.index()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminant_grows_with_count() {
        assert_eq!(CAbiType::discriminant(2), CAbiType::U8);
        assert_eq!(CAbiType::discriminant(256), CAbiType::U8);
        assert_eq!(CAbiType::discriminant(257), CAbiType::U16);
        assert_eq!(CAbiType::discriminant(70_000), CAbiType::U32);
    }

    #[test]
    fn strings_and_structs_go_by_pointer() {
        assert!(CAbiType::F64.is_scalar());
        assert!(CAbiType::GlobalObject.is_scalar());
        assert!(!CAbiType::BoxedString.is_scalar());
    }
}
