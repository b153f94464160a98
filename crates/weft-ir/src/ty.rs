use std::fmt;

use crate::default::DefaultValue;

/// Handle to a type node in a `TypeArena`.
///
/// Primitive kinds are allocated first, in a fixed order, so they can be named by the
/// constants below without touching the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) u32);

impl TypeId {
    pub const BOOLEAN: TypeId = TypeId(0);
    pub const STRICT_BOOLEAN: TypeId = TypeId(1);
    pub const F64: TypeId = TypeId(2);
    pub const USIZE: TypeId = TypeId(3);
    pub const DOM_STRING: TypeId = TypeId(4);
    pub const BYTE_STRING: TypeId = TypeId(5);
    pub const USV_STRING: TypeId = TypeId(6);
    pub const UTF8_STRING: TypeId = TypeId(7);
    pub const ANY: TypeId = TypeId(8);
    pub const UNDEFINED: TypeId = TypeId(9);
    pub const GLOBAL_OBJECT: TypeId = TypeId(10);
    pub const VIRTUAL_MACHINE: TypeId = TypeId(11);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A named member of a dictionary. Order is the declared order.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub key: String,
    pub ty: TypeId,
}

/// The closed set of type kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Boolean,
    /// Like `Boolean`, but rejects non-boolean values instead of coercing them.
    StrictBoolean,
    F64,
    Usize,
    DomString,
    ByteString,
    UsvString,
    Utf8String,
    Any,
    Undefined,
    /// Virtual-only: the host's global object, injected as a hidden argument.
    GlobalObject,
    /// Virtual-only: the native virtual machine, injected as a hidden argument.
    VirtualMachine,
    Sequence(TypeId),
    Record(TypeId),
    OneOf(Vec<TypeId>),
    Dictionary(Vec<Field>),
    /// An enum defined in native code, named by its fully qualified path.
    NativeEnum(String),
    StringEnum(Vec<String>),
    Ref(String),
}

impl TypeKind {
    /// Primitive kinds in `TypeId` constant order.
    pub(crate) const PRIMITIVES: [TypeKind; 12] = [
        TypeKind::Boolean,
        TypeKind::StrictBoolean,
        TypeKind::F64,
        TypeKind::Usize,
        TypeKind::DomString,
        TypeKind::ByteString,
        TypeKind::UsvString,
        TypeKind::Utf8String,
        TypeKind::Any,
        TypeKind::Undefined,
        TypeKind::GlobalObject,
        TypeKind::VirtualMachine,
    ];

    /// The declaration-language spelling of this kind.
    pub fn tag(&self) -> &'static str {
        match self {
            TypeKind::Boolean => "boolean",
            TypeKind::StrictBoolean => "strictBoolean",
            TypeKind::F64 => "f64",
            TypeKind::Usize => "usize",
            TypeKind::DomString => "DOMString",
            TypeKind::ByteString => "ByteString",
            TypeKind::UsvString => "USVString",
            TypeKind::Utf8String => "UTF8String",
            TypeKind::Any => "any",
            TypeKind::Undefined => "undefined",
            TypeKind::GlobalObject => "globalObject",
            TypeKind::VirtualMachine => "zigVirtualMachine",
            TypeKind::Sequence(_) => "sequence",
            TypeKind::Record(_) => "record",
            TypeKind::OneOf(_) => "oneOf",
            TypeKind::Dictionary(_) => "dictionary",
            TypeKind::NativeEnum(_) => "nativeEnum",
            TypeKind::StringEnum(_) => "stringEnum",
            TypeKind::Ref(_) => "ref",
        }
    }

    /// Looks up a primitive kind by its declaration-language spelling.
    pub fn primitive_from_tag(tag: &str) -> Option<TypeId> {
        Self::PRIMITIVES
            .iter()
            .position(|kind| kind.tag() == tag)
            .map(|index| TypeId(index as u32))
    }

    /// Marker kinds that only exist as hidden arguments.
    pub fn is_virtual(&self) -> bool {
        matches!(self, TypeKind::GlobalObject | TypeKind::VirtualMachine)
    }

    /// Kinds that get a generated name and a declaration of their own once reachable.
    pub fn is_named(&self) -> bool {
        match self {
            TypeKind::Sequence(_)
            | TypeKind::Record(_)
            | TypeKind::OneOf(_)
            | TypeKind::Dictionary(_)
            | TypeKind::NativeEnum(_)
            | TypeKind::StringEnum(_) => true,
            TypeKind::Boolean
            | TypeKind::StrictBoolean
            | TypeKind::F64
            | TypeKind::Usize
            | TypeKind::DomString
            | TypeKind::ByteString
            | TypeKind::UsvString
            | TypeKind::Utf8String
            | TypeKind::Any
            | TypeKind::Undefined
            | TypeKind::GlobalObject
            | TypeKind::VirtualMachine
            | TypeKind::Ref(_) => false,
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Per-instance modifiers. Never part of the structural hash.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Flags {
    /// May be omitted at the call boundary.
    pub optional: bool,
    /// As a dictionary field, must be present even though dictionaries default to optional.
    pub required: bool,
    /// May carry null at runtime.
    pub nullable: bool,
    /// Fallback used when the value is omitted. Implies `optional`.
    pub default: Option<DefaultValue>,
}

impl Flags {
    pub fn is_optional(&self) -> bool {
        self.optional || self.default.is_some()
    }

    /// As an argument: the receiver must be told whether a value exists.
    pub fn may_be_absent(&self) -> bool {
        self.nullable || (self.optional && self.default.is_none())
    }

    /// As a dictionary field, where members are optional unless marked `required`.
    pub fn field_may_be_absent(&self) -> bool {
        self.nullable || (!self.required && self.default.is_none())
    }
}
