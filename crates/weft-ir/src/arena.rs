use std::hash::{Hash, Hasher};

use fxhash::FxHasher64;

use crate::default::{DefaultCheck, DefaultValue};
use crate::error::{IrError, IrResult};
use crate::origin::Origin;
use crate::ty::{Flags, TypeId, TypeKind};

/// One type instance. Flagged copies of a type are separate nodes sharing kind data.
#[derive(Debug, Clone)]
pub struct TypeNode {
    pub kind: TypeKind,
    pub flags: Flags,
    pub origin: Origin,
    /// `None` when the kind is or contains a `ref`.
    hash: Option<u64>,
}

impl TypeNode {
    pub fn structural_hash(&self) -> Option<u64> {
        self.hash
    }
}

/// Owns every type node of a session. Nodes are never removed or changed.
#[derive(Debug, Clone)]
pub struct TypeArena {
    nodes: Vec<TypeNode>,
}

impl Default for TypeArena {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeArena {
    /// Creates an arena with the primitive kinds pre-allocated at their constant ids.
    pub fn new() -> Self {
        let mut arena = TypeArena { nodes: Vec::new() };
        for kind in TypeKind::PRIMITIVES {
            arena.alloc(kind, Origin::Builtin);
        }
        arena
    }

    /// Allocates a node with default flags. Children must already live in this arena.
    pub fn alloc(&mut self, kind: TypeKind, origin: Origin) -> TypeId {
        let hash = self.compute_hash(&kind);
        let id = TypeId(self.nodes.len() as u32);
        self.nodes.push(TypeNode {
            kind,
            flags: Flags::default(),
            origin,
            hash,
        });
        id
    }

    pub fn get(&self, id: TypeId) -> &TypeNode {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.get(id).kind
    }

    pub fn flags(&self, id: TypeId) -> &Flags {
        &self.get(id).flags
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Deterministic content hash over kind and children. Flags never participate.
    pub fn hash(&self, id: TypeId) -> IrResult<u64> {
        match self.get(id).hash {
            Some(hash) => Ok(hash),
            None => Err(self.ref_error(id)),
        }
    }

    fn compute_hash(&self, kind: &TypeKind) -> Option<u64> {
        let mut hasher = FxHasher64::default();
        kind.tag().hash(&mut hasher);
        match kind {
            TypeKind::Sequence(child) | TypeKind::Record(child) => {
                self.get(*child).hash?.hash(&mut hasher);
            }
            TypeKind::OneOf(members) => {
                members.len().hash(&mut hasher);
                for member in members {
                    self.get(*member).hash?.hash(&mut hasher);
                }
            }
            TypeKind::Dictionary(fields) => {
                fields.len().hash(&mut hasher);
                for field in fields {
                    field.key.hash(&mut hasher);
                    self.get(field.ty).hash?.hash(&mut hasher);
                }
            }
            TypeKind::NativeEnum(locator) => locator.hash(&mut hasher),
            TypeKind::StringEnum(values) => values.hash(&mut hasher),
            TypeKind::Ref(_) => return None,
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
            | TypeKind::VirtualMachine => {}
        }
        Some(hasher.finish())
    }

    /// Builds the error for the first `ref` found under `id`.
    fn ref_error(&self, id: TypeId) -> IrError {
        let node = self.get(id);
        let children: Vec<TypeId> = match &node.kind {
            TypeKind::Ref(name) => {
                return IrError::RefUnsupported {
                    name: name.clone(),
                    origin: node.origin.clone(),
                }
            }
            TypeKind::Sequence(child) | TypeKind::Record(child) => vec![*child],
            TypeKind::OneOf(members) => members.clone(),
            TypeKind::Dictionary(fields) => fields.iter().map(|f| f.ty).collect(),
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
            | TypeKind::NativeEnum(_)
            | TypeKind::StringEnum(_) => Vec::new(),
        };
        children
            .into_iter()
            .find(|child| self.get(*child).hash.is_none())
            .map(|child| self.ref_error(child))
            .unwrap_or_else(|| IrError::RefUnsupported {
                name: "?".to_string(),
                origin: node.origin.clone(),
            })
    }

    /// New node sharing the kind of `id`, with the given flags.
    fn with_flags(&mut self, id: TypeId, flags: Flags) -> TypeId {
        let node = self.get(id);
        let copy = TypeNode {
            kind: node.kind.clone(),
            flags,
            origin: node.origin.clone(),
            hash: node.hash,
        };
        let new_id = TypeId(self.nodes.len() as u32);
        self.nodes.push(copy);
        new_id
    }

    fn conflict(&self, id: TypeId, requested: &'static str, existing: &'static str) -> IrError {
        let node = self.get(id);
        IrError::FlagConflict {
            kind: node.kind.tag().to_string(),
            requested,
            existing,
            origin: node.origin.clone(),
        }
    }

    /// Copy of `id` that may be omitted at the call boundary.
    pub fn optional(&mut self, id: TypeId) -> IrResult<TypeId> {
        let flags = self.flags(id);
        if flags.default.is_some() {
            return Err(self.conflict(id, "optional", "defaulted"));
        }
        if flags.required {
            return Err(self.conflict(id, "optional", "required"));
        }
        let flags = Flags {
            optional: true,
            ..flags.clone()
        };
        Ok(self.with_flags(id, flags))
    }

    /// Copy of `id` that must be present even as a dictionary field.
    pub fn required(&mut self, id: TypeId) -> IrResult<TypeId> {
        let flags = self.flags(id);
        if flags.optional {
            return Err(self.conflict(id, "required", "optional"));
        }
        if flags.default.is_some() {
            return Err(self.conflict(id, "required", "defaulted"));
        }
        let flags = Flags {
            required: true,
            ..flags.clone()
        };
        Ok(self.with_flags(id, flags))
    }

    /// Copy of `id` that may carry null.
    pub fn nullable(&mut self, id: TypeId) -> IrResult<TypeId> {
        let flags = Flags {
            nullable: true,
            ..self.flags(id).clone()
        };
        Ok(self.with_flags(id, flags))
    }

    /// Copy of `id` with a fallback value, after checking the value fits the kind.
    pub fn with_default(&mut self, id: TypeId, value: impl Into<DefaultValue>) -> IrResult<TypeId> {
        let value = value.into();
        let flags = self.flags(id);
        if flags.required {
            return Err(self.conflict(id, "defaulted", "required"));
        }
        if flags.default.is_some() {
            return Err(self.conflict(id, "defaulted", "defaulted"));
        }
        self.assert_default_is_valid(id, &value)?;
        let flags = Flags {
            default: Some(value),
            ..self.flags(id).clone()
        };
        Ok(self.with_flags(id, flags))
    }

    /// Shape-checks a proposed default against the kind of `id`.
    pub fn assert_default_is_valid(&self, id: TypeId, value: &DefaultValue) -> IrResult<()> {
        let node = self.get(id);
        match value.check(&node.kind) {
            DefaultCheck::Valid => Ok(()),
            DefaultCheck::Invalid(reason) => Err(IrError::InvalidDefault {
                kind: node.kind.tag().to_string(),
                value: value.to_string(),
                reason,
                origin: node.origin.clone(),
            }),
            DefaultCheck::Unsupported => Err(IrError::UnsupportedDefault {
                kind: node.kind.tag().to_string(),
                origin: node.origin.clone(),
            }),
        }
    }

    /// Human-readable spelling used in diagnostics.
    pub fn describe(&self, id: TypeId) -> String {
        let node = self.get(id);
        let mut text = match &node.kind {
            TypeKind::Sequence(child) => format!("sequence<{}>", self.describe(*child)),
            TypeKind::Record(child) => format!("record<{}>", self.describe(*child)),
            TypeKind::OneOf(members) => {
                let members: Vec<_> = members.iter().map(|m| self.describe(*m)).collect();
                format!("oneOf<{}>", members.join(", "))
            }
            TypeKind::Dictionary(fields) => {
                let fields: Vec<_> = fields
                    .iter()
                    .map(|f| format!("{}: {}", f.key, self.describe(f.ty)))
                    .collect();
                format!("{{{}}}", fields.join(", "))
            }
            TypeKind::NativeEnum(locator) => format!("nativeEnum<{}>", locator),
            TypeKind::StringEnum(values) => {
                let values: Vec<_> = values.iter().map(|v| format!("{:?}", v)).collect();
                format!("stringEnum<{}>", values.join(" | "))
            }
            TypeKind::Ref(name) => format!("ref<{}>", name),
            other => other.tag().to_string(),
        };
        if node.flags.nullable {
            text.push('?');
        }
        if let Some(default) = &node.flags.default {
            text.push_str(&format!(" = {}", default));
        } else if node.flags.optional {
            text.insert_str(0, "optional ");
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::Field;

    fn dictionary(arena: &mut TypeArena, fields: &[(&str, TypeId)]) -> TypeId {
        let fields = fields
            .iter()
            .map(|(key, ty)| Field {
                key: key.to_string(),
                ty: *ty,
            })
            .collect();
        arena.alloc(TypeKind::Dictionary(fields), Origin::caller())
    }

    #[test]
    fn primitives_sit_at_their_constants() {
        let arena = TypeArena::new();
        assert_eq!(arena.kind(TypeId::BOOLEAN), &TypeKind::Boolean);
        assert_eq!(arena.kind(TypeId::UTF8_STRING), &TypeKind::Utf8String);
        assert_eq!(arena.kind(TypeId::VIRTUAL_MACHINE), &TypeKind::VirtualMachine);
    }

    #[test]
    fn hash_ignores_flags() {
        let mut arena = TypeArena::new();
        let plain = arena.alloc(TypeKind::OneOf(vec![TypeId::F64, TypeId::DOM_STRING]), Origin::caller());
        let optional = arena.optional(plain).unwrap();
        let nullable = arena.nullable(optional).unwrap();
        assert_ne!(plain, optional);
        assert_eq!(arena.hash(plain).unwrap(), arena.hash(optional).unwrap());
        assert_eq!(arena.hash(plain).unwrap(), arena.hash(nullable).unwrap());
    }

    #[test]
    fn hash_is_structural() {
        let mut arena = TypeArena::new();
        let flagged = arena.with_default(TypeId::BOOLEAN, false).unwrap();
        let a = dictionary(&mut arena, &[("a", flagged), ("b", TypeId::DOM_STRING)]);
        let b = dictionary(&mut arena, &[("a", TypeId::BOOLEAN), ("b", TypeId::DOM_STRING)]);
        let renamed = dictionary(&mut arena, &[("a", TypeId::BOOLEAN), ("c", TypeId::DOM_STRING)]);
        let retyped = dictionary(&mut arena, &[("a", TypeId::BOOLEAN), ("b", TypeId::F64)]);
        assert_eq!(arena.hash(a).unwrap(), arena.hash(b).unwrap());
        assert_ne!(arena.hash(a).unwrap(), arena.hash(renamed).unwrap());
        assert_ne!(arena.hash(a).unwrap(), arena.hash(retyped).unwrap());

        let seq_f64 = arena.alloc(TypeKind::Sequence(TypeId::F64), Origin::caller());
        let seq_str = arena.alloc(TypeKind::Sequence(TypeId::DOM_STRING), Origin::caller());
        let rec_f64 = arena.alloc(TypeKind::Record(TypeId::F64), Origin::caller());
        assert_ne!(arena.hash(seq_f64).unwrap(), arena.hash(seq_str).unwrap());
        assert_ne!(arena.hash(seq_f64).unwrap(), arena.hash(rec_f64).unwrap());
    }

    #[test]
    fn ref_fails_to_hash_through_containers() {
        let mut arena = TypeArena::new();
        let reference = arena.alloc(TypeKind::Ref("Node".to_string()), Origin::caller());
        let list = arena.alloc(TypeKind::Sequence(reference), Origin::caller());
        match arena.hash(list) {
            Err(IrError::RefUnsupported { name, .. }) => assert_eq!(name, "Node"),
            other => panic!("expected RefUnsupported, got {:?}", other),
        }
    }

    #[test]
    fn conflicting_flags_are_rejected() {
        let mut arena = TypeArena::new();
        let defaulted = arena.with_default(TypeId::F64, 1.5).unwrap();
        assert!(matches!(arena.optional(defaulted), Err(IrError::FlagConflict { .. })));
        assert!(matches!(arena.required(defaulted), Err(IrError::FlagConflict { .. })));

        let required = arena.required(TypeId::DOM_STRING).unwrap();
        assert!(matches!(arena.optional(required), Err(IrError::FlagConflict { .. })));
        assert!(matches!(arena.with_default(required, "x"), Err(IrError::FlagConflict { .. })));

        let optional = arena.optional(TypeId::BOOLEAN).unwrap();
        let both = arena.with_default(optional, true).unwrap();
        assert!(arena.flags(both).is_optional());
    }

    #[test]
    fn modifiers_do_not_touch_the_original() {
        let mut arena = TypeArena::new();
        let nullable = arena.nullable(TypeId::F64).unwrap();
        assert!(arena.flags(nullable).nullable);
        assert!(!arena.flags(TypeId::F64).nullable);
    }

    #[test]
    fn defaults_are_shape_checked() {
        let mut arena = TypeArena::new();
        assert!(matches!(
            arena.with_default(TypeId::BOOLEAN, "yes"),
            Err(IrError::InvalidDefault { .. })
        ));
        assert!(matches!(
            arena.with_default(TypeId::USIZE, -1i64),
            Err(IrError::InvalidDefault { .. })
        ));
        assert!(arena.with_default(TypeId::USIZE, 4i64).is_ok());

        let mode = arena.alloc(
            TypeKind::StringEnum(vec!["fast".to_string(), "slow".to_string()]),
            Origin::caller(),
        );
        assert!(arena.with_default(mode, "fast").is_ok());
        assert!(matches!(arena.with_default(mode, "medium"), Err(IrError::InvalidDefault { .. })));

        let list = arena.alloc(TypeKind::Sequence(TypeId::F64), Origin::caller());
        assert!(matches!(
            arena.with_default(list, "[]"),
            Err(IrError::UnsupportedDefault { .. })
        ));
    }

    #[test]
    fn describe_spells_nested_types() {
        let mut arena = TypeArena::new();
        let list = arena.alloc(TypeKind::Sequence(TypeId::DOM_STRING), Origin::caller());
        let either = arena.alloc(TypeKind::OneOf(vec![TypeId::F64, list]), Origin::caller());
        let either = arena.nullable(either).unwrap();
        assert_eq!(arena.describe(either), "oneOf<f64, sequence<DOMString>>?");
    }
}
