use std::fmt;
use std::hash::{Hash, Hasher};

use fxhash::{FxHashMap, FxHashSet, FxHasher64};

use crate::abi::CAbiType;
use crate::naming::cpp_identifier;

/// Index into `ExternStructs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExternStructId(u32);

impl ExternStructId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExternField {
    pub name: String,
    pub abi: CAbiType,
    pub size: usize,
    pub align: usize,
}

/// Byte layout of an `ExternStruct` in its current field order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructLayout {
    pub size: usize,
    pub align: usize,
    pub offsets: Vec<usize>,
}

/// A C-compatible struct: named fields laid out in order with natural alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternStruct {
    pub name: String,
    pub fields: Vec<ExternField>,
}

impl ExternStruct {
    pub fn new(name: impl Into<String>) -> Self {
        ExternStruct {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, abi: CAbiType, size: usize, align: usize) {
        self.fields.push(ExternField {
            name: name.into(),
            abi,
            size,
            align: align.max(1),
        });
    }

    /// Sequential forward alignment, no reordering.
    pub fn layout(&self) -> StructLayout {
        let mut offset = 0;
        let mut align = 1;
        let mut offsets = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            offset = align_up(offset, field.align);
            offsets.push(offset);
            offset += field.size;
            align = align.max(field.align);
        }
        StructLayout {
            size: align_up(offset, align),
            align,
            offsets,
        }
    }

    /// Sorts fields by alignment, then size, then name, all ascending.
    ///
    /// This is a deterministic order, not an optimal packing; emitted code and struct
    /// identities depend on exactly this order.
    pub fn reorder_for_smallest_size(&mut self) {
        self.fields.sort_by(|a, b| {
            a.align
                .cmp(&b.align)
                .then(a.size.cmp(&b.size))
                .then_with(|| a.name.cmp(&b.name))
        });
    }

    /// The first field whose C++ spelling repeats an earlier field's.
    pub fn clashing_field(&self) -> Option<&str> {
        let mut seen = FxHashSet::default();
        self.fields
            .iter()
            .find(|field| !seen.insert(cpp_identifier(&field.name)))
            .map(|field| field.name.as_str())
    }

    /// Position and field with the given name.
    pub fn field(&self, name: &str) -> Option<(usize, &ExternField)> {
        self.fields.iter().enumerate().find(|(_, f)| f.name == name)
    }
}

impl fmt::Display for ExternStruct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let layout = self.layout();
        writeln!(f, "struct {} (size {}, align {}) {{", self.name, layout.size, layout.align)?;
        for (field, offset) in self.fields.iter().zip(&layout.offsets) {
            writeln!(f, "    {}: {} @ {}", field.name, field.abi, offset)?;
        }
        write!(f, "}}")
    }
}

fn align_up(offset: usize, align: usize) -> usize {
    offset.div_ceil(align) * align
}

#[derive(Debug, Clone)]
struct Entry {
    hash: u64,
    def: ExternStruct,
}

/// Registry of canonical extern structs, keyed by the hash of their field tags.
#[derive(Debug, Clone, Default)]
pub struct ExternStructs {
    structs: Vec<Entry>,
    by_hash: FxHashMap<u64, ExternStructId>,
    names: FxHashSet<String>,
}

impl ExternStructs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size and alignment of any ABI type, looking nested structs up in the registry.
    pub fn abi_layout(&self, abi: &CAbiType) -> (usize, usize) {
        match abi {
            CAbiType::Struct(id) => {
                let layout = self.get(*id).layout();
                (layout.size, layout.align)
            }
            other => other
                .primitive_layout()
                .unwrap_or_else(|| unreachable!("only structs lack a primitive layout")),
        }
    }

    /// Appends a field to `def`, taking size and alignment from the ABI type.
    pub fn push_field(&self, def: &mut ExternStruct, name: impl Into<String>, abi: CAbiType) {
        let (size, align) = self.abi_layout(&abi);
        def.push(name, abi, size, align);
    }

    /// Hash over the sequence of field ABI tags. Field and struct names do not participate.
    pub fn structural_hash(&self, def: &ExternStruct) -> u64 {
        let mut hasher = FxHasher64::default();
        def.fields.len().hash(&mut hasher);
        for field in &def.fields {
            self.hash_abi(&field.abi, &mut hasher);
        }
        hasher.finish()
    }

    fn hash_abi(&self, abi: &CAbiType, hasher: &mut FxHasher64) {
        match abi {
            CAbiType::Struct(id) => {
                "struct".hash(hasher);
                self.structs[id.index()].hash.hash(hasher);
            }
            CAbiType::Pointer(inner) => {
                "pointer".hash(hasher);
                self.hash_abi(inner, hasher);
            }
            other => other.to_string().hash(hasher),
        }
    }

    /// Registers `def`, or returns the struct already registered with the same field tags.
    ///
    /// The first struct registered for a hash keeps its field names. Struct names share one
    /// namespace, so a new layout whose name is taken gets a numeric suffix.
    pub fn register(&mut self, mut def: ExternStruct) -> ExternStructId {
        let hash = self.structural_hash(&def);
        if let Some(id) = self.by_hash.get(&hash) {
            log::trace!("extern struct {} reuses {}", def.name, self.structs[id.index()].def.name);
            return *id;
        }
        let base = def.name.clone();
        let mut suffix = 2;
        while self.names.contains(&def.name) {
            def.name = format!("{}{}", base, suffix);
            suffix += 1;
        }
        self.names.insert(def.name.clone());
        let id = ExternStructId(self.structs.len() as u32);
        log::trace!("registered extern struct {} ({} fields)", def.name, def.fields.len());
        self.structs.push(Entry { hash, def });
        self.by_hash.insert(hash, id);
        id
    }

    pub fn get(&self, id: ExternStructId) -> &ExternStruct {
        &self.structs[id.index()].def
    }

    pub fn hash(&self, id: ExternStructId) -> u64 {
        self.structs[id.index()].hash
    }

    /// Structs in registration order. A struct only ever refers to earlier ones.
    pub fn iter(&self) -> impl Iterator<Item = (ExternStructId, &ExternStruct)> {
        self.structs
            .iter()
            .enumerate()
            .map(|(index, entry)| (ExternStructId(index as u32), &entry.def))
    }

    pub fn len(&self) -> usize {
        self.structs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expect_test::expect;

    #[test]
    fn reorder_sorts_by_alignment_then_size_then_name() {
        let mut def = ExternStruct::new("Sample");
        def.push("x", CAbiType::U32, 4, 4);
        def.push("y", CAbiType::U8, 1, 1);
        def.push("z", CAbiType::F64, 8, 8);
        def.reorder_for_smallest_size();

        let names: Vec<_> = def.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["y", "x", "z"]);
        expect![[r#"
            struct Sample (size 16, align 8) {
                y: u8 @ 0
                x: u32 @ 4
                z: f64 @ 8
            }"#]]
        .assert_eq(&def.to_string());
    }

    #[test]
    fn reorder_breaks_ties_by_name() {
        let mut def = ExternStruct::new("Ties");
        def.push("b", CAbiType::Bool, 1, 1);
        def.push("a", CAbiType::U8, 1, 1);
        def.reorder_for_smallest_size();
        assert_eq!(def.fields[0].name, "a");
        assert_eq!(def.fields[1].name, "b");
    }

    #[test]
    fn declared_order_layout_pads_forward() {
        let mut def = ExternStruct::new("Padded");
        def.push("flag", CAbiType::Bool, 1, 1);
        def.push("value", CAbiType::F64, 8, 8);
        def.push("tail", CAbiType::U8, 1, 1);
        let layout = def.layout();
        assert_eq!(layout.offsets, [0, 8, 16]);
        assert_eq!(layout.size, 24);
        assert_eq!(layout.align, 8);
    }

    #[test]
    fn registry_deduplicates_by_field_tags_only() {
        let mut registry = ExternStructs::new();
        let mut first = ExternStruct::new("First");
        registry.push_field(&mut first, "a", CAbiType::F64);
        registry.push_field(&mut first, "b", CAbiType::Bool);
        let mut second = ExternStruct::new("Second");
        registry.push_field(&mut second, "other", CAbiType::F64);
        registry.push_field(&mut second, "names", CAbiType::Bool);

        let a = registry.register(first);
        let b = registry.register(second);
        assert_eq!(a, b);
        assert_eq!(registry.get(a).name, "First");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn different_layouts_never_share_a_name() {
        let mut registry = ExternStructs::new();
        let mut ids = Vec::new();
        for abi in [CAbiType::F64, CAbiType::Bool, CAbiType::U32] {
            let mut def = ExternStruct::new("ReadArguments");
            registry.push_field(&mut def, "value", abi);
            ids.push(registry.register(def));
        }
        let names: Vec<_> = ids.iter().map(|id| registry.get(*id).name.as_str()).collect();
        assert_eq!(names, ["ReadArguments", "ReadArguments2", "ReadArguments3"]);
    }

    #[test]
    fn clashing_fields_compare_by_cpp_spelling() {
        let mut def = ExternStruct::new("Clash");
        def.push("xSet", CAbiType::Bool, 1, 1);
        def.push("x", CAbiType::F64, 8, 8);
        assert_eq!(def.clashing_field(), None);
        def.push("xSet", CAbiType::F64, 8, 8);
        assert_eq!(def.clashing_field(), Some("xSet"));

        let mut def = ExternStruct::new("Spelled");
        def.push("content-type", CAbiType::Bool, 1, 1);
        def.push("content_type", CAbiType::Bool, 1, 1);
        assert_eq!(def.clashing_field(), Some("content_type"));
    }

    #[test]
    fn nested_struct_layout_comes_from_registry() {
        let mut registry = ExternStructs::new();
        let mut inner = ExternStruct::new("Inner");
        registry.push_field(&mut inner, "s", CAbiType::BoxedString);
        let inner = registry.register(inner);
        assert_eq!(registry.abi_layout(&CAbiType::Struct(inner)), (16, 8));
    }
}
