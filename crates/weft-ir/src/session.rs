use fxhash::FxHashMap;
use indexmap::IndexMap;

use crate::abi::CAbiType;
use crate::arena::TypeArena;
use crate::error::{IrError, IrResult};
use crate::file::{DeclFile, FileId};
use crate::func::{Func, FuncId};
use crate::layout::{ExternStruct, ExternStructId, ExternStructs};
use crate::naming::pascal_case;
use crate::ty::{TypeId, TypeKind};

/// Where one declared dictionary field lives in the dictionary's extern struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DictSlot {
    /// Field index of the value, `None` for zero-sized values.
    pub value: Option<usize>,
    /// Field index of the presence flag, only for fields that may be absent.
    pub is_set: Option<usize>,
}

/// Binary representation of a dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryLayout {
    pub struct_id: ExternStructId,
    /// One slot per declared field, in declared order.
    pub slots: Vec<DictSlot>,
    /// The dictionary maps directly: no presence flags, every field present.
    pub direct: bool,
}

/// Everything one generation run accumulates.
///
/// Type names, owners and canonical representatives are keyed by structural hash, so the
/// first writer wins for every type sharing a shape.
#[derive(Debug, Default)]
pub struct Session {
    pub types: TypeArena,
    pub structs: ExternStructs,
    files: Vec<DeclFile>,
    funcs: Vec<Func>,
    reachable: IndexMap<u64, TypeId>,
    names: FxHashMap<u64, String>,
    /// Which shape holds a name inside the namespace of the file owning it.
    scoped_names: FxHashMap<(FileId, String), u64>,
    owners: FxHashMap<u64, FileId>,
    direct: FxHashMap<TypeId, Option<CAbiType>>,
    dictionaries: FxHashMap<TypeId, Option<DictionaryLayout>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, file: DeclFile) -> FileId {
        let id = FileId(self.files.len() as u32);
        log::debug!("declaration file {} as {}", file.path.display(), file.namespace);
        self.files.push(file);
        id
    }

    pub fn file(&self, id: FileId) -> &DeclFile {
        &self.files[id.index()]
    }

    pub fn file_mut(&mut self, id: FileId) -> &mut DeclFile {
        &mut self.files[id.index()]
    }

    /// Files in evaluation order.
    pub fn files(&self) -> impl Iterator<Item = (FileId, &DeclFile)> {
        self.files
            .iter()
            .enumerate()
            .map(|(index, file)| (FileId(index as u32), file))
    }

    pub fn find_namespace(&self, namespace: &str) -> Option<FileId> {
        self.files()
            .find(|(_, file)| file.namespace == namespace)
            .map(|(id, _)| id)
    }

    /// Registers `func` and lists it under its file.
    pub fn add_func(&mut self, func: Func) -> FuncId {
        let id = FuncId(self.funcs.len() as u32);
        self.files[func.file.index()].funcs.push(id);
        self.funcs.push(func);
        id
    }

    pub fn func(&self, id: FuncId) -> &Func {
        &self.funcs[id.index()]
    }

    pub fn func_mut(&mut self, id: FuncId) -> &mut Func {
        &mut self.funcs[id.index()]
    }

    pub fn funcs(&self) -> impl Iterator<Item = (FuncId, &Func)> {
        self.funcs
            .iter()
            .enumerate()
            .map(|(index, func)| (FuncId(index as u32), func))
    }

    /// Names the shape of `ty`. Returns `false` if the shape already had a name.
    pub fn assign_name(&mut self, ty: TypeId, name: impl Into<String>) -> IrResult<bool> {
        let hash = self.types.hash(ty)?;
        let mut took = false;
        self.names.entry(hash).or_insert_with(|| {
            took = true;
            name.into()
        });
        Ok(took)
    }

    pub fn name(&self, ty: TypeId) -> Option<&str> {
        let hash = self.types.get(ty).structural_hash()?;
        self.names.get(&hash).map(String::as_str)
    }

    /// The assigned name, or a spelling derived from the kind for unnamed shapes.
    pub fn type_name(&self, ty: TypeId) -> String {
        match self.name(ty) {
            Some(name) => name.to_string(),
            None => pascal_case(self.types.kind(ty).tag()),
        }
    }

    /// Marks `ty` and everything under it reachable.
    ///
    /// Named kinds take `hint` as their name unless their shape is already named. Children
    /// become reachable before their parent, so `reachable()` yields dependencies first.
    pub fn mark_reachable(&mut self, ty: TypeId, hint: &str, owner: FileId) -> IrResult<()> {
        let hash = self.types.hash(ty)?;
        if self.reachable.contains_key(&hash) {
            return Ok(());
        }
        if self.types.kind(ty).is_named() && self.assign_name(ty, hint)? {
            log::trace!("named {} as {}", self.types.describe(ty), hint);
        }
        let owner = *self.owners.entry(hash).or_insert(owner);
        if self.types.kind(ty).is_named() {
            self.claim_name(hash, owner);
        }

        let children: Vec<(TypeId, String)> = match self.types.kind(ty) {
            TypeKind::Sequence(element) => vec![(*element, format!("{}Element", hint))],
            TypeKind::Record(value) => vec![(*value, format!("{}Value", hint))],
            TypeKind::OneOf(members) => members
                .iter()
                .enumerate()
                .map(|(index, member)| (*member, format!("{}Option{}", hint, index)))
                .collect(),
            TypeKind::Dictionary(fields) => fields
                .iter()
                .map(|field| (field.ty, format!("{}{}", hint, pascal_case(&field.key))))
                .collect(),
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
            | TypeKind::StringEnum(_)
            | TypeKind::Ref(_) => Vec::new(),
        };
        for (child, child_hint) in children {
            self.mark_reachable(child, &child_hint, owner)?;
        }
        self.reachable.insert(hash, ty);
        Ok(())
    }

    /// Keeps the names of the shapes one file owns distinct by suffixing later arrivals.
    fn claim_name(&mut self, hash: u64, owner: FileId) {
        let Some(base) = self.names.get(&hash).cloned() else {
            return;
        };
        let mut name = base.clone();
        let mut suffix = 2;
        while self
            .scoped_names
            .get(&(owner, name.clone()))
            .is_some_and(|other| *other != hash)
        {
            name = format!("{}{}", base, suffix);
            suffix += 1;
        }
        if name != base {
            log::debug!("{} is taken in {}, renamed to {}", base, self.file(owner).namespace, name);
            self.names.insert(hash, name.clone());
        }
        self.scoped_names.insert((owner, name), hash);
    }

    pub fn is_reachable(&self, ty: TypeId) -> bool {
        self.types
            .get(ty)
            .structural_hash()
            .is_some_and(|hash| self.reachable.contains_key(&hash))
    }

    /// Canonical representatives of every reachable shape, dependencies first.
    pub fn reachable(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.reachable.values().copied()
    }

    /// The first reachable instance sharing the shape of `ty`.
    pub fn canonical(&self, ty: TypeId) -> Option<TypeId> {
        let hash = self.types.get(ty).structural_hash()?;
        self.reachable.get(&hash).copied()
    }

    pub fn owner(&self, ty: TypeId) -> Option<FileId> {
        let hash = self.types.get(ty).structural_hash()?;
        self.owners.get(&hash).copied()
    }

    /// The C-ABI tag `ty` crosses the boundary as without any intermediate buffer.
    pub fn direct_abi(&mut self, ty: TypeId) -> IrResult<Option<CAbiType>> {
        if let Some(abi) = self.direct.get(&ty) {
            return Ok(abi.clone());
        }
        self.types.hash(ty)?;
        let abi = match self.types.kind(ty) {
            TypeKind::Boolean | TypeKind::StrictBoolean => Some(CAbiType::Bool),
            TypeKind::F64 => Some(CAbiType::F64),
            TypeKind::Usize => Some(CAbiType::Usize),
            TypeKind::DomString
            | TypeKind::ByteString
            | TypeKind::UsvString
            | TypeKind::Utf8String => Some(CAbiType::BoxedString),
            TypeKind::Any => Some(CAbiType::JsValue),
            TypeKind::Undefined => Some(CAbiType::Unit),
            TypeKind::GlobalObject => Some(CAbiType::GlobalObject),
            TypeKind::VirtualMachine => Some(CAbiType::VirtualMachine),
            TypeKind::StringEnum(values) => Some(CAbiType::discriminant(values.len())),
            TypeKind::NativeEnum(_) => Some(CAbiType::U32),
            TypeKind::Sequence(_) | TypeKind::Record(_) | TypeKind::OneOf(_) => None,
            TypeKind::Dictionary(_) => self
                .dictionary_layout(ty)?
                .filter(|layout| layout.direct)
                .map(|layout| CAbiType::Struct(layout.struct_id)),
            TypeKind::Ref(_) => unreachable!("hashing rejects refs"),
        };
        log::trace!(
            "direct abi of {}: {}",
            self.types.describe(ty),
            abi.as_ref().map_or("none".to_string(), |abi| abi.to_string())
        );
        self.direct.insert(ty, abi.clone());
        Ok(abi)
    }

    /// Direct mapping already computed for `ty` or for its canonical instance.
    pub fn known_direct_abi(&self, ty: TypeId) -> Option<CAbiType> {
        self.direct
            .get(&ty)
            .or_else(|| self.canonical(ty).and_then(|canonical| self.direct.get(&canonical)))
            .cloned()
            .flatten()
    }

    /// Dictionary layout already computed for `ty` or for its canonical instance.
    pub fn known_dictionary_layout(&self, ty: TypeId) -> Option<&DictionaryLayout> {
        self.dictionaries
            .get(&ty)
            .or_else(|| self.canonical(ty).and_then(|canonical| self.dictionaries.get(&canonical)))
            .and_then(Option::as_ref)
    }

    /// The extern struct holding a dictionary, or `None` if a field has no direct mapping.
    ///
    /// The struct takes fields in declared order, each optional one preceded by a
    /// `<key>Set` flag, then is reordered and registered. Slots index the canonical struct.
    pub fn dictionary_layout(&mut self, ty: TypeId) -> IrResult<Option<DictionaryLayout>> {
        if let Some(layout) = self.dictionaries.get(&ty) {
            return Ok(layout.clone());
        }
        let fields = match self.types.kind(ty) {
            TypeKind::Dictionary(fields) => fields.clone(),
            _ => return Ok(None),
        };

        let mut def = ExternStruct::new(self.type_name(ty));
        let mut direct = true;
        let mut names = Vec::with_capacity(fields.len());
        for field in &fields {
            let Some(abi) = self.direct_abi(field.ty)? else {
                self.dictionaries.insert(ty, None);
                return Ok(None);
            };
            let may_be_absent = self.types.flags(field.ty).field_may_be_absent();
            direct &= !may_be_absent;
            let is_set = if may_be_absent {
                let name = format!("{}Set", field.key);
                self.structs.push_field(&mut def, name.clone(), CAbiType::Bool);
                Some(name)
            } else {
                None
            };
            let value = if abi.is_zero_sized() {
                None
            } else {
                self.structs.push_field(&mut def, field.key.clone(), abi);
                Some(field.key.clone())
            };
            names.push((value, is_set));
        }
        if let Some(field) = def.clashing_field() {
            return Err(IrError::FieldClash {
                field: field.to_string(),
                origin: self.types.get(ty).origin.clone(),
            });
        }
        def.reorder_for_smallest_size();

        let position = |name: &Option<String>| {
            name.as_ref()
                .and_then(|name| def.field(name))
                .map(|(index, _)| index)
        };
        let slots = names
            .iter()
            .map(|(value, is_set)| DictSlot {
                value: position(value),
                is_set: position(is_set),
            })
            .collect();
        let struct_id = self.structs.register(def);
        let layout = DictionaryLayout {
            struct_id,
            slots,
            direct,
        };
        self.dictionaries.insert(ty, Some(layout.clone()));
        Ok(Some(layout))
    }
}
