use std::path::{Path, PathBuf};

use weft_ir::naming::pascal_case;
use weft_ir::{
    Arg, DeclFile, DefaultValue, Field, FileId, Func, FuncId, IrError, Origin, Session, TypeId,
    TypeKind, Variant,
};

use crate::config::GeneratorConfig;
use crate::error::{DeclError, DeclResult};

/// Path of the implementation file paired with `decl_path`, or `None` if the name lacks the suffix.
pub fn paired_path(decl_path: &Path, config: &GeneratorConfig) -> Option<PathBuf> {
    let stem = base_name(decl_path, config)?;
    Some(decl_path.with_file_name(format!("{}{}", stem, config.input.implementation_suffix)))
}

fn base_name<'p>(decl_path: &'p Path, config: &GeneratorConfig) -> Option<&'p str> {
    decl_path
        .file_name()?
        .to_str()?
        .strip_suffix(config.input.declaration_suffix.as_str())
        .filter(|stem| !stem.is_empty())
}

/// Opens the declaration scope for one file.
///
/// `decl_path` is relative to `source_root`. The paired implementation file must exist and
/// the file's namespace must not be taken by an earlier file.
pub fn declare<'s>(
    session: &'s mut Session,
    source_root: &Path,
    decl_path: &Path,
    config: &GeneratorConfig,
) -> DeclResult<DeclScope<'s>> {
    let (Some(stem), Some(impl_path)) = (base_name(decl_path, config), paired_path(decl_path, config))
    else {
        return Err(DeclError::InvalidDeclaration {
            reason: format!("file name does not end in `{}`", config.input.declaration_suffix),
            origin: Origin::declaration(decl_path, "<file>"),
        });
    };
    if !source_root.join(&impl_path).is_file() {
        return Err(DeclError::MissingPair {
            declaration: decl_path.to_path_buf(),
            expected: impl_path,
        });
    }

    let namespace = pascal_case(stem);
    if let Some(existing) = session.find_namespace(&namespace) {
        return Err(DeclError::NamespaceCollision {
            namespace,
            first: session.file(existing).path.clone(),
            second: decl_path.to_path_buf(),
        });
    }
    let file = session.add_file(DeclFile::new(decl_path, impl_path, namespace));
    Ok(DeclScope {
        session,
        file,
        origin: None,
    })
}

/// The two shapes a function declaration takes.
#[derive(Debug, Clone)]
pub enum FnDecl {
    Single(Variant),
    Overloaded(Vec<Variant>),
}

impl FnDecl {
    pub fn single(args: Vec<Arg>, ret: TypeId) -> Self {
        FnDecl::Single(Variant::new(args, ret))
    }

    pub fn overloaded(variants: Vec<Variant>) -> Self {
        FnDecl::Overloaded(variants)
    }
}

/// Builder for the types and functions of one declaration file.
///
/// Every constructor records where it was called from. When driven by the declaration-file
/// loader, the loader's item path is recorded instead.
pub struct DeclScope<'s> {
    session: &'s mut Session,
    file: FileId,
    origin: Option<Origin>,
}

impl<'s> DeclScope<'s> {
    pub fn file(&self) -> FileId {
        self.file
    }

    pub fn session(&self) -> &Session {
        &*self.session
    }

    pub(crate) fn set_origin(&mut self, origin: Option<Origin>) {
        self.origin = origin;
    }

    #[track_caller]
    fn origin(&self) -> Origin {
        match &self.origin {
            Some(origin) => origin.clone(),
            None => Origin::caller(),
        }
    }

    #[track_caller]
    fn alloc(&mut self, kind: TypeKind) -> TypeId {
        let origin = self.origin();
        self.session.types.alloc(kind, origin)
    }

    #[track_caller]
    pub fn sequence(&mut self, element: TypeId) -> TypeId {
        self.alloc(TypeKind::Sequence(element))
    }

    #[track_caller]
    pub fn record(&mut self, value: TypeId) -> TypeId {
        self.alloc(TypeKind::Record(value))
    }

    /// A tagged union. Nested unions are flattened into this one.
    #[track_caller]
    pub fn one_of(&mut self, members: &[TypeId]) -> DeclResult<TypeId> {
        let origin = self.origin();
        let mut flat = Vec::with_capacity(members.len());
        for member in members {
            self.check_member(*member, &origin)?;
            match self.session.types.kind(*member) {
                TypeKind::OneOf(inner) => flat.extend(inner.iter().copied()),
                _ => flat.push(*member),
            }
        }
        if flat.is_empty() {
            return Err(DeclError::InvalidDeclaration {
                reason: "`oneOf` needs at least one member".to_string(),
                origin,
            });
        }
        Ok(self.session.types.alloc(TypeKind::OneOf(flat), origin))
    }

    fn check_member(&self, member: TypeId, origin: &Origin) -> DeclResult<()> {
        let node = self.session.types.get(member);
        let reason = if node.flags.nullable {
            "is nullable"
        } else if node.flags.default.is_some() {
            "has a default"
        } else if node.kind.is_virtual() {
            "is a virtual-only marker"
        } else {
            return Ok(());
        };
        Err(IrError::OneOfMember {
            member: self.session.types.describe(member),
            reason,
            origin: origin.clone(),
        }
        .into())
    }

    /// A keyed object with fields in the given order.
    #[track_caller]
    pub fn dictionary(&mut self, fields: &[(&str, TypeId)]) -> DeclResult<TypeId> {
        let origin = self.origin();
        let mut checked: Vec<Field> = Vec::with_capacity(fields.len());
        for (key, ty) in fields {
            let kind = self.session.types.kind(*ty);
            if kind.is_virtual() {
                return Err(IrError::VirtualField {
                    key: key.to_string(),
                    kind: kind.tag().to_string(),
                    origin,
                }
                .into());
            }
            if checked.iter().any(|field| field.key == *key) {
                return Err(IrError::DuplicateField {
                    key: key.to_string(),
                    origin,
                }
                .into());
            }
            checked.push(Field {
                key: key.to_string(),
                ty: *ty,
            });
        }
        Ok(self.session.types.alloc(TypeKind::Dictionary(checked), origin))
    }

    #[track_caller]
    pub fn string_enum(&mut self, values: &[&str]) -> DeclResult<TypeId> {
        let origin = self.origin();
        if values.is_empty() {
            return Err(IrError::InvalidEnum {
                reason: "a string enum needs at least one value".to_string(),
                origin,
            }
            .into());
        }
        for (index, value) in values.iter().enumerate() {
            if values[..index].contains(value) {
                return Err(IrError::InvalidEnum {
                    reason: format!("value {:?} appears twice", value),
                    origin,
                }
                .into());
            }
        }
        let values = values.iter().map(|value| value.to_string()).collect();
        Ok(self.session.types.alloc(TypeKind::StringEnum(values), origin))
    }

    /// An enum defined in the implementation language, named by its qualified path.
    #[track_caller]
    pub fn native_enum(&mut self, locator: &str) -> TypeId {
        self.alloc(TypeKind::NativeEnum(locator.to_string()))
    }

    #[track_caller]
    pub fn reference(&mut self, name: &str) -> TypeId {
        self.alloc(TypeKind::Ref(name.to_string()))
    }

    pub fn optional(&mut self, ty: TypeId) -> DeclResult<TypeId> {
        Ok(self.session.types.optional(ty)?)
    }

    pub fn required(&mut self, ty: TypeId) -> DeclResult<TypeId> {
        Ok(self.session.types.required(ty)?)
    }

    pub fn nullable(&mut self, ty: TypeId) -> DeclResult<TypeId> {
        Ok(self.session.types.nullable(ty)?)
    }

    pub fn with_default(&mut self, ty: TypeId, value: impl Into<DefaultValue>) -> DeclResult<TypeId> {
        Ok(self.session.types.with_default(ty, value)?)
    }

    /// Registers a function in this file. It must be exported before `finish`.
    #[track_caller]
    pub fn func(&mut self, decl: FnDecl) -> DeclResult<FuncId> {
        let origin = self.origin();
        let variants = match decl {
            FnDecl::Single(variant) => vec![variant],
            FnDecl::Overloaded(variants) => variants,
        };
        if variants.is_empty() {
            return Err(DeclError::InvalidDeclaration {
                reason: "an overloaded function needs at least one variant".to_string(),
                origin,
            });
        }
        for variant in &variants {
            for (index, arg) in variant.args.iter().enumerate() {
                if variant.args[..index].iter().any(|other| other.name == arg.name) {
                    return Err(DeclError::InvalidDeclaration {
                        reason: format!("argument `{}` is declared twice", arg.name),
                        origin,
                    });
                }
            }
        }
        Ok(self.session.add_func(Func {
            name: None,
            file: self.file,
            variants,
            origin,
        }))
    }

    /// Gives `func` its public name.
    pub fn export_fn(&mut self, func: FuncId, name: &str) -> DeclResult<()> {
        let taken = self
            .session
            .file(self.file)
            .funcs
            .iter()
            .any(|other| self.session.func(*other).name.as_deref() == Some(name));
        let target = self.session.func(func);
        if taken || target.name.is_some() {
            return Err(DeclError::InvalidDeclaration {
                reason: format!("function `{}` is exported twice", name),
                origin: target.origin.clone(),
            });
        }
        log::trace!("exported {}::{}", self.session.file(self.file).namespace, name);
        self.session.func_mut(func).name = Some(name.to_string());
        Ok(())
    }

    /// Publishes `ty` under `name` and proposes `name` for its shape.
    /// Exports `ty` under `name`. The shape is named right away, so a type containing a
    /// `ref` fails here.
    pub fn export_type(&mut self, name: &str, ty: TypeId) -> DeclResult<()> {
        if self.typedef(name).is_some() {
            return Err(DeclError::InvalidDeclaration {
                reason: format!("type `{}` is exported twice", name),
                origin: self.session.types.get(ty).origin.clone(),
            });
        }
        self.session.assign_name(ty, name)?;
        self.session
            .file_mut(self.file)
            .typedefs
            .push((name.to_string(), ty));
        Ok(())
    }

    /// A type exported earlier in this file.
    pub fn typedef(&self, name: &str) -> Option<TypeId> {
        self.session
            .file(self.file)
            .typedefs
            .iter()
            .find(|(typedef, _)| typedef == name)
            .map(|(_, ty)| *ty)
    }

    /// Closes the scope. Fails if a registered function was never exported.
    pub fn finish(self) -> DeclResult<FileId> {
        let file = self.session.file(self.file);
        for func in &file.funcs {
            let func = self.session.func(*func);
            if func.name.is_none() {
                return Err(DeclError::UnnamedFunction {
                    file: file.path.clone(),
                    origin: func.origin.clone(),
                });
            }
        }
        log::debug!(
            "{}: {} functions, {} types",
            file.namespace,
            file.funcs.len(),
            file.typedefs.len()
        );
        Ok(self.file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn project(files: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for file in files {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "").unwrap();
        }
        dir
    }

    #[test]
    fn pairs_by_suffix_substitution() {
        let config = GeneratorConfig::default();
        assert_eq!(
            paired_path(Path::new("node/fs.bind.toml"), &config),
            Some(PathBuf::from("node/fs.zig"))
        );
        assert_eq!(paired_path(Path::new("fs.toml"), &config), None);
    }

    #[test]
    fn missing_pair_is_rejected() {
        let dir = project(&["fs.bind.toml"]);
        let mut session = Session::new();
        let result = declare(&mut session, dir.path(), Path::new("fs.bind.toml"), &GeneratorConfig::default());
        assert!(matches!(result, Err(DeclError::MissingPair { .. })));
    }

    #[test]
    fn namespaces_must_be_unique() {
        let dir = project(&["a/node_fs.zig", "b/node_fs.zig"]);
        let config = GeneratorConfig::default();
        let mut session = Session::new();
        let scope = declare(&mut session, dir.path(), Path::new("a/node_fs.bind.toml"), &config).unwrap();
        let first = scope.finish().unwrap();
        assert_eq!(session.file(first).namespace, "NodeFs");
        let second = declare(&mut session, dir.path(), Path::new("b/node_fs.bind.toml"), &config);
        assert!(matches!(second, Err(DeclError::NamespaceCollision { .. })));
    }

    #[test]
    fn unexported_functions_fail_finish() {
        let dir = project(&["math.zig"]);
        let mut session = Session::new();
        let mut scope =
            declare(&mut session, dir.path(), Path::new("math.bind.toml"), &GeneratorConfig::default()).unwrap();
        scope
            .func(FnDecl::single(vec![Arg::new("x", TypeId::F64)], TypeId::F64))
            .unwrap();
        assert!(matches!(scope.finish(), Err(DeclError::UnnamedFunction { .. })));
    }

    #[test]
    fn one_of_flattens_and_rejects_flagged_members() {
        let dir = project(&["u.zig"]);
        let mut session = Session::new();
        let mut scope =
            declare(&mut session, dir.path(), Path::new("u.bind.toml"), &GeneratorConfig::default()).unwrap();
        let inner = scope.one_of(&[TypeId::F64, TypeId::DOM_STRING]).unwrap();
        let outer = scope.one_of(&[inner, TypeId::BOOLEAN]).unwrap();
        assert_eq!(
            scope.session().types.kind(outer),
            &TypeKind::OneOf(vec![TypeId::F64, TypeId::DOM_STRING, TypeId::BOOLEAN])
        );

        let maybe = scope.nullable(TypeId::F64).unwrap();
        assert!(matches!(
            scope.one_of(&[maybe, TypeId::BOOLEAN]),
            Err(DeclError::Ir(IrError::OneOfMember { .. }))
        ));
        assert!(matches!(
            scope.one_of(&[TypeId::GLOBAL_OBJECT]),
            Err(DeclError::Ir(IrError::OneOfMember { .. }))
        ));
    }

    #[test]
    fn dictionaries_reject_markers_and_duplicates() {
        let dir = project(&["d.zig"]);
        let mut session = Session::new();
        let mut scope =
            declare(&mut session, dir.path(), Path::new("d.bind.toml"), &GeneratorConfig::default()).unwrap();
        assert!(matches!(
            scope.dictionary(&[("vm", TypeId::VIRTUAL_MACHINE)]),
            Err(DeclError::Ir(IrError::VirtualField { .. }))
        ));
        assert!(matches!(
            scope.dictionary(&[("a", TypeId::F64), ("a", TypeId::BOOLEAN)]),
            Err(DeclError::Ir(IrError::DuplicateField { .. }))
        ));
        assert!(matches!(
            scope.string_enum(&["x", "x"]),
            Err(DeclError::Ir(IrError::InvalidEnum { .. }))
        ));
    }

    #[test]
    fn origins_point_at_the_caller() {
        let dir = project(&["o.zig"]);
        let mut session = Session::new();
        let mut scope =
            declare(&mut session, dir.path(), Path::new("o.bind.toml"), &GeneratorConfig::default()).unwrap();
        let list = scope.sequence(TypeId::F64);
        match &scope.session().types.get(list).origin {
            Origin::Source { file, .. } => assert!(file.ends_with("decl.rs")),
            other => panic!("unexpected origin {:?}", other),
        }
    }

    #[test]
    fn export_type_names_the_shape() {
        let dir = project(&["t.zig"]);
        let mut session = Session::new();
        let mut scope =
            declare(&mut session, dir.path(), Path::new("t.bind.toml"), &GeneratorConfig::default()).unwrap();
        let point = scope.dictionary(&[("x", TypeId::F64)]).unwrap();
        scope.export_type("Point", point).unwrap();
        assert_eq!(scope.typedef("Point"), Some(point));
        assert!(scope.export_type("Point", point).is_err());
        scope.finish().unwrap();
        assert_eq!(session.name(point), Some("Point"));
    }

    #[test]
    fn exported_refs_fail_at_export() {
        let dir = project(&["r.zig"]);
        let mut session = Session::new();
        let mut scope =
            declare(&mut session, dir.path(), Path::new("r.bind.toml"), &GeneratorConfig::default()).unwrap();
        let tree = scope.reference("Tree");
        let children = scope.sequence(tree);
        match scope.export_type("Children", children) {
            Err(DeclError::Ir(IrError::RefUnsupported { name, .. })) => assert_eq!(name, "Tree"),
            other => panic!("expected RefUnsupported, got {:?}", other),
        }
        assert_eq!(scope.typedef("Children"), None);
    }
}
