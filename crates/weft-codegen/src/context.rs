//! State and spelling helpers shared by the three emitters.

use std::collections::BTreeSet;
use std::fmt::Write;
use std::path::{Component, Path, PathBuf};

use fxhash::FxHashSet;
use weft_abi::{ArgLowering, Resolution, ResolvedVariant, ReturnStrategy};
use weft_front::GeneratorConfig;
use weft_ir::naming::{cpp_identifier, pascal_case};
use weft_ir::{
    CAbiType, DeclFile, DefaultValue, ExternStructId, FileId, Func, FuncId, Session, TypeId, TypeKind,
    Variant,
};

pub const BANNER: &str = "// GENERATED FILE - DO NOT HAND EDIT";

/// Everything an emitter reads. Emitters never mutate the session.
pub(crate) struct Emit<'a> {
    pub session: &'a Session,
    pub resolution: &'a Resolution,
    pub config: &'a GeneratorConfig,
    pub debug: bool,
    /// Directory the aggregated artifacts are written to.
    pub output_root: PathBuf,
    pub source_root: PathBuf,
    returned: FxHashSet<u64>,
}

/// One parameter of a native dispatch symbol.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Param {
    pub name: String,
    pub abi: CAbiType,
    pub kind: ParamKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParamKind {
    Global,
    Vm,
    Value,
    Pointer,
    Comm,
    Out,
}

impl<'a> Emit<'a> {
    pub fn new(
        session: &'a Session,
        resolution: &'a Resolution,
        config: &'a GeneratorConfig,
        source_root: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
        debug: bool,
    ) -> Self {
        let mut emit = Emit {
            session,
            resolution,
            config,
            debug,
            output_root: output_root.into(),
            source_root: source_root.into(),
            returned: FxHashSet::default(),
        };
        let returns: Vec<TypeId> = session
            .funcs()
            .flat_map(|(_, func)| func.variants.iter().map(|variant| variant.ret))
            .collect();
        for ty in returns {
            emit.collect_returned(ty);
        }
        emit
    }

    fn collect_returned(&mut self, ty: TypeId) {
        let session = self.session;
        let TypeKind::Dictionary(fields) = session.types.kind(ty) else {
            return;
        };
        let Some(hash) = session.types.get(ty).structural_hash() else {
            return;
        };
        if self.returned.insert(hash) {
            for field in fields {
                self.collect_returned(field.ty);
            }
        }
    }

    /// Dictionaries that cross back to the host as return values.
    pub fn is_returned(&self, ty: TypeId) -> bool {
        self.session
            .types
            .get(ty)
            .structural_hash()
            .is_some_and(|hash| self.returned.contains(&hash))
    }

    /// Declaration files sorted by path.
    pub fn files(&self) -> Vec<(FileId, &'a DeclFile)> {
        let mut files: Vec<_> = self.session.files().collect();
        files.sort_by(|a, b| a.1.path.cmp(&b.1.path));
        files
    }

    pub fn namespace(&self, file: FileId) -> &'a str {
        &self.session.file(file).namespace
    }

    pub fn funcs(&self, file: FileId) -> impl Iterator<Item = (FuncId, &'a Func)> + 'a {
        let session = self.session;
        session
            .file(file)
            .funcs
            .iter()
            .map(move |id| (*id, session.func(*id)))
    }

    /// Reachable named types first reached from `file`, dependencies first.
    pub fn owned_types(&self, file: FileId) -> Vec<TypeId> {
        self.session
            .reachable()
            .filter(|ty| self.session.types.kind(*ty).is_named())
            .filter(|ty| self.session.owner(*ty) == Some(file))
            .collect()
    }

    /// Files owning the named types directly under `file`'s own types or functions.
    pub fn referenced_files(&self, file: FileId) -> BTreeSet<FileId> {
        let mut roots: Vec<TypeId> = self.owned_types(file);
        for (_, func) in self.funcs(file) {
            for variant in &func.variants {
                roots.extend(variant.args.iter().map(|arg| arg.ty));
                roots.push(variant.ret);
            }
        }
        let mut files = BTreeSet::new();
        for ty in roots {
            for child in std::iter::once(ty).chain(self.children(ty)) {
                if !self.session.types.kind(child).is_named() {
                    continue;
                }
                if let Some(owner) = self.session.owner(child).filter(|owner| *owner != file) {
                    files.insert(owner);
                }
            }
        }
        files
    }

    pub fn children(&self, ty: TypeId) -> Vec<TypeId> {
        match self.session.types.kind(ty) {
            TypeKind::Sequence(element) | TypeKind::Record(element) => vec![*element],
            TypeKind::OneOf(members) => members.clone(),
            TypeKind::Dictionary(fields) => fields.iter().map(|field| field.ty).collect(),
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
        }
    }

    pub fn type_name(&self, ty: TypeId) -> String {
        let canonical = self.session.canonical(ty).unwrap_or(ty);
        self.session.type_name(canonical)
    }

    pub fn owner_namespace(&self, ty: TypeId) -> &'a str {
        match self.session.owner(ty) {
            Some(owner) => self.namespace(owner),
            None => "",
        }
    }

    pub fn struct_name(&self, id: ExternStructId) -> &'a str {
        &self.session.structs.get(id).name
    }

    pub fn variant(&self, func: FuncId, index: usize) -> (&'a Variant, &'a ResolvedVariant) {
        (
            &self.session.func(func).variants[index],
            &self.resolution.func(func).variants[index],
        )
    }

    /// `bindgen_<Ns>_js<Func>`, the host function the script side calls.
    pub fn host_symbol(&self, file: FileId, func: &Func) -> String {
        format!("bindgen_{}_js{}", self.namespace(file), pascal_case(func.display_name()))
    }

    /// `bindgen_<Ns>_dispatch<Func><n>`, the native entry point of one variant.
    pub fn dispatch_symbol(&self, file: FileId, func: &Func, index: usize) -> String {
        format!(
            "bindgen_{}_dispatch{}{}",
            self.namespace(file),
            pascal_case(func.display_name()),
            index
        )
    }

    pub fn enum_symbol(&self, file: FileId, ty: TypeId, direction: &str) -> String {
        format!("bindgen_{}_{}{}", self.namespace(file), self.type_name(ty), direction)
    }

    /// Name the implementation file exports for variant `index`.
    pub fn impl_name(&self, func: &Func, index: usize) -> String {
        if func.variants.len() > 1 {
            format!("{}{}", func.display_name(), index)
        } else {
            func.display_name().to_string()
        }
    }

    /// Parameters of a native dispatch symbol. The global object always comes first.
    pub fn native_params(&self, variant: &Variant, resolved: &ResolvedVariant) -> Vec<Param> {
        let mut params = vec![Param {
            name: "global".to_string(),
            abi: CAbiType::GlobalObject,
            kind: ParamKind::Global,
        }];
        for (arg, lowering) in variant.args.iter().zip(&resolved.args) {
            let (abi, kind) = match lowering {
                ArgLowering::Context(CAbiType::VirtualMachine) => {
                    (CAbiType::VirtualMachine, ParamKind::Vm)
                }
                ArgLowering::ByValue(abi) => (abi.clone(), ParamKind::Value),
                ArgLowering::ByPointer(abi) => (abi.clone(), ParamKind::Pointer),
                ArgLowering::Context(_) | ArgLowering::Unit | ArgLowering::Comm(_) => continue,
            };
            let name = match kind {
                ParamKind::Vm => "vm".to_string(),
                _ => arg_ident(&arg.name),
            };
            params.push(Param { name, abi, kind });
        }
        if let Some(comm) = resolved.comm {
            params.push(Param {
                name: "comm".to_string(),
                abi: CAbiType::Struct(comm),
                kind: ParamKind::Comm,
            });
        }
        if let ReturnStrategy::OutParam(abi) = &resolved.ret {
            params.push(Param {
                name: "out".to_string(),
                abi: abi.clone(),
                kind: ParamKind::Out,
            });
        }
        params
    }

    /// Import path of `file`'s implementation, relative to the directory of the Zig artifact.
    pub fn impl_import(&self, file: FileId) -> String {
        let target = self.source_root.join(&self.session.file(file).impl_path);
        relative_path(&self.artifact_dir(&self.config.output.zig_file), &target)
    }

    /// Include path of `file`'s header as seen from the C++ artifact.
    pub fn header_include(&self, file: FileId) -> String {
        let header = self.output_root.join(self.config.header_name(self.namespace(file)));
        relative_path(&self.artifact_dir(&self.config.output.cpp_file), &header)
    }

    fn artifact_dir(&self, artifact: &str) -> PathBuf {
        let path = self.output_root.join(artifact);
        match path.parent() {
            Some(parent) => parent.to_path_buf(),
            None => self.output_root.clone(),
        }
    }
}

const RESERVED: [&str; 6] = ["global", "vm", "comm", "out", "scope", "callFrame"];

/// Identifier for an argument, clear of C++ keywords and of the names the glue itself uses.
pub(crate) fn arg_ident(name: &str) -> String {
    let ident = cpp_identifier(name);
    if RESERVED.contains(&ident.as_str()) {
        format!("{}_", ident)
    } else {
        ident
    }
}

/// `/`-separated path from directory `from` to `to`. Both must be absolute or both relative.
pub(crate) fn relative_path(from: &Path, to: &Path) -> String {
    let from: Vec<Component> = from.components().filter(|c| *c != Component::CurDir).collect();
    let to: Vec<Component> = to.components().filter(|c| *c != Component::CurDir).collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();
    let mut parts: Vec<String> = vec!["..".to_string(); from.len() - common];
    parts.extend(
        to[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    parts.join("/")
}

pub(crate) fn cpp_string(value: &str) -> String {
    let mut out = String::from("\"");
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            ch if ch.is_ascii_graphic() || ch == ' ' => out.push(ch),
            ch => {
                let mut buf = [0; 4];
                for byte in ch.encode_utf8(&mut buf).bytes() {
                    let _ = write!(out, "\\{:03o}", byte);
                }
            }
        }
    }
    out.push('"');
    out
}

pub(crate) fn zig_string(value: &str) -> String {
    let mut out = String::from("\"");
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            ch if ch.is_ascii_graphic() || ch == ' ' => out.push(ch),
            ch => {
                let mut buf = [0; 4];
                for byte in ch.encode_utf8(&mut buf).bytes() {
                    let _ = write!(out, "\\x{:02x}", byte);
                }
            }
        }
    }
    out.push('"');
    out
}

const ZIG_KEYWORDS: &[&str] = &[
    "addrspace", "align", "allowzero", "and", "anyframe", "anytype", "asm", "async", "await", "break",
    "callconv", "catch", "comptime", "const", "continue", "defer", "else", "enum", "errdefer", "error",
    "export", "extern", "fn", "for", "if", "inline", "linksection", "noalias", "noinline", "nosuspend",
    "opaque", "or", "orelse", "packed", "pub", "resume", "return", "struct", "suspend", "switch",
    "test", "threadlocal", "try", "union", "unreachable", "usingnamespace", "var", "volatile", "while",
];

/// `name`, or `@"name"` when it is not a plain Zig identifier.
pub(crate) fn zig_ident(name: &str) -> String {
    let plain = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !ZIG_KEYWORDS.contains(&name);
    if plain {
        name.to_string()
    } else {
        format!("@{}", zig_string(name))
    }
}

/// Number literal valid in both C++ and Zig.
pub(crate) fn number_literal(ty: &TypeKind, value: &DefaultValue) -> String {
    match (ty, value) {
        (TypeKind::Usize, DefaultValue::Integer(n)) => n.to_string(),
        (TypeKind::Usize, other) => format!("{}", other.as_f64().unwrap_or_default() as u64),
        (_, other) => format!("{:?}", other.as_f64().unwrap_or_default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_climb_out_of_the_output_dir() {
        assert_eq!(
            relative_path(Path::new("/w/out/gen"), Path::new("/w/src/node/fs.zig")),
            "../../src/node/fs.zig"
        );
        assert_eq!(relative_path(Path::new("/w"), Path::new("/w/fs.zig")), "fs.zig");
    }

    #[test]
    fn literals_escape_for_each_language() {
        assert_eq!(cpp_string("a\"b\\"), r#""a\"b\\""#);
        assert_eq!(cpp_string("é"), r#""\303\251""#);
        assert_eq!(zig_string("é"), r#""\xc3\xa9""#);
    }

    #[test]
    fn zig_identifiers_quote_keywords_and_symbols() {
        assert_eq!(zig_ident("fast"), "fast");
        assert_eq!(zig_ident("error"), "@\"error\"");
        assert_eq!(zig_ident("utf-8"), "@\"utf-8\"");
    }

    #[test]
    fn reserved_argument_names_are_suffixed() {
        assert_eq!(arg_ident("global"), "global_");
        assert_eq!(arg_ident("new"), "new_");
        assert_eq!(arg_ident("path"), "path");
    }

    #[test]
    fn numbers_follow_the_target_kind() {
        assert_eq!(number_literal(&TypeKind::Usize, &DefaultValue::Integer(4)), "4");
        assert_eq!(number_literal(&TypeKind::F64, &DefaultValue::Integer(4)), "4.0");
        assert_eq!(number_literal(&TypeKind::F64, &DefaultValue::Number(0.5)), "0.5");
        assert_eq!(
            number_literal(&TypeKind::Usize, &DefaultValue::Integer(9_007_199_254_740_993)),
            "9007199254740993"
        );
    }
}
