//! `Generated<Ns>.h`: what hand-written C++ needs to call into or alongside one declaration file.

use std::collections::BTreeSet;

use weft_ir::naming::cpp_identifier;
use weft_ir::{CAbiType, FileId, TypeId, TypeKind};

use crate::context::{Emit, Param, ParamKind, BANNER};
use crate::cpp::{cpp_abi, cpp_dispatch_return, enum_member};
use crate::writer::CodeWriter;

pub(crate) fn emit_header(emit: &Emit, file: FileId) -> String {
    let decl = emit.session.file(file);
    let namespace = emit.namespace(file);
    let mut w = CodeWriter::new();
    w.line(BANNER);
    w.line(format!("// source: {}", decl.path.display()));
    w.line("#pragma once");
    w.blank();
    for include in ["\"root.h\"", "\"BindgenSupport.h\"", "<optional>", "<span>", "<variant>"] {
        w.line(format!("#include {}", include));
    }
    for other in emit.referenced_files(file) {
        w.line(format!("#include \"{}\"", emit.config.header_name(emit.namespace(other))));
    }
    w.blank();

    let mut structs = BTreeSet::new();
    for (id, func) in emit.funcs(file) {
        for index in 0..func.variants.len() {
            let (variant, resolved) = emit.variant(id, index);
            for param in emit.native_params(variant, resolved) {
                if let CAbiType::Struct(id) = param.abi {
                    structs.insert(emit.struct_name(id));
                }
            }
        }
    }
    if !structs.is_empty() {
        w.open("namespace Bindgen::Abi {");
        for name in structs {
            w.line(format!("struct {};", name));
        }
        w.close("}");
        w.blank();
    }

    w.line(format!("namespace Generated::{} {{", namespace));
    w.blank();
    for ty in emit.owned_types(file) {
        declare_type(emit, &mut w, ty);
    }

    for (id, func) in emit.funcs(file) {
        w.line(format!("extern \"C\" JSC_DECLARE_HOST_FUNCTION({});", emit.host_symbol(file, func)));
        for index in 0..func.variants.len() {
            let (variant, resolved) = emit.variant(id, index);
            let params: Vec<String> = emit
                .native_params(variant, resolved)
                .iter()
                .map(|param| cpp_param(emit, param))
                .collect();
            w.line(format!(
                "extern \"C\" {} {}({});",
                cpp_dispatch_return(&resolved.ret),
                emit.dispatch_symbol(file, func, index),
                params.join(", ")
            ));
        }
    }
    for ty in emit.owned_types(file) {
        if let TypeKind::NativeEnum(_) = emit.session.types.kind(ty) {
            w.line(format!(
                "extern \"C\" bool {}(const Bindgen::BoxedString* name, uint32_t* out);",
                emit.enum_symbol(file, ty, "FromName")
            ));
            w.line(format!(
                "extern \"C\" bool {}(uint32_t value, Bindgen::BoxedString* out);",
                emit.enum_symbol(file, ty, "ToName")
            ));
        }
    }
    w.blank();
    w.line(format!("}} // namespace Generated::{}", namespace));
    w.finish()
}

fn cpp_param(emit: &Emit, param: &Param) -> String {
    let ty = cpp_abi(emit, &param.abi);
    match param.kind {
        ParamKind::Global | ParamKind::Vm | ParamKind::Value => format!("{} {}", ty, param.name),
        ParamKind::Pointer | ParamKind::Comm => format!("const {}* {}", ty, param.name),
        ParamKind::Out => format!("{}* {}", ty, param.name),
    }
}

fn declare_type(emit: &Emit, w: &mut CodeWriter, ty: TypeId) {
    let name = emit.type_name(ty);
    match emit.session.types.kind(ty) {
        TypeKind::StringEnum(values) => {
            let tag = cpp_abi(emit, &CAbiType::discriminant(values.len()));
            w.open(format!("enum class {} : {} {{", name, tag));
            for (index, value) in values.iter().enumerate() {
                w.line(format!("{} = {},", enum_member(value), index));
            }
            w.close("};");
        }
        TypeKind::NativeEnum(locator) => {
            w.line(format!("// {}", locator));
            w.line(format!("using {} = uint32_t;", name));
        }
        TypeKind::Dictionary(fields) => {
            w.open(format!("struct {} {{", name));
            for field in fields {
                let mut spelled = cpp_user_type(emit, field.ty);
                if emit.session.types.flags(field.ty).field_may_be_absent() {
                    spelled = format!("std::optional<{}>", spelled);
                }
                w.line(format!("{} {};", spelled, cpp_identifier(&field.key)));
            }
            w.close("};");
        }
        TypeKind::Sequence(element) => {
            w.line(format!("using {} = std::span<const {}>;", name, cpp_user_type(emit, *element)));
        }
        TypeKind::Record(value) => {
            w.line(format!("using {} = Bindgen::Record<{}>;", name, cpp_user_type(emit, *value)));
        }
        TypeKind::OneOf(members) => {
            let members: Vec<String> = members.iter().map(|member| cpp_user_type(emit, *member)).collect();
            w.line(format!("using {} = std::variant<{}>;", name, members.join(", ")));
        }
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
        | TypeKind::Ref(_) => return,
    }
    w.blank();
}

/// Spelling hand-written C++ sees, as opposed to the ABI layout.
fn cpp_user_type(emit: &Emit, ty: TypeId) -> String {
    match emit.session.types.kind(ty) {
        TypeKind::Boolean | TypeKind::StrictBoolean => "bool".to_string(),
        TypeKind::F64 => "double".to_string(),
        TypeKind::Usize => "size_t".to_string(),
        TypeKind::DomString | TypeKind::ByteString | TypeKind::UsvString | TypeKind::Utf8String => {
            "Bindgen::BoxedString".to_string()
        }
        TypeKind::Any => "JSC::EncodedJSValue".to_string(),
        TypeKind::Undefined => "std::monostate".to_string(),
        TypeKind::GlobalObject => "JSC::JSGlobalObject*".to_string(),
        TypeKind::VirtualMachine => "JSC::VM*".to_string(),
        TypeKind::Sequence(_)
        | TypeKind::Record(_)
        | TypeKind::OneOf(_)
        | TypeKind::Dictionary(_)
        | TypeKind::NativeEnum(_)
        | TypeKind::StringEnum(_) => {
            format!("Generated::{}::{}", emit.owner_namespace(ty), emit.type_name(ty))
        }
        TypeKind::Ref(name) => unreachable!("unresolved reference `{}`", name),
    }
}
