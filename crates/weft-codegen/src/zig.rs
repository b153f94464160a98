//! `bindgen_generated.zig`: the native side.
//!
//! One `abi` namespace holds every extern struct. Each declaration file then gets a
//! namespace with its user-facing types, one exported dispatch function per variant that
//! unpacks the ABI values and calls the implementation, and typed handles on the host
//! functions the C++ glue defines.

use weft_abi::{ArgLowering, CommSlot, ReturnStrategy};
use weft_ir::naming::pascal_case;
use weft_ir::{CAbiType, DefaultValue, DictionaryLayout, Field, FileId, Func, FuncId, TypeId, TypeKind};

use crate::context::{arg_ident, number_literal, zig_ident, zig_string, Emit, ParamKind, BANNER};
use crate::writer::CodeWriter;

pub(crate) fn emit_zig(emit: &Emit) -> String {
    let mut zig = Zig {
        emit,
        w: CodeWriter::new(),
    };
    zig.w.line(BANNER);
    zig.w.line("const std = @import(\"std\");");
    zig.w.line("const rt = @import(\"bindgen_runtime.zig\");");
    zig.w.blank();
    zig.abi();
    for (file, _) in emit.files() {
        zig.file(file);
    }
    zig.w.finish()
}

/// Zig spelling of a C-ABI tag.
fn zig_abi(emit: &Emit, abi: &CAbiType) -> String {
    match abi {
        CAbiType::Bool => "bool".to_string(),
        CAbiType::U8 => "u8".to_string(),
        CAbiType::U16 => "u16".to_string(),
        CAbiType::U32 => "u32".to_string(),
        CAbiType::Usize => "usize".to_string(),
        CAbiType::F64 => "f64".to_string(),
        CAbiType::JsValue => "rt.JSValue".to_string(),
        CAbiType::BoxedString => "rt.BoxedString".to_string(),
        CAbiType::GlobalObject => "*rt.JSGlobalObject".to_string(),
        CAbiType::VirtualMachine => "*rt.VM".to_string(),
        CAbiType::Unit => "void".to_string(),
        CAbiType::Pointer(inner) => format!("[*]const {}", zig_abi(emit, inner)),
        CAbiType::Struct(id) => format!("abi.{}", emit.struct_name(*id)),
    }
}

struct Zig<'e, 'a> {
    emit: &'e Emit<'a>,
    w: CodeWriter,
}

impl Zig<'_, '_> {
    fn abi(&mut self) {
        let emit = self.emit;
        self.w.open("pub const abi = struct {");
        for (_, def) in emit.session.structs.iter() {
            self.w.open(format!("pub const {} = extern struct {{", def.name));
            for field in &def.fields {
                self.w.line(format!("{}: {},", zig_ident(&field.name), zig_abi(emit, &field.abi)));
            }
            self.w.close("};");
            if !def.fields.is_empty() {
                let layout = def.layout();
                self.w.open("comptime {");
                self.w.line(format!("std.debug.assert(@sizeOf({}) == {});", def.name, layout.size));
                self.w.line(format!("std.debug.assert(@alignOf({}) == {});", def.name, layout.align));
                for (field, offset) in def.fields.iter().zip(&layout.offsets) {
                    self.w.line(format!(
                        "std.debug.assert(@offsetOf({}, {}) == {});",
                        def.name,
                        zig_string(&field.name),
                        offset
                    ));
                }
                self.w.close("}");
            }
        }
        self.w.close("};");
        self.w.blank();
    }

    fn file(&mut self, file: FileId) {
        let emit = self.emit;
        let decl = emit.session.file(file);
        self.w.open(format!(
            "pub const {} = struct {{ // source: {}",
            emit.namespace(file),
            decl.path.display()
        ));
        self.w.line(format!("const impl = @import({});", zig_string(&emit.impl_import(file))));
        self.w.blank();

        let owned = emit.owned_types(file);
        for ty in &owned {
            self.declare_type(file, *ty);
        }
        for (id, func) in emit.funcs(file) {
            for index in 0..func.variants.len() {
                self.dispatcher(file, id, func, index);
            }
        }
        for ty in &owned {
            if let TypeKind::NativeEnum(_) = emit.session.types.kind(*ty) {
                self.native_enum_exports(file, *ty);
            }
        }
        for (id, func) in emit.funcs(file) {
            self.host_handles(file, id, func);
        }
        self.w.close("};");
        self.w.blank();
    }

    /// Spelling of `ty` inside `file`'s namespace.
    fn user_type(&self, file: FileId, ty: TypeId) -> String {
        let emit = self.emit;
        match emit.session.types.kind(ty) {
            TypeKind::Boolean | TypeKind::StrictBoolean => "bool".to_string(),
            TypeKind::F64 => "f64".to_string(),
            TypeKind::Usize => "usize".to_string(),
            TypeKind::DomString | TypeKind::ByteString | TypeKind::UsvString | TypeKind::Utf8String => {
                "rt.BoxedString".to_string()
            }
            TypeKind::Any => "rt.JSValue".to_string(),
            TypeKind::Undefined => "void".to_string(),
            TypeKind::GlobalObject => "*rt.JSGlobalObject".to_string(),
            TypeKind::VirtualMachine => "*rt.VM".to_string(),
            TypeKind::Sequence(_)
            | TypeKind::Record(_)
            | TypeKind::OneOf(_)
            | TypeKind::Dictionary(_)
            | TypeKind::NativeEnum(_)
            | TypeKind::StringEnum(_) => {
                let name = emit.type_name(ty);
                match emit.session.owner(ty) {
                    Some(owner) if owner != file => format!("{}.{}", emit.namespace(owner), name),
                    _ => name,
                }
            }
            TypeKind::Ref(name) => unreachable!("unresolved reference `{}`", name),
        }
    }

    /// Element spelling for containers, which carry elements in their ABI form.
    fn element_type(&self, file: FileId, ty: TypeId) -> String {
        match self.emit.session.known_direct_abi(ty) {
            Some(abi) => zig_abi(self.emit, &abi),
            None => self.user_type(file, ty),
        }
    }

    fn declare_type(&mut self, file: FileId, ty: TypeId) {
        let emit = self.emit;
        let name = emit.type_name(ty);
        match emit.session.types.kind(ty) {
            TypeKind::StringEnum(values) => {
                let tag = zig_abi(emit, &CAbiType::discriminant(values.len()));
                self.w.open(format!("pub const {} = enum({}) {{", name, tag));
                for value in values {
                    self.w.line(format!("{},", zig_ident(value)));
                }
                self.w.close("};");
            }
            TypeKind::NativeEnum(locator) => {
                self.w.line(format!("pub const {} = impl.{};", name, locator));
            }
            TypeKind::Dictionary(fields) => {
                self.w.open(format!("pub const {} = struct {{", name));
                for field in fields {
                    let field_line = self.dictionary_field(file, field);
                    self.w.line(field_line);
                }
                if let Some(layout) = emit.session.known_dictionary_layout(ty) {
                    self.dictionary_conversions(file, &name, fields, layout);
                }
                self.w.close("};");
            }
            TypeKind::Sequence(element) => {
                let element = self.element_type(file, *element);
                self.w.line(format!("pub const {} = []const {};", name, element));
            }
            TypeKind::Record(value) => {
                let value = self.element_type(file, *value);
                self.w.line(format!("pub const {} = rt.Record({});", name, value));
            }
            TypeKind::OneOf(members) => {
                self.w.open(format!("pub const {} = union(enum) {{", name));
                for (index, member) in members.iter().enumerate() {
                    let member = self.user_type(file, *member);
                    self.w.line(format!("option{}: {},", index, member));
                }
                self.w.close("};");
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
        self.w.blank();
    }

    fn dictionary_field(&self, file: FileId, field: &Field) -> String {
        let flags = self.emit.session.types.flags(field.ty);
        let ty = self.user_type(file, field.ty);
        let key = zig_ident(&field.key);
        if flags.field_may_be_absent() {
            format!("{}: ?{} = null,", key, ty)
        } else if let Some(default) = &flags.default {
            format!("{}: {} = {},", key, ty, self.default_literal(field.ty, default))
        } else {
            format!("{}: {},", key, ty)
        }
    }

    fn default_literal(&self, ty: TypeId, value: &DefaultValue) -> String {
        let kind = self.emit.session.types.kind(ty);
        match (kind, value) {
            (_, DefaultValue::Bool(flag)) => flag.to_string(),
            (TypeKind::StringEnum(_), DefaultValue::String(text)) => format!(".{}", zig_ident(text)),
            (_, DefaultValue::String(text)) => format!("rt.BoxedString.static({})", zig_string(text)),
            (kind, number) => number_literal(kind, number),
        }
    }

    fn dictionary_conversions(&mut self, file: FileId, name: &str, fields: &[Field], layout: &DictionaryLayout) {
        let emit = self.emit;
        let def = emit.session.structs.get(layout.struct_id);
        self.w.blank();
        self.w.open(format!("pub fn fromAbi(raw: *const abi.{}) {} {{", def.name, name));
        if layout.slots.iter().all(|slot| slot.value.is_none() && slot.is_set.is_none()) {
            self.w.line("_ = raw;");
        }
        self.w.open("return .{");
        for (field, slot) in fields.iter().zip(&layout.slots) {
            let value = match slot.value {
                Some(index) => self.from_abi(file, field.ty, &format!("raw.{}", zig_ident(&def.fields[index].name))),
                None => "{}".to_string(),
            };
            let value = match slot.is_set {
                Some(index) => format!(
                    "if (raw.{}) {} else null",
                    zig_ident(&def.fields[index].name),
                    value
                ),
                None => value,
            };
            self.w.line(format!(".{} = {},", zig_ident(&field.key), value));
        }
        self.w.close("};");
        self.w.close("}");

        if layout.direct {
            self.w.blank();
            self.w.open(format!("pub fn toAbi(self: {}) abi.{} {{", name, def.name));
            if layout.slots.iter().all(|slot| slot.value.is_none()) {
                self.w.line("_ = self;");
            }
            self.w.open("return .{");
            for (field, slot) in fields.iter().zip(&layout.slots) {
                if let Some(index) = slot.value {
                    let value = self.to_abi(field.ty, &format!("self.{}", zig_ident(&field.key)));
                    self.w.line(format!(".{} = {},", zig_ident(&def.fields[index].name), value));
                }
            }
            self.w.close("};");
            self.w.close("}");
        }
    }

    /// Converts an ABI value into the type the implementation receives.
    fn from_abi(&self, file: FileId, ty: TypeId, expr: &str) -> String {
        match self.emit.session.types.kind(ty) {
            TypeKind::StringEnum(_) | TypeKind::NativeEnum(_) => {
                format!("@as({}, @enumFromInt({}))", self.user_type(file, ty), expr)
            }
            TypeKind::Dictionary(_) => format!("{}.fromAbi(&{})", self.user_type(file, ty), expr),
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
            | TypeKind::Sequence(_)
            | TypeKind::Record(_)
            | TypeKind::OneOf(_)
            | TypeKind::Ref(_) => expr.to_string(),
        }
    }

    fn to_abi(&self, ty: TypeId, expr: &str) -> String {
        match self.emit.session.types.kind(ty) {
            TypeKind::StringEnum(_) | TypeKind::NativeEnum(_) => format!("@intFromEnum({})", expr),
            TypeKind::Dictionary(_) => format!("{}.toAbi()", expr),
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
            | TypeKind::Sequence(_)
            | TypeKind::Record(_)
            | TypeKind::OneOf(_)
            | TypeKind::Ref(_) => expr.to_string(),
        }
    }

    fn dispatcher(&mut self, file: FileId, id: FuncId, func: &Func, index: usize) {
        let emit = self.emit;
        let (variant, resolved) = emit.variant(id, index);
        let params: Vec<String> = emit
            .native_params(variant, resolved)
            .iter()
            .map(|param| {
                let ty = zig_abi(emit, &param.abi);
                let name = zig_ident(&param.name);
                match param.kind {
                    ParamKind::Global | ParamKind::Vm | ParamKind::Value => format!("{}: {}", name, ty),
                    ParamKind::Pointer | ParamKind::Comm => format!("{}: *const {}", name, ty),
                    ParamKind::Out => format!("{}: *{}", name, ty),
                }
            })
            .collect();
        let returns = match resolved.ret {
            ReturnStrategy::JsValue => "rt.JSValue",
            ReturnStrategy::Void | ReturnStrategy::OutParam(_) => "bool",
        };
        self.w.open(format!(
            "export fn {}({}) {} {{",
            emit.dispatch_symbol(file, func, index),
            params.join(", "),
            returns
        ));

        let mut args = Vec::with_capacity(variant.args.len());
        for (arg, lowering) in variant.args.iter().zip(&resolved.args) {
            let param = zig_ident(&arg_ident(&arg.name));
            let value = match lowering {
                ArgLowering::Context(CAbiType::VirtualMachine) => "vm".to_string(),
                ArgLowering::Context(_) => "global".to_string(),
                ArgLowering::Unit => "{}".to_string(),
                ArgLowering::ByValue(_) => self.from_abi(file, arg.ty, &param),
                ArgLowering::ByPointer(_) => match emit.session.types.kind(arg.ty) {
                    TypeKind::Dictionary(_) => format!("{}.fromAbi({})", self.user_type(file, arg.ty), param),
                    _ => format!("{}.*", param),
                },
                ArgLowering::Comm(slot) => self.comm_value(file, arg.ty, slot),
            };
            args.push(value);
        }
        let call = format!("impl.{}({})", emit.impl_name(func, index), args.join(", "));
        let failed = match resolved.ret {
            ReturnStrategy::JsValue => "return .zero;",
            ReturnStrategy::Void | ReturnStrategy::OutParam(_) => "return false;",
        };
        let catch = |zig: &mut Self, head: String| {
            zig.w.open(format!("{} catch |err| {{", head));
            zig.w.line("rt.throwError(global, err);");
            if emit.debug {
                zig.w.line("std.debug.assert(rt.hasException(global));");
            }
            zig.w.line(failed);
            zig.w.close("};");
        };
        match &resolved.ret {
            ReturnStrategy::Void => {
                catch(self, call);
                self.w.line("return true;");
            }
            ReturnStrategy::JsValue => catch(self, format!("return {}", call)),
            ReturnStrategy::OutParam(_) => {
                catch(self, format!("const result = {}", call));
                let value = self.to_abi(variant.ret, "result");
                self.w.line(format!("out.* = {};", value));
                self.w.line("return true;");
            }
        }
        self.w.close("}");
        self.w.blank();
    }

    fn comm_value(&self, file: FileId, ty: TypeId, slot: &CommSlot) -> String {
        let field = |name: &str| format!("comm.{}", zig_ident(name));
        let value = match slot {
            CommSlot::Value { value, .. } => match value {
                Some(value) => self.from_abi(file, ty, &field(value)),
                None => "{}".to_string(),
            },
            CommSlot::Sequence { ptr, len, .. } => format!("{}[0..{}]", field(ptr), field(len)),
            CommSlot::Record { keys, values, len, .. } => format!(
                "{}.init({}[0..{}], {}[0..{}])",
                self.user_type(file, ty),
                field(keys),
                field(len),
                field(values),
                field(len)
            ),
            CommSlot::OneOf { tag, members, .. } => {
                let union = self.user_type(file, ty);
                let member_tys = match self.emit.session.types.kind(ty) {
                    TypeKind::OneOf(member_tys) => member_tys.clone(),
                    _ => Vec::new(),
                };
                let mut arms: Vec<String> = members
                    .iter()
                    .zip(&member_tys)
                    .enumerate()
                    .map(|(index, (member, member_ty))| {
                        let payload = match member {
                            Some((name, _)) => self.from_abi(file, *member_ty, &field(name)),
                            None => "{}".to_string(),
                        };
                        format!("{} => {}{{ .option{} = {} }}", index, union, index, payload)
                    })
                    .collect();
                arms.push("else => unreachable".to_string());
                format!("switch ({}) {{ {} }}", field(tag), arms.join(", "))
            }
        };
        match slot.is_set() {
            Some(is_set) => format!("if ({}) {} else null", field(is_set), value),
            None => value,
        }
    }

    fn native_enum_exports(&mut self, file: FileId, ty: TypeId) {
        let emit = self.emit;
        let name = emit.type_name(ty);
        self.w.open(format!(
            "export fn {}(name: *const rt.BoxedString, out: *u32) bool {{",
            emit.enum_symbol(file, ty, "FromName")
        ));
        self.w.line(format!("const value = rt.enumFromName({}, name.*) orelse return false;", name));
        self.w.line("out.* = @intFromEnum(value);");
        self.w.line("return true;");
        self.w.close("}");
        self.w.blank();
        self.w.open(format!(
            "export fn {}(value: u32, out: *rt.BoxedString) bool {{",
            emit.enum_symbol(file, ty, "ToName")
        ));
        self.w.line(format!("const tag = std.meta.intToEnum({}, value) catch return false;", name));
        self.w.line("out.* = rt.BoxedString.static(@tagName(tag));");
        self.w.line("return true;");
        self.w.close("}");
        self.w.blank();
    }

    fn host_handles(&mut self, file: FileId, id: FuncId, func: &Func) {
        let emit = self.emit;
        let symbol = emit.host_symbol(file, func);
        let pascal = pascal_case(func.display_name());
        self.w.line(format!(
            "extern fn {}(global: *rt.JSGlobalObject, callFrame: *rt.CallFrame) callconv(rt.host_call) rt.JSValue;",
            symbol
        ));
        self.w.line(format!("pub const js{} = {};", pascal, symbol));
        self.w.open(format!(
            "pub fn create{}Callback(global: *rt.JSGlobalObject) rt.JSValue {{",
            pascal
        ));
        self.w.line(format!(
            "return rt.createHostFunction(global, {}, {}, js{});",
            zig_string(func.display_name()),
            emit.resolution.func(id).min_args,
            pascal
        ));
        self.w.close("}");
        self.w.blank();
    }
}
