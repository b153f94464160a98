//! `GeneratedBindings.cpp`: the host-side glue.
//!
//! Per declaration file this converts host values into the layouts native code expects,
//! calls the `extern "C"` dispatch symbols exported by the Zig side and translates their
//! results back. Overloaded functions get a selector that walks the dispatch plan.

use weft_abi::{categories, ArgLowering, Category, CategorySet, CommSlot, DispatchNode, ReturnStrategy};
use weft_ir::naming::{cpp_identifier, identifier, pascal_case};
use weft_ir::{CAbiType, DefaultValue, DictionaryLayout, Field, FileId, Func, FuncId, TypeId, TypeKind};

use crate::context::{arg_ident, cpp_string, number_literal, Emit, BANNER};
use crate::writer::CodeWriter;

const INCLUDES: &[&str] = &[
    "\"root.h\"",
    "\"IDLTypes.h\"",
    "\"JSDOMConvertBase.h\"",
    "\"JSDOMConvertBoolean.h\"",
    "\"JSDOMConvertNumbers.h\"",
    "\"JSDOMConvertStrings.h\"",
    "\"JSDOMExceptionHandling.h\"",
    "\"BindgenSupport.h\"",
    "<JavaScriptCore/JSObject.h>",
    "<JavaScriptCore/ObjectConstructor.h>",
];

/// C++ spelling of a C-ABI tag.
pub(crate) fn cpp_abi(emit: &Emit, abi: &CAbiType) -> String {
    match abi {
        CAbiType::Bool => "bool".to_string(),
        CAbiType::U8 => "uint8_t".to_string(),
        CAbiType::U16 => "uint16_t".to_string(),
        CAbiType::U32 => "uint32_t".to_string(),
        CAbiType::Usize => "size_t".to_string(),
        CAbiType::F64 => "double".to_string(),
        CAbiType::JsValue => "JSC::EncodedJSValue".to_string(),
        CAbiType::BoxedString => "Bindgen::BoxedString".to_string(),
        CAbiType::GlobalObject => "JSC::JSGlobalObject*".to_string(),
        CAbiType::VirtualMachine => "JSC::VM*".to_string(),
        CAbiType::Unit => "void".to_string(),
        CAbiType::Pointer(inner) => format!("const {}*", cpp_abi(emit, inner)),
        CAbiType::Struct(id) => format!("Bindgen::Abi::{}", emit.struct_name(*id)),
    }
}

/// Return type of a native dispatch symbol.
pub(crate) fn cpp_dispatch_return(ret: &ReturnStrategy) -> &'static str {
    match ret {
        ReturnStrategy::JsValue => "JSC::EncodedJSValue",
        ReturnStrategy::Void | ReturnStrategy::OutParam(_) => "bool",
    }
}

pub(crate) fn emit_cpp(emit: &Emit) -> String {
    let mut cpp = Cpp {
        emit,
        w: CodeWriter::new(),
    };
    cpp.w.line(BANNER);
    for include in INCLUDES {
        cpp.w.line(format!("#include {}", include));
    }
    let files = emit.files();
    for (file, _) in &files {
        cpp.w.line(format!("#include \"{}\"", emit.header_include(*file)));
    }
    cpp.w.blank();
    cpp.extern_structs();
    for (file, _) in files {
        cpp.file(file);
    }
    cpp.w.finish()
}

struct Cpp<'e, 'a> {
    emit: &'e Emit<'a>,
    w: CodeWriter,
}

impl Cpp<'_, '_> {
    fn extern_structs(&mut self) {
        if self.emit.session.structs.is_empty() {
            return;
        }
        self.w.line("namespace Bindgen::Abi {");
        self.w.blank();
        for (_, def) in self.emit.session.structs.iter() {
            let layout = def.layout();
            self.w.open(format!("struct {} {{", def.name));
            for field in &def.fields {
                self.w.line(format!(
                    "{} {};",
                    cpp_abi(self.emit, &field.abi),
                    cpp_identifier(&field.name)
                ));
            }
            self.w.close("};");
            if !def.fields.is_empty() {
                self.w.line(format!(
                    "static_assert(sizeof({0}) == {1}, \"{0} size\");",
                    def.name, layout.size
                ));
                self.w.line(format!(
                    "static_assert(alignof({0}) == {1}, \"{0} alignment\");",
                    def.name, layout.align
                ));
                for (field, offset) in def.fields.iter().zip(&layout.offsets) {
                    self.w.line(format!(
                        "static_assert(offsetof({0}, {1}) == {2}, \"{0}::{1} offset\");",
                        def.name,
                        cpp_identifier(&field.name),
                        offset
                    ));
                }
            }
            self.w.blank();
        }
        self.w.line("} // namespace Bindgen::Abi");
        self.w.blank();
    }

    fn file(&mut self, file: FileId) {
        let emit = self.emit;
        let namespace = emit.namespace(file);
        self.w.line(format!("// source: {}", emit.session.file(file).path.display()));
        self.w.line(format!("namespace Generated::{} {{", namespace));
        self.w.blank();

        for ty in emit.owned_types(file) {
            match emit.session.types.kind(ty) {
                TypeKind::StringEnum(values) => self.string_enum(ty, values),
                TypeKind::NativeEnum(_) => self.native_enum(file, ty),
                TypeKind::Dictionary(fields) => {
                    if let Some(layout) = emit.session.known_dictionary_layout(ty) {
                        self.dictionary(ty, fields, layout);
                    }
                }
                TypeKind::Sequence(_)
                | TypeKind::Record(_)
                | TypeKind::OneOf(_)
                | TypeKind::Boolean
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
                | TypeKind::Ref(_) => {}
            }
        }

        for (id, func) in emit.funcs(file) {
            for index in 0..func.variants.len() {
                self.dispatcher(file, id, func, index);
            }
            self.host_function(file, id, func);
        }
        self.w.line(format!("}} // namespace Generated::{}", namespace));
        self.w.blank();
    }

    /// `Generated::<Owner>::<prefix><Name><suffix>` for a function generated per named type.
    fn qualified_fn(&self, ty: TypeId, prefix: &str, suffix: &str) -> String {
        format!(
            "Generated::{}::{}{}{}",
            self.emit.owner_namespace(ty),
            prefix,
            self.emit.type_name(ty),
            suffix
        )
    }

    fn open_fn(&mut self, signature: String) {
        self.w.line(signature);
        self.w.open("{");
    }

    fn throw_scope(&mut self) {
        self.w.line("auto& vm = JSC::getVM(global);");
        self.w.line("auto scope = DECLARE_THROW_SCOPE(vm);");
    }

    fn bail_unless(&mut self, condition: &str, fail: &str) {
        self.w.open(format!("if (!{}) {{", condition));
        self.w.line(format!("return {};", fail));
        self.w.close("}");
    }

    fn throw_type_error(&mut self, message: &str, fail: &str) {
        self.w.line(format!("throwTypeError(global, scope, {}_s);", cpp_string(message)));
        self.w.line(format!("return {};", fail));
    }

    fn string_enum(&mut self, ty: TypeId, values: &[String]) {
        let name = self.emit.type_name(ty);
        let tag = cpp_abi(self.emit, &CAbiType::discriminant(values.len()));
        self.open_fn(format!(
            "static bool convert{}(JSC::JSGlobalObject* global, JSC::JSValue value, {}* out)",
            name, tag
        ));
        self.throw_scope();
        self.w.line("WTF::String string = value.toWTFString(global);");
        self.w.line("RETURN_IF_EXCEPTION(scope, false);");
        for (index, value) in values.iter().enumerate() {
            self.w.open(format!("if (string == {}_s) {{", cpp_string(value)));
            self.w.line(format!("*out = {};", index));
            self.w.line("return true;");
            self.w.close("}");
        }
        let quoted: Vec<String> = values.iter().map(|value| format!("\"{}\"", value)).collect();
        self.throw_type_error(&format!("Expected one of {} for {}", quoted.join(", "), name), "false");
        self.w.close("}");
        self.w.blank();

        self.open_fn(format!(
            "static JSC::JSValue {}ToJS(JSC::JSGlobalObject* global, {} value)",
            name, tag
        ));
        self.w.line("auto& vm = JSC::getVM(global);");
        self.w.open("switch (value) {");
        for (index, value) in values.iter().enumerate() {
            self.w.line(format!(
                "case {}: return JSC::jsNontrivialString(vm, {}_s);",
                index,
                cpp_string(value)
            ));
        }
        self.w.line("default: return JSC::jsUndefined();");
        self.w.close("}");
        self.w.close("}");
        self.w.blank();
    }

    fn native_enum(&mut self, file: FileId, ty: TypeId) {
        let name = self.emit.type_name(ty);
        let from_name = self.emit.enum_symbol(file, ty, "FromName");
        let to_name = self.emit.enum_symbol(file, ty, "ToName");
        self.open_fn(format!(
            "static bool convert{}(JSC::JSGlobalObject* global, JSC::JSValue value, uint32_t* out)",
            name
        ));
        self.throw_scope();
        self.w.open("if (value.isString()) {");
        self.w.line("Bindgen::BoxedString name = Bindgen::toUTF8String(global, value);");
        self.w.line("RETURN_IF_EXCEPTION(scope, false);");
        self.w.open(format!("if ({}(&name, out)) {{", from_name));
        self.w.line("return true;");
        self.w.close("}");
        self.w.middle("} else if (value.isNumber()) {");
        self.w.line("uint32_t raw = WebCore::convert<WebCore::IDLUnsignedLong>(*global, value);");
        self.w.line("RETURN_IF_EXCEPTION(scope, false);");
        self.w.line("Bindgen::BoxedString name;");
        self.w.open(format!("if ({}(raw, &name)) {{", to_name));
        self.w.line("*out = raw;");
        self.w.line("return true;");
        self.w.close("}");
        self.w.close("}");
        self.throw_type_error(&format!("Invalid value for {}", name), "false");
        self.w.close("}");
        self.w.blank();

        self.open_fn(format!(
            "static JSC::JSValue {}ToJS(JSC::JSGlobalObject* global, uint32_t value)",
            name
        ));
        self.w.line("Bindgen::BoxedString name;");
        self.w.open(format!("if (!{}(value, &name)) {{", to_name));
        self.w.line("return JSC::jsNumber(value);");
        self.w.close("}");
        self.w.line("return Bindgen::toJS(global, name);");
        self.w.close("}");
        self.w.blank();
    }

    fn dictionary(&mut self, ty: TypeId, fields: &[Field], layout: &DictionaryLayout) {
        let emit = self.emit;
        let name = emit.type_name(ty);
        let def = emit.session.structs.get(layout.struct_id);
        self.open_fn(format!(
            "static bool convert{}(JSC::JSGlobalObject* global, JSC::JSValue value, Bindgen::Abi::{}* out)",
            name, def.name
        ));
        self.throw_scope();
        self.w.line("JSC::JSObject* object = value.isObject() ? value.getObject() : nullptr;");
        self.w.open("if (!object && !value.isUndefinedOrNull()) {");
        self.throw_type_error(&format!("Expected an object for {}", name), "false");
        self.w.close("}");
        for (field, slot) in fields.iter().zip(&layout.slots) {
            let member = |index: usize| format!("out->{}", cpp_identifier(&def.fields[index].name));
            let value = slot.value.map(member);
            let is_set = slot.is_set.map(member);
            self.w.open("{");
            self.w.line(format!(
                "JSC::JSValue field = object ? object->get(global, JSC::Identifier::fromString(vm, {}_s)) : JSC::jsUndefined();",
                cpp_string(&field.key)
            ));
            self.w.line("RETURN_IF_EXCEPTION(scope, false);");
            let missing = format!("{}.{} is required", name, field.key);
            let opened = self.open_presence(field.ty, "field", value.as_deref(), is_set.as_deref(), Some(missing.as_str()), "false");
            if let Some(value) = &value {
                self.convert_value(field.ty, "field", value, "false");
            }
            if opened {
                self.w.close("}");
            }
            self.w.close("}");
        }
        self.w.line("return true;");
        self.w.close("}");
        self.w.blank();

        if layout.direct && emit.is_returned(ty) {
            self.open_fn(format!(
                "static JSC::JSValue {}ToJS(JSC::JSGlobalObject* global, const Bindgen::Abi::{}& value)",
                name, def.name
            ));
            self.w.line("auto& vm = JSC::getVM(global);");
            self.w.line("JSC::JSObject* object = JSC::constructEmptyObject(global);");
            for (field, slot) in fields.iter().zip(&layout.slots) {
                let converted = match slot.value {
                    Some(index) => {
                        self.to_js(field.ty, &format!("value.{}", cpp_identifier(&def.fields[index].name)))
                    }
                    None => "JSC::jsUndefined()".to_string(),
                };
                self.w.line(format!(
                    "object->putDirect(vm, JSC::Identifier::fromString(vm, {}_s), {});",
                    cpp_string(&field.key),
                    converted
                ));
            }
            self.w.line("return object;");
            self.w.close("}");
            self.w.blank();
        }
    }

    fn default_literal(&self, ty: TypeId, value: &DefaultValue) -> String {
        let kind = self.emit.session.types.kind(ty);
        match (kind, value) {
            (_, DefaultValue::Bool(flag)) => flag.to_string(),
            (TypeKind::StringEnum(values), DefaultValue::String(text)) => values
                .iter()
                .position(|value| value == text)
                .unwrap_or_default()
                .to_string(),
            (_, DefaultValue::String(text)) => {
                format!("Bindgen::BoxedString::fromLiteral({})", cpp_string(text))
            }
            (kind, number) => number_literal(kind, number),
        }
    }

    /// Opens the branches for a value that may be missing and leaves the writer inside the
    /// branch where it is present. Returns `false` when no branch was opened.
    fn open_presence(
        &mut self,
        ty: TypeId,
        src: &str,
        value: Option<&str>,
        is_set: Option<&str>,
        missing: Option<&str>,
        fail: &str,
    ) -> bool {
        let flags = self.emit.session.types.flags(ty).clone();
        if let Some(default) = &flags.default {
            self.w.open(format!("if ({}.isUndefined()) {{", src));
            if let Some(is_set) = is_set {
                self.w.line(format!("{} = true;", is_set));
            }
            if let Some(value) = value {
                let literal = self.default_literal(ty, default);
                self.w.line(format!("{} = {};", value, literal));
            }
            if let (Some(is_set), true) = (is_set, flags.nullable) {
                self.w.middle(format!("}} else if ({}.isNull()) {{", src));
                self.w.line(format!("{} = false;", is_set));
            }
            self.w.middle("} else {");
            if let Some(is_set) = is_set {
                self.w.line(format!("{} = true;", is_set));
            }
            return true;
        }
        if let Some(is_set) = is_set {
            let absent = if flags.nullable { "isUndefinedOrNull" } else { "isUndefined" };
            self.w.open(format!("if ({}.{}()) {{", src, absent));
            self.w.line(format!("{} = false;", is_set));
            self.w.middle("} else {");
            self.w.line(format!("{} = true;", is_set));
            return true;
        }
        if let Some(missing) = missing {
            self.w.open(format!("if ({}.isUndefined()) {{", src));
            self.throw_type_error(missing, fail);
            self.w.close("}");
        }
        false
    }

    /// Converts the host value `src` into the ABI lvalue `dst`.
    fn convert_value(&mut self, ty: TypeId, src: &str, dst: &str, fail: &str) {
        let checked = |converter: &str| format!("{} = {}(global, {});", dst, converter, src);
        let kind = self.emit.session.types.kind(ty);
        let line = match kind {
            TypeKind::Boolean => format!("{} = {}.toBoolean(global);", dst, src),
            TypeKind::StrictBoolean => {
                self.w.open(format!("if (!{}.isBoolean()) {{", src));
                self.throw_type_error("Expected a boolean", fail);
                self.w.close("}");
                self.w.line(format!("{} = {}.asBoolean();", dst, src));
                return;
            }
            TypeKind::F64 => format!(
                "{} = WebCore::convert<WebCore::IDLUnrestrictedDouble>(*global, {});",
                dst, src
            ),
            TypeKind::Usize => checked("Bindgen::toSize"),
            TypeKind::DomString => checked("Bindgen::toDOMString"),
            TypeKind::ByteString => checked("Bindgen::toByteString"),
            TypeKind::UsvString => checked("Bindgen::toUSVString"),
            TypeKind::Utf8String => checked("Bindgen::toUTF8String"),
            TypeKind::Any => {
                self.w.line(format!("{} = JSC::JSValue::encode({});", dst, src));
                return;
            }
            TypeKind::Undefined => return,
            TypeKind::StringEnum(_) | TypeKind::NativeEnum(_) | TypeKind::Dictionary(_) => {
                let converter = self.qualified_fn(ty, "convert", "");
                self.bail_unless(&format!("{}(global, {}, &{})", converter, src, dst), fail);
                return;
            }
            TypeKind::Sequence(_)
            | TypeKind::Record(_)
            | TypeKind::OneOf(_)
            | TypeKind::GlobalObject
            | TypeKind::VirtualMachine
            | TypeKind::Ref(_) => unreachable!("{} has no direct conversion", kind.tag()),
        };
        self.w.line(line);
        self.w.line(format!("RETURN_IF_EXCEPTION(scope, {});", fail));
    }

    fn to_js(&self, ty: TypeId, expr: &str) -> String {
        match self.emit.session.types.kind(ty) {
            TypeKind::Boolean | TypeKind::StrictBoolean => format!("JSC::jsBoolean({})", expr),
            TypeKind::F64 => format!("JSC::jsNumber({})", expr),
            TypeKind::Usize => format!("JSC::jsNumber(static_cast<double>({}))", expr),
            TypeKind::DomString | TypeKind::ByteString | TypeKind::UsvString | TypeKind::Utf8String => {
                format!("Bindgen::toJS(global, {})", expr)
            }
            TypeKind::Any => format!("JSC::JSValue::decode({})", expr),
            TypeKind::Undefined => "JSC::jsUndefined()".to_string(),
            TypeKind::StringEnum(_) | TypeKind::NativeEnum(_) | TypeKind::Dictionary(_) => {
                format!("{}(global, {})", self.qualified_fn(ty, "", "ToJS"), expr)
            }
            kind @ (TypeKind::Sequence(_)
            | TypeKind::Record(_)
            | TypeKind::OneOf(_)
            | TypeKind::GlobalObject
            | TypeKind::VirtualMachine
            | TypeKind::Ref(_)) => unreachable!("{} is never returned", kind.tag()),
        }
    }

    fn dispatcher(&mut self, file: FileId, id: FuncId, func: &Func, index: usize) {
        let emit = self.emit;
        let (variant, resolved) = emit.variant(id, index);
        let symbol = emit.dispatch_symbol(file, func, index);
        self.open_fn(format!(
            "static JSC::EncodedJSValue dispatch{}{}(JSC::JSGlobalObject* global, JSC::CallFrame* callFrame)",
            pascal_case(func.display_name()),
            index
        ));
        self.throw_scope();
        if resolved.min_args > 0 {
            self.w.open(format!("if (callFrame->argumentCount() < {}) {{", resolved.min_args));
            self.w.line("throwVMError(global, scope, JSC::createNotEnoughArgumentsError(global));");
            self.w.line("return {};");
            self.w.close("}");
        }
        if let Some(comm) = resolved.comm {
            self.w.line(format!("Bindgen::Abi::{} comm {{}};", emit.struct_name(comm)));
        }

        let mut call = vec!["global".to_string()];
        let mut position = 0;
        for (arg, lowering) in variant.args.iter().zip(&resolved.args) {
            match lowering {
                ArgLowering::Context(CAbiType::VirtualMachine) => {
                    call.push("&vm".to_string());
                    continue;
                }
                ArgLowering::Context(_) => continue,
                _ => {}
            }
            let src = format!("arg{}", position);
            position += 1;
            let ident = arg_ident(&arg.name);
            match lowering {
                ArgLowering::Unit | ArgLowering::Context(_) => {}
                ArgLowering::ByValue(abi) | ArgLowering::ByPointer(abi) => {
                    self.w.line(format!("JSC::JSValue {} = callFrame->argument({});", src, position - 1));
                    let local = format!("{}Value", ident);
                    self.w.line(format!("{} {} {{}};", cpp_abi(emit, abi), local));
                    let opened = self.open_presence(arg.ty, &src, Some(local.as_str()), None, None, "{}");
                    self.convert_value(arg.ty, &src, &local, "{}");
                    if opened {
                        self.w.close("}");
                    }
                    call.push(match lowering {
                        ArgLowering::ByPointer(_) => format!("&{}", local),
                        _ => local,
                    });
                }
                ArgLowering::Comm(slot) => {
                    self.w.line(format!("JSC::JSValue {} = callFrame->argument({});", src, position - 1));
                    self.comm_arg(arg.ty, &ident, slot, &src);
                }
            }
        }
        if resolved.comm.is_some() {
            call.push("&comm".to_string());
        }

        let label = format!("{} variant {}", func.display_name(), index);
        let debug_check = |cpp: &mut Self| {
            if emit.debug {
                cpp.w.line(format!(
                    "ASSERT_WITH_MESSAGE(!scope.exception(), \"{} succeeded with a pending exception\");",
                    label
                ));
            }
        };
        match &resolved.ret {
            ReturnStrategy::Void => {
                self.bail_unless(&format!("{}({})", symbol, call.join(", ")), "{}");
                debug_check(self);
                self.w.line("return JSC::JSValue::encode(JSC::jsUndefined());");
            }
            ReturnStrategy::JsValue => {
                self.w.line(format!("JSC::EncodedJSValue result = {}({});", symbol, call.join(", ")));
                if emit.debug {
                    self.w.line(format!(
                        "ASSERT_WITH_MESSAGE(!result || !scope.exception(), \"{} succeeded with a pending exception\");",
                        label
                    ));
                }
                self.w.line("return result;");
            }
            ReturnStrategy::OutParam(abi) => {
                self.w.line(format!("{} result {{}};", cpp_abi(emit, abi)));
                call.push("&result".to_string());
                self.bail_unless(&format!("{}({})", symbol, call.join(", ")), "{}");
                debug_check(self);
                let converted = self.to_js(variant.ret, "result");
                self.w.line(format!("return JSC::JSValue::encode({});", converted));
            }
        }
        self.w.close("}");
        self.w.blank();
    }

    fn comm_arg(&mut self, ty: TypeId, ident: &str, slot: &CommSlot, src: &str) {
        let emit = self.emit;
        let field = |name: &str| format!("comm.{}", cpp_identifier(name));
        match slot {
            CommSlot::Value { is_set, value, .. } => {
                let value = value.as_deref().map(field);
                let is_set = is_set.as_deref().map(field);
                let opened = self.open_presence(ty, src, value.as_deref(), is_set.as_deref(), None, "{}");
                if let Some(value) = &value {
                    self.convert_value(ty, src, value, "{}");
                }
                if opened {
                    self.w.close("}");
                }
            }
            CommSlot::Sequence {
                is_set,
                ptr,
                len,
                element,
            } => {
                let TypeKind::Sequence(element_ty) = *emit.session.types.kind(ty) else {
                    unreachable!("sequence slot for a non-sequence");
                };
                let element_cpp = cpp_abi(emit, element);
                let storage = format!("{}Storage", ident);
                self.w.line(format!("Bindgen::Vector<{}> {};", element_cpp, storage));
                let is_set = is_set.as_deref().map(field);
                let opened = self.open_presence(ty, src, None, is_set.as_deref(), None, "{}");
                self.w.open(format!(
                    "bool {}Converted = Bindgen::convertSequence(global, {}, {}, [&](JSC::JSValue item, {}& slot) -> bool {{",
                    ident, src, storage, element_cpp
                ));
                self.convert_value(element_ty, "item", "slot", "false");
                self.w.line("return true;");
                self.w.close("});");
                self.bail_unless(&format!("{}Converted", ident), "{}");
                self.w.line(format!("{} = {}.data();", field(ptr), storage));
                self.w.line(format!("{} = {}.size();", field(len), storage));
                if opened {
                    self.w.close("}");
                }
            }
            CommSlot::Record {
                is_set,
                keys,
                values,
                len,
                value,
            } => {
                let TypeKind::Record(value_ty) = *emit.session.types.kind(ty) else {
                    unreachable!("record slot for a non-record");
                };
                let value_cpp = cpp_abi(emit, value);
                let key_storage = format!("{}Keys", ident);
                let value_storage = format!("{}Values", ident);
                self.w.line(format!("Bindgen::Vector<Bindgen::BoxedString> {};", key_storage));
                self.w.line(format!("Bindgen::Vector<{}> {};", value_cpp, value_storage));
                let is_set = is_set.as_deref().map(field);
                let opened = self.open_presence(ty, src, None, is_set.as_deref(), None, "{}");
                self.w.open(format!(
                    "bool {}Converted = Bindgen::convertRecord(global, {}, {}, {}, [&](JSC::JSValue item, {}& slot) -> bool {{",
                    ident, src, key_storage, value_storage, value_cpp
                ));
                self.convert_value(value_ty, "item", "slot", "false");
                self.w.line("return true;");
                self.w.close("});");
                self.bail_unless(&format!("{}Converted", ident), "{}");
                self.w.line(format!("{} = {}.data();", field(keys), key_storage));
                self.w.line(format!("{} = {}.data();", field(values), value_storage));
                self.w.line(format!("{} = {}.size();", field(len), key_storage));
                if opened {
                    self.w.close("}");
                }
            }
            CommSlot::OneOf {
                is_set, tag, members, ..
            } => {
                let TypeKind::OneOf(member_tys) = emit.session.types.kind(ty).clone() else {
                    unreachable!("union slot for a non-union");
                };
                let is_set = is_set.as_deref().map(field);
                let opened = self.open_presence(ty, src, None, is_set.as_deref(), None, "{}");

                let mut order: Vec<(usize, TypeId, CategorySet)> = member_tys
                    .iter()
                    .enumerate()
                    .map(|(index, member)| (index, *member, categories(emit.session, *member)))
                    .collect();
                order.sort_by_key(|(_, _, set)| std::cmp::Reverse(union_weight(*set)));
                let expected = order
                    .iter()
                    .fold(CategorySet::EMPTY, |all, (_, _, set)| all.union(*set));

                for (position, (index, member, set)) in order.iter().enumerate() {
                    let check = category_check(*set, src);
                    if position == 0 {
                        self.w.open(format!("if ({}) {{", check));
                    } else {
                        self.w.middle(format!("}} else if ({}) {{", check));
                    }
                    self.w.line(format!("{} = {};", field(tag), index));
                    if let Some((name, _)) = &members[*index] {
                        self.convert_value(*member, src, &field(name), "{}");
                    }
                }
                self.w.middle("} else {");
                let names: Vec<String> = expected.iter().map(|category| category.to_string()).collect();
                self.throw_type_error(
                    &format!("Expected {} for {}", names.join(" or "), ident),
                    "{}",
                );
                self.w.close("}");
                if opened {
                    self.w.close("}");
                }
            }
        }
    }

    fn host_function(&mut self, file: FileId, id: FuncId, func: &Func) {
        let emit = self.emit;
        let resolved = emit.resolution.func(id);
        let pascal = pascal_case(func.display_name());
        self.open_fn(format!(
            "JSC_DEFINE_HOST_FUNCTION({}, (JSC::JSGlobalObject* global, JSC::CallFrame* callFrame))",
            emit.host_symbol(file, func)
        ));
        match &resolved.dispatch {
            None => self.w.line(format!("return dispatch{}0(global, callFrame);", pascal)),
            Some(plan) => {
                self.throw_scope();
                self.w.line("size_t argumentCount = callFrame->argumentCount();");
                for bucket in &plan.buckets {
                    if bucket.min_args == 0 {
                        self.w.open("{");
                    } else {
                        self.w.open(format!("if (argumentCount >= {}) {{", bucket.min_args));
                    }
                    self.dispatch_node(&bucket.node, &pascal);
                    self.w.close("}");
                }
                self.throw_type_error(
                    &format!("No overload of {} matches the given arguments", func.display_name()),
                    "{}",
                );
            }
        }
        self.w.close("}");
        self.w.blank();
    }

    fn dispatch_node(&mut self, node: &DispatchNode, pascal: &str) {
        match node {
            DispatchNode::Call(index) => {
                self.w.line(format!("return dispatch{}{}(global, callFrame);", pascal, index))
            }
            DispatchNode::Branch { position, arms } => {
                let src = format!("arg{}", position);
                self.w.line(format!("JSC::JSValue {} = callFrame->argument({});", src, position));
                for arm in arms {
                    self.w.open(format!("if ({}) {{", category_check(arm.categories, &src)));
                    self.dispatch_node(&arm.node, pascal);
                    self.w.close("}");
                }
            }
        }
    }
}

/// Heaviest category first; `any` members go last so they act as the fallback.
fn union_weight(set: CategorySet) -> Option<Category> {
    if set == CategorySet::ALL {
        None
    } else {
        set.iter().next()
    }
}

fn category_check(set: CategorySet, src: &str) -> String {
    if set == CategorySet::ALL {
        return "true".to_string();
    }
    let checks: Vec<String> = set
        .iter()
        .map(|category| {
            let predicate = match category {
                Category::Boolean => "isBoolean",
                Category::Unit => "isUndefinedOrNull",
                Category::Number => "isNumber",
                Category::String => "isString",
                Category::Object => "isObject",
            };
            format!("{}.{}()", src, predicate)
        })
        .collect();
    checks.join(" || ")
}

/// Identifier-safe enum member name.
pub(crate) fn enum_member(value: &str) -> String {
    identifier(&pascal_case(value))
}
