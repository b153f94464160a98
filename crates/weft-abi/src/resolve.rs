use weft_ir::naming::pascal_case;
use weft_ir::{
    CAbiType, ExternStruct, FileId, Func, FuncId, Origin, Session, TypeId, TypeKind, Variant,
};

use crate::dispatch;
use crate::error::{AbiError, AbiResult};
use crate::lowering::{ArgLowering, CommSlot, Resolution, ResolvedFunc, ResolvedVariant, ReturnStrategy};

/// Marks everything the declared functions and typedefs touch reachable, then lowers every
/// variant and plans dispatch for overloaded functions.
pub fn resolve(session: &mut Session) -> AbiResult<Resolution> {
    mark_all_reachable(session)?;
    // Emitters only read the memo tables.
    let reachable: Vec<TypeId> = session.reachable().collect();
    for ty in reachable {
        session.direct_abi(ty)?;
        session.dictionary_layout(ty)?;
    }

    let ids: Vec<FuncId> = session.funcs().map(|(id, _)| id).collect();
    let mut funcs = Vec::with_capacity(ids.len());
    for id in ids {
        let func = session.func(id).clone();
        funcs.push(resolve_func(session, &func)?);
    }
    log::debug!(
        "resolved {} functions, {} reachable types, {} extern structs",
        funcs.len(),
        session.reachable().count(),
        session.structs.len()
    );
    Ok(Resolution { funcs })
}

fn mark_all_reachable(session: &mut Session) -> AbiResult<()> {
    let files: Vec<(FileId, Vec<(String, TypeId)>, Vec<FuncId>)> = session
        .files()
        .map(|(id, file)| (id, file.typedefs.clone(), file.funcs.clone()))
        .collect();
    for (file, typedefs, funcs) in files {
        for (name, ty) in typedefs {
            session.mark_reachable(ty, &name, file)?;
        }
        for func in funcs {
            let func = session.func(func).clone();
            let prefix = pascal_case(func.display_name());
            for variant in &func.variants {
                for arg in &variant.args {
                    let hint = format!("{}{}", prefix, pascal_case(&arg.name));
                    session.mark_reachable(arg.ty, &hint, file)?;
                }
                session.mark_reachable(variant.ret, &format!("{}Return", prefix), file)?;
            }
        }
    }
    Ok(())
}

fn resolve_func(session: &mut Session, func: &Func) -> AbiResult<ResolvedFunc> {
    let overloaded = func.variants.len() > 1;
    let mut variants = Vec::with_capacity(func.variants.len());
    for (index, variant) in func.variants.iter().enumerate() {
        let namespace = &session.file(func.file).namespace;
        let mut struct_name = format!("{}{}", namespace, pascal_case(func.display_name()));
        if overloaded {
            struct_name.push_str(&index.to_string());
        }
        struct_name.push_str("Arguments");
        variants.push(lower_variant(session, func, variant, struct_name)?);
    }
    let dispatch = if overloaded {
        Some(dispatch::plan(session, func, &variants)?)
    } else {
        None
    };
    let min_args = variants.iter().map(|v| v.min_args).min().unwrap_or(0);
    let max_args = variants.iter().map(|v| v.max_args).max().unwrap_or(0);
    Ok(ResolvedFunc {
        variants,
        dispatch,
        min_args,
        max_args,
    })
}

fn lower_variant(
    session: &mut Session,
    func: &Func,
    variant: &Variant,
    struct_name: String,
) -> AbiResult<ResolvedVariant> {
    let mut comm = ExternStruct::new(struct_name);
    let mut args = Vec::with_capacity(variant.args.len());
    let mut context_args = 0;
    for arg in &variant.args {
        let lowering = lower_arg(session, func, &arg.name, arg.ty, &mut comm)?;
        if let ArgLowering::Context(_) = lowering {
            context_args += 1;
            if context_args > 1 {
                return Err(AbiError::MultipleContextArgs {
                    func: func.display_name().to_string(),
                    origin: func.origin.clone(),
                });
            }
        }
        args.push(lowering);
    }

    if let Some(field) = comm.clashing_field() {
        return Err(AbiError::FieldClash {
            func: func.display_name().to_string(),
            field: field.to_string(),
            origin: func.origin.clone(),
        });
    }
    let comm = if comm.fields.is_empty() {
        None
    } else {
        comm.reorder_for_smallest_size();
        let local = comm.clone();
        let id = session.structs.register(comm);
        let canonical = session.structs.get(id);
        let rename = |name: &str| -> String {
            local
                .field(name)
                .map(|(position, _)| canonical.fields[position].name.clone())
                .unwrap_or_else(|| name.to_string())
        };
        for arg in &mut args {
            if let ArgLowering::Comm(slot) = arg {
                slot.rename(&rename);
            }
        }
        log::trace!("{} uses {}", func.display_name(), canonical.name);
        Some(id)
    };

    let (min_args, max_args) = arg_counts(session, variant);
    Ok(ResolvedVariant {
        args,
        ret: lower_return(session, func, variant.ret)?,
        comm,
        implicit_context: context_args == 0,
        min_args,
        max_args,
    })
}

/// `(min, max)` visible argument counts. Nullable arguments still have to be passed.
pub(crate) fn arg_counts(session: &Session, variant: &Variant) -> (usize, usize) {
    let visible: Vec<TypeId> = variant
        .args
        .iter()
        .map(|arg| arg.ty)
        .filter(|ty| !session.types.kind(*ty).is_virtual())
        .collect();
    let min = visible
        .iter()
        .rposition(|ty| !session.types.flags(*ty).is_optional())
        .map_or(0, |position| position + 1);
    (min, visible.len())
}

fn unsupported(session: &Session, func: &Func, ty: TypeId, context: &str) -> AbiError {
    let node = session.types.get(ty);
    let origin = match &node.origin {
        Origin::Builtin => func.origin.clone(),
        origin => origin.clone(),
    };
    AbiError::Unsupported {
        what: format!("{} `{}`", context, session.types.describe(ty)),
        func: func.display_name().to_string(),
        origin,
    }
}

fn lower_arg(
    session: &mut Session,
    func: &Func,
    name: &str,
    ty: TypeId,
    comm: &mut ExternStruct,
) -> AbiResult<ArgLowering> {
    if session.types.kind(ty).is_virtual() {
        let abi = session.direct_abi(ty)?.unwrap_or(CAbiType::GlobalObject);
        return Ok(ArgLowering::Context(abi));
    }
    let may_be_absent = session.types.flags(ty).may_be_absent();
    let direct = session.direct_abi(ty)?;
    if let (Some(abi), false) = (&direct, may_be_absent) {
        return Ok(match abi {
            CAbiType::Unit => ArgLowering::Unit,
            abi if abi.is_scalar() => ArgLowering::ByValue(abi.clone()),
            abi => ArgLowering::ByPointer(abi.clone()),
        });
    }

    let is_set = if may_be_absent {
        let field = format!("{}Set", name);
        session.structs.push_field(comm, field.clone(), CAbiType::Bool);
        Some(field)
    } else {
        None
    };

    if let Some(abi) = direct {
        let value = if abi.is_zero_sized() {
            None
        } else {
            session.structs.push_field(comm, name, abi.clone());
            Some(name.to_string())
        };
        return Ok(ArgLowering::Comm(CommSlot::Value { is_set, value, abi }));
    }

    let slot = match session.types.kind(ty).clone() {
        TypeKind::Sequence(element) => {
            let element = element_abi(session, func, element, "sequence element")?;
            let ptr = format!("{}Ptr", name);
            let len = format!("{}Len", name);
            session
                .structs
                .push_field(comm, ptr.clone(), CAbiType::Pointer(Box::new(element.clone())));
            session.structs.push_field(comm, len.clone(), CAbiType::Usize);
            CommSlot::Sequence {
                is_set,
                ptr,
                len,
                element,
            }
        }
        TypeKind::Record(value) => {
            let value = element_abi(session, func, value, "record value")?;
            let keys = format!("{}Keys", name);
            let values = format!("{}Values", name);
            let len = format!("{}Len", name);
            session.structs.push_field(
                comm,
                keys.clone(),
                CAbiType::Pointer(Box::new(CAbiType::BoxedString)),
            );
            session
                .structs
                .push_field(comm, values.clone(), CAbiType::Pointer(Box::new(value.clone())));
            session.structs.push_field(comm, len.clone(), CAbiType::Usize);
            CommSlot::Record {
                is_set,
                keys,
                values,
                len,
                value,
            }
        }
        TypeKind::OneOf(members) => {
            let tag = format!("{}Tag", name);
            let tag_abi = CAbiType::discriminant(members.len());
            session.structs.push_field(comm, tag.clone(), tag_abi.clone());
            let mut fields = Vec::with_capacity(members.len());
            for (index, member) in members.iter().enumerate() {
                let abi = element_abi(session, func, *member, "union member")?;
                if abi.is_zero_sized() {
                    fields.push(None);
                    continue;
                }
                let field = format!("{}Option{}", name, index);
                session.structs.push_field(comm, field.clone(), abi.clone());
                fields.push(Some((field, abi)));
            }
            CommSlot::OneOf {
                is_set,
                tag,
                tag_abi,
                members: fields,
            }
        }
        TypeKind::Dictionary(_) => {
            let Some(layout) = session.dictionary_layout(ty)? else {
                return Err(unsupported(session, func, ty, "dictionary argument with unmappable fields"));
            };
            let abi = CAbiType::Struct(layout.struct_id);
            session.structs.push_field(comm, name, abi.clone());
            CommSlot::Value {
                is_set,
                value: Some(name.to_string()),
                abi,
            }
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
        | TypeKind::NativeEnum(_)
        | TypeKind::StringEnum(_)
        | TypeKind::Ref(_) => return Err(unsupported(session, func, ty, "argument")),
    };
    Ok(ArgLowering::Comm(slot))
}

/// Direct tag of a container element. Elements never get their own buffer.
fn element_abi(session: &mut Session, func: &Func, ty: TypeId, context: &str) -> AbiResult<CAbiType> {
    if session.types.flags(ty).may_be_absent() {
        return Err(unsupported(session, func, ty, &format!("nullable {}", context)));
    }
    match session.direct_abi(ty)? {
        Some(abi) => Ok(abi),
        None => Err(unsupported(session, func, ty, context)),
    }
}

fn lower_return(session: &mut Session, func: &Func, ty: TypeId) -> AbiResult<ReturnStrategy> {
    match session.types.kind(ty) {
        TypeKind::Undefined => return Ok(ReturnStrategy::Void),
        TypeKind::Any => return Ok(ReturnStrategy::JsValue),
        TypeKind::GlobalObject | TypeKind::VirtualMachine => {
            return Err(unsupported(session, func, ty, "return type"))
        }
        _ => {}
    }
    if session.types.flags(ty).nullable {
        return Err(unsupported(session, func, ty, "nullable return type"));
    }
    match session.direct_abi(ty)? {
        Some(abi) => Ok(ReturnStrategy::OutParam(abi)),
        None => Err(unsupported(session, func, ty, "return type")),
    }
}
