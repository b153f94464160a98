//! Evaluates `*.bind.toml` declaration files by driving the `DeclScope` combinators.
//!
//! ```toml
//! [types.Point]
//! dictionary = { x = { type = "f64", required = true }, y = "f64" }
//!
//! [types.Mode]
//! string_enum = ["fast", "slow"]
//!
//! [functions.distance]
//! args = [{ name = "a", type = "Point" }, { name = "b", type = "Point" }]
//! ret = "f64"
//!
//! [[functions.parse.variants]]
//! args = [{ name = "text", type = "DOMString" }]
//! ret = "any"
//! ```
//!
//! Entries are evaluated in document order, so a type can only use typedefs declared above it.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use weft_ir::{Arg, DefaultValue, FileId, Origin, Session, TypeId, TypeKind, Variant};

use crate::config::GeneratorConfig;
use crate::decl::{declare, DeclScope, FnDecl};
use crate::error::{DeclError, DeclResult};
use crate::expr::{self, TypeExpr};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeclDocument {
    #[serde(default)]
    types: IndexMap<String, TypeSpec>,
    #[serde(default)]
    functions: IndexMap<String, FunctionSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TypeSpec {
    Expr(String),
    Table(Box<TypeTable>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct TypeTable {
    #[serde(rename = "type")]
    ty: Option<TypeSpec>,
    sequence: Option<TypeSpec>,
    record: Option<TypeSpec>,
    one_of: Option<Vec<TypeSpec>>,
    dictionary: Option<IndexMap<String, TypeSpec>>,
    string_enum: Option<Vec<String>>,
    native_enum: Option<String>,

    #[serde(default)]
    optional: bool,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    nullable: bool,
    default: Option<toml::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FunctionSpec {
    #[serde(default)]
    args: Option<Vec<ArgSpec>>,
    ret: Option<TypeSpec>,
    #[serde(default)]
    variants: Vec<VariantSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VariantSpec {
    #[serde(default)]
    args: Vec<ArgSpec>,
    ret: Option<TypeSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ArgSpec {
    name: String,
    #[serde(rename = "type")]
    ty: TypeSpec,
}

/// Declares, evaluates and closes one declaration file.
pub fn load_file(
    session: &mut Session,
    source_root: &Path,
    decl_path: &Path,
    config: &GeneratorConfig,
) -> DeclResult<FileId> {
    let mut scope = declare(session, source_root, decl_path, config)?;
    let full_path = source_root.join(decl_path);
    let content = fs::read_to_string(&full_path).map_err(|source| DeclError::Io {
        path: full_path.clone(),
        source,
    })?;
    let document: DeclDocument = toml::from_str(&content).map_err(|err| DeclError::Toml {
        path: decl_path.to_path_buf(),
        message: err.to_string(),
    })?;

    let mut loader = Loader {
        scope: &mut scope,
        path: decl_path,
    };
    loader.evaluate(document)?;
    scope.finish()
}

struct Loader<'a, 's> {
    scope: &'a mut DeclScope<'s>,
    path: &'a Path,
}

impl Loader<'_, '_> {
    fn origin(&self, item: &str) -> Origin {
        Origin::declaration(self.path, item)
    }

    fn at(&mut self, item: &str) {
        let origin = self.origin(item);
        self.scope.set_origin(Some(origin));
    }

    fn evaluate(&mut self, document: DeclDocument) -> DeclResult<()> {
        for (name, spec) in &document.types {
            let item = format!("types.{}", name);
            let ty = self.type_spec(spec, &item)?;
            self.scope.export_type(name, ty)?;
        }
        for (name, spec) in document.functions {
            let item = format!("functions.{}", name);
            let decl = self.function_spec(spec, &item)?;
            self.at(&item);
            let func = self.scope.func(decl)?;
            self.scope.export_fn(func, &name)?;
        }
        self.scope.set_origin(None);
        Ok(())
    }

    fn function_spec(&mut self, spec: FunctionSpec, item: &str) -> DeclResult<FnDecl> {
        if spec.variants.is_empty() {
            let args = self.args(spec.args.unwrap_or_default(), item)?;
            let ret = self.ret(spec.ret.as_ref(), item)?;
            return Ok(FnDecl::single(args, ret));
        }
        if spec.args.is_some() || spec.ret.is_some() {
            return Err(DeclError::InvalidDeclaration {
                reason: "use either `args`/`ret` or `variants`, not both".to_string(),
                origin: self.origin(item),
            });
        }
        let mut variants = Vec::with_capacity(spec.variants.len());
        for (index, variant) in spec.variants.into_iter().enumerate() {
            let item = format!("{}.variants[{}]", item, index);
            let args = self.args(variant.args, &item)?;
            let ret = self.ret(variant.ret.as_ref(), &item)?;
            variants.push(Variant::new(args, ret));
        }
        Ok(FnDecl::overloaded(variants))
    }

    fn args(&mut self, specs: Vec<ArgSpec>, item: &str) -> DeclResult<Vec<Arg>> {
        specs
            .into_iter()
            .map(|spec| {
                let ty = self.type_spec(&spec.ty, &format!("{}.args.{}", item, spec.name))?;
                Ok(Arg::new(spec.name, ty))
            })
            .collect()
    }

    fn ret(&mut self, spec: Option<&TypeSpec>, item: &str) -> DeclResult<TypeId> {
        match spec {
            Some(spec) => self.type_spec(spec, &format!("{}.ret", item)),
            None => Ok(TypeId::UNDEFINED),
        }
    }

    fn type_spec(&mut self, spec: &TypeSpec, item: &str) -> DeclResult<TypeId> {
        match spec {
            TypeSpec::Expr(text) => self.type_expr_text(text, item),
            TypeSpec::Table(table) => self.type_table(table, item),
        }
    }

    fn type_table(&mut self, table: &TypeTable, item: &str) -> DeclResult<TypeId> {
        let shapes = [
            table.ty.is_some(),
            table.sequence.is_some(),
            table.record.is_some(),
            table.one_of.is_some(),
            table.dictionary.is_some(),
            table.string_enum.is_some(),
            table.native_enum.is_some(),
        ];
        if shapes.iter().filter(|present| **present).count() != 1 {
            return Err(DeclError::InvalidDeclaration {
                reason: "a type table needs exactly one of `type`, `sequence`, `record`, `one_of`, \
                         `dictionary`, `string_enum` or `native_enum`"
                    .to_string(),
                origin: self.origin(item),
            });
        }

        let mut ty = if let Some(inner) = &table.ty {
            self.type_spec(inner, item)?
        } else if let Some(element) = &table.sequence {
            let element = self.type_spec(element, &format!("{}.sequence", item))?;
            self.at(item);
            self.scope.sequence(element)
        } else if let Some(value) = &table.record {
            let value = self.type_spec(value, &format!("{}.record", item))?;
            self.at(item);
            self.scope.record(value)
        } else if let Some(members) = &table.one_of {
            let mut resolved = Vec::with_capacity(members.len());
            for (index, member) in members.iter().enumerate() {
                resolved.push(self.type_spec(member, &format!("{}.one_of[{}]", item, index))?);
            }
            self.at(item);
            self.scope.one_of(&resolved)?
        } else if let Some(fields) = &table.dictionary {
            let mut resolved = Vec::with_capacity(fields.len());
            for (key, field) in fields {
                resolved.push((key.as_str(), self.type_spec(field, &format!("{}.{}", item, key))?));
            }
            self.at(item);
            self.scope.dictionary(&resolved)?
        } else if let Some(values) = &table.string_enum {
            let values: Vec<&str> = values.iter().map(String::as_str).collect();
            self.at(item);
            self.scope.string_enum(&values)?
        } else if let Some(locator) = &table.native_enum {
            self.at(item);
            self.scope.native_enum(locator)
        } else {
            unreachable!("exactly one shape key is present")
        };

        if table.nullable {
            ty = self.scope.nullable(ty)?;
        }
        if table.optional {
            ty = self.scope.optional(ty)?;
        }
        if table.required {
            ty = self.scope.required(ty)?;
        }
        if let Some(value) = &table.default {
            let value = self.default_value(value, item)?;
            ty = self.scope.with_default(ty, value)?;
        }
        Ok(ty)
    }

    fn default_value(&self, value: &toml::Value, item: &str) -> DeclResult<DefaultValue> {
        match value {
            toml::Value::Boolean(value) => Ok(DefaultValue::Bool(*value)),
            toml::Value::Integer(value) => Ok(DefaultValue::Integer(*value)),
            toml::Value::Float(value) => Ok(DefaultValue::Number(*value)),
            toml::Value::String(value) => Ok(DefaultValue::String(value.clone())),
            other => Err(DeclError::InvalidDeclaration {
                reason: format!("default must be a boolean, number or string, found {}", other.type_str()),
                origin: self.origin(item),
            }),
        }
    }

    fn type_expr_text(&mut self, text: &str, item: &str) -> DeclResult<TypeId> {
        let parsed = expr::parse(text).map_err(|err| DeclError::InvalidTypeExpr {
            message: err.message,
            origin: self.origin(item),
            src: text.to_string(),
            span: err.span,
        })?;
        self.type_expr(&parsed, text, item)
    }

    fn type_expr(&mut self, parsed: &TypeExpr<'_>, text: &str, item: &str) -> DeclResult<TypeId> {
        match parsed {
            TypeExpr::Nullable(inner) => {
                let inner = self.type_expr(inner, text, item)?;
                self.scope.nullable(inner)
            }
            TypeExpr::Name { name, span } => {
                if let Some(ty) = TypeKind::primitive_from_tag(name) {
                    return Ok(ty);
                }
                if let Some(ty) = self.scope.typedef(name) {
                    return Ok(ty);
                }
                if matches!(*name, "sequence" | "record" | "oneOf" | "ref" | "nativeEnum") {
                    return Err(self.expr_error(format!("`{}` needs type arguments", name), text, *span, item));
                }
                Err(DeclError::UnknownType {
                    name: name.to_string(),
                    origin: self.origin(item),
                })
            }
            TypeExpr::Apply { name, span, args } => match *name {
                "sequence" | "record" => {
                    let [arg] = args.as_slice() else {
                        return Err(self.expr_error(format!("`{}` takes one type", name), text, *span, item));
                    };
                    let arg = self.type_expr(arg, text, item)?;
                    self.at(item);
                    Ok(if *name == "sequence" {
                        self.scope.sequence(arg)
                    } else {
                        self.scope.record(arg)
                    })
                }
                "oneOf" => {
                    let mut members = Vec::with_capacity(args.len());
                    for arg in args {
                        members.push(self.type_expr(arg, text, item)?);
                    }
                    self.at(item);
                    self.scope.one_of(&members)
                }
                "ref" | "nativeEnum" => {
                    let [TypeExpr::Name { name: target, .. }] = args.as_slice() else {
                        return Err(self.expr_error(format!("`{}` takes one name", name), text, *span, item));
                    };
                    self.at(item);
                    Ok(if *name == "ref" {
                        self.scope.reference(target)
                    } else {
                        self.scope.native_enum(target)
                    })
                }
                other => Err(self.expr_error(format!("`{}` is not a generic type", other), text, *span, item)),
            },
        }
    }

    fn expr_error(&self, message: String, text: &str, span: miette::SourceSpan, item: &str) -> DeclError {
        DeclError::InvalidTypeExpr {
            message,
            origin: self.origin(item),
            src: text.to_string(),
            span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_ir::IrError;

    fn load(source: &str) -> (Session, DeclResult<FileId>) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("shapes.bind.toml"), source).unwrap();
        fs::write(dir.path().join("shapes.zig"), "").unwrap();
        let mut session = Session::new();
        let result = load_file(
            &mut session,
            dir.path(),
            Path::new("shapes.bind.toml"),
            &GeneratorConfig::default(),
        );
        (session, result)
    }

    #[test]
    fn loads_types_and_functions_in_document_order() {
        let (session, result) = load(
            r#"
            [types.Point]
            dictionary = { y = { type = "f64", required = true }, x = { type = "f64", default = 0 } }

            [types.Mode]
            string_enum = ["fast", "slow"]

            [functions.distance]
            args = [{ name = "a", type = "Point" }, { name = "mode", type = { type = "Mode", default = "fast" } }]
            ret = "f64"

            [[functions.parse.variants]]
            args = [{ name = "text", type = "DOMString" }]
            ret = "any"

            [[functions.parse.variants]]
            args = [{ name = "values", type = "sequence<f64>?" }]
            "#,
        );
        let file = result.unwrap();
        let file = session.file(file);
        assert_eq!(file.namespace, "Shapes");
        let names: Vec<_> = file.typedefs.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["Point", "Mode"]);

        let point = file.typedefs[0].1;
        let TypeKind::Dictionary(fields) = session.types.kind(point) else {
            panic!("Point is not a dictionary");
        };
        let keys: Vec<_> = fields.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, ["y", "x"]);

        let funcs: Vec<_> = file.funcs.iter().map(|id| session.func(*id)).collect();
        assert_eq!(funcs[0].name.as_deref(), Some("distance"));
        assert_eq!(funcs[0].variants[0].ret, TypeId::F64);
        assert_eq!(funcs[1].variants.len(), 2);
        assert_eq!(funcs[1].variants[1].ret, TypeId::UNDEFINED);
        let values = funcs[1].variants[1].args[0].ty;
        assert!(session.types.flags(values).nullable);
        assert_eq!(
            session.types.get(values).origin,
            Origin::declaration("shapes.bind.toml", "functions.parse.variants[1].args.values")
        );
    }

    #[test]
    fn toml_and_combinators_build_the_same_shapes() {
        let (session, result) = load(
            r#"
            [types.Either]
            one_of = ["f64", "oneOf<DOMString, boolean>"]
            "#,
        );
        let file = session.file(result.unwrap());
        let either = file.typedefs[0].1;
        assert_eq!(
            session.types.kind(either),
            &TypeKind::OneOf(vec![TypeId::F64, TypeId::DOM_STRING, TypeId::BOOLEAN])
        );
    }

    #[test]
    fn unknown_names_are_reported() {
        let (_, result) = load("[functions.f]\nargs = [{ name = \"p\", type = \"Pointt\" }]\n");
        match result {
            Err(DeclError::UnknownType { name, origin }) => {
                assert_eq!(name, "Pointt");
                assert_eq!(origin, Origin::declaration("shapes.bind.toml", "functions.f.args.p"));
            }
            other => panic!("expected UnknownType, got {:?}", other),
        }
    }

    #[test]
    fn malformed_expressions_carry_a_span() {
        let (_, result) = load("[types.T]\ntype = \"sequence<f64, f64>\"\n");
        assert!(matches!(result, Err(DeclError::InvalidTypeExpr { .. })));
    }

    #[test]
    fn conflicting_modifiers_fail() {
        let (_, result) = load("[types.T]\ntype = \"f64\"\nrequired = true\ndefault = 1\n");
        assert!(matches!(result, Err(DeclError::Ir(IrError::FlagConflict { .. }))));
    }

    #[test]
    fn mixing_args_and_variants_fails() {
        let (_, result) = load(
            "[functions.f]\nret = \"f64\"\n[[functions.f.variants]]\nargs = []\n",
        );
        assert!(matches!(result, Err(DeclError::InvalidDeclaration { .. })));
    }

    #[test]
    fn bad_toml_is_a_toml_error() {
        let (_, result) = load("[types.T\n");
        assert!(matches!(result, Err(DeclError::Toml { .. })));
    }
}
