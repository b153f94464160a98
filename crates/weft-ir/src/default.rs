use std::fmt;

use crate::ty::TypeKind;

pub(crate) enum DefaultCheck {
    Valid,
    Invalid(String),
    /// The kind does not accept defaults at all.
    Unsupported,
}

/// A literal fallback attached with `default(..)`.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    Bool(bool),
    Integer(i64),
    Number(f64),
    String(String),
}

impl DefaultValue {
    /// Checks the value against the shape of `kind`.
    pub(crate) fn check(&self, kind: &TypeKind) -> DefaultCheck {
        let verdict = match (kind, self) {
            (TypeKind::Boolean | TypeKind::StrictBoolean, DefaultValue::Bool(_)) => Ok(()),
            (TypeKind::Boolean | TypeKind::StrictBoolean, _) => Err("expected a boolean".to_string()),
            (TypeKind::F64, DefaultValue::Number(n)) if n.is_finite() => Ok(()),
            (TypeKind::F64, DefaultValue::Integer(_)) => Ok(()),
            (TypeKind::F64, _) => Err("expected a finite number".to_string()),
            (TypeKind::Usize, DefaultValue::Integer(n)) if *n >= 0 => Ok(()),
            (TypeKind::Usize, DefaultValue::Number(n)) if *n >= 0.0 && n.fract() == 0.0 => Ok(()),
            (TypeKind::Usize, _) => Err("expected a non-negative integer".to_string()),
            (
                TypeKind::DomString | TypeKind::ByteString | TypeKind::UsvString | TypeKind::Utf8String,
                DefaultValue::String(_),
            ) => Ok(()),
            (
                TypeKind::DomString | TypeKind::ByteString | TypeKind::UsvString | TypeKind::Utf8String,
                _,
            ) => Err("expected a string".to_string()),
            (TypeKind::StringEnum(values), DefaultValue::String(s)) => {
                if values.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(format!("expected one of {}", values.join(", ")))
                }
            }
            (TypeKind::StringEnum(_), _) => Err("expected one of the enum's strings".to_string()),
            (
                TypeKind::Any
                | TypeKind::Undefined
                | TypeKind::GlobalObject
                | TypeKind::VirtualMachine
                | TypeKind::Sequence(_)
                | TypeKind::Record(_)
                | TypeKind::OneOf(_)
                | TypeKind::Dictionary(_)
                | TypeKind::NativeEnum(_)
                | TypeKind::Ref(_),
                _,
            ) => return DefaultCheck::Unsupported,
        };
        match verdict {
            Ok(()) => DefaultCheck::Valid,
            Err(reason) => DefaultCheck::Invalid(reason),
        }
    }

    /// Numeric view used by emitters for `f64` and `usize` defaults.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DefaultValue::Integer(n) => Some(*n as f64),
            DefaultValue::Number(n) => Some(*n),
            DefaultValue::Bool(_) | DefaultValue::String(_) => None,
        }
    }
}

impl fmt::Display for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Bool(b) => write!(f, "{}", b),
            DefaultValue::Integer(n) => write!(f, "{}", n),
            DefaultValue::Number(n) => write!(f, "{:?}", n),
            DefaultValue::String(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<bool> for DefaultValue {
    fn from(value: bool) -> Self {
        DefaultValue::Bool(value)
    }
}

impl From<i64> for DefaultValue {
    fn from(value: i64) -> Self {
        DefaultValue::Integer(value)
    }
}

impl From<f64> for DefaultValue {
    fn from(value: f64) -> Self {
        DefaultValue::Number(value)
    }
}

impl From<&str> for DefaultValue {
    fn from(value: &str) -> Self {
        DefaultValue::String(value.to_string())
    }
}

impl From<String> for DefaultValue {
    fn from(value: String) -> Self {
        DefaultValue::String(value)
    }
}
