use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use chrono::{DateTime, Utc};

use crate::{Content, Obj, Type};

// -----------------------------------------------------------------------------
// PrimitiveType

/// The leaf kinds a [`Value`] can hold without an [`Obj`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Bool,
    Char,
    Integer,
    Float,
    String,
    DateTime,
    Bytes,
}

impl PrimitiveType {
    /// Returns the display name of the primitive.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "Boolean",
            Self::Char => "Char",
            Self::Integer => "Int64",
            Self::Float => "Double",
            Self::String => "String",
            Self::DateTime => "DateTime",
            Self::Bytes => "Byte[]",
        }
    }

    /// Returns `true` for primitives with value semantics.
    ///
    /// Strings and byte arrays are reference types and default to `null`.
    #[inline]
    pub const fn is_value_type(self) -> bool {
        !matches!(self, Self::String | Self::Bytes)
    }

    /// The value a freshly created slot of this type holds.
    pub fn default_value(self) -> Value {
        match self {
            Self::Bool => Value::Bool(false),
            Self::Char => Value::Char('\0'),
            Self::Integer => Value::Integer(0),
            Self::Float => Value::Float(0.0),
            Self::DateTime => Value::DateTime(DateTime::<Utc>::default()),
            Self::String | Self::Bytes => Value::Null,
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// -----------------------------------------------------------------------------
// Value

/// A dynamically typed value of the object model.
///
/// `PartialEq` compares objects by identity; use [`Value::deep_eq`] for a
/// structural comparison.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Char(char),
    Integer(i64),
    Float(f64),
    String(String),
    DateTime(DateTime<Utc>),
    Bytes(Vec<u8>),
    /// An untyped JSON document fragment.
    Token(serde_json::Value),
    Object(Obj),
}

impl Value {
    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the primitive kind of a leaf value.
    pub const fn primitive_type(&self) -> Option<PrimitiveType> {
        match self {
            Self::Bool(_) => Some(PrimitiveType::Bool),
            Self::Char(_) => Some(PrimitiveType::Char),
            Self::Integer(_) => Some(PrimitiveType::Integer),
            Self::Float(_) => Some(PrimitiveType::Float),
            Self::String(_) => Some(PrimitiveType::String),
            Self::DateTime(_) => Some(PrimitiveType::DateTime),
            Self::Bytes(_) => Some(PrimitiveType::Bytes),
            Self::Null | Self::Token(_) | Self::Object(_) => None,
        }
    }

    /// Returns the runtime type of the value, `Any` for `null`.
    pub fn runtime_type(&self) -> Type {
        match self {
            Self::Null => Type::Any,
            Self::Token(_) => Type::Token,
            Self::Object(obj) => Type::Def(obj.type_handle()),
            other => match other.primitive_type() {
                Some(p) => Type::Primitive(p),
                None => Type::Any,
            },
        }
    }

    /// A short description used in error messages.
    pub fn kind_name(&self) -> String {
        match self {
            Self::Null => String::from("null"),
            Self::Token(_) => String::from("JToken"),
            Self::Object(obj) => String::from(obj.type_handle().name()),
            other => other
                .primitive_type()
                .map(|p| String::from(p.name()))
                .unwrap_or_default(),
        }
    }

    #[inline]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    #[inline]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub const fn as_obj(&self) -> Option<&Obj> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    #[inline]
    pub fn into_obj(self) -> Option<Obj> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Structural equality: objects are equal when their types are identical
    /// and their slots and content are structurally equal.
    ///
    /// Cyclic graphs are compared up to a nesting depth of 256.
    pub fn deep_eq(&self, other: &Value) -> bool {
        deep_eq_at(self, other, 0)
    }
}

fn deep_eq_at(a: &Value, b: &Value, depth: usize) -> bool {
    const MAX_DEPTH: usize = 256;

    match (a, b) {
        (Value::Object(x), Value::Object(y)) => {
            if x.ptr_eq(y) {
                return true;
            }
            if depth >= MAX_DEPTH || !x.type_handle().ptr_eq(&y.type_handle()) {
                return false;
            }
            let (sx, cx) = x.snapshot();
            let (sy, cy) = y.snapshot();
            let slots_eq = sx.len() == sy.len()
                && sx.iter().zip(sy.iter()).all(|(l, r)| deep_eq_at(l, r, depth + 1));
            slots_eq && content_eq(&cx, &cy, depth + 1)
        }
        _ => a == b,
    }
}

fn content_eq(a: &Content, b: &Content, depth: usize) -> bool {
    let items_eq = |l: &[Value], r: &[Value]| {
        l.len() == r.len() && l.iter().zip(r).all(|(x, y)| deep_eq_at(x, y, depth))
    };
    match (a, b) {
        (Content::None, Content::None) => true,
        (Content::List(l), Content::List(r)) => items_eq(l, r),
        (Content::Grid { dims: dl, items: l }, Content::Grid { dims: dr, items: r }) => {
            dl == dr && items_eq(l, r)
        }
        (Content::Dict(l), Content::Dict(r)) => {
            l.len() == r.len()
                && l.iter().all(|(k, v)| {
                    r.iter()
                        .find(|(rk, _)| deep_eq_at(k, rk, depth))
                        .is_some_and(|(_, rv)| deep_eq_at(v, rv, depth))
                })
        }
        (Content::Bag(l), Content::Bag(r)) => {
            l.len() == r.len()
                && l.iter()
                    .zip(r)
                    .all(|((kl, vl), (kr, vr))| kl == kr && deep_eq_at(vl, vr, depth))
        }
        // Opaque payloads cannot be compared.
        (Content::Native(_), Content::Native(_)) => true,
        _ => false,
    }
}

// -----------------------------------------------------------------------------
// Conversions

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident $(as $cast:ty)?),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                #[inline]
                fn from(value: $ty) -> Self {
                    Self::$variant(value $(as $cast)?)
                }
            }
        )*
    };
}

impl_from_value! {
    bool => Bool,
    char => Char,
    i64 => Integer,
    i32 => Integer as i64,
    u32 => Integer as i64,
    f64 => Float,
    f32 => Float as f64,
    String => String,
    DateTime<Utc> => DateTime,
    Vec<u8> => Bytes,
    serde_json::Value => Token,
    Obj => Object,
}

impl From<&str> for Value {
    #[inline]
    fn from(value: &str) -> Self {
        Self::String(String::from(value))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    #[inline]
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::{PrimitiveType, Value};

    #[test]
    fn defaults_follow_value_semantics() {
        assert_eq!(PrimitiveType::Integer.default_value(), Value::Integer(0));
        assert_eq!(PrimitiveType::Bool.default_value(), Value::Bool(false));
        assert!(PrimitiveType::String.default_value().is_null());
        assert!(!PrimitiveType::Bytes.is_value_type());
    }

    #[test]
    fn conversions() {
        assert_eq!(Value::from(5_i32), Value::Integer(5));
        assert_eq!(Value::from("x"), Value::String("x".into()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::Integer(2).as_f64(), Some(2.0));
        assert_eq!(Value::Bool(true).primitive_type(), Some(PrimitiveType::Bool));
    }
}
