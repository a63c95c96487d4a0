use alloc::string::String;
use alloc::sync::Arc;
use core::fmt;
use std::sync::{LazyLock, OnceLock};

use crate::info::{TypeDef, TypeDefBuilder, TypeKind};
use crate::{PrimitiveType, ReflectError, Value};

// -----------------------------------------------------------------------------
// TypeHandle

struct TypeCell {
    name: String,
    def: OnceLock<TypeDef>,
}

static UNDEFINED: LazyLock<TypeDef> =
    LazyLock::new(|| TypeDefBuilder::class("<undefined>").into_def());

/// A shared handle to a [`TypeDef`].
///
/// Handles can be declared before they are defined, which allows a type to
/// refer to itself (directly or through other types) in its members.
/// Two handles are the same type only if they point to the same cell.
#[derive(Clone)]
pub struct TypeHandle(Arc<TypeCell>);

impl TypeHandle {
    /// Declares a type whose definition is supplied later with
    /// [`TypeDefBuilder::define`].
    pub fn declare(name: impl Into<String>) -> Self {
        Self(Arc::new(TypeCell {
            name: name.into(),
            def: OnceLock::new(),
        }))
    }

    pub(crate) fn set_def(&self, def: TypeDef) -> Result<(), ReflectError> {
        self.0
            .def
            .set(def)
            .map_err(|_| ReflectError::AlreadyDefined(self.0.name.clone()))
    }

    /// The full name of the type, e.g. `App.Models.Person`.
    #[inline]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The name without its namespace prefix.
    pub fn short_name(&self) -> &str {
        let name = self.name();
        // Generic arguments may contain dots.
        let head = name.split('<').next().unwrap_or(name);
        match head.rfind('.') {
            Some(idx) => &name[idx + 1..],
            None => name,
        }
    }

    #[inline]
    pub fn is_defined(&self) -> bool {
        self.0.def.get().is_some()
    }

    /// Returns the definition, or an empty class definition if the handle was
    /// declared but never defined.
    #[inline]
    pub fn def(&self) -> &TypeDef {
        self.0.def.get().unwrap_or(&UNDEFINED)
    }

    #[inline]
    pub fn ptr_eq(&self, other: &TypeHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// A stable identity for the lifetime of the handle.
    #[inline]
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    /// Returns the type followed by its base types, most-derived first.
    pub fn chain(&self) -> impl Iterator<Item = &TypeHandle> {
        core::iter::successors(Some(self), |h| h.def().base())
    }

    /// Returns `true` if `self` is `other`, derives from it, or implements it.
    pub fn is_subtype_of(&self, other: &TypeHandle) -> bool {
        self.chain().any(|level| {
            level.ptr_eq(other)
                || level
                    .def()
                    .interfaces()
                    .iter()
                    .any(|i| i.is_subtype_of(other))
        })
    }
}

impl PartialEq for TypeHandle {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for TypeHandle {}

impl fmt::Debug for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHandle({})", self.name())
    }
}

impl fmt::Display for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// -----------------------------------------------------------------------------
// Type

/// A type of the object model.
#[derive(Clone, PartialEq, Eq)]
pub enum Type {
    Primitive(PrimitiveType),
    /// A primitive value type that also accepts `null`.
    Nullable(PrimitiveType),
    /// Accepts any value; the declared type of untyped members.
    Any,
    /// The JSON document model; values pass through as [`Value::Token`].
    Token,
    Def(TypeHandle),
}

/// A hashable identity of a [`Type`], used to cache per-type data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKey {
    Primitive(PrimitiveType),
    Nullable(PrimitiveType),
    Any,
    Token,
    Def(usize),
}

impl Type {
    pub const BOOL: Type = Type::Primitive(PrimitiveType::Bool);
    pub const CHAR: Type = Type::Primitive(PrimitiveType::Char);
    pub const INTEGER: Type = Type::Primitive(PrimitiveType::Integer);
    pub const FLOAT: Type = Type::Primitive(PrimitiveType::Float);
    pub const STRING: Type = Type::Primitive(PrimitiveType::String);
    pub const DATE_TIME: Type = Type::Primitive(PrimitiveType::DateTime);
    pub const BYTES: Type = Type::Primitive(PrimitiveType::Bytes);

    pub fn key(&self) -> TypeKey {
        match self {
            Self::Primitive(p) => TypeKey::Primitive(*p),
            Self::Nullable(p) => TypeKey::Nullable(*p),
            Self::Any => TypeKey::Any,
            Self::Token => TypeKey::Token,
            Self::Def(h) => TypeKey::Def(h.addr()),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Self::Primitive(p) => String::from(p.name()),
            Self::Nullable(p) => alloc::format!("Nullable<{}>", p.name()),
            Self::Any => String::from("Object"),
            Self::Token => String::from("JToken"),
            Self::Def(h) => String::from(h.name()),
        }
    }

    #[inline]
    pub fn as_def(&self) -> Option<&TypeHandle> {
        match self {
            Self::Def(h) => Some(h),
            _ => None,
        }
    }

    /// The primitive kind of primitive and nullable types.
    #[inline]
    pub const fn primitive(&self) -> Option<PrimitiveType> {
        match self {
            Self::Primitive(p) | Self::Nullable(p) => Some(*p),
            _ => None,
        }
    }

    /// Returns `true` if a slot of this type may hold `null`.
    pub fn is_nullable(&self) -> bool {
        match self {
            Self::Primitive(p) => !p.is_value_type(),
            Self::Def(h) => h.def().kind() != TypeKind::Struct,
            Self::Nullable(_) | Self::Any | Self::Token => true,
        }
    }

    /// Returns `true` for the dynamic types `Any` and non-sealed
    /// interfaces/abstract definitions whose runtime type must be recorded
    /// for `TypeNameHandling::Auto`.
    pub fn is_abstract(&self) -> bool {
        match self {
            Self::Any => true,
            Self::Def(h) => matches!(h.def().kind(), TypeKind::Interface | TypeKind::Abstract),
            _ => false,
        }
    }

    /// The value a freshly created slot of this type holds.
    pub fn default_value(&self) -> Value {
        match self {
            Self::Primitive(p) => p.default_value(),
            _ => Value::Null,
        }
    }

    /// Returns `true` if a value of type `other` can be stored in `self`.
    pub fn is_assignable_from(&self, other: &Type) -> bool {
        match (self, other) {
            (Self::Any, _) => true,
            (Self::Nullable(a), Self::Primitive(b) | Self::Nullable(b)) => a == b,
            (Self::Def(a), Self::Def(b)) => b.is_subtype_of(a),
            (a, b) => a == b,
        }
    }

    /// Returns `true` if `value` may be stored in a slot of this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match value {
            Value::Null => self.is_nullable(),
            other => self.is_assignable_from(&other.runtime_type()),
        }
    }
}

impl From<TypeHandle> for Type {
    #[inline]
    fn from(value: TypeHandle) -> Self {
        Self::Def(value)
    }
}

impl From<&TypeHandle> for Type {
    #[inline]
    fn from(value: &TypeHandle) -> Self {
        Self::Def(value.clone())
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use crate::info::TypeDefBuilder;
    use crate::{Type, TypeHandle, Value};

    #[test]
    fn subtype_walks_bases_and_interfaces() {
        let shape = TypeDefBuilder::interface("Geometry.IShape").build();
        let base = TypeDefBuilder::class("Geometry.Base")
            .implements(&shape)
            .build();
        let circle = TypeDefBuilder::class("Geometry.Circle").base(&base).build();

        assert!(circle.is_subtype_of(&base));
        assert!(circle.is_subtype_of(&shape));
        assert!(!base.is_subtype_of(&circle));
        assert!(Type::from(&shape).is_assignable_from(&Type::from(&circle)));
    }

    #[test]
    fn declared_handle_can_be_defined_once() {
        let node = TypeHandle::declare("List.Node");
        assert!(!node.is_defined());
        TypeDefBuilder::class("List.Node").define(&node).unwrap();
        assert!(node.is_defined());
        assert!(TypeDefBuilder::class("List.Node").define(&node).is_err());
        assert_eq!(node.short_name(), "Node");
    }

    #[test]
    fn nullability() {
        assert!(!Type::INTEGER.accepts(&Value::Null));
        assert!(Type::STRING.accepts(&Value::Null));
        assert!(Type::Nullable(crate::PrimitiveType::Integer).accepts(&Value::Integer(1)));
        assert!(Type::Any.accepts(&Value::Bool(true)));
    }
}
