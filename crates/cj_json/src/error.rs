use alloc::string::String;
use alloc::sync::Arc;
use core::fmt;

use cj_reflect::{BoxedError, ReflectError};
use cj_reflect::info::CallbackRole;
use thiserror::Error;

// -----------------------------------------------------------------------------
// ContractError

/// A type that cannot be described by a contract.
///
/// Raised while a contract is resolved, before any value is read or written.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum ContractError {
    #[error("Invalid attribute. Both '{first}' and '{second}' in type '{type_name}' have '{role:?}'")]
    DuplicateCallback {
        type_name: String,
        role: CallbackRole,
        first: String,
        second: String,
    },

    #[error("Invalid attribute. Method '{method}' in type '{type_name}' has both '{first:?}' and '{second:?}'")]
    MultipleRoles {
        type_name: String,
        method: String,
        first: CallbackRole,
        second: CallbackRole,
    },

    #[error("Virtual method '{method}' of type '{type_name}' cannot be marked with '{role:?}'")]
    VirtualCallback {
        type_name: String,
        method: String,
        role: CallbackRole,
    },

    #[error("Serialization callback '{method}' in type '{type_name}' must return void")]
    CallbackReturnsValue { type_name: String, method: String },

    #[error("Serialization callback '{method}' in type '{type_name}' must have {expected} parameter(s) for '{role:?}'")]
    CallbackSignature {
        type_name: String,
        method: String,
        role: CallbackRole,
        expected: usize,
    },

    #[error("Multiple constructors with the JsonConstructor attribute on type '{0}'")]
    MultipleConstructorAttributes(String),

    #[error("Invalid extension data attribute on '{type_name}'. Member '{member}' type must implement a string keyed dictionary")]
    InvalidExtensionData { type_name: String, member: String },

    #[error("A member with the name '{name}' already exists on '{type_name}'. Use the JsonProperty attribute to specify another name")]
    DuplicateProperty { type_name: String, name: String },
}

// -----------------------------------------------------------------------------
// JsonErrorKind

/// What went wrong while a value was read or written.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum JsonErrorKind {
    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error(transparent)]
    Reflect(#[from] ReflectError),

    #[error("{0}")]
    Syntax(#[from] serde_json::Error),

    #[error("Unexpected token while {context}: {token}")]
    UnexpectedToken { context: &'static str, token: String },

    #[error("Unexpected end when {0}")]
    UnexpectedEnd(&'static str),

    #[error("Additional text found in JSON after finished deserializing")]
    AdditionalContent,

    #[error("No JSON content found and type '{0}' is not nullable")]
    NoContent(String),

    #[error("Self referencing loop detected{} with type '{type_name}'", member_suffix(.member))]
    SelfReferencingLoop {
        member: Option<String>,
        type_name: String,
    },

    #[error("Cannot write a null value for property '{0}'. Property requires a value")]
    NullForRequired(String),

    #[error("Could not resolve reference '{0}'")]
    UnresolvedReference(String),

    #[error("Error reading object reference '{0}'. The id is already in use")]
    DuplicateReference(String),

    #[error("JSON reference {0} property must have a string or null value")]
    InvalidReference(&'static str),

    #[error("Additional content found in JSON reference object. A JSON reference object should only have a $ref property")]
    ReferenceWithProperties,

    #[error("Cannot preserve reference to array or readonly list, or list created from a non-default constructor: {0}")]
    CannotPreserveReference(String),

    #[error("Type specified in JSON '{found}' is not compatible with '{expected}'")]
    IncompatibleType { expected: String, found: String },

    #[error("Type specified in JSON '{0}' was not resolved")]
    UnknownType(String),

    #[error("Error converting value {value} to type '{target}'")]
    Conversion { value: String, target: String },

    #[error("Could not convert string '{key}' to dictionary key type '{target}'")]
    InvalidDictionaryKey { key: String, target: String },

    #[error("Unsupported type '{0}' for a dictionary key")]
    UnsupportedKey(String),

    #[error("Type '{0}' is not enumerable and cannot be written as a JSON array")]
    NotEnumerable(String),

    #[error("Cannot deserialize the current JSON {found} into type '{type_name}' because the type requires a JSON {expected} to deserialize correctly")]
    WrongContainer {
        found: &'static str,
        expected: &'static str,
        type_name: String,
    },

    #[error("Could not find member '{member}' on object of type '{type_name}'")]
    MissingMember { member: String, type_name: String },

    #[error("Required property '{property}' not found in JSON")]
    RequiredMissing { property: String },

    #[error("Required property '{property}' expects a value but got null")]
    RequiredNull { property: String },

    #[error("Required property '{property}' expects a non-null value")]
    DisallowedNull { property: String },

    #[error("Could not create an instance of type '{0}'. Type is an interface or abstract class and cannot be instantiated")]
    NotInstantiable(String),

    #[error("Unable to find a constructor to use for type '{0}'. A class should either have a default constructor, one constructor with arguments or a constructor marked with the JsonConstructor attribute")]
    NoConstructor(String),

    #[error("Cannot create and populate {kind} type '{type_name}'")]
    CannotCreate {
        kind: &'static str,
        type_name: String,
    },

    #[error("Cannot populate JSON {found} onto type '{type_name}'")]
    CannotPopulate {
        found: &'static str,
        type_name: String,
    },

    #[error("Cannot deserialize non-cubical array as multidimensional array")]
    NonCubicalArray,

    #[error("Infinite loop detected from error handling")]
    InfiniteLoop,

    #[error("The reader's maximum depth of {0} has been exceeded")]
    MaxDepth(usize),

    #[error("The operation was cancelled")]
    Cancelled,

    #[error("Invalid JSON writer state: {0}")]
    WriterState(&'static str),

    #[error("{0}")]
    Custom(String),
}

fn member_suffix(member: &Option<String>) -> String {
    match member {
        Some(name) => alloc::format!(" for property '{name}'"),
        None => String::new(),
    }
}

// -----------------------------------------------------------------------------
// JsonError

struct ErrorImpl {
    kind: JsonErrorKind,
    path: String,
}

/// An error raised while reading or writing JSON, with the document path
/// where it happened.
///
/// Cloning is cheap; clones share the same error.
#[derive(Clone)]
pub struct JsonError {
    inner: Arc<ErrorImpl>,
}

impl JsonError {
    pub fn new(kind: impl Into<JsonErrorKind>, path: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ErrorImpl {
                kind: kind.into(),
                path: path.into(),
            }),
        }
    }

    /// An error raised by user code, e.g. a converter.
    pub fn custom(message: impl fmt::Display) -> Self {
        Self::new(JsonErrorKind::Custom(alloc::format!("{message}")), String::new())
    }

    #[inline]
    pub fn kind(&self) -> &JsonErrorKind {
        &self.inner.kind
    }

    /// The path of the element that was processed; empty at the root.
    #[inline]
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// Returns `true` for errors raised because the call was cancelled.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.inner.kind, JsonErrorKind::Cancelled)
    }

    /// Returns `true` for configuration errors of a contract.
    #[inline]
    pub fn is_contract(&self) -> bool {
        matches!(self.inner.kind, JsonErrorKind::Contract(_))
    }

    /// Returns `true` if both handles share the same error.
    #[inline]
    pub(crate) fn is_same(&self, other: &JsonError) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Fills in the path of an error raised without one.
    pub(crate) fn or_path(self, path: impl FnOnce() -> String) -> Self {
        if !self.inner.path.is_empty() {
            return self;
        }
        match Arc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                inner.path = path();
                Self {
                    inner: Arc::new(inner),
                }
            }
            Err(inner) => Self { inner },
        }
    }

    /// Wraps an error raised by user code at `path`.
    #[inline]
    pub(crate) fn user(error: BoxedError, path: impl Into<String>) -> Self {
        Self::new(ReflectError::User(error), path)
    }
}

impl From<ContractError> for JsonError {
    #[inline]
    fn from(value: ContractError) -> Self {
        Self::new(value, String::new())
    }
}

impl fmt::Display for JsonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.kind)?;
        if !self.inner.path.is_empty() {
            write!(f, ", path '{}'", self.inner.path)?;
        }
        f.write_str(".")
    }
}

impl fmt::Debug for JsonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonError")
            .field("kind", &self.inner.kind)
            .field("path", &self.inner.path)
            .finish()
    }
}

impl core::error::Error for JsonError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        core::error::Error::source(&self.inner.kind)
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::{JsonError, JsonErrorKind};

    #[test]
    fn display_appends_path() {
        let err = JsonError::new(
            JsonErrorKind::RequiredMissing {
                property: "Id".into(),
            },
            "items[0]",
        );
        assert_eq!(
            err.to_string(),
            "Required property 'Id' not found in JSON, path 'items[0]'."
        );

        let root = JsonError::new(JsonErrorKind::AdditionalContent, "");
        assert_eq!(
            root.to_string(),
            "Additional text found in JSON after finished deserializing."
        );
    }

    #[test]
    fn self_loop_names_member() {
        let err = JsonError::new(
            JsonErrorKind::SelfReferencingLoop {
                member: Some("Parent".into()),
                type_name: "Tree.Node".into(),
            },
            "Child",
        );
        assert!(err.to_string().contains("for property 'Parent'"));
    }
}
