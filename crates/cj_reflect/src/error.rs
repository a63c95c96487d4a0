use alloc::boxed::Box;
use alloc::string::String;

use thiserror::Error;

/// A type-erased error raised by user code: accessors, constructors and callbacks.
pub type BoxedError = Box<dyn core::error::Error + Send + Sync + 'static>;

// -----------------------------------------------------------------------------
// ReflectError

/// Errors raised while operating on the runtime object model.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReflectError {
    #[error("type '{type_name}' has no member named '{member}'")]
    MissingMember { type_name: String, member: String },

    #[error("member '{member}' of type '{type_name}' cannot be read")]
    NotReadable { type_name: String, member: String },

    #[error("member '{member}' of type '{type_name}' cannot be written")]
    NotWritable { type_name: String, member: String },

    #[error("expected a value of type '{expected}', found '{found}'")]
    TypeMismatch { expected: String, found: String },

    #[error("slot {index} is out of range for type '{type_name}'")]
    SlotOutOfRange { type_name: String, index: usize },

    #[error("instance of '{type_name}' does not hold {expected} content")]
    InvalidContent {
        type_name: String,
        expected: &'static str,
    },

    #[error("type '{0}' is already defined")]
    AlreadyDefined(String),

    #[error("type '{0}' has no usable constructor")]
    NoConstructor(String),

    #[error("{0}")]
    User(BoxedError),
}

impl ReflectError {
    /// Wraps an error raised by user code.
    #[inline]
    pub fn user(error: impl Into<BoxedError>) -> Self {
        Self::User(error.into())
    }
}
