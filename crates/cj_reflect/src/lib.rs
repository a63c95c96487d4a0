#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

// -----------------------------------------------------------------------------
// Extern Self

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

mod context;
mod error;
mod obj;
mod ty;
mod value;

pub mod access;
pub mod builtins;
pub mod info;
pub mod registry;

// -----------------------------------------------------------------------------
// Top-Level exports

pub use context::{ContextState, ErrorContext, StreamingContext};
pub use error::{BoxedError, ReflectError};
pub use obj::{Content, Instance, Obj};
pub use ty::{Type, TypeHandle, TypeKey};
pub use value::{PrimitiveType, Value};
