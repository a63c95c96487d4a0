#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

// -----------------------------------------------------------------------------
// Extern Self

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

mod error;
mod internal;
mod serializer;

pub mod attributes;
pub mod binder;
pub mod contract;
pub mod converter;
pub mod de;
pub mod metadata;
pub mod naming;
pub mod references;
pub mod resolver;
pub mod ser;
pub mod settings;
pub mod token;

#[cfg(test)]
mod tests;

// -----------------------------------------------------------------------------
// Top-Level exports

pub use error::{ContractError, JsonError, JsonErrorKind};
pub use serializer::JsonSerializer;
pub use settings::SerializerSettings;
