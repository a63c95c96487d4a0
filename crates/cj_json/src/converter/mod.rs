//! Pluggable converters that take over reading and writing of a value.
//!
//! A converter is looked up, in order, on the member, on the containing
//! collection, on the type, in [`SerializerSettings::converters`] and finally
//! in the resolver's built-in list. The first one found that can read (or
//! write) wins and the contract driven traversal is skipped for that value.
//!
//! [`SerializerSettings::converters`]: crate::settings::SerializerSettings::converters

// -----------------------------------------------------------------------------
// Modules

mod key_value_pair;
mod unix_date;

// -----------------------------------------------------------------------------
// Exports

pub use key_value_pair::KeyValuePairConverter;
pub use unix_date::UnixDateTimeConverter;

// -----------------------------------------------------------------------------
// Imports

use cj_reflect::{Type, Value};

use crate::JsonError;
use crate::de::SerializerReader;
use crate::ser::SerializerWriter;
use crate::token::{JsonRead, JsonWrite};

// -----------------------------------------------------------------------------
// JsonConverter

/// Reads and writes values of the types it accepts.
///
/// `write_json` receives the value to write; nested values can be handed back
/// to the engine with [`SerializerWriter::serialize_value`]. `read_json` is
/// called with the reader positioned on the first token of the value and must
/// leave it on the last one; nested values are read with
/// [`SerializerReader::deserialize_value`].
pub trait JsonConverter: Send + Sync {
    /// Returns `true` if the converter handles values of `ty`.
    fn can_convert(&self, ty: &Type) -> bool;

    fn can_read(&self) -> bool {
        true
    }

    fn can_write(&self) -> bool {
        true
    }

    fn write_json(
        &self,
        writer: &mut dyn JsonWrite,
        value: &Value,
        serializer: &mut SerializerWriter<'_>,
    ) -> Result<(), JsonError>;

    /// `existing` is the current member value when the member is populated
    /// rather than replaced.
    fn read_json(
        &self,
        reader: &mut dyn JsonRead,
        ty: &Type,
        existing: Option<Value>,
        serializer: &mut SerializerReader<'_>,
    ) -> Result<Value, JsonError>;
}
