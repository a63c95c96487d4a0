//! Structural capabilities a type may declare.
//!
//! They decide which contract a type resolves to: a type with a dictionary
//! capability is written as a JSON object of entries, a type with a list
//! capability as an array, and so on.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use crate::{BoxedError, Obj, PrimitiveType, StreamingContext, Type, TypeHandle, Value};

/// Produces the items of an enumerable object.
pub type IterateFn = Arc<dyn Fn(&Obj) -> Result<Vec<Value>, BoxedError> + Send + Sync>;

/// Builds an enumerable object from its items.
pub type FromItemsFn =
    Arc<dyn Fn(&TypeHandle, Vec<Value>) -> Result<Obj, BoxedError> + Send + Sync>;

pub type ToStringFn = Arc<dyn Fn(&Value) -> Result<String, BoxedError> + Send + Sync>;

pub type FromStringFn =
    Arc<dyn Fn(&TypeHandle, &str) -> Result<Value, BoxedError> + Send + Sync>;

pub type GetDataFn =
    Arc<dyn Fn(&Obj, &StreamingContext) -> Result<Vec<(String, Value)>, BoxedError> + Send + Sync>;

pub type FromDataFn = Arc<
    dyn Fn(&TypeHandle, Vec<(String, Value)>, &StreamingContext) -> Result<Obj, BoxedError>
        + Send
        + Sync,
>;

pub type ConvertFn = Arc<dyn Fn(&TypeHandle, Value) -> Result<Value, BoxedError> + Send + Sync>;

// -----------------------------------------------------------------------------
// Capabilities

/// Entries stored as [`Content::Dict`](crate::Content::Dict).
#[derive(Debug, Clone)]
pub struct DictionaryCapability {
    pub key: Type,
    pub value: Type,
    pub read_only: bool,
}

/// Items stored as [`Content::List`](crate::Content::List).
#[derive(Debug, Clone)]
pub struct ListCapability {
    pub item: Type,
    /// Arrays cannot grow; they are filled through a surrogate list.
    pub fixed_size: bool,
    /// Read-only wrappers reject population.
    pub read_only: bool,
}

/// Items produced on demand.
#[derive(Clone)]
pub struct EnumerableCapability {
    pub item: Type,
    pub iterate: IterateFn,
    /// Creates the enumerable from deserialized items.
    pub construct: Option<FromItemsFn>,
}

/// A multidimensional array stored as [`Content::Grid`](crate::Content::Grid).
#[derive(Debug, Clone)]
pub struct GridCapability {
    pub item: Type,
    pub rank: usize,
}

/// Conversion to and from a string representation.
#[derive(Clone)]
pub struct StringConversion {
    pub to_string: ToStringFn,
    pub from_string: FromStringFn,
}

/// A type that serializes itself as name/value pairs.
#[derive(Clone)]
pub struct NativeSerializable {
    pub get_data: GetDataFn,
    pub construct: FromDataFn,
}

/// A type that coerces to and from a primitive.
#[derive(Clone)]
pub struct Convertible {
    pub primitive: PrimitiveType,
    pub to_primitive: ConvertFn,
    pub from_primitive: ConvertFn,
}

/// The capabilities of a type, inherited from its base unless overridden.
#[derive(Clone, Default)]
pub struct Capabilities {
    pub dictionary: Option<DictionaryCapability>,
    pub list: Option<ListCapability>,
    pub enumerable: Option<EnumerableCapability>,
    pub grid: Option<GridCapability>,
    pub string_conversion: Option<StringConversion>,
    pub native_serializable: Option<NativeSerializable>,
    /// Members not declared on the type live in [`Content::Bag`](crate::Content::Bag).
    pub dynamic: bool,
    pub convertible: Option<Convertible>,
}

impl Capabilities {
    /// Fills every capability not declared here from `base`.
    pub(crate) fn inherit(&mut self, base: &Capabilities) {
        macro_rules! inherit {
            ($($field:ident),*) => {
                $(
                    if self.$field.is_none() {
                        self.$field = base.$field.clone();
                    }
                )*
            };
        }
        inherit!(
            dictionary,
            list,
            enumerable,
            grid,
            string_conversion,
            native_serializable,
            convertible
        );
        self.dynamic |= base.dynamic;
    }

    /// Returns `true` if the type is any kind of collection.
    pub fn is_collection(&self) -> bool {
        self.dictionary.is_some()
            || self.list.is_some()
            || self.enumerable.is_some()
            || self.grid.is_some()
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("dictionary", &self.dictionary)
            .field("list", &self.list)
            .field("enumerable", &self.enumerable.is_some())
            .field("grid", &self.grid)
            .field("string_conversion", &self.string_conversion.is_some())
            .field("native_serializable", &self.native_serializable.is_some())
            .field("dynamic", &self.dynamic)
            .field("convertible", &self.convertible.as_ref().map(|c| c.primitive))
            .finish()
    }
}
