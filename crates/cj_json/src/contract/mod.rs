//! Contracts: how values of one type are read and written.
//!
//! A [`Contract`] is resolved once per type by the
//! [`ContractResolver`](crate::resolver::ContractResolver) and shared by every
//! call afterwards. Its kind decides which path of the engines handles the
//! value; the kind specific data lives in [`ContractDetails`].

// -----------------------------------------------------------------------------
// Modules

mod property;

// -----------------------------------------------------------------------------
// Exports

pub use property::{Predicate, Property, PropertyCollection, SpecifiedSetter};

// -----------------------------------------------------------------------------
// Imports

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use std::sync::OnceLock;

use cj_reflect::info::{
    ConstructorFn, Convertible, EnumerableCapability, Invocation, MethodDef, NativeSerializable,
    StringConversion,
};
use cj_reflect::{
    BoxedError, ErrorContext, Obj, PrimitiveType, ReflectError, StreamingContext, Type,
    TypeHandle, Value,
};

use crate::ContractError;
use crate::converter::JsonConverter;
use crate::resolver::ContractResolver;
use crate::settings::{
    MemberSerialization, MissingMemberHandling, NullValueHandling, ReferenceLoopHandling,
    Required, TypeNameHandling,
};

// -----------------------------------------------------------------------------
// Callbacks

/// An `OnSerializing`, `OnSerialized`, `OnDeserializing` or
/// `OnDeserialized` callback.
pub type SerializationCallback =
    Arc<dyn Fn(&Obj, &StreamingContext) -> Result<(), BoxedError> + Send + Sync>;

/// An `OnError` callback.
pub type ErrorCallback =
    Arc<dyn Fn(&Obj, &StreamingContext, &mut ErrorContext) -> Result<(), BoxedError> + Send + Sync>;

/// Wraps a callback method of a type.
pub fn serialization_callback(method: &MethodDef) -> SerializationCallback {
    let body = method.body();
    Arc::new(move |obj, context| {
        body(obj, &mut Invocation::with_context(context)).map(drop)
    })
}

/// Wraps an error callback method of a type.
pub fn error_callback(method: &MethodDef) -> ErrorCallback {
    let body = method.body();
    Arc::new(move |obj, context, error| {
        let mut invocation = Invocation {
            context: Some(context),
            error: Some(error),
            args: Vec::new(),
        };
        body(obj, &mut invocation).map(drop)
    })
}

// -----------------------------------------------------------------------------
// Creator

/// Creates an instance without arguments.
#[derive(Clone)]
pub struct Creator {
    ty: TypeHandle,
    /// `None` allocates the instance without running a constructor.
    body: Option<ConstructorFn>,
}

impl Creator {
    #[inline]
    pub fn new(ty: TypeHandle, body: ConstructorFn) -> Self {
        Self { ty, body: Some(body) }
    }

    /// A creator that allocates with default slot values.
    #[inline]
    pub fn uninitialized(ty: TypeHandle) -> Self {
        Self { ty, body: None }
    }

    #[inline]
    pub fn created_type(&self) -> &TypeHandle {
        &self.ty
    }

    pub fn create(&self) -> Result<Obj, ReflectError> {
        match &self.body {
            Some(body) => body(&self.ty, Vec::new()).map_err(ReflectError::User),
            None => Ok(Obj::new(&self.ty)),
        }
    }
}

impl fmt::Debug for Creator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Creator")
            .field("type", &self.ty)
            .field("allocates", &self.body.is_none())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// ContractKind

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractKind {
    Object,
    Array,
    Dictionary,
    Primitive,
    String,
    Dynamic,
    NativeSerializable,
    LinqToken,
}

// -----------------------------------------------------------------------------
// Object details

/// Reads and writes the properties that match no member.
pub type ExtensionDataGetter =
    Arc<dyn Fn(&Obj) -> Result<Vec<(String, Value)>, BoxedError> + Send + Sync>;

pub type ExtensionDataSetter =
    Arc<dyn Fn(&Obj, &str, Value) -> Result<(), BoxedError> + Send + Sync>;

/// The extension data sink of an object contract.
#[derive(Clone)]
pub struct ExtensionData {
    /// Present when the data is written.
    pub getter: Option<ExtensionDataGetter>,
    /// Present when unmatched properties are collected.
    pub setter: Option<ExtensionDataSetter>,
    /// The value type of the backing dictionary.
    pub value_type: Type,
}

/// Members and creation of an object.
#[derive(Clone)]
pub struct ObjectDetails {
    pub member_serialization: MemberSerialization,
    pub missing_member_handling: Option<MissingMemberHandling>,
    /// Requiredness of properties that declare none.
    pub item_required: Option<Required>,
    pub item_null_value_handling: Option<NullValueHandling>,
    pub properties: PropertyCollection,
    /// Parameters of the override or parameterized creator, in order.
    pub creator_parameters: PropertyCollection,
    /// A marked constructor, used before anything else.
    pub override_creator: Option<ConstructorFn>,
    /// The single public constructor of a type without default constructor.
    pub parameterized_creator: Option<ConstructorFn>,
    pub extension_data: Option<ExtensionData>,
}

impl ObjectDetails {
    /// Returns `true` if presence of properties must be tracked while reading.
    pub fn tracks_presence(&self, populates_defaults: bool) -> bool {
        populates_defaults
            || self.item_required.is_some_and(|r| r != Required::Default)
            || self.properties.iter().any(|p| {
                p.required.is_some_and(|r| r != Required::Default)
                    || p.default_value_handling.is_some_and(|d| d.populates())
            })
    }
}

// -----------------------------------------------------------------------------
// Container details

/// Item settings shared by array and dictionary contracts.
#[derive(Clone)]
pub struct ContainerInfo {
    pub item_type: Type,
    pub item_converter: Option<Arc<dyn JsonConverter>>,
    pub item_is_reference: Option<bool>,
    pub item_reference_loop_handling: Option<ReferenceLoopHandling>,
    pub item_type_name_handling: Option<TypeNameHandling>,
    item_contract: OnceLock<Arc<Contract>>,
}

impl ContainerInfo {
    pub fn new(item_type: Type) -> Self {
        Self {
            item_type,
            item_converter: None,
            item_is_reference: None,
            item_reference_loop_handling: None,
            item_type_name_handling: None,
            item_contract: OnceLock::new(),
        }
    }

    /// The contract of the declared item type, resolved on first use.
    pub fn item_contract(
        &self,
        resolver: &ContractResolver,
    ) -> Result<Arc<Contract>, ContractError> {
        if let Some(contract) = self.item_contract.get() {
            return Ok(contract.clone());
        }
        let contract = resolver.resolve(&self.item_type)?;
        let _ = self.item_contract.set(contract.clone());
        Ok(contract)
    }
}

/// Where the items of an array contract live.
#[derive(Clone)]
pub enum ArrayStorage {
    List { fixed_size: bool, read_only: bool },
    /// A multidimensional array.
    Grid { rank: usize },
    Enumerable(EnumerableCapability),
    /// Marked as an array without a collection capability.
    Unsupported,
}

#[derive(Clone)]
pub struct ArrayDetails {
    pub container: ContainerInfo,
    pub storage: ArrayStorage,
}

impl ArrayDetails {
    /// Returns `true` if the array is read into a temporary list and
    /// created from it at the end.
    pub fn uses_surrogate(&self) -> bool {
        match &self.storage {
            ArrayStorage::List {
                fixed_size,
                read_only,
            } => *fixed_size || *read_only,
            ArrayStorage::Grid { .. } | ArrayStorage::Enumerable(_) => true,
            ArrayStorage::Unsupported => false,
        }
    }
}

#[derive(Clone)]
pub struct DictionaryDetails {
    /// The value settings.
    pub container: ContainerInfo,
    pub key_type: Type,
    pub read_only: bool,
    key_contract: OnceLock<Arc<Contract>>,
}

impl DictionaryDetails {
    pub fn new(key_type: Type, value_type: Type, read_only: bool) -> Self {
        Self {
            container: ContainerInfo::new(value_type),
            key_type,
            read_only,
            key_contract: OnceLock::new(),
        }
    }

    pub fn key_contract(
        &self,
        resolver: &ContractResolver,
    ) -> Result<Arc<Contract>, ContractError> {
        if let Some(contract) = self.key_contract.get() {
            return Ok(contract.clone());
        }
        let contract = resolver.resolve(&self.key_type)?;
        let _ = self.key_contract.set(contract.clone());
        Ok(contract)
    }
}

#[derive(Clone)]
pub struct PrimitiveDetails {
    pub primitive: PrimitiveType,
    /// Set for defined types coerced to `primitive`.
    pub convertible: Option<Convertible>,
}

// -----------------------------------------------------------------------------
// ContractDetails

#[derive(Clone)]
pub enum ContractDetails {
    Object(ObjectDetails),
    Array(ArrayDetails),
    Dictionary(DictionaryDetails),
    Primitive(PrimitiveDetails),
    String(StringConversion),
    Dynamic { properties: PropertyCollection },
    NativeSerializable(NativeSerializable),
    LinqToken,
}

// -----------------------------------------------------------------------------
// Contract

/// How values of one type are read and written.
#[derive(Clone)]
pub struct Contract {
    pub underlying_type: Type,
    /// The type instantiated when reading; differs for interfaces and
    /// abstract types.
    pub created_type: Type,
    pub is_nullable: bool,
    /// A converter declared on the type.
    pub converter: Option<Arc<dyn JsonConverter>>,
    /// A built-in converter, used after every other converter.
    pub internal_converter: Option<Arc<dyn JsonConverter>>,
    pub is_reference: Option<bool>,
    pub on_serializing: Vec<SerializationCallback>,
    pub on_serialized: Vec<SerializationCallback>,
    pub on_deserializing: Vec<SerializationCallback>,
    pub on_deserialized: Vec<SerializationCallback>,
    pub on_error: Vec<ErrorCallback>,
    pub default_creator: Option<Creator>,
    pub default_creator_non_public: bool,
    pub details: ContractDetails,
}

impl Contract {
    /// A contract without converters, callbacks or creator.
    pub fn new(underlying_type: Type, details: ContractDetails) -> Self {
        Self {
            is_nullable: underlying_type.is_nullable(),
            created_type: underlying_type.clone(),
            underlying_type,
            converter: None,
            internal_converter: None,
            is_reference: None,
            on_serializing: Vec::new(),
            on_serialized: Vec::new(),
            on_deserializing: Vec::new(),
            on_deserialized: Vec::new(),
            on_error: Vec::new(),
            default_creator: None,
            default_creator_non_public: false,
            details,
        }
    }

    pub fn kind(&self) -> ContractKind {
        match &self.details {
            ContractDetails::Object(_) => ContractKind::Object,
            ContractDetails::Array(_) => ContractKind::Array,
            ContractDetails::Dictionary(_) => ContractKind::Dictionary,
            ContractDetails::Primitive(_) => ContractKind::Primitive,
            ContractDetails::String(_) => ContractKind::String,
            ContractDetails::Dynamic { .. } => ContractKind::Dynamic,
            ContractDetails::NativeSerializable(_) => ContractKind::NativeSerializable,
            ContractDetails::LinqToken => ContractKind::LinqToken,
        }
    }

    #[inline]
    pub fn as_object(&self) -> Option<&ObjectDetails> {
        match &self.details {
            ContractDetails::Object(details) => Some(details),
            _ => None,
        }
    }

    #[inline]
    pub fn as_array(&self) -> Option<&ArrayDetails> {
        match &self.details {
            ContractDetails::Array(details) => Some(details),
            _ => None,
        }
    }

    #[inline]
    pub fn as_dictionary(&self) -> Option<&DictionaryDetails> {
        match &self.details {
            ContractDetails::Dictionary(details) => Some(details),
            _ => None,
        }
    }

    /// The item settings of array and dictionary contracts.
    #[inline]
    pub fn container(&self) -> Option<&ContainerInfo> {
        match &self.details {
            ContractDetails::Array(details) => Some(&details.container),
            ContractDetails::Dictionary(details) => Some(&details.container),
            _ => None,
        }
    }

    /// The type name used in error messages.
    #[inline]
    pub fn type_name(&self) -> String {
        self.underlying_type.name()
    }

    pub(crate) fn invoke_on_serializing(
        &self,
        obj: &Obj,
        context: &StreamingContext,
    ) -> Result<(), BoxedError> {
        self.on_serializing.iter().try_for_each(|c| c(obj, context))
    }

    pub(crate) fn invoke_on_serialized(
        &self,
        obj: &Obj,
        context: &StreamingContext,
    ) -> Result<(), BoxedError> {
        self.on_serialized.iter().try_for_each(|c| c(obj, context))
    }

    pub(crate) fn invoke_on_deserializing(
        &self,
        obj: &Obj,
        context: &StreamingContext,
    ) -> Result<(), BoxedError> {
        self.on_deserializing.iter().try_for_each(|c| c(obj, context))
    }

    pub(crate) fn invoke_on_deserialized(
        &self,
        obj: &Obj,
        context: &StreamingContext,
    ) -> Result<(), BoxedError> {
        self.on_deserialized.iter().try_for_each(|c| c(obj, context))
    }

    pub(crate) fn invoke_on_error(
        &self,
        obj: &Obj,
        context: &StreamingContext,
        error: &mut ErrorContext,
    ) -> Result<(), BoxedError> {
        self.on_error.iter().try_for_each(|c| c(obj, context, error))
    }
}

impl fmt::Debug for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contract")
            .field("kind", &self.kind())
            .field("underlying_type", &self.underlying_type)
            .field("created_type", &self.created_type)
            .field("is_reference", &self.is_reference)
            .field("converter", &self.converter.is_some())
            .finish_non_exhaustive()
    }
}
