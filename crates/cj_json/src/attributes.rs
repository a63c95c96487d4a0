//! Serialization markers attached to types, members and parameters.
//!
//! Markers are stored in the [`CustomAttributes`](cj_reflect::info::CustomAttributes)
//! of a definition and read through a [`MetadataProvider`](crate::metadata::MetadataProvider).
//!
//! ```
//! use cj_json::attributes::JsonProperty;
//! use cj_json::settings::Required;
//! use cj_reflect::Type;
//! use cj_reflect::info::MemberDef;
//!
//! let member = MemberDef::property("Id", Type::INTEGER)
//!     .with_attribute(JsonProperty::named("id").order(0).required(Required::Always));
//! assert_eq!(member.get_attribute::<JsonProperty>().unwrap().order, Some(0));
//! ```

use alloc::string::String;
use alloc::sync::Arc;
use core::fmt;

use cj_reflect::Value;

use crate::converter::JsonConverter;
use crate::naming::NamingStrategy;
use crate::settings::{
    DefaultValueHandling, MemberSerialization, MissingMemberHandling, NullValueHandling,
    ObjectCreationHandling, ReferenceLoopHandling, Required, TypeNameHandling,
};

// -----------------------------------------------------------------------------
// Container markers

/// Serializes the type as a JSON object.
#[derive(Clone, Default)]
pub struct JsonObject {
    pub member_serialization: MemberSerialization,
    /// Requiredness of properties that do not declare their own.
    pub item_required: Option<Required>,
    pub item_null_value_handling: Option<NullValueHandling>,
    pub missing_member_handling: Option<MissingMemberHandling>,
    pub is_reference: Option<bool>,
    pub naming: Option<Arc<dyn NamingStrategy>>,
}

impl JsonObject {
    pub fn new(member_serialization: MemberSerialization) -> Self {
        Self {
            member_serialization,
            ..Self::default()
        }
    }

    pub fn item_required(mut self, required: Required) -> Self {
        self.item_required = Some(required);
        self
    }

    pub fn is_reference(mut self, is_reference: bool) -> Self {
        self.is_reference = Some(is_reference);
        self
    }

    pub fn naming(mut self, naming: impl NamingStrategy + 'static) -> Self {
        self.naming = Some(Arc::new(naming));
        self
    }
}

/// Serializes the type as a JSON array.
#[derive(Debug, Clone, Default)]
pub struct JsonArray {
    pub is_reference: Option<bool>,
    pub item_is_reference: Option<bool>,
}

/// Serializes the type as a JSON object of entries.
#[derive(Debug, Clone, Default)]
pub struct JsonDictionary {
    pub is_reference: Option<bool>,
    pub item_is_reference: Option<bool>,
}

/// Data-contract style opt-in: only [`DataMember`]s are serialized.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataContract {
    pub is_reference: bool,
}

/// Marks a type for field based serialization when the resolver honours it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Serializable;

// -----------------------------------------------------------------------------
// Member markers

/// Per-member serialization options.
#[derive(Clone, Default)]
pub struct JsonProperty {
    pub name: Option<String>,
    pub order: Option<i32>,
    pub required: Option<Required>,
    pub null_value_handling: Option<NullValueHandling>,
    pub default_value_handling: Option<DefaultValueHandling>,
    pub reference_loop_handling: Option<ReferenceLoopHandling>,
    pub object_creation_handling: Option<ObjectCreationHandling>,
    pub type_name_handling: Option<TypeNameHandling>,
    pub is_reference: Option<bool>,
    pub item_converter: Option<Arc<dyn JsonConverter>>,
    pub item_is_reference: Option<bool>,
    pub item_reference_loop_handling: Option<ReferenceLoopHandling>,
    pub item_type_name_handling: Option<TypeNameHandling>,
}

impl JsonProperty {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn required(mut self, required: Required) -> Self {
        self.required = Some(required);
        self
    }

    pub fn null_value_handling(mut self, handling: NullValueHandling) -> Self {
        self.null_value_handling = Some(handling);
        self
    }

    pub fn default_value_handling(mut self, handling: DefaultValueHandling) -> Self {
        self.default_value_handling = Some(handling);
        self
    }

    pub fn reference_loop_handling(mut self, handling: ReferenceLoopHandling) -> Self {
        self.reference_loop_handling = Some(handling);
        self
    }

    pub fn object_creation_handling(mut self, handling: ObjectCreationHandling) -> Self {
        self.object_creation_handling = Some(handling);
        self
    }

    pub fn type_name_handling(mut self, handling: TypeNameHandling) -> Self {
        self.type_name_handling = Some(handling);
        self
    }

    pub fn is_reference(mut self, is_reference: bool) -> Self {
        self.is_reference = Some(is_reference);
        self
    }

    pub fn item_converter(mut self, converter: impl JsonConverter + 'static) -> Self {
        self.item_converter = Some(Arc::new(converter));
        self
    }

    pub fn item_is_reference(mut self, is_reference: bool) -> Self {
        self.item_is_reference = Some(is_reference);
        self
    }
}

impl fmt::Debug for JsonProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonProperty")
            .field("name", &self.name)
            .field("order", &self.order)
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

/// Data-contract member marker.
#[derive(Debug, Clone)]
pub struct DataMember {
    pub name: Option<String>,
    pub order: Option<i32>,
    pub is_required: bool,
    pub emit_default_value: bool,
}

impl Default for DataMember {
    fn default() -> Self {
        Self {
            name: None,
            order: None,
            is_required: false,
            emit_default_value: true,
        }
    }
}

/// Never serialize the member.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonIgnore;

/// Never serialize the field.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonSerialized;

/// The member must be present and not `null`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRequired;

/// The value a member holds when it was not set.
#[derive(Debug, Clone, Default)]
pub struct DefaultValue(pub Value);

/// Reads and writes the member or type through a converter.
#[derive(Clone)]
pub struct JsonConverterAttr(pub Arc<dyn JsonConverter>);

impl JsonConverterAttr {
    pub fn new(converter: impl JsonConverter + 'static) -> Self {
        Self(Arc::new(converter))
    }
}

/// Collects properties that do not match a member.
///
/// The member must be a string keyed dictionary.
#[derive(Debug, Clone, Copy)]
pub struct JsonExtensionData {
    pub write_data: bool,
    pub read_data: bool,
}

impl Default for JsonExtensionData {
    fn default() -> Self {
        Self {
            write_data: true,
            read_data: true,
        }
    }
}

/// Marks the constructor used for deserialization.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonConstructor;
