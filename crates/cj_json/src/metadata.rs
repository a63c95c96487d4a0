//! Answers the serialization facts the resolver asks about.

use alloc::sync::Arc;
use core::any::Any;

use cj_reflect::info::{ConstructorDef, CustomAttributes, MemberDef, ParamDef};
use cj_reflect::{TypeHandle, Value};

use crate::attributes::{
    DataContract, DataMember, DefaultValue, JsonArray, JsonConstructor, JsonConverterAttr,
    JsonDictionary, JsonExtensionData, JsonIgnore, JsonObject, JsonProperty, JsonRequired,
    NonSerialized, Serializable,
};
use crate::converter::JsonConverter;

// -----------------------------------------------------------------------------
// Facts

/// The container level markers of a type.
#[derive(Clone, Default)]
pub struct TypeFacts {
    pub object: Option<JsonObject>,
    pub array: Option<JsonArray>,
    pub dictionary: Option<JsonDictionary>,
    pub data_contract: Option<DataContract>,
    pub serializable: bool,
    pub converter: Option<Arc<dyn JsonConverter>>,
}

/// The markers of a member or constructor parameter.
#[derive(Clone, Default)]
pub struct MemberFacts {
    pub property: Option<JsonProperty>,
    pub data_member: Option<DataMember>,
    pub ignore: bool,
    pub non_serialized: bool,
    pub required: bool,
    pub default_value: Option<Value>,
    pub converter: Option<Arc<dyn JsonConverter>>,
    pub extension_data: Option<JsonExtensionData>,
}

impl MemberFacts {
    /// Returns `true` if the member is explicitly marked for serialization.
    #[inline]
    pub fn has_member_attribute(&self) -> bool {
        self.property.is_some() || self.data_member.is_some() || self.required
    }
}

// -----------------------------------------------------------------------------
// MetadataProvider

/// The single source of serialization markers.
///
/// The resolver only asks for facts; where they are declared is up to the
/// implementation.
pub trait MetadataProvider: Send + Sync {
    fn type_facts(&self, ty: &TypeHandle) -> TypeFacts;

    fn member_facts(&self, declaring: &TypeHandle, member: &MemberDef) -> MemberFacts;

    fn parameter_facts(&self, param: &ParamDef) -> MemberFacts;

    /// Returns `true` if the constructor is marked for deserialization.
    fn is_marked_constructor(&self, ctor: &ConstructorDef) -> bool;
}

// -----------------------------------------------------------------------------
// AttributeMetadataProvider

/// Reads markers from custom attributes.
///
/// A type's markers are looked up on the type, then its metadata type, then
/// its bases. A member's markers are looked up on the member, then the
/// same-named member of the metadata type, then the same-named member of
/// implemented interfaces.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeMetadataProvider;

impl AttributeMetadataProvider {
    fn type_attribute<T: Any>(ty: &TypeHandle) -> Option<&T> {
        ty.chain().find_map(|level| {
            let def = level.def();
            def.get_attribute::<T>().or_else(|| {
                def.metadata_type()
                    .and_then(|meta| meta.def().get_attribute::<T>())
            })
        })
    }
}

impl MetadataProvider for AttributeMetadataProvider {
    fn type_facts(&self, ty: &TypeHandle) -> TypeFacts {
        TypeFacts {
            object: Self::type_attribute::<JsonObject>(ty).cloned(),
            array: Self::type_attribute::<JsonArray>(ty).cloned(),
            dictionary: Self::type_attribute::<JsonDictionary>(ty).cloned(),
            data_contract: Self::type_attribute::<DataContract>(ty).copied(),
            serializable: Self::type_attribute::<Serializable>(ty).is_some(),
            converter: Self::type_attribute::<JsonConverterAttr>(ty).map(|c| c.0.clone()),
        }
    }

    fn member_facts(&self, declaring: &TypeHandle, member: &MemberDef) -> MemberFacts {
        collect_facts(&MemberLookup { declaring, member })
    }

    fn parameter_facts(&self, param: &ParamDef) -> MemberFacts {
        collect_facts(&AttributeLookup(param.custom_attributes()))
    }

    fn is_marked_constructor(&self, ctor: &ConstructorDef) -> bool {
        ctor.has_attribute::<JsonConstructor>()
    }
}

// -----------------------------------------------------------------------------
// Lookups

trait Lookup {
    fn find<T: Any>(&self) -> Option<&T>;
}

struct AttributeLookup<'a>(&'a CustomAttributes);

impl Lookup for AttributeLookup<'_> {
    #[inline]
    fn find<T: Any>(&self) -> Option<&T> {
        self.0.get::<T>()
    }
}

struct MemberLookup<'a> {
    declaring: &'a TypeHandle,
    member: &'a MemberDef,
}

impl Lookup for MemberLookup<'_> {
    fn find<T: Any>(&self) -> Option<&T> {
        if let Some(found) = self.member.get_attribute::<T>() {
            return Some(found);
        }
        let name = self.member.name();
        let def = self.declaring.def();
        let shadow = def
            .metadata_type()
            .and_then(|meta| meta.find_member(name))
            .and_then(|m| m.get_attribute::<T>());
        if shadow.is_some() {
            return shadow;
        }
        def.interfaces().iter().find_map(|interface| {
            interface
                .def()
                .members()
                .iter()
                .find(|m| m.name() == name)
                .and_then(|m| m.get_attribute::<T>())
        })
    }
}

fn collect_facts(lookup: &impl Lookup) -> MemberFacts {
    MemberFacts {
        property: lookup.find::<JsonProperty>().cloned(),
        data_member: lookup.find::<DataMember>().cloned(),
        ignore: lookup.find::<JsonIgnore>().is_some(),
        non_serialized: lookup.find::<NonSerialized>().is_some(),
        required: lookup.find::<JsonRequired>().is_some(),
        default_value: lookup.find::<DefaultValue>().map(|d| d.0.clone()),
        converter: lookup.find::<JsonConverterAttr>().map(|c| c.0.clone()),
        extension_data: lookup.find::<JsonExtensionData>().copied(),
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use cj_reflect::Type;
    use cj_reflect::info::{MemberDef, TypeDefBuilder};

    use super::{AttributeMetadataProvider, MetadataProvider};
    use crate::attributes::{JsonIgnore, JsonObject, JsonProperty};
    use crate::settings::MemberSerialization;

    #[test]
    fn shadow_metadata_type_supplies_member_markers() {
        let meta = TypeDefBuilder::class("Shop.OrderMetadata")
            .member(MemberDef::property("Secret", Type::STRING).with_attribute(JsonIgnore))
            .member(MemberDef::property("Total", Type::FLOAT).with_attribute(JsonProperty::named("total")))
            .build();
        let order = TypeDefBuilder::class("Shop.Order")
            .metadata_type(&meta)
            .member(MemberDef::property("Secret", Type::STRING))
            .member(
                MemberDef::property("Total", Type::FLOAT)
                    .with_attribute(JsonProperty::named("sum")),
            )
            .build();

        let provider = AttributeMetadataProvider;
        let members = order.def().members();
        assert!(provider.member_facts(&order, &members[0]).ignore);
        // the member's own marker wins
        let total = provider.member_facts(&order, &members[1]);
        assert_eq!(total.property.unwrap().name.as_deref(), Some("sum"));
    }

    #[test]
    fn container_markers_are_inherited() {
        let base = TypeDefBuilder::class("Zoo.Animal")
            .with_attribute(JsonObject::new(MemberSerialization::OptIn))
            .build();
        let dog = TypeDefBuilder::class("Zoo.Dog").base(&base).build();
        let facts = AttributeMetadataProvider.type_facts(&dog);
        assert_eq!(
            facts.object.unwrap().member_serialization,
            MemberSerialization::OptIn
        );
    }
}
