use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use cj_reflect::info::{Invocation, MemberDef, Visibility};
use cj_reflect::{Type, TypeHandle};

use super::ContractResolver;
use crate::ContractError;
use crate::contract::{Predicate, Property, PropertyCollection, SpecifiedSetter};
use crate::metadata::MemberFacts;
use crate::naming::NamingStrategy;
use crate::settings::{DefaultValueHandling, MemberSerialization, Required};

impl ContractResolver {
    /// The members of `ty` that become properties, base members first.
    pub(super) fn serializable_members<'a>(
        &self,
        ty: &'a TypeHandle,
        member_serialization: MemberSerialization,
    ) -> Vec<(&'a TypeHandle, &'a MemberDef)> {
        let search = self.options.default_members_search;
        let mut members = Vec::new();

        for level in ty.levels() {
            for member in level.def().members() {
                let selected = if member_serialization == MemberSerialization::Fields {
                    member.is_field() && !member.is_static()
                } else {
                    let visible = (!member.is_static() || search.statics)
                        && (member.visibility().is_public() || search.non_public);
                    visible || {
                        let facts = self.metadata.member_facts(level, member);
                        facts.has_member_attribute()
                            || (member_serialization == MemberSerialization::OptIn
                                && facts.data_member.is_some())
                    }
                };
                if selected {
                    members.push((level, member));
                }
            }
        }
        members
    }

    /// The sorted properties of `ty`.
    pub(super) fn create_properties(
        &self,
        ty: &TypeHandle,
        member_serialization: MemberSerialization,
        naming: &dyn NamingStrategy,
    ) -> Result<PropertyCollection, ContractError> {
        let mut properties = PropertyCollection::new();
        for (declaring, member) in self.serializable_members(ty, member_serialization) {
            let property =
                self.create_property(ty, declaring, member, member_serialization, naming);
            properties.add(property, ty.name())?;
        }
        properties.sort_by_order();
        Ok(properties)
    }

    fn create_property(
        &self,
        ty: &TypeHandle,
        declaring: &TypeHandle,
        member: &MemberDef,
        member_serialization: MemberSerialization,
        naming: &dyn NamingStrategy,
    ) -> Property {
        let facts = self.metadata.member_facts(declaring, member);
        let mut property = Property::new(member.name(), member.member_type().clone());
        property.declaring_type = Some(declaring.clone());
        property.value_provider = Some(member.provider().clone());

        apply_member_facts(&mut property, &facts, member.name(), member_serialization, naming);

        let allow_non_public = self.options.default_members_search.non_public
            || property.has_member_attribute
            || member_serialization == MemberSerialization::Fields;
        let accessible =
            |v: Option<Visibility>| v.is_some_and(|v| v.is_public() || allow_non_public);
        let provider = member.provider();

        if member_serialization == MemberSerialization::Fields {
            property.readable = true;
            property.writable = true;
        } else {
            property.readable = accessible(member.getter()) && provider.can_read();
            let settable = if member.is_read_only_field() && property.has_member_attribute {
                Some(member.visibility())
            } else {
                member.setter()
            };
            property.writable = accessible(settable) && provider.can_write();
        }

        if !self.options.ignore_should_serialize_members {
            property.should_serialize =
                predicate_method(ty, &format!("ShouldSerialize{}", member.name()));
            property.should_deserialize =
                predicate_method(ty, &format!("ShouldDeserialize{}", member.name()));
        }
        if !self.options.ignore_is_specified_members {
            self.attach_is_specified(ty, member, &mut property);
        }
        property
    }

    fn attach_is_specified(&self, ty: &TypeHandle, member: &MemberDef, property: &mut Property) {
        let Some(specified) = ty.find_member(&format!("{}Specified", member.name())) else {
            return;
        };
        if specified.member_type() != &Type::BOOL {
            return;
        }
        if specified.is_readable() {
            let provider = specified.provider().clone();
            let getter: Predicate =
                Arc::new(move |obj| Ok(provider.get_value(obj)?.as_bool().unwrap_or(false)));
            property.get_is_specified = Some(getter);
        }
        if specified.is_writable() {
            let provider = specified.provider().clone();
            let setter: SpecifiedSetter = Arc::new(move |obj, value| {
                provider.set_value(obj, value.into())?;
                Ok(())
            });
            property.set_is_specified = Some(setter);
        }
    }
}

/// A parameterless method returning a boolean, wrapped as a predicate.
fn predicate_method(ty: &TypeHandle, name: &str) -> Option<Predicate> {
    let method = ty.find_method(name)?;
    if method.return_type() != Some(&Type::BOOL) || !method.params().is_empty() {
        return None;
    }
    let body = method.body();
    Some(Arc::new(move |obj| {
        Ok(body(obj, &mut Invocation::empty())?.as_bool().unwrap_or(false))
    }))
}

/// Copies the markers of a member or parameter onto `property`.
pub(super) fn apply_member_facts(
    property: &mut Property,
    facts: &MemberFacts,
    name: &str,
    member_serialization: MemberSerialization,
    naming: &dyn NamingStrategy,
) {
    let specified = facts
        .property
        .as_ref()
        .and_then(|p| p.name.clone())
        .or_else(|| facts.data_member.as_ref().and_then(|d| d.name.clone()));
    property.name = match &specified {
        Some(specified) => naming.property_name(specified, true),
        None => naming.property_name(name, false),
    };
    property.underlying_name = String::from(name);
    property.has_member_attribute = facts.has_member_attribute();

    property.ignored = facts.ignore
        || facts.non_serialized
        || facts.extension_data.is_some()
        || (member_serialization == MemberSerialization::OptIn && !property.has_member_attribute);

    if let Some(data_member) = &facts.data_member {
        property.order = data_member.order;
        if data_member.is_required {
            property.required = Some(Required::AllowNull);
        }
        if !data_member.emit_default_value {
            property.default_value_handling = Some(DefaultValueHandling::Ignore);
        }
    }
    if facts.required {
        property.required = Some(Required::Always);
    }
    if let Some(attr) = &facts.property {
        property.order = attr.order.or(property.order);
        property.required = attr.required.or(property.required);
        property.null_value_handling = attr.null_value_handling;
        property.default_value_handling =
            attr.default_value_handling.or(property.default_value_handling);
        property.reference_loop_handling = attr.reference_loop_handling;
        property.object_creation_handling = attr.object_creation_handling;
        property.type_name_handling = attr.type_name_handling;
        property.is_reference = attr.is_reference;
        property.item_converter = attr.item_converter.clone();
        property.item_is_reference = attr.item_is_reference;
        property.item_reference_loop_handling = attr.item_reference_loop_handling;
        property.item_type_name_handling = attr.item_type_name_handling;
    }
    property.default_value = facts.default_value.clone();
    property.converter = facts.converter.clone();
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use cj_reflect::info::{MemberDef, MethodDef, TypeDefBuilder};
    use cj_reflect::{Obj, Type, Value};

    use crate::attributes::{
        DataContract, DataMember, JsonExtensionData, JsonIgnore, JsonObject, JsonProperty,
        Serializable,
    };
    use crate::naming::CamelCaseNamingStrategy;
    use crate::resolver::{ContractResolver, MemberSearch, ResolverOptions};
    use crate::settings::{MemberSerialization, Required};

    fn names(resolver: &ContractResolver, ty: &cj_reflect::TypeHandle) -> Vec<String> {
        let contract = resolver.resolve(&Type::from(ty)).unwrap();
        contract
            .as_object()
            .unwrap()
            .properties
            .iter()
            .filter(|p| !p.ignored)
            .map(|p| p.name.clone())
            .collect()
    }

    #[test]
    fn public_members_are_visible_by_default() {
        let ty = TypeDefBuilder::class("App.Person")
            .member(MemberDef::property("Name", Type::STRING))
            .member(MemberDef::field("secret", Type::STRING).non_public())
            .member(
                MemberDef::field("kept", Type::STRING)
                    .non_public()
                    .with_attribute(JsonProperty::new()),
            )
            .member(MemberDef::property("Count", Type::INTEGER).static_member())
            .member(MemberDef::property("Hidden", Type::STRING).with_attribute(JsonIgnore))
            .build();
        let resolver = ContractResolver::new();
        assert_eq!(names(&resolver, &ty), ["Name", "kept"]);

        let contract = resolver.resolve(&Type::from(&ty)).unwrap();
        let kept = contract.as_object().unwrap().properties.get("kept").unwrap();
        assert!(kept.readable && kept.writable);

        let wide = ContractResolver::new().with_options(ResolverOptions {
            default_members_search: MemberSearch {
                non_public: true,
                statics: false,
            },
            ..ResolverOptions::default()
        });
        assert_eq!(names(&wide, &ty), ["Name", "secret", "kept"]);
    }

    #[test]
    fn opt_in_requires_markers() {
        let ty = TypeDefBuilder::class("App.Contracted")
            .with_attribute(DataContract::default())
            .member(MemberDef::property("Plain", Type::STRING))
            .member(MemberDef::property("Marked", Type::STRING).with_attribute(DataMember {
                name: Some("marked".into()),
                is_required: true,
                ..DataMember::default()
            }))
            .build();
        let resolver = ContractResolver::new();
        let contract = resolver.resolve(&Type::from(&ty)).unwrap();
        let object = contract.as_object().unwrap();
        assert_eq!(object.member_serialization, MemberSerialization::OptIn);
        assert!(object.properties.get("Plain").unwrap().ignored);
        let marked = object.properties.get("marked").unwrap();
        assert_eq!(marked.required, Some(Required::AllowNull));
        assert_eq!(marked.underlying_name, "Marked");
    }

    #[test]
    fn opt_in_keeps_ignore_markers() {
        let bag = cj_reflect::builtins::dictionary_of(Type::STRING, Type::Any);
        let ty = TypeDefBuilder::class("App.Guarded")
            .with_attribute(DataContract::default())
            .member(MemberDef::property("Id", Type::INTEGER).with_attribute(DataMember::default()))
            .member(
                MemberDef::property("Secret", Type::STRING)
                    .with_attribute(DataMember::default())
                    .with_attribute(JsonIgnore),
            )
            .member(
                MemberDef::property("Extra", Type::from(bag))
                    .with_attribute(DataMember::default())
                    .with_attribute(JsonExtensionData::default()),
            )
            .build();
        let resolver = ContractResolver::new();
        assert_eq!(names(&resolver, &ty), ["Id"]);

        let contract = resolver.resolve(&Type::from(&ty)).unwrap();
        assert!(contract.as_object().unwrap().extension_data.is_some());
    }

    #[test]
    fn field_mode_includes_every_instance_field() {
        let ty = TypeDefBuilder::class("App.Raw")
            .with_attribute(JsonObject::new(MemberSerialization::Fields))
            .member(MemberDef::field("id", Type::INTEGER).non_public().read_only())
            .member(MemberDef::property("Name", Type::STRING))
            .build();
        let resolver = ContractResolver::new();
        let contract = resolver.resolve(&Type::from(&ty)).unwrap();
        let properties = &contract.as_object().unwrap().properties;
        assert_eq!(properties.len(), 1);
        let id = properties.get("id").unwrap();
        assert!(id.readable && id.writable);

        let serializable = TypeDefBuilder::class("App.Legacy")
            .with_attribute(Serializable)
            .member(MemberDef::property("Name", Type::STRING))
            .build();
        let contract = resolver.resolve(&Type::from(&serializable)).unwrap();
        assert_eq!(
            contract.as_object().unwrap().member_serialization,
            MemberSerialization::OptOut
        );
    }

    #[test]
    fn naming_strategy_and_specified_names() {
        let ty = TypeDefBuilder::class("App.Named")
            .member(MemberDef::property("FirstName", Type::STRING))
            .member(
                MemberDef::property("LastName", Type::STRING)
                    .with_attribute(JsonProperty::named("SURNAME")),
            )
            .build();
        let resolver = ContractResolver::new().with_naming(CamelCaseNamingStrategy::default());
        assert_eq!(names(&resolver, &ty), ["firstName", "SURNAME"]);
    }

    #[test]
    fn should_serialize_and_specified_members() {
        let ty = TypeDefBuilder::class("App.Optional")
            .member(MemberDef::property("Name", Type::STRING))
            .member(MemberDef::property("NameSpecified", Type::BOOL))
            .method(MethodDef::predicate("ShouldSerializeName", |obj| {
                Ok(obj.get("Name")?.as_str() != Some(""))
            }))
            .build();
        let resolver = ContractResolver::new();
        let contract = resolver.resolve(&Type::from(&ty)).unwrap();
        let name = contract.as_object().unwrap().properties.get("Name").unwrap();

        let obj = Obj::new(&ty);
        obj.set("Name", "").unwrap();
        assert!(!(name.should_serialize.as_ref().unwrap())(&obj).unwrap());
        assert!(!(name.get_is_specified.as_ref().unwrap())(&obj).unwrap());
        (name.set_is_specified.as_ref().unwrap())(&obj, true).unwrap();
        assert_eq!(obj.get("NameSpecified").unwrap(), Value::Bool(true));
    }

    #[test]
    fn extension_data_member_is_not_a_property() {
        let bag = cj_reflect::builtins::dictionary_of(Type::STRING, Type::Any);
        let ty = TypeDefBuilder::class("App.Open")
            .member(MemberDef::property("Id", Type::INTEGER))
            .member(
                MemberDef::property("Extra", Type::from(bag))
                    .with_attribute(JsonExtensionData::default()),
            )
            .build();
        let resolver = ContractResolver::new();
        assert_eq!(names(&resolver, &ty), ["Id"]);
    }
}
