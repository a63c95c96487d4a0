use alloc::string::String;

use cj_reflect::TypeHandle;
use cj_reflect::builtins::version;
use cj_reflect::info::{ConstructorDef, ParamDef};

use super::ContractResolver;
use super::members::apply_member_facts;
use crate::ContractError;
use crate::contract::{Contract, Creator, ObjectDetails, Property, PropertyCollection};
use crate::naming::NamingStrategy;
use crate::settings::MemberSerialization;

impl ContractResolver {
    /// Picks how instances of an object contract are created.
    ///
    /// A marked constructor wins. Field serialization allocates without a
    /// constructor when allowed. Otherwise a type without a usable default
    /// constructor falls back to its single public constructor.
    pub(super) fn resolve_constructors(
        &self,
        ty: &TypeHandle,
        contract: &mut Contract,
        details: &mut ObjectDetails,
        naming: &dyn NamingStrategy,
    ) -> Result<(), ContractError> {
        let def = ty.def();

        let mut marked = def
            .constructors()
            .iter()
            .filter(|c| self.metadata.is_marked_constructor(c));
        let override_ctor = match (marked.next(), marked.next()) {
            (Some(_), Some(_)) => {
                return Err(ContractError::MultipleConstructorAttributes(String::from(
                    ty.name(),
                )));
            }
            (Some(ctor), None) => Some(ctor),
            (None, _) if ty.ptr_eq(&version()) => {
                def.constructors().iter().find(|c| c.params().len() == 4)
            }
            (None, _) => None,
        };

        if let Some(ctor) = override_ctor {
            details.override_creator = Some(ctor.body());
            details.creator_parameters =
                self.create_constructor_parameters(ty, ctor, &details.properties, naming)?;
        } else if details.member_serialization == MemberSerialization::Fields {
            if self.options.allow_uninitialized && def.is_instantiable() {
                contract.default_creator = Some(Creator::uninitialized(ty.clone()));
                contract.default_creator_non_public = false;
            }
        } else if (contract.default_creator.is_none() || contract.default_creator_non_public)
            && def.is_instantiable()
        {
            let mut public = def.constructors().iter().filter(|c| c.is_public());
            if let (Some(ctor), None) = (public.next(), public.next())
                && !ctor.params().is_empty()
            {
                details.parameterized_creator = Some(ctor.body());
                details.creator_parameters =
                    self.create_constructor_parameters(ty, ctor, &details.properties, naming)?;
            }
        }
        Ok(())
    }

    fn create_constructor_parameters(
        &self,
        ty: &TypeHandle,
        ctor: &ConstructorDef,
        properties: &PropertyCollection,
        naming: &dyn NamingStrategy,
    ) -> Result<PropertyCollection, ContractError> {
        let mut parameters = PropertyCollection::new();
        for param in ctor.params() {
            let matching = properties
                .get(param.name())
                .or_else(|| properties.iter().find(|p| p.underlying_name == param.name()))
                .filter(|p| &p.property_type == param.param_type());
            let property = self.create_parameter_property(param, matching, naming);
            parameters.add(property, ty.name())?;
        }
        Ok(parameters)
    }

    /// A property for a constructor parameter.
    ///
    /// Settings the parameter leaves unset are taken from the member property
    /// of the same name and type.
    fn create_parameter_property(
        &self,
        param: &ParamDef,
        matching: Option<&Property>,
        naming: &dyn NamingStrategy,
    ) -> Property {
        let facts = self.metadata.parameter_facts(param);
        let mut property = Property::new(param.name(), param.param_type().clone());
        apply_member_facts(
            &mut property,
            &facts,
            param.name(),
            MemberSerialization::OptOut,
            naming,
        );
        property.readable = false;
        property.writable = true;

        let Some(member) = matching else {
            return property;
        };
        if property.name == param.name() {
            property.name = member.name.clone();
        }
        property.converter = property.converter.or_else(|| member.converter.clone());
        property.default_value = property.default_value.or_else(|| member.default_value.clone());
        property.required = property.required.or(member.required);
        property.is_reference = property.is_reference.or(member.is_reference);
        property.null_value_handling = property.null_value_handling.or(member.null_value_handling);
        property.default_value_handling = property
            .default_value_handling
            .or(member.default_value_handling);
        property.reference_loop_handling = property
            .reference_loop_handling
            .or(member.reference_loop_handling);
        property.object_creation_handling = property
            .object_creation_handling
            .or(member.object_creation_handling);
        property.type_name_handling = property.type_name_handling.or(member.type_name_handling);
        property
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use cj_reflect::info::{ConstructorDef, MemberDef, ParamDef, TypeDefBuilder};
    use cj_reflect::{Type, Value};

    use crate::ContractError;
    use crate::attributes::{DefaultValue, JsonConstructor, JsonObject, JsonProperty};
    use crate::resolver::ContractResolver;
    use crate::settings::{MemberSerialization, Required};

    #[test]
    fn single_public_constructor_is_parameterized_creator() {
        let ty = TypeDefBuilder::class("Geo.Point")
            .member(
                MemberDef::property("X", Type::INTEGER)
                    .read_only()
                    .with_attribute(JsonProperty::named("x").required(Required::Always)),
            )
            .member(MemberDef::property("Y", Type::FLOAT).read_only())
            .member(
                MemberDef::property("Label", Type::STRING)
                    .with_attribute(DefaultValue(Value::from("?"))),
            )
            .constructor(ConstructorDef::assigning(
                vec![
                    ParamDef::new("X", Type::INTEGER),
                    ParamDef::new("Y", Type::INTEGER),
                    ParamDef::new("Label", Type::STRING),
                ],
                &["X", "Y", "Label"],
            ))
            .build();
        let contract = ContractResolver::new().resolve(&Type::from(&ty)).unwrap();
        let object = contract.as_object().unwrap();
        assert!(contract.default_creator.is_none());
        assert!(object.parameterized_creator.is_some());

        let names: Vec<_> = object.creator_parameters.iter().map(|p| p.name.as_str()).collect();
        // `X` takes the name of its member, `Y` differs in type
        assert_eq!(names, ["x", "Y", "Label"]);
        let x = object.creator_parameters.get("x").unwrap();
        assert_eq!(x.required, Some(Required::Always));
        assert!(x.writable && !x.readable);
        let label = object.creator_parameters.get("Label").unwrap();
        assert_eq!(label.default_value, Some(Value::from("?")));
    }

    #[test]
    fn marked_constructor_overrides() {
        let ty = TypeDefBuilder::class("App.Token")
            .member(MemberDef::property("Value", Type::STRING))
            .constructor(ConstructorDef::assigning(Vec::new(), &[]))
            .constructor(
                ConstructorDef::assigning(vec![ParamDef::new("Value", Type::STRING)], &["Value"])
                    .with_attribute(JsonConstructor),
            )
            .build();
        let contract = ContractResolver::new().resolve(&Type::from(&ty)).unwrap();
        let object = contract.as_object().unwrap();
        assert!(object.override_creator.is_some());
        assert!(contract.default_creator.is_some());
        assert_eq!(object.creator_parameters.len(), 1);

        let twice = TypeDefBuilder::class("App.Twice")
            .constructor(ConstructorDef::assigning(Vec::new(), &[]).with_attribute(JsonConstructor))
            .constructor(
                ConstructorDef::assigning(vec![ParamDef::new("a", Type::STRING)], &[])
                    .with_attribute(JsonConstructor),
            )
            .build();
        assert!(matches!(
            ContractResolver::new().resolve(&Type::from(&twice)),
            Err(ContractError::MultipleConstructorAttributes(_))
        ));
    }

    #[test]
    fn field_mode_allocates_without_constructor() {
        let ty = TypeDefBuilder::class("App.Snapshot")
            .with_attribute(JsonObject::new(MemberSerialization::Fields))
            .member(MemberDef::field("state", Type::INTEGER).non_public())
            .constructor(ConstructorDef::assigning(
                vec![ParamDef::new("state", Type::INTEGER)],
                &["state"],
            ))
            .build();
        let contract = ContractResolver::new().resolve(&Type::from(&ty)).unwrap();
        assert!(contract.default_creator.is_some());
        assert!(contract.as_object().unwrap().parameterized_creator.is_none());
    }
}
