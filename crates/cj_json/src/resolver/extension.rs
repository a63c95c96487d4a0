use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use cj_reflect::builtins::dictionary_of;
use cj_reflect::info::{MemberDef, TypeKind};
use cj_reflect::{BoxedError, Obj, Type, TypeHandle, Value};

use super::ContractResolver;
use crate::ContractError;
use crate::contract::{ExtensionData, ExtensionDataGetter, ExtensionDataSetter};

impl ContractResolver {
    /// The extension data sink of `ty`.
    ///
    /// Levels are searched from the most-derived type; within a level the
    /// last marked member is used.
    pub(super) fn resolve_extension_data(
        &self,
        ty: &TypeHandle,
    ) -> Result<Option<ExtensionData>, ContractError> {
        for level in ty.chain() {
            let found = level.def().members().iter().rev().find_map(|member| {
                self.metadata
                    .member_facts(level, member)
                    .extension_data
                    .map(|attr| (member, attr))
            });
            if let Some((member, attr)) = found {
                let (created, value_type) = extension_dictionary(level, member)?;
                let provider = member.provider().clone();

                let getter = attr.write_data.then(|| {
                    let provider = provider.clone();
                    let getter: ExtensionDataGetter = Arc::new(
                        move |obj: &Obj| -> Result<Vec<(String, Value)>, BoxedError> {
                            let Value::Object(dict) = provider.get_value(obj)? else {
                                return Ok(Vec::new());
                            };
                            Ok(dict
                                .entries()?
                                .into_iter()
                                .filter_map(|(key, value)| match key {
                                    Value::String(key) => Some((key, value)),
                                    _ => None,
                                })
                                .collect())
                        },
                    );
                    getter
                });
                let setter = attr.read_data.then(|| {
                    let setter: ExtensionDataSetter = Arc::new(
                        move |obj: &Obj, key: &str, value: Value| -> Result<(), BoxedError> {
                            let dict = match provider.get_value(obj)? {
                                Value::Object(dict) => dict,
                                _ => {
                                    let dict = Obj::new(&created);
                                    provider.set_value(obj, Value::Object(dict.clone()))?;
                                    dict
                                }
                            };
                            dict.upsert(Value::from(key), value)?;
                            Ok(())
                        },
                    );
                    setter
                });

                return Ok(Some(ExtensionData {
                    getter,
                    setter,
                    value_type,
                }));
            }
        }
        Ok(None)
    }
}

/// The dictionary type created for an extension data member, and its value
/// type.
fn extension_dictionary(
    level: &TypeHandle,
    member: &MemberDef,
) -> Result<(TypeHandle, Type), ContractError> {
    let invalid = || ContractError::InvalidExtensionData {
        type_name: String::from(level.name()),
        member: String::from(member.name()),
    };
    let dict_type = member.member_type().as_def().ok_or_else(invalid)?;
    let capability = dict_type
        .def()
        .capabilities()
        .dictionary
        .as_ref()
        .filter(|d| d.key == Type::STRING)
        .ok_or_else(invalid)?;

    let created = match dict_type.def().kind() {
        TypeKind::Interface | TypeKind::Abstract => dict_type
            .def()
            .default_impl()
            .cloned()
            .unwrap_or_else(|| dictionary_of(Type::STRING, capability.value.clone())),
        TypeKind::Class | TypeKind::Struct => dict_type.clone(),
    };
    Ok((created, capability.value.clone()))
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use cj_reflect::builtins::dictionary_of;
    use cj_reflect::info::{MemberDef, TypeDefBuilder};
    use cj_reflect::{Obj, Type, Value};

    use crate::ContractError;
    use crate::attributes::JsonExtensionData;
    use crate::resolver::ContractResolver;

    #[test]
    fn sink_is_created_on_first_write() {
        let interface = TypeDefBuilder::interface("App.IBag")
            .dictionary(Type::STRING, Type::Any)
            .build();
        let ty = TypeDefBuilder::class("App.Open")
            .member(
                MemberDef::property("Extra", Type::from(interface))
                    .with_attribute(JsonExtensionData::default()),
            )
            .build();
        let contract = ContractResolver::new().resolve(&Type::from(&ty)).unwrap();
        let extension = contract.as_object().unwrap().extension_data.clone().unwrap();

        let obj = Obj::new(&ty);
        assert!((extension.getter.as_ref().unwrap())(&obj).unwrap().is_empty());
        (extension.setter.as_ref().unwrap())(&obj, "unknown", Value::Integer(1)).unwrap();
        let entries = (extension.getter.as_ref().unwrap())(&obj).unwrap();
        assert_eq!(entries, [(String::from("unknown"), Value::Integer(1))]);
    }

    #[test]
    fn most_derived_level_wins() {
        let bag = Type::from(dictionary_of(Type::STRING, Type::INTEGER));
        let base = TypeDefBuilder::class("App.Base")
            .member(
                MemberDef::property("BaseExtra", bag.clone())
                    .with_attribute(JsonExtensionData::default()),
            )
            .build();
        let derived = TypeDefBuilder::class("App.Derived")
            .base(&base)
            .member(
                MemberDef::property("First", bag.clone())
                    .with_attribute(JsonExtensionData::default()),
            )
            .member(
                MemberDef::property("Last", bag).with_attribute(JsonExtensionData {
                    write_data: false,
                    read_data: true,
                }),
            )
            .build();
        let contract = ContractResolver::new().resolve(&Type::from(&derived)).unwrap();
        let extension = contract.as_object().unwrap().extension_data.clone().unwrap();
        assert!(extension.getter.is_none());
        assert!(extension.setter.is_some());
        assert_eq!(extension.value_type, Type::INTEGER);
    }

    #[test]
    fn non_dictionary_member_is_rejected() {
        let ty = TypeDefBuilder::class("App.Broken")
            .member(
                MemberDef::property("Extra", Type::STRING)
                    .with_attribute(JsonExtensionData::default()),
            )
            .build();
        assert!(matches!(
            ContractResolver::new().resolve(&Type::from(&ty)),
            Err(ContractError::InvalidExtensionData { .. })
        ));
    }
}
