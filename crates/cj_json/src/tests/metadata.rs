use std::sync::Arc;

use cj_reflect::info::{MemberDef, TypeDefBuilder};
use cj_reflect::registry::TypeRegistry;
use cj_reflect::{Obj, Type, TypeHandle, Value};
use serde_json::json;

use super::{as_obj, serializer};
use crate::binder::DefaultSerializationBinder;
use crate::settings::{MetadataPropertyHandling, TypeNameHandling};
use crate::{JsonErrorKind, JsonSerializer, SerializerSettings};

struct Zoo {
    animal: TypeHandle,
    dog: TypeHandle,
    pen: TypeHandle,
}

fn zoo() -> Zoo {
    let animal = TypeDefBuilder::abstract_class("Zoo.Animal")
        .member(MemberDef::property("Name", Type::STRING))
        .build();
    let dog = TypeDefBuilder::class("Zoo.Dog")
        .base(&animal)
        .member(MemberDef::property("Breed", Type::STRING))
        .build();
    let pen = TypeDefBuilder::class("Zoo.Pen")
        .member(MemberDef::property("Pet", Type::from(&animal)))
        .build();
    Zoo { animal, dog, pen }
}

fn settings(zoo: &Zoo, handling: TypeNameHandling) -> SerializerSettings {
    let mut registry = TypeRegistry::new();
    registry.register(&zoo.dog);
    SerializerSettings::default()
        .with_type_name_handling(handling)
        .with_binder(DefaultSerializationBinder::new(Arc::new(registry)))
}

fn rex(zoo: &Zoo) -> Obj {
    let dog = Obj::new(&zoo.dog);
    dog.set("Name", "Rex").unwrap();
    dog.set("Breed", "Lab").unwrap();
    dog
}

#[test]
fn auto_type_names_for_derived_members() {
    let zoo = zoo();
    let serializer = serializer(settings(&zoo, TypeNameHandling::Auto));
    let pen = Obj::new(&zoo.pen);
    pen.set("Pet", rex(&zoo)).unwrap();

    let document = serializer.to_document(&Value::Object(pen), None).unwrap();
    assert_eq!(document["Pet"]["$type"], json!("Zoo.Dog"));
    assert_eq!(document["Pet"]["Breed"], json!("Lab"));

    let read = serializer.from_document(&document, &Type::from(&zoo.pen)).unwrap();
    let pet = as_obj(&read).get("Pet").unwrap();
    assert!(as_obj(&pet).type_handle().ptr_eq(&zoo.dog));
    assert_eq!(as_obj(&pet).get("Name").unwrap(), Value::from("Rex"));
}

#[test]
fn auto_type_names_skip_exact_types() {
    let zoo = zoo();
    let serializer = serializer(settings(&zoo, TypeNameHandling::Auto));
    let document = serializer
        .to_document(&Value::Object(rex(&zoo)), Some(&Type::from(&zoo.dog)))
        .unwrap();
    assert!(document.get("$type").is_none());

    let document = serializer
        .to_document(&Value::Object(rex(&zoo)), Some(&Type::from(&zoo.animal)))
        .unwrap();
    assert_eq!(document["$type"], json!("Zoo.Dog"));
}

#[test]
fn abstract_types_need_a_type_name() {
    let zoo = zoo();
    let err = JsonSerializer::default()
        .from_str(r#"{"Name":"Rex"}"#, &Type::from(&zoo.animal))
        .unwrap_err();
    assert!(matches!(err.kind(), JsonErrorKind::NotInstantiable(_)));
}

#[test]
fn incompatible_and_unknown_type_names() {
    let zoo = zoo();
    let serializer = serializer(settings(&zoo, TypeNameHandling::Objects));

    let err = serializer
        .from_str(r#"{"$type":"Zoo.Dog"}"#, &Type::from(&zoo.pen))
        .unwrap_err();
    assert!(matches!(err.kind(), JsonErrorKind::IncompatibleType { .. }));

    let err = serializer
        .from_str(r#"{"$type":"Zoo.Cat"}"#, &Type::from(&zoo.animal))
        .unwrap_err();
    assert!(matches!(err.kind(), JsonErrorKind::UnknownType(name) if name == "Zoo.Cat"));
}

#[test]
fn read_ahead_finds_late_metadata() {
    let zoo = zoo();
    let text = r#"{"Name":"Rex","Breed":"Lab","$type":"Zoo.Dog"}"#;

    let strict = serializer(settings(&zoo, TypeNameHandling::Auto));
    assert!(strict.from_str(text, &Type::from(&zoo.animal)).is_err());

    let relaxed = serializer(
        settings(&zoo, TypeNameHandling::Auto)
            .with_metadata_property_handling(MetadataPropertyHandling::ReadAhead),
    );
    let read = relaxed.from_str(text, &Type::from(&zoo.animal)).unwrap();
    assert!(as_obj(&read).type_handle().ptr_eq(&zoo.dog));
    assert_eq!(as_obj(&read).get("Breed").unwrap(), Value::from("Lab"));
}

#[test]
fn ignored_metadata_is_read_as_members() {
    let zoo = zoo();
    let serializer = serializer(
        SerializerSettings::default().with_metadata_property_handling(MetadataPropertyHandling::Ignore),
    );
    let read = serializer
        .from_str(r#"{"$id":"1","Name":"Rex"}"#, &Type::from(&zoo.dog))
        .unwrap();
    assert_eq!(as_obj(&read).get("Name").unwrap(), Value::from("Rex"));
}
