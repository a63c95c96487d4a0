use cj_reflect::builtins::{array_of, dictionary_of, list_of, multi_array_of, read_only_list_of};
use cj_reflect::info::{MemberDef, TypeDefBuilder};
use cj_reflect::{Obj, Type, Value};
use serde_json::json;

use super::{as_obj, person, person_type, serializer};
use crate::settings::{ObjectCreationHandling, PreserveReferencesHandling};
use crate::{JsonErrorKind, JsonSerializer, SerializerSettings};

fn integers(values: &[i64]) -> Vec<Value> {
    values.iter().copied().map(Value::Integer).collect()
}

#[test]
fn lists_of_objects() {
    let ty = person_type();
    let list = list_of(Type::from(&ty));
    let value = Value::Object(Obj::new_list(
        &list,
        vec![
            Value::Object(person(&ty, "Ann", 30)),
            Value::Null,
            Value::Object(person(&ty, "Bob", 4)),
        ],
    ));
    let serializer = JsonSerializer::default();

    let document = serializer.to_document(&value, None).unwrap();
    assert_eq!(
        document,
        json!([{"Name": "Ann", "Age": 30}, null, {"Name": "Bob", "Age": 4}])
    );

    let read = serializer.from_document(&document, &Type::from(&list)).unwrap();
    assert!(read.deep_eq(&value));
}

#[test]
fn fixed_size_arrays_are_read_through_a_buffer() {
    let ty = array_of(Type::INTEGER);
    let read = JsonSerializer::default()
        .from_str("[1,2,3]", &Type::from(&ty))
        .unwrap();
    let obj = as_obj(&read);
    assert!(obj.type_handle().ptr_eq(&ty));
    assert_eq!(obj.items().unwrap(), integers(&[1, 2, 3]));

    let read_only = read_only_list_of(Type::STRING);
    let read = JsonSerializer::default()
        .from_str(r#"["a"]"#, &Type::from(&read_only))
        .unwrap();
    assert_eq!(as_obj(&read).items().unwrap(), [Value::from("a")]);
}

#[test]
fn buffered_arrays_cannot_carry_ids() {
    let ty = array_of(Type::INTEGER);
    let err = JsonSerializer::default()
        .from_str(r#"{"$id":"1","$values":[1]}"#, &Type::from(&ty))
        .unwrap_err();
    assert!(matches!(err.kind(), JsonErrorKind::CannotPreserveReference(_)));
}

#[test]
fn preserved_lists_use_a_values_envelope() {
    let ty = list_of(Type::INTEGER);
    let value = Value::Object(Obj::new_list(&ty, integers(&[1, 2])));
    let serializer = serializer(
        SerializerSettings::default().with_preserve_references_handling(PreserveReferencesHandling::All),
    );

    let document = serializer.to_document(&value, None).unwrap();
    assert_eq!(document, json!({"$id": "1", "$values": [1, 2]}));

    let read = serializer.from_document(&document, &Type::from(&ty)).unwrap();
    assert_eq!(as_obj(&read).items().unwrap(), integers(&[1, 2]));
}

#[test]
fn multidimensional_arrays() {
    let ty = multi_array_of(Type::INTEGER, 2);
    let grid = Obj::with_content(
        &ty,
        ty.def().slot_defaults(),
        cj_reflect::Content::Grid {
            dims: vec![2, 3],
            items: integers(&[1, 2, 3, 4, 5, 6]),
        },
    );
    let serializer = JsonSerializer::default();

    let text = serializer.to_string(&Value::Object(grid), None).unwrap();
    assert_eq!(text, "[[1,2,3],[4,5,6]]");

    let read = serializer.from_str(&text, &Type::from(&ty)).unwrap();
    let (dims, items) = as_obj(&read).grid().unwrap();
    assert_eq!(dims, [2, 3]);
    assert_eq!(items, integers(&[1, 2, 3, 4, 5, 6]));

    let err = serializer.from_str("[[1,2],[3]]", &Type::from(&ty)).unwrap_err();
    assert!(matches!(err.kind(), JsonErrorKind::NonCubicalArray));
}

#[test]
fn dictionaries_keep_entry_order() {
    let ty = dictionary_of(Type::STRING, Type::INTEGER);
    let serializer = JsonSerializer::default();
    let read = serializer
        .from_str(r#"{"b":2,"a":1}"#, &Type::from(&ty))
        .unwrap();
    assert_eq!(
        as_obj(&read).entries().unwrap(),
        [
            (Value::from("b"), Value::Integer(2)),
            (Value::from("a"), Value::Integer(1)),
        ]
    );
    assert_eq!(serializer.to_string(&read, None).unwrap(), r#"{"b":2,"a":1}"#);
}

#[test]
fn invalid_dictionary_keys() {
    let ty = dictionary_of(Type::INTEGER, Type::STRING);
    let err = JsonSerializer::default()
        .from_str(r#"{"one":"x"}"#, &Type::from(&ty))
        .unwrap_err();
    assert!(matches!(
        err.kind(),
        JsonErrorKind::InvalidDictionaryKey { key, .. } if key == "one"
    ));
}

#[test]
fn existing_collections_are_reused_or_replaced() {
    let list = list_of(Type::INTEGER);
    let ty = TypeDefBuilder::class("App.Bag")
        .member(MemberDef::property("Items", Type::from(&list)))
        .build();
    let bag = |items: &[i64]| {
        let obj = Obj::new(&ty);
        obj.set("Items", Obj::new_list(&list, integers(items))).unwrap();
        obj
    };

    let target = bag(&[1]);
    let before = target.get("Items").unwrap();
    JsonSerializer::default()
        .populate_str(r#"{"Items":[2,3]}"#, &target)
        .unwrap();
    let after = target.get("Items").unwrap();
    assert!(as_obj(&after).ptr_eq(as_obj(&before)));
    assert_eq!(as_obj(&after).items().unwrap(), integers(&[1, 2, 3]));

    let target = bag(&[1]);
    serializer(SerializerSettings::default().with_object_creation_handling(ObjectCreationHandling::Replace))
        .populate_str(r#"{"Items":[2,3]}"#, &target)
        .unwrap();
    let after = target.get("Items").unwrap();
    assert_eq!(as_obj(&after).items().unwrap(), integers(&[2, 3]));
}
