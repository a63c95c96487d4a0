use cj_reflect::info::{MemberDef, TypeDefBuilder};
use cj_reflect::{Obj, Type, Value};
use serde_json::json;

use super::{as_obj, node_type, serializer};
use crate::settings::{PreserveReferencesHandling, ReferenceLoopHandling};
use crate::{JsonErrorKind, JsonSerializer, SerializerSettings};

fn node(ty: &cj_reflect::TypeHandle, name: &str) -> Obj {
    let obj = Obj::new(ty);
    obj.set("Name", name).unwrap();
    obj
}

#[test]
fn shared_objects_are_written_once() {
    let leaf = node_type();
    let pair = TypeDefBuilder::class("App.Pair")
        .member(MemberDef::property("Left", Type::from(&leaf)))
        .member(MemberDef::property("Right", Type::from(&leaf)))
        .build();
    let shared = node(&leaf, "leaf");
    let root = Obj::new(&pair);
    root.set("Left", shared.clone()).unwrap();
    root.set("Right", shared).unwrap();

    let serializer = serializer(
        SerializerSettings::default().with_preserve_references_handling(PreserveReferencesHandling::Objects),
    );
    let document = serializer.to_document(&Value::Object(root), None).unwrap();
    assert_eq!(
        document,
        json!({
            "$id": "1",
            "Left": {"$id": "2", "Name": "leaf", "Next": null},
            "Right": {"$ref": "2"},
        })
    );

    let read = serializer.from_document(&document, &Type::from(&pair)).unwrap();
    let left = as_obj(&read).get("Left").unwrap();
    let right = as_obj(&read).get("Right").unwrap();
    assert!(as_obj(&left).ptr_eq(as_obj(&right)));
    assert_eq!(as_obj(&left).get("Name").unwrap(), Value::from("leaf"));
}

#[test]
fn preserved_cycles_round_trip() {
    let ty = node_type();
    let obj = node(&ty, "a");
    obj.set("Next", obj.clone()).unwrap();

    let serializer = serializer(
        SerializerSettings::default().with_preserve_references_handling(PreserveReferencesHandling::Objects),
    );
    let text = serializer.to_string(&Value::Object(obj), None).unwrap();
    assert_eq!(text, r#"{"$id":"1","Name":"a","Next":{"$ref":"1"}}"#);

    let read = serializer.from_str(&text, &Type::from(&ty)).unwrap();
    let next = as_obj(&read).get("Next").unwrap();
    assert!(as_obj(&next).ptr_eq(as_obj(&read)));
}

#[test]
fn self_loop_fails_by_default() {
    let ty = node_type();
    let obj = node(&ty, "a");
    obj.set("Next", obj.clone()).unwrap();

    let err = JsonSerializer::default()
        .to_string(&Value::Object(obj), None)
        .unwrap_err();
    assert!(matches!(
        err.kind(),
        JsonErrorKind::SelfReferencingLoop { member: Some(member), .. } if member == "Next"
    ));
}

#[test]
fn ignored_loop_omits_the_member() {
    let ty = node_type();
    let obj = node(&ty, "a");
    obj.set("Next", obj.clone()).unwrap();

    let serializer = serializer(
        SerializerSettings::default().with_reference_loop_handling(ReferenceLoopHandling::Ignore),
    );
    let text = serializer.to_string(&Value::Object(obj), None).unwrap();
    assert_eq!(text, r#"{"Name":"a"}"#);
}

#[test]
fn serialized_loop_stops_at_max_depth() {
    let ty = node_type();
    let obj = node(&ty, "a");
    obj.set("Next", obj.clone()).unwrap();

    let serializer = serializer(
        SerializerSettings::default()
            .with_reference_loop_handling(ReferenceLoopHandling::Serialize)
            .with_max_depth(Some(8)),
    );
    let err = serializer.to_string(&Value::Object(obj), None).unwrap_err();
    assert!(matches!(err.kind(), JsonErrorKind::MaxDepth(8)));
}

#[test]
fn unknown_reference_fails() {
    let ty = node_type();
    let err = JsonSerializer::default()
        .from_str(r#"{"Name":"a","Next":{"$ref":"7"}}"#, &Type::from(&ty))
        .unwrap_err();
    assert!(matches!(err.kind(), JsonErrorKind::UnresolvedReference(id) if id == "7"));
}
