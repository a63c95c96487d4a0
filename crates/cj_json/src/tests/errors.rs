use std::sync::{Arc, Mutex};

use cj_reflect::builtins::{dictionary_of, list_of};
use cj_reflect::info::{ConstructorDef, MemberDef, ParamDef, TypeDefBuilder};
use cj_reflect::{Obj, Type, TypeHandle, Value};

use super::{as_obj, person_type, serializer};
use crate::attributes::{JsonExtensionData, JsonProperty};
use crate::settings::{CancellationToken, Required};
use crate::{JsonErrorKind, JsonSerializer, SerializerSettings};

fn required_type() -> TypeHandle {
    TypeDefBuilder::class("App.Account")
        .member(MemberDef::property("Name", Type::STRING).with_attribute(JsonProperty::new().required(Required::Always)))
        .build()
}

#[test]
fn required_member_must_be_present_and_set() {
    let ty = Type::from(required_type());
    let serializer = JsonSerializer::default();

    let err = serializer.from_str("{}", &ty).unwrap_err();
    assert!(matches!(
        err.kind(),
        JsonErrorKind::RequiredMissing { property } if property == "Name"
    ));

    let err = serializer.from_str(r#"{"Name":null}"#, &ty).unwrap_err();
    assert!(matches!(
        err.kind(),
        JsonErrorKind::RequiredNull { property } if property == "Name"
    ));

    let read = serializer.from_str(r#"{"Name":"x"}"#, &ty).unwrap();
    assert_eq!(as_obj(&read).get("Name").unwrap(), Value::from("x"));
}

#[test]
fn required_member_cannot_be_written_as_null() {
    let ty = required_type();
    let obj = cj_reflect::Obj::new(&ty);
    let err = JsonSerializer::default()
        .to_string(&Value::Object(obj), None)
        .unwrap_err();
    assert!(matches!(err.kind(), JsonErrorKind::NullForRequired(name) if name == "Name"));
}

#[test]
fn handled_errors_skip_the_member() {
    let paths = Arc::new(Mutex::new(Vec::new()));
    let seen = paths.clone();
    let settings = SerializerSettings::default().with_error_handler(move |_, context| {
        seen.lock().unwrap().push(context.path.clone());
        context.handled = true;
    });
    let ty = person_type();

    let read = serializer(settings)
        .from_str(r#"{"Age":"old","Name":"Ann"}"#, &Type::from(&ty))
        .unwrap();
    let obj = as_obj(&read);
    assert_eq!(obj.get("Name").unwrap(), Value::from("Ann"));
    assert_eq!(obj.get("Age").unwrap(), Value::Integer(0));
    assert_eq!(*paths.lock().unwrap(), ["Age"]);
}

#[test]
fn handled_required_errors_keep_constructed_objects() {
    let ty = TypeDefBuilder::class("App.Measured")
        .member(MemberDef::property("X", Type::INTEGER).read_only())
        .member(MemberDef::property("Name", Type::STRING).with_attribute(JsonProperty::new().required(Required::Always)))
        .constructor(ConstructorDef::assigning(vec![ParamDef::new("x", Type::INTEGER)], &["X"]))
        .build();
    let paths = Arc::new(Mutex::new(Vec::new()));
    let seen = paths.clone();
    let settings = SerializerSettings::default().with_error_handler(move |_, context| {
        seen.lock().unwrap().push(context.error.to_string());
        context.handled = true;
    });

    let read = serializer(settings).from_str(r#"{"X":3}"#, &Type::from(&ty)).unwrap();
    let obj = as_obj(&read);
    assert_eq!(obj.get("X").unwrap(), Value::Integer(3));
    assert!(obj.get("Name").unwrap().is_null());
    assert_eq!(paths.lock().unwrap().len(), 1);
}

#[test]
fn handled_errors_skip_extension_entries() {
    let bag = dictionary_of(Type::STRING, Type::Any);
    let ty = TypeDefBuilder::class("App.Open")
        .member(MemberDef::property("Id", Type::INTEGER))
        .member(MemberDef::property("Extra", Type::from(&bag)).with_attribute(JsonExtensionData::default()))
        .build();
    let obj = Obj::new(&ty);
    obj.set("Id", 1).unwrap();
    let extra = Obj::new_dict(
        &bag,
        vec![
            (Value::from("self"), Value::Object(obj.clone())),
            (Value::from("ok"), Value::Integer(2)),
        ],
    );
    obj.set("Extra", extra).unwrap();

    let err = JsonSerializer::default()
        .to_string(&Value::Object(obj.clone()), None)
        .unwrap_err();
    assert!(matches!(err.kind(), JsonErrorKind::SelfReferencingLoop { .. }));

    let members = Arc::new(Mutex::new(Vec::new()));
    let seen = members.clone();
    let settings = SerializerSettings::default().with_error_handler(move |_, context| {
        seen.lock().unwrap().push(context.member.clone());
        context.handled = true;
    });
    let text = serializer(settings).to_string(&Value::Object(obj), None).unwrap();
    assert_eq!(text, r#"{"Id":1,"ok":2}"#);
    assert_eq!(*members.lock().unwrap(), [Some(Value::from("self"))]);
}

#[test]
fn handled_errors_skip_list_items() {
    let settings = SerializerSettings::default().with_error_handler(|_, context| {
        context.handled = true;
    });
    let ty = Type::from(list_of(Type::INTEGER));

    let read = serializer(settings).from_str(r#"[1,"two",{"x":[3]},4]"#, &ty).unwrap();
    assert_eq!(
        as_obj(&read).items().unwrap(),
        [Value::Integer(1), Value::Integer(4)]
    );
}

#[test]
fn unhandled_errors_carry_the_path() {
    let ty = person_type();
    let list = Type::from(list_of(Type::from(&ty)));
    let err = JsonSerializer::default()
        .from_str(r#"[{"Age":1},{"Age":"x"}]"#, &list)
        .unwrap_err();
    assert!(matches!(err.kind(), JsonErrorKind::Conversion { .. }));
    assert_eq!(err.path(), "[1].Age");
}

#[test]
fn cancelled_calls_stop() {
    let token = CancellationToken::new();
    token.cancel();
    let serializer = serializer(
        SerializerSettings::default()
            .with_cancellation(token)
            .with_error_handler(|_, context| context.handled = true),
    );
    let err = serializer
        .from_str(r#"{"Name":"Ann"}"#, &Type::from(person_type()))
        .unwrap_err();
    assert!(err.is_cancelled());
}

#[test]
fn document_shape_errors() {
    let serializer = JsonSerializer::default();
    let person = Type::from(person_type());

    let err = serializer.from_str("[1]", &person).unwrap_err();
    assert!(matches!(
        err.kind(),
        JsonErrorKind::WrongContainer { found: "array", .. }
    ));

    let strict = super::serializer(SerializerSettings::default().with_check_additional_content(true));
    let mut reader = crate::token::TokenReader::new(&serde_json::json!(5));
    assert_eq!(strict.deserialize(&mut reader, &Type::INTEGER).unwrap(), Value::Integer(5));

    let err = serializer.from_str(r#""x""#, &Type::INTEGER).unwrap_err();
    assert!(matches!(err.kind(), JsonErrorKind::Conversion { .. }));
}

#[test]
fn reading_depth_is_bounded() {
    let serializer = serializer(SerializerSettings::default().with_max_depth(Some(2)));
    let nested = Type::from(list_of(Type::from(list_of(Type::from(list_of(Type::INTEGER))))));
    let err = serializer.from_str("[[[1]]]", &nested).unwrap_err();
    assert!(matches!(err.kind(), JsonErrorKind::MaxDepth(2)));
}
