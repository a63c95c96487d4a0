use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use cj_reflect::builtins::{dictionary_of, list_of, version};
use cj_reflect::info::{CallbackRole, ConstructorDef, MemberDef, MethodDef, ParamDef, TypeDefBuilder};
use cj_reflect::{Obj, PrimitiveType, Type, Value};
use serde_json::json;

use super::{as_obj, person, person_type, serializer};
use crate::attributes::{DefaultValue, JsonExtensionData, JsonIgnore, JsonProperty};
use crate::settings::{DefaultValueHandling, Formatting, MissingMemberHandling, NullValueHandling};
use crate::{JsonErrorKind, JsonSerializer, SerializerSettings};

#[test]
fn round_trip() {
    let ty = person_type();
    let serializer = JsonSerializer::default();
    let original = Value::Object(person(&ty, "Ann", 30));

    let text = serializer.to_string(&original, None).unwrap();
    assert_eq!(text, r#"{"Name":"Ann","Age":30}"#);

    let read = serializer.from_str(&text, &Type::from(&ty)).unwrap();
    assert!(read.deep_eq(&original));
    assert!(!as_obj(&read).ptr_eq(as_obj(&original)));
}

#[test]
fn indented_output() {
    let ty = person_type();
    let serializer = serializer(SerializerSettings::default().with_formatting(Formatting::Indented));
    let text = serializer
        .to_string(&Value::Object(person(&ty, "Ann", 30)), None)
        .unwrap();
    assert_eq!(text, "{\n  \"Name\": \"Ann\",\n  \"Age\": 30\n}");
}

#[test]
fn ordered_members_follow_unordered() {
    let ty = TypeDefBuilder::class("App.Ordered")
        .member(MemberDef::property("B", Type::INTEGER).with_attribute(JsonProperty::new().order(2)))
        .member(MemberDef::property("Free", Type::INTEGER))
        .member(MemberDef::property("C", Type::INTEGER).with_attribute(JsonProperty::new().order(0)))
        .member(MemberDef::property("D", Type::INTEGER).with_attribute(JsonProperty::new().order(1)))
        .build();
    let obj = Obj::new(&ty);
    for (name, value) in [("B", 2), ("Free", 9), ("C", 0), ("D", 1)] {
        obj.set(name, value).unwrap();
    }
    let text = JsonSerializer::default().to_string(&Value::Object(obj), None).unwrap();
    assert_eq!(text, r#"{"Free":9,"C":0,"D":1,"B":2}"#);
}

#[test]
fn default_values_are_omitted_when_ignored() {
    let ty = TypeDefBuilder::class("App.Item")
        .member(MemberDef::property("Id", Type::INTEGER).with_attribute(JsonProperty::new().order(0)))
        .member(
            MemberDef::property("Name", Type::STRING)
                .with_attribute(DefaultValue(Value::from("")))
                .with_attribute(JsonProperty::new().default_value_handling(DefaultValueHandling::Ignore)),
        )
        .build();
    let serializer = JsonSerializer::default();

    let obj = Obj::new(&ty);
    obj.set("Id", 5).unwrap();
    obj.set("Name", "").unwrap();
    let value = Value::Object(obj.clone());
    assert_eq!(serializer.to_document(&value, None).unwrap(), json!({"Id": 5}));

    obj.set("Name", "x").unwrap();
    assert_eq!(
        serializer.to_string(&value, None).unwrap(),
        r#"{"Id":5,"Name":"x"}"#
    );
}

#[test]
fn null_values_are_omitted_when_ignored() {
    let ty = person_type();
    let obj = Obj::new(&ty);
    obj.set("Age", 3).unwrap();
    let value = Value::Object(obj);

    let included = JsonSerializer::default().to_document(&value, None).unwrap();
    assert_eq!(included, json!({"Name": null, "Age": 3}));

    let settings = SerializerSettings::default().with_null_value_handling(NullValueHandling::Ignore);
    let ignored = serializer(settings).to_document(&value, None).unwrap();
    assert_eq!(ignored, json!({"Age": 3}));
}

#[test]
fn missing_members() {
    let ty = person_type();
    let text = r#"{"Name":"Ann","unknown":1}"#;

    let read = JsonSerializer::default().from_str(text, &Type::from(&ty)).unwrap();
    assert_eq!(as_obj(&read).get("Name").unwrap(), Value::from("Ann"));

    let strict = serializer(
        SerializerSettings::default().with_missing_member_handling(MissingMemberHandling::Error),
    );
    let err = strict.from_str(text, &Type::from(&ty)).unwrap_err();
    assert!(matches!(
        err.kind(),
        JsonErrorKind::MissingMember { member, .. } if member == "unknown"
    ));
}

#[test]
fn extension_data_captures_unknown_members() {
    let bag = dictionary_of(Type::STRING, Type::Any);
    let ty = TypeDefBuilder::class("App.Open")
        .member(MemberDef::property("Id", Type::INTEGER))
        .member(MemberDef::property("Extra", Type::from(bag)).with_attribute(JsonExtensionData::default()))
        .build();
    let serializer = JsonSerializer::default();

    let read = serializer
        .from_str(r#"{"Id":1,"unknown":1}"#, &Type::from(&ty))
        .unwrap();
    let extra = as_obj(&read).get("Extra").unwrap();
    assert_eq!(
        as_obj(&extra).lookup(&Value::from("unknown")).unwrap(),
        Some(Value::Integer(1))
    );

    assert_eq!(
        serializer.to_document(&read, None).unwrap(),
        json!({"Id": 1, "unknown": 1})
    );
}

#[test]
fn dictionary_with_date_keys() {
    let ty = dictionary_of(Type::DATE_TIME, Type::INTEGER);
    let date = chrono::DateTime::parse_from_rfc3339("2020-01-01T00:00:00Z")
        .unwrap()
        .with_timezone(&chrono::Utc);
    let dict = Obj::new_dict(&ty, vec![(Value::DateTime(date), Value::Integer(7))]);
    let serializer = JsonSerializer::default();

    let text = serializer.to_string(&Value::Object(dict), None).unwrap();
    assert_eq!(text, r#"{"2020-01-01T00:00:00Z":7}"#);

    let read = serializer.from_str(&text, &Type::from(&ty)).unwrap();
    let entries = as_obj(&read).entries().unwrap();
    assert_eq!(entries, vec![(Value::DateTime(date), Value::Integer(7))]);
}

#[test]
fn callbacks_run_around_reading() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let ty = TypeDefBuilder::class("App.Tracked")
        .member(MemberDef::property("Name", Type::STRING))
        .member(MemberDef::property("Loaded", Type::BOOL).with_attribute(JsonIgnore))
        .method(MethodDef::callback("OnLoaded", CallbackRole::OnDeserialized, move |obj, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            obj.set("Loaded", true)?;
            Ok(())
        }))
        .build();
    let serializer = JsonSerializer::default();

    let read = serializer.from_str(r#"{"Name":"a"}"#, &Type::from(&ty)).unwrap();
    assert_eq!(as_obj(&read).get("Loaded").unwrap(), Value::Bool(true));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(serializer.to_string(&read, None).unwrap(), r#"{"Name":"a"}"#);
}

#[test]
fn populate_keeps_missing_members() {
    let ty = person_type();
    let target = person(&ty, "Ann", 1);
    JsonSerializer::default()
        .populate_str(r#"{"Age":5}"#, &target)
        .unwrap();
    assert_eq!(target.get("Name").unwrap(), Value::from("Ann"));
    assert_eq!(target.get("Age").unwrap(), Value::Integer(5));
}

#[test]
fn version_is_created_through_its_constructor() {
    let ty = Type::from(version());
    let serializer = JsonSerializer::default();

    let read = serializer
        .from_str(r#"{"Major":1,"Minor":2,"Build":3,"Revision":4}"#, &ty)
        .unwrap();
    let obj = as_obj(&read);
    assert_eq!(obj.get("Major").unwrap(), Value::Integer(1));
    assert_eq!(obj.get("Revision").unwrap(), Value::Integer(4));

    assert_eq!(
        serializer.to_document(&read, None).unwrap(),
        json!({"Major": 1, "Minor": 2, "Build": 3, "Revision": 4})
    );
}

#[test]
fn constructor_leftovers_are_assigned_after_creation() {
    let tags = list_of(Type::STRING);
    let bag = dictionary_of(Type::STRING, Type::Any);
    let seed_tags = tags.clone();
    let ty = TypeDefBuilder::class("App.Labelled")
        .member(MemberDef::property("Name", Type::STRING).read_only())
        .member(MemberDef::property("Tags", Type::from(&tags)).read_only())
        .member(MemberDef::property("Note", Type::STRING))
        .member(MemberDef::property("Extra", Type::from(bag)).with_attribute(JsonExtensionData::default()))
        .constructor(ConstructorDef::new(
            vec![ParamDef::new("name", Type::STRING)],
            move |ty, mut args| {
                let obj = Obj::new(ty);
                let name = args.pop().unwrap_or(Value::Null);
                if let Some(member) = ty.find_member("Name") {
                    member.provider().set_value(&obj, name)?;
                }
                if let Some(member) = ty.find_member("Tags") {
                    let seeded = Obj::new_list(&seed_tags, vec![Value::from("seed")]);
                    member.provider().set_value(&obj, Value::Object(seeded))?;
                }
                Ok(obj)
            },
        ))
        .build();
    let serializer = JsonSerializer::default();

    let read = serializer
        .from_str(r#"{"Tags":["a","b"],"Note":"n","zz":1,"Name":"N"}"#, &Type::from(&ty))
        .unwrap();
    let tags = as_obj(&read).get("Tags").unwrap();
    assert_eq!(
        as_obj(&tags).items().unwrap(),
        [Value::from("seed"), Value::from("a"), Value::from("b")]
    );
    assert_eq!(
        serializer.to_string(&read, None).unwrap(),
        r#"{"Name":"N","Tags":["seed","a","b"],"Note":"n","zz":1}"#
    );
}

#[test]
fn empty_strings_read_as_null_for_nullable_values() {
    let ty = TypeDefBuilder::class("App.Optional")
        .member(MemberDef::property("When", Type::Nullable(PrimitiveType::DateTime)))
        .build();
    let read = JsonSerializer::default()
        .from_str(r#"{"When":""}"#, &Type::from(&ty))
        .unwrap();
    assert!(as_obj(&read).get("When").unwrap().is_null());
}
