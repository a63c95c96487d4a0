//! Tests that drive whole documents through [`JsonSerializer`].

mod collections;
mod errors;
mod metadata;
mod objects;
mod references;

use cj_reflect::info::{MemberDef, TypeDefBuilder};
use cj_reflect::{Obj, Type, TypeHandle, Value};

use crate::{JsonSerializer, SerializerSettings};

fn serializer(settings: SerializerSettings) -> JsonSerializer {
    JsonSerializer::new(settings)
}

/// `App.Person { Name: string, Age: int }`.
fn person_type() -> TypeHandle {
    TypeDefBuilder::class("App.Person")
        .member(MemberDef::property("Name", Type::STRING))
        .member(MemberDef::property("Age", Type::INTEGER))
        .build()
}

fn person(ty: &TypeHandle, name: &str, age: i64) -> Obj {
    let obj = Obj::new(ty);
    obj.set("Name", name).unwrap();
    obj.set("Age", age).unwrap();
    obj
}

/// `App.Node { Name: string, Next: App.Node }`.
fn node_type() -> TypeHandle {
    let handle = TypeHandle::declare("App.Node");
    TypeDefBuilder::class("App.Node")
        .member(MemberDef::property("Name", Type::STRING))
        .member(MemberDef::property("Next", Type::from(&handle)))
        .define(&handle)
        .unwrap()
}

fn as_obj(value: &Value) -> &Obj {
    value.as_obj().unwrap()
}
