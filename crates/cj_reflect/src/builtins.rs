//! Built-in type definitions.
//!
//! Collections are described per item type, so each helper creates a new,
//! distinct type. Create them once and share the handles.

use alloc::format;
use alloc::vec;
use alloc::vec::Vec;
use std::sync::LazyLock;

use crate::info::{
    ConstructorDef, DictionaryCapability, ListCapability, MemberDef, ParamDef, TypeDefBuilder,
};
use crate::{Type, TypeHandle};

/// Generic definition name of [`key_value_pair`] types.
pub const KEY_VALUE_PAIR: &str = "KeyValuePair";

static VERSION: LazyLock<TypeHandle> = LazyLock::new(|| {
    let int = || Type::INTEGER;
    let params = |names: &[&str]| -> Vec<ParamDef> {
        names.iter().map(|n| ParamDef::new(*n, int())).collect()
    };
    TypeDefBuilder::class("System.Version")
        .member(MemberDef::property("Major", int()).read_only())
        .member(MemberDef::property("Minor", int()).read_only())
        .member(MemberDef::property("Build", int()).read_only().with_initial(-1))
        .member(MemberDef::property("Revision", int()).read_only().with_initial(-1))
        .constructor(ConstructorDef::assigning(Vec::new(), &[]))
        .constructor(ConstructorDef::assigning(
            params(&["major", "minor"]),
            &["Major", "Minor"],
        ))
        .constructor(ConstructorDef::assigning(
            params(&["major", "minor", "build"]),
            &["Major", "Minor", "Build"],
        ))
        .constructor(ConstructorDef::assigning(
            params(&["major", "minor", "build", "revision"]),
            &["Major", "Minor", "Build", "Revision"],
        ))
        .build()
});

/// The `System.Version` type: four read-only integer components, created
/// through its four-argument constructor.
pub fn version() -> TypeHandle {
    VERSION.clone()
}

/// A key/value pair struct with read-only `Key` and `Value` members.
pub fn key_value_pair(key: Type, value: Type) -> TypeHandle {
    TypeDefBuilder::structure(format!("KeyValuePair<{key},{value}>"))
        .generic(KEY_VALUE_PAIR, vec![key.clone(), value.clone()])
        .member(MemberDef::property("Key", key.clone()).read_only())
        .member(MemberDef::property("Value", value.clone()).read_only())
        .constructor(ConstructorDef::assigning(
            vec![ParamDef::new("key", key), ParamDef::new("value", value)],
            &["Key", "Value"],
        ))
        .build()
}

/// Returns `true` for types created by [`key_value_pair`].
pub fn is_key_value_pair(ty: &TypeHandle) -> bool {
    ty.def()
        .generic()
        .is_some_and(|g| g.definition == KEY_VALUE_PAIR)
}

/// A growable list.
pub fn list_of(item: Type) -> TypeHandle {
    TypeDefBuilder::class(format!("List<{item}>"))
        .generic("List", vec![item.clone()])
        .list(item)
        .build()
}

/// A read-only wrapper around a list; it cannot be populated in place.
pub fn read_only_list_of(item: Type) -> TypeHandle {
    TypeDefBuilder::class(format!("ReadOnlyCollection<{item}>"))
        .generic("ReadOnlyCollection", vec![item.clone()])
        .list_capability(ListCapability {
            item,
            fixed_size: false,
            read_only: true,
        })
        .build()
}

/// A fixed-size, one-dimensional array.
pub fn array_of(item: Type) -> TypeHandle {
    TypeDefBuilder::class(format!("{item}[]"))
        .list_capability(ListCapability {
            item,
            fixed_size: true,
            read_only: false,
        })
        .build()
}

/// A multidimensional array of the given rank.
pub fn multi_array_of(item: Type, rank: usize) -> TypeHandle {
    let commas = ",".repeat(rank.saturating_sub(1));
    TypeDefBuilder::class(format!("{item}[{commas}]"))
        .grid(item, rank)
        .build()
}

/// A dictionary.
pub fn dictionary_of(key: Type, value: Type) -> TypeHandle {
    TypeDefBuilder::class(format!("Dictionary<{key},{value}>"))
        .generic("Dictionary", vec![key.clone(), value.clone()])
        .dictionary_capability(DictionaryCapability {
            key,
            value,
            read_only: false,
        })
        .build()
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::{array_of, key_value_pair, multi_array_of, version};
    use crate::{Obj, Type, Value};

    #[test]
    fn version_four_argument_constructor() {
        let ty = version();
        let ctor = ty
            .def()
            .constructors()
            .iter()
            .find(|c| c.params().len() == 4)
            .unwrap();
        let v = ctor
            .invoke(&ty, vec![1.into(), 2.into(), 3.into(), 4.into()])
            .unwrap();
        assert_eq!(v.get("Revision").unwrap(), Value::Integer(4));
        assert!(!ty.find_member("Major").unwrap().is_writable());
    }

    #[test]
    fn collection_names() {
        assert_eq!(array_of(Type::INTEGER).name(), "Int64[]");
        assert_eq!(multi_array_of(Type::STRING, 3).name(), "String[,,]");
        let kvp = key_value_pair(Type::STRING, Type::INTEGER);
        assert_eq!(kvp.name(), "KeyValuePair<String,Int64>");
        assert!(super::is_key_value_pair(&kvp));
        let list = Obj::new(&array_of(Type::INTEGER));
        assert_eq!(list.item_count().unwrap(), 0);
    }
}
