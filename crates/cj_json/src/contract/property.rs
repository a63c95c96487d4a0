use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use std::sync::OnceLock;

use cj_reflect::access::ValueProvider;
use cj_reflect::{BoxedError, Obj, ReflectError, Type, TypeHandle, Value};
use cj_utils::hash::HashMap;

use super::Contract;
use crate::ContractError;
use crate::converter::JsonConverter;
use crate::naming::eq_ignore_case;
use crate::resolver::ContractResolver;
use crate::settings::{
    DefaultValueHandling, NullValueHandling, ObjectCreationHandling, ReferenceLoopHandling,
    Required, TypeNameHandling,
};

/// A predicate on the owning object, e.g. `ShouldSerializeName`.
pub type Predicate = Arc<dyn Fn(&Obj) -> Result<bool, BoxedError> + Send + Sync>;

/// Flips the `{Name}Specified` companion of a member.
pub type SpecifiedSetter = Arc<dyn Fn(&Obj, bool) -> Result<(), BoxedError> + Send + Sync>;

// -----------------------------------------------------------------------------
// Property

/// How one member, constructor parameter or dynamic member is read and
/// written.
///
/// The handling options are `None` unless set on the member; unset options
/// fall back to the serializer settings when they are used.
#[derive(Clone)]
pub struct Property {
    /// The name in the document, after the naming strategy.
    pub name: String,
    /// The name of the member.
    pub underlying_name: String,
    pub declaring_type: Option<TypeHandle>,
    pub property_type: Type,
    pub value_provider: Option<Arc<dyn ValueProvider>>,
    pub readable: bool,
    pub writable: bool,
    pub ignored: bool,
    /// Explicitly marked for serialization.
    pub has_member_attribute: bool,
    pub order: Option<i32>,
    pub required: Option<Required>,
    pub null_value_handling: Option<NullValueHandling>,
    pub default_value_handling: Option<DefaultValueHandling>,
    pub reference_loop_handling: Option<ReferenceLoopHandling>,
    pub object_creation_handling: Option<ObjectCreationHandling>,
    pub type_name_handling: Option<TypeNameHandling>,
    pub default_value: Option<Value>,
    pub converter: Option<Arc<dyn JsonConverter>>,
    pub is_reference: Option<bool>,
    pub item_converter: Option<Arc<dyn JsonConverter>>,
    pub item_is_reference: Option<bool>,
    pub item_reference_loop_handling: Option<ReferenceLoopHandling>,
    pub item_type_name_handling: Option<TypeNameHandling>,
    pub should_serialize: Option<Predicate>,
    pub should_deserialize: Option<Predicate>,
    pub get_is_specified: Option<Predicate>,
    pub set_is_specified: Option<SpecifiedSetter>,
    property_contract: OnceLock<Arc<Contract>>,
}

impl Property {
    pub fn new(name: impl Into<String>, property_type: Type) -> Self {
        let name = name.into();
        Self {
            underlying_name: name.clone(),
            name,
            declaring_type: None,
            property_type,
            value_provider: None,
            readable: false,
            writable: false,
            ignored: false,
            has_member_attribute: false,
            order: None,
            required: None,
            null_value_handling: None,
            default_value_handling: None,
            reference_loop_handling: None,
            object_creation_handling: None,
            type_name_handling: None,
            default_value: None,
            converter: None,
            is_reference: None,
            item_converter: None,
            item_is_reference: None,
            item_reference_loop_handling: None,
            item_type_name_handling: None,
            should_serialize: None,
            should_deserialize: None,
            get_is_specified: None,
            set_is_specified: None,
            property_contract: OnceLock::new(),
        }
    }

    /// The value assigned to a missing member when defaults are populated.
    pub fn resolved_default_value(&self) -> Value {
        self.default_value
            .clone()
            .unwrap_or_else(|| self.property_type.default_value())
    }

    /// The requiredness of the member, or `fallback` when it declares none.
    #[inline]
    pub fn required_or(&self, fallback: Option<Required>) -> Required {
        self.required.or(fallback).unwrap_or_default()
    }

    /// The contract of the declared type, resolved on first use.
    pub fn property_contract(
        &self,
        resolver: &ContractResolver,
    ) -> Result<Arc<Contract>, ContractError> {
        if let Some(contract) = self.property_contract.get() {
            return Ok(contract.clone());
        }
        let contract = resolver.resolve(&self.property_type)?;
        let _ = self.property_contract.set(contract.clone());
        Ok(contract)
    }

    pub fn get_value(&self, target: &Obj) -> Result<Value, ReflectError> {
        match &self.value_provider {
            Some(provider) => provider.get_value(target),
            None => Err(ReflectError::NotReadable {
                type_name: String::from(target.type_handle().name()),
                member: self.underlying_name.clone(),
            }),
        }
    }

    pub fn set_value(&self, target: &Obj, value: Value) -> Result<(), ReflectError> {
        match &self.value_provider {
            Some(provider) => provider.set_value(target, value),
            None => Err(ReflectError::NotWritable {
                type_name: String::from(target.type_handle().name()),
                member: self.underlying_name.clone(),
            }),
        }
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("underlying_name", &self.underlying_name)
            .field("property_type", &self.property_type)
            .field("readable", &self.readable)
            .field("writable", &self.writable)
            .field("ignored", &self.ignored)
            .field("order", &self.order)
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

// -----------------------------------------------------------------------------
// PropertyCollection

/// The properties of an object contract, keyed by document name.
#[derive(Clone, Default)]
pub struct PropertyCollection {
    items: Vec<Property>,
    indices: HashMap<String, usize>,
}

impl PropertyCollection {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a property.
    ///
    /// A property whose name is taken replaces an ignored one, is dropped when
    /// ignored itself, and hides a property declared on a base type.
    /// Any other name clash is an error.
    pub fn add(&mut self, property: Property, type_name: &str) -> Result<(), ContractError> {
        let Some(&index) = self.indices.get(&property.name) else {
            self.push(property);
            return Ok(());
        };
        if property.ignored {
            return Ok(());
        }

        let existing = &self.items[index];
        if !existing.ignored {
            match (&property.declaring_type, &existing.declaring_type) {
                (Some(new), Some(old)) if !new.ptr_eq(old) && new.is_subtype_of(old) => {}
                (Some(new), Some(old)) if !new.ptr_eq(old) && old.is_subtype_of(new) => {
                    return Ok(());
                }
                _ => {
                    return Err(ContractError::DuplicateProperty {
                        type_name: String::from(type_name),
                        name: property.name,
                    });
                }
            }
        }

        self.items.remove(index);
        self.push(property);
        self.reindex();
        Ok(())
    }

    fn push(&mut self, property: Property) {
        self.indices.insert(property.name.clone(), self.items.len());
        self.items.push(property);
    }

    fn reindex(&mut self) {
        self.indices.clear();
        for (index, property) in self.items.iter().enumerate() {
            self.indices.insert(property.name.clone(), index);
        }
    }

    /// Sorts by order; unordered properties sort as `-1`, ties keep their
    /// discovery order.
    pub fn sort_by_order(&mut self) {
        self.items.sort_by_key(|p| p.order.unwrap_or(-1));
        self.reindex();
    }

    /// The property with exactly this name.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&Property> {
        self.indices.get(name).map(|&index| &self.items[index])
    }

    /// The property with exactly this name, else the first one whose name
    /// matches ignoring case.
    pub fn get_closest_match(&self, name: &str) -> Option<&Property> {
        self.get(name)
            .or_else(|| self.items.iter().find(|p| eq_ignore_case(&p.name, name)))
    }

    /// Position of the property in the collection.
    #[inline]
    pub fn index_of(&self, property: &Property) -> Option<usize> {
        self.indices.get(&property.name).copied()
    }

    #[inline]
    pub fn get_index(&self, index: usize) -> Option<&Property> {
        self.items.get(index)
    }

    #[inline]
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Property> {
        self.items.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl fmt::Debug for PropertyCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use cj_reflect::Type;
    use cj_reflect::info::TypeDefBuilder;

    use super::{Property, PropertyCollection};

    fn declared(name: &str, ty: &cj_reflect::TypeHandle) -> Property {
        let mut property = Property::new(name, Type::STRING);
        property.declaring_type = Some(ty.clone());
        property
    }

    #[test]
    fn derived_member_hides_base_member() {
        let base = TypeDefBuilder::class("Zoo.Animal").build();
        let dog = TypeDefBuilder::class("Zoo.Dog").base(&base).build();

        let mut properties = PropertyCollection::new();
        properties.add(declared("Name", &base), "Zoo.Dog").unwrap();
        properties.add(declared("Name", &dog), "Zoo.Dog").unwrap();
        assert_eq!(properties.len(), 1);
        assert!(properties.get("Name").unwrap().declaring_type.as_ref().unwrap().ptr_eq(&dog));

        let err = properties.add(declared("Name", &dog), "Zoo.Dog").unwrap_err();
        assert!(err.to_string().contains("'Name' already exists"));
    }

    #[test]
    fn ignored_properties_give_way() {
        let ty = TypeDefBuilder::class("App.Item").build();
        let mut ignored = declared("Id", &ty);
        ignored.ignored = true;

        let mut properties = PropertyCollection::new();
        properties.add(ignored.clone(), "App.Item").unwrap();
        properties.add(declared("Id", &ty), "App.Item").unwrap();
        properties.add(ignored, "App.Item").unwrap();
        assert_eq!(properties.len(), 1);
        assert!(!properties.get("Id").unwrap().ignored);
    }

    #[test]
    fn order_sort_is_stable_and_unordered_first() {
        let mut properties = PropertyCollection::new();
        for (name, order) in [("c", Some(2)), ("a", Some(0)), ("b", Some(1)), ("x", None)] {
            let mut property = Property::new(name, Type::INTEGER);
            property.order = order;
            properties.add(property, "T").unwrap();
        }
        properties.sort_by_order();
        let names: Vec<_> = properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["x", "a", "b", "c"]);
        assert_eq!(properties.get_closest_match("X").unwrap().name, "x");
    }
}
