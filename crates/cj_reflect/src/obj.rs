use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::info::MemberDef;
use crate::{ReflectError, TypeHandle, Value};

// -----------------------------------------------------------------------------
// Content

/// The non-member payload of an instance.
#[derive(Default)]
pub enum Content {
    #[default]
    None,
    /// Items of a list, array or enumerable.
    List(Vec<Value>),
    /// A multidimensional array stored in row-major order.
    Grid { dims: Vec<usize>, items: Vec<Value> },
    /// Entries of a dictionary in insertion order.
    Dict(Vec<(Value, Value)>),
    /// Members of a dynamic object in insertion order.
    Bag(Vec<(String, Value)>),
    /// An opaque Rust payload, e.g. the state behind closure accessors.
    Native(Box<dyn Any + Send + Sync>),
}

impl Content {
    /// A copy of the content; native payloads are not cloneable and are dropped.
    pub(crate) fn snapshot(&self) -> Content {
        match self {
            Self::None | Self::Native(_) => Self::None,
            Self::List(items) => Self::List(items.clone()),
            Self::Grid { dims, items } => Self::Grid {
                dims: dims.clone(),
                items: items.clone(),
            },
            Self::Dict(entries) => Self::Dict(entries.clone()),
            Self::Bag(entries) => Self::Bag(entries.clone()),
        }
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::List(items) => write!(f, "List(len = {})", items.len()),
            Self::Grid { dims, .. } => write!(f, "Grid({dims:?})"),
            Self::Dict(entries) => write!(f, "Dict(len = {})", entries.len()),
            Self::Bag(entries) => write!(f, "Bag(len = {})", entries.len()),
            Self::Native(_) => f.write_str("Native"),
        }
    }
}

// -----------------------------------------------------------------------------
// Instance

/// The state behind an [`Obj`].
pub struct Instance {
    ty: TypeHandle,
    pub slots: Vec<Value>,
    pub content: Content,
}

impl Instance {
    #[inline]
    pub fn type_handle(&self) -> &TypeHandle {
        &self.ty
    }
}

// -----------------------------------------------------------------------------
// Obj

/// A shared, mutable object. Cloning the handle shares the instance;
/// identity is the identity of the allocation.
#[derive(Clone)]
pub struct Obj(Arc<RwLock<Instance>>);

impl Obj {
    /// Allocates an instance with every slot set to its type's default value,
    /// without running any constructor.
    ///
    /// Collection types start with empty content of their kind.
    pub fn new(ty: &TypeHandle) -> Self {
        let def = ty.def();
        let caps = def.capabilities();
        let content = if caps.dictionary.is_some() {
            Content::Dict(Vec::new())
        } else if caps.list.is_some() {
            Content::List(Vec::new())
        } else if let Some(grid) = &caps.grid {
            Content::Grid {
                dims: alloc::vec![0; grid.rank],
                items: Vec::new(),
            }
        } else if caps.dynamic {
            Content::Bag(Vec::new())
        } else {
            Content::None
        };
        Self::with_content(ty, def.slot_defaults(), content)
    }

    pub fn with_content(ty: &TypeHandle, slots: Vec<Value>, content: Content) -> Self {
        Self(Arc::new(RwLock::new(Instance {
            ty: ty.clone(),
            slots,
            content,
        })))
    }

    /// Creates a list-backed instance.
    pub fn new_list(ty: &TypeHandle, items: Vec<Value>) -> Self {
        let obj = Self::new(ty);
        obj.write().content = Content::List(items);
        obj
    }

    /// Creates a dictionary-backed instance.
    pub fn new_dict(ty: &TypeHandle, entries: Vec<(Value, Value)>) -> Self {
        let obj = Self::new(ty);
        obj.write().content = Content::Dict(entries);
        obj
    }

    #[inline]
    pub fn read(&self) -> RwLockReadGuard<'_, Instance> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    pub fn write(&self) -> RwLockWriteGuard<'_, Instance> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    pub fn type_handle(&self) -> TypeHandle {
        self.read().ty.clone()
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Obj) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// A stable identity for the lifetime of the object.
    #[inline]
    pub fn addr(&self) -> u64 {
        Arc::as_ptr(&self.0) as usize as u64
    }

    pub(crate) fn snapshot(&self) -> (Vec<Value>, Content) {
        let guard = self.read();
        (guard.slots.clone(), guard.content.snapshot())
    }

    // -------------------------------------------------------------------------
    // Slots

    pub fn get_slot(&self, index: usize) -> Result<Value, ReflectError> {
        let guard = self.read();
        guard
            .slots
            .get(index)
            .cloned()
            .ok_or_else(|| ReflectError::SlotOutOfRange {
                type_name: String::from(guard.ty.name()),
                index,
            })
    }

    pub fn set_slot(&self, index: usize, value: Value) -> Result<(), ReflectError> {
        let mut guard = self.write();
        if let Some(slot) = guard.slots.get_mut(index) {
            *slot = value;
            return Ok(());
        }
        Err(ReflectError::SlotOutOfRange {
            type_name: String::from(guard.ty.name()),
            index,
        })
    }

    // -------------------------------------------------------------------------
    // Members

    fn find_member<R>(
        &self,
        name: &str,
        f: impl FnOnce(&MemberDef) -> Result<R, ReflectError>,
    ) -> Result<R, ReflectError> {
        let ty = self.type_handle();
        match ty.find_member(name) {
            Some(member) => f(member),
            None => Err(ReflectError::MissingMember {
                type_name: String::from(ty.name()),
                member: String::from(name),
            }),
        }
    }

    /// Reads an instance member by name, most-derived declaration first.
    pub fn get(&self, name: &str) -> Result<Value, ReflectError> {
        self.find_member(name, |m| m.provider().get_value(self))
    }

    /// Writes an instance member by name, most-derived declaration first.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<(), ReflectError> {
        let value = value.into();
        self.find_member(name, |m| m.provider().set_value(self, value))
    }

    // -------------------------------------------------------------------------
    // Content

    /// A copy of the list items.
    pub fn items(&self) -> Result<Vec<Value>, ReflectError> {
        let guard = self.read();
        match &guard.content {
            Content::List(items) | Content::Grid { items, .. } => Ok(items.clone()),
            _ => Err(content_error(&guard, "list")),
        }
    }

    pub fn item_count(&self) -> Result<usize, ReflectError> {
        let guard = self.read();
        match &guard.content {
            Content::List(items) | Content::Grid { items, .. } => Ok(items.len()),
            _ => Err(content_error(&guard, "list")),
        }
    }

    /// Appends a list item; instances without content become lists.
    pub fn push(&self, value: Value) -> Result<(), ReflectError> {
        let mut guard = self.write();
        let accepted = match &mut guard.content {
            Content::List(items) => {
                items.push(value);
                true
            }
            content @ Content::None => {
                *content = Content::List(alloc::vec![value]);
                true
            }
            _ => false,
        };
        if accepted {
            Ok(())
        } else {
            Err(content_error(&guard, "list"))
        }
    }

    /// A copy of the dictionary entries.
    pub fn entries(&self) -> Result<Vec<(Value, Value)>, ReflectError> {
        let guard = self.read();
        match &guard.content {
            Content::Dict(entries) => Ok(entries.clone()),
            _ => Err(content_error(&guard, "dictionary")),
        }
    }

    /// Inserts or replaces a dictionary entry; instances without content
    /// become dictionaries.
    pub fn upsert(&self, key: Value, value: Value) -> Result<(), ReflectError> {
        let mut guard = self.write();
        let accepted = match &mut guard.content {
            Content::Dict(entries) => {
                match entries.iter_mut().find(|(k, _)| *k == key) {
                    Some(entry) => entry.1 = value,
                    None => entries.push((key, value)),
                }
                true
            }
            content @ Content::None => {
                *content = Content::Dict(alloc::vec![(key, value)]);
                true
            }
            _ => false,
        };
        if accepted {
            Ok(())
        } else {
            Err(content_error(&guard, "dictionary"))
        }
    }

    /// Looks up a dictionary entry.
    pub fn lookup(&self, key: &Value) -> Result<Option<Value>, ReflectError> {
        let guard = self.read();
        match &guard.content {
            Content::Dict(entries) => Ok(entries
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())),
            _ => Err(content_error(&guard, "dictionary")),
        }
    }

    /// A copy of the dynamic members.
    pub fn bag(&self) -> Result<Vec<(String, Value)>, ReflectError> {
        let guard = self.read();
        match &guard.content {
            Content::Bag(entries) => Ok(entries.clone()),
            Content::None => Ok(Vec::new()),
            _ => Err(content_error(&guard, "dynamic")),
        }
    }

    /// Sets a dynamic member, replacing an existing one of the same name.
    pub fn set_dynamic(&self, name: &str, value: Value) -> Result<(), ReflectError> {
        let mut guard = self.write();
        let accepted = match &mut guard.content {
            Content::Bag(entries) => {
                match entries.iter_mut().find(|(k, _)| k == name) {
                    Some(entry) => entry.1 = value,
                    None => entries.push((String::from(name), value)),
                }
                true
            }
            content @ Content::None => {
                *content = Content::Bag(alloc::vec![(String::from(name), value)]);
                true
            }
            _ => false,
        };
        if accepted {
            Ok(())
        } else {
            Err(content_error(&guard, "dynamic"))
        }
    }

    /// Dimensions and items of a multidimensional array.
    pub fn grid(&self) -> Result<(Vec<usize>, Vec<Value>), ReflectError> {
        let guard = self.read();
        match &guard.content {
            Content::Grid { dims, items } => Ok((dims.clone(), items.clone())),
            _ => Err(content_error(&guard, "multidimensional array")),
        }
    }
}

fn content_error(instance: &Instance, expected: &'static str) -> ReflectError {
    ReflectError::InvalidContent {
        type_name: String::from(instance.ty.name()),
        expected,
    }
}

impl PartialEq for Obj {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Obj({} @ {:#x})", self.type_handle().name(), self.addr())
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use crate::info::{MemberDef, TypeDefBuilder};
    use crate::{Obj, Type, Value};

    #[test]
    fn identity_and_slots() {
        let ty = TypeDefBuilder::class("Test.Item")
            .member(MemberDef::property("Name", Type::STRING))
            .build();
        let a = Obj::new(&ty);
        let b = a.clone();
        let c = Obj::new(&ty);

        a.set("Name", "x").unwrap();
        assert_eq!(b.get("Name").unwrap(), Value::from("x"));
        assert!(a.ptr_eq(&b));
        assert_ne!(a, c);
        assert!(a.get("Missing").is_err());
    }

    #[test]
    fn dictionary_upsert_replaces() {
        let ty = TypeDefBuilder::class("Test.Map").build();
        let map = Obj::new(&ty);
        map.upsert(Value::from("a"), Value::Integer(1)).unwrap();
        map.upsert(Value::from("a"), Value::Integer(2)).unwrap();
        assert_eq!(map.entries().unwrap().len(), 1);
        assert_eq!(
            map.lookup(&Value::from("a")).unwrap(),
            Some(Value::Integer(2))
        );
        assert!(map.push(Value::Null).is_err());
    }
}
