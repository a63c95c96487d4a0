//! Member access strategies.
//!
//! A [`ValueProvider`] reads and writes one member of an [`Obj`]. Members are
//! bound to a provider once, when their type is defined:
//!
//! - [`SlotValueProvider`] indexes the instance slot directly.
//! - [`FnValueProvider`] calls user supplied accessor closures.

use alloc::string::String;
use alloc::sync::Arc;
use std::sync::{PoisonError, RwLock};

use crate::{BoxedError, Obj, ReflectError, Value};

/// A user supplied getter.
pub type GetFn = Arc<dyn Fn(&Obj) -> Result<Value, BoxedError> + Send + Sync>;

/// A user supplied setter.
pub type SetFn = Arc<dyn Fn(&Obj, Value) -> Result<(), BoxedError> + Send + Sync>;

// -----------------------------------------------------------------------------
// ValueProvider

/// Reads and writes one member of an object.
pub trait ValueProvider: Send + Sync {
    fn get_value(&self, target: &Obj) -> Result<Value, ReflectError>;

    fn set_value(&self, target: &Obj, value: Value) -> Result<(), ReflectError>;

    /// Returns `true` if the provider is able to read at all.
    fn can_read(&self) -> bool;

    /// Returns `true` if the provider is able to write at all.
    fn can_write(&self) -> bool;
}

// -----------------------------------------------------------------------------
// SlotValueProvider

/// Direct access to an instance slot.
///
/// Slots can always be written, even for read-only members, which is what
/// allows field based serialization to restore read-only state.
#[derive(Debug, Clone, Copy)]
pub struct SlotValueProvider {
    index: usize,
}

impl SlotValueProvider {
    #[inline]
    pub const fn new(index: usize) -> Self {
        Self { index }
    }

    #[inline]
    pub const fn index(&self) -> usize {
        self.index
    }
}

impl ValueProvider for SlotValueProvider {
    #[inline]
    fn get_value(&self, target: &Obj) -> Result<Value, ReflectError> {
        target.get_slot(self.index)
    }

    #[inline]
    fn set_value(&self, target: &Obj, value: Value) -> Result<(), ReflectError> {
        target.set_slot(self.index, value)
    }

    #[inline]
    fn can_read(&self) -> bool {
        true
    }

    #[inline]
    fn can_write(&self) -> bool {
        true
    }
}

// -----------------------------------------------------------------------------
// FnValueProvider

/// Access through accessor closures.
#[derive(Clone)]
pub struct FnValueProvider {
    member: String,
    get: Option<GetFn>,
    set: Option<SetFn>,
}

impl FnValueProvider {
    pub fn new(member: impl Into<String>, get: Option<GetFn>, set: Option<SetFn>) -> Self {
        Self {
            member: member.into(),
            get,
            set,
        }
    }

    /// A provider backed by a single shared cell, used for static members.
    pub fn cell(member: impl Into<String>, initial: Value) -> Self {
        let cell = Arc::new(RwLock::new(initial));
        let read = cell.clone();
        let get: GetFn = Arc::new(move |_| {
            Ok(read.read().unwrap_or_else(PoisonError::into_inner).clone())
        });
        let set: SetFn = Arc::new(move |_, value| {
            *cell.write().unwrap_or_else(PoisonError::into_inner) = value;
            Ok(())
        });
        Self::new(member, Some(get), Some(set))
    }
}

impl ValueProvider for FnValueProvider {
    fn get_value(&self, target: &Obj) -> Result<Value, ReflectError> {
        match &self.get {
            Some(get) => get(target).map_err(ReflectError::User),
            None => Err(ReflectError::NotReadable {
                type_name: String::from(target.type_handle().name()),
                member: self.member.clone(),
            }),
        }
    }

    fn set_value(&self, target: &Obj, value: Value) -> Result<(), ReflectError> {
        match &self.set {
            Some(set) => set(target, value).map_err(ReflectError::User),
            None => Err(ReflectError::NotWritable {
                type_name: String::from(target.type_handle().name()),
                member: self.member.clone(),
            }),
        }
    }

    #[inline]
    fn can_read(&self) -> bool {
        self.get.is_some()
    }

    #[inline]
    fn can_write(&self) -> bool {
        self.set.is_some()
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::{FnValueProvider, ValueProvider};
    use crate::info::TypeDefBuilder;
    use crate::{Obj, Value};

    #[test]
    fn cell_provider_is_shared_between_instances() {
        let ty = TypeDefBuilder::class("Test.Counter").build();
        let provider = FnValueProvider::cell("Count", Value::Integer(0));
        let a = Obj::new(&ty);
        let b = Obj::new(&ty);

        provider.set_value(&a, Value::Integer(7)).unwrap();
        assert_eq!(provider.get_value(&b).unwrap(), Value::Integer(7));
    }

    #[test]
    fn missing_accessor_reports_member() {
        let ty = TypeDefBuilder::class("Test.Empty").build();
        let provider = FnValueProvider::new("Hidden", None, None);
        let err = provider.get_value(&Obj::new(&ty)).unwrap_err();
        assert!(err.to_string().contains("Hidden"));
        assert!(!provider.can_write());
    }
}
