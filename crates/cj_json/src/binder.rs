//! Mapping between types and the names written as `$type`.

use alloc::string::String;
use alloc::sync::Arc;

use cj_reflect::TypeHandle;
use cj_reflect::registry::TypeRegistry;

/// Binds `$type` names to types and back.
pub trait SerializationBinder: Send + Sync {
    /// The type named `name`, or `None` if it is unknown.
    fn bind_to_type(&self, name: &str) -> Option<TypeHandle>;

    /// The name written for `ty`.
    fn bind_to_name(&self, ty: &TypeHandle) -> String;
}

/// Resolves names through a [`TypeRegistry`], by full name first, then by
/// unambiguous short name. Types are written with their full name.
#[derive(Clone)]
pub struct DefaultSerializationBinder {
    registry: Arc<TypeRegistry>,
}

impl DefaultSerializationBinder {
    #[inline]
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self { registry }
    }

    #[inline]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }
}

impl SerializationBinder for DefaultSerializationBinder {
    #[inline]
    fn bind_to_type(&self, name: &str) -> Option<TypeHandle> {
        self.registry.resolve(name).cloned()
    }

    #[inline]
    fn bind_to_name(&self, ty: &TypeHandle) -> String {
        String::from(ty.name())
    }
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use cj_reflect::info::TypeDefBuilder;
    use cj_reflect::registry::TypeRegistry;

    use super::{DefaultSerializationBinder, SerializationBinder};

    #[test]
    fn binds_full_and_short_names() {
        let mut registry = TypeRegistry::new();
        let ty = TypeDefBuilder::class("Shop.Order").build();
        registry.register(&ty);
        let binder = DefaultSerializationBinder::new(Arc::new(registry));

        assert!(binder.bind_to_type("Shop.Order").unwrap().ptr_eq(&ty));
        assert!(binder.bind_to_type("Order").unwrap().ptr_eq(&ty));
        assert!(binder.bind_to_type("Shop.Missing").is_none());
        assert_eq!(binder.bind_to_name(&ty), "Shop.Order");
    }
}
