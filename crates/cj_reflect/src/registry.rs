//! Name based lookup of type definitions.

use alloc::string::String;

use cj_utils::hash::{HashMap, HashSet};

use crate::TypeHandle;
use crate::builtins;

// -----------------------------------------------------------------------------
// TypeRegistry

/// A registry of type definitions, keyed by full and short name.
///
/// Short names that are shared by several registered types are ambiguous
/// and can only be looked up by full name.
///
/// ```
/// use cj_reflect::info::TypeDefBuilder;
/// use cj_reflect::registry::TypeRegistry;
///
/// let mut registry = TypeRegistry::empty();
/// let a = TypeDefBuilder::class("Shop.Order").build();
/// let b = TypeDefBuilder::class("Billing.Order").build();
/// registry.register(&a);
/// registry.register(&b);
///
/// assert!(registry.get("Shop.Order").unwrap().ptr_eq(&a));
/// assert!(registry.get_with_short_name("Order").is_none());
/// ```
pub struct TypeRegistry {
    types: HashMap<String, TypeHandle>,
    short_names: HashMap<String, String>,
    ambiguous_names: HashSet<String>,
}

impl Default for TypeRegistry {
    /// See [`TypeRegistry::new`] .
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Creates an empty registry.
    #[inline]
    pub fn empty() -> Self {
        Self {
            types: HashMap::default(),
            short_names: HashMap::default(),
            ambiguous_names: HashSet::default(),
        }
    }

    /// Creates a registry containing the built-in types.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(&builtins::version());
        registry
    }

    /// Registers a type. Returns `false` if its full name is already taken.
    pub fn register(&mut self, ty: &TypeHandle) -> bool {
        let full = String::from(ty.name());
        if self.types.contains_key(&full) {
            return false;
        }
        let short = String::from(ty.short_name());
        if !self.ambiguous_names.contains(&short) {
            if self.short_names.contains_key(&short) {
                self.short_names.remove(&short);
                self.ambiguous_names.insert(short);
            } else {
                self.short_names.insert(short, full.clone());
            }
        }
        self.types.insert(full, ty.clone());
        true
    }

    /// Looks up a type by full name.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&TypeHandle> {
        self.types.get(name)
    }

    /// Looks up a type by unambiguous short name.
    pub fn get_with_short_name(&self, name: &str) -> Option<&TypeHandle> {
        self.short_names.get(name).and_then(|full| self.types.get(full))
    }

    /// Looks up a type by full name, then by short name.
    pub fn resolve(&self, name: &str) -> Option<&TypeHandle> {
        self.get(name).or_else(|| self.get_with_short_name(name))
    }

    #[inline]
    pub fn is_ambiguous(&self, short_name: &str) -> bool {
        self.ambiguous_names.contains(short_name)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeHandle> {
        self.types.values()
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::TypeRegistry;
    use crate::info::TypeDefBuilder;

    #[test]
    fn builtins_are_registered() {
        let registry = TypeRegistry::new();
        assert!(registry.get("System.Version").is_some());
        assert!(registry.resolve("Version").is_some());
    }

    #[test]
    fn duplicate_full_name_is_rejected() {
        let mut registry = TypeRegistry::empty();
        let a = TypeDefBuilder::class("App.Item").build();
        let b = TypeDefBuilder::class("App.Item").build();
        assert!(registry.register(&a));
        assert!(!registry.register(&b));
        assert!(registry.resolve("Item").unwrap().ptr_eq(&a));
    }

    #[test]
    fn ambiguous_short_names_stay_ambiguous() {
        let mut registry = TypeRegistry::empty();
        registry.register(&TypeDefBuilder::class("A.Item").build());
        registry.register(&TypeDefBuilder::class("B.Item").build());
        registry.register(&TypeDefBuilder::class("C.Item").build());
        assert!(registry.is_ambiguous("Item"));
        assert!(registry.get_with_short_name("Item").is_none());
        assert_eq!(registry.len(), 3);
    }
}
