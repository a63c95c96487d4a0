//! Object identity to reference id mapping for `$id` / `$ref`.

use alloc::string::{String, ToString};

use cj_reflect::Obj;
use cj_utils::hash::{HashMap, NoOpHashMap};

use crate::{JsonError, JsonErrorKind};

// -----------------------------------------------------------------------------
// ReferenceResolver

/// Maps objects to reference ids during one serializer call.
///
/// An object is assigned at most one id; resolving an id that was never
/// added yields `None`.
pub trait ReferenceResolver: Send {
    /// The object registered under `id`.
    fn resolve_reference(&mut self, id: &str) -> Option<Obj>;

    /// The id of `value`, assigning a new one on first use.
    fn get_reference(&mut self, value: &Obj) -> String;

    /// Returns `true` if `value` already has an id.
    fn is_referenced(&self, value: &Obj) -> bool;

    /// Registers `value` under an id read from a document.
    fn add_reference(&mut self, id: &str, value: &Obj) -> Result<(), JsonError>;
}

// -----------------------------------------------------------------------------
// DefaultReferenceResolver

/// Assigns increasing numeric ids, starting at `"1"`.
#[derive(Default)]
pub struct DefaultReferenceResolver {
    counter: u64,
    by_id: HashMap<String, Obj>,
    by_addr: NoOpHashMap<(String, Obj)>,
}

impl DefaultReferenceResolver {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReferenceResolver for DefaultReferenceResolver {
    #[inline]
    fn resolve_reference(&mut self, id: &str) -> Option<Obj> {
        self.by_id.get(id).cloned()
    }

    fn get_reference(&mut self, value: &Obj) -> String {
        if let Some((id, _)) = self.by_addr.get(&value.addr()) {
            return id.clone();
        }
        self.counter += 1;
        let id = self.counter.to_string();
        self.by_addr.insert(value.addr(), (id.clone(), value.clone()));
        self.by_id.insert(id.clone(), value.clone());
        id
    }

    #[inline]
    fn is_referenced(&self, value: &Obj) -> bool {
        self.by_addr.contains_key(&value.addr())
    }

    fn add_reference(&mut self, id: &str, value: &Obj) -> Result<(), JsonError> {
        if let Some(existing) = self.by_id.get(id) {
            if existing.ptr_eq(value) {
                return Ok(());
            }
            return Err(JsonError::new(
                JsonErrorKind::DuplicateReference(String::from(id)),
                String::new(),
            ));
        }
        self.by_id.insert(String::from(id), value.clone());
        self.by_addr
            .insert(value.addr(), (String::from(id), value.clone()));
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use cj_reflect::Obj;
    use cj_reflect::info::TypeDefBuilder;

    use super::{DefaultReferenceResolver, ReferenceResolver};

    #[test]
    fn one_id_per_object() {
        let ty = TypeDefBuilder::class("Graph.Node").build();
        let a = Obj::new(&ty);
        let b = Obj::new(&ty);
        let mut resolver = DefaultReferenceResolver::new();

        assert!(!resolver.is_referenced(&a));
        assert_eq!(resolver.get_reference(&a), "1");
        assert_eq!(resolver.get_reference(&b), "2");
        assert_eq!(resolver.get_reference(&a), "1");
        assert!(resolver.is_referenced(&a));
        assert!(resolver.resolve_reference("2").unwrap().ptr_eq(&b));
        assert!(resolver.resolve_reference("3").is_none());
    }

    #[test]
    fn id_cannot_be_rebound() {
        let ty = TypeDefBuilder::class("Graph.Node").build();
        let a = Obj::new(&ty);
        let mut resolver = DefaultReferenceResolver::new();
        resolver.add_reference("x", &a).unwrap();
        resolver.add_reference("x", &a).unwrap();
        assert!(resolver.add_reference("x", &Obj::new(&ty)).is_err());
    }
}
