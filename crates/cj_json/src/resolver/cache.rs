use alloc::sync::Arc;
use std::sync::{Mutex, PoisonError, RwLock};

use cj_reflect::TypeKey;
use cj_utils::hash::HashMap;

use crate::contract::Contract;

type Snapshot = Arc<HashMap<TypeKey, Arc<Contract>>>;

/// Resolved contracts of one resolver.
///
/// Readers clone the current snapshot and look up without holding a lock.
/// Writers are serialized by `write_lock`, copy the snapshot, insert and
/// publish the copy, so a reader never observes a partially updated map.
pub(crate) struct ContractCache {
    snapshot: RwLock<Snapshot>,
    write_lock: Mutex<()>,
}

impl ContractCache {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(HashMap::default())),
            write_lock: Mutex::new(()),
        }
    }

    #[inline]
    fn current(&self) -> Snapshot {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, key: &TypeKey) -> Option<Arc<Contract>> {
        self.current().get(key).cloned()
    }

    /// Publishes `contract` under `key`.
    ///
    /// If another caller resolved the same type in the meantime, its contract
    /// is kept and returned instead.
    pub fn insert(&self, key: TypeKey, contract: Arc<Contract>) -> Arc<Contract> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.current();
        if let Some(existing) = current.get(&key) {
            return existing.clone();
        }
        let mut next = HashMap::clone(&current);
        next.insert(key, contract.clone());
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
        contract
    }

    pub fn len(&self) -> usize {
        self.current().len()
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use cj_reflect::{PrimitiveType, Type};

    use super::ContractCache;
    use crate::contract::{Contract, ContractDetails, PrimitiveDetails};

    fn primitive(p: PrimitiveType) -> Arc<Contract> {
        Arc::new(Contract::new(
            Type::Primitive(p),
            ContractDetails::Primitive(PrimitiveDetails {
                primitive: p,
                convertible: None,
            }),
        ))
    }

    #[test]
    fn first_insert_wins() {
        let cache = ContractCache::new();
        let key = Type::INTEGER.key();
        let first = primitive(PrimitiveType::Integer);
        let second = primitive(PrimitiveType::Integer);

        assert!(cache.get(&key).is_none());
        let stored = cache.insert(key, first.clone());
        assert!(Arc::ptr_eq(&stored, &first));
        let stored = cache.insert(key, second);
        assert!(Arc::ptr_eq(&stored, &first));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn readers_keep_their_snapshot() {
        let cache = ContractCache::new();
        let before = cache.current();
        cache.insert(Type::BOOL.key(), primitive(PrimitiveType::Bool));
        assert!(before.is_empty());
        assert_eq!(cache.current().len(), 1);
    }
}
