use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use propdesk_core::TenantId;

use super::{StoreError, StoreResult};

/// Tenant-partitioned key/value store abstraction.
///
/// Every method takes the tenant explicitly; there is no way to address a row
/// without naming its tenant.
pub trait TenantStore<K, V>: Send + Sync {
    fn get(&self, tenant_id: TenantId, key: &K) -> StoreResult<Option<V>>;
    fn list(&self, tenant_id: TenantId) -> StoreResult<Vec<V>>;
}

/// In-memory tenant-partitioned store for tests/dev.
///
/// One lock guards all partitions, so [`InMemoryTenantStore::transact`] gives
/// multi-row atomicity within a tenant.
#[derive(Debug)]
pub struct InMemoryTenantStore<K, V> {
    inner: RwLock<HashMap<TenantId, HashMap<K, V>>>,
}

impl<K, V> InMemoryTenantStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<TenantId, HashMap<K, V>>>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<TenantId, HashMap<K, V>>>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }
}

impl<K, V> InMemoryTenantStore<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Run `f` against one tenant's rows under the write lock.
    ///
    /// Readers never observe an intermediate state of `f`.
    pub fn transact<R>(
        &self,
        tenant_id: TenantId,
        f: impl FnOnce(&mut HashMap<K, V>) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let mut map = self.write()?;
        f(map.entry(tenant_id).or_default())
    }

    /// Rows of one tenant matching `pred`.
    pub fn filter(&self, tenant_id: TenantId, pred: impl Fn(&V) -> bool) -> StoreResult<Vec<V>> {
        let map = self.read()?;
        Ok(map
            .get(&tenant_id)
            .map(|rows| rows.values().filter(|v| pred(v)).cloned().collect())
            .unwrap_or_default())
    }

    /// First row of any tenant matching `pred`, with its tenant.
    ///
    /// Only for lookups by globally unique keys.
    pub fn find_any(&self, pred: impl Fn(&V) -> bool) -> StoreResult<Option<(TenantId, V)>> {
        let map = self.read()?;
        Ok(map.iter().find_map(|(tenant_id, rows)| {
            rows.values().find(|v| pred(v)).map(|v| (*tenant_id, v.clone()))
        }))
    }
}

impl<K, V> Default for InMemoryTenantStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TenantStore<K, V> for InMemoryTenantStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> StoreResult<Option<V>> {
        let map = self.read()?;
        Ok(map.get(&tenant_id).and_then(|rows| rows.get(key)).cloned())
    }

    fn list(&self, tenant_id: TenantId) -> StoreResult<Vec<V>> {
        self.filter(tenant_id, |_| true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_are_isolated() {
        let store: InMemoryTenantStore<u32, &str> = InMemoryTenantStore::new();
        let (a, b) = (TenantId::new(), TenantId::new());
        store.transact(a, |rows| Ok(rows.insert(1, "a1"))).unwrap();
        store.transact(b, |rows| Ok(rows.insert(1, "b1"))).unwrap();

        assert_eq!(store.get(a, &1).unwrap(), Some("a1"));
        assert_eq!(store.list(b).unwrap(), vec!["b1"]);
        store.transact(a, |rows| Ok(rows.remove(&1))).unwrap();
        assert_eq!(store.get(a, &1).unwrap(), None);
        assert_eq!(store.get(b, &1).unwrap(), Some("b1"));
        assert_eq!(store.find_any(|v| *v == "b1").unwrap(), Some((b, "b1")));
    }

    #[test]
    fn failed_transaction_reports_error() {
        let store: InMemoryTenantStore<u32, u32> = InMemoryTenantStore::new();
        let t = TenantId::new();
        let result: StoreResult<()> =
            store.transact(t, |_| Err(StoreError::Conflict("nope".into())));
        assert_eq!(result, Err(StoreError::Conflict("nope".into())));
        assert!(store.list(t).unwrap().is_empty());
    }
}
