//! Process-wide cache with per-principal partitions

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::measure::CompiledMeasure;
use crate::table::ColumnarTable;

use super::{CacheError, CacheKey, CacheStats, LruQueryCache, Principal, QueryCache};

type PartitionSupplier = dyn Fn() -> LruQueryCache + Send + Sync;

/// The default cache: one [`LruQueryCache`] partition per principal, created
/// on demand. Clearing a principal drops their whole partition, so
/// `INVALIDATE` never bleeds into other identities.
pub struct GlobalCache {
    partitions: Mutex<HashMap<Principal, Arc<LruQueryCache>>>,
    supplier: Box<PartitionSupplier>,
}

impl GlobalCache {
    pub fn new() -> Self {
        Self::with_supplier(LruQueryCache::new)
    }

    pub fn with_supplier(supplier: impl Fn() -> LruQueryCache + Send + Sync + 'static) -> Self {
        Self {
            partitions: Mutex::new(HashMap::new()),
            supplier: Box::new(supplier),
        }
    }

    fn partition(&self, principal: &Principal) -> Arc<LruQueryCache> {
        let mut partitions = self.partitions.lock();
        partitions
            .entry(principal.clone())
            .or_insert_with(|| Arc::new((self.supplier)()))
            .clone()
    }
}

impl Default for GlobalCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache for GlobalCache {
    fn contains(&self, measure: &CompiledMeasure, key: &CacheKey) -> bool {
        self.partition(&key.principal).contains(measure, key)
    }

    fn create_raw_result(&self, key: &CacheKey) -> Option<ColumnarTable> {
        self.partition(&key.principal).create_raw_result(key)
    }

    fn contribute_to_result(
        &self,
        table: &mut ColumnarTable,
        measures: &[CompiledMeasure],
        key: &CacheKey,
    ) -> Result<(), CacheError> {
        self.partition(&key.principal)
            .contribute_to_result(table, measures, key)
    }

    fn contribute_to_cache(
        &self,
        table: &ColumnarTable,
        measures: &[CompiledMeasure],
        key: &CacheKey,
    ) {
        self.partition(&key.principal)
            .contribute_to_cache(table, measures, key)
    }

    fn stats(&self, principal: &Principal) -> CacheStats {
        self.partition(principal).stats(principal)
    }

    fn clear(&self, principal: &Principal) {
        let mut partitions = self.partitions.lock();
        partitions.remove(principal);
    }
}
