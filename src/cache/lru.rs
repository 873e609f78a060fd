//! Size-bounded LRU cache

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;

use crate::measure::CompiledMeasure;
use crate::table::{ColumnarTable, Header};
use crate::value::Value;

use super::{CacheError, CacheKey, CacheStats, Principal, QueryCache};

const DEFAULT_CAPACITY: usize = 32;

/// One cached scope: the grouping-column skeleton plus the measure columns
/// contributed so far, all row-aligned with the skeleton.
#[derive(Debug, Clone)]
struct ScopeEntry {
    base: ColumnarTable,
    columns: HashMap<String, (Header, Vec<Value>)>,
}

impl ScopeEntry {
    fn from_table(table: &ColumnarTable) -> Self {
        let dimension_names: Vec<&str> = table
            .dimension_headers()
            .map(|h| h.name.as_str())
            .collect();
        Self {
            base: table.select(&dimension_names),
            columns: HashMap::new(),
        }
    }

    /// Map from grouping-row key to row index of the skeleton
    fn row_index(&self) -> HashMap<Vec<Value>, usize> {
        let all: Vec<usize> = (0..self.base.headers().len()).collect();
        (0..self.base.count())
            .map(|r| (self.base.row_key(r, &all), r))
            .collect()
    }
}

/// Size-bounded, thread-safe query cache with hit/miss/eviction counters
pub struct LruQueryCache {
    entries: Mutex<LruCache<CacheKey, ScopeEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl LruQueryCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// `capacity` is the maximum number of cached scopes
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    fn evict(&self, key: &CacheKey) {
        let mut entries = self.entries.lock();
        if entries.pop(key).is_some() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Default for LruQueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache for LruQueryCache {
    fn contains(&self, measure: &CompiledMeasure, key: &CacheKey) -> bool {
        let mut entries = self.entries.lock();
        let hit = entries
            .get(key)
            .map(|e| e.columns.contains_key(measure.alias()))
            .unwrap_or(false);
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    fn create_raw_result(&self, key: &CacheKey) -> Option<ColumnarTable> {
        let mut entries = self.entries.lock();
        entries.get(key).map(|e| e.base.clone())
    }

    fn contribute_to_result(
        &self,
        table: &mut ColumnarTable,
        measures: &[CompiledMeasure],
        key: &CacheKey,
    ) -> Result<(), CacheError> {
        if measures.is_empty() {
            return Ok(());
        }

        // Snapshot the entry so the lock is not held while aligning rows.
        let entry = {
            let mut entries = self.entries.lock();
            entries.get(key).cloned()
        };
        let Some(entry) = entry else {
            return Err(CacheError::MissingEntry);
        };

        let index = entry.row_index();
        let key_columns: Vec<usize> = entry
            .base
            .headers()
            .iter()
            .map(|h| table.column_index(&h.name))
            .collect::<Option<Vec<usize>>>()
            .ok_or(CacheError::MissingEntry)?;

        for measure in measures {
            let alias = measure.alias();
            let Some((header, values)) = entry.columns.get(alias) else {
                self.evict(key);
                return Err(CacheError::Inconsistent { alias: alias.to_string() });
            };
            if entry.base.count() != table.count() {
                self.evict(key);
                return Err(CacheError::Inconsistent { alias: alias.to_string() });
            }
            let mut column = Vec::with_capacity(table.count());
            for row in 0..table.count() {
                let row_key = table.row_key(row, &key_columns);
                match index.get(&row_key) {
                    Some(&i) => column.push(values[i].clone()),
                    None => {
                        self.evict(key);
                        return Err(CacheError::Inconsistent { alias: alias.to_string() });
                    }
                }
            }
            table.add_column(header.clone(), column);
        }
        Ok(())
    }

    fn contribute_to_cache(
        &self,
        table: &ColumnarTable,
        measures: &[CompiledMeasure],
        key: &CacheKey,
    ) {
        if measures.is_empty() {
            return;
        }
        let mut entries = self.entries.lock();
        let needs_reset = entries
            .get(key)
            .map(|e| e.base.count() != table.count())
            .unwrap_or(true);
        if needs_reset {
            let evicted = entries
                .push(key.clone(), ScopeEntry::from_table(table))
                .filter(|(k, _)| k != key)
                .is_some();
            if evicted {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
        if let Some(entry) = entries.get_mut(key) {
            for measure in measures {
                let alias = measure.alias();
                if let Some(i) = table.column_index(alias) {
                    entry.columns.insert(
                        alias.to_string(),
                        (table.headers()[i].clone(), table.column_at(i).clone()),
                    );
                }
            }
        }
    }

    fn stats(&self, _principal: &Principal) -> CacheStats {
        CacheStats {
            hit_count: self.hits.load(Ordering::Relaxed),
            miss_count: self.misses.load(Ordering::Relaxed),
            eviction_count: self.evictions.load(Ordering::Relaxed),
        }
    }

    fn clear(&self, principal: &Principal) {
        let mut entries = self.entries.lock();
        let stale: Vec<CacheKey> = entries
            .iter()
            .filter(|(k, _)| k.principal == *principal)
            .map(|(k, _)| k.clone())
            .collect();
        for key in stale {
            entries.pop(&key);
        }
    }
}
