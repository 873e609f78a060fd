//! No-op cache used for `NotUse` queries

use crate::measure::CompiledMeasure;
use crate::table::ColumnarTable;

use super::{CacheError, CacheKey, CacheStats, Principal, QueryCache};

/// Cache that stores nothing and always misses
#[derive(Debug, Default)]
pub struct EmptyQueryCache;

impl QueryCache for EmptyQueryCache {
    fn contains(&self, _measure: &CompiledMeasure, _key: &CacheKey) -> bool {
        false
    }

    fn create_raw_result(&self, _key: &CacheKey) -> Option<ColumnarTable> {
        None
    }

    fn contribute_to_result(
        &self,
        _table: &mut ColumnarTable,
        measures: &[CompiledMeasure],
        _key: &CacheKey,
    ) -> Result<(), CacheError> {
        if measures.is_empty() {
            Ok(())
        } else {
            Err(CacheError::MissingEntry)
        }
    }

    fn contribute_to_cache(
        &self,
        _table: &ColumnarTable,
        _measures: &[CompiledMeasure],
        _key: &CacheKey,
    ) {
    }

    fn stats(&self, _principal: &Principal) -> CacheStats {
        CacheStats::default()
    }

    fn clear(&self, _principal: &Principal) {}
}
