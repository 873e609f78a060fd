//! Query cache
//!
//! Cache entries are keyed by (scope, principal) and hold the scope's stable
//! grouping columns plus one value vector per cached measure alias. Across
//! queries the executor asks per measure whether a column is cached, fetches
//! only the missing ones from the backend, and contributes the fresh columns
//! back.
//!
//! Only primitive measures whose alias does not follow the grouping-alias
//! scheme are cacheable; grouping measures embed a field name in their alias
//! and would collide across scopes.

mod empty;
mod flight;
mod global;
mod lru;

use std::fmt;

use crate::measure::CompiledMeasure;
use crate::plan::QueryScope;
use crate::table::ColumnarTable;

pub use empty::EmptyQueryCache;
pub use flight::KeyedLock;
pub use global::GlobalCache;
pub use self::lru::LruQueryCache;

/// Identity partitioning the cache. `None` is the shared partition.
pub type Principal = Option<String>;

/// Cache entry key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub scope: QueryScope,
    pub principal: Principal,
}

impl CacheKey {
    pub fn new(scope: QueryScope, principal: Principal) -> Self {
        Self { scope, principal }
    }
}

/// Hit / miss / eviction counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hit_count: u64,
    pub miss_count: u64,
    pub eviction_count: u64,
}

/// Cache-side failure. Inconsistencies evict the offending entry; the caller
/// falls back to a backend fetch.
#[derive(Debug)]
pub enum CacheError {
    /// A cached column does not line up with the result skeleton
    Inconsistent { alias: String },
    /// The entry vanished between lookup and read
    MissingEntry,
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Inconsistent { alias } => {
                write!(f, "Cached column '{}' does not match the result skeleton", alias)
            }
            CacheError::MissingEntry => write!(f, "Cache entry disappeared"),
        }
    }
}

impl std::error::Error for CacheError {}

/// The cache contract the executor programs against
pub trait QueryCache: Send + Sync {
    /// Whether a column for this measure is cached under `key`
    fn contains(&self, measure: &CompiledMeasure, key: &CacheKey) -> bool;

    /// Skeleton table holding only the grouping columns of `key`'s scope,
    /// sized and ordered as the backend would have returned them. `None`
    /// when nothing is cached for the key.
    fn create_raw_result(&self, key: &CacheKey) -> Option<ColumnarTable>;

    /// Copy the cached columns for `measures` into `table`, aligning rows by
    /// the grouping columns.
    fn contribute_to_result(
        &self,
        table: &mut ColumnarTable,
        measures: &[CompiledMeasure],
        key: &CacheKey,
    ) -> Result<(), CacheError>;

    /// Store the columns for `measures` out of `table`
    fn contribute_to_cache(
        &self,
        table: &ColumnarTable,
        measures: &[CompiledMeasure],
        key: &CacheKey,
    );

    fn stats(&self, principal: &Principal) -> CacheStats;

    /// Drop every entry of the principal's partition
    fn clear(&self, principal: &Principal);
}

/// Whether a measure may be stored in the cache
pub fn can_be_cached(measure: &CompiledMeasure) -> bool {
    measure.is_primitive()
        && !measure.is_grouping()
        && crate::measure::field_from_grouping_alias(measure.alias()).is_none()
}
