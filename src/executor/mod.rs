//! Query execution
//!
//! `execute_query` is the main pipeline: resolve the DTO, build the
//! dependency graph over (scope, measure) nodes, prefetch every scope from
//! the backend and the cache, evaluate the non-primitive measures in
//! dependency order, then shape the root table for the user.

mod error;
mod evaluator;
mod prefetch;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use tracing::{debug, warn};

use crate::cache::{
    can_be_cached, CacheKey, CacheStats, EmptyQueryCache, GlobalCache, KeyedLock, Principal,
    QueryCache,
};
use crate::engine::{DatabaseQuery, QueryEngine};
use crate::measure::{count_measure, CompiledMeasure, COUNT_ALIAS};
use crate::plan::{
    DependencyGraph, ExecutionPlan, GraphDependencyBuilder, QueryPlanNodeKey, QueryScope,
};
use crate::query::{CacheMode, Order, PivotQueryDto, QueryDto};
use crate::resolver::QueryResolver;
use crate::table::util::{self, CompiledOrder};
use crate::table::{ColumnarTable, PivotTable};
use crate::value::Value;

pub use error::ExecuteError;

/// Fallback row limit applied when a query carries a negative limit.
/// Read once per process from `CUBEPLAN_QUERY_LIMIT`.
pub fn default_query_limit() -> i64 {
    static LIMIT: OnceLock<i64> = OnceLock::new();
    *LIMIT.get_or_init(|| {
        std::env::var("CUBEPLAN_QUERY_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10_000)
    })
}

/// Cooperative cancellation flag shared between the caller and the executor
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Per-query execution options
pub struct QueryOptions<'a> {
    pub principal: Principal,
    /// Replace total markers and order rows in the final table
    pub replace_total_cells_and_order_rows: bool,
    /// Invoked with the limit when the result holds exactly `limit` rows
    pub limit_notifier: Option<&'a mut dyn FnMut(i64)>,
    /// Filled with the executor cache's counters after the query
    pub cache_stats: Option<&'a mut CacheStats>,
    pub cancel: Option<CancellationToken>,
    pub deadline: Option<Instant>,
}

impl Default for QueryOptions<'_> {
    fn default() -> Self {
        Self {
            principal: None,
            replace_total_cells_and_order_rows: true,
            limit_notifier: None,
            cache_stats: None,
            cancel: None,
            deadline: None,
        }
    }
}

/// Cancellation and deadline state, checked before every node execution and
/// every backend call.
struct Liveness {
    cancel: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl Liveness {
    fn check(&self) -> Result<(), ExecuteError> {
        if let Some(cancel) = &self.cancel {
            if cancel.is_cancelled() {
                return Err(ExecuteError::Cancelled);
            }
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(ExecuteError::Timeout);
            }
        }
        Ok(())
    }
}

/// The query execution pipeline
pub struct QueryExecutor {
    engine: Arc<dyn QueryEngine>,
    cache: Arc<dyn QueryCache>,
    flight: KeyedLock<CacheKey>,
}

impl QueryExecutor {
    /// Executor backed by the default process-wide cache
    pub fn new(engine: Arc<dyn QueryEngine>) -> Self {
        Self::with_cache(engine, Arc::new(GlobalCache::new()))
    }

    pub fn with_cache(engine: Arc<dyn QueryEngine>, cache: Arc<dyn QueryCache>) -> Self {
        Self {
            engine,
            cache,
            flight: KeyedLock::new(),
        }
    }

    pub fn execute_query(&self, query: &QueryDto) -> Result<ColumnarTable, ExecuteError> {
        self.execute_query_with(query, QueryOptions::default())
    }

    pub fn execute_query_with(
        &self,
        query: &QueryDto,
        mut options: QueryOptions,
    ) -> Result<ColumnarTable, ExecuteError> {
        let liveness = Liveness {
            cancel: options.cancel.clone(),
            deadline: options.deadline,
        };
        let mut query = query.clone();
        if query.limit < 0 {
            query.limit = default_query_limit();
        }
        let query_limit = query.limit;

        let resolver = QueryResolver::new(&query, self.engine.datastore().catalog())?;
        let graph = compute_dependency_graph(resolver.measures(), resolver.scope());
        let plan = ExecutionPlan::new(&graph)?;
        debug!(nodes = graph.len(), "query plan ready");

        // Prefetch pass: per scope, the union of measures and the fetch
        // limit. Sub-scopes fetch one extra row so silent truncation of an
        // intermediate result stays detectable.
        let mut scope_order: Vec<QueryScope> = Vec::new();
        let mut prefetch_scope_by_scope: HashMap<QueryScope, QueryScope> = HashMap::new();
        let mut measures_by_scope: HashMap<QueryScope, Vec<CompiledMeasure>> = HashMap::new();
        plan.execute(|node| -> Result<(), ExecuteError> {
            let scope = &node.scope;
            if !prefetch_scope_by_scope.contains_key(scope) {
                let limit = if scope == resolver.scope() {
                    query_limit
                } else {
                    query_limit + 1
                };
                prefetch_scope_by_scope.insert(scope.clone(), scope.copy_with_new_limit(limit));
                scope_order.push(scope.clone());
            }
            let measures = measures_by_scope.entry(scope.clone()).or_default();
            if !measures.contains(&node.measure) {
                measures.push(node.measure.clone());
            }
            Ok(())
        })?;

        static EMPTY: EmptyQueryCache = EmptyQueryCache;
        let cache: &dyn QueryCache = match query.parameters.cache {
            CacheMode::Use => self.cache.as_ref(),
            CacheMode::NotUse => &EMPTY,
            CacheMode::Invalidate => {
                self.cache.clear(&options.principal);
                self.cache.as_ref()
            }
        };

        let mut table_by_scope: HashMap<QueryScope, ColumnarTable> = HashMap::new();
        for scope in &scope_order {
            liveness.check()?;
            let table = self.prefetch_scope(
                cache,
                scope,
                &prefetch_scope_by_scope[scope],
                &measures_by_scope[scope],
                &options.principal,
                &liveness,
            )?;
            table_by_scope.insert(scope.clone(), table);
        }

        // GROUP column-sets change the shape of every intermediate table, so
        // they apply before any measure is evaluated.
        for set in resolver.column_sets() {
            for table in table_by_scope.values_mut() {
                *table = crate::table::group(table, set);
            }
        }

        plan.execute(|node| {
            liveness.check()?;
            evaluator::evaluate(node, &mut table_by_scope)
        })?;

        let mut result = table_by_scope.remove(resolver.scope()).ok_or_else(|| {
            ExecuteError::Internal("root scope produced no table".to_string())
        })?;

        if result.count() > query_limit as usize {
            result.truncate(query_limit as usize);
        }
        if result.count() == query_limit as usize {
            if let Some(notifier) = options.limit_notifier.take() {
                notifier(query_limit);
            }
        }

        let mut result = util::select_and_order_columns(&result, &resolver);
        if options.replace_total_cells_and_order_rows {
            util::order_rows(&mut result, &build_orders(&query, &resolver));
            util::replace_total_cell_values(&mut result);
        }

        if let Some(stats) = options.cache_stats.take() {
            *stats = self.cache.stats(&options.principal);
        }

        // A single group carries no information; drop the synthetic column.
        for set in resolver.column_sets() {
            if set.groups.len() == 1 {
                result.remove_column(&set.new_field.name);
            }
        }

        Ok(result)
    }

    pub fn execute_pivot_query(&self, pivot: &PivotQueryDto) -> Result<PivotTable, ExecuteError> {
        self.execute_pivot_query_with(pivot, QueryOptions::default())
    }

    pub fn execute_pivot_query_with(
        &self,
        pivot: &PivotQueryDto,
        mut options: QueryOptions,
    ) -> Result<PivotTable, ExecuteError> {
        if !pivot.query.rollup_columns.is_empty() {
            return Err(ExecuteError::InvalidQuery(
                "rollup columns are not supported in pivot queries".to_string(),
            ));
        }
        let prepared = prepare_pivot_query(pivot)?;

        let replace = options.replace_total_cells_and_order_rows;
        options.replace_total_cells_and_order_rows = false;
        let mut result = self.execute_query_with(&prepared, options)?;
        if replace {
            util::order_rows(&mut result, &compile_query_orders(&prepared));
            util::replace_total_cell_values(&mut result);
        }

        let values: Vec<String> = pivot
            .query
            .measures
            .iter()
            .filter_map(|m| m.alias().map(str::to_string))
            .collect();
        Ok(PivotTable::new(
            result,
            pivot.rows.iter().map(|f| short_name(f).to_string()).collect(),
            pivot.columns.iter().map(|f| short_name(f).to_string()).collect(),
            values,
            pivot
                .hidden_totals
                .iter()
                .map(|f| short_name(f).to_string())
                .collect(),
        ))
    }

    /// Hand a raw SQL string to the backend
    pub fn execute_raw(&self, sql: &str) -> Result<ColumnarTable, ExecuteError> {
        Ok(self.engine.execute_raw_sql(sql)?)
    }

    /// Counters of the executor's cache for one principal
    pub fn cache_stats(&self, principal: &Principal) -> CacheStats {
        self.cache.stats(principal)
    }

    /// Materialize one scope: partition its measures against the cache,
    /// issue at most one backend call for the missing ones, merge and write
    /// back. The per-key flight lock collapses duplicate concurrent fetches.
    fn prefetch_scope(
        &self,
        cache: &dyn QueryCache,
        scope: &QueryScope,
        prefetch_scope: &QueryScope,
        measures: &[CompiledMeasure],
        principal: &Principal,
        liveness: &Liveness,
    ) -> Result<ColumnarTable, ExecuteError> {
        let key = CacheKey::new(scope.clone(), principal.clone());
        let _guard = self.flight.acquire(key.clone());

        let mut excluded: Vec<CompiledMeasure> = Vec::new();
        let mut cached: Vec<CompiledMeasure> = Vec::new();
        let mut not_cached: Vec<CompiledMeasure> = Vec::new();
        for measure in measures {
            if !measure.is_primitive() {
                continue;
            }
            if !can_be_cached(measure) {
                excluded.push(measure.clone());
            } else if cache.contains(measure, &key) {
                cached.push(measure.clone());
            } else {
                not_cached.push(measure.clone());
            }
        }
        // Non-cacheable measures are re-fetched on every query; correctness
        // over cache coverage.
        not_cached.extend(excluded.iter().cloned());
        debug!(
            store = %scope.store,
            cached = cached.len(),
            fetched = not_cached.len(),
            "prefetching scope"
        );

        if let Some(table) =
            self.try_assemble(cache, &key, scope, prefetch_scope, &cached, &mut not_cached, liveness)?
        {
            let to_cache: Vec<CompiledMeasure> = not_cached
                .iter()
                .filter(|m| !excluded.contains(m))
                .cloned()
                .collect();
            cache.contribute_to_cache(&table, &to_cache, &key);
            return Ok(table);
        }

        // Cache fallback: the entry vanished or did not line up. Refetch
        // every primitive of the scope from the backend.
        let mut all: Vec<CompiledMeasure> = measures
            .iter()
            .filter(|m| m.is_primitive())
            .cloned()
            .collect();
        ensure_count(&mut all);
        liveness.check()?;
        let mut table = self
            .engine
            .execute(&DatabaseQuery::new(prefetch_scope.clone(), all.clone()))?;
        util::replace_null_cells_by_total(&mut table, scope);
        let to_cache: Vec<CompiledMeasure> =
            all.iter().filter(|m| can_be_cached(m)).cloned().collect();
        cache.contribute_to_cache(&table, &to_cache, &key);
        Ok(table)
    }

    /// Fetch the uncached measures (or start from the cache skeleton) and
    /// merge the cached columns in. `None` signals the caller to fall back
    /// to a full backend fetch.
    fn try_assemble(
        &self,
        cache: &dyn QueryCache,
        key: &CacheKey,
        scope: &QueryScope,
        prefetch_scope: &QueryScope,
        cached: &[CompiledMeasure],
        not_cached: &mut Vec<CompiledMeasure>,
        liveness: &Liveness,
    ) -> Result<Option<ColumnarTable>, ExecuteError> {
        let mut table = if !not_cached.is_empty() {
            ensure_count(not_cached);
            liveness.check()?;
            let mut table = self
                .engine
                .execute(&DatabaseQuery::new(prefetch_scope.clone(), not_cached.clone()))?;
            util::replace_null_cells_by_total(&mut table, scope);
            table
        } else {
            match cache.create_raw_result(key) {
                Some(table) => table,
                None => {
                    warn!(store = %scope.store, "cache entry disappeared, refetching scope");
                    return Ok(None);
                }
            }
        };
        match cache.contribute_to_result(&mut table, cached, key) {
            Ok(()) => Ok(Some(table)),
            Err(e) => {
                warn!(store = %scope.store, error = %e, "cache inconsistency, refetching scope");
                Ok(None)
            }
        }
    }
}

fn ensure_count(measures: &mut Vec<CompiledMeasure>) {
    if !measures.iter().any(|m| m.alias() == COUNT_ALIAS) {
        measures.push(count_measure());
    }
}

/// Seed the graph with the user measures, the count measure and the grouping
/// measures implied by the root scope, then close the requirement relation.
fn compute_dependency_graph(
    measures: &[CompiledMeasure],
    scope: &QueryScope,
) -> DependencyGraph<QueryPlanNodeKey> {
    let builder = GraphDependencyBuilder::new(|node: &QueryPlanNodeKey| {
        let mut dependencies: Vec<QueryPlanNodeKey> = Vec::new();
        for (dep_scope, dep_measures) in prefetch::prerequisites(&node.measure, &node.scope) {
            for measure in dep_measures {
                let key = QueryPlanNodeKey::new(dep_scope.clone(), measure);
                if !dependencies.contains(&key) {
                    dependencies.push(key);
                }
            }
            for measure in prefetch::generate_grouping_measures(&dep_scope) {
                let key = QueryPlanNodeKey::new(dep_scope.clone(), measure);
                if !dependencies.contains(&key) {
                    dependencies.push(key);
                }
            }
        }
        dependencies
    });

    let mut roots: Vec<QueryPlanNodeKey> = Vec::new();
    for measure in measures {
        roots.push(QueryPlanNodeKey::new(scope.clone(), measure.clone()));
    }
    roots.push(QueryPlanNodeKey::new(scope.clone(), count_measure()));
    for measure in prefetch::generate_grouping_measures(scope) {
        roots.push(QueryPlanNodeKey::new(scope.clone(), measure));
    }
    builder.build(roots)
}

/// User-declared orders plus the implicit orders of GROUP column-sets
fn build_orders(query: &QueryDto, resolver: &QueryResolver) -> Vec<(String, CompiledOrder)> {
    let mut orders = compile_query_orders(query);
    for set in resolver.column_sets() {
        if !orders.iter().any(|(name, _)| *name == set.new_field.name) {
            orders.push((
                set.new_field.name.clone(),
                CompiledOrder::Explicit(
                    set.group_names().map(|n| Value::Str(n.to_string())).collect(),
                ),
            ));
        }
        if !orders.iter().any(|(name, _)| *name == set.field.name) {
            orders.push((
                set.field.name.clone(),
                CompiledOrder::Explicit(set.ordered_values().into_iter().cloned().collect()),
            ));
        }
    }
    orders
}

fn compile_query_orders(query: &QueryDto) -> Vec<(String, CompiledOrder)> {
    query
        .orders
        .iter()
        .map(|order_by| {
            let compiled = match &order_by.order {
                Order::Asc => CompiledOrder::Asc,
                Order::Desc => CompiledOrder::Desc,
                Order::List(values) => {
                    CompiledOrder::Explicit(values.iter().map(Value::from_json).collect())
                }
            };
            (short_name(&order_by.field).to_string(), compiled)
        })
        .collect()
}

/// A pivot query runs as a flat query grouping by all axes, with grouping
/// sets for every combination of a row prefix and a column prefix so the
/// totals of both axes materialize in one pass.
fn prepare_pivot_query(pivot: &PivotQueryDto) -> Result<QueryDto, ExecuteError> {
    let mut query = pivot.query.clone();
    let axes: Vec<String> = pivot
        .rows
        .iter()
        .chain(pivot.columns.iter())
        .cloned()
        .collect();
    if query.columns.len() != axes.len()
        || !query.columns.iter().all(|c| axes.contains(c))
    {
        return Err(ExecuteError::InvalidQuery(
            "pivot rows and columns must cover exactly the query columns".to_string(),
        ));
    }

    let mut grouping_sets = Vec::new();
    for row_prefix in 0..=pivot.rows.len() {
        for column_prefix in 0..=pivot.columns.len() {
            let mut set: Vec<String> = Vec::new();
            set.extend(pivot.rows[..row_prefix].iter().cloned());
            set.extend(pivot.columns[..column_prefix].iter().cloned());
            grouping_sets.push(set);
        }
    }
    query.grouping_sets = grouping_sets;
    query.columns = axes;
    Ok(query)
}

fn short_name(field: &str) -> &str {
    field.rsplit('.').next().unwrap_or(field)
}
