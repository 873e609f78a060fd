use serde::Deserialize;

use crate::measure::Measure;

/// Cache directive carried in the query parameters.
///
/// `Use` reads and populates the shared cache, `NotUse` bypasses it entirely,
/// `Invalidate` clears the caller's partition before the query proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    #[default]
    Use,
    NotUse,
    Invalidate,
}

/// Recognized query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryParameters {
    #[serde(default)]
    pub cache: CacheMode,
}

/// Filter condition operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

/// Filter tree for analytics queries
///
/// Leaves compare a field against a JSON literal; `and`/`or` combine
/// sub-trees.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criteria {
    And(Vec<Criteria>),
    Or(Vec<Criteria>),
    Condition {
        field: String,
        op: ConditionOp,
        #[serde(default)]
        value: serde_json::Value,
    },
}

impl Criteria {
    /// Leaf condition shorthand
    pub fn condition(field: impl Into<String>, op: ConditionOp, value: serde_json::Value) -> Self {
        Criteria::Condition {
            field: field.into(),
            op,
            value,
        }
    }

    pub fn eq(field: impl Into<String>, value: serde_json::Value) -> Self {
        Self::condition(field, ConditionOp::Eq, value)
    }
}

/// Row ordering for one column
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Asc,
    Desc,
    /// Explicit value order; values absent from the list sort after it
    List(Vec<serde_json::Value>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub order: Order,
}

/// One group of a GROUP column-set
#[derive(Debug, Clone, Deserialize)]
pub struct GroupDto {
    pub name: String,
    pub values: Vec<serde_json::Value>,
}

/// Dynamic grouping over a derived dimension.
///
/// Rows whose `field` value belongs to a group are replicated under a new
/// synthetic `new_field` column holding the group name.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupColumnSet {
    #[serde(rename = "newField")]
    pub new_field: String,
    pub field: String,
    pub groups: Vec<GroupDto>,
}

/// Recognized column-sets
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnSet {
    Group(GroupColumnSet),
}

/// Request body for analytics queries
///
/// Queries are expressed in terms of columns (for grouping) and measures
/// (for values). A negative `limit` means "use the default limit".
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDto {
    pub table: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub rollup_columns: Vec<String>,
    #[serde(default)]
    pub grouping_sets: Vec<Vec<String>>,
    #[serde(default)]
    pub criteria: Option<Criteria>,
    #[serde(default)]
    pub measures: Vec<Measure>,
    #[serde(default)]
    pub orders: Vec<OrderBy>,
    #[serde(default)]
    pub column_sets: Vec<ColumnSet>,
    #[serde(default)]
    pub parameters: QueryParameters,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    -1
}

impl QueryDto {
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            rollup_columns: Vec::new(),
            grouping_sets: Vec::new(),
            criteria: None,
            measures: Vec::new(),
            orders: Vec::new(),
            column_sets: Vec::new(),
            parameters: QueryParameters::default(),
            limit: -1,
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    pub fn with_rollup(mut self, column: impl Into<String>) -> Self {
        self.rollup_columns.push(column.into());
        self
    }

    pub fn with_grouping_set(mut self, columns: Vec<String>) -> Self {
        self.grouping_sets.push(columns);
        self
    }

    pub fn with_measure(mut self, measure: Measure) -> Self {
        self.measures.push(measure);
        self
    }

    pub fn with_criteria(mut self, criteria: Criteria) -> Self {
        self.criteria = Some(criteria);
        self
    }

    pub fn with_order(mut self, field: impl Into<String>, order: Order) -> Self {
        self.orders.push(OrderBy { field: field.into(), order });
        self
    }

    pub fn with_column_set(mut self, column_set: ColumnSet) -> Self {
        self.column_sets.push(column_set);
        self
    }

    pub fn with_cache_mode(mut self, mode: CacheMode) -> Self {
        self.parameters.cache = mode;
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// The GROUP column-set of this query, if any
    pub fn group_column_set(&self) -> Option<&GroupColumnSet> {
        self.column_sets.iter().map(|ColumnSet::Group(g)| g).next()
    }
}

/// Request body for pivot queries
///
/// `rows` and `columns` partition the inner query's columns; totals for every
/// row/column prefix combination are produced through grouping sets, so the
/// inner query must not carry rollups of its own.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotQueryDto {
    pub query: QueryDto,
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    #[serde(default)]
    pub hidden_totals: Vec<String>,
}
