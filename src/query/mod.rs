//! Query DTO surface
//!
//! The declarative request types clients submit: dimensions, measures,
//! filters, rollups, orders, cache directives and pivot shapes. DTOs carry
//! plain field names; binding against the catalog happens in the resolver.

mod request;

pub use request::{
    CacheMode, ColumnSet, ConditionOp, Criteria, GroupColumnSet, GroupDto, Order, OrderBy,
    PivotQueryDto, QueryDto, QueryParameters,
};
