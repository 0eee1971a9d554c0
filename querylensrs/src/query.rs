//! Logical queries.
//!
//! A [`Query`] is built in one step from a fully populated [`QuerySpec`] and
//! is never modified afterwards; a different filter or sort means a new
//! query.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::CompileError;
use crate::filters::FilterExpression;
use crate::models::{ColumnKind, TimeGrain};

/// A request to include one column in the result under `alias`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawProjection")]
pub struct ColumnProjection {
    pub column: String,
    pub alias: String,
    pub arguments: BTreeMap<String, String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProjection {
    column: String,
    #[serde(default)]
    alias: Option<String>,
    #[serde(default)]
    arguments: BTreeMap<String, String>,
}

impl From<RawProjection> for ColumnProjection {
    fn from(raw: RawProjection) -> Self {
        let alias = raw.alias.unwrap_or_else(|| raw.column.clone());
        ColumnProjection {
            column: raw.column,
            alias,
            arguments: raw.arguments,
        }
    }
}

impl ColumnProjection {
    pub fn new(
        column: impl Into<String>,
        alias: impl Into<String>,
        arguments: BTreeMap<String, String>,
    ) -> Self {
        ColumnProjection {
            column: column.into(),
            alias: alias.into(),
            arguments,
        }
    }

    /// Projection of `column` under its own name, without arguments.
    pub fn of(column: impl Into<String>) -> Self {
        let column = column.into();
        ColumnProjection {
            alias: column.clone(),
            column,
            arguments: BTreeMap::new(),
        }
    }

    /// Same projection with a `grain` argument.
    pub fn with_grain(mut self, grain: TimeGrain) -> Self {
        self.arguments
            .insert("grain".to_string(), grain.as_str().to_string());
        self
    }

    /// The `grain` argument, if present.
    pub fn grain(&self) -> Result<Option<TimeGrain>, CompileError> {
        match self.arguments.get("grain") {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| CompileError::UnsupportedGrain {
                    column: self.column.clone(),
                    grain: raw.clone(),
                }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(column: impl Into<String>) -> Self {
        SortKey {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        SortKey {
            column: column.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Shared cell receiving the total row count when a query executes with
/// `return_page_totals`. Clones observe the same value, and each execution
/// replaces the previous total.
#[derive(Debug, Clone, Default)]
pub struct PageTotals(Arc<RwLock<Option<u64>>>);

impl PageTotals {
    pub fn get(&self) -> Option<u64> {
        match self.0.read() {
            Ok(total) => *total,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub(crate) fn set(&self, total: u64) {
        let mut slot = match self.0.write() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = slot.replace(total) {
            tracing::debug!(previous, total, "page totals replaced");
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub return_page_totals: bool,
    #[serde(skip)]
    totals: PageTotals,
}

impl Pagination {
    pub fn new(offset: u64, limit: Option<u64>, return_page_totals: bool) -> Self {
        Pagination {
            offset,
            limit,
            return_page_totals,
            totals: PageTotals::default(),
        }
    }

    /// Total row count recorded by the last execution, if any.
    pub fn page_totals(&self) -> Option<u64> {
        self.totals.get()
    }

    pub fn totals_handle(&self) -> PageTotals {
        self.totals.clone()
    }
}

/// Every field of a query, filled in up front.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuerySpec {
    pub table: String,
    #[serde(default)]
    pub metrics: Vec<ColumnProjection>,
    #[serde(default)]
    pub dimensions: Vec<ColumnProjection>,
    #[serde(default)]
    pub time_dimensions: Vec<ColumnProjection>,
    #[serde(default)]
    pub where_filter: Option<FilterExpression>,
    #[serde(default)]
    pub having_filter: Option<FilterExpression>,
    #[serde(default)]
    pub sorting: Vec<SortKey>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "QuerySpec", into = "QuerySpec")]
pub struct Query {
    spec: QuerySpec,
}

impl From<QuerySpec> for Query {
    fn from(spec: QuerySpec) -> Self {
        Query { spec }
    }
}

impl From<Query> for QuerySpec {
    fn from(query: Query) -> Self {
        query.spec
    }
}

impl Query {
    pub fn new(spec: QuerySpec) -> Self {
        Query::from(spec)
    }

    pub fn table(&self) -> &str {
        &self.spec.table
    }

    pub fn metrics(&self) -> &[ColumnProjection] {
        &self.spec.metrics
    }

    pub fn dimensions(&self) -> &[ColumnProjection] {
        &self.spec.dimensions
    }

    pub fn time_dimensions(&self) -> &[ColumnProjection] {
        &self.spec.time_dimensions
    }

    pub fn where_filter(&self) -> Option<&FilterExpression> {
        self.spec.where_filter.as_ref()
    }

    pub fn having_filter(&self) -> Option<&FilterExpression> {
        self.spec.having_filter.as_ref()
    }

    pub fn sorting(&self) -> &[SortKey] {
        &self.spec.sorting
    }

    pub fn pagination(&self) -> Option<&Pagination> {
        self.spec.pagination.as_ref()
    }

    /// Metrics, then dimensions, then time dimensions, in declaration order.
    pub fn projections(&self) -> impl Iterator<Item = (ColumnKind, &ColumnProjection)> {
        let metrics = self.metrics().iter().map(|p| (ColumnKind::Metric, p));
        let dims = self.dimensions().iter().map(|p| (ColumnKind::Dimension, p));
        let times = self
            .time_dimensions()
            .iter()
            .map(|p| (ColumnKind::TimeDimension, p));
        metrics.chain(dims).chain(times)
    }

    /// Copy of the spec, for building a variant of this query.
    pub fn to_spec(&self) -> QuerySpec {
        self.spec.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn projection_alias_defaults_to_column() {
        let p: ColumnProjection = serde_json::from_value(json!({"column": "highScore"})).unwrap();
        assert_eq!(p.alias, "highScore");
    }

    #[test]
    fn grain_argument_parses() {
        let p = ColumnProjection::of("recordedDate").with_grain(TimeGrain::Month);
        assert_eq!(p.grain().unwrap(), Some(TimeGrain::Month));

        let mut bad = ColumnProjection::of("recordedDate");
        bad.arguments.insert("grain".into(), "fortnight".into());
        assert!(matches!(
            bad.grain(),
            Err(CompileError::UnsupportedGrain { .. })
        ));
    }

    #[test]
    fn page_totals_are_shared_between_clones() {
        let pagination = Pagination::new(0, Some(1), true);
        let copy = pagination.clone();
        pagination.totals_handle().set(2);
        assert_eq!(copy.page_totals(), Some(2));
    }

    #[test]
    fn later_execution_replaces_page_totals() {
        let pagination = Pagination::new(0, Some(1), true);
        assert_eq!(pagination.page_totals(), None);
        pagination.totals_handle().set(2);
        pagination.totals_handle().set(5);
        assert_eq!(pagination.page_totals(), Some(5));
    }

    #[test]
    fn query_deserializes_from_json() {
        let query: Query = serde_json::from_value(json!({
            "table": "playerStats",
            "metrics": [{"column": "highScore"}],
            "dimensions": [{"column": "overallRating", "alias": "rating"}],
            "sorting": [{"column": "highScore", "direction": "desc"}],
            "pagination": {"offset": 0, "limit": 10, "return_page_totals": true}
        }))
        .unwrap();
        assert_eq!(query.table(), "playerStats");
        assert_eq!(query.dimensions()[0].alias, "rating");
        assert_eq!(query.sorting()[0], SortKey::desc("highScore"));
        assert!(query.pagination().unwrap().return_page_totals);
        let kinds: Vec<_> = query.projections().map(|(k, _)| k).collect();
        assert_eq!(kinds, vec![ColumnKind::Metric, ColumnKind::Dimension]);
    }
}
