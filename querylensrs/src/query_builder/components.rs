//! Fragments and the query template they merge into.

use crate::executor::ColumnBinding;
use crate::models::ValueType;
use crate::reference_table::{merge_joins, JoinClause};
use crate::sql_ast::SelectItem;

/// Partial SQL contributed by one projected column.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub column: String,
    pub alias: String,
    pub select_expr: String,
    pub joins: Vec<JoinClause>,
    /// Set for dimensions and time dimensions; used only when the query
    /// also selects an aggregated metric.
    pub group_by: Option<String>,
    pub aggregated: bool,
    pub value_type: Option<ValueType>,
}

/// Accumulated projection, joins and group-by candidates for one query.
///
/// `merge` concatenates projections and keeps the first join seen under
/// each alias, so it is associative with `SqlQueryTemplate::default()` as
/// identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlQueryTemplate {
    fragments: Vec<Fragment>,
    joins: Vec<JoinClause>,
}

impl From<Fragment> for SqlQueryTemplate {
    fn from(fragment: Fragment) -> Self {
        let mut joins = Vec::new();
        merge_joins(&mut joins, fragment.joins.iter().cloned());
        SqlQueryTemplate {
            fragments: vec![fragment],
            joins,
        }
    }
}

impl SqlQueryTemplate {
    pub fn merge(mut self, other: SqlQueryTemplate) -> Self {
        self.fragments.extend(other.fragments);
        merge_joins(&mut self.joins, other.joins);
        self
    }

    pub fn merge_all(fragments: impl IntoIterator<Item = Fragment>) -> Self {
        fragments
            .into_iter()
            .map(SqlQueryTemplate::from)
            .fold(SqlQueryTemplate::default(), SqlQueryTemplate::merge)
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn joins(&self) -> &[JoinClause] {
        &self.joins
    }

    pub fn has_aggregates(&self) -> bool {
        self.fragments.iter().any(|f| f.aggregated)
    }

    /// Expressions of the non-aggregated dimension projections, deduplicated.
    pub fn dimension_exprs(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for expr in self.fragments.iter().filter_map(|f| f.group_by.as_ref()) {
            if !out.contains(expr) {
                out.push(expr.clone());
            }
        }
        out
    }

    /// GROUP BY terms: the dimension expressions when any metric aggregates.
    pub fn group_by(&self) -> Vec<String> {
        if self.has_aggregates() {
            self.dimension_exprs()
        } else {
            Vec::new()
        }
    }

    /// Without aggregates, dimension-only projections select DISTINCT rows.
    pub fn is_distinct(&self) -> bool {
        !self.has_aggregates() && self.fragments.iter().any(|f| f.group_by.is_some())
    }

    /// True when a pass-through metric is selected.
    pub fn has_row_metrics(&self) -> bool {
        self.fragments
            .iter()
            .any(|f| !f.aggregated && f.group_by.is_none())
    }

    pub fn select_items(&self) -> Vec<SelectItem> {
        self.fragments
            .iter()
            .map(|f| SelectItem {
                expr: f.select_expr.clone(),
                alias: Some(f.alias.clone()),
            })
            .collect()
    }

    pub fn bindings(&self) -> Vec<ColumnBinding> {
        self.fragments
            .iter()
            .map(|f| ColumnBinding {
                alias: f.alias.clone(),
                value_type: f.value_type,
            })
            .collect()
    }

    pub fn find_column(&self, column: &str) -> Option<&Fragment> {
        self.fragments.iter().find(|f| f.column == column)
    }
}
