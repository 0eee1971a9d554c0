//! Compiled statements for one logical query.

use crate::executor::ColumnBinding;
use crate::sql_ast::{RenderedStatement, SelectStatement};

/// How the page-total statement is shaped.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TotalsPlan {
    /// `SELECT COUNT(DISTINCT(<group-by signature>))` over the primary's
    /// FROM, joins and WHERE.
    CountDistinct(SelectStatement),
    /// `SELECT COUNT(*)` around the primary statement without ORDER BY or
    /// pagination. Used when the primary has HAVING, or has no group-by
    /// signature to count.
    Wrapped(SelectStatement),
}

/// Output of compilation. Produced only when every phase succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    /// Total row count statement, present when the query asked for page totals.
    pub page_totals: Option<RenderedStatement>,
    pub primary: RenderedStatement,
    /// Output columns of `primary`, in select order.
    pub bindings: Vec<ColumnBinding>,
}

impl CompiledQuery {
    /// Statements in execution order: the total count first.
    pub fn statements(&self) -> Vec<&RenderedStatement> {
        self.page_totals.iter().chain(Some(&self.primary)).collect()
    }

    pub fn sql_texts(&self) -> Vec<String> {
        self.statements().into_iter().map(|s| s.sql.clone()).collect()
    }
}
