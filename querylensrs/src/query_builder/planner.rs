//! Query constructor pipeline.
//!
//! Compilation runs in five phases:
//! 1. Resolve every projection into a fragment and merge them into one template
//! 2. Split the WHERE tree, moving aggregate conjuncts into HAVING
//! 3. Resolve sort keys
//! 4. Apply pagination, and derive the page-total statement when asked
//! 5. Render every statement for the dialect
//!
//! Dialect legality checks run while the statement is assembled, so a
//! rejected shape never produces text.

use std::collections::HashSet;

use crate::dialect::{Dialect, SqlDialect};
use crate::error::{CompileError, QueryLensError, Result};
use crate::models::{Table, TableSource};
use crate::pagination::PageLimits;
use crate::query::Query;
use crate::reference_table::{merge_joins, ReferenceTable};
use crate::registry::SchemaRegistry;
use crate::sql_ast::{FromClause, OrderItem, RenderedStatement, SelectItem, SelectStatement, SqlRenderer};

use super::components::SqlQueryTemplate;
use super::filters::{filter_joins, split_filters, FilterRenderer};
use super::plan::{CompiledQuery, TotalsPlan};
use super::resolve::ColumnResolver;

/// Alias of the derived table wrapped by a page-total statement.
pub const PAGE_TOTALS_ALIAS: &str = "page_totals";

/// Compiles logical queries against one registry and dialect.
pub struct QueryConstructor<'a> {
    registry: &'a SchemaRegistry,
    references: &'a ReferenceTable,
    dialect: SqlDialect,
    limits: PageLimits,
}

impl<'a> QueryConstructor<'a> {
    pub fn new(
        registry: &'a SchemaRegistry,
        references: &'a ReferenceTable,
        dialect: SqlDialect,
        limits: PageLimits,
    ) -> Self {
        Self {
            registry,
            references,
            dialect,
            limits,
        }
    }

    pub fn compile(&self, query: &Query) -> Result<CompiledQuery> {
        let table = self
            .registry
            .get_table(query.table())
            .ok_or_else(|| CompileError::UnknownTable(query.table().to_string()))?;
        let resolver = ColumnResolver::new(table, self.references, self.dialect);

        // Phase 1: projections
        let mut aliases = HashSet::new();
        let mut fragments = Vec::new();
        for (kind, projection) in query.projections() {
            if !aliases.insert(projection.alias.as_str()) {
                return Err(CompileError::AliasCollision(projection.alias.clone()).into());
            }
            fragments.push(resolver.resolve_projection(kind, projection)?);
        }
        if fragments.is_empty() {
            return Err(CompileError::EmptyProjection.into());
        }
        let template = SqlQueryTemplate::merge_all(fragments);

        let mut stmt = SelectStatement::new(from_clause(table));
        stmt.distinct = template.is_distinct();
        stmt.select = template.select_items();
        stmt.group_by = template.group_by();
        stmt.joins = template.joins().to_vec();

        // Phase 2: filters
        let split = split_filters(query.where_filter(), query.having_filter(), &resolver)?;
        let mut renderer = FilterRenderer::new(&resolver, self.dialect);
        if let Some(filter) = &split.where_filter {
            merge_joins(&mut stmt.joins, filter_joins(filter, &resolver)?);
            stmt.where_clause = Some(renderer.render(filter)?);
        }
        if let Some(filter) = &split.having_filter {
            merge_joins(&mut stmt.joins, filter_joins(filter, &resolver)?);
            stmt.having = Some(renderer.render(filter)?);
        }
        if stmt.having.is_some()
            && stmt.group_by.is_empty()
            && !self.dialect.supports_having_without_group_by()
        {
            return Err(self.incompatible("HAVING without GROUP BY"));
        }

        // Phase 3: sorting
        for key in query.sorting() {
            let expr = match template.find_column(&key.column) {
                Some(fragment) => fragment.select_expr.clone(),
                None => {
                    if !self.dialect.supports_order_by_unselected() {
                        return Err(self.incompatible(format!(
                            "ORDER BY on unselected column '{}'",
                            key.column
                        )));
                    }
                    let reference = resolver.reference(&key.column)?;
                    merge_joins(&mut stmt.joins, reference.joins);
                    reference.expr
                }
            };
            stmt.order_by.push(OrderItem {
                expr,
                direction: key.direction,
            });
        }

        // Phase 4: pagination
        let (limit, offset) = self.limits.resolve(query.pagination())?;
        if limit.is_none() && offset > 0 && !self.dialect.supports_offset_without_limit() {
            return Err(self.incompatible("OFFSET without LIMIT"));
        }
        let totals = match query.pagination() {
            Some(page) if page.return_page_totals => {
                Some(page_totals_plan(&stmt, &template, self.dialect))
            }
            _ => None,
        };
        stmt.limit = limit;
        stmt.offset = offset;

        // Phase 5: render
        let sql = SqlRenderer::new(&self.dialect);
        let primary = sql.render(&stmt);
        let page_totals = totals.map(|plan| match plan {
            TotalsPlan::CountDistinct(count) => sql.render(&count),
            TotalsPlan::Wrapped(inner) => {
                let inner = sql.render(&inner);
                RenderedStatement {
                    sql: format!(
                        "SELECT COUNT(*) FROM ({}) AS {}",
                        inner.sql,
                        self.dialect.quote_ident(PAGE_TOTALS_ALIAS)
                    ),
                    parameters: inner.parameters,
                }
            }
        });

        tracing::debug!(
            table = %table.name,
            dialect = %self.dialect,
            sql = %primary.sql,
            params = primary.parameters.len(),
            page_totals = page_totals.is_some(),
            "compiled query"
        );

        Ok(CompiledQuery {
            page_totals,
            primary,
            bindings: template.bindings(),
        })
    }

    fn incompatible(&self, reason: impl Into<String>) -> QueryLensError {
        QueryLensError::dialect_incompatible(self.dialect.name(), reason)
    }
}

fn from_clause(table: &Table) -> FromClause {
    let alias = table.canonical_alias().to_string();
    match table.source() {
        TableSource::Physical(name) => FromClause::Table {
            name: name.to_string(),
            alias,
        },
        TableSource::Subquery(sql) => FromClause::Subquery {
            sql: sql.to_string(),
            alias,
        },
    }
}

/// Build the total-count statement from the primary one before its
/// ORDER BY and pagination are applied. The WHERE condition is cloned, so
/// its text and parameters match the primary exactly.
fn page_totals_plan(
    primary: &SelectStatement,
    template: &SqlQueryTemplate,
    dialect: SqlDialect,
) -> TotalsPlan {
    let signature = template.dimension_exprs();
    let countable = primary.having.is_none() && !signature.is_empty() && !template.has_row_metrics();

    if countable {
        let mut count = SelectStatement::new(primary.from.clone());
        count.joins = primary.joins.clone();
        count.where_clause = primary.where_clause.clone();
        count.select = vec![SelectItem {
            expr: dialect.render_count_distinct(&signature),
            alias: None,
        }];
        TotalsPlan::CountDistinct(count)
    } else {
        let mut inner = primary.clone();
        inner.order_by.clear();
        inner.limit = None;
        inner.offset = 0;
        TotalsPlan::Wrapped(inner)
    }
}
