//! Clause-level statement values and their rendering.
//!
//! The query builder fills a [`SelectStatement`] clause by clause with
//! already-resolved SQL fragments; [`SqlRenderer`] is the only place that
//! joins them into text for a dialect.

use serde::Serialize;

use crate::dialect::Dialect;
use crate::executor::SqlValue;
use crate::query::SortDirection;
use crate::reference_table::JoinClause;

#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FromClause {
    Table { name: String, alias: String },
    Subquery { sql: String, alias: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub expr: String,
    pub direction: SortDirection,
}

/// One named value bound to a placeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundParameter {
    pub name: String,
    pub value: SqlValue,
}

/// Boolean SQL text together with the values its placeholders bind, in
/// placeholder order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Condition {
    pub sql: String,
    pub params: Vec<BoundParameter>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub distinct: bool,
    pub select: Vec<SelectItem>,
    pub from: FromClause,
    pub joins: Vec<JoinClause>,
    pub where_clause: Option<Condition>,
    pub group_by: Vec<String>,
    pub having: Option<Condition>,
    pub order_by: Vec<OrderItem>,
    pub limit: Option<u64>,
    pub offset: u64,
}

impl SelectStatement {
    pub fn new(from: FromClause) -> Self {
        SelectStatement {
            distinct: false,
            select: Vec::new(),
            from,
            joins: Vec::new(),
            where_clause: None,
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            limit: None,
            offset: 0,
        }
    }

    /// Parameters in the order their placeholders appear in the text.
    pub fn parameters(&self) -> Vec<BoundParameter> {
        self.where_clause
            .iter()
            .chain(self.having.iter())
            .flat_map(|c| c.params.iter().cloned())
            .collect()
    }
}

/// SQL text ready for the backing store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedStatement {
    pub sql: String,
    pub parameters: Vec<BoundParameter>,
}

pub struct SqlRenderer<'d> {
    dialect: &'d dyn Dialect,
}

impl<'d> SqlRenderer<'d> {
    pub fn new(dialect: &'d dyn Dialect) -> Self {
        Self { dialect }
    }

    pub fn render(&self, stmt: &SelectStatement) -> RenderedStatement {
        RenderedStatement {
            sql: self.render_select(stmt),
            parameters: stmt.parameters(),
        }
    }

    pub fn render_select(&self, stmt: &SelectStatement) -> String {
        let select_items: Vec<String> = stmt
            .select
            .iter()
            .map(|item| match &item.alias {
                Some(alias) => format!("{} AS {}", item.expr, self.dialect.quote_ident(alias)),
                None => item.expr.clone(),
            })
            .collect();

        let mut sql = String::from("SELECT ");
        if stmt.distinct {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(&select_items.join(", "));
        sql.push_str(" FROM ");
        sql.push_str(&self.render_from(&stmt.from));

        for join in &stmt.joins {
            sql.push(' ');
            sql.push_str(&join.render());
        }

        if let Some(cond) = &stmt.where_clause {
            sql.push_str(&format!(" WHERE {}", cond.sql));
        }

        if !stmt.group_by.is_empty() {
            sql.push_str(&format!(" GROUP BY {}", stmt.group_by.join(", ")));
        }

        if let Some(cond) = &stmt.having {
            sql.push_str(&format!(" HAVING {}", cond.sql));
        }

        if !stmt.order_by.is_empty() {
            let orders: Vec<String> = stmt
                .order_by
                .iter()
                .map(|o| format!("{} {}", o.expr, o.direction.keyword()))
                .collect();
            sql.push_str(&format!(" ORDER BY {}", orders.join(", ")));
        }

        if let Some(page) = self.dialect.render_pagination(stmt.limit, stmt.offset) {
            sql.push(' ');
            sql.push_str(&page);
        }

        sql
    }

    fn render_from(&self, from: &FromClause) -> String {
        match from {
            FromClause::Table { name, alias } => {
                format!("{name} AS {}", self.dialect.quote_ident(alias))
            }
            FromClause::Subquery { sql, alias } => {
                format!("({sql}) AS {}", self.dialect.quote_ident(alias))
            }
        }
    }
}
