//! WHERE/HAVING splitting and predicate rendering.

use serde_json::Value;

use crate::dialect::{Dialect, SqlDialect};
use crate::error::CompileError;
use crate::executor::SqlValue;
use crate::filters::{Arity, FilterExpression, FilterPredicate, Operator};
use crate::reference_table::{merge_joins, JoinClause};
use crate::sql_ast::{BoundParameter, Condition};

use super::resolve::ColumnResolver;

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct FilterSplit {
    pub where_filter: Option<FilterExpression>,
    pub having_filter: Option<FilterExpression>,
}

/// Move every top-level WHERE conjunct that touches an aggregated metric
/// into HAVING, ahead of the caller's own HAVING tree. Conjuncts move
/// whole, so OR and NOT structure below them is kept.
pub(crate) fn split_filters(
    where_filter: Option<&FilterExpression>,
    having_filter: Option<&FilterExpression>,
    resolver: &ColumnResolver<'_>,
) -> Result<FilterSplit, CompileError> {
    let mut keep = Vec::new();
    let mut moved = Vec::new();

    if let Some(filter) = where_filter {
        for conjunct in filter.clone().into_conjuncts() {
            if touches_aggregate(&conjunct, resolver)? {
                moved.push(conjunct);
            } else {
                keep.push(conjunct);
            }
        }
    }

    if let Some(having) = having_filter {
        moved.push(having.clone());
    }

    if !moved.is_empty() {
        tracing::debug!(moved = moved.len(), "filter conjuncts placed in HAVING");
    }

    Ok(FilterSplit {
        where_filter: FilterExpression::conjoin(keep),
        having_filter: FilterExpression::conjoin(moved),
    })
}

fn touches_aggregate(
    expr: &FilterExpression,
    resolver: &ColumnResolver<'_>,
) -> Result<bool, CompileError> {
    for predicate in expr.predicates() {
        if resolver.reference(&predicate.column)?.aggregated {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Joins needed by the columns a filter references.
pub(crate) fn filter_joins(
    expr: &FilterExpression,
    resolver: &ColumnResolver<'_>,
) -> Result<Vec<JoinClause>, CompileError> {
    let mut joins = Vec::new();
    for predicate in expr.predicates() {
        merge_joins(&mut joins, resolver.reference(&predicate.column)?.joins);
    }
    Ok(joins)
}

/// Renders filter trees to parameterized SQL.
///
/// Leaf and placeholder counters run across every tree rendered by the
/// same instance, so WHERE and HAVING of one statement never reuse a
/// parameter name.
pub(crate) struct FilterRenderer<'r, 'a> {
    resolver: &'r ColumnResolver<'a>,
    dialect: SqlDialect,
    next_leaf: usize,
    next_placeholder: usize,
}

impl<'r, 'a> FilterRenderer<'r, 'a> {
    pub fn new(resolver: &'r ColumnResolver<'a>, dialect: SqlDialect) -> Self {
        Self {
            resolver,
            dialect,
            next_leaf: 0,
            next_placeholder: 0,
        }
    }

    pub fn render(&mut self, expr: &FilterExpression) -> Result<Condition, CompileError> {
        match expr {
            FilterExpression::And { left, right } => self.binary("AND", left, right),
            FilterExpression::Or { left, right } => self.binary("OR", left, right),
            FilterExpression::Not { expression } => {
                let inner = self.render(expression)?;
                let sql = match expression.as_ref() {
                    FilterExpression::And { .. } | FilterExpression::Or { .. } => {
                        format!("NOT {}", inner.sql)
                    }
                    _ => format!("NOT ({})", inner.sql),
                };
                Ok(Condition {
                    sql,
                    params: inner.params,
                })
            }
            FilterExpression::Predicate(predicate) => self.predicate(predicate),
        }
    }

    fn binary(
        &mut self,
        keyword: &str,
        left: &FilterExpression,
        right: &FilterExpression,
    ) -> Result<Condition, CompileError> {
        let left = self.render(left)?;
        let right = self.render(right)?;
        let mut params = left.params;
        params.extend(right.params);
        Ok(Condition {
            sql: format!("({} {keyword} {})", left.sql, right.sql),
            params,
        })
    }

    fn predicate(&mut self, predicate: &FilterPredicate) -> Result<Condition, CompileError> {
        check_arity(predicate)?;
        let leaf = self.next_leaf;
        self.next_leaf += 1;

        let column = self.resolver.reference(&predicate.column)?;
        let op = predicate.operator;
        let target = if op.is_case_insensitive() {
            format!("LOWER({})", column.expr)
        } else {
            column.expr
        };

        let mut params = Vec::new();
        let mut bind = |this: &mut Self, value: SqlValue| {
            let name = format!("{}_{}_{}", predicate.column, leaf, params.len());
            params.push(BoundParameter { name, value });
            let placeholder = this.dialect.placeholder(this.next_placeholder);
            this.next_placeholder += 1;
            placeholder
        };

        let sql = match op {
            Operator::In | Operator::NotIn | Operator::InInsensitive => {
                if predicate.values.is_empty() {
                    let always = if op == Operator::NotIn { "(1 = 1)" } else { "(1 = 0)" };
                    always.to_string()
                } else {
                    let mut slots = Vec::with_capacity(predicate.values.len());
                    for value in &predicate.values {
                        let slot = bind(self, SqlValue::from_json(value));
                        slots.push(if op == Operator::InInsensitive {
                            format!("LOWER({slot})")
                        } else {
                            slot
                        });
                    }
                    let keyword = if op == Operator::NotIn { "NOT IN" } else { "IN" };
                    format!("{target} {keyword} ({})", slots.join(", "))
                }
            }
            Operator::Prefix
            | Operator::PrefixInsensitive
            | Operator::Postfix
            | Operator::PostfixInsensitive
            | Operator::Infix
            | Operator::InfixInsensitive => {
                let slot = bind(self, SqlValue::Text(escape_like(&predicate.values[0])));
                let pattern = match op {
                    Operator::Prefix | Operator::PrefixInsensitive => format!("CONCAT({slot}, '%')"),
                    Operator::Postfix | Operator::PostfixInsensitive => {
                        format!("CONCAT('%', {slot})")
                    }
                    _ => format!("CONCAT('%', {slot}, '%')"),
                };
                let pattern = if op.is_case_insensitive() {
                    format!("LOWER({pattern})")
                } else {
                    pattern
                };
                format!("{target} LIKE {pattern}{}", self.dialect.like_escape_clause())
            }
            Operator::IsNull => format!("{target} IS NULL"),
            Operator::NotNull => format!("{target} IS NOT NULL"),
            Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge => {
                let symbol = match op {
                    Operator::Lt => "<",
                    Operator::Le => "<=",
                    Operator::Gt => ">",
                    _ => ">=",
                };
                let slot = bind(self, SqlValue::from_json(&predicate.values[0]));
                format!("{target} {symbol} {slot}")
            }
            Operator::Between | Operator::NotBetween => {
                let low = bind(self, SqlValue::from_json(&predicate.values[0]));
                let high = bind(self, SqlValue::from_json(&predicate.values[1]));
                let keyword = if op == Operator::NotBetween {
                    "NOT BETWEEN"
                } else {
                    "BETWEEN"
                };
                format!("{target} {keyword} {low} AND {high}")
            }
        };

        Ok(Condition { sql, params })
    }
}

fn check_arity(predicate: &FilterPredicate) -> Result<(), CompileError> {
    let got = predicate.values.len();
    let reason = match predicate.operator.arity() {
        Arity::Exactly(n) if got != n => format!("{:?} takes {n} value(s), got {got}", predicate.operator),
        Arity::None if got != 0 => format!("{:?} takes no values, got {got}", predicate.operator),
        _ => return Ok(()),
    };
    Err(CompileError::InvalidFilter {
        column: predicate.column.clone(),
        reason,
    })
}

/// Escape LIKE wildcards with a backslash so the value matches literally.
fn escape_like(value: &Value) -> String {
    let raw = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
