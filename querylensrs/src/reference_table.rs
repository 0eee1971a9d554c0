//! Precomputed column resolution.
//!
//! [`ReferenceTable::build`] walks every column of every registered table
//! once and records the SQL expression it resolves to, the alias of the
//! table that owns it and the joins needed to reach it. Lookups afterwards
//! are plain map reads.
//!
//! Join aliases are the owning alias followed by each relationship hop,
//! joined with `_` (`playerStats_country_continent`). Underscores inside a
//! hop name are doubled (`player_country` becomes `player__country`) and
//! hop names may not start or end with one, so distinct hop sequences never
//! share an alias. Two columns reached through the same hops share one join.

use std::collections::HashMap;

use crate::error::{CompileError, QueryLensError, Result};
use crate::expr_utils::substitute;
use crate::models::{ColumnKind, JoinType, MappingKind, Table, TableSource};
use crate::registry::SchemaRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinTarget {
    Table(String),
    Subquery(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinClause {
    pub alias: String,
    pub join_type: JoinType,
    pub target: JoinTarget,
    pub on: String,
}

impl JoinClause {
    pub fn render(&self) -> String {
        let target = match &self.target {
            JoinTarget::Table(name) => name.clone(),
            JoinTarget::Subquery(sql) => format!("({sql})"),
        };
        format!(
            "{} {target} AS {} ON {}",
            self.join_type.keyword(),
            self.alias,
            self.on
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    pub expression: String,
    pub table_alias: String,
    /// Joins required by the expression, outermost hop first.
    pub joins: Vec<JoinClause>,
    pub kind: ColumnKind,
}

/// Append joins whose alias is not present yet, keeping first-seen order.
///
/// [`ReferenceTable::build`] rejects schemas where one alias names two
/// different joins, so dropping a repeated alias never loses a join.
pub fn merge_joins(into: &mut Vec<JoinClause>, joins: impl IntoIterator<Item = JoinClause>) {
    for join in joins {
        if !into.iter().any(|j| j.alias == join.alias) {
            into.push(join);
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ReferenceTable {
    columns: HashMap<String, HashMap<String, ResolvedColumn>>,
}

impl ReferenceTable {
    /// Resolve every column in the registry. Unknown references, broken
    /// relationships and cyclic templates are schema errors.
    pub fn build(registry: &SchemaRegistry) -> Result<Self> {
        let mut columns = HashMap::new();
        for table in registry.tables.values() {
            let mut resolver = Resolver {
                registry,
                stack: Vec::new(),
            };
            let mut resolved = HashMap::new();
            let mut aliases: HashMap<String, JoinClause> = HashMap::new();
            for (name, _) in table.columns() {
                let column = resolver
                    .resolve_column(table, table.canonical_alias(), name)
                    .and_then(|column| {
                        check_join_aliases(&mut aliases, &column.joins)?;
                        Ok(column)
                    })
                    .map_err(|e| match e {
                        QueryLensError::Schema(msg) => {
                            QueryLensError::Schema(format!("table '{}': {msg}", table.name))
                        }
                        other => other,
                    })?;
                resolved.insert(name.to_string(), column);
            }
            columns.insert(table.name.clone(), resolved);
        }
        tracing::debug!(tables = columns.len(), "built reference table");
        Ok(Self { columns })
    }

    pub fn resolve(
        &self,
        table: &str,
        column: &str,
    ) -> std::result::Result<&ResolvedColumn, CompileError> {
        self.columns
            .get(table)
            .ok_or_else(|| CompileError::UnknownTable(table.to_string()))?
            .get(column)
            .ok_or_else(|| CompileError::UnresolvedColumn {
                table: table.to_string(),
                column: column.to_string(),
            })
    }
}

/// Every join reachable from one table must own its alias outright.
fn check_join_aliases(seen: &mut HashMap<String, JoinClause>, joins: &[JoinClause]) -> Result<()> {
    for join in joins {
        match seen.get(&join.alias) {
            Some(existing) if existing != join => {
                return Err(QueryLensError::Schema(format!(
                    "join alias '{}' is derived for two different joins",
                    join.alias
                )));
            }
            Some(_) => {}
            None => {
                seen.insert(join.alias.clone(), join.clone());
            }
        }
    }
    Ok(())
}

/// Alias of the table reached from `alias` through relationship `hop`.
fn hop_alias(alias: &str, hop: &str) -> Result<String> {
    if hop.starts_with('_') || hop.ends_with('_') {
        return Err(QueryLensError::Schema(format!(
            "relationship '{hop}' may not start or end with '_'"
        )));
    }
    Ok(format!("{alias}_{}", hop.replace('_', "__")))
}

struct Resolver<'r> {
    registry: &'r SchemaRegistry,
    /// (table, column) currently being resolved. The alias is left out so a
    /// loop through relationships is caught even though every hop extends it.
    stack: Vec<(String, String)>,
}

impl<'r> Resolver<'r> {
    fn resolve_column(&mut self, table: &'r Table, alias: &str, name: &str) -> Result<ResolvedColumn> {
        let column = table.column(name).ok_or_else(|| {
            QueryLensError::Schema(format!(
                "unknown column '{name}' referenced on table '{}'",
                table.name
            ))
        })?;
        let key = (table.name.clone(), name.to_string());
        if self.stack.contains(&key) {
            return Err(QueryLensError::Schema(format!(
                "column '{name}' on '{}' refers back to itself",
                table.name
            )));
        }
        self.stack.push(key);
        let mapping = column.mapping().kind(name).map_err(QueryLensError::Schema);
        let result = mapping.and_then(|mapping| self.resolve_mapping(table, alias, mapping));
        self.stack.pop();

        let mut resolved = result?;
        resolved.kind = column.kind();
        Ok(resolved)
    }

    fn resolve_mapping(
        &mut self,
        table: &'r Table,
        alias: &str,
        mapping: MappingKind<'_>,
    ) -> Result<ResolvedColumn> {
        match mapping {
            MappingKind::Physical(column) => Ok(ResolvedColumn {
                expression: format!("{alias}.{column}"),
                table_alias: alias.to_string(),
                joins: Vec::new(),
                kind: ColumnKind::Dimension,
            }),
            MappingKind::Template(template) => {
                let mut joins = Vec::new();
                let expression = substitute(template, |reference| {
                    let resolved = self.resolve_path(table, alias, reference)?;
                    merge_joins(&mut joins, resolved.joins);
                    Ok::<_, QueryLensError>(resolved.expression)
                })?;
                Ok(ResolvedColumn {
                    expression,
                    table_alias: alias.to_string(),
                    joins,
                    kind: ColumnKind::Dimension,
                })
            }
            MappingKind::JoinPath(path) => self.resolve_path(table, alias, path),
        }
    }

    /// Follow `hop.hop.column`, emitting one join per hop.
    fn resolve_path(&mut self, table: &'r Table, alias: &str, path: &str) -> Result<ResolvedColumn> {
        let Some((hop, rest)) = path.split_once('.') else {
            return self.resolve_column(table, alias, path);
        };
        let join = table.joins.get(hop).ok_or_else(|| {
            QueryLensError::Schema(format!(
                "unknown relationship '{hop}' on table '{}'",
                table.name
            ))
        })?;
        let registry = self.registry;
        let target = registry.get_table(&join.table).ok_or_else(|| {
            QueryLensError::Schema(format!(
                "relationship '{hop}' points at unknown table '{}'",
                join.table
            ))
        })?;
        if join.keys.is_empty() {
            return Err(QueryLensError::Schema(format!(
                "relationship '{hop}' on table '{}' declares no join keys",
                table.name
            )));
        }

        let join_alias = hop_alias(alias, hop)?;
        let on = join
            .keys
            .iter()
            .map(|k| format!("{alias}.{} = {join_alias}.{}", k.left, k.right))
            .collect::<Vec<_>>()
            .join(" AND ");
        let clause = JoinClause {
            alias: join_alias.clone(),
            join_type: join.join_type,
            target: match target.source() {
                TableSource::Physical(name) => JoinTarget::Table(name.to_string()),
                TableSource::Subquery(sql) => JoinTarget::Subquery(sql.to_string()),
            },
            on,
        };

        let inner = self.resolve_path(target, &join_alias, rest)?;
        let mut joins = vec![clause];
        merge_joins(&mut joins, inner.joins);
        Ok(ResolvedColumn {
            expression: inner.expression,
            table_alias: inner.table_alias,
            joins,
            kind: inner.kind,
        })
    }
}
