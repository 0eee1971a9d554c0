//! Column resolvers: one projection in, one fragment out.

use crate::dialect::{Dialect, SqlDialect};
use crate::error::CompileError;
use crate::expr_utils::apply_grain_template;
use crate::models::{ColumnDef, ColumnKind, Metric, MetricFunction, Table, TimeDimension, ValueType};
use crate::query::ColumnProjection;
use crate::reference_table::{JoinClause, ReferenceTable, ResolvedColumn};

use super::components::Fragment;

/// A column as it appears inside a filter or sort key.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ColumnReference {
    pub expr: String,
    pub joins: Vec<JoinClause>,
    pub aggregated: bool,
}

pub(crate) struct ColumnResolver<'a> {
    table: &'a Table,
    references: &'a ReferenceTable,
    dialect: SqlDialect,
}

impl<'a> ColumnResolver<'a> {
    pub fn new(table: &'a Table, references: &'a ReferenceTable, dialect: SqlDialect) -> Self {
        Self {
            table,
            references,
            dialect,
        }
    }

    fn lookup(&self, column: &str) -> Result<(ColumnDef<'a>, &'a ResolvedColumn), CompileError> {
        let def = self
            .table
            .column(column)
            .ok_or_else(|| CompileError::UnresolvedColumn {
                table: self.table.name.clone(),
                column: column.to_string(),
            })?;
        let resolved = self.references.resolve(&self.table.name, column)?;
        Ok((def, resolved))
    }

    pub fn resolve_projection(
        &self,
        kind: ColumnKind,
        projection: &ColumnProjection,
    ) -> Result<Fragment, CompileError> {
        match kind {
            ColumnKind::Metric => self.resolve_metric(projection),
            ColumnKind::Dimension => self.resolve_dimension(projection),
            ColumnKind::TimeDimension => self.resolve_time_dimension(projection),
        }
    }

    pub fn resolve_metric(&self, projection: &ColumnProjection) -> Result<Fragment, CompileError> {
        let (def, resolved) = self.lookup(&projection.column)?;
        let ColumnDef::Metric(metric) = def else {
            return Err(wrong_kind(&projection.column, ColumnKind::Metric, def.kind()));
        };
        let select_expr = self.aggregate(metric, &resolved.expression, &projection.alias)?;
        Ok(Fragment {
            column: projection.column.clone(),
            alias: projection.alias.clone(),
            select_expr,
            joins: resolved.joins.clone(),
            group_by: None,
            aggregated: metric.function.is_aggregate(),
            value_type: metric.data_type,
        })
    }

    pub fn resolve_dimension(&self, projection: &ColumnProjection) -> Result<Fragment, CompileError> {
        let (def, resolved) = self.lookup(&projection.column)?;
        let ColumnDef::Dimension(dimension) = def else {
            return Err(wrong_kind(&projection.column, ColumnKind::Dimension, def.kind()));
        };
        Ok(plain_fragment(projection, resolved, resolved.expression.clone(), dimension.data_type))
    }

    pub fn resolve_time_dimension(
        &self,
        projection: &ColumnProjection,
    ) -> Result<Fragment, CompileError> {
        let (def, resolved) = self.lookup(&projection.column)?;
        let ColumnDef::TimeDimension(time) = def else {
            return Err(wrong_kind(
                &projection.column,
                ColumnKind::TimeDimension,
                def.kind(),
            ));
        };
        let expr = self.grain_expression(time, projection, &resolved.expression)?;
        Ok(plain_fragment(
            projection,
            resolved,
            expr,
            time.data_type.or(Some(ValueType::Timestamp)),
        ))
    }

    /// Resolve a column named by a filter or sort key. Metrics come back
    /// wrapped in their aggregate so the text matches what is selected.
    pub fn reference(&self, column: &str) -> Result<ColumnReference, CompileError> {
        let (def, resolved) = self.lookup(column)?;
        let (expr, aggregated) = match def {
            ColumnDef::Metric(metric) => (
                self.aggregate(metric, &resolved.expression, column)?,
                metric.function.is_aggregate(),
            ),
            _ => (resolved.expression.clone(), false),
        };
        Ok(ColumnReference {
            expr,
            joins: resolved.joins.clone(),
            aggregated,
        })
    }

    fn aggregate(&self, metric: &Metric, expr: &str, alias: &str) -> Result<String, CompileError> {
        if metric.function == MetricFunction::Native {
            return Err(CompileError::NonSqlMetricFunction(alias.to_string()));
        }
        self.dialect
            .render_aggregation(metric.function, expr)
            .ok_or_else(|| CompileError::UnsupportedMetricFunction {
                alias: alias.to_string(),
                function: metric.function.name().to_string(),
                dialect: self.dialect.name().to_string(),
            })
    }

    /// Pick the grain template for a projection. Without a `grain`
    /// argument the finest declared grain is used.
    fn grain_expression(
        &self,
        time: &TimeDimension,
        projection: &ColumnProjection,
        base: &str,
    ) -> Result<String, CompileError> {
        let unsupported = |grain: String| CompileError::UnsupportedGrain {
            column: projection.column.clone(),
            grain,
        };
        let grain = match projection.grain()? {
            Some(grain) => grain,
            None => *time
                .grains
                .keys()
                .next()
                .ok_or_else(|| unsupported("<none>".to_string()))?,
        };
        let template = match time.grains.get(&grain) {
            Some(Some(custom)) => custom.as_str(),
            Some(None) => self
                .dialect
                .default_grain_template(grain)
                .ok_or_else(|| unsupported(grain.to_string()))?,
            None => return Err(unsupported(grain.to_string())),
        };
        Ok(apply_grain_template(template, base))
    }
}

fn plain_fragment(
    projection: &ColumnProjection,
    resolved: &ResolvedColumn,
    expr: String,
    value_type: Option<ValueType>,
) -> Fragment {
    Fragment {
        column: projection.column.clone(),
        alias: projection.alias.clone(),
        select_expr: expr.clone(),
        joins: resolved.joins.clone(),
        group_by: Some(expr),
        aggregated: false,
        value_type,
    }
}

fn wrong_kind(column: &str, expected: ColumnKind, actual: ColumnKind) -> CompileError {
    CompileError::WrongColumnKind {
        column: column.to_string(),
        expected: expected.as_str(),
        actual: actual.as_str(),
    }
}
