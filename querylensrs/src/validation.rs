use std::collections::HashSet;

use crate::dialect::{is_plain_ident, Dialect, SqlDialect};
use crate::error::{QueryLensError, Result};
use crate::expr_utils::template_refs;
use crate::models::{ColumnDef, MappingKind, MetricFunction, Table};
use crate::registry::SchemaRegistry;

/// Registration-time checks of table definitions against one dialect.
///
/// Broken definitions are always fatal. Findings that leave every column
/// resolvable (an unused join) are logged instead when `warn_only` is set.
pub struct Validator {
    dialect: SqlDialect,
    warn_only: bool,
}

impl Validator {
    pub fn new(dialect: SqlDialect, warn_only: bool) -> Self {
        Self { dialect, warn_only }
    }

    pub fn validate_registry(&self, registry: &SchemaRegistry) -> Result<()> {
        for table in registry.tables.values() {
            self.validate_table(table, registry)?;
        }
        Ok(())
    }

    fn validate_table(&self, table: &Table, registry: &SchemaRegistry) -> Result<()> {
        if table.table.is_some() && table.subquery.is_some() {
            return Err(schema_error(
                table,
                "may set only one of 'table' or 'subquery'".to_string(),
            ));
        }

        // Table and join aliases qualify every column reference unquoted.
        if !is_plain_ident(table.canonical_alias()) {
            return Err(schema_error(
                table,
                format!("alias '{}' is not a plain identifier", table.canonical_alias()),
            ));
        }

        for (join_name, join) in &table.joins {
            if !is_plain_ident(join_name) {
                return Err(schema_error(
                    table,
                    format!("join name '{join_name}' is not a plain identifier"),
                ));
            }
            if registry.get_table(&join.table).is_none() {
                return Err(schema_error(
                    table,
                    format!("join {join_name} references missing table {}", join.table),
                ));
            }
            if join.keys.is_empty() {
                return Err(schema_error(
                    table,
                    format!("join {join_name} must include at least one join key"),
                ));
            }
        }

        let mut used_joins = HashSet::new();
        for (name, column) in table.columns() {
            match column.mapping().kind(name).map_err(|e| schema_error(table, e))? {
                MappingKind::Physical(_) => {}
                MappingKind::Template(template) => {
                    for reference in template_refs(template) {
                        if let Some((hop, _)) = reference.split_once('.') {
                            used_joins.insert(hop.to_string());
                        }
                    }
                }
                MappingKind::JoinPath(path) => {
                    if let Some((hop, _)) = path.split_once('.') {
                        used_joins.insert(hop.to_string());
                    }
                }
            }

            match column {
                ColumnDef::Metric(metric) => {
                    if metric.function != MetricFunction::Native
                        && !self.dialect.supports_metric_function(metric.function)
                    {
                        return Err(schema_error(
                            table,
                            format!(
                                "metric {name} uses {} which {} does not support",
                                metric.function.name(),
                                self.dialect
                            ),
                        ));
                    }
                }
                ColumnDef::TimeDimension(time) => {
                    if time.grains.is_empty() {
                        return Err(schema_error(
                            table,
                            format!("time dimension {name} declares no grains"),
                        ));
                    }
                    for (grain, template) in &time.grains {
                        if template.is_none() && self.dialect.default_grain_template(*grain).is_none() {
                            return Err(schema_error(
                                table,
                                format!(
                                    "time dimension {name} grain {grain} has no template and {} has no default",
                                    self.dialect
                                ),
                            ));
                        }
                    }
                }
                ColumnDef::Dimension(_) => {}
            }
        }

        for join_name in table.joins.keys() {
            self.check(
                used_joins.contains(join_name),
                format!("table {}: join {join_name} is never used", table.name),
            )?;
        }

        Ok(())
    }

    fn check(&self, condition: bool, message: String) -> Result<()> {
        if condition {
            return Ok(());
        }
        if self.warn_only {
            tracing::warn!("{message}");
            Ok(())
        } else {
            Err(QueryLensError::Schema(message))
        }
    }
}

fn schema_error(table: &Table, message: String) -> QueryLensError {
    QueryLensError::Schema(format!("table {}: {message}", table.name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(yaml: &[&str]) -> SchemaRegistry {
        SchemaRegistry::from_tables(
            yaml.iter()
                .map(|y| serde_yaml::from_str(y).unwrap())
                .collect(),
        )
    }

    const COUNTRY: &str = "
name: country
dimensions:
  name: name
";

    #[test]
    fn week_grain_without_default_is_rejected_on_hive() {
        let reg = registry(&["
name: stats
time_dimensions:
  recordedDate:
    grains:
      week: ~
"]);
        assert!(Validator::new(SqlDialect::H2, false)
            .validate_registry(&reg)
            .is_ok());
        let err = Validator::new(SqlDialect::Hive, false)
            .validate_registry(&reg)
            .unwrap_err();
        assert!(matches!(err, QueryLensError::Schema(_)));
    }

    #[test]
    fn empty_grain_map_is_rejected() {
        let reg = registry(&["
name: stats
time_dimensions:
  recordedDate:
    column: recorded_date
"]);
        assert!(Validator::new(SqlDialect::H2, true)
            .validate_registry(&reg)
            .is_err());
    }

    #[test]
    fn unsupported_metric_function_is_fatal() {
        let reg = registry(&["
name: stats
metrics:
  medianScore:
    function: median
    column: score
"]);
        assert!(Validator::new(SqlDialect::H2, false)
            .validate_registry(&reg)
            .is_ok());
        assert!(Validator::new(SqlDialect::Presto, true)
            .validate_registry(&reg)
            .is_err());
    }

    #[test]
    fn unused_join_respects_warn_only() {
        let reg = registry(&[
            "
name: stats
joins:
  country:
    table: country
    keys:
      - left: country_id
        right: id
dimensions:
  rating: rating
",
            COUNTRY,
        ]);
        assert!(Validator::new(SqlDialect::H2, false)
            .validate_registry(&reg)
            .is_err());
        assert!(Validator::new(SqlDialect::H2, true)
            .validate_registry(&reg)
            .is_ok());
    }

    #[test]
    fn non_plain_aliases_are_fatal() {
        let hyphenated = registry(&["
name: stats
alias: player-stats
dimensions:
  rating: rating
"]);
        assert!(matches!(
            Validator::new(SqlDialect::H2, true).validate_registry(&hyphenated),
            Err(QueryLensError::Schema(msg)) if msg.contains("player-stats")
        ));

        let spaced_join = registry(&[
            "
name: stats
joins:
  home country:
    table: country
    keys:
      - left: country_id
        right: id
dimensions:
  countryName:
    join_to: home country.name
",
            COUNTRY,
        ]);
        assert!(matches!(
            Validator::new(SqlDialect::H2, true).validate_registry(&spaced_join),
            Err(QueryLensError::Schema(msg)) if msg.contains("home country")
        ));
    }

    #[test]
    fn join_to_missing_table_is_fatal() {
        let reg = registry(&["
name: stats
joins:
  country:
    table: nowhere
    keys:
      - left: country_id
        right: id
dimensions:
  countryName:
    join_to: country.name
"]);
        assert!(Validator::new(SqlDialect::H2, true)
            .validate_registry(&reg)
            .is_err());
    }
}
