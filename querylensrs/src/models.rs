//! Schema definitions: tables and the columns they expose to queries.
//!
//! Tables are normally loaded from YAML by [`crate::registry::SchemaRegistry`].
//! A column is either mapped straight onto a physical column, described by an
//! expression template, or reached through a chain of joins (`join_to`).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Table {
    pub name: String,
    /// Physical table name. Defaults to `name`.
    #[serde(default)]
    pub table: Option<String>,
    /// Canonical alias used in the FROM clause. Defaults to `name`.
    #[serde(default)]
    pub alias: Option<String>,
    /// Nested SQL that stands in for a physical table.
    #[serde(default)]
    pub subquery: Option<String>,
    #[serde(default)]
    pub joins: BTreeMap<String, JoinDef>,
    #[serde(default)]
    pub dimensions: BTreeMap<String, Dimension>,
    #[serde(default)]
    pub metrics: BTreeMap<String, Metric>,
    #[serde(default)]
    pub time_dimensions: BTreeMap<String, TimeDimension>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Where a table's rows come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableSource<'a> {
    Physical(&'a str),
    Subquery(&'a str),
}

/// Borrowed view over any of the three column kinds.
#[derive(Debug, Clone, Copy)]
pub enum ColumnDef<'a> {
    Dimension(&'a Dimension),
    Metric(&'a Metric),
    TimeDimension(&'a TimeDimension),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Dimension,
    Metric,
    TimeDimension,
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Dimension => "dimension",
            ColumnKind::Metric => "metric",
            ColumnKind::TimeDimension => "time dimension",
        }
    }
}

impl Table {
    pub fn canonical_alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn source(&self) -> TableSource<'_> {
        match &self.subquery {
            Some(sql) => TableSource::Subquery(sql),
            None => TableSource::Physical(self.table.as_deref().unwrap_or(&self.name)),
        }
    }

    pub fn column(&self, name: &str) -> Option<ColumnDef<'_>> {
        if let Some(dim) = self.dimensions.get(name) {
            return Some(ColumnDef::Dimension(dim));
        }
        if let Some(metric) = self.metrics.get(name) {
            return Some(ColumnDef::Metric(metric));
        }
        self.time_dimensions
            .get(name)
            .map(ColumnDef::TimeDimension)
    }

    /// Every column name paired with its definition, in a stable order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, ColumnDef<'_>)> {
        let dims = self
            .dimensions
            .iter()
            .map(|(k, v)| (k.as_str(), ColumnDef::Dimension(v)));
        let metrics = self
            .metrics
            .iter()
            .map(|(k, v)| (k.as_str(), ColumnDef::Metric(v)));
        let times = self
            .time_dimensions
            .iter()
            .map(|(k, v)| (k.as_str(), ColumnDef::TimeDimension(v)));
        dims.chain(metrics).chain(times)
    }
}

impl<'a> ColumnDef<'a> {
    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnDef::Dimension(_) => ColumnKind::Dimension,
            ColumnDef::Metric(_) => ColumnKind::Metric,
            ColumnDef::TimeDimension(_) => ColumnKind::TimeDimension,
        }
    }

    pub fn mapping(&self) -> &'a ColumnMapping {
        match *self {
            ColumnDef::Dimension(d) => &d.mapping,
            ColumnDef::Metric(m) => &m.mapping,
            ColumnDef::TimeDimension(t) => &t.mapping,
        }
    }

    pub fn data_type(&self) -> Option<ValueType> {
        match self {
            ColumnDef::Dimension(d) => d.data_type,
            ColumnDef::Metric(m) => m.data_type,
            ColumnDef::TimeDimension(t) => t.data_type,
        }
    }
}

/// How a column maps onto SQL. At most one of the three fields may be set;
/// when none is, the column name doubles as the physical column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnMapping {
    #[serde(default)]
    pub column: Option<String>,
    /// SQL template. `{{name}}` is replaced with the resolved expression of
    /// another column on the same table; `{{rel.name}}` follows a join.
    #[serde(default)]
    pub expression: Option<String>,
    /// Relationship path ending in a column, e.g. `country.isoCode`.
    #[serde(default)]
    pub join_to: Option<String>,
}

/// The mapping after the mutual-exclusion rule has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingKind<'a> {
    Physical(&'a str),
    Template(&'a str),
    JoinPath(&'a str),
}

impl ColumnMapping {
    pub fn physical(column: impl Into<String>) -> Self {
        Self {
            column: Some(column.into()),
            ..Self::default()
        }
    }

    pub fn template(expression: impl Into<String>) -> Self {
        Self {
            expression: Some(expression.into()),
            ..Self::default()
        }
    }

    pub fn join_path(path: impl Into<String>) -> Self {
        Self {
            join_to: Some(path.into()),
            ..Self::default()
        }
    }

    /// Classify the mapping, falling back to `name` as the physical column.
    pub fn kind<'a>(&'a self, name: &'a str) -> std::result::Result<MappingKind<'a>, String> {
        match (&self.column, &self.expression, &self.join_to) {
            (None, None, None) => Ok(MappingKind::Physical(name)),
            (Some(c), None, None) => Ok(MappingKind::Physical(c)),
            (None, Some(e), None) => Ok(MappingKind::Template(e)),
            (None, None, Some(p)) => Ok(MappingKind::JoinPath(p)),
            _ => Err(format!(
                "column '{name}' may set only one of 'column', 'expression' or 'join_to'"
            )),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Dimension {
    #[serde(flatten)]
    pub mapping: ColumnMapping,
    pub data_type: Option<ValueType>,
    pub description: Option<String>,
}

impl<'de> Deserialize<'de> for Dimension {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::String(s) => Ok(Dimension {
                mapping: ColumnMapping::physical(s),
                data_type: None,
                description: None,
            }),
            other => {
                #[derive(Deserialize)]
                #[serde(deny_unknown_fields)]
                struct Full {
                    column: Option<String>,
                    expression: Option<String>,
                    join_to: Option<String>,
                    data_type: Option<ValueType>,
                    description: Option<String>,
                }
                let full = Full::deserialize(other).map_err(de::Error::custom)?;
                Ok(Dimension {
                    mapping: ColumnMapping {
                        column: full.column,
                        expression: full.expression,
                        join_to: full.join_to,
                    },
                    data_type: full.data_type,
                    description: full.description,
                })
            }
        }
    }
}

/// A metric is a column wrapped in an aggregate function when selected.
#[derive(Debug, Clone, Serialize)]
pub struct Metric {
    pub function: MetricFunction,
    #[serde(flatten)]
    pub mapping: ColumnMapping,
    pub data_type: Option<ValueType>,
    pub description: Option<String>,
}

impl<'de> Deserialize<'de> for Metric {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Raw {
            function: MetricFunction,
            column: Option<String>,
            expression: Option<String>,
            join_to: Option<String>,
            data_type: Option<ValueType>,
            description: Option<String>,
        }
        let raw = Raw::deserialize(deserializer)?;
        Ok(Metric {
            function: raw.function,
            mapping: ColumnMapping {
                column: raw.column,
                expression: raw.expression,
                join_to: raw.join_to,
            },
            data_type: raw.data_type,
            description: raw.description,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeDimension {
    #[serde(flatten)]
    pub mapping: ColumnMapping,
    /// Grain to SQL template. `{{}}` is the column's own expression; `None`
    /// asks the dialect for its default truncation.
    pub grains: BTreeMap<TimeGrain, Option<String>>,
    pub data_type: Option<ValueType>,
    pub description: Option<String>,
}

impl<'de> Deserialize<'de> for TimeDimension {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Raw {
            column: Option<String>,
            expression: Option<String>,
            join_to: Option<String>,
            #[serde(default)]
            grains: BTreeMap<TimeGrain, Option<String>>,
            data_type: Option<ValueType>,
            description: Option<String>,
        }
        let raw = Raw::deserialize(deserializer)?;
        Ok(TimeDimension {
            mapping: ColumnMapping {
                column: raw.column,
                expression: raw.expression,
                join_to: raw.join_to,
            },
            grains: raw.grains,
            data_type: raw.data_type,
            description: raw.description,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinDef {
    /// Name of the joined table in the registry.
    pub table: String,
    #[serde(rename = "type", default)]
    pub join_type: JoinType,
    pub keys: Vec<JoinKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JoinKey {
    pub left: String,
    pub right: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JoinType {
    Inner,
    #[default]
    Left,
    Right,
    Full,
}

impl JoinType {
    pub fn keyword(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Full => "FULL JOIN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricFunction {
    Sum,
    Count,
    CountDistinct,
    Min,
    Max,
    Avg,
    Median,
    ApproxCountDistinct,
    /// Row-level pass-through: the expression is selected as is.
    None,
    /// Computed outside the database; cannot be rendered as SQL.
    Native,
}

impl MetricFunction {
    pub fn is_aggregate(&self) -> bool {
        !matches!(self, MetricFunction::None)
    }

    pub fn name(&self) -> &'static str {
        match self {
            MetricFunction::Sum => "SUM",
            MetricFunction::Count => "COUNT",
            MetricFunction::CountDistinct => "COUNT_DISTINCT",
            MetricFunction::Min => "MIN",
            MetricFunction::Max => "MAX",
            MetricFunction::Avg => "AVG",
            MetricFunction::Median => "MEDIAN",
            MetricFunction::ApproxCountDistinct => "APPROX_COUNT_DISTINCT",
            MetricFunction::None => "NONE",
            MetricFunction::Native => "NATIVE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeGrain {
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl TimeGrain {
    pub const ALL: [TimeGrain; 5] = [
        TimeGrain::Day,
        TimeGrain::Week,
        TimeGrain::Month,
        TimeGrain::Quarter,
        TimeGrain::Year,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeGrain::Day => "day",
            TimeGrain::Week => "week",
            TimeGrain::Month => "month",
            TimeGrain::Quarter => "quarter",
            TimeGrain::Year => "year",
        }
    }
}

impl fmt::Display for TimeGrain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

impl FromStr for TimeGrain {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        TimeGrain::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown time grain '{s}'"))
    }
}

/// Declared result type, used to coerce raw values during hydration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Integer,
    Decimal,
    Text,
    Boolean,
    Date,
    Timestamp,
}
