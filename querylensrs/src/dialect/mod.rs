//! SQL dialects.
//!
//! Each dialect lives in its own file as a unit struct implementing
//! [`Dialect`]. Callers work with the closed [`SqlDialect`] enum, looked up
//! by name through an explicit [`DialectRegistry`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{QueryLensError, Result};
use crate::models::{MetricFunction, TimeGrain};

mod duckdb;
mod h2;
mod hive;
mod presto;

pub use duckdb::DuckDbDialect;
pub use h2::H2Dialect;
pub use hive::HiveDialect;
pub use presto::PrestoDialect;

/// Syntax variation points. Clause assembly lives in the query builder;
/// a dialect only maps individual constructs to text and answers legality
/// questions about statement shapes.
pub trait Dialect {
    fn name(&self) -> &'static str;

    /// Identifiers made of word characters are emitted bare.
    fn quote_ident(&self, ident: &str) -> String {
        if is_plain_ident(ident) {
            ident.to_string()
        } else {
            format!("\"{}\"", ident.replace('"', "\"\""))
        }
    }

    fn placeholder(&self, _idx: usize) -> String {
        "?".to_string()
    }

    fn render_count_distinct(&self, exprs: &[String]) -> String {
        format!("COUNT(DISTINCT({}))", exprs.join(", "))
    }

    /// Wrap `expr` in the metric's aggregate. `None` when the dialect has no
    /// equivalent function.
    fn render_aggregation(&self, function: MetricFunction, expr: &str) -> Option<String> {
        match function {
            MetricFunction::Sum => Some(format!("SUM({expr})")),
            MetricFunction::Count => Some(format!("COUNT({expr})")),
            MetricFunction::CountDistinct => Some(format!("COUNT(DISTINCT {expr})")),
            MetricFunction::Min => Some(format!("MIN({expr})")),
            MetricFunction::Max => Some(format!("MAX({expr})")),
            MetricFunction::Avg => Some(format!("AVG({expr})")),
            MetricFunction::Median => Some(format!("MEDIAN({expr})")),
            MetricFunction::ApproxCountDistinct => Some(format!("APPROX_COUNT_DISTINCT({expr})")),
            MetricFunction::None => Some(expr.to_string()),
            MetricFunction::Native => None,
        }
    }

    fn supports_metric_function(&self, function: MetricFunction) -> bool {
        self.render_aggregation(function, "x").is_some()
    }

    /// Truncation template for a grain, with `{{}}` marking the column.
    fn default_grain_template(&self, grain: TimeGrain) -> Option<&'static str>;

    fn supports_having_without_group_by(&self) -> bool {
        true
    }

    fn supports_order_by_unselected(&self) -> bool {
        true
    }

    fn supports_offset_without_limit(&self) -> bool {
        true
    }

    fn render_pagination(&self, limit: Option<u64>, offset: u64) -> Option<String> {
        match (limit, offset) {
            (None, 0) => None,
            (Some(limit), 0) => Some(format!("LIMIT {limit}")),
            (Some(limit), offset) => Some(format!("LIMIT {limit} OFFSET {offset}")),
            (None, offset) => Some(format!("OFFSET {offset}")),
        }
    }

    /// Trailing clause for LIKE patterns whose wildcards were escaped with `\`.
    fn like_escape_clause(&self) -> &'static str {
        ""
    }
}

pub(crate) fn is_plain_ident(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// The closed set of supported dialects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlDialect {
    #[default]
    H2,
    Hive,
    Presto,
    #[serde(rename = "duckdb")]
    DuckDb,
}

impl SqlDialect {
    pub const ALL: [SqlDialect; 4] = [
        SqlDialect::H2,
        SqlDialect::Hive,
        SqlDialect::Presto,
        SqlDialect::DuckDb,
    ];

    fn capabilities(&self) -> &'static (dyn Dialect + Send + Sync) {
        match self {
            SqlDialect::H2 => &H2Dialect,
            SqlDialect::Hive => &HiveDialect,
            SqlDialect::Presto => &PrestoDialect,
            SqlDialect::DuckDb => &DuckDbDialect,
        }
    }
}

impl Dialect for SqlDialect {
    fn name(&self) -> &'static str {
        self.capabilities().name()
    }

    fn quote_ident(&self, ident: &str) -> String {
        self.capabilities().quote_ident(ident)
    }

    fn placeholder(&self, idx: usize) -> String {
        self.capabilities().placeholder(idx)
    }

    fn render_count_distinct(&self, exprs: &[String]) -> String {
        self.capabilities().render_count_distinct(exprs)
    }

    fn render_aggregation(&self, function: MetricFunction, expr: &str) -> Option<String> {
        self.capabilities().render_aggregation(function, expr)
    }

    fn supports_metric_function(&self, function: MetricFunction) -> bool {
        self.capabilities().supports_metric_function(function)
    }

    fn default_grain_template(&self, grain: TimeGrain) -> Option<&'static str> {
        self.capabilities().default_grain_template(grain)
    }

    fn supports_having_without_group_by(&self) -> bool {
        self.capabilities().supports_having_without_group_by()
    }

    fn supports_order_by_unselected(&self) -> bool {
        self.capabilities().supports_order_by_unselected()
    }

    fn supports_offset_without_limit(&self) -> bool {
        self.capabilities().supports_offset_without_limit()
    }

    fn render_pagination(&self, limit: Option<u64>, offset: u64) -> Option<String> {
        self.capabilities().render_pagination(limit, offset)
    }

    fn like_escape_clause(&self) -> &'static str {
        self.capabilities().like_escape_clause()
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SqlDialect {
    type Err = QueryLensError;

    fn from_str(s: &str) -> Result<Self> {
        SqlDialect::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| QueryLensError::Config(format!("unknown dialect '{s}'")))
    }
}

/// Named dialects available to an engine. Passed in at construction; there
/// is no process-wide lookup.
#[derive(Debug, Clone, Default)]
pub struct DialectRegistry {
    dialects: BTreeMap<String, SqlDialect>,
}

impl DialectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in dialect under its own name.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for dialect in SqlDialect::ALL {
            registry.register(dialect.name(), dialect);
        }
        registry
    }

    /// Register `dialect` under `name`; names are case-insensitive.
    pub fn register(&mut self, name: impl AsRef<str>, dialect: SqlDialect) {
        self.dialects
            .insert(name.as_ref().to_ascii_lowercase(), dialect);
    }

    pub fn get(&self, name: &str) -> Result<SqlDialect> {
        self.dialects
            .get(&name.to_ascii_lowercase())
            .copied()
            .ok_or_else(|| QueryLensError::Config(format!("dialect '{name}' is not registered")))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.dialects.keys().map(String::as_str)
    }
}
