//! DuckDB dialect, used with the bundled DuckDB backing store.

use crate::models::TimeGrain;

use super::Dialect;

#[derive(Debug, Default, Clone, Copy)]
pub struct DuckDbDialect;

impl Dialect for DuckDbDialect {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    fn render_count_distinct(&self, exprs: &[String]) -> String {
        match exprs {
            [single] => format!("COUNT(DISTINCT {single})"),
            many => format!("COUNT(DISTINCT ({}))", many.join(", ")),
        }
    }

    fn default_grain_template(&self, grain: TimeGrain) -> Option<&'static str> {
        Some(match grain {
            TimeGrain::Day => "date_trunc('day', {{}})",
            TimeGrain::Week => "date_trunc('week', {{}})",
            TimeGrain::Month => "date_trunc('month', {{}})",
            TimeGrain::Quarter => "date_trunc('quarter', {{}})",
            TimeGrain::Year => "date_trunc('year', {{}})",
        })
    }

    fn like_escape_clause(&self) -> &'static str {
        " ESCAPE '\\'"
    }
}
