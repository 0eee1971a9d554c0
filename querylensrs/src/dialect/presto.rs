//! Presto dialect.

use crate::models::{MetricFunction, TimeGrain};

use super::Dialect;

#[derive(Debug, Default, Clone, Copy)]
pub struct PrestoDialect;

impl Dialect for PrestoDialect {
    fn name(&self) -> &'static str {
        "presto"
    }

    fn render_aggregation(&self, function: MetricFunction, expr: &str) -> Option<String> {
        match function {
            MetricFunction::Median | MetricFunction::Native => None,
            MetricFunction::ApproxCountDistinct => Some(format!("approx_distinct({expr})")),
            MetricFunction::Sum => Some(format!("SUM({expr})")),
            MetricFunction::Count => Some(format!("COUNT({expr})")),
            MetricFunction::CountDistinct => Some(format!("COUNT(DISTINCT {expr})")),
            MetricFunction::Min => Some(format!("MIN({expr})")),
            MetricFunction::Max => Some(format!("MAX({expr})")),
            MetricFunction::Avg => Some(format!("AVG({expr})")),
            MetricFunction::None => Some(expr.to_string()),
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

    fn render_pagination(&self, limit: Option<u64>, offset: u64) -> Option<String> {
        match (limit, offset) {
            (None, 0) => None,
            (Some(limit), 0) => Some(format!("LIMIT {limit}")),
            (Some(limit), offset) => Some(format!("OFFSET {offset} LIMIT {limit}")),
            (None, offset) => Some(format!("OFFSET {offset}")),
        }
    }

    fn like_escape_clause(&self) -> &'static str {
        " ESCAPE '\\'"
    }
}
