//! Apache Hive dialect.
//!
//! Hive rejects HAVING without GROUP BY and ordering by columns that are not
//! selected, so both shapes are refused at compile time.

use crate::models::{MetricFunction, TimeGrain};

use super::{is_plain_ident, Dialect};

#[derive(Debug, Default, Clone, Copy)]
pub struct HiveDialect;

impl Dialect for HiveDialect {
    fn name(&self) -> &'static str {
        "hive"
    }

    fn quote_ident(&self, ident: &str) -> String {
        if is_plain_ident(ident) {
            ident.to_string()
        } else {
            format!("`{}`", ident.replace('`', "``"))
        }
    }

    fn render_count_distinct(&self, exprs: &[String]) -> String {
        format!("COUNT(DISTINCT {})", exprs.join(", "))
    }

    fn render_aggregation(&self, function: MetricFunction, expr: &str) -> Option<String> {
        match function {
            MetricFunction::Median
            | MetricFunction::ApproxCountDistinct
            | MetricFunction::Native => None,
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
        match grain {
            TimeGrain::Day => {
                Some("from_unixtime(unix_timestamp({{}}, 'yyyy-MM-dd'), 'yyyy-MM-dd')")
            }
            TimeGrain::Month => Some("trunc({{}}, 'MM')"),
            TimeGrain::Quarter => Some("trunc({{}}, 'Q')"),
            TimeGrain::Year => Some("trunc({{}}, 'YYYY')"),
            TimeGrain::Week => None,
        }
    }

    fn supports_having_without_group_by(&self) -> bool {
        false
    }

    fn supports_order_by_unselected(&self) -> bool {
        false
    }

    fn supports_offset_without_limit(&self) -> bool {
        false
    }

    fn render_pagination(&self, limit: Option<u64>, offset: u64) -> Option<String> {
        match (limit, offset) {
            (Some(limit), 0) => Some(format!("LIMIT {limit}")),
            (Some(limit), offset) => Some(format!("LIMIT {offset}, {limit}")),
            (None, _) => None,
        }
    }
}
