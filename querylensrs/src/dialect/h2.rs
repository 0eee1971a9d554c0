//! H2, the default dialect.

use crate::models::{MetricFunction, TimeGrain};

use super::Dialect;

#[derive(Debug, Default, Clone, Copy)]
pub struct H2Dialect;

impl Dialect for H2Dialect {
    fn name(&self) -> &'static str {
        "h2"
    }

    fn render_aggregation(&self, function: MetricFunction, expr: &str) -> Option<String> {
        match function {
            MetricFunction::ApproxCountDistinct | MetricFunction::Native => None,
            MetricFunction::Sum => Some(format!("SUM({expr})")),
            MetricFunction::Count => Some(format!("COUNT({expr})")),
            MetricFunction::CountDistinct => Some(format!("COUNT(DISTINCT {expr})")),
            MetricFunction::Min => Some(format!("MIN({expr})")),
            MetricFunction::Max => Some(format!("MAX({expr})")),
            MetricFunction::Avg => Some(format!("AVG({expr})")),
            MetricFunction::Median => Some(format!("MEDIAN({expr})")),
            MetricFunction::None => Some(expr.to_string()),
        }
    }

    fn default_grain_template(&self, grain: TimeGrain) -> Option<&'static str> {
        Some(match grain {
            TimeGrain::Day => "PARSEDATETIME(FORMATDATETIME({{}}, 'yyyy-MM-dd'), 'yyyy-MM-dd')",
            TimeGrain::Week => "DATE_TRUNC('WEEK', {{}})",
            TimeGrain::Month => "PARSEDATETIME(FORMATDATETIME({{}}, 'yyyy-MM'), 'yyyy-MM')",
            TimeGrain::Quarter => "DATE_TRUNC('QUARTER', {{}})",
            TimeGrain::Year => "PARSEDATETIME(FORMATDATETIME({{}}, 'yyyy'), 'yyyy')",
        })
    }
}
