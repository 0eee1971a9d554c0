//! Page-size policy and statement hashing.
//!
//! A query's [`Pagination`] is checked against engine-wide limits before
//! its LIMIT/OFFSET reach the statement. Statement hashes key the result
//! cache.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::config::EngineConfig;
use crate::error::CompileError;
use crate::query::Pagination;
use crate::sql_ast::RenderedStatement;

/// Engine-wide page size bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageLimits {
    /// Applied when a query paginates without naming a limit.
    pub default_limit: Option<u64>,
    /// Largest limit a query may request.
    pub max_limit: Option<u64>,
}

impl PageLimits {
    pub fn from_config(config: &EngineConfig) -> Self {
        PageLimits {
            default_limit: config.default_page_limit,
            max_limit: config.max_page_limit,
        }
    }

    /// Effective `(limit, offset)` for a query. Queries without pagination
    /// are unbounded.
    pub fn resolve(&self, pagination: Option<&Pagination>) -> Result<(Option<u64>, u64), CompileError> {
        let Some(page) = pagination else {
            return Ok((None, 0));
        };
        let limit = page.limit.or(self.default_limit);
        if let (Some(limit), Some(max)) = (limit, self.max_limit) {
            if limit > max {
                return Err(CompileError::PageLimitExceeded { limit, max });
            }
        }
        Ok((limit, page.offset))
    }
}

/// Hash of statement text and bound values, in order.
///
/// Values are hashed through their JSON form so floats and dates take
/// part without implementing `Hash` on [`crate::executor::SqlValue`].
pub fn compute_statement_hash(statements: &[RenderedStatement]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for stmt in statements {
        stmt.sql.hash(&mut hasher);
        for param in &stmt.parameters {
            param.name.hash(&mut hasher);
            if let Ok(json) = serde_json::to_string(&param.value) {
                json.hash(&mut hasher);
            }
        }
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::SqlValue;
    use crate::sql_ast::BoundParameter;

    #[test]
    fn default_limit_applies_only_to_paginated_queries() {
        let limits = PageLimits {
            default_limit: Some(50),
            max_limit: Some(100),
        };
        assert_eq!(limits.resolve(None).unwrap(), (None, 0));
        let page = Pagination::new(10, None, false);
        assert_eq!(limits.resolve(Some(&page)).unwrap(), (Some(50), 10));
    }

    #[test]
    fn limit_above_max_is_rejected() {
        let limits = PageLimits {
            default_limit: None,
            max_limit: Some(100),
        };
        let page = Pagination::new(0, Some(101), false);
        assert_eq!(
            limits.resolve(Some(&page)),
            Err(CompileError::PageLimitExceeded { limit: 101, max: 100 })
        );
    }

    #[test]
    fn hash_depends_on_parameter_values() {
        let stmt = |v: i64| RenderedStatement {
            sql: "SELECT a FROM t WHERE a > ?".to_string(),
            parameters: vec![BoundParameter {
                name: "a_0_0".to_string(),
                value: SqlValue::Integer(v),
            }],
        };
        assert_eq!(
            compute_statement_hash(&[stmt(1)]),
            compute_statement_hash(&[stmt(1)])
        );
        assert_ne!(
            compute_statement_hash(&[stmt(1)]),
            compute_statement_hash(&[stmt(2)])
        );
    }
}
