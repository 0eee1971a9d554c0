//! Filter expression trees.
//!
//! Trees are produced by whatever parses the caller's filter syntax; the
//! compiler only inspects their shape and predicate metadata. They
//! deserialize from JSON such as
//! `{"type": "predicate", "column": "highScore", "operator": "gt", "values": [9000]}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterExpression {
    And {
        left: Box<FilterExpression>,
        right: Box<FilterExpression>,
    },
    Or {
        left: Box<FilterExpression>,
        right: Box<FilterExpression>,
    },
    Not {
        expression: Box<FilterExpression>,
    },
    Predicate(FilterPredicate),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterPredicate {
    /// Column name on the query's table.
    pub column: String,
    pub operator: Operator,
    #[serde(default)]
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    In,
    NotIn,
    InInsensitive,
    Prefix,
    PrefixInsensitive,
    Postfix,
    PostfixInsensitive,
    Infix,
    InfixInsensitive,
    IsNull,
    NotNull,
    Lt,
    Le,
    Gt,
    Ge,
    Between,
    NotBetween,
}

/// How many values an operator takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    None,
    Exactly(usize),
    Any,
}

impl Operator {
    pub fn arity(&self) -> Arity {
        match self {
            Operator::IsNull | Operator::NotNull => Arity::None,
            Operator::In | Operator::NotIn | Operator::InInsensitive => Arity::Any,
            Operator::Between | Operator::NotBetween => Arity::Exactly(2),
            _ => Arity::Exactly(1),
        }
    }

    /// LIKE-style operators, whose bound values get their wildcards escaped.
    pub fn is_matching(&self) -> bool {
        matches!(
            self,
            Operator::Prefix
                | Operator::PrefixInsensitive
                | Operator::Postfix
                | Operator::PostfixInsensitive
                | Operator::Infix
                | Operator::InfixInsensitive
        )
    }

    pub fn is_case_insensitive(&self) -> bool {
        matches!(
            self,
            Operator::InInsensitive
                | Operator::PrefixInsensitive
                | Operator::PostfixInsensitive
                | Operator::InfixInsensitive
        )
    }
}

impl FilterExpression {
    pub fn and(left: FilterExpression, right: FilterExpression) -> Self {
        FilterExpression::And {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn or(left: FilterExpression, right: FilterExpression) -> Self {
        FilterExpression::Or {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(expression: FilterExpression) -> Self {
        FilterExpression::Not {
            expression: Box::new(expression),
        }
    }

    pub fn predicate(column: impl Into<String>, operator: Operator, values: Vec<Value>) -> Self {
        FilterExpression::Predicate(FilterPredicate {
            column: column.into(),
            operator,
            values,
        })
    }

    /// Leaf predicates, left to right.
    pub fn predicates(&self) -> Vec<&FilterPredicate> {
        let mut out = Vec::new();
        self.collect_predicates(&mut out);
        out
    }

    fn collect_predicates<'a>(&'a self, out: &mut Vec<&'a FilterPredicate>) {
        match self {
            FilterExpression::And { left, right } | FilterExpression::Or { left, right } => {
                left.collect_predicates(out);
                right.collect_predicates(out);
            }
            FilterExpression::Not { expression } => expression.collect_predicates(out),
            FilterExpression::Predicate(p) => out.push(p),
        }
    }

    /// Split the top-level AND chain into its operands.
    pub fn into_conjuncts(self) -> Vec<FilterExpression> {
        match self {
            FilterExpression::And { left, right } => {
                let mut out = left.into_conjuncts();
                out.extend(right.into_conjuncts());
                out
            }
            other => vec![other],
        }
    }

    /// Rebuild a left-nested AND chain. `None` for an empty list.
    pub fn conjoin(parts: Vec<FilterExpression>) -> Option<FilterExpression> {
        parts.into_iter().reduce(FilterExpression::and)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_tree_from_json() {
        let tree: FilterExpression = serde_json::from_value(json!({
            "type": "and",
            "left": {"type": "predicate", "column": "overallRating", "operator": "not_null"},
            "right": {
                "type": "not",
                "expression": {"type": "predicate", "column": "highScore", "operator": "gt", "values": [9000]}
            }
        }))
        .unwrap();
        let columns: Vec<_> = tree.predicates().iter().map(|p| p.column.as_str()).collect();
        assert_eq!(columns, vec!["overallRating", "highScore"]);
    }

    #[test]
    fn conjuncts_round_trip_through_conjoin() {
        let a = FilterExpression::predicate("a", Operator::NotNull, vec![]);
        let b = FilterExpression::predicate("b", Operator::Gt, vec![json!(1)]);
        let c = FilterExpression::or(a.clone(), b.clone());
        let tree = FilterExpression::and(FilterExpression::and(a.clone(), b.clone()), c.clone());

        let parts = tree.clone().into_conjuncts();
        assert_eq!(parts, vec![a, b, c]);
        assert_eq!(FilterExpression::conjoin(parts), Some(tree));
        assert_eq!(FilterExpression::conjoin(vec![]), None);
    }

    #[test]
    fn operator_arity() {
        assert_eq!(Operator::NotNull.arity(), Arity::None);
        assert_eq!(Operator::Between.arity(), Arity::Exactly(2));
        assert_eq!(Operator::In.arity(), Arity::Any);
        assert!(Operator::InfixInsensitive.is_matching());
        assert!(!Operator::In.is_matching());
    }
}
