//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use querylens::config::QueryLensConfig;
use querylens::filters::{FilterExpression, Operator};
use querylens::models::Table;
use querylens::query::{ColumnProjection, Pagination, Query, QuerySpec, SortKey};
use querylens::{DialectRegistry, QueryEngine, SchemaRegistry};
use serde_json::{json, Value};

pub const PLAYER_STATS: &str = r#"
name: playerStats
table: playerStats
joins:
  country:
    table: country
    keys:
      - left: country_id
        right: id
dimensions:
  overallRating: overall_rating
  playerName: player_name
  countryName:
    join_to: country.name
  countryIsoCode:
    join_to: country.iso_code
  countryNickName:
    expression: "{{country.nick_name}}"
metrics:
  highScore:
    function: max
    column: high_score
    data_type: integer
  lowScore:
    function: min
    column: low_score
    data_type: integer
  scoreSpread:
    function: max
    expression: "{{highScore}} - {{lowScore}}"
    data_type: integer
  highScoreNoAgg:
    function: none
    column: high_score
    data_type: integer
  customScore:
    function: native
    column: high_score
time_dimensions:
  recordedDate:
    column: recorded_date
    data_type: date
    grains:
      day: ~
      month: ~
  updatedDate:
    column: updated_date
    data_type: date
    grains:
      day: "CAST({{}} AS DATE)"
"#;

pub const COUNTRY: &str = r#"
name: country
dimensions:
  name: name
  iso_code: iso_code
  nick_name: nick_name
"#;

pub const PLAYER_STATS_VIEW: &str = r#"
name: playerStatsView
alias: psv
subquery: "SELECT * FROM playerStats WHERE high_score > 0"
dimensions:
  overallRating: overall_rating
metrics:
  highScore:
    function: max
    column: high_score
    data_type: integer
"#;

pub fn registry() -> SchemaRegistry {
    let tables: Vec<Table> = [PLAYER_STATS, COUNTRY, PLAYER_STATS_VIEW]
        .iter()
        .map(|yaml| serde_yaml::from_str(yaml).expect("fixture yaml"))
        .collect();
    SchemaRegistry::from_tables(tables)
}

pub fn engine(dialect: &str) -> QueryEngine {
    QueryEngine::new(
        registry(),
        dialect,
        &DialectRegistry::builtin(),
        &QueryLensConfig::default(),
    )
    .expect("engine builds")
}

/// Collapse runs of whitespace so expected SQL can be written across lines.
pub fn normalize(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn assert_sql(actual: &str, expected: &str) {
    assert_eq!(normalize(actual), normalize(expected));
}

pub fn pred(column: &str, operator: Operator, values: Vec<Value>) -> FilterExpression {
    FilterExpression::predicate(column, operator, values)
}

pub fn spec(table: &str) -> QuerySpec {
    QuerySpec {
        table: table.to_string(),
        ..QuerySpec::default()
    }
}

pub fn projections(names: &[&str]) -> Vec<ColumnProjection> {
    names.iter().map(|n| ColumnProjection::of(*n)).collect()
}

/// `highScore` by `overallRating`.
pub fn score_by_rating() -> QuerySpec {
    QuerySpec {
        metrics: projections(&["highScore"]),
        dimensions: projections(&["overallRating"]),
        ..spec("playerStats")
    }
}

/// Scenario: WHERE `overallRating IS NOT NULL AND highScore > 9000`.
pub fn null_check_and_threshold() -> Query {
    Query::new(QuerySpec {
        where_filter: Some(FilterExpression::and(
            pred("overallRating", Operator::NotNull, vec![]),
            pred("highScore", Operator::Gt, vec![json!(9000)]),
        )),
        ..score_by_rating()
    })
}

pub fn paginated(offset: u64, limit: u64) -> Query {
    Query::new(QuerySpec {
        sorting: vec![SortKey::desc("highScore")],
        pagination: Some(Pagination::new(offset, Some(limit), true)),
        ..score_by_rating()
    })
}
