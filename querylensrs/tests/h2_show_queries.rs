//! Rendered SQL for the H2 dialect.

mod common;

use std::collections::BTreeMap;

use common::{assert_sql, engine, null_check_and_threshold, paginated, pred, projections, score_by_rating, spec};
use querylens::executor::SqlValue;
use querylens::filters::{FilterExpression, Operator};
use querylens::models::TimeGrain;
use querylens::query::{ColumnProjection, Pagination, Query, QuerySpec, SortKey};
use querylens::{CompileError, QueryLensError};
use serde_json::json;

fn render_one(query: QuerySpec) -> String {
    let mut statements = engine("h2").render(&Query::new(query)).unwrap();
    assert_eq!(statements.len(), 1);
    statements.remove(0)
}

fn compile_err(query: QuerySpec) -> CompileError {
    match engine("h2").render(&Query::new(query)) {
        Err(QueryLensError::Compile(e)) => e,
        other => panic!("expected compile error, got {other:?}"),
    }
}

#[test]
fn metric_only() {
    let sql = render_one(QuerySpec {
        metrics: projections(&["highScore"]),
        ..spec("playerStats")
    });
    assert_sql(
        &sql,
        "SELECT MAX(playerStats.high_score) AS highScore FROM playerStats AS playerStats",
    );
}

#[test]
fn metric_with_dimension_groups_by_dimension() {
    assert_sql(
        &render_one(score_by_rating()),
        "SELECT MAX(playerStats.high_score) AS highScore, playerStats.overall_rating AS overallRating
         FROM playerStats AS playerStats
         GROUP BY playerStats.overall_rating",
    );
}

#[test]
fn dimensions_only_select_distinct() {
    let sql = render_one(QuerySpec {
        dimensions: projections(&["overallRating", "playerName"]),
        ..spec("playerStats")
    });
    assert_sql(
        &sql,
        "SELECT DISTINCT playerStats.overall_rating AS overallRating, playerStats.player_name AS playerName
         FROM playerStats AS playerStats",
    );
}

#[test]
fn join_is_emitted_once_for_shared_path() {
    let sql = render_one(QuerySpec {
        metrics: projections(&["highScore"]),
        dimensions: projections(&["countryName", "countryIsoCode", "countryNickName"]),
        ..spec("playerStats")
    });
    assert_sql(
        &sql,
        "SELECT MAX(playerStats.high_score) AS highScore, playerStats_country.name AS countryName,
                playerStats_country.iso_code AS countryIsoCode, playerStats_country.nick_name AS countryNickName
         FROM playerStats AS playerStats
         LEFT JOIN country AS playerStats_country ON playerStats.country_id = playerStats_country.id
         GROUP BY playerStats_country.name, playerStats_country.iso_code, playerStats_country.nick_name",
    );
    assert_eq!(sql.matches("LEFT JOIN").count(), 1);
}

#[test]
fn aggregate_predicate_moves_to_having() {
    let compiled = engine("h2").compile(&null_check_and_threshold()).unwrap();
    assert_sql(
        &compiled.primary.sql,
        "SELECT MAX(playerStats.high_score) AS highScore, playerStats.overall_rating AS overallRating
         FROM playerStats AS playerStats
         WHERE playerStats.overall_rating IS NOT NULL
         GROUP BY playerStats.overall_rating
         HAVING MAX(playerStats.high_score) > ?",
    );
    assert_eq!(compiled.primary.parameters.len(), 1);
    assert_eq!(compiled.primary.parameters[0].name, "highScore_1_0");
    assert_eq!(compiled.primary.parameters[0].value, SqlValue::Integer(9000));
}

#[test]
fn where_and_having_trees_combine() {
    let sql = render_one(QuerySpec {
        where_filter: Some(FilterExpression::and(
            pred("overallRating", Operator::NotNull, vec![]),
            pred("highScore", Operator::Gt, vec![json!(100)]),
        )),
        having_filter: Some(pred("highScore", Operator::Lt, vec![json!(9000)])),
        ..score_by_rating()
    });
    assert_sql(
        &sql,
        "SELECT MAX(playerStats.high_score) AS highScore, playerStats.overall_rating AS overallRating
         FROM playerStats AS playerStats
         WHERE playerStats.overall_rating IS NOT NULL
         GROUP BY playerStats.overall_rating
         HAVING (MAX(playerStats.high_score) > ? AND MAX(playerStats.high_score) < ?)",
    );
}

#[test]
fn mixed_or_conjunct_moves_whole() {
    let sql = render_one(QuerySpec {
        where_filter: Some(FilterExpression::or(
            pred("overallRating", Operator::In, vec![json!("Great")]),
            pred("highScore", Operator::Gt, vec![json!(100)]),
        )),
        ..score_by_rating()
    });
    assert_sql(
        &sql,
        "SELECT MAX(playerStats.high_score) AS highScore, playerStats.overall_rating AS overallRating
         FROM playerStats AS playerStats
         GROUP BY playerStats.overall_rating
         HAVING (playerStats.overall_rating IN (?) OR MAX(playerStats.high_score) > ?)",
    );
}

#[test]
fn sorting_and_pagination() {
    let sql = render_one(QuerySpec {
        sorting: vec![SortKey::desc("highScore"), SortKey::asc("overallRating")],
        pagination: Some(Pagination::new(5, Some(10), false)),
        ..score_by_rating()
    });
    assert_sql(
        &sql,
        "SELECT MAX(playerStats.high_score) AS highScore, playerStats.overall_rating AS overallRating
         FROM playerStats AS playerStats
         GROUP BY playerStats.overall_rating
         ORDER BY MAX(playerStats.high_score) DESC, playerStats.overall_rating ASC
         LIMIT 10 OFFSET 5",
    );
}

#[test]
fn sort_on_unselected_column_is_allowed() {
    let sql = render_one(QuerySpec {
        sorting: vec![SortKey::asc("countryName")],
        ..score_by_rating()
    });
    assert!(sql.contains("LEFT JOIN country AS playerStats_country"));
    assert!(sql.ends_with("ORDER BY playerStats_country.name ASC"));
}

#[test]
fn page_totals_come_first() {
    let statements = engine("h2").render(&paginated(0, 1)).unwrap();
    assert_eq!(statements.len(), 2);
    assert_sql(
        &statements[0],
        "SELECT COUNT(DISTINCT(playerStats.overall_rating)) FROM playerStats AS playerStats",
    );
    assert_sql(
        &statements[1],
        "SELECT MAX(playerStats.high_score) AS highScore, playerStats.overall_rating AS overallRating
         FROM playerStats AS playerStats
         GROUP BY playerStats.overall_rating
         ORDER BY MAX(playerStats.high_score) DESC
         LIMIT 1",
    );
}

#[test]
fn page_totals_with_having_wrap_the_primary() {
    let mut query = null_check_and_threshold().to_spec();
    query.sorting = vec![SortKey::desc("highScore")];
    query.pagination = Some(Pagination::new(0, Some(10), true));
    let compiled = engine("h2").compile(&Query::new(query)).unwrap();
    let totals = compiled.page_totals.unwrap();
    assert_sql(
        &totals.sql,
        "SELECT COUNT(*) FROM (SELECT MAX(playerStats.high_score) AS highScore,
            playerStats.overall_rating AS overallRating
            FROM playerStats AS playerStats
            WHERE playerStats.overall_rating IS NOT NULL
            GROUP BY playerStats.overall_rating
            HAVING MAX(playerStats.high_score) > ?) AS page_totals",
    );
    assert_eq!(totals.parameters, compiled.primary.parameters);
}

#[test]
fn time_dimension_grains() {
    let sql = render_one(QuerySpec {
        metrics: projections(&["highScore"]),
        time_dimensions: vec![ColumnProjection::of("recordedDate").with_grain(TimeGrain::Month)],
        ..spec("playerStats")
    });
    let month = "PARSEDATETIME(FORMATDATETIME(playerStats.recorded_date, 'yyyy-MM'), 'yyyy-MM')";
    assert_sql(
        &sql,
        &format!(
            "SELECT MAX(playerStats.high_score) AS highScore, {month} AS recordedDate
             FROM playerStats AS playerStats GROUP BY {month}"
        ),
    );

    let custom = render_one(QuerySpec {
        time_dimensions: vec![ColumnProjection::of("updatedDate").with_grain(TimeGrain::Day)],
        ..spec("playerStats")
    });
    assert_sql(
        &custom,
        "SELECT DISTINCT CAST(playerStats.updated_date AS DATE) AS updatedDate FROM playerStats AS playerStats",
    );
}

#[test]
fn time_dimension_defaults_to_finest_grain() {
    let sql = render_one(QuerySpec {
        time_dimensions: projections(&["recordedDate"]),
        ..spec("playerStats")
    });
    assert!(sql.contains("FORMATDATETIME(playerStats.recorded_date, 'yyyy-MM-dd')"));
}

#[test]
fn undeclared_grain_is_rejected() {
    let err = compile_err(QuerySpec {
        time_dimensions: vec![ColumnProjection::of("recordedDate").with_grain(TimeGrain::Year)],
        ..spec("playerStats")
    });
    assert!(matches!(err, CompileError::UnsupportedGrain { .. }));
}

#[test]
fn subquery_table_source() {
    let sql = render_one(QuerySpec {
        metrics: projections(&["highScore"]),
        dimensions: projections(&["overallRating"]),
        ..spec("playerStatsView")
    });
    assert_sql(
        &sql,
        "SELECT MAX(psv.high_score) AS highScore, psv.overall_rating AS overallRating
         FROM (SELECT * FROM playerStats WHERE high_score > 0) AS psv
         GROUP BY psv.overall_rating",
    );
}

#[test]
fn template_metric_wraps_substituted_expression() {
    let sql = render_one(QuerySpec {
        metrics: projections(&["scoreSpread"]),
        ..spec("playerStats")
    });
    assert_sql(
        &sql,
        "SELECT MAX(playerStats.high_score - playerStats.low_score) AS scoreSpread FROM playerStats AS playerStats",
    );
}

#[test]
fn pass_through_metric_is_not_aggregated() {
    let sql = render_one(QuerySpec {
        metrics: projections(&["highScoreNoAgg"]),
        dimensions: projections(&["overallRating"]),
        where_filter: Some(pred("highScoreNoAgg", Operator::Ge, vec![json!(10)])),
        ..spec("playerStats")
    });
    assert_sql(
        &sql,
        "SELECT DISTINCT playerStats.high_score AS highScoreNoAgg, playerStats.overall_rating AS overallRating
         FROM playerStats AS playerStats
         WHERE playerStats.high_score >= ?",
    );
}

#[test]
fn filter_operators() {
    let filter = FilterExpression::and(
        FilterExpression::and(
            pred("overallRating", Operator::In, vec![json!("Great"), json!("Good")]),
            pred("playerName", Operator::PrefixInsensitive, vec![json!("j_d")]),
        ),
        FilterExpression::and(
            FilterExpression::not(pred("countryIsoCode", Operator::IsNull, vec![])),
            pred("playerName", Operator::In, vec![]),
        ),
    );
    let compiled = engine("h2")
        .compile(&Query::new(QuerySpec {
            where_filter: Some(filter),
            ..score_by_rating()
        }))
        .unwrap();
    assert_sql(
        &compiled.primary.sql,
        "SELECT MAX(playerStats.high_score) AS highScore, playerStats.overall_rating AS overallRating
         FROM playerStats AS playerStats
         LEFT JOIN country AS playerStats_country ON playerStats.country_id = playerStats_country.id
         WHERE (((playerStats.overall_rating IN (?, ?)
                AND LOWER(playerStats.player_name) LIKE LOWER(CONCAT(?, '%')))
                AND NOT (playerStats_country.iso_code IS NULL))
                AND (1 = 0))
         GROUP BY playerStats.overall_rating",
    );
    let params: Vec<_> = compiled
        .primary
        .parameters
        .iter()
        .map(|p| (p.name.as_str(), p.value.clone()))
        .collect();
    assert_eq!(
        params,
        vec![
            ("overallRating_0_0", SqlValue::Text("Great".into())),
            ("overallRating_0_1", SqlValue::Text("Good".into())),
            ("playerName_1_0", SqlValue::Text("j\\_d".into())),
        ]
    );
}

#[test]
fn between_renders_two_placeholders() {
    let sql = render_one(QuerySpec {
        where_filter: Some(pred(
            "highScoreNoAgg",
            Operator::NotBetween,
            vec![json!(1), json!(5)],
        )),
        ..score_by_rating()
    });
    assert!(sql.contains("WHERE playerStats.high_score NOT BETWEEN ? AND ?"));
}

#[test]
fn compile_errors() {
    assert!(matches!(
        compile_err(QuerySpec {
            metrics: projections(&["customScore"]),
            ..spec("playerStats")
        }),
        CompileError::NonSqlMetricFunction(_)
    ));
    assert!(matches!(
        compile_err(QuerySpec {
            metrics: projections(&["noSuchColumn"]),
            ..spec("playerStats")
        }),
        CompileError::UnresolvedColumn { .. }
    ));
    assert!(matches!(
        compile_err(QuerySpec {
            metrics: projections(&["overallRating"]),
            ..spec("playerStats")
        }),
        CompileError::WrongColumnKind { .. }
    ));
    assert_eq!(compile_err(spec("playerStats")), CompileError::EmptyProjection);
    assert!(matches!(
        compile_err(QuerySpec {
            metrics: projections(&["highScore"]),
            ..spec("nowhere")
        }),
        CompileError::UnknownTable(_)
    ));
    assert!(matches!(
        compile_err(QuerySpec {
            where_filter: Some(pred("highScore", Operator::Between, vec![json!(1)])),
            ..score_by_rating()
        }),
        CompileError::InvalidFilter { .. }
    ));
    assert_eq!(
        compile_err(QuerySpec {
            pagination: Some(Pagination::new(0, Some(10_001), false)),
            ..score_by_rating()
        }),
        CompileError::PageLimitExceeded {
            limit: 10_001,
            max: 10_000
        }
    );
}

#[test]
fn alias_collision_is_rejected() {
    let err = compile_err(QuerySpec {
        metrics: vec![ColumnProjection::new("highScore", "score", BTreeMap::new())],
        dimensions: vec![ColumnProjection::new("overallRating", "score", BTreeMap::new())],
        ..spec("playerStats")
    });
    assert_eq!(err, CompileError::AliasCollision("score".to_string()));
}

#[test]
fn compile_errors_are_not_execution_errors() {
    let err = engine("h2")
        .render(&Query::new(QuerySpec {
            metrics: projections(&["customScore"]),
            ..spec("playerStats")
        }))
        .unwrap_err();
    assert!(err.is_compile());
    assert!(!err.is_execution());
}
