//! Rendered SQL and dialect restrictions for Hive.

mod common;

use common::{assert_sql, engine, null_check_and_threshold, paginated, pred, projections, score_by_rating, spec};
use querylens::filters::Operator;
use querylens::models::TimeGrain;
use querylens::query::{ColumnProjection, Pagination, Query, QuerySpec, SortKey};
use querylens::QueryLensError;
use serde_json::json;

fn render(query: QuerySpec) -> Vec<String> {
    engine("hive").render(&Query::new(query)).unwrap()
}

fn assert_incompatible(query: QuerySpec) {
    match engine("hive").render(&Query::new(query)) {
        Err(QueryLensError::DialectIncompatible { dialect, .. }) => assert_eq!(dialect, "hive"),
        other => panic!("expected dialect rejection, got {other:?}"),
    }
}

#[test]
fn having_with_group_by_is_accepted() {
    let statements = engine("hive").render(&null_check_and_threshold()).unwrap();
    assert_sql(
        &statements[0],
        "SELECT MAX(playerStats.high_score) AS highScore, playerStats.overall_rating AS overallRating
         FROM playerStats AS playerStats
         WHERE playerStats.overall_rating IS NOT NULL
         GROUP BY playerStats.overall_rating
         HAVING MAX(playerStats.high_score) > ?",
    );
}

#[test]
fn having_without_group_by_is_rejected() {
    assert_incompatible(QuerySpec {
        metrics: projections(&["highScore"]),
        where_filter: Some(pred("highScore", Operator::Gt, vec![json!(9000)])),
        ..spec("playerStats")
    });
}

#[test]
fn sort_on_unselected_column_is_rejected() {
    assert_incompatible(QuerySpec {
        sorting: vec![SortKey::asc("lowScore")],
        ..score_by_rating()
    });
}

#[test]
fn sort_on_selected_column_is_accepted() {
    let sql = render(QuerySpec {
        sorting: vec![SortKey::desc("highScore")],
        ..score_by_rating()
    });
    assert!(sql[0].ends_with("ORDER BY MAX(playerStats.high_score) DESC"));
}

#[test]
fn offset_without_limit_is_rejected() {
    assert_incompatible(QuerySpec {
        pagination: Some(Pagination::new(5, None, false)),
        ..score_by_rating()
    });
}

#[test]
fn pagination_uses_offset_comma_limit() {
    let sql = render(QuerySpec {
        pagination: Some(Pagination::new(5, Some(10), false)),
        ..score_by_rating()
    });
    assert!(sql[0].ends_with("LIMIT 5, 10"), "{}", sql[0]);

    let first_page = render(QuerySpec {
        pagination: Some(Pagination::new(0, Some(10), false)),
        ..score_by_rating()
    });
    assert!(first_page[0].ends_with("LIMIT 10"), "{}", first_page[0]);
}

#[test]
fn page_totals_count_distinct_without_parentheses() {
    let mut query = paginated(0, 1).to_spec();
    query.dimensions = projections(&["overallRating", "playerName"]);
    let statements = engine("hive").render(&Query::new(query)).unwrap();
    assert_eq!(statements.len(), 2);
    assert_sql(
        &statements[0],
        "SELECT COUNT(DISTINCT playerStats.overall_rating, playerStats.player_name)
         FROM playerStats AS playerStats",
    );
}

#[test]
fn month_grain_truncates() {
    let sql = render(QuerySpec {
        metrics: projections(&["highScore"]),
        time_dimensions: vec![ColumnProjection::of("recordedDate").with_grain(TimeGrain::Month)],
        ..spec("playerStats")
    });
    assert_sql(
        &sql[0],
        "SELECT MAX(playerStats.high_score) AS highScore, trunc(playerStats.recorded_date, 'MM') AS recordedDate
         FROM playerStats AS playerStats
         GROUP BY trunc(playerStats.recorded_date, 'MM')",
    );
}

#[test]
fn unusual_aliases_are_backtick_quoted() {
    let sql = render(QuerySpec {
        metrics: vec![ColumnProjection::new(
            "highScore",
            "high score",
            Default::default(),
        )],
        ..spec("playerStats")
    });
    assert_sql(
        &sql[0],
        "SELECT MAX(playerStats.high_score) AS `high score` FROM playerStats AS playerStats",
    );
}
