use std::sync::Arc;

use querylens::{
    ColumnProjection, DuckDbConnection, FilterExpression, Operator, Pagination, Query,
    QueryEngine, QueryLensConfig, QuerySpec, SchemaRegistry, SortKey,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

const SCHEMA: &str = r#"
name: playerStats
table: player_stats
joins:
  country:
    table: country
    keys:
      - left: country_id
        right: id
dimensions:
  overallRating: overall_rating
  countryName:
    join_to: country.name
metrics:
  highScore:
    function: max
    column: high_score
    data_type: integer
time_dimensions:
  recordedDate:
    column: recorded_date
    data_type: date
    grains:
      day: ~
      month: ~
"#;

const COUNTRY: &str = r#"
name: country
dimensions:
  name: name
"#;

async fn bootstrap(db: &DuckDbConnection) -> anyhow::Result<()> {
    db.execute_batch(
        "
        CREATE TABLE country (id INTEGER, name VARCHAR);
        CREATE TABLE player_stats (
            id INTEGER,
            country_id INTEGER,
            overall_rating VARCHAR,
            high_score BIGINT,
            recorded_date DATE
        );
        INSERT INTO country VALUES (1, 'United States'), (2, 'Hong Kong');
        INSERT INTO player_stats VALUES
            (1, 1, 'Great', 1234, '2019-07-12'),
            (2, 2, 'Good', 2412, '2019-07-11'),
            (3, 1, 'Great', 1000, '2019-07-13');
        ",
    )
    .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let db = DuckDbConnection::open_in_memory()?;
    bootstrap(&db).await?;

    let registry = SchemaRegistry::from_tables(vec![
        serde_yaml::from_str(SCHEMA)?,
        serde_yaml::from_str(COUNTRY)?,
    ]);
    let mut config = QueryLensConfig::load_default();
    config.engine.dialect = "duckdb".to_string();
    let engine = QueryEngine::from_config(registry, &config)?.with_backend(Arc::new(db))?;

    let query = Query::new(QuerySpec {
        table: "playerStats".to_string(),
        metrics: vec![ColumnProjection::of("highScore")],
        dimensions: vec![ColumnProjection::of("overallRating")],
        where_filter: Some(FilterExpression::predicate(
            "highScore",
            Operator::Gt,
            vec![json!(1100)],
        )),
        sorting: vec![SortKey::desc("highScore")],
        pagination: Some(Pagination::new(0, Some(10), true)),
        ..QuerySpec::default()
    });

    for sql in engine.render(&query)? {
        println!("{sql}");
    }

    let results = engine.execute(&query, true).await?;
    println!("total groups: {:?}", results.page_totals);
    for row in results.rows {
        println!("{:?}", row?);
    }
    Ok(())
}
