use std::{env, fs, path::PathBuf};

use querylens::{DialectRegistry, Query, QueryEngine, QueryLensConfig, SchemaRegistry};
use tracing_subscriber::EnvFilter;

fn usage() {
    eprintln!("Usage: print_sql <schema_dir> <query_json> [dialect]");
    eprintln!("Example: cargo run --example print_sql -- demos/schema demos/queries/top_scores.json hive");
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = env::args().skip(1).collect::<Vec<_>>();
    if args.len() < 2 {
        usage();
        std::process::exit(1);
    }

    let schema_dir = PathBuf::from(args.remove(0));
    let query_path = PathBuf::from(args.remove(0));
    let config = QueryLensConfig::load_default();
    let dialect = args
        .first()
        .cloned()
        .unwrap_or_else(|| config.engine.dialect.clone());

    let registry = SchemaRegistry::load_from_dir(schema_dir)?;
    let engine = QueryEngine::new(registry, &dialect, &DialectRegistry::builtin(), &config)?;

    let query: Query = serde_json::from_str(&fs::read_to_string(query_path)?)?;
    for sql in engine.render(&query)? {
        println!("{sql};");
    }
    Ok(())
}
