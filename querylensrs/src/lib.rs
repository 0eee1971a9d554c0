pub mod backends;
pub mod config;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod executor;
pub mod expr_utils;
pub mod filters;
pub mod models;
pub mod pagination;
pub mod query;
pub mod query_builder;
pub mod reference_table;
pub mod registry;
pub mod result_cache;
pub mod sql_ast;
pub mod validation;

use std::path::Path;

use crate::error::Result;

/// Load table definitions from `schema_dir` and build an engine for the
/// dialect named in `config`.
pub fn load_engine<P: AsRef<Path>>(schema_dir: P, config: &QueryLensConfig) -> Result<QueryEngine> {
    let registry = SchemaRegistry::load_from_dir(schema_dir)?;
    QueryEngine::from_config(registry, config)
}

pub use backends::BackendConnection;
#[cfg(feature = "duckdb")]
pub use backends::DuckDbConnection;
pub use config::QueryLensConfig;
pub use dialect::{Dialect, DialectRegistry, SqlDialect};
pub use engine::{QueryEngine, QueryResults};
pub use error::{CompileError, QueryLensError};
pub use executor::{ResultRow, SqlValue};
pub use filters::{FilterExpression, Operator};
pub use query::{ColumnProjection, Pagination, Query, QuerySpec, SortKey};
pub use registry::SchemaRegistry;
