//! Backing-store implementations.
//!
//! Each backend lives in its own file and is gated behind a feature flag.

use async_trait::async_trait;

use crate::dialect::SqlDialect;
use crate::error::Result;
use crate::executor::QueryResult;
use crate::sql_ast::RenderedStatement;

/// Executes rendered statements against a backing store.
#[async_trait]
pub trait BackendConnection: Send + Sync {
    /// Dialect the store expects statements in.
    fn dialect(&self) -> SqlDialect;

    /// Run `statements` in order on one connection and return one result
    /// per statement. The connection goes back to the pool on every path.
    async fn execute_statements(&self, statements: &[RenderedStatement]) -> Result<Vec<QueryResult>>;

    /// Run a single unparameterized statement.
    async fn execute_sql(&self, sql: &str) -> Result<QueryResult> {
        let stmt = RenderedStatement {
            sql: sql.to_string(),
            parameters: Vec::new(),
        };
        let mut results = self.execute_statements(std::slice::from_ref(&stmt)).await?;
        results
            .pop()
            .ok_or_else(|| crate::error::QueryLensError::Execution("no result returned".to_string()))
    }
}

#[cfg(feature = "duckdb")]
mod duckdb;
#[cfg(feature = "duckdb")]
pub use duckdb::DuckDbConnection;
