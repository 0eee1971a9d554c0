//! DuckDB backend implementation.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};

use crate::config::DuckDbConfig;
use crate::dialect::SqlDialect;
use crate::error::{QueryLensError, Result};
use crate::executor::{duck_value_to_sql, sql_value_to_duck, ColumnMeta, QueryResult};
use crate::sql_ast::RenderedStatement;

use super::BackendConnection;

/// Pooled DuckDB database.
///
/// Connections are cloned from one seed connection, so every pooled
/// connection sees the same database, including an in-memory one.
#[derive(Clone)]
pub struct DuckDbConnection {
    label: String,
    seed: Arc<Mutex<duckdb::Connection>>,
    limiter: Arc<Semaphore>,
    pool: Arc<Mutex<Vec<duckdb::Connection>>>,
}

impl DuckDbConnection {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = duckdb::Connection::open(path)?;
        Ok(Self::from_seed(path.display().to_string(), conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = duckdb::Connection::open_in_memory()?;
        Ok(Self::from_seed(":memory:".to_string(), conn))
    }

    fn from_seed(label: String, conn: duckdb::Connection) -> Self {
        let max_concurrency = default_concurrency();
        tracing::info!(database = %label, max_concurrency, "creating DuckDB connection");
        Self {
            label,
            seed: Arc::new(Mutex::new(conn)),
            limiter: Arc::new(Semaphore::new(max_concurrency)),
            pool: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Configure maximum concurrent executions.
    pub fn with_max_concurrency(mut self, max_in_flight: usize) -> Self {
        tracing::debug!(max_concurrency = max_in_flight, "configuring DuckDB concurrency");
        self.limiter = Arc::new(Semaphore::new(max_in_flight.max(1)));
        self
    }

    pub fn with_config(self, config: &DuckDbConfig) -> Self {
        match config.max_concurrency {
            Some(n) => self.with_max_concurrency(n),
            None => self,
        }
    }

    /// Run DDL or data-loading SQL made of several statements.
    pub async fn execute_batch(&self, sql: &str) -> Result<()> {
        let sql = sql.to_string();
        let _permit = self.acquire_slot().await?;
        let conn = self.checkout_connection().await?;
        let (conn, result) = tokio::task::spawn_blocking(move || {
            let result = conn.execute_batch(&sql).map_err(QueryLensError::from);
            (conn, result)
        })
        .await
        .map_err(|e| QueryLensError::Execution(format!("task join error: {e}")))?;
        self.return_connection(conn).await;
        result
    }

    async fn acquire_slot(&self) -> Result<SemaphorePermit<'_>> {
        if self.limiter.available_permits() == 0 {
            tracing::debug!("all DuckDB slots in use, waiting for permit");
        }
        self.limiter
            .acquire()
            .await
            .map_err(|e| QueryLensError::Execution(format!("limiter closed: {e}")))
    }

    async fn checkout_connection(&self) -> Result<duckdb::Connection> {
        let mut guard = self.pool.lock().await;
        if let Some(conn) = guard.pop() {
            let pool_size = guard.len();
            drop(guard);
            tracing::trace!(pool_remaining = pool_size, "reusing pooled DuckDB connection");
            return Ok(conn);
        }
        drop(guard);
        tracing::debug!(database = %self.label, "opening new DuckDB connection");
        let seed = self.seed.lock().await;
        seed.try_clone()
            .map_err(|e| QueryLensError::Execution(format!("open duckdb: {e}")))
    }

    async fn return_connection(&self, conn: duckdb::Connection) {
        self.pool.lock().await.push(conn);
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn run_statement(conn: &duckdb::Connection, statement: &RenderedStatement) -> Result<QueryResult> {
    let start = Instant::now();
    let params: Vec<_> = statement
        .parameters
        .iter()
        .map(|p| sql_value_to_duck(&p.value))
        .collect();
    let mut stmt = conn.prepare(&statement.sql)?;
    let mut rows_iter = stmt.query(duckdb::params_from_iter(params))?;
    let stmt_ref = rows_iter
        .as_ref()
        .ok_or_else(|| QueryLensError::Execution("statement missing".to_string()))?;
    let mut columns = Vec::new();
    for idx in 0..stmt_ref.column_count() {
        let name = stmt_ref
            .column_name(idx)
            .map_err(|e| QueryLensError::Execution(e.to_string()))?;
        columns.push(ColumnMeta {
            name: name.to_string(),
        });
    }

    let mut rows = Vec::new();
    while let Some(row) = rows_iter.next()? {
        let mut values = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            values.push(duck_value_to_sql(row.get_ref(idx)?.to_owned()));
        }
        rows.push(values);
    }

    tracing::debug!(
        rows = rows.len(),
        columns = columns.len(),
        params = statement.parameters.len(),
        ms = start.elapsed().as_millis(),
        "duckdb execute"
    );
    Ok(QueryResult { columns, rows })
}

#[async_trait]
impl BackendConnection for DuckDbConnection {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::DuckDb
    }

    async fn execute_statements(&self, statements: &[RenderedStatement]) -> Result<Vec<QueryResult>> {
        let statements = statements.to_vec();
        let _permit = self.acquire_slot().await?;
        let conn = self.checkout_connection().await?;
        let (conn, result) = tokio::task::spawn_blocking(move || {
            let result = statements
                .iter()
                .map(|stmt| run_statement(&conn, stmt))
                .collect::<Result<Vec<_>>>();
            (conn, result)
        })
        .await
        .map_err(|e| QueryLensError::Execution(format!("task join error: {e}")))?;
        self.return_connection(conn).await;
        result
    }
}
