//! The query engine: the entry point callers hold on to.
//!
//! An engine owns a validated [`SchemaRegistry`], the [`ReferenceTable`]
//! built from it and one [`SqlDialect`]. None of these change after
//! construction, so `render` and `execute` can run concurrently from any
//! number of tasks. The optional result cache is the only mutable state.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::backends::BackendConnection;
use crate::config::QueryLensConfig;
use crate::dialect::{DialectRegistry, SqlDialect};
use crate::error::{QueryLensError, Result};
use crate::executor::{HydratedRows, QueryResult, SqlValue};
use crate::pagination::{compute_statement_hash, PageLimits};
use crate::query::{ColumnProjection, Query};
use crate::query_builder::{CompiledQuery, QueryConstructor};
use crate::reference_table::ReferenceTable;
use crate::registry::SchemaRegistry;
use crate::result_cache::ResultCache;
use crate::sql_ast::RenderedStatement;
use crate::validation::Validator;

/// Rows of an executed query, plus the total row count when the query's
/// pagination asked for it.
#[derive(Debug)]
pub struct QueryResults {
    pub page_totals: Option<u64>,
    pub rows: HydratedRows,
}

pub struct QueryEngine {
    registry: SchemaRegistry,
    references: ReferenceTable,
    dialect: SqlDialect,
    limits: PageLimits,
    backend: Option<Arc<dyn BackendConnection>>,
    cache: Option<Mutex<ResultCache>>,
}

impl QueryEngine {
    /// Validate `registry` against the dialect registered as `dialect_name`
    /// and precompute column resolution. Schema errors are fatal here.
    pub fn new(
        registry: SchemaRegistry,
        dialect_name: &str,
        dialects: &DialectRegistry,
        config: &QueryLensConfig,
    ) -> Result<Self> {
        let dialect = dialects.get(dialect_name)?;
        Validator::new(dialect, config.validation.warn_only).validate_registry(&registry)?;
        let references = ReferenceTable::build(&registry)?;
        tracing::info!(
            dialect = %dialect,
            tables = registry.tables.len(),
            "query engine ready"
        );
        Ok(Self {
            registry,
            references,
            dialect,
            limits: PageLimits::from_config(&config.engine),
            backend: None,
            cache: config
                .cache
                .enabled
                .then(|| Mutex::new(ResultCache::with_config(&config.cache))),
        })
    }

    /// Engine for the dialect named in `config`, looked up among the built-in dialects.
    pub fn from_config(registry: SchemaRegistry, config: &QueryLensConfig) -> Result<Self> {
        Self::new(
            registry,
            &config.engine.dialect,
            &DialectRegistry::builtin(),
            config,
        )
    }

    /// Attach the backing store used by [`QueryEngine::execute`]. Its
    /// dialect must match the engine's.
    pub fn with_backend(mut self, backend: Arc<dyn BackendConnection>) -> Result<Self> {
        if backend.dialect() != self.dialect {
            return Err(QueryLensError::Config(format!(
                "backend speaks {} but the engine compiles for {}",
                backend.dialect(),
                self.dialect
            )));
        }
        self.backend = Some(backend);
        Ok(self)
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn construct_projection(
        &self,
        column: impl Into<String>,
        alias: impl Into<String>,
        arguments: BTreeMap<String, String>,
    ) -> ColumnProjection {
        ColumnProjection::new(column, alias, arguments)
    }

    pub fn compile(&self, query: &Query) -> Result<CompiledQuery> {
        QueryConstructor::new(&self.registry, &self.references, self.dialect, self.limits)
            .compile(query)
    }

    /// SQL text of every statement `execute` would run, page-total first.
    pub fn render(&self, query: &Query) -> Result<Vec<String>> {
        Ok(self.compile(query)?.sql_texts())
    }

    /// Compile and run `query`. When its pagination asked for totals, the
    /// total is recorded on the query's [`crate::query::Pagination`] before
    /// the rows are returned.
    pub async fn execute(&self, query: &Query, use_cache: bool) -> Result<QueryResults> {
        let compiled = self.compile(query)?;
        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| QueryLensError::Config("no backend attached to the engine".to_string()))?;

        let statements: Vec<RenderedStatement> =
            compiled.statements().into_iter().cloned().collect();
        let mut results = self.run(backend.as_ref(), &statements, use_cache).await?;

        let primary = results
            .pop()
            .ok_or_else(|| QueryLensError::Execution("primary statement returned no result".to_string()))?;

        let page_totals = match (&compiled.page_totals, results.first()) {
            (Some(_), Some(totals)) => {
                let total = total_count(totals)?;
                if let Some(page) = query.pagination() {
                    page.totals_handle().set(total);
                }
                Some(total)
            }
            (Some(_), None) => {
                return Err(QueryLensError::Execution(
                    "page total statement returned no result".to_string(),
                ))
            }
            (None, _) => None,
        };

        Ok(QueryResults {
            page_totals,
            rows: HydratedRows::new(compiled.bindings, primary),
        })
    }

    async fn run(
        &self,
        backend: &dyn BackendConnection,
        statements: &[RenderedStatement],
        use_cache: bool,
    ) -> Result<Vec<QueryResult>> {
        let cache = match (&self.cache, use_cache) {
            (Some(cache), true) => cache,
            _ => return backend.execute_statements(statements).await,
        };

        let key = compute_statement_hash(statements);
        {
            let guard = cache
                .lock()
                .map_err(|_| QueryLensError::Execution("result cache poisoned".to_string()))?;
            if let Some(hit) = guard.get(key) {
                tracing::debug!(key, "result cache hit");
                return Ok(hit.to_vec());
            }
        }

        let results = backend.execute_statements(statements).await?;
        cache
            .lock()
            .map_err(|_| QueryLensError::Execution("result cache poisoned".to_string()))?
            .insert(key, results.clone());
        Ok(results)
    }
}

fn total_count(result: &QueryResult) -> Result<u64> {
    match result.scalar() {
        Some(SqlValue::Integer(n)) if *n >= 0 => Ok(*n as u64),
        Some(SqlValue::Float(f)) if *f >= 0.0 && f.fract() == 0.0 => Ok(*f as u64),
        other => Err(QueryLensError::Execution(format!(
            "page total statement returned {other:?}"
        ))),
    }
}
