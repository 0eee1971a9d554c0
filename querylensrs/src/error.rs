use thiserror::Error;

pub type Result<T> = std::result::Result<T, QueryLensError>;

#[derive(Debug, Error)]
pub enum QueryLensError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Config(String),
    /// Registration-time schema problem. The engine refuses to start.
    #[error("schema error: {0}")]
    Schema(String),
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),
    #[error("dialect {dialect} does not support {reason}")]
    DialectIncompatible { dialect: String, reason: String },
    #[error("execution error: {0}")]
    Execution(String),
    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] duckdb::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Problems with a single query. No SQL text is produced when one is raised.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("unknown table '{0}'")]
    UnknownTable(String),
    #[error("column '{column}' is not defined on table '{table}'")]
    UnresolvedColumn { table: String, column: String },
    #[error("column '{column}' is a {actual}, not a {expected}")]
    WrongColumnKind {
        column: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("metric function {function} on '{alias}' is not supported by {dialect}")]
    UnsupportedMetricFunction {
        alias: String,
        function: String,
        dialect: String,
    },
    #[error("non-SQL metric function on '{0}'")]
    NonSqlMetricFunction(String),
    #[error("projection alias '{0}' is used more than once")]
    AliasCollision(String),
    #[error("grain {grain} is not defined for time dimension '{column}'")]
    UnsupportedGrain { column: String, grain: String },
    #[error("invalid filter on '{column}': {reason}")]
    InvalidFilter { column: String, reason: String },
    #[error("query projects no columns")]
    EmptyProjection,
    #[error("page limit {limit} exceeds the maximum of {max}")]
    PageLimitExceeded { limit: u64, max: u64 },
}

impl QueryLensError {
    pub(crate) fn dialect_incompatible(dialect: &str, reason: impl Into<String>) -> Self {
        QueryLensError::DialectIncompatible {
            dialect: dialect.to_string(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by the query itself, including shapes the dialect rejects.
    pub fn is_compile(&self) -> bool {
        matches!(
            self,
            QueryLensError::Compile(_) | QueryLensError::DialectIncompatible { .. }
        )
    }

    /// True for failures raised by the backing store.
    pub fn is_execution(&self) -> bool {
        #[cfg(feature = "duckdb")]
        if matches!(self, QueryLensError::DuckDb(_)) {
            return true;
        }
        matches!(self, QueryLensError::Execution(_))
    }
}
