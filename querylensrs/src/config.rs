//! Configuration system for QueryLens.
//!
//! TOML-based, every section optional with built-in defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{QueryLensError, Result};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct QueryLensConfig {
    pub engine: EngineConfig,
    pub cache: CacheConfig,
    pub backend: BackendConfig,
    pub validation: ValidationConfig,
}

/// Compiler settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Dialect name looked up in the engine's dialect registry (default: h2).
    pub dialect: String,
    /// Limit applied when a query paginates without one.
    pub default_page_limit: Option<u64>,
    /// Largest page a query may request (default: 10000).
    pub max_page_limit: Option<u64>,
}

/// Result cache used by `execute(.., use_cache = true)`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Entry lifetime in seconds (default: 300).
    pub ttl_secs: u64,
    /// Maximum cached results (default: 1000).
    pub max_entries: usize,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    pub duckdb: DuckDbConfig,
}

/// DuckDB-specific configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DuckDbConfig {
    /// Maximum concurrent statements. `None` uses the CPU count.
    pub max_concurrency: Option<usize>,
}

/// Schema validation configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Log non-fatal schema findings instead of rejecting (default: false).
    pub warn_only: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dialect: "h2".to_string(),
            default_page_limit: None,
            max_page_limit: Some(10_000),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 300,
            max_entries: 1000,
        }
    }
}

impl QueryLensConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| QueryLensError::Config(format!("failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| QueryLensError::Config(format!("failed to parse config: {e}")))
    }

    /// Load from default locations.
    ///
    /// Search order:
    /// 1. `QUERYLENS_CONFIG` environment variable
    /// 2. `./querylens.toml`
    /// 3. `<config dir>/querylens/config.toml`
    /// 4. Built-in defaults
    pub fn load_default() -> Self {
        if let Ok(path) = std::env::var("QUERYLENS_CONFIG") {
            match Self::from_file(&path) {
                Ok(cfg) => {
                    tracing::info!(path = %path, "loaded config from QUERYLENS_CONFIG");
                    return cfg;
                }
                Err(e) => tracing::warn!(path = %path, error = %e, "ignoring QUERYLENS_CONFIG"),
            }
        }

        if let Ok(cfg) = Self::from_file("querylens.toml") {
            tracing::info!("loaded config from ./querylens.toml");
            return cfg;
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("querylens").join("config.toml");
            if let Ok(cfg) = Self::from_file(&user_config) {
                tracing::info!(path = %user_config.display(), "loaded config from user config dir");
                return cfg;
            }
        }

        tracing::debug!("no config file found, using defaults");
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = QueryLensConfig::default();
        assert_eq!(cfg.engine.dialect, "h2");
        assert_eq!(cfg.engine.max_page_limit, Some(10_000));
        assert!(cfg.cache.enabled);
        assert_eq!(cfg.cache.ttl_secs, 300);
        assert!(!cfg.validation.warn_only);
        assert_eq!(cfg.backend.duckdb.max_concurrency, None);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[engine]
dialect = "hive"
default_page_limit = 100

[cache]
enabled = false

[backend.duckdb]
max_concurrency = 4
"#;
        let cfg = QueryLensConfig::from_toml(toml).unwrap();
        assert_eq!(cfg.engine.dialect, "hive");
        assert_eq!(cfg.engine.default_page_limit, Some(100));
        assert_eq!(cfg.engine.max_page_limit, Some(10_000));
        assert!(!cfg.cache.enabled);
        assert_eq!(cfg.cache.max_entries, 1000);
        assert_eq!(cfg.backend.duckdb.max_concurrency, Some(4));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = QueryLensConfig::from_toml("[engine]\ndialect = 3").unwrap_err();
        assert!(matches!(err, QueryLensError::Config(_)));
    }
}
