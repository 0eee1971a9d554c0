use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use glob::glob;

use crate::error::{QueryLensError, Result};
use crate::models::Table;

/// Table definitions keyed by logical name. Read-only once handed to an engine.
#[derive(Debug, Default, Clone)]
pub struct SchemaRegistry {
    pub tables: BTreeMap<String, Table>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tables(tables: Vec<Table>) -> Self {
        let mut registry = SchemaRegistry::new();
        for table in tables {
            registry.tables.insert(table.name.clone(), table);
        }
        registry
    }

    /// Load every `*.yml` / `*.yaml` file in `root`, one table per file.
    pub fn load_from_dir<P: AsRef<Path>>(root: P) -> Result<Self> {
        let dir = root.as_ref();
        if !dir.exists() {
            return Err(QueryLensError::Schema(format!(
                "schema directory not found: {}",
                dir.display()
            )));
        }
        let mut registry = SchemaRegistry::new();
        for pattern in ["yml", "yaml"] {
            for entry in glob(&format!("{}/*.{pattern}", dir.display()))
                .map_err(|e| QueryLensError::Other(e.into()))?
                .flatten()
            {
                registry.load_table_file(&entry)?;
            }
        }
        tracing::info!(
            dir = %dir.display(),
            tables = registry.tables.len(),
            "loaded schema"
        );
        Ok(registry)
    }

    fn load_table_file(&mut self, path: &Path) -> Result<()> {
        let contents = fs::read_to_string(path)?;
        let table: Table = serde_yaml::from_str(&contents)?;
        if self.tables.contains_key(&table.name) {
            return Err(QueryLensError::Schema(format!(
                "table '{}' is defined twice (again in {})",
                table.name,
                path.display()
            )));
        }
        self.tables.insert(table.name.clone(), table);
        Ok(())
    }

    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }
}
