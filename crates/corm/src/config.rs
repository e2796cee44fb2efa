//! Builder factory configuration.
//!
//! ```toml
//! dialect = "postgres"
//! schema_cache_capacity = 1024
//! max_sql_len = 1048576
//!
//! [pool]
//! max_retained_bytes = 65536
//! buffers_per_class = 32
//! ```

use crate::error::{OrmError, OrmResult};
use crate::pool::{DEFAULT_BUFFERS_PER_CLASS, DEFAULT_MAX_RETAINED_BYTES};
use crate::schema::DEFAULT_SCHEMA_CACHE_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for [`Qb::from_config`](crate::qb::Qb::from_config).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CormConfig {
    /// Dialect or driver name (`postgres`, `mysql`, `sqlite`, ...).
    pub dialect: String,
    /// Distinct model types kept before the schema cache is emptied.
    pub schema_cache_capacity: usize,
    /// Scratch buffer pool.
    pub pool: ScratchPoolConfig,
    /// Reject compiled statements longer than this many bytes.
    pub max_sql_len: Option<usize>,
}

/// Scratch buffer pool configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScratchPoolConfig {
    /// Buffers with a larger capacity are dropped instead of pooled.
    pub max_retained_bytes: usize,
    /// Idle buffers kept per size class.
    pub buffers_per_class: usize,
}

impl Default for ScratchPoolConfig {
    fn default() -> Self {
        Self {
            max_retained_bytes: DEFAULT_MAX_RETAINED_BYTES,
            buffers_per_class: DEFAULT_BUFFERS_PER_CLASS,
        }
    }
}

impl Default for CormConfig {
    fn default() -> Self {
        Self {
            dialect: "postgres".to_string(),
            schema_cache_capacity: DEFAULT_SCHEMA_CACHE_CAPACITY,
            pool: ScratchPoolConfig::default(),
            max_sql_len: None,
        }
    }
}

impl CormConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML text.
    pub fn from_toml_str(raw: &str) -> OrmResult<Self> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| OrmError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> OrmResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            OrmError::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Set the dialect name.
    pub fn dialect(mut self, name: impl Into<String>) -> Self {
        self.dialect = name.into();
        self
    }

    pub fn schema_cache_capacity(mut self, capacity: usize) -> Self {
        self.schema_cache_capacity = capacity;
        self
    }

    pub fn pool_max_retained_bytes(mut self, bytes: usize) -> Self {
        self.pool.max_retained_bytes = bytes;
        self
    }

    pub fn pool_buffers_per_class(mut self, n: usize) -> Self {
        self.pool.buffers_per_class = n;
        self
    }

    pub fn max_sql_len(mut self, max: usize) -> Self {
        self.max_sql_len = Some(max);
        self
    }

    /// Check the values without building anything.
    pub fn validate(&self) -> OrmResult<()> {
        if crate::dialect::from_name(&self.dialect).is_none() {
            return Err(OrmError::Config(format!(
                "unknown dialect: {:?}",
                self.dialect
            )));
        }
        if self.schema_cache_capacity == 0 {
            return Err(OrmError::Config(
                "schema_cache_capacity must be at least 1".to_string(),
            ));
        }
        if self.max_sql_len == Some(0) {
            return Err(OrmError::Config("max_sql_len must be positive".to_string()));
        }
        Ok(())
    }
}
