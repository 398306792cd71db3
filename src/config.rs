//! `sqlporter.toml` configuration.
//!
//! ```toml
//! [convert]
//! from = "mysql"
//! to = "postgres"
//! ordered = true
//!
//! [batch]
//! workers = 8
//! timeout_secs = 30
//! buffer_size = 65536
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::batch::BatchConfig;
use crate::error::{PortError, Result};
use crate::pool::BufferPool;
use crate::transpiler::Dialect;

pub const FILE_NAME: &str = "sqlporter.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub convert: ConvertSection,
    pub batch: BatchSection,
}

/// Defaults for `sqlporter convert`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConvertSection {
    pub from: Option<Dialect>,
    pub to: Option<Dialect>,
    /// Overrides the source dialect's delimiter.
    pub delimiter: Option<String>,
    pub ordered: bool,
    /// Parse with this many threads.
    pub parallel: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchSection {
    pub workers: Option<usize>,
    pub batch_size: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub max_in_flight: Option<usize>,
    /// Enables the buffer pool.
    pub buffer_size: Option<usize>,
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| PortError::Config(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml(&text)?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Load the first config file found in the working directory or the
    /// user config directory. Defaults when there is none.
    pub fn discover() -> Result<Self> {
        match Self::search_paths().into_iter().find(|p| p.is_file()) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(FILE_NAME)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("sqlporter").join("config.toml"));
        }
        paths
    }

    fn validate(&self) -> Result<()> {
        if let Some(delimiter) = &self.convert.delimiter
            && delimiter.trim().is_empty()
        {
            return Err(PortError::Config("convert.delimiter must not be blank".into()));
        }
        if self.convert.parallel == Some(0) || self.batch.workers == Some(0) {
            return Err(PortError::Config("worker counts must be at least 1".into()));
        }
        if self.batch.buffer_size == Some(0) {
            return Err(PortError::Config("batch.buffer_size must be at least 1".into()));
        }
        Ok(())
    }

    /// The `[batch]` table as a [`BatchConfig`].
    pub fn batch_config(&self) -> BatchConfig {
        let b = &self.batch;
        let mut config = BatchConfig::default();
        if let Some(workers) = b.workers {
            config = config.with_workers(workers);
        }
        if let Some(size) = b.batch_size {
            config = config.with_batch_size(size);
        }
        if let Some(secs) = b.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(limit) = b.max_in_flight {
            config = config.with_max_in_flight(limit);
        }
        if let Some(size) = b.buffer_size {
            config = config.with_buffer_pool(Arc::new(BufferPool::new(size)));
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_full_file() {
        let config = Config::from_toml(
            r#"
            [convert]
            from = "MySQL"
            to = "pg"
            ordered = true
            parallel = 4

            [batch]
            workers = 3
            timeout_secs = 5
            buffer_size = 1024
            "#,
        )
        .unwrap();
        assert_eq!(config.convert.from, Some(Dialect::MySql));
        assert_eq!(config.convert.to, Some(Dialect::Postgres));
        assert!(config.convert.ordered);
        assert_eq!(config.convert.parallel, Some(4));

        let batch = config.batch_config();
        assert_eq!(batch.workers, 3);
        assert_eq!(batch.timeout, Duration::from_secs(5));
        assert_eq!(batch.mem_optimizer.map(|p| p.buffer_size()), Some(1024));
    }

    #[test]
    fn test_empty_file_is_default() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.batch_config().mem_optimizer.is_none());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            Config::from_toml("[convert]\nfrom = \"oracle\""),
            Err(PortError::Toml(_))
        ));
        assert!(matches!(
            Config::from_toml("[batch]\nworkers = 0"),
            Err(PortError::Config(_))
        ));
        assert!(matches!(
            Config::from_toml("[convert]\ndelimiter = \"  \""),
            Err(PortError::Config(_))
        ));
        assert!(Config::from_toml("[batch]\nthreads = 2").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[convert]\nto = \"sqlite\"\ndelimiter = \"$$\"").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.convert.to, Some(Dialect::Sqlite));
        assert_eq!(config.convert.delimiter.as_deref(), Some("$$"));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, PortError::Config(msg) if msg.contains("nope.toml")));
    }
}
