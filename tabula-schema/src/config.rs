//! Configuration file parsing for `tabula.toml`.

use serde::{Deserialize, Serialize};
use std::path::Path;

use tabula_relation::DEFAULT_CHUNK_SIZE;

use crate::error::{SchemaError, SchemaResult};
use crate::flags::EntryFlags;
use crate::reentry::DEFAULT_GRAPH_CAPACITY;

/// Main configuration structure for `tabula.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TabulaConfig {
    /// Relation pool and graph sizing.
    #[serde(default)]
    pub relation: RelationConfig,

    /// Migration settings.
    #[serde(default)]
    pub migration: MigrationConfig,

    /// Debug/logging settings.
    #[serde(default)]
    pub debug: DebugConfig,
}

impl TabulaConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> SchemaResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SchemaError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> SchemaResult<Self> {
        let expanded = expand_env_vars(content)?;
        let config: Self =
            toml::from_str(&expanded).map_err(|e| SchemaError::TomlError { source: e })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot check on its own.
    pub fn validate(&self) -> SchemaResult<()> {
        if self.relation.chunk_size == 0 {
            return Err(SchemaError::config("relation.chunk_size must be at least 1"));
        }
        self.migration.clear_mask()?;
        self.migration.set_mask()?;
        Ok(())
    }
}

/// Relation pool and graph sizing.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelationConfig {
    /// Nodes allocated per pool chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Initial head capacity of each rename graph.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for RelationConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            capacity: default_capacity(),
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_capacity() -> usize {
    DEFAULT_GRAPH_CAPACITY
}

/// Migration settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationConfig {
    /// First version handed out to a delta.
    #[serde(default = "default_initial_version")]
    pub initial_version: u64,

    /// Fail [`apply`](crate::session::MigrationSession::apply) when foreign
    /// keys cannot be traced.
    #[serde(default)]
    pub strict_foreign: bool,

    /// Flag names cleared on every table at commit.
    #[serde(default)]
    pub clear_flags: Vec<String>,

    /// Flag names set on every table at commit.
    #[serde(default)]
    pub set_flags: Vec<String>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            initial_version: default_initial_version(),
            strict_foreign: false,
            clear_flags: Vec::new(),
            set_flags: Vec::new(),
        }
    }
}

fn default_initial_version() -> u64 {
    1
}

impl MigrationConfig {
    /// Mask built from [`clear_flags`](Self::clear_flags).
    pub fn clear_mask(&self) -> SchemaResult<EntryFlags> {
        flag_mask(&self.clear_flags)
    }

    /// Mask built from [`set_flags`](Self::set_flags).
    pub fn set_mask(&self) -> SchemaResult<EntryFlags> {
        flag_mask(&self.set_flags)
    }
}

fn flag_mask(names: &[String]) -> SchemaResult<EntryFlags> {
    names.iter().try_fold(EntryFlags::EMPTY, |mask, name| {
        EntryFlags::from_name(name)
            .map(|flag| mask | flag)
            .ok_or_else(|| SchemaError::config(format!("unknown flag `{name}`")))
    })
}

/// Debug/logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DebugConfig {
    /// Log level override (`trace`, `debug`, `info`, `warn`, `error`).
    pub log_level: Option<String>,

    /// Log format override (`json`, `pretty`, `compact`).
    pub log_format: Option<String>,
}

/// Expand `${VAR}` references. Unset variables are left as written.
fn expand_env_vars(content: &str) -> SchemaResult<String> {
    let mut result = content.to_string();
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| SchemaError::config(e.to_string()))?;

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        let full_match = &cap[0];

        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(full_match, &value);
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_default_config() {
        let config = TabulaConfig::default();
        assert_eq!(config.relation.chunk_size, 64);
        assert_eq!(config.relation.capacity, 16);
        assert_eq!(config.migration.initial_version, 1);
        assert!(!config.migration.strict_foreign);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
            [relation]
            chunk_size = 128

            [migration]
            strict_foreign = true
            clear_flags = ["foreign", "checking"]
            set_flags = ["pointer"]
        "#;

        let config = TabulaConfig::from_str(toml).unwrap();
        assert_eq!(config.relation.chunk_size, 128);
        assert_eq!(config.relation.capacity, 16);
        assert!(config.migration.strict_foreign);
        assert_eq!(
            config.migration.clear_mask().unwrap(),
            EntryFlags::FOREIGN | EntryFlags::CHECKING
        );
        assert_eq!(config.migration.set_mask().unwrap(), EntryFlags::POINTER);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = TabulaConfig::from_str("[relation]\nchunks = 4\n").unwrap_err();
        assert!(matches!(err, SchemaError::TomlError { .. }));
    }

    #[test]
    fn test_unknown_flag_rejected() {
        let err = TabulaConfig::from_str("[migration]\nset_flags = [\"shiny\"]\n").unwrap_err();
        assert_eq!(err.code(), ErrorCode::Config);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let err = TabulaConfig::from_str("[relation]\nchunk_size = 0\n").unwrap_err();
        assert!(matches!(err, SchemaError::ConfigError { .. }));
    }

    #[test]
    fn test_env_var_expansion() {
        // SAFETY: This test runs single-threaded and we clean up after
        unsafe {
            std::env::set_var("TABULA_TEST_LEVEL", "trace");
        }
        let expanded = expand_env_vars("log_level = \"${TABULA_TEST_LEVEL}\"").unwrap();
        assert_eq!(expanded, "log_level = \"trace\"");
        let untouched = expand_env_vars("log_level = \"${TABULA_TEST_UNSET}\"").unwrap();
        assert_eq!(untouched, "log_level = \"${TABULA_TEST_UNSET}\"");
        unsafe {
            std::env::remove_var("TABULA_TEST_LEVEL");
        }
    }
}
