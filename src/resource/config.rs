//! Database and resource configuration
//!
//! Both live as JSON files next to the data they describe:
//!
//! ```text
//! <database>/database.json
//! <database>/resources/<name>/resource.json
//! ```
//!
//! Missing optional fields take their defaults; every loaded file is
//! validated before use.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::observability::{log_event_with_fields, Event};
use crate::trx::{StoreOptions, DEFAULT_CACHE_ENTRIES, DEFAULT_INLINE_RECORD_LIMIT};

use super::document_type::DocumentType;
use super::errors::{ResourceError, ResourceResult};

pub const DATABASE_CONFIG_FILE: &str = "database.json";
pub const RESOURCE_CONFIG_FILE: &str = "resource.json";

/// Smallest accepted inline record limit in bytes
pub const MIN_INLINE_RECORD_LIMIT: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub name: String,

    pub document_type: DocumentType,

    /// Assigned when the database is created
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    /// RFC3339 creation time
    #[serde(default)]
    pub created_at: Option<String>,
}

impl DatabaseConfig {
    pub fn new(name: impl Into<String>, document_type: DocumentType) -> Self {
        Self {
            name: name.into(),
            document_type,
            id: Uuid::new_v4(),
            created_at: None,
        }
    }

    pub fn load(path: &Path) -> ResourceResult<Self> {
        let config: DatabaseConfig = read_json(path)?;
        config.validate()?;
        log_config_loaded(path);
        Ok(config)
    }

    pub fn validate(&self) -> ResourceResult<()> {
        validate_name("database", &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub name: String,

    /// Whether nodes carry DeweyID labels (default: true)
    #[serde(default = "default_store_dewey_ids")]
    pub store_dewey_ids: bool,

    /// Page cache bound (default: 4096 pages)
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,

    /// Records larger than this are written to overflow pages (default: 2048)
    #[serde(default = "default_inline_record_limit")]
    pub inline_record_limit: usize,
}

fn default_store_dewey_ids() -> bool {
    true
}
fn default_cache_max_entries() -> usize {
    DEFAULT_CACHE_ENTRIES
}
fn default_inline_record_limit() -> usize {
    DEFAULT_INLINE_RECORD_LIMIT
}

impl ResourceConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            store_dewey_ids: default_store_dewey_ids(),
            cache_max_entries: default_cache_max_entries(),
            inline_record_limit: default_inline_record_limit(),
        }
    }

    pub fn without_dewey_ids(mut self) -> Self {
        self.store_dewey_ids = false;
        self
    }

    pub fn load(path: &Path) -> ResourceResult<Self> {
        let config: ResourceConfig = read_json(path)?;
        config.validate()?;
        log_config_loaded(path);
        Ok(config)
    }

    pub fn validate(&self) -> ResourceResult<()> {
        validate_name("resource", &self.name)?;

        if self.cache_max_entries == 0 {
            return Err(ResourceError::Config(
                "cache_max_entries must be > 0".to_string(),
            ));
        }

        if self.inline_record_limit < MIN_INLINE_RECORD_LIMIT {
            return Err(ResourceError::Config(format!(
                "inline_record_limit must be >= {}",
                MIN_INLINE_RECORD_LIMIT
            )));
        }

        Ok(())
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            cache_max_entries: self.cache_max_entries,
            inline_record_limit: self.inline_record_limit,
        }
    }
}

/// Names become directory names.
fn validate_name(what: &str, name: &str) -> ResourceResult<()> {
    if name.is_empty() {
        return Err(ResourceError::Config(format!("{} name must not be empty", what)));
    }
    if name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(ResourceError::Config(format!(
            "Invalid {} name: '{}'",
            what, name
        )));
    }
    Ok(())
}

fn log_config_loaded(path: &Path) {
    let path = path.display().to_string();
    log_event_with_fields(Event::ConfigLoaded, &[("path", path.as_str())]);
}

fn read_json<T: DeserializeOwned>(path: &Path) -> ResourceResult<T> {
    let content = fs::read_to_string(path)
        .map_err(|e| ResourceError::io(format!("Failed to read {}", path.display()), e))?;
    serde_json::from_str(&content).map_err(|e| {
        ResourceError::Config(format!("Invalid JSON in {}: {}", path.display(), e))
    })
}

/// Writes `value` as pretty JSON via temp file, fsync and rename.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> ResourceResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    let temp_path = path.with_extension("json.tmp");

    let mut file = File::create(&temp_path)
        .map_err(|e| ResourceError::io(format!("Failed to create {}", temp_path.display()), e))?;
    file.write_all(json.as_bytes())
        .map_err(|e| ResourceError::io(format!("Failed to write {}", temp_path.display()), e))?;
    file.sync_all()
        .map_err(|e| ResourceError::io(format!("Failed to sync {}", temp_path.display()), e))?;
    drop(file);

    fs::rename(&temp_path, path)
        .map_err(|e| ResourceError::io(format!("Failed to rename to {}", path.display()), e))?;
    Ok(())
}
