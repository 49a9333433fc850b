//! Databases
//!
//! A database is a directory holding `database.json` and one subdirectory
//! per resource under `resources/`. Each document model has its own
//! factory; `DocumentType::factory` selects it.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;

use crate::observability::{log_event_with_fields, Event};
use crate::page::User;

use super::config::{write_json_atomic, DatabaseConfig, ResourceConfig, DATABASE_CONFIG_FILE, RESOURCE_CONFIG_FILE};
use super::document_type::DocumentType;
use super::errors::{ResourceError, ResourceResult};
use super::resource::Resource;

/// Directory below the database root that holds the resources
pub const RESOURCES_DIR: &str = "resources";

/// Creates and opens databases of one document model.
pub trait DatabaseFactory: Send + Sync {
    fn document_type(&self) -> DocumentType;

    /// Creates a new database in `dir`, which must not already hold one.
    fn create_database(
        &self,
        dir: &Path,
        config: DatabaseConfig,
        user: Option<User>,
    ) -> ResourceResult<Database> {
        if config.document_type != self.document_type() {
            return Err(ResourceError::Config(format!(
                "{} factory cannot create a {} database",
                self.document_type(),
                config.document_type
            )));
        }
        Database::create(dir, config, user)
    }

    /// Opens an existing database of this model.
    fn open_database(&self, dir: &Path) -> ResourceResult<Database> {
        let database = Database::open(dir)?;
        if database.document_type() != self.document_type() {
            return Err(ResourceError::Config(format!(
                "{} holds a {} database",
                dir.display(),
                database.document_type()
            )));
        }
        Ok(database)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct XmlDatabaseFactory;

impl DatabaseFactory for XmlDatabaseFactory {
    fn document_type(&self) -> DocumentType {
        DocumentType::Xml
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDatabaseFactory;

impl DatabaseFactory for JsonDatabaseFactory {
    fn document_type(&self) -> DocumentType {
        DocumentType::Json
    }
}

/// Handle to an open database.
///
/// Resources opened through the same handle share one page store, so the
/// single-writer rule holds across every `Arc<Resource>` it hands out.
pub struct Database {
    dir: PathBuf,
    config: DatabaseConfig,
    user: Option<User>,
    resources: Mutex<HashMap<String, Arc<Resource>>>,
}

impl Database {
    fn create(dir: &Path, mut config: DatabaseConfig, user: Option<User>) -> ResourceResult<Self> {
        config.validate()?;
        let config_path = dir.join(DATABASE_CONFIG_FILE);
        if config_path.exists() {
            return Err(ResourceError::AlreadyExists(dir.to_path_buf()));
        }

        fs::create_dir_all(dir.join(RESOURCES_DIR))
            .map_err(|e| ResourceError::io(format!("Failed to create {}", dir.display()), e))?;

        if config.created_at.is_none() {
            config.created_at = Some(Utc::now().to_rfc3339());
        }
        write_json_atomic(&config_path, &config)?;

        let path = dir.display().to_string();
        log_event_with_fields(
            Event::DatabaseCreated,
            &[
                ("document_type", config.document_type.as_str()),
                ("name", config.name.as_str()),
                ("path", path.as_str()),
            ],
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            config,
            user,
            resources: Mutex::new(HashMap::new()),
        })
    }

    /// Opens the database in `dir` whatever its document model.
    pub fn open(dir: &Path) -> ResourceResult<Self> {
        let config_path = dir.join(DATABASE_CONFIG_FILE);
        if !config_path.exists() {
            return Err(ResourceError::DatabaseNotFound(dir.to_path_buf()));
        }
        let config = DatabaseConfig::load(&config_path)?;

        let path = dir.display().to_string();
        log_event_with_fields(
            Event::DatabaseOpened,
            &[
                ("document_type", config.document_type.as_str()),
                ("name", config.name.as_str()),
                ("path", path.as_str()),
            ],
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            config,
            user: None,
            resources: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn document_type(&self) -> DocumentType {
        self.config.document_type
    }

    /// User recorded on commits made through this handle.
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn set_user(&mut self, user: Option<User>) {
        self.user = user;
    }

    fn resource_dir(&self, name: &str) -> PathBuf {
        self.dir.join(RESOURCES_DIR).join(name)
    }

    /// Creates a resource and commits its bootstrap revision.
    pub fn create_resource(&self, config: ResourceConfig) -> ResourceResult<Arc<Resource>> {
        config.validate()?;
        let dir = self.resource_dir(&config.name);
        if dir.join(RESOURCE_CONFIG_FILE).exists() {
            return Err(ResourceError::AlreadyExists(dir));
        }
        fs::create_dir_all(&dir)
            .map_err(|e| ResourceError::io(format!("Failed to create {}", dir.display()), e))?;
        write_json_atomic(&dir.join(RESOURCE_CONFIG_FILE), &config)?;

        let database = self.config.name.as_str();
        log_event_with_fields(
            Event::ResourceCreated,
            &[("database", database), ("resource", config.name.as_str())],
        );

        let name = config.name.clone();
        let resource = Arc::new(Resource::open(
            &dir,
            config,
            self.document_type(),
            self.user.clone(),
        )?);
        self.resources.lock().insert(name, Arc::clone(&resource));
        Ok(resource)
    }

    /// Opens a resource, reusing the handle if it is already open.
    pub fn open_resource(&self, name: &str) -> ResourceResult<Arc<Resource>> {
        let mut resources = self.resources.lock();
        if let Some(resource) = resources.get(name) {
            return Ok(Arc::clone(resource));
        }

        let dir = self.resource_dir(name);
        let config_path = dir.join(RESOURCE_CONFIG_FILE);
        if !config_path.exists() {
            return Err(ResourceError::ResourceNotFound(name.to_string()));
        }
        let config = ResourceConfig::load(&config_path)?;
        let resource = Arc::new(Resource::open(
            &dir,
            config,
            self.document_type(),
            self.user.clone(),
        )?);
        resources.insert(name.to_string(), Arc::clone(&resource));
        Ok(resource)
    }

    pub fn resource_exists(&self, name: &str) -> bool {
        self.resource_dir(name).join(RESOURCE_CONFIG_FILE).exists()
    }

    /// Names of all resources, sorted.
    pub fn resource_names(&self) -> ResourceResult<Vec<String>> {
        let dir = self.dir.join(RESOURCES_DIR);
        let entries = fs::read_dir(&dir)
            .map_err(|e| ResourceError::io(format!("Failed to list {}", dir.display()), e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| ResourceError::io(format!("Failed to list {}", dir.display()), e))?;
            if entry.path().join(RESOURCE_CONFIG_FILE).exists() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_and_reopen() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("library");

        let db = DocumentType::Xml
            .create_database(&dir, DatabaseConfig::new("library", DocumentType::Xml), None)
            .unwrap();
        assert!(db.config().created_at.is_some());
        let id = db.config().id;
        drop(db);

        let db = XmlDatabaseFactory.open_database(&dir).unwrap();
        assert_eq!(db.name(), "library");
        assert_eq!(db.config().id, id);
        assert!(JsonDatabaseFactory.open_database(&dir).is_err());
    }

    #[test]
    fn test_create_twice_fails() {
        let temp = TempDir::new().unwrap();
        let config = DatabaseConfig::new("db", DocumentType::Json);
        JsonDatabaseFactory
            .create_database(temp.path(), config.clone(), None)
            .unwrap();
        assert!(matches!(
            JsonDatabaseFactory.create_database(temp.path(), config, None),
            Err(ResourceError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_factory_rejects_other_model() {
        let temp = TempDir::new().unwrap();
        let config = DatabaseConfig::new("db", DocumentType::Json);
        assert!(matches!(
            XmlDatabaseFactory.create_database(temp.path(), config, None),
            Err(ResourceError::Config(_))
        ));
    }

    #[test]
    fn test_open_missing_database() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            Database::open(temp.path()),
            Err(ResourceError::DatabaseNotFound(_))
        ));
    }

    #[test]
    fn test_resources_are_listed_and_shared() {
        let temp = TempDir::new().unwrap();
        let db = DocumentType::Json
            .create_database(temp.path(), DatabaseConfig::new("db", DocumentType::Json), None)
            .unwrap();

        db.create_resource(ResourceConfig::new("b")).unwrap();
        let a = db.create_resource(ResourceConfig::new("a")).unwrap();
        assert_eq!(db.resource_names().unwrap(), vec!["a", "b"]);
        assert!(db.resource_exists("a"));

        let again = db.open_resource("a").unwrap();
        assert!(Arc::ptr_eq(&a, &again));
        assert!(matches!(
            db.open_resource("missing"),
            Err(ResourceError::ResourceNotFound(_))
        ));
        assert!(matches!(
            db.create_resource(ResourceConfig::new("a")),
            Err(ResourceError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_reopened_resource_keeps_revisions() {
        let temp = TempDir::new().unwrap();
        {
            let db = DocumentType::Xml
                .create_database(temp.path(), DatabaseConfig::new("db", DocumentType::Xml), None)
                .unwrap();
            let resource = db.create_resource(ResourceConfig::new("doc")).unwrap();
            let trx = resource.begin_page_write().unwrap();
            trx.commit(None).unwrap();
        }

        let db = Database::open(temp.path()).unwrap();
        let resource = db.open_resource("doc").unwrap();
        assert_eq!(resource.latest_revision().unwrap(), Some(1));
    }
}
