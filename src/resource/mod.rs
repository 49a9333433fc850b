//! Databases and resources
//!
//! ```text
//! <database>/
//!   database.json
//!   resources/
//!     <name>/
//!       resource.json
//!       pages.dat
//!       root.json
//! ```

mod config;
mod database;
mod document_type;
mod errors;
#[allow(clippy::module_inception)]
mod resource;

pub use config::{
    DatabaseConfig, ResourceConfig, DATABASE_CONFIG_FILE, MIN_INLINE_RECORD_LIMIT, RESOURCE_CONFIG_FILE,
};
pub use database::{Database, DatabaseFactory, JsonDatabaseFactory, XmlDatabaseFactory, RESOURCES_DIR};
pub use document_type::DocumentType;
pub use errors::{ResourceError, ResourceResult};
pub use resource::Resource;
