//! CLI command implementations
//!
//! Each command opens what it needs, does one thing and returns the JSON
//! document that `run_command` writes to stdout.

use std::path::Path;

use serde_json::{json, Value};

use crate::resource::{Database, DatabaseConfig, DocumentType, ResourceConfig};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// Main CLI entry point
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    let data = match cmd {
        Command::Init {
            path,
            name,
            document_type,
        } => init(&path, name, &document_type)?,
        Command::CreateResource {
            path,
            name,
            no_dewey_ids,
        } => create_resource(&path, &name, !no_dewey_ids)?,
        Command::Revisions { path, resource } => revisions(&path, &resource)?,
        Command::Verify { path, resource } => verify(&path, &resource)?,
    };
    write_response(data)
}

/// Creates a database directory.
pub fn init(path: &Path, name: Option<String>, document_type: &str) -> CliResult<Value> {
    let document_type: DocumentType = document_type.parse()?;
    let name = match name {
        Some(name) => name,
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| CliError::config_error("Cannot derive a database name; pass --name"))?,
    };

    let database = document_type.create_database(path, DatabaseConfig::new(name, document_type), None)?;
    Ok(json!({
        "database": database.name(),
        "document_type": database.document_type().as_str(),
        "id": database.config().id.to_string(),
    }))
}

/// Creates a resource; its bootstrap revision is committed on creation.
pub fn create_resource(path: &Path, name: &str, store_dewey_ids: bool) -> CliResult<Value> {
    let database = Database::open(path)?;
    let mut config = ResourceConfig::new(name);
    config.store_dewey_ids = store_dewey_ids;

    let resource = database.create_resource(config)?;
    Ok(json!({
        "resource": resource.name(),
        "revision": resource.latest_revision()?,
        "store_dewey_ids": store_dewey_ids,
    }))
}

/// Lists every committed revision, oldest first.
pub fn revisions(path: &Path, resource: &str) -> CliResult<Value> {
    let database = Database::open(path)?;
    let resource = database.open_resource(resource)?;

    let mut revisions = Vec::new();
    if let Some(latest) = resource.latest_revision()? {
        for revision in 0..=latest {
            let trx = resource.begin_page_read(Some(revision))?;
            revisions.push(json!({
                "revision": trx.revision(),
                "committed_at": trx.commit_time().map(|t| t.to_rfc3339()),
                "message": trx.commit_message(),
                "user": trx.user().map(|u| u.name.clone()),
                "max_node_key": trx.max_node_key(),
            }));
        }
    }

    Ok(json!({
        "resource": resource.name(),
        "revisions": revisions,
    }))
}

/// Reads every page reachable from the published root.
pub fn verify(path: &Path, resource: &str) -> CliResult<Value> {
    let database = Database::open(path)?;
    let resource = database.open_resource(resource)?;
    let report = resource.verify()?;
    Ok(serde_json::to_value(report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::CliErrorCode;
    use tempfile::TempDir;

    #[test]
    fn test_init_then_create_resource() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("library");

        let data = init(&path, None, "json").unwrap();
        assert_eq!(data["database"], "library");
        assert_eq!(data["document_type"], "json");

        let data = create_resource(&path, "books", true).unwrap();
        assert_eq!(data["revision"], 0);

        let err = create_resource(&path, "books", true).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::AlreadyExists);
    }

    #[test]
    fn test_init_rejects_unknown_type() {
        let temp = TempDir::new().unwrap();
        let err = init(temp.path(), Some("db".into()), "yaml").unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
    }

    #[test]
    fn test_revisions_and_verify() {
        let temp = TempDir::new().unwrap();
        init(temp.path(), Some("db".into()), "xml").unwrap();
        create_resource(temp.path(), "doc", true).unwrap();

        let data = revisions(temp.path(), "doc").unwrap();
        let list = data["revisions"].as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["revision"], 0);
        assert_eq!(list[0]["max_node_key"], 0);

        let report = verify(temp.path(), "doc").unwrap();
        assert_eq!(report["latest_revision"], 0);

        let err = verify(temp.path(), "missing").unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::NotFound);
    }
}
