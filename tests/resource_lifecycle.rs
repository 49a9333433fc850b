//! Database and Resource Lifecycle Tests
//!
//! - Databases and resources survive reopen
//! - Each resource starts at revision 0 holding only the document root
//! - Handles from one database share the single writer

use revtree::node::{NewNode, DOCUMENT_ROOT_KEY};
use revtree::page::{PageErrorCode, User};
use revtree::resource::{
    Database, DatabaseConfig, DatabaseFactory, DocumentType, ResourceConfig, ResourceError,
};
use tempfile::TempDir;

#[test]
fn test_documents_survive_reopen() {
    let temp = TempDir::new().unwrap();
    let (book, title) = {
        let db = DocumentType::Xml
            .create_database(
                temp.path(),
                DatabaseConfig::new("library", DocumentType::Xml),
                Some(User::new("librarian")),
            )
            .unwrap();
        let resource = db.create_resource(ResourceConfig::new("catalog")).unwrap();

        let mut wtx = resource.begin_node_write().unwrap();
        let book = wtx
            .insert_first_child(DOCUMENT_ROOT_KEY, NewNode::element("book"))
            .unwrap();
        let title = wtx.insert_first_child(book, NewNode::element("title")).unwrap();
        wtx.insert_first_child(title, NewNode::text("Dune")).unwrap();
        wtx.insert_attribute(book, "isbn", b"0441013597").unwrap();
        assert_eq!(wtx.commit(Some("first book".into())).unwrap(), 1);
        (book, title)
    };

    let db = DocumentType::Xml.factory().open_database(temp.path()).unwrap();
    let resource = db.open_resource("catalog").unwrap();
    assert_eq!(resource.latest_revision().unwrap(), Some(1));

    let rtx = resource.begin_node_read(None).unwrap();
    assert_eq!(rtx.page_trx().commit_message(), Some("first book"));
    assert_eq!(
        rtx.page_trx().user().map(|u| u.name.as_str()),
        Some("librarian")
    );
    assert_eq!(rtx.children(DOCUMENT_ROOT_KEY).unwrap(), vec![book]);
    assert_eq!(rtx.node(title).unwrap().name.as_deref(), Some("title"));

    let bootstrap = resource.begin_node_read(Some(0)).unwrap();
    assert!(bootstrap.children(DOCUMENT_ROOT_KEY).unwrap().is_empty());
    assert_eq!(bootstrap.max_node_key(), Some(DOCUMENT_ROOT_KEY));

    let report = resource.verify().unwrap();
    assert_eq!(report.latest_revision, Some(1));
    assert_eq!(report.revisions, 2);
    assert!(report.pages > 0);
}

#[test]
fn test_handles_share_one_writer() {
    let temp = TempDir::new().unwrap();
    let db = DocumentType::Json
        .create_database(temp.path(), DatabaseConfig::new("db", DocumentType::Json), None)
        .unwrap();
    db.create_resource(ResourceConfig::new("doc")).unwrap();

    let first = db.open_resource("doc").unwrap();
    let second = db.open_resource("doc").unwrap();

    let wtx = first.begin_node_write().unwrap();
    match second.begin_node_write() {
        Err(ResourceError::Page(e)) => assert_eq!(e.code(), PageErrorCode::RevWriterBusy),
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("second writer must be rejected"),
    }
    wtx.abort();
    assert!(second.begin_node_write().is_ok());
}

#[test]
fn test_resource_without_labels() {
    let temp = TempDir::new().unwrap();
    let db = DocumentType::Xml
        .create_database(temp.path(), DatabaseConfig::new("db", DocumentType::Xml), None)
        .unwrap();
    let resource = db
        .create_resource(ResourceConfig::new("plain").without_dewey_ids())
        .unwrap();

    let mut wtx = resource.begin_node_write().unwrap();
    let top = wtx
        .insert_first_child(DOCUMENT_ROOT_KEY, NewNode::element("top"))
        .unwrap();
    let child = wtx.insert_first_child(top, NewNode::element("child")).unwrap();
    let other = wtx.insert_right_sibling(child, NewNode::element("other")).unwrap();
    assert_eq!(wtx.move_subtree_to_first_child(other, top).unwrap(), 0);
    wtx.commit(None).unwrap();

    let rtx = resource.begin_node_read(None).unwrap();
    assert_eq!(rtx.children(top).unwrap(), vec![other, child]);
    assert!(rtx.dewey_id(child).unwrap().is_none());

    // Settings persist with the resource.
    drop(resource);
    let reopened = Database::open(temp.path()).unwrap();
    assert!(!reopened.open_resource("plain").unwrap().config().store_dewey_ids);
}

#[test]
fn test_invalid_resource_config_is_rejected() {
    let temp = TempDir::new().unwrap();
    let db = DocumentType::Xml
        .create_database(temp.path(), DatabaseConfig::new("db", DocumentType::Xml), None)
        .unwrap();

    let mut config = ResourceConfig::new("doc");
    config.cache_max_entries = 0;
    assert!(matches!(
        db.create_resource(config),
        Err(ResourceError::Config(_))
    ));
    assert!(!db.resource_exists("doc"));
}
