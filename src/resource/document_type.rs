//! Document model of a database
//!
//! Selects the factory that creates databases of the model and the shape of
//! the synthetic document root:
//!
//! | Model | Top-level children | Root tracks last child |
//! |-------|--------------------|------------------------|
//! | XML   | exactly one        | no                     |
//! | JSON  | any number         | yes                    |

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dewey::DeweyId;
use crate::node::{NodeKind, StructNode, DOCUMENT_ROOT_KEY};
use crate::page::User;

use super::config::DatabaseConfig;
use super::database::{Database, DatabaseFactory, JsonDatabaseFactory, XmlDatabaseFactory};
use super::errors::{ResourceError, ResourceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Xml,
    Json,
}

static XML_FACTORY: XmlDatabaseFactory = XmlDatabaseFactory;
static JSON_FACTORY: JsonDatabaseFactory = JsonDatabaseFactory;

impl DocumentType {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::Xml => "xml",
            DocumentType::Json => "json",
        }
    }

    /// Factory creating databases of this model.
    pub fn factory(self) -> &'static dyn DatabaseFactory {
        match self {
            DocumentType::Xml => &XML_FACTORY,
            DocumentType::Json => &JSON_FACTORY,
        }
    }

    pub fn create_database(
        self,
        dir: &Path,
        config: DatabaseConfig,
        user: Option<User>,
    ) -> ResourceResult<Database> {
        self.factory().create_database(dir, config, user)
    }

    pub fn root_allows_multiple_children(self) -> bool {
        matches!(self, DocumentType::Json)
    }

    pub fn root_tracks_last_child(self) -> bool {
        matches!(self, DocumentType::Json)
    }

    /// Whether nodes of `kind` belong to this model.
    pub fn supports(self, kind: NodeKind) -> bool {
        match kind {
            NodeKind::Document => true,
            NodeKind::Element | NodeKind::Attribute | NodeKind::Namespace | NodeKind::Text => {
                self == DocumentType::Xml
            }
            NodeKind::Object | NodeKind::Array | NodeKind::ObjectKey | NodeKind::Value => {
                self == DocumentType::Json
            }
        }
    }

    /// Synthetic document root, labeled `dewey_id` when labels are stored.
    pub fn document_root(self, dewey_id: Option<DeweyId>) -> StructNode {
        let mut root = StructNode::new(DOCUMENT_ROOT_KEY, NodeKind::Document);
        root.dewey_id = dewey_id;
        root
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xml" => Ok(DocumentType::Xml),
            "json" => Ok(DocumentType::Json),
            other => Err(ResourceError::Config(format!(
                "Unknown document type '{}'. Must be 'xml' or 'json'.",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        assert_eq!("xml".parse::<DocumentType>().unwrap(), DocumentType::Xml);
        assert_eq!("JSON".parse::<DocumentType>().unwrap(), DocumentType::Json);
        assert!("yaml".parse::<DocumentType>().is_err());
        assert_eq!(DocumentType::Json.to_string(), "json");
    }

    #[test]
    fn test_serde_uses_lowercase() {
        assert_eq!(serde_json::to_string(&DocumentType::Xml).unwrap(), "\"xml\"");
        let parsed: DocumentType = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(parsed, DocumentType::Json);
    }

    #[test]
    fn test_root_shape() {
        assert!(!DocumentType::Xml.root_allows_multiple_children());
        assert!(!DocumentType::Xml.root_tracks_last_child());
        assert!(DocumentType::Json.root_allows_multiple_children());
        assert!(DocumentType::Json.root_tracks_last_child());

        let root = DocumentType::Xml.document_root(Some(DeweyId::new_root_id()));
        assert_eq!(root.key, DOCUMENT_ROOT_KEY);
        assert_eq!(root.kind, NodeKind::Document);
        assert!(root.dewey_id.map(|id| id.is_root()).unwrap_or(false));
    }

    #[test]
    fn test_factories_match_type() {
        for document_type in [DocumentType::Xml, DocumentType::Json] {
            assert_eq!(document_type.factory().document_type(), document_type);
        }
    }

    #[test]
    fn test_supported_kinds() {
        assert!(DocumentType::Xml.supports(NodeKind::Attribute));
        assert!(!DocumentType::Xml.supports(NodeKind::Object));
        assert!(DocumentType::Json.supports(NodeKind::Array));
        assert!(!DocumentType::Json.supports(NodeKind::Element));
    }
}
