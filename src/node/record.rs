//! Structural node records
//!
//! A node is stored as one record of the document tree under its node key.
//! The label travels in the record header; the body holds the node kind and
//! its structural pointers.

use std::fmt;

use crate::dewey::DeweyId;
use crate::page::{DataRecord, PageDecoder, PageEncoder, PageError, PageResult};

use super::errors::{NodeError, NodeResult};

/// Key of the synthetic document root of every resource
pub const DOCUMENT_ROOT_KEY: u64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Attribute,
    Namespace,
    Text,
    Object,
    Array,
    ObjectKey,
    Value,
}

impl NodeKind {
    pub fn as_u8(self) -> u8 {
        match self {
            NodeKind::Document => 0,
            NodeKind::Element => 1,
            NodeKind::Attribute => 2,
            NodeKind::Namespace => 3,
            NodeKind::Text => 4,
            NodeKind::Object => 5,
            NodeKind::Array => 6,
            NodeKind::ObjectKey => 7,
            NodeKind::Value => 8,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => NodeKind::Document,
            1 => NodeKind::Element,
            2 => NodeKind::Attribute,
            3 => NodeKind::Namespace,
            4 => NodeKind::Text,
            5 => NodeKind::Object,
            6 => NodeKind::Array,
            7 => NodeKind::ObjectKey,
            8 => NodeKind::Value,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Document => "document",
            NodeKind::Element => "element",
            NodeKind::Attribute => "attribute",
            NodeKind::Namespace => "namespace",
            NodeKind::Text => "text",
            NodeKind::Object => "object",
            NodeKind::Array => "array",
            NodeKind::ObjectKey => "object_key",
            NodeKind::Value => "value",
        }
    }

    /// Takes part in the first-child/sibling structure.
    pub fn is_structural(self) -> bool {
        !matches!(self, NodeKind::Attribute | NodeKind::Namespace)
    }

    pub fn can_have_children(self) -> bool {
        matches!(
            self,
            NodeKind::Document
                | NodeKind::Element
                | NodeKind::Object
                | NodeKind::Array
                | NodeKind::ObjectKey
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content of a node about to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNode {
    pub kind: NodeKind,
    pub name: Option<String>,
    pub value: Vec<u8>,
}

impl NewNode {
    pub fn element(name: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Element,
            name: Some(name.into()),
            value: Vec::new(),
        }
    }

    pub fn text(value: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: NodeKind::Text,
            name: None,
            value: value.into(),
        }
    }

    pub fn object() -> Self {
        Self {
            kind: NodeKind::Object,
            name: None,
            value: Vec::new(),
        }
    }

    pub fn array() -> Self {
        Self {
            kind: NodeKind::Array,
            name: None,
            value: Vec::new(),
        }
    }

    pub fn object_key(name: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::ObjectKey,
            name: Some(name.into()),
            value: Vec::new(),
        }
    }

    pub fn value(value: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: NodeKind::Value,
            name: None,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructNode {
    pub key: u64,
    pub kind: NodeKind,
    pub dewey_id: Option<DeweyId>,
    pub parent: Option<u64>,
    pub first_child: Option<u64>,
    /// Not maintained for the root of a single-child document
    pub last_child: Option<u64>,
    pub left_sibling: Option<u64>,
    pub right_sibling: Option<u64>,
    pub child_count: u64,
    pub attributes: Vec<u64>,
    pub namespaces: Vec<u64>,
    pub name: Option<String>,
    pub value: Vec<u8>,
}

impl StructNode {
    pub fn new(key: u64, kind: NodeKind) -> Self {
        Self {
            key,
            kind,
            dewey_id: None,
            parent: None,
            first_child: None,
            last_child: None,
            left_sibling: None,
            right_sibling: None,
            child_count: 0,
            attributes: Vec::new(),
            namespaces: Vec::new(),
            name: None,
            value: Vec::new(),
        }
    }

    pub fn has_first_child(&self) -> bool {
        self.first_child.is_some()
    }

    pub fn has_left_sibling(&self) -> bool {
        self.left_sibling.is_some()
    }

    pub fn has_right_sibling(&self) -> bool {
        self.right_sibling.is_some()
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    pub fn namespace_count(&self) -> usize {
        self.namespaces.len()
    }

    pub fn to_record(&self) -> DataRecord {
        let mut enc = PageEncoder::default();
        enc.put_u8(self.kind.as_u8());
        enc.put_opt_u64(self.parent);
        enc.put_opt_u64(self.first_child);
        enc.put_opt_u64(self.last_child);
        enc.put_opt_u64(self.left_sibling);
        enc.put_opt_u64(self.right_sibling);
        enc.put_varint(self.child_count);
        for keys in [&self.attributes, &self.namespaces] {
            enc.put_varint(keys.len() as u64);
            for key in keys {
                enc.put_varint(*key);
            }
        }
        enc.put_opt_str(self.name.as_deref());
        enc.put_bytes(&self.value);

        DataRecord {
            dewey_id: self.dewey_id.clone(),
            body: enc.finish(),
        }
    }

    pub fn from_record(key: u64, record: DataRecord) -> NodeResult<Self> {
        Self::decode(key, record).map_err(|e| NodeError::CorruptRecord {
            key,
            reason: e.message().to_string(),
        })
    }

    fn decode(key: u64, record: DataRecord) -> PageResult<Self> {
        let mut dec = PageDecoder::new(&record.body);
        let tag = dec.get_u8()?;
        let kind = NodeKind::from_u8(tag)
            .ok_or_else(|| PageError::format(format!("unknown node kind {}", tag)))?;

        let mut node = StructNode::new(key, kind);
        node.dewey_id = record.dewey_id;
        node.parent = dec.get_opt_u64()?;
        node.first_child = dec.get_opt_u64()?;
        node.last_child = dec.get_opt_u64()?;
        node.left_sibling = dec.get_opt_u64()?;
        node.right_sibling = dec.get_opt_u64()?;
        node.child_count = dec.get_varint()?;
        for keys in [&mut node.attributes, &mut node.namespaces] {
            let count = dec.get_len()?;
            for _ in 0..count {
                keys.push(dec.get_varint()?);
            }
        }
        node.name = dec.get_opt_str()?;
        node.value = dec.get_bytes()?;
        dec.finish()?;
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_record_keeps_structure() {
        let mut node = StructNode::new(5, NodeKind::Element);
        node.dewey_id = Some("1.17.3".parse().unwrap());
        node.parent = Some(1);
        node.first_child = Some(9);
        node.last_child = Some(12);
        node.right_sibling = Some(6);
        node.child_count = 2;
        node.attributes = vec![7, 8];
        node.namespaces = vec![10];
        node.name = Some("item".into());

        let decoded = StructNode::from_record(5, node.to_record()).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn test_unknown_kind_is_corrupt() {
        let record = DataRecord::new(vec![42]);
        let err = StructNode::from_record(3, record).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_truncated_body_is_corrupt() {
        let mut record = StructNode::new(1, NodeKind::Text).to_record();
        record.body.truncate(3);
        assert!(matches!(
            StructNode::from_record(1, record),
            Err(NodeError::CorruptRecord { key: 1, .. })
        ));
    }
}
