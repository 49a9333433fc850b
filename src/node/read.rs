//! Node read transaction
//!
//! Reads the nodes of one committed revision.

use crate::dewey::DeweyId;
use crate::page::IndexType;
use crate::trx::PageReadTrx;

use super::errors::{NodeError, NodeResult};
use super::record::{StructNode, DOCUMENT_ROOT_KEY};

pub struct NodeReadTrx {
    page_trx: PageReadTrx,
}

impl NodeReadTrx {
    pub fn new(page_trx: PageReadTrx) -> Self {
        Self { page_trx }
    }

    pub fn page_trx(&self) -> &PageReadTrx {
        &self.page_trx
    }

    pub fn revision(&self) -> u32 {
        self.page_trx.revision()
    }

    pub fn max_node_key(&self) -> Option<u64> {
        self.page_trx.max_node_key()
    }

    pub fn node(&self, key: u64) -> NodeResult<StructNode> {
        let record = self
            .page_trx
            .get(key, IndexType::Document, 0)?
            .ok_or(NodeError::NotFound(key))?;
        StructNode::from_record(key, record)
    }

    pub fn document_root(&self) -> NodeResult<StructNode> {
        self.node(DOCUMENT_ROOT_KEY)
    }

    pub fn dewey_id(&self, key: u64) -> NodeResult<Option<DeweyId>> {
        Ok(self.node(key)?.dewey_id)
    }

    /// Structural children of `key`, left to right.
    pub fn children(&self, key: u64) -> NodeResult<Vec<u64>> {
        let mut children = Vec::new();
        let mut next = self.node(key)?.first_child;
        while let Some(child) = next {
            children.push(child);
            next = self.node(child)?.right_sibling;
        }
        Ok(children)
    }

    /// Keys of the subtree of `key` in document order: each node, then its
    /// namespaces, then its attributes, then its children.
    pub fn document_order(&self, key: u64) -> NodeResult<Vec<u64>> {
        let mut order = Vec::new();
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            let node = self.node(current)?;
            order.push(current);
            order.extend(&node.namespaces);
            order.extend(&node.attributes);

            let children = self.children(current)?;
            stack.extend(children.into_iter().rev());
        }
        Ok(order)
    }
}
