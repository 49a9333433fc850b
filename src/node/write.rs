//! Node write transaction
//!
//! Structural edits on top of a page write transaction. Every operation
//! names the nodes it works on by key; there is no cursor. When the resource
//! stores DeweyIDs, inserted nodes are labeled from their neighbours and
//! moved subtrees are relabeled.

use crate::dewey::{manager, DeweyId};
use crate::observability::{log_event_with_fields, Event};
use crate::page::IndexType;
use crate::resource::DocumentType;
use crate::trx::PageWriteTrx;

use super::errors::{NodeError, NodeResult};
use super::record::{NewNode, NodeKind, StructNode, DOCUMENT_ROOT_KEY};
use super::StructuralNodes;

pub struct NodeWriteTrx {
    page_trx: PageWriteTrx,
    document_type: DocumentType,
    stores_dewey_ids: bool,
}

impl NodeWriteTrx {
    pub fn new(page_trx: PageWriteTrx, document_type: DocumentType, stores_dewey_ids: bool) -> Self {
        Self {
            page_trx,
            document_type,
            stores_dewey_ids,
        }
    }

    pub fn page_trx(&self) -> &PageWriteTrx {
        &self.page_trx
    }

    pub fn page_trx_mut(&mut self) -> &mut PageWriteTrx {
        &mut self.page_trx
    }

    pub fn document_type(&self) -> DocumentType {
        self.document_type
    }

    pub fn stores_dewey_ids(&self) -> bool {
        self.stores_dewey_ids
    }

    pub fn revision(&self) -> u32 {
        self.page_trx.revision()
    }

    fn write_node(&mut self, node: &StructNode) -> NodeResult<()> {
        self.page_trx
            .set_record(node.key, IndexType::Document, 0, node.to_record())?;
        Ok(())
    }

    fn create_node(&mut self, content: NewNode, dewey_id: Option<DeweyId>) -> NodeResult<StructNode> {
        let key = self.page_trx.allocate_key(IndexType::Document, 0)?;
        let mut node = StructNode::new(key, content.kind);
        node.name = content.name;
        node.value = content.value;
        node.dewey_id = dewey_id;
        if node.dewey_id.is_some() {
            self.page_trx.store().metrics().add_labels_assigned(1);
        }
        Ok(node)
    }

    fn label(&self, compute: impl FnOnce(&Self) -> NodeResult<DeweyId>) -> NodeResult<Option<DeweyId>> {
        if self.stores_dewey_ids {
            compute(self).map(Some)
        } else {
            Ok(None)
        }
    }

    fn tracks_last_child(&self, parent: &StructNode) -> bool {
        parent.kind != NodeKind::Document || self.document_type.root_tracks_last_child()
    }

    /// Rejects `kind` as a new child of `parent`; `moving` is the key of a
    /// node already below `parent` that is being repositioned.
    fn check_child_allowed(&self, parent: &StructNode, kind: NodeKind, moving: Option<u64>) -> NodeResult<()> {
        if !kind.is_structural() || kind == NodeKind::Document {
            return Err(NodeError::invalid(format!("{} nodes cannot be children", kind)));
        }
        if !self.document_type.supports(kind) {
            return Err(NodeError::invalid(format!(
                "{} nodes are not part of {} documents",
                kind, self.document_type
            )));
        }
        if !parent.kind.can_have_children() {
            return Err(NodeError::invalid(format!(
                "{} node {} cannot have children",
                parent.kind, parent.key
            )));
        }

        let already_child = moving.is_some_and(|key| {
            self.node(key)
                .map(|n| n.parent == Some(parent.key))
                .unwrap_or(false)
        });
        let other_children = parent.child_count - u64::from(already_child);

        match parent.kind {
            NodeKind::Document
                if !self.document_type.root_allows_multiple_children() && other_children > 0 =>
            {
                Err(NodeError::invalid(format!(
                    "{} documents have a single top-level node",
                    self.document_type
                )))
            }
            NodeKind::Document if self.document_type == DocumentType::Xml && kind != NodeKind::Element => {
                Err(NodeError::invalid("the top-level node must be an element"))
            }
            NodeKind::Object if kind != NodeKind::ObjectKey => {
                Err(NodeError::invalid("object members must be object keys"))
            }
            NodeKind::Array | NodeKind::ObjectKey | NodeKind::Document
                if kind == NodeKind::ObjectKey =>
            {
                Err(NodeError::invalid("object keys must be members of an object"))
            }
            NodeKind::ObjectKey if other_children > 0 => {
                Err(NodeError::invalid(format!("object key {} already has a value", parent.key)))
            }
            _ => Ok(()),
        }
    }

    fn parent_of(&self, node: &StructNode) -> NodeResult<StructNode> {
        let parent = node
            .parent
            .ok_or_else(|| NodeError::invalid(format!("node {} has no parent", node.key)))?;
        self.node(parent)
    }

    fn link_as_first_child(&mut self, node: &mut StructNode, parent_key: u64) -> NodeResult<()> {
        let mut parent = self.node(parent_key)?;
        node.parent = Some(parent_key);
        node.left_sibling = None;
        node.right_sibling = parent.first_child;

        match parent.first_child {
            Some(old_first) => {
                let mut first = self.node(old_first)?;
                first.left_sibling = Some(node.key);
                self.write_node(&first)?;
            }
            None if self.tracks_last_child(&parent) => parent.last_child = Some(node.key),
            None => {}
        }
        parent.first_child = Some(node.key);
        parent.child_count += 1;
        self.write_node(&parent)
    }

    fn link_as_right_sibling(&mut self, node: &mut StructNode, sibling_key: u64) -> NodeResult<()> {
        let mut sibling = self.node(sibling_key)?;
        let mut parent = self.parent_of(&sibling)?;
        node.parent = Some(parent.key);
        node.left_sibling = Some(sibling_key);
        node.right_sibling = sibling.right_sibling;

        match sibling.right_sibling {
            Some(right_key) => {
                let mut right = self.node(right_key)?;
                right.left_sibling = Some(node.key);
                self.write_node(&right)?;
            }
            None if self.tracks_last_child(&parent) => parent.last_child = Some(node.key),
            None => {}
        }
        sibling.right_sibling = Some(node.key);
        self.write_node(&sibling)?;
        parent.child_count += 1;
        self.write_node(&parent)
    }

    fn link_as_left_sibling(&mut self, node: &mut StructNode, sibling_key: u64) -> NodeResult<()> {
        let mut sibling = self.node(sibling_key)?;
        let mut parent = self.parent_of(&sibling)?;
        node.parent = Some(parent.key);
        node.left_sibling = sibling.left_sibling;
        node.right_sibling = Some(sibling_key);

        match sibling.left_sibling {
            Some(left_key) => {
                let mut left = self.node(left_key)?;
                left.right_sibling = Some(node.key);
                self.write_node(&left)?;
            }
            None => parent.first_child = Some(node.key),
        }
        sibling.left_sibling = Some(node.key);
        self.write_node(&sibling)?;
        parent.child_count += 1;
        self.write_node(&parent)
    }

    /// Detaches `node` from its parent and siblings.
    fn unlink(&mut self, node: &mut StructNode) -> NodeResult<()> {
        let mut parent = self.parent_of(node)?;
        if let Some(left_key) = node.left_sibling {
            let mut left = self.node(left_key)?;
            left.right_sibling = node.right_sibling;
            self.write_node(&left)?;
        }
        if let Some(right_key) = node.right_sibling {
            let mut right = self.node(right_key)?;
            right.left_sibling = node.left_sibling;
            self.write_node(&right)?;
        }
        if parent.first_child == Some(node.key) {
            parent.first_child = node.right_sibling;
        }
        if parent.last_child == Some(node.key) {
            parent.last_child = node.left_sibling;
        }
        parent.child_count = parent.child_count.saturating_sub(1);
        self.write_node(&parent)?;

        node.parent = None;
        node.left_sibling = None;
        node.right_sibling = None;
        Ok(())
    }

    /// Inserts a node before the current first child of `parent`.
    pub fn insert_first_child(&mut self, parent: u64, content: NewNode) -> NodeResult<u64> {
        let parent_node = self.node(parent)?;
        self.check_child_allowed(&parent_node, content.kind, None)?;

        let dewey_id = self.label(|trx| manager::new_first_child_id(trx, parent))?;
        let mut node = self.create_node(content, dewey_id)?;
        self.link_as_first_child(&mut node, parent)?;
        self.write_node(&node)?;
        Ok(node.key)
    }

    /// Inserts a node directly after `sibling`.
    pub fn insert_right_sibling(&mut self, sibling: u64, content: NewNode) -> NodeResult<u64> {
        let sibling_node = self.structural_non_root(sibling)?;
        let parent = self.parent_of(&sibling_node)?;
        self.check_child_allowed(&parent, content.kind, None)?;

        let dewey_id = self.label(|trx| manager::new_right_sibling_id(trx, sibling))?;
        let mut node = self.create_node(content, dewey_id)?;
        self.link_as_right_sibling(&mut node, sibling)?;
        self.write_node(&node)?;
        Ok(node.key)
    }

    /// Inserts a node directly before `sibling`.
    pub fn insert_left_sibling(&mut self, sibling: u64, content: NewNode) -> NodeResult<u64> {
        let sibling_node = self.structural_non_root(sibling)?;
        let parent = self.parent_of(&sibling_node)?;
        self.check_child_allowed(&parent, content.kind, None)?;

        let dewey_id = self.label(|trx| manager::new_left_sibling_id(trx, sibling))?;
        let mut node = self.create_node(content, dewey_id)?;
        self.link_as_left_sibling(&mut node, sibling)?;
        self.write_node(&node)?;
        Ok(node.key)
    }

    /// Adds an attribute after the existing attributes of `owner`.
    pub fn insert_attribute(&mut self, owner: u64, name: &str, value: &[u8]) -> NodeResult<u64> {
        self.insert_non_structural(owner, NodeKind::Attribute, name, value)
    }

    /// Adds a namespace declaration after the existing ones of `owner`.
    pub fn insert_namespace(&mut self, owner: u64, prefix: &str, uri: &[u8]) -> NodeResult<u64> {
        self.insert_non_structural(owner, NodeKind::Namespace, prefix, uri)
    }

    fn insert_non_structural(&mut self, owner: u64, kind: NodeKind, name: &str, value: &[u8]) -> NodeResult<u64> {
        let mut owner_node = self.node(owner)?;
        if owner_node.kind != NodeKind::Element {
            return Err(NodeError::invalid(format!(
                "{} node {} cannot own a {}",
                owner_node.kind, owner, kind
            )));
        }

        let dewey_id = self.label(|trx| match kind {
            NodeKind::Attribute => manager::new_attribute_id(trx, owner),
            _ => manager::new_namespace_id(trx, owner),
        })?;
        let mut node = self.create_node(
            NewNode {
                kind,
                name: Some(name.to_string()),
                value: value.to_vec(),
            },
            dewey_id,
        )?;
        node.parent = Some(owner);
        self.write_node(&node)?;

        match kind {
            NodeKind::Attribute => owner_node.attributes.push(node.key),
            _ => owner_node.namespaces.push(node.key),
        }
        self.write_node(&owner_node)?;
        Ok(node.key)
    }

    fn structural_non_root(&self, key: u64) -> NodeResult<StructNode> {
        let node = self.node(key)?;
        if key == DOCUMENT_ROOT_KEY || node.kind == NodeKind::Document {
            return Err(NodeError::invalid("the document root has no siblings"));
        }
        if !node.kind.is_structural() {
            return Err(NodeError::invalid(format!(
                "{} node {} has no siblings",
                node.kind, key
            )));
        }
        Ok(node)
    }

    /// Fails if `target` is `key` or lies inside the subtree of `key`.
    fn check_not_inside(&self, key: u64, target: u64) -> NodeResult<()> {
        let mut current = Some(target);
        while let Some(k) = current {
            if k == key {
                return Err(NodeError::invalid(format!(
                    "cannot move node {} into its own subtree",
                    key
                )));
            }
            current = self.node(k)?.parent;
        }
        Ok(())
    }

    /// Moves the subtree of `key` to be the first child of `parent`.
    ///
    /// Returns the number of relabeled nodes.
    pub fn move_subtree_to_first_child(&mut self, key: u64, parent: u64) -> NodeResult<u64> {
        let mut node = self.structural_non_root(key)?;
        self.check_not_inside(key, parent)?;
        let parent_node = self.node(parent)?;
        self.check_child_allowed(&parent_node, node.kind, Some(key))?;

        self.unlink(&mut node)?;
        self.link_as_first_child(&mut node, parent)?;
        self.write_node(&node)?;
        self.relabel(key)
    }

    /// Moves the subtree of `key` directly after `sibling`.
    ///
    /// Returns the number of relabeled nodes.
    pub fn move_subtree_to_right_sibling(&mut self, key: u64, sibling: u64) -> NodeResult<u64> {
        let mut node = self.structural_non_root(key)?;
        let sibling_node = self.structural_non_root(sibling)?;
        self.check_not_inside(key, sibling)?;
        let parent = self.parent_of(&sibling_node)?;
        self.check_child_allowed(&parent, node.kind, Some(key))?;

        self.unlink(&mut node)?;
        self.link_as_right_sibling(&mut node, sibling)?;
        self.write_node(&node)?;
        self.relabel(key)
    }

    fn relabel(&mut self, key: u64) -> NodeResult<u64> {
        if !self.stores_dewey_ids {
            return Ok(0);
        }
        let count = manager::compute_new_dewey_ids(self, key)?;
        self.page_trx.store().metrics().add_labels_assigned(count);

        let key = key.to_string();
        let relabeled = count.to_string();
        let revision = self.revision().to_string();
        log_event_with_fields(
            Event::LabelsRecomputed,
            &[
                ("count", relabeled.as_str()),
                ("node", key.as_str()),
                ("revision", revision.as_str()),
            ],
        );
        Ok(count)
    }

    /// Commits the page transaction; returns the new revision.
    pub fn commit(self, message: Option<String>) -> NodeResult<u32> {
        Ok(self.page_trx.commit(message)?)
    }

    pub fn abort(self) {
        self.page_trx.abort();
    }
}

impl StructuralNodes for NodeWriteTrx {
    fn node(&self, key: u64) -> NodeResult<StructNode> {
        let record = self
            .page_trx
            .get(key, IndexType::Document, 0)?
            .ok_or(NodeError::NotFound(key))?;
        StructNode::from_record(key, record)
    }

    fn update_dewey_id(&mut self, key: u64, id: DeweyId) -> NodeResult<()> {
        let mut node = self.node(key)?;
        node.dewey_id = Some(id);
        self.write_node(&node)
    }
}
