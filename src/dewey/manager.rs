//! Label assignment for structural edits
//!
//! Everything here works through [`StructuralNodes`] with explicit node keys,
//! so the same code labels nodes of any node transaction.

use std::collections::VecDeque;

use crate::node::{NodeError, NodeResult, StructuralNodes};

use super::DeweyId;

/// Stored label of `key`.
pub fn label_of<N: StructuralNodes + ?Sized>(nodes: &N, key: u64) -> NodeResult<DeweyId> {
    nodes
        .node(key)?
        .dewey_id
        .ok_or(NodeError::MissingLabel(key))
}

/// Label for a new namespace of `owner`, after its existing ones.
pub fn new_namespace_id<N: StructuralNodes + ?Sized>(nodes: &N, owner: u64) -> NodeResult<DeweyId> {
    let node = nodes.node(owner)?;
    let owner_id = node.dewey_id.ok_or(NodeError::MissingLabel(owner))?;
    match node.namespaces.last() {
        Some(&last) => Ok(DeweyId::new_between(&owner_id, Some(&label_of(nodes, last)?), None)?),
        None => Ok(owner_id.new_namespace_id()),
    }
}

/// Label for a new attribute of `owner`, after its existing ones.
pub fn new_attribute_id<N: StructuralNodes + ?Sized>(nodes: &N, owner: u64) -> NodeResult<DeweyId> {
    let node = nodes.node(owner)?;
    let owner_id = node.dewey_id.ok_or(NodeError::MissingLabel(owner))?;
    match node.attributes.last() {
        Some(&last) => Ok(DeweyId::new_between(&owner_id, Some(&label_of(nodes, last)?), None)?),
        None => Ok(owner_id.new_attribute_id()),
    }
}

/// Label for a node inserted before the current first child of `parent`.
pub fn new_first_child_id<N: StructuralNodes + ?Sized>(nodes: &N, parent: u64) -> NodeResult<DeweyId> {
    let node = nodes.node(parent)?;
    let parent_id = node.dewey_id.ok_or(NodeError::MissingLabel(parent))?;
    match node.first_child {
        Some(first) => Ok(DeweyId::new_between(&parent_id, None, Some(&label_of(nodes, first)?))?),
        None => Ok(parent_id.new_child_id()),
    }
}

/// Label for a node inserted directly before `key`.
pub fn new_left_sibling_id<N: StructuralNodes + ?Sized>(nodes: &N, key: u64) -> NodeResult<DeweyId> {
    let node = nodes.node(key)?;
    let current = node.dewey_id.ok_or(NodeError::MissingLabel(key))?;
    let parent_id = parent_label(nodes, key, node.parent)?;
    let left = node.left_sibling.map(|k| label_of(nodes, k)).transpose()?;
    Ok(DeweyId::new_between(&parent_id, left.as_ref(), Some(&current))?)
}

/// Label for a node inserted directly after `key`.
pub fn new_right_sibling_id<N: StructuralNodes + ?Sized>(nodes: &N, key: u64) -> NodeResult<DeweyId> {
    let node = nodes.node(key)?;
    let current = node.dewey_id.ok_or(NodeError::MissingLabel(key))?;
    let parent_id = parent_label(nodes, key, node.parent)?;
    let right = node.right_sibling.map(|k| label_of(nodes, k)).transpose()?;
    Ok(DeweyId::new_between(&parent_id, Some(&current), right.as_ref())?)
}

fn parent_label<N: StructuralNodes + ?Sized>(
    nodes: &N,
    key: u64,
    parent: Option<u64>,
) -> NodeResult<DeweyId> {
    let parent = parent.ok_or_else(|| NodeError::invalid(format!("node {} has no parent", key)))?;
    label_of(nodes, parent)
}

/// Relabels the subtree rooted at `key` for its current position.
///
/// The root gets a label between its current siblings (or the first child
/// slot of its parent). The rest of the subtree is labeled level by level:
/// for every owner its namespaces, then its attributes, then its children
/// left to right, each after the previously assigned one. Labels outside the
/// subtree are not touched. Returns the number of relabeled nodes.
pub fn compute_new_dewey_ids<N: StructuralNodes + ?Sized>(nodes: &mut N, key: u64) -> NodeResult<u64> {
    let root = nodes.node(key)?;
    if !root.kind.is_structural() {
        return Err(NodeError::invalid(format!(
            "cannot relabel {} node {} as a subtree root",
            root.kind, key
        )));
    }
    let parent_id = parent_label(nodes, key, root.parent)?;
    let left = root.left_sibling.map(|k| label_of(nodes, k)).transpose()?;
    let right = root.right_sibling.map(|k| label_of(nodes, k)).transpose()?;
    let root_id = DeweyId::new_between(&parent_id, left.as_ref(), right.as_ref())?;

    nodes.update_dewey_id(key, root_id.clone())?;
    let mut count = 1u64;

    let mut queue = VecDeque::from([(key, root_id)]);
    while let Some((owner_key, owner_id)) = queue.pop_front() {
        let owner = nodes.node(owner_key)?;

        let mut previous: Option<DeweyId> = None;
        for &namespace in &owner.namespaces {
            let id = match &previous {
                Some(prev) => DeweyId::new_between(&owner_id, Some(prev), None)?,
                None => owner_id.new_namespace_id(),
            };
            nodes.update_dewey_id(namespace, id.clone())?;
            previous = Some(id);
            count += 1;
        }

        let mut previous: Option<DeweyId> = None;
        for &attribute in &owner.attributes {
            let id = match &previous {
                Some(prev) => DeweyId::new_between(&owner_id, Some(prev), None)?,
                None => owner_id.new_attribute_id(),
            };
            nodes.update_dewey_id(attribute, id.clone())?;
            previous = Some(id);
            count += 1;
        }

        let mut previous: Option<DeweyId> = None;
        let mut next_child = owner.first_child;
        while let Some(child) = next_child {
            let id = match &previous {
                Some(prev) => DeweyId::new_between(&owner_id, Some(prev), None)?,
                None => owner_id.new_child_id(),
            };
            nodes.update_dewey_id(child, id.clone())?;
            next_child = nodes.node(child)?.right_sibling;
            queue.push_back((child, id.clone()));
            previous = Some(id);
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::node::{NodeKind, StructNode};

    /// In-memory node set for exercising the walk without pages.
    #[derive(Default)]
    struct Nodes {
        nodes: BTreeMap<u64, StructNode>,
    }

    impl StructuralNodes for Nodes {
        fn node(&self, key: u64) -> NodeResult<StructNode> {
            self.nodes.get(&key).cloned().ok_or(NodeError::NotFound(key))
        }

        fn update_dewey_id(&mut self, key: u64, id: DeweyId) -> NodeResult<()> {
            let node = self.nodes.get_mut(&key).ok_or(NodeError::NotFound(key))?;
            node.dewey_id = Some(id);
            Ok(())
        }
    }

    impl Nodes {
        fn add(&mut self, key: u64, kind: NodeKind, parent: Option<u64>) {
            let mut node = StructNode::new(key, kind);
            node.parent = parent;
            if let Some(p) = parent {
                let siblings: Vec<u64> = self
                    .nodes
                    .values()
                    .filter(|n| n.parent == Some(p) && n.kind.is_structural())
                    .map(|n| n.key)
                    .collect();
                match kind {
                    NodeKind::Attribute => self.nodes.get_mut(&p).unwrap().attributes.push(key),
                    NodeKind::Namespace => self.nodes.get_mut(&p).unwrap().namespaces.push(key),
                    _ => {
                        if let Some(&last) = siblings.last() {
                            self.nodes.get_mut(&last).unwrap().right_sibling = Some(key);
                            node.left_sibling = Some(last);
                        } else {
                            self.nodes.get_mut(&p).unwrap().first_child = Some(key);
                        }
                    }
                }
            }
            self.nodes.insert(key, node);
        }

        fn label(&self, key: u64) -> String {
            self.nodes[&key].dewey_id.as_ref().unwrap().to_string()
        }
    }

    /// document(0) > a(1) [ns 2, attrs 3,4] > { b(5) > text(7), c(6) }
    fn sample() -> Nodes {
        let mut nodes = Nodes::default();
        nodes.add(0, NodeKind::Document, None);
        nodes.nodes.get_mut(&0).unwrap().dewey_id = Some(DeweyId::new_root_id());
        nodes.add(1, NodeKind::Element, Some(0));
        nodes.add(2, NodeKind::Namespace, Some(1));
        nodes.add(3, NodeKind::Attribute, Some(1));
        nodes.add(4, NodeKind::Attribute, Some(1));
        nodes.add(5, NodeKind::Element, Some(1));
        nodes.add(6, NodeKind::Element, Some(1));
        nodes.add(7, NodeKind::Text, Some(5));
        nodes
    }

    #[test]
    fn test_recompute_labels_whole_subtree() {
        let mut nodes = sample();
        let count = compute_new_dewey_ids(&mut nodes, 1).unwrap();
        assert_eq!(count, 7);

        assert_eq!(nodes.label(1), "1.17");
        assert_eq!(nodes.label(2), "1.17.0.17");
        assert_eq!(nodes.label(3), "1.17.1.17");
        assert_eq!(nodes.label(4), "1.17.1.19");
        assert_eq!(nodes.label(5), "1.17.17");
        assert_eq!(nodes.label(6), "1.17.19");
        assert_eq!(nodes.label(7), "1.17.17.17");
    }

    #[test]
    fn test_recompute_root_uses_siblings() {
        let mut nodes = sample();
        compute_new_dewey_ids(&mut nodes, 1).unwrap();
        let before_five = nodes.label(5);

        compute_new_dewey_ids(&mut nodes, 6).unwrap();
        assert_eq!(nodes.label(6), "1.17.19");
        assert_eq!(nodes.label(5), before_five);
    }

    #[test]
    fn test_derived_ids() {
        let mut nodes = sample();
        compute_new_dewey_ids(&mut nodes, 1).unwrap();

        assert_eq!(new_attribute_id(&nodes, 1).unwrap().to_string(), "1.17.1.21");
        assert_eq!(new_namespace_id(&nodes, 1).unwrap().to_string(), "1.17.0.19");
        assert_eq!(new_first_child_id(&nodes, 1).unwrap().to_string(), "1.17.15");
        assert_eq!(new_first_child_id(&nodes, 7).unwrap().to_string(), "1.17.17.17.17");
        assert_eq!(new_right_sibling_id(&nodes, 5).unwrap().to_string(), "1.17.18.1025");
        assert_eq!(new_left_sibling_id(&nodes, 5).unwrap().to_string(), "1.17.15");
        assert_eq!(new_right_sibling_id(&nodes, 6).unwrap().to_string(), "1.17.21");
    }

    #[test]
    fn test_missing_parent_label() {
        let nodes = sample();
        assert!(matches!(
            new_first_child_id(&nodes, 1),
            Err(NodeError::MissingLabel(1))
        ));
    }

    #[test]
    fn test_attribute_cannot_be_subtree_root() {
        let mut nodes = sample();
        compute_new_dewey_ids(&mut nodes, 1).unwrap();
        assert!(compute_new_dewey_ids(&mut nodes, 3).is_err());
    }
}
