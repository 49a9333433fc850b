//! DeweyID Labeling Invariant Tests
//!
//! - Label order equals document order
//! - A parent label is the prefix of its children's labels
//! - Inserts label only the new node; moves relabel exactly the moved subtree
//! - Repeated insertion at one point grows labels slowly

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use revtree::dewey::DeweyId;
use revtree::node::{NewNode, NodeReadTrx, NodeWriteTrx, StructuralNodes, DOCUMENT_ROOT_KEY};
use revtree::resource::{DocumentType, Resource, ResourceConfig};

// =============================================================================
// Test Utilities
// =============================================================================

fn xml_resource() -> Resource {
    Resource::in_memory(ResourceConfig::new("doc"), DocumentType::Xml).unwrap()
}

fn labels(rtx: &NodeReadTrx) -> Vec<(u64, DeweyId)> {
    rtx.document_order(DOCUMENT_ROOT_KEY)
        .unwrap()
        .into_iter()
        .map(|key| (key, rtx.dewey_id(key).unwrap().expect("node without label")))
        .collect()
}

fn assert_document_order(rtx: &NodeReadTrx) {
    let labels = labels(rtx);
    for pair in labels.windows(2) {
        assert!(
            pair[0].1 < pair[1].1,
            "node {} ({}) must sort before node {} ({})",
            pair[0].0,
            pair[0].1,
            pair[1].0,
            pair[1].1
        );
    }

    for (key, label) in &labels {
        let node = rtx.node(*key).unwrap();
        if let Some(parent) = node.parent {
            let parent_label = rtx.dewey_id(parent).unwrap().unwrap();
            assert!(
                parent_label.is_parent_of(label),
                "{} must be the parent label of {}",
                parent_label,
                label
            );
        }
    }
}

/// Inserts `count` elements below a fresh top-level element.
fn with_children(wtx: &mut NodeWriteTrx, count: usize) -> (u64, Vec<u64>) {
    let top = wtx
        .insert_first_child(DOCUMENT_ROOT_KEY, NewNode::element("top"))
        .unwrap();
    let mut children = Vec::new();
    let mut last = wtx.insert_first_child(top, NewNode::element("c0")).unwrap();
    children.push(last);
    for i in 1..count {
        last = wtx
            .insert_right_sibling(last, NewNode::element(format!("c{}", i)))
            .unwrap();
        children.push(last);
    }
    (top, children)
}

// =============================================================================
// Label order equals document order
// =============================================================================

/// Random inserts at random positions keep labels in document order.
#[test]
fn test_random_inserts_keep_document_order() {
    for seed in [1u64, 7, 42] {
        let resource = xml_resource();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut wtx = resource.begin_node_write().unwrap();

        let top = wtx
            .insert_first_child(DOCUMENT_ROOT_KEY, NewNode::element("top"))
            .unwrap();
        let mut elements = vec![top];

        for i in 0..300 {
            let target = elements[rng.gen_range(0..elements.len())];
            let action = if target == top { rng.gen_range(0..2) } else { rng.gen_range(0..5) };
            match action {
                0 => {
                    let key = wtx
                        .insert_first_child(target, NewNode::element(format!("e{}", i)))
                        .unwrap();
                    elements.push(key);
                }
                1 => {
                    wtx.insert_attribute(target, &format!("a{}", i), b"v").unwrap();
                }
                2 => {
                    wtx.insert_first_child(target, NewNode::text(format!("t{}", i)))
                        .unwrap();
                }
                3 => {
                    let key = wtx
                        .insert_right_sibling(target, NewNode::element(format!("e{}", i)))
                        .unwrap();
                    elements.push(key);
                }
                _ => {
                    let key = wtx
                        .insert_left_sibling(target, NewNode::element(format!("e{}", i)))
                        .unwrap();
                    elements.push(key);
                }
            }
        }
        wtx.commit(None).unwrap();

        let rtx = resource.begin_node_read(None).unwrap();
        assert_document_order(&rtx);
    }
}

/// Namespaces sort before attributes, attributes before children.
#[test]
fn test_non_structural_nodes_precede_children() {
    let resource = xml_resource();
    let mut wtx = resource.begin_node_write().unwrap();
    let (top, children) = with_children(&mut wtx, 2);
    let attribute = wtx.insert_attribute(top, "lang", b"en").unwrap();
    let namespace = wtx.insert_namespace(top, "x", b"urn:x").unwrap();
    wtx.commit(None).unwrap();

    let rtx = resource.begin_node_read(None).unwrap();
    let order = rtx.document_order(top).unwrap();
    assert_eq!(order, vec![top, namespace, attribute, children[0], children[1]]);
    assert_eq!(rtx.dewey_id(namespace).unwrap().unwrap().to_string(), "1.17.0.17");
    assert_eq!(rtx.dewey_id(attribute).unwrap().unwrap().to_string(), "1.17.1.17");
    assert_document_order(&rtx);
}

// =============================================================================
// Inserts and moves
// =============================================================================

/// An insert assigns one label and leaves every existing label alone.
#[test]
fn test_insert_changes_no_existing_label() {
    let resource = xml_resource();
    let mut wtx = resource.begin_node_write().unwrap();
    let (_, children) = with_children(&mut wtx, 5);
    wtx.commit(None).unwrap();

    let before: HashMap<u64, DeweyId> =
        labels(&resource.begin_node_read(None).unwrap()).into_iter().collect();

    let mut wtx = resource.begin_node_write().unwrap();
    let inserted = wtx
        .insert_left_sibling(children[2], NewNode::element("new"))
        .unwrap();
    wtx.commit(None).unwrap();

    let rtx = resource.begin_node_read(None).unwrap();
    for (key, label) in labels(&rtx) {
        if key == inserted {
            assert!(!before.contains_key(&key));
        } else {
            assert_eq!(before[&key], label, "label of node {} changed", key);
        }
    }
    assert_document_order(&rtx);
}

/// Moving a subtree relabels exactly its nodes.
#[test]
fn test_move_relabels_exactly_the_subtree() {
    let resource = xml_resource();
    let mut wtx = resource.begin_node_write().unwrap();
    let (_, children) = with_children(&mut wtx, 3);
    let moved = children[0];
    let attribute = wtx.insert_attribute(moved, "id", b"m").unwrap();
    let inner_first = wtx.insert_first_child(moved, NewNode::element("i1")).unwrap();
    let inner_second = wtx
        .insert_right_sibling(inner_first, NewNode::element("i2"))
        .unwrap();
    wtx.commit(None).unwrap();

    let before: HashMap<u64, DeweyId> =
        labels(&resource.begin_node_read(None).unwrap()).into_iter().collect();
    let subtree = [moved, attribute, inner_first, inner_second];

    let mut wtx = resource.begin_node_write().unwrap();
    let relabeled = wtx.move_subtree_to_right_sibling(moved, children[2]).unwrap();
    assert_eq!(relabeled, subtree.len() as u64);
    wtx.commit(None).unwrap();

    let rtx = resource.begin_node_read(None).unwrap();
    for (key, label) in labels(&rtx) {
        if subtree.contains(&key) {
            assert_ne!(before[&key], label, "node {} kept its old label", key);
        } else {
            assert_eq!(before[&key], label, "node {} outside the subtree changed", key);
        }
    }
    assert_eq!(
        rtx.children(rtx.node(moved).unwrap().parent.unwrap()).unwrap(),
        vec![children[1], children[2], moved]
    );
    assert_document_order(&rtx);

    // The previous revision still shows the old position.
    let old = resource.begin_node_read(Some(1)).unwrap();
    assert_eq!(old.dewey_id(moved).unwrap().as_ref(), Some(&before[&moved]));
}

#[test]
fn test_move_into_own_subtree_is_rejected() {
    let resource = xml_resource();
    let mut wtx = resource.begin_node_write().unwrap();
    let (_, children) = with_children(&mut wtx, 2);
    let inner = wtx
        .insert_first_child(children[0], NewNode::element("inner"))
        .unwrap();

    assert!(wtx.move_subtree_to_first_child(children[0], inner).is_err());
    assert!(wtx.move_subtree_to_first_child(children[0], children[0]).is_err());
    assert!(wtx.move_subtree_to_first_child(children[0], children[1]).is_ok());
}

// =============================================================================
// Density and growth
// =============================================================================

/// 500 inserts at one point stay ordered and keep labels short.
#[test]
fn test_repeated_inserts_at_one_point_grow_slowly() {
    let resource = xml_resource();
    let mut wtx = resource.begin_node_write().unwrap();
    let (top, children) = with_children(&mut wtx, 2);
    let parent_len = wtx.node(top).unwrap().dewey_id.unwrap().divisions().len();

    for i in 0..500 {
        wtx.insert_right_sibling(children[0], NewNode::element(format!("r{}", i)))
            .unwrap();
        wtx.insert_left_sibling(children[1], NewNode::element(format!("l{}", i)))
            .unwrap();
    }
    wtx.commit(None).unwrap();

    let rtx = resource.begin_node_read(None).unwrap();
    let labels = labels(&rtx);
    assert_eq!(rtx.children(top).unwrap().len(), 1002);
    let longest = labels
        .iter()
        .filter(|(key, _)| *key != DOCUMENT_ROOT_KEY && *key != top)
        .map(|(_, label)| label.divisions().len() - parent_len)
        .max()
        .unwrap();
    assert!(longest <= 3, "labels grew to {} divisions below the parent", longest);
    assert_document_order(&rtx);
}

/// Between adjacent terminals a caret opens a new sub-range.
#[test]
fn test_adjacent_labels_open_a_caret() {
    let parent = DeweyId::new_root_id();
    let left = DeweyId::from_divisions(vec![1, 3]).unwrap();
    let right = DeweyId::from_divisions(vec![1, 5]).unwrap();

    let between = DeweyId::new_between(&parent, Some(&left), Some(&right)).unwrap();
    assert_eq!(between.to_string(), "1.4.1025");
    assert!(left < between && between < right);

    let before = DeweyId::new_between(&parent, None, Some(&left)).unwrap();
    assert_eq!(before.to_string(), "1.2.1025");

    let inner = DeweyId::new_between(&parent, Some(&left), Some(&between)).unwrap();
    assert!(left < inner && inner < between);
    assert_eq!(inner.level(), 1);
}

// =============================================================================
// Document models
// =============================================================================

#[test]
fn test_json_root_takes_many_children() {
    let resource = Resource::in_memory(ResourceConfig::new("doc"), DocumentType::Json).unwrap();
    let mut wtx = resource.begin_node_write().unwrap();
    let first = wtx
        .insert_first_child(DOCUMENT_ROOT_KEY, NewNode::object())
        .unwrap();
    let second = wtx.insert_right_sibling(first, NewNode::array()).unwrap();
    let key = wtx.insert_first_child(first, NewNode::object_key("name")).unwrap();
    wtx.insert_first_child(key, NewNode::value("revtree")).unwrap();
    assert!(wtx.insert_first_child(first, NewNode::array()).is_err());
    wtx.commit(None).unwrap();

    let rtx = resource.begin_node_read(None).unwrap();
    let root = rtx.document_root().unwrap();
    assert_eq!(root.last_child, Some(second));
    assert_eq!(rtx.children(DOCUMENT_ROOT_KEY).unwrap(), vec![first, second]);
    assert_document_order(&rtx);
}

#[test]
fn test_xml_root_takes_one_element() {
    let resource = xml_resource();
    let mut wtx = resource.begin_node_write().unwrap();
    assert!(wtx
        .insert_first_child(DOCUMENT_ROOT_KEY, NewNode::text("loose"))
        .is_err());
    wtx.insert_first_child(DOCUMENT_ROOT_KEY, NewNode::element("top"))
        .unwrap();
    assert!(wtx
        .insert_first_child(DOCUMENT_ROOT_KEY, NewNode::element("second"))
        .is_err());
}
