//! DeweyId - hierarchical, order-preserving node label
//!
//! A label is a sequence of divisions. The document root is `1`. Every level
//! below appends one step:
//!
//! ```text
//! [class marker]? caret* terminal
//!   marker   0 = namespace, 1 = attribute, absent = child
//!   caret    even, >= 2
//!   terminal odd,  >= 3
//! ```
//!
//! Labels compare division by division, which is document order. A label is
//! a strict prefix of another exactly when it labels an ancestor. The class
//! markers keep the namespaces of a node before its attributes, and both
//! before its children.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use super::allocate::{first_step, step_after, step_before, step_between, MIN_STEP_DIVISION};
use super::errors::{DeweyError, DeweyResult};

/// Division of the document root
pub const ROOT_DIVISION: u64 = 1;

/// Marker opening the namespace sub-range of a node
pub const NAMESPACE_MARKER: u64 = 0;

/// Marker opening the attribute sub-range of a node
pub const ATTRIBUTE_MARKER: u64 = 1;

/// Sub-range a label was allocated from, relative to its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelClass {
    /// The document root
    Root,
    /// Namespace declaration of the parent
    Namespace,
    /// Attribute of the parent
    Attribute,
    /// Structural child of the parent
    Child,
}

impl LabelClass {
    fn marker(self) -> Option<u64> {
        match self {
            LabelClass::Namespace => Some(NAMESPACE_MARKER),
            LabelClass::Attribute => Some(ATTRIBUTE_MARKER),
            LabelClass::Root | LabelClass::Child => None,
        }
    }
}

/// Immutable DeweyID label.
#[derive(Clone)]
pub struct DeweyId {
    divisions: Vec<u64>,
    /// Index where the last step (marker included) begins; 0 for the root
    last_step: usize,
    /// Number of steps below the root
    level: usize,
}

impl DeweyId {
    /// Label of the document root.
    pub fn new_root_id() -> Self {
        Self {
            divisions: vec![ROOT_DIVISION],
            last_step: 0,
            level: 0,
        }
    }

    /// Builds a label from raw divisions, validating the step grammar.
    pub fn from_divisions(divisions: Vec<u64>) -> DeweyResult<Self> {
        if divisions.first() != Some(&ROOT_DIVISION) {
            return Err(DeweyError::invalid(&divisions, "must start with the root division 1"));
        }

        let mut index = 1;
        let mut last_step = 0;
        let mut level = 0;

        while index < divisions.len() {
            let step_start = index;
            if divisions[index] <= ATTRIBUTE_MARKER {
                index += 1;
            }

            loop {
                let Some(&division) = divisions.get(index) else {
                    return Err(DeweyError::invalid(&divisions, "step without odd terminal"));
                };
                if division < MIN_STEP_DIVISION {
                    return Err(DeweyError::invalid(
                        &divisions,
                        format!("division {} at position {} is reserved", division, index),
                    ));
                }
                index += 1;
                if division % 2 == 1 {
                    break;
                }
            }

            last_step = step_start;
            level += 1;
        }

        Ok(Self {
            divisions,
            last_step,
            level,
        })
    }

    /// Decodes a label written by [`DeweyId::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> DeweyResult<Self> {
        let mut pos = 0;
        let count = read_varint(bytes, &mut pos)? as usize;
        let mut divisions = Vec::with_capacity(count.min(bytes.len()));
        for _ in 0..count {
            divisions.push(read_varint(bytes, &mut pos)?);
        }
        if pos != bytes.len() {
            return Err(DeweyError::invalid(&divisions, "trailing bytes after label"));
        }
        Self::from_divisions(divisions)
    }

    /// Compact encoding: division count followed by LEB128 varint divisions.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.divisions.len() + 1);
        write_varint(&mut out, self.divisions.len() as u64);
        for division in &self.divisions {
            write_varint(&mut out, *division);
        }
        out
    }

    pub fn divisions(&self) -> &[u64] {
        &self.divisions
    }

    /// Number of steps below the document root (root is level 0).
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn is_root(&self) -> bool {
        self.level == 0
    }

    /// Sub-range this label was allocated from.
    pub fn class(&self) -> LabelClass {
        if self.is_root() {
            return LabelClass::Root;
        }
        match self.divisions[self.last_step] {
            NAMESPACE_MARKER => LabelClass::Namespace,
            ATTRIBUTE_MARKER => LabelClass::Attribute,
            _ => LabelClass::Child,
        }
    }

    pub fn is_attribute(&self) -> bool {
        self.class() == LabelClass::Attribute
    }

    pub fn is_namespace(&self) -> bool {
        self.class() == LabelClass::Namespace
    }

    /// Label of the owning node, `None` for the root.
    pub fn parent(&self) -> Option<DeweyId> {
        if self.is_root() {
            return None;
        }
        let parent = Self::from_divisions(self.divisions[..self.last_step].to_vec());
        debug_assert!(parent.is_ok(), "prefix of a valid label must be valid");
        parent.ok()
    }

    fn parent_divisions(&self) -> &[u64] {
        &self.divisions[..self.last_step]
    }

    /// Divisions of the last step without the class marker.
    fn step(&self) -> &[u64] {
        let start = match self.class().marker() {
            Some(_) => self.last_step + 1,
            None => self.last_step,
        };
        &self.divisions[start..]
    }

    fn extended(&self, class: LabelClass, step: Vec<u64>) -> DeweyId {
        let mut divisions = Vec::with_capacity(self.divisions.len() + step.len() + 1);
        divisions.extend_from_slice(&self.divisions);
        if let Some(marker) = class.marker() {
            divisions.push(marker);
        }
        let last_step = self.divisions.len();
        divisions.extend(step);
        DeweyId {
            divisions,
            last_step,
            level: self.level + 1,
        }
    }

    /// First label in the child sub-range of this node.
    pub fn new_child_id(&self) -> DeweyId {
        self.extended(LabelClass::Child, first_step())
    }

    /// First label in the attribute sub-range of this node.
    pub fn new_attribute_id(&self) -> DeweyId {
        self.extended(LabelClass::Attribute, first_step())
    }

    /// First label in the namespace sub-range of this node.
    pub fn new_namespace_id(&self) -> DeweyId {
        self.extended(LabelClass::Namespace, first_step())
    }

    /// Allocates a new label below `parent` between two optional siblings.
    ///
    /// - both bounds: strictly between them, same class
    /// - only `left`: the slot right after it
    /// - only `right`: the slot right before it
    /// - neither: the first child slot of `parent`
    pub fn new_between(
        parent: &DeweyId,
        left: Option<&DeweyId>,
        right: Option<&DeweyId>,
    ) -> DeweyResult<DeweyId> {
        for bound in [left, right].into_iter().flatten() {
            if bound.is_root() || bound.parent_divisions() != parent.divisions() {
                return Err(DeweyError::NotAChild {
                    label: bound.to_string(),
                    parent: parent.to_string(),
                });
            }
        }

        match (left, right) {
            (Some(l), Some(r)) => {
                if l.class() != r.class() {
                    return Err(DeweyError::ClassMismatch {
                        left: l.to_string(),
                        right: r.to_string(),
                    });
                }
                if l >= r {
                    return Err(DeweyError::Unordered {
                        left: l.to_string(),
                        right: r.to_string(),
                    });
                }
                Ok(parent.extended(l.class(), step_between(l.step(), r.step())?))
            }
            (Some(l), None) => Ok(parent.extended(l.class(), step_after(l.step())?)),
            (None, Some(r)) => Ok(parent.extended(r.class(), step_before(r.step()))),
            (None, None) => Ok(parent.new_child_id()),
        }
    }

    pub fn is_ancestor_of(&self, other: &DeweyId) -> bool {
        self.divisions.len() < other.divisions.len()
            && other.divisions.starts_with(&self.divisions)
    }

    pub fn is_descendant_of(&self, other: &DeweyId) -> bool {
        other.is_ancestor_of(self)
    }

    pub fn is_parent_of(&self, other: &DeweyId) -> bool {
        !other.is_root() && other.parent_divisions() == self.divisions.as_slice()
    }

    pub fn is_child_of(&self, other: &DeweyId) -> bool {
        other.is_parent_of(self)
    }

    /// Same parent, different label. Attributes and namespaces count as
    /// siblings of each other and of the children of their owner.
    pub fn is_sibling_of(&self, other: &DeweyId) -> bool {
        !self.is_root()
            && !other.is_root()
            && self != other
            && self.parent_divisions() == other.parent_divisions()
    }

    pub fn is_preceding_sibling_of(&self, other: &DeweyId) -> bool {
        self.is_sibling_of(other) && self < other
    }

    pub fn is_following_sibling_of(&self, other: &DeweyId) -> bool {
        self.is_sibling_of(other) && self > other
    }

    /// Before `other` in document order and not one of its ancestors.
    pub fn is_preceding_of(&self, other: &DeweyId) -> bool {
        self < other && !self.is_ancestor_of(other)
    }

    /// After `other` in document order and not one of its descendants.
    pub fn is_following_of(&self, other: &DeweyId) -> bool {
        self > other && !self.is_descendant_of(other)
    }

    /// Deepest label that is an ancestor-or-self of both labels.
    pub fn common_ancestor(&self, other: &DeweyId) -> DeweyId {
        let mut candidate = self.clone();
        while candidate != *other && !candidate.is_ancestor_of(other) {
            match candidate.parent() {
                Some(parent) => candidate = parent,
                None => break,
            }
        }
        candidate
    }
}

impl PartialEq for DeweyId {
    fn eq(&self, other: &Self) -> bool {
        self.divisions == other.divisions
    }
}

impl Eq for DeweyId {}

impl Hash for DeweyId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.divisions.hash(state);
    }
}

impl PartialOrd for DeweyId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DeweyId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.divisions.cmp(&other.divisions)
    }
}

impl fmt::Display for DeweyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, division) in self.divisions.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", division)?;
        }
        Ok(())
    }
}

impl fmt::Debug for DeweyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeweyId({})", self)
    }
}

impl FromStr for DeweyId {
    type Err = DeweyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let divisions = s
            .split('.')
            .map(|part| {
                part.trim().parse::<u64>().map_err(|e| DeweyError::InvalidLabel {
                    label: s.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<DeweyResult<Vec<u64>>>()?;
        Self::from_divisions(divisions)
    }
}

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn read_varint(bytes: &[u8], pos: &mut usize) -> DeweyResult<u64> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = *bytes.get(*pos).ok_or(DeweyError::Truncated)?;
        *pos += 1;
        if shift >= 64 {
            return Err(DeweyError::Truncated);
        }
        value |= u64::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
}
