//! Revision root pages
//!
//! One per committed revision. Owns the document index tree and one
//! reference per secondary index root page.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::codec::{PageDecoder, PageEncoder};
use super::errors::{PageError, PageResult};
use super::index_root::{IndexTree, IndexType};
use super::reference::PageReference;

/// Who committed a revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub id: Uuid,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: Uuid::new_v4(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionRootPage {
    revision: u32,
    /// Milliseconds since the epoch, set when the revision is committed
    commit_timestamp: i64,
    commit_message: Option<String>,
    user: Option<User>,
    document: IndexTree,
    /// Indexed like `IndexType::SECONDARY`
    index_roots: [PageReference; 5],
}

impl RevisionRootPage {
    pub fn new(revision: u32) -> Self {
        Self {
            revision,
            commit_timestamp: 0,
            commit_message: None,
            user: None,
            document: IndexTree::default(),
            index_roots: Default::default(),
        }
    }

    /// Starting point of the revision after this one: same trees, no commit
    /// metadata yet.
    pub fn next_revision(&self) -> Self {
        Self {
            revision: self.revision + 1,
            commit_timestamp: 0,
            commit_message: None,
            user: None,
            document: self.document.clone(),
            index_roots: self.index_roots.clone(),
        }
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }

    pub fn commit_timestamp(&self) -> i64 {
        self.commit_timestamp
    }

    pub fn commit_time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.commit_timestamp).single()
    }

    pub fn commit_message(&self) -> Option<&str> {
        self.commit_message.as_deref()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn set_commit_info(&mut self, timestamp: DateTime<Utc>, message: Option<String>, user: Option<User>) {
        self.commit_timestamp = timestamp.timestamp_millis();
        self.commit_message = message;
        self.user = user;
    }

    pub fn document_tree(&self) -> &IndexTree {
        &self.document
    }

    pub fn set_document_tree(&mut self, tree: IndexTree) {
        self.document = tree;
    }

    /// Highest allocated document record key.
    pub fn max_node_key(&self) -> Option<u64> {
        self.document.max_key()
    }

    fn slot(index_type: IndexType) -> Option<usize> {
        IndexType::SECONDARY.iter().position(|t| *t == index_type)
    }

    /// Reference to the root page of a secondary index.
    pub fn index_root(&self, index_type: IndexType) -> Option<&PageReference> {
        Self::slot(index_type).map(|i| &self.index_roots[i])
    }

    pub fn index_root_mut(&mut self, index_type: IndexType) -> Option<&mut PageReference> {
        Self::slot(index_type).map(move |i| &mut self.index_roots[i])
    }

    pub(crate) fn references_mut(&mut self) -> impl Iterator<Item = &mut PageReference> {
        std::iter::once(&mut self.document.root).chain(self.index_roots.iter_mut())
    }

    pub(crate) fn encode(&self, enc: &mut PageEncoder) -> PageResult<()> {
        enc.put_u32(self.revision);
        enc.put_i64(self.commit_timestamp);
        enc.put_opt_str(self.commit_message.as_deref());
        match &self.user {
            Some(user) => {
                enc.put_bool(true);
                enc.put_str(&user.name);
                enc.put_bytes(user.id.as_bytes());
            }
            None => enc.put_bool(false),
        }
        self.document.encode(enc)?;
        for reference in &self.index_roots {
            reference.encode(enc)?;
        }
        Ok(())
    }

    pub(crate) fn decode(dec: &mut PageDecoder<'_>) -> PageResult<Self> {
        let revision = dec.get_u32()?;
        let commit_timestamp = dec.get_i64()?;
        let commit_message = dec.get_opt_str()?;
        let user = if dec.get_bool()? {
            let name = dec.get_str()?;
            let id = Uuid::from_slice(&dec.get_bytes()?)
                .map_err(|e| PageError::format(format!("Invalid user id: {}", e)))?;
            Some(User { name, id })
        } else {
            None
        };
        let document = IndexTree::decode(dec)?;
        let mut index_roots: [PageReference; 5] = Default::default();
        for reference in index_roots.iter_mut() {
            *reference = PageReference::decode(dec)?;
        }
        Ok(Self {
            revision,
            commit_timestamp,
            commit_message,
            user,
            document,
            index_roots,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_info_round_trip() {
        let mut page = RevisionRootPage::new(4);
        let now = Utc::now();
        page.set_commit_info(now, Some("import".into()), Some(User::new("admin")));
        *page.index_root_mut(IndexType::Cas).unwrap() = PageReference::durable(300);

        let mut enc = PageEncoder::default();
        page.encode(&mut enc).unwrap();
        let bytes = enc.finish();
        let decoded = RevisionRootPage::decode(&mut PageDecoder::new(&bytes)).unwrap();

        assert_eq!(decoded, page);
        assert_eq!(decoded.commit_message(), Some("import"));
        assert_eq!(decoded.user().map(|u| u.name.as_str()), Some("admin"));
        assert_eq!(
            decoded.commit_time().map(|t| t.timestamp_millis()),
            Some(now.timestamp_millis())
        );
    }

    #[test]
    fn test_next_revision_keeps_trees() {
        let mut page = RevisionRootPage::new(0);
        page.set_document_tree(IndexTree {
            root: PageReference::durable(10),
            next_key: 5,
            depth: 0,
        });
        page.set_commit_info(Utc::now(), Some("first".into()), None);

        let next = page.next_revision();
        assert_eq!(next.revision(), 1);
        assert_eq!(next.document_tree(), page.document_tree());
        assert_eq!(next.max_node_key(), Some(4));
        assert!(next.commit_message().is_none());
    }

    #[test]
    fn test_document_has_no_index_root() {
        let page = RevisionRootPage::new(0);
        assert!(page.index_root(IndexType::Document).is_none());
        assert!(page.index_root(IndexType::DeweyId).is_some());
    }
}
