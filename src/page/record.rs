//! Record (leaf) pages and overflow pages
//!
//! A record page holds up to `RECORDS_PER_PAGE` consecutive record keys of
//! one index tree. Records are stored inline; a record whose encoding grows
//! past the resource's inline limit is moved into its own overflow page when
//! the leaf is flushed, and the leaf keeps only a reference to it.

use std::collections::BTreeMap;

use crate::dewey::DeweyId;

use super::codec::{PageDecoder, PageEncoder};
use super::errors::{PageError, PageResult};
use super::index_root::IndexType;
use super::reference::PageReference;
use super::leaf_key;

const ENTRY_INLINE: u8 = 0;
const ENTRY_OVERFLOW: u8 = 1;

/// One stored record: optional label plus an opaque body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataRecord {
    pub dewey_id: Option<DeweyId>,
    pub body: Vec<u8>,
}

impl DataRecord {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            dewey_id: None,
            body,
        }
    }

    pub fn with_dewey_id(dewey_id: DeweyId, body: Vec<u8>) -> Self {
        Self {
            dewey_id: Some(dewey_id),
            body,
        }
    }

    fn encode(&self, enc: &mut PageEncoder) {
        match &self.dewey_id {
            Some(id) => {
                enc.put_bool(true);
                enc.put_bytes(&id.to_bytes());
            }
            None => enc.put_bool(false),
        }
        enc.put_bytes(&self.body);
    }

    fn decode(dec: &mut PageDecoder<'_>) -> PageResult<Self> {
        let dewey_id = if dec.get_bool()? {
            let bytes = dec.get_bytes()?;
            Some(
                DeweyId::from_bytes(&bytes)
                    .map_err(|e| PageError::format(format!("Invalid stored DeweyID: {}", e)))?,
            )
        } else {
            None
        };
        let body = dec.get_bytes()?;
        Ok(Self { dewey_id, body })
    }

    /// Standalone encoding, as stored in an overflow page.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut enc = PageEncoder::default();
        self.encode(&mut enc);
        enc.finish()
    }

    pub fn from_bytes(bytes: &[u8]) -> PageResult<Self> {
        let mut dec = PageDecoder::new(bytes);
        let record = Self::decode(&mut dec)?;
        dec.finish()?;
        Ok(record)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordEntry {
    Inline(DataRecord),
    Overflow(PageReference),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPage {
    leaf_key: u64,
    index_type: IndexType,
    index_number: u32,
    entries: BTreeMap<u64, RecordEntry>,
}

impl RecordPage {
    pub fn new(leaf_key: u64, index_type: IndexType, index_number: u32) -> Self {
        Self {
            leaf_key,
            index_type,
            index_number,
            entries: BTreeMap::new(),
        }
    }

    pub fn leaf_key(&self) -> u64 {
        self.leaf_key
    }

    pub fn index_type(&self) -> IndexType {
        self.index_type
    }

    pub fn index_number(&self) -> u32 {
        self.index_number
    }

    pub fn get(&self, key: u64) -> Option<&RecordEntry> {
        self.entries.get(&key)
    }

    pub fn insert(&mut self, key: u64, record: DataRecord) -> PageResult<()> {
        self.check_key(key)?;
        self.entries.insert(key, RecordEntry::Inline(record));
        Ok(())
    }

    pub fn remove(&mut self, key: u64) -> Option<RecordEntry> {
        self.entries.remove(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.keys().copied()
    }

    fn check_key(&self, key: u64) -> PageResult<()> {
        if leaf_key(key) != self.leaf_key {
            return Err(PageError::format(format!(
                "Record key {} does not belong to leaf {}",
                key, self.leaf_key
            )));
        }
        Ok(())
    }

    /// Removes inline records whose encoding exceeds `limit` bytes and
    /// returns them encoded; the caller stores each in an overflow page and
    /// hands the reference back through [`RecordPage::set_overflow`].
    pub(crate) fn take_oversized(&mut self, limit: usize) -> Vec<(u64, Vec<u8>)> {
        let mut oversized = Vec::new();
        for (key, entry) in &self.entries {
            if let RecordEntry::Inline(record) = entry {
                let bytes = record.to_bytes();
                if bytes.len() > limit {
                    oversized.push((*key, bytes));
                }
            }
        }
        for (key, _) in &oversized {
            self.entries.remove(key);
        }
        oversized
    }

    pub(crate) fn set_overflow(&mut self, key: u64, reference: PageReference) {
        self.entries.insert(key, RecordEntry::Overflow(reference));
    }

    pub fn overflow_references(&self) -> impl Iterator<Item = &PageReference> {
        self.entries.values().filter_map(|entry| match entry {
            RecordEntry::Overflow(reference) => Some(reference),
            RecordEntry::Inline(_) => None,
        })
    }

    pub(crate) fn references_mut(&mut self) -> impl Iterator<Item = &mut PageReference> {
        self.entries.values_mut().filter_map(|entry| match entry {
            RecordEntry::Overflow(reference) => Some(reference),
            RecordEntry::Inline(_) => None,
        })
    }

    pub(crate) fn encode(&self, enc: &mut PageEncoder) -> PageResult<()> {
        enc.put_varint(self.leaf_key);
        enc.put_u8(self.index_type.as_u8());
        enc.put_varint(u64::from(self.index_number));
        enc.put_varint(self.entries.len() as u64);
        for (key, entry) in &self.entries {
            enc.put_varint(*key);
            match entry {
                RecordEntry::Inline(record) => {
                    enc.put_u8(ENTRY_INLINE);
                    record.encode(enc);
                }
                RecordEntry::Overflow(reference) => {
                    enc.put_u8(ENTRY_OVERFLOW);
                    reference.encode(enc)?;
                }
            }
        }
        Ok(())
    }

    pub(crate) fn decode(dec: &mut PageDecoder<'_>) -> PageResult<Self> {
        let leaf = dec.get_varint()?;
        let index_type = IndexType::from_u8(dec.get_u8()?)?;
        let index_number = u32::try_from(dec.get_varint()?)
            .map_err(|_| PageError::format("Index number exceeds u32"))?;
        let count = dec.get_len()?;

        let mut page = Self::new(leaf, index_type, index_number);
        let mut previous: Option<u64> = None;
        for _ in 0..count {
            let key = dec.get_varint()?;
            page.check_key(key)?;
            if previous.is_some_and(|p| p >= key) {
                return Err(PageError::format(format!(
                    "Record keys out of order in leaf {}",
                    leaf
                )));
            }
            previous = Some(key);

            let entry = match dec.get_u8()? {
                ENTRY_INLINE => RecordEntry::Inline(DataRecord::decode(dec)?),
                ENTRY_OVERFLOW => RecordEntry::Overflow(PageReference::decode(dec)?),
                other => {
                    return Err(PageError::format(format!("Unknown record entry tag: {}", other)))
                }
            };
            page.entries.insert(key, entry);
        }
        Ok(page)
    }
}

/// Single oversized record, stored as its standalone encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverflowPage {
    bytes: Vec<u8>,
}

impl OverflowPage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn record(&self) -> PageResult<DataRecord> {
        DataRecord::from_bytes(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub(crate) fn encode(&self, enc: &mut PageEncoder) -> PageResult<()> {
        enc.put_bytes(&self.bytes);
        Ok(())
    }

    pub(crate) fn decode(dec: &mut PageDecoder<'_>) -> PageResult<Self> {
        Ok(Self {
            bytes: dec.get_bytes()?,
        })
    }
}
