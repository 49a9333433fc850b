//! Indirect pages
//!
//! Fixed fan-out array of child references. Only occupied slots are written:
//! `[count varint]` then `[slot varint][reference]` per occupied slot.

use super::codec::{PageDecoder, PageEncoder};
use super::errors::{PageError, PageResult};
use super::reference::PageReference;
use super::FANOUT;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndirectPage {
    slots: Vec<PageReference>,
}

impl Default for IndirectPage {
    fn default() -> Self {
        Self::new()
    }
}

impl IndirectPage {
    pub fn new() -> Self {
        Self {
            slots: vec![PageReference::null(); FANOUT],
        }
    }

    /// Indirect page whose first slot holds `child`, used when a tree grows
    /// a level on top of its current root.
    pub fn with_first_child(child: PageReference) -> Self {
        let mut page = Self::new();
        page.slots[0] = child;
        page
    }

    pub fn slot(&self, index: usize) -> &PageReference {
        &self.slots[index]
    }

    pub fn slot_mut(&mut self, index: usize) -> &mut PageReference {
        &mut self.slots[index]
    }

    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|r| !r.is_null()).count()
    }

    pub(crate) fn references_mut(&mut self) -> impl Iterator<Item = &mut PageReference> {
        self.slots.iter_mut()
    }

    pub(crate) fn references(&self) -> impl Iterator<Item = &PageReference> {
        self.slots.iter()
    }

    pub(crate) fn encode(&self, enc: &mut PageEncoder) -> PageResult<()> {
        enc.put_varint(self.occupied() as u64);
        for (index, reference) in self.slots.iter().enumerate() {
            if !reference.is_null() {
                enc.put_varint(index as u64);
                reference.encode(enc)?;
            }
        }
        Ok(())
    }

    pub(crate) fn decode(dec: &mut PageDecoder<'_>) -> PageResult<Self> {
        let count = dec.get_len()?;
        let mut page = Self::new();
        for _ in 0..count {
            let index = dec.get_varint()? as usize;
            if index >= FANOUT {
                return Err(PageError::format(format!(
                    "Indirect slot {} exceeds fan-out {}",
                    index, FANOUT
                )));
            }
            page.slots[index] = PageReference::decode(dec)?;
        }
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_slots_survive_encoding() {
        let mut page = IndirectPage::new();
        *page.slot_mut(0) = PageReference::durable(10);
        *page.slot_mut(FANOUT - 1) = PageReference::durable(20);

        let mut enc = PageEncoder::default();
        page.encode(&mut enc).unwrap();
        let bytes = enc.finish();

        let decoded = IndirectPage::decode(&mut PageDecoder::new(&bytes)).unwrap();
        assert_eq!(decoded, page);
        assert_eq!(decoded.occupied(), 2);
    }

    #[test]
    fn test_slot_beyond_fanout_rejected() {
        let mut enc = PageEncoder::default();
        enc.put_varint(1);
        enc.put_varint(FANOUT as u64);
        PageReference::durable(1).encode(&mut enc).unwrap();
        let bytes = enc.finish();

        assert!(IndirectPage::decode(&mut PageDecoder::new(&bytes)).is_err());
    }
}
