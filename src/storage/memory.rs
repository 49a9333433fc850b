//! In-memory page storage
//!
//! Uses the same frame format as the page file so that corruption checks
//! behave identically. Contents are lost when the value is dropped.

use super::errors::{StorageError, StorageResult};
use super::frame::{decode_frame, frame_length, encode_frame, MIN_FRAME_SIZE};
use super::root_pointer::RootPointer;
use super::PageStorage;

/// Volatile storage for tests and scratch resources.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    bytes: Vec<u8>,
    root_pointer: Option<RootPointer>,
}

impl MemoryStorage {
    /// Creates empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of bytes appended so far.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns whether nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl PageStorage for MemoryStorage {
    fn append(&mut self, page_bytes: &[u8]) -> StorageResult<u64> {
        let offset = self.bytes.len() as u64;
        self.bytes.extend_from_slice(&encode_frame(page_bytes));
        Ok(offset)
    }

    fn read(&mut self, offset: u64) -> StorageResult<Vec<u8>> {
        let start = offset as usize;
        if start + MIN_FRAME_SIZE > self.bytes.len() {
            return Err(StorageError::corruption_at_offset(
                offset,
                "Page offset beyond end of storage",
            ));
        }

        let length = frame_length([
            self.bytes[start],
            self.bytes[start + 1],
            self.bytes[start + 2],
            self.bytes[start + 3],
        ]);
        let end = (start + length).min(self.bytes.len());

        decode_frame(&self.bytes[start..end])
            .map(|page| page.to_vec())
            .map_err(|e| StorageError::corruption_at_offset(offset, e.to_string()))
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn read_root_pointer(&mut self) -> StorageResult<Option<RootPointer>> {
        Ok(self.root_pointer.clone())
    }

    fn write_root_pointer(&mut self, pointer: &RootPointer) -> StorageResult<()> {
        self.root_pointer = Some(pointer.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_read() {
        let mut storage = MemoryStorage::new();
        assert!(storage.is_empty());

        let a = storage.append(&[1, 2]).unwrap();
        let b = storage.append(&[3]).unwrap();

        assert_eq!(storage.read(a).unwrap(), vec![1, 2]);
        assert_eq!(storage.read(b).unwrap(), vec![3]);
        assert_eq!(storage.len(), 2 * MIN_FRAME_SIZE + 1);
    }

    #[test]
    fn test_misaligned_offset_fails() {
        let mut storage = MemoryStorage::new();
        storage.append(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert!(storage.read(2).is_err());
    }
}
