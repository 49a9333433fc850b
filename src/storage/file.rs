//! File-backed page storage
//!
//! Pages are appended to `<resource_dir>/pages.dat`; nothing already written
//! is ever modified. Durability is established by `sync()`, which the commit
//! path calls once after the last page of a revision and before the root
//! pointer is replaced.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::errors::{StorageError, StorageResult};
use super::frame::{decode_frame, encode_frame, frame_length, MIN_FRAME_SIZE};
use super::root_pointer::{RootPointer, RootPointerFile};
use super::PageStorage;

/// Name of the append-only page file inside a resource directory
pub const PAGE_FILE_NAME: &str = "pages.dat";

/// Append-only page file plus its root pointer.
pub struct FileStorage {
    /// Path to the page file
    page_path: PathBuf,
    /// Underlying file handle (append for writes, seek for reads)
    file: File,
    /// Offset where the next frame will be appended
    current_offset: u64,
    /// Atomically replaced root pointer
    pointer: RootPointerFile,
}

impl FileStorage {
    /// Opens or creates the page file inside `resource_dir`.
    ///
    /// Creates the directory if it does not exist.
    pub fn open(resource_dir: &Path) -> StorageResult<Self> {
        if !resource_dir.exists() {
            fs::create_dir_all(resource_dir).map_err(|e| {
                StorageError::write_failed(
                    format!("Failed to create resource directory: {}", resource_dir.display()),
                    e,
                )
            })?;
        }

        let page_path = resource_dir.join(PAGE_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&page_path)
            .map_err(|e| {
                StorageError::write_failed(
                    format!("Failed to open page file: {}", page_path.display()),
                    e,
                )
            })?;

        let current_offset = file
            .metadata()
            .map_err(|e| StorageError::io_error("Failed to read page file metadata", e))?
            .len();

        Ok(Self {
            page_path,
            file,
            current_offset,
            pointer: RootPointerFile::new(resource_dir),
        })
    }

    /// Returns the path to the page file.
    pub fn path(&self) -> &Path {
        &self.page_path
    }

    /// Returns the offset where the next page will be written.
    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    /// Appends one frame through `write`; a failed write never leaves its
    /// partial frame in front of the next append.
    fn append_with<W>(&mut self, page_bytes: &[u8], write: W) -> StorageResult<u64>
    where
        W: FnOnce(&mut File, &[u8]) -> io::Result<()>,
    {
        let frame = encode_frame(page_bytes);
        let offset = self.current_offset;

        if let Err(e) = write(&mut self.file, &frame[..]) {
            self.discard_torn_tail();
            return Err(StorageError::write_failed(
                format!("Failed to append page at offset {}", offset),
                e,
            ));
        }

        self.current_offset += frame.len() as u64;
        Ok(offset)
    }

    /// Cuts bytes a failed append left past `current_offset`.
    ///
    /// When the truncate itself fails the tail stays as unreferenced garbage
    /// and `current_offset` moves past it, so later offsets still match where
    /// their frames land.
    fn discard_torn_tail(&mut self) {
        if self.file.set_len(self.current_offset).is_ok() {
            return;
        }
        if let Ok(metadata) = self.file.metadata() {
            self.current_offset = metadata.len();
        }
    }
}

impl PageStorage for FileStorage {
    fn append(&mut self, page_bytes: &[u8]) -> StorageResult<u64> {
        self.append_with(page_bytes, |file, frame| file.write_all(frame))
    }

    fn read(&mut self, offset: u64) -> StorageResult<Vec<u8>> {
        if offset + MIN_FRAME_SIZE as u64 > self.current_offset {
            return Err(StorageError::corruption_at_offset(
                offset,
                format!("Page offset beyond end of page file ({})", self.current_offset),
            ));
        }

        self.file.seek(SeekFrom::Start(offset)).map_err(|e| {
            StorageError::read_failed(format!("Failed to seek to offset {}", offset), e)
        })?;

        let mut len_buf = [0u8; 4];
        self.file.read_exact(&mut len_buf).map_err(|e| {
            StorageError::corruption_at_offset(offset, format!("Failed to read frame length: {}", e))
        })?;
        let length = frame_length(len_buf);

        if length < MIN_FRAME_SIZE || offset + length as u64 > self.current_offset {
            return Err(StorageError::corruption_at_offset(
                offset,
                format!("Invalid frame length: {}", length),
            ));
        }

        let mut frame = vec![0u8; length];
        frame[0..4].copy_from_slice(&len_buf);
        self.file.read_exact(&mut frame[4..]).map_err(|e| {
            StorageError::corruption_at_offset(offset, format!("Failed to read frame body: {}", e))
        })?;

        decode_frame(&frame)
            .map(|page| page.to_vec())
            .map_err(|e| StorageError::corruption_at_offset(offset, e.to_string()))
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.file
            .sync_all()
            .map_err(|e| StorageError::write_failed("fsync of page file failed", e))
    }

    fn read_root_pointer(&mut self) -> StorageResult<Option<RootPointer>> {
        self.pointer.read()
    }

    fn write_root_pointer(&mut self, pointer: &RootPointer) -> StorageResult<()> {
        self.pointer.write_atomic(pointer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_directory_and_file() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("resource");

        let storage = FileStorage::open(&dir).unwrap();

        assert!(dir.join(PAGE_FILE_NAME).exists());
        assert_eq!(storage.current_offset(), 0);
    }

    #[test]
    fn test_append_and_read_back() {
        let tmp = TempDir::new().unwrap();
        let mut storage = FileStorage::open(tmp.path()).unwrap();

        let first = storage.append(&[1, 10, 20]).unwrap();
        let second = storage.append(&[4, 7]).unwrap();
        storage.sync().unwrap();

        assert_eq!(first, 0);
        assert!(second > first);
        assert_eq!(storage.read(first).unwrap(), vec![1, 10, 20]);
        assert_eq!(storage.read(second).unwrap(), vec![4, 7]);
    }

    #[test]
    fn test_reopen_continues_at_end() {
        let tmp = TempDir::new().unwrap();
        let first = {
            let mut storage = FileStorage::open(tmp.path()).unwrap();
            let offset = storage.append(&[3, 3, 3]).unwrap();
            storage.sync().unwrap();
            offset
        };

        let mut storage = FileStorage::open(tmp.path()).unwrap();
        assert!(storage.current_offset() > 0);
        let second = storage.append(&[5]).unwrap();

        assert_eq!(storage.read(first).unwrap(), vec![3, 3, 3]);
        assert_eq!(storage.read(second).unwrap(), vec![5]);
    }

    #[test]
    fn test_corruption_detected_on_read() {
        let tmp = TempDir::new().unwrap();
        {
            let mut storage = FileStorage::open(tmp.path()).unwrap();
            storage.append(&[1, 2, 3, 4, 5, 6]).unwrap();
            storage.sync().unwrap();
        }

        let path = tmp.path().join(PAGE_FILE_NAME);
        let mut contents = fs::read(&path).unwrap();
        contents[6] ^= 0xFF;
        fs::write(&path, contents).unwrap();

        let mut storage = FileStorage::open(tmp.path()).unwrap();
        let err = storage.read(0).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_offset_past_end_is_corruption() {
        let tmp = TempDir::new().unwrap();
        let mut storage = FileStorage::open(tmp.path()).unwrap();
        storage.append(&[1]).unwrap();

        assert!(storage.read(4096).unwrap_err().is_fatal());
    }

    #[test]
    fn test_partial_append_is_cut_before_next_append() {
        let tmp = TempDir::new().unwrap();
        let mut storage = FileStorage::open(tmp.path()).unwrap();
        let first = storage.append(&[1, 2, 3]).unwrap();
        let end = storage.current_offset();

        let result = storage.append_with(&[7; 64], |file, frame| {
            file.write_all(&frame[..frame.len() / 2])?;
            Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
        });
        assert!(result.is_err());
        assert_eq!(storage.current_offset(), end);
        assert_eq!(fs::metadata(storage.path()).unwrap().len(), end);

        let second = storage.append(&[9, 9]).unwrap();
        assert_eq!(second, end);
        assert_eq!(storage.read(first).unwrap(), vec![1, 2, 3]);
        assert_eq!(storage.read(second).unwrap(), vec![9, 9]);
    }

    #[test]
    fn test_root_pointer_round_trip() {
        let tmp = TempDir::new().unwrap();
        let mut storage = FileStorage::open(tmp.path()).unwrap();

        assert!(storage.read_root_pointer().unwrap().is_none());
        storage.write_root_pointer(&RootPointer::new(42, 0)).unwrap();
        assert_eq!(storage.read_root_pointer().unwrap().unwrap().root_page_offset, 42);
    }
}
