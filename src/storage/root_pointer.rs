//! Root pointer file
//!
//! The root pointer names the storage offset of the root-of-everything page
//! of the latest published revision. Replacing it is the publish boundary of
//! a commit: present and readable = that revision is committed, anything
//! written to the page file after the pointed-to page is unreachable.
//!
//! Location: `<resource_dir>/root.json`
//!
//! Atomicity is achieved via:
//! 1. Write to temp file
//! 2. fsync temp file
//! 3. Rename temp to final (atomic on POSIX)
//! 4. fsync the directory

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::{StorageError, StorageResult};
use crate::crash_point::{maybe_crash, points};

/// Root pointer file name
const POINTER_FILE_NAME: &str = "root.json";

/// Current pointer format version
pub const POINTER_FORMAT_VERSION: u8 = 1;

/// Durable pointer to the latest root-of-everything page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RootPointer {
    /// Frame offset of the root-of-everything page in the page file
    pub root_page_offset: u64,

    /// Number of the revision this pointer publishes
    pub revision: u32,

    /// RFC3339 timestamp of the publish
    pub published_at: String,

    /// Format version
    pub format_version: u8,
}

impl RootPointer {
    /// Creates a pointer for a freshly flushed root page.
    pub fn new(root_page_offset: u64, revision: u32) -> Self {
        Self {
            root_page_offset,
            revision,
            published_at: chrono::Utc::now().to_rfc3339(),
            format_version: POINTER_FORMAT_VERSION,
        }
    }

    fn to_json(&self) -> StorageResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            StorageError::write_failed_no_source(format!("Failed to serialize root pointer: {}", e))
        })
    }

    fn from_json(json: &str) -> StorageResult<Self> {
        let pointer: RootPointer = serde_json::from_str(json).map_err(|e| {
            StorageError::data_corruption(format!("Failed to parse root pointer: {}", e))
        })?;

        if pointer.format_version != POINTER_FORMAT_VERSION {
            return Err(StorageError::data_corruption(format!(
                "Unsupported root pointer format version: {}",
                pointer.format_version
            )));
        }

        Ok(pointer)
    }
}

/// Reads and atomically replaces the root pointer file of one resource.
pub struct RootPointerFile {
    pointer_path: PathBuf,
    temp_path: PathBuf,
}

impl RootPointerFile {
    /// Creates a handle for the pointer inside `resource_dir`.
    pub fn new(resource_dir: &Path) -> Self {
        Self {
            pointer_path: resource_dir.join(POINTER_FILE_NAME),
            temp_path: resource_dir.join(format!("{}.tmp", POINTER_FILE_NAME)),
        }
    }

    /// Returns the pointer file path.
    pub fn path(&self) -> &Path {
        &self.pointer_path
    }

    /// Writes the pointer atomically.
    ///
    /// A crash at any point before the rename leaves the previous pointer in
    /// place.
    pub fn write_atomic(&self, pointer: &RootPointer) -> StorageResult<()> {
        let content = pointer.to_json()?;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.temp_path)
            .map_err(|e| {
                StorageError::write_failed(
                    format!("Failed to create temp root pointer: {}", self.temp_path.display()),
                    e,
                )
            })?;

        file.write_all(content.as_bytes()).map_err(|e| {
            StorageError::write_failed("Failed to write temp root pointer", e)
        })?;

        file.sync_all()
            .map_err(|e| StorageError::write_failed("Failed to fsync temp root pointer", e))?;

        maybe_crash(points::POINTER_BEFORE_RENAME);

        fs::rename(&self.temp_path, &self.pointer_path).map_err(|e| {
            StorageError::write_failed(
                format!("Failed to publish root pointer: {}", self.pointer_path.display()),
                e,
            )
        })?;

        maybe_crash(points::POINTER_AFTER_RENAME);

        if let Some(parent) = self.pointer_path.parent() {
            let dir = OpenOptions::new().read(true).open(parent).map_err(|e| {
                StorageError::write_failed(
                    format!("Failed to open resource directory for fsync: {}", parent.display()),
                    e,
                )
            })?;
            dir.sync_all().map_err(|e| {
                StorageError::write_failed(
                    format!("Failed to fsync resource directory: {}", parent.display()),
                    e,
                )
            })?;
        }

        Ok(())
    }

    /// Reads the pointer if one has been published.
    pub fn read(&self) -> StorageResult<Option<RootPointer>> {
        if !self.pointer_path.exists() {
            return Ok(None);
        }

        let mut file = File::open(&self.pointer_path).map_err(|e| {
            StorageError::read_failed(
                format!("Failed to open root pointer: {}", self.pointer_path.display()),
                e,
            )
        })?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| StorageError::read_failed("Failed to read root pointer", e))?;

        RootPointer::from_json(&content).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_absent_pointer_reads_none() {
        let tmp = TempDir::new().unwrap();
        let file = RootPointerFile::new(tmp.path());
        assert!(file.read().unwrap().is_none());
    }

    #[test]
    fn test_write_then_read() {
        let tmp = TempDir::new().unwrap();
        let file = RootPointerFile::new(tmp.path());

        let pointer = RootPointer::new(8192, 3);
        file.write_atomic(&pointer).unwrap();

        assert_eq!(file.read().unwrap(), Some(pointer));
        assert!(!tmp.path().join("root.json.tmp").exists());
    }

    #[test]
    fn test_replace_keeps_latest() {
        let tmp = TempDir::new().unwrap();
        let file = RootPointerFile::new(tmp.path());

        file.write_atomic(&RootPointer::new(10, 0)).unwrap();
        file.write_atomic(&RootPointer::new(500, 1)).unwrap();

        let read = file.read().unwrap().unwrap();
        assert_eq!(read.root_page_offset, 500);
        assert_eq!(read.revision, 1);
    }

    #[test]
    fn test_stale_temp_file_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let file = RootPointerFile::new(tmp.path());
        file.write_atomic(&RootPointer::new(10, 0)).unwrap();

        // A crash between temp write and rename leaves only the temp file behind.
        fs::write(tmp.path().join("root.json.tmp"), b"{ partial").unwrap();

        assert_eq!(file.read().unwrap().unwrap().root_page_offset, 10);
    }

    #[test]
    fn test_garbage_pointer_is_corruption() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("root.json"), b"not json").unwrap();

        let err = RootPointerFile::new(tmp.path()).read().unwrap_err();
        assert!(err.is_fatal());
    }
}
